pub mod depletion;
pub mod reversal;
pub mod service;
pub mod types;

pub use depletion::DepletionExecutor;
pub use reversal::{ReversalEngine, ReversalOutcome};
pub use service::DepletionService;
pub use types::{ActorContext, Availability, Clock, DepletionError, StaticActor, SystemClock};
