use uuid::Uuid;

/// Correlation ID that follows a request / depletion / reversal
#[derive(Clone, Debug)]
pub struct TraceId(Uuid);

impl TraceId {
    pub fn as_string(&self) -> String {
        self.0.as_hyphenated().to_string()
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self(Uuid::new_v4())
    }
}
