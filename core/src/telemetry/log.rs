use log::{debug, info, warn};

/// Scoped wrapper over the `log` facade so every line names its component.
#[derive(Debug, Clone, Copy)]
pub struct LogManager {
    scope: &'static str,
}

impl LogManager {
    pub fn new(scope: &'static str) -> Self {
        Self { scope }
    }

    pub fn record(&self, message: &str) {
        info!("[{}] {}", self.scope, message);
    }

    pub fn detail(&self, message: &str) {
        debug!("[{}] {}", self.scope, message);
    }

    pub fn warn(&self, message: &str) {
        warn!("[{}] {}", self.scope, message);
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new("viscore")
    }
}
