use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::LinkError;
use crate::serial::{Outcome, Transport};

/// Exclusive access to the controller link.
///
/// The RC210 has no framing beyond line boundaries, so two writers would
/// interleave garbage. Every exchange holds the gate for its full duration;
/// the guard moves into the blocking worker and is dropped when the worker
/// finishes, whether it returns, fails or panics.
#[derive(Clone)]
pub struct CommandGate {
    link: Arc<Mutex<Box<dyn Transport>>>,
    simulated: bool,
}

impl CommandGate {
    pub fn new(link: Box<dyn Transport>) -> Self {
        let simulated = link.is_simulated();
        Self {
            link: Arc::new(Mutex::new(link)),
            simulated,
        }
    }

    pub fn is_simulated(&self) -> bool {
        self.simulated
    }

    /// Run one command/response exchange.
    pub async fn execute(&self, code: &str) -> Result<Outcome, LinkError> {
        let mut link = Arc::clone(&self.link).lock_owned().await;
        let code = code.to_string();
        tokio::task::spawn_blocking(move || link.send(&code))
            .await
            .map_err(|e| LinkError::Worker(e.to_string()))?
    }
}
