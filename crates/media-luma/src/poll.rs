use std::time::Duration;

use tracing::{info, warn};

use crate::client::{LumaClient, Transport};
use crate::error::{LumaError, Result};
use crate::types::Generation;

/// How often and how long to check a generation's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 60,
        }
    }
}

/// Polls until the generation reaches `completed` or `failed`.
///
/// Failed requests count as attempts and polling continues. Configuration
/// errors stop immediately. A `failed` generation is returned as `Ok`; callers
/// inspect its state.
pub fn wait_for_generation<T: Transport>(
    client: &LumaClient<T>,
    id: &str,
    policy: &PollPolicy,
    mut sleep: impl FnMut(Duration),
    mut on_update: impl FnMut(&Generation),
) -> Result<Generation> {
    for attempt in 1..=policy.max_attempts {
        match client.poll(id) {
            Ok(generation) => {
                on_update(&generation);
                if generation.state.is_terminal() {
                    info!(id, attempt, state = %generation.state, "generation finished");
                    return Ok(generation);
                }
            }
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) => warn!(id, attempt, error = %err, "generation status check failed"),
        }

        if attempt < policy.max_attempts {
            sleep(policy.interval);
        }
    }

    Err(LumaError::TimedOut {
        id: id.to_owned(),
        attempts: policy.max_attempts,
    })
}
