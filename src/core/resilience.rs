use failsafe::{backoff, failure_policy, Config, StateMachine, Error};
use failsafe::futures::CircuitBreaker; // Import Async CircuitBreaker trait
use std::time::Duration;
use crate::core::errors::{ProxyError, Upstream};

/// Circuit breaker guarding calls to the PII guard service
///
/// Policy:
/// - `threshold` consecutive failures trigger OPEN state
/// - `cooldown` before HALF-OPEN (one probe call is let through)
pub type GuardCircuitBreaker = StateMachine<
    failure_policy::ConsecutiveFailures<backoff::Constant>,
    ()
>;

/// Create a new circuit breaker instance
pub fn create_circuit_breaker(threshold: u32, cooldown: Duration) -> GuardCircuitBreaker {
    Config::new()
        .failure_policy(failure_policy::consecutive_failures(
            threshold,
            backoff::constant(cooldown),
        ))
        .build()
}

/// Execute a fallible async operation within the circuit breaker protection
///
/// Inner errors are returned unchanged (and counted as failures); a rejected
/// call becomes `ProxyError::CircuitOpen` for `service`.
pub async fn execute_with_cb<F, Fut, T>(
    cb: &GuardCircuitBreaker,
    service: Upstream,
    operation: F,
) -> Result<T, ProxyError>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, ProxyError>>,
{
    match cb.call(operation()).await {
        Ok(val) => Ok(val),
        Err(Error::Inner(e)) => Err(e),
        Err(Error::Rejected) => Err(ProxyError::CircuitOpen { service }),
    }
}
