/// Fire-and-forget side effects
///
/// Mail, push and notification fan-out run after the primary mutation has
/// committed. They are spawned here, and a failure is logged instead of
/// reaching the caller.

use std::fmt::Display;
use std::future::Future;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Spawns `action` and logs its failure under `label`
///
/// The handle is only useful to tests; request handlers drop it.
pub fn best_effort<F, T, E>(label: &'static str, action: F) -> JoinHandle<()>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Display + Send + 'static,
{
    tokio::spawn(async move {
        match action.await {
            Ok(_) => debug!(effect = label, "Side effect completed"),
            Err(e) => warn!(effect = label, error = %e, "Side effect failed"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_runs_action() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();

        best_effort("flag", async move {
            flag.store(true, Ordering::SeqCst);
            Ok::<_, String>(())
        })
        .await
        .unwrap();

        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_failure_is_swallowed() {
        let handle = best_effort("failing", async { Err::<(), _>("mail api down") });
        assert!(handle.await.is_ok());
    }
}
