// Graceful shutdown module
// Waits for in-flight connections once the accept loop has stopped

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Wait until `conn_counter` reaches zero or `grace` elapses.
///
/// Connections still open at the deadline are abandoned; the runtime drops
/// their tasks when the process exits. A delayed request therefore finishes
/// only if its remaining sleep fits inside the grace period.
///
/// Returns the number of connections still active when waiting stopped.
pub async fn wait_for_drain(conn_counter: &AtomicUsize, grace: Duration) -> usize {
    let deadline = tokio::time::Instant::now() + grace;

    loop {
        let active = conn_counter.load(Ordering::SeqCst);
        if active == 0 {
            return 0;
        }

        tokio::select! {
            () = tokio::time::sleep(POLL_INTERVAL) => {}
            () = tokio::time::sleep_until(deadline) => {
                return conn_counter.load(Ordering::SeqCst);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_returns_immediately_when_idle() {
        let counter = AtomicUsize::new(0);
        let started = tokio::time::Instant::now();
        assert_eq!(wait_for_drain(&counter, Duration::from_secs(30)).await, 0);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_connections_to_close() {
        let counter = Arc::new(AtomicUsize::new(2));
        let closer = Arc::clone(&counter);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            closer.fetch_sub(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(1)).await;
            closer.fetch_sub(1, Ordering::SeqCst);
        });

        assert_eq!(wait_for_drain(&counter, Duration::from_secs(30)).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_grace_period() {
        let counter = AtomicUsize::new(3);
        let started = tokio::time::Instant::now();
        assert_eq!(wait_for_drain(&counter, Duration::from_secs(2)).await, 3);
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}
