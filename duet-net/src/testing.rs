//! Shared test utilities for duet integration tests.
//!
//! Timing instrumentation and wait helpers over the event streams that
//! sessions and simulated peers expose.

use std::time::Duration;

use tokio::sync::mpsc;

/// Default timeout for a handshake to settle, in seconds.
pub const HANDSHAKE_TIMEOUT_SECS: u64 = 5;

/// Default timeout for a file transfer to finish, in seconds.
pub const TRANSFER_TIMEOUT_SECS: u64 = 10;

/// Initialise a tracing subscriber for tests.
///
/// Respects the `RUST_LOG` environment variable, defaults to `debug`.
/// Uses `with_test_writer()` to integrate with `cargo test` output capture.
/// Safe to call multiple times.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debug".into()),
        )
        .with_test_writer()
        .try_init();
}

/// Timing instrumentation for test phases.
///
/// Records the duration of each named phase and logs a summary on drop.
///
/// ```ignore
/// let mut timer = TestTimer::new("handshake");
/// // ...
/// timer.phase("connected");
/// ```
pub struct TestTimer {
    test_name: String,
    start: tokio::time::Instant,
    last: tokio::time::Instant,
    phases: Vec<(String, Duration)>,
}

impl TestTimer {
    pub fn new(test_name: &str) -> Self {
        let now = tokio::time::Instant::now();
        tracing::info!(target: "duet_test::timer", test = test_name, "test started");
        Self {
            test_name: test_name.to_string(),
            start: now,
            last: now,
            phases: Vec::new(),
        }
    }

    /// Record the end of a named phase.
    pub fn phase(&mut self, name: &str) {
        let now = tokio::time::Instant::now();
        let duration = now - self.last;
        let elapsed = now - self.start;
        tracing::info!(
            target: "duet_test::timer",
            test = %self.test_name,
            phase = name,
            duration_ms = duration.as_millis() as u64,
            elapsed_ms = elapsed.as_millis() as u64,
            "phase complete"
        );
        self.phases.push((name.to_string(), duration));
        self.last = now;
    }
}

impl Drop for TestTimer {
    fn drop(&mut self) {
        let total = self.start.elapsed();
        tracing::info!(
            target: "duet_test::timer",
            test = %self.test_name,
            total_ms = total.as_millis() as u64,
            phase_count = self.phases.len(),
            "test timing summary"
        );
    }
}

/// Receive events until one satisfies `pred`, returning it.
///
/// Non-matching events are discarded. Returns `None` on timeout or when the
/// stream ends.
pub async fn wait_for_event<T, F>(
    rx: &mut mpsc::UnboundedReceiver<T>,
    timeout_secs: u64,
    mut pred: F,
) -> Option<T>
where
    F: FnMut(&T) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(timeout_secs);
    loop {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Some(event)) if pred(&event) => return Some(event),
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => return None,
        }
    }
}

/// Collect every event that arrives within `window`.
pub async fn collect_events<T>(rx: &mut mpsc::UnboundedReceiver<T>, window: Duration) -> Vec<T> {
    let deadline = tokio::time::Instant::now() + window;
    let mut events = Vec::new();
    while let Ok(Some(event)) = tokio::time::timeout_at(deadline, rx.recv()).await {
        events.push(event);
    }
    events
}

/// Poll `check` until it returns true or `timeout_secs` elapse.
pub async fn wait_until<F, Fut>(timeout_secs: u64, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(timeout_secs);
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
