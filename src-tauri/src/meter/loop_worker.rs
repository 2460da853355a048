use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use super::bridge::MeterBridge;
use super::session::{MeterSession, INITIAL_POLL_MS};
use crate::ui::view::MeterView;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

// Import the logging macros (exported at crate root)
use crate::log_info;

/// Polls the bridge until cancelled.
///
/// The next poll is armed only after the current cycle finished, with whatever delay the
/// cycle asked for, so cycles never overlap and a slow cycle simply pushes the schedule back.
pub async fn meter_loop(
    session: Arc<Mutex<MeterSession>>,
    mut bridge: Box<dyn MeterBridge>,
    mut view: Box<dyn MeterView>,
    cancel_token: CancellationToken,
) {
    let started = Instant::now();
    let mut delay = Duration::from_millis(INITIAL_POLL_MS);

    loop {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {
                let now_ms = started.elapsed().as_millis() as u64;
                let mut guard = session.lock().await;
                delay = guard.run_cycle(bridge.as_mut(), view.as_mut(), now_ms);
            }
            _ = cancel_token.cancelled() => {
                log_info!("meter loop shutting down");
                break;
            }
        }
    }
}
