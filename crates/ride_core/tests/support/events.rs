use std::time::Duration;

use ride_core::session::SessionEvent;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;

/// Upper bound on how long a test waits for a single event.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Wait for the first event `select` maps to `Some`, skipping the rest.
///
/// # Panics
///
/// Panics if the session closes or nothing matches within [`EVENT_TIMEOUT`].
pub async fn wait_for<T, F>(events: &mut Receiver<SessionEvent>, mut select: F) -> T
where
    F: FnMut(SessionEvent) -> Option<T>,
{
    let waiting = async {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(found) = select(event) {
                        return found;
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => panic!("session closed while waiting for an event"),
            }
        }
    };
    tokio::time::timeout(EVENT_TIMEOUT, waiting)
        .await
        .expect("expected event did not arrive")
}

/// Everything already delivered to `events`, without waiting.
pub fn drain(events: &mut Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut drained = Vec::new();
    loop {
        match events.try_recv() {
            Ok(event) => drained.push(event),
            Err(tokio::sync::broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => return drained,
        }
    }
}

/// Poll `condition` until it holds.
///
/// # Panics
///
/// Panics if it still fails after [`EVENT_TIMEOUT`].
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let polling = async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(EVENT_TIMEOUT, polling)
        .await
        .expect("condition never held");
}
