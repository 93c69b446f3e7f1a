//! JSON-lines event input.
//!
//! One event per line:
//!
//! ```text
//! {"kind": "stress", "intensity": 0.8, "impact": {"energy": -5.0, "tension": 0.2}}
//! ```
//!
//! `intensity` defaults to 0.5, `impact` to empty, and `id` and `timestamp`
//! are assigned on arrival. Malformed lines are logged and skipped.

use anima_policies::EventSender;
use anima_types::Event;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub accepted: u64,
    pub rejected: u64,
}

/// Parse one input line. Blank lines and `#` comments yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<Event>, serde_json::Error> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(line).map(Some)
}

/// Forward events from `reader` until end of input or until the runtime
/// side of the channel is gone.
pub async fn feed_events<R>(reader: R, sender: EventSender) -> FeedStats
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = FeedStats::default();
    let mut lines = reader.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Event input failed");
                break;
            }
        };
        match parse_line(&line) {
            Ok(Some(event)) => {
                debug!(kind = %event.kind, "Queued event");
                if !sender.send(event) {
                    debug!("Runtime no longer accepting events");
                    break;
                }
                stats.accepted += 1;
            }
            Ok(None) => {}
            Err(e) => {
                stats.rejected += 1;
                warn!(error = %e, "Skipping malformed event line");
            }
        }
    }
    info!(
        accepted = stats.accepted,
        rejected = stats.rejected,
        "Event input closed"
    );
    stats
}
