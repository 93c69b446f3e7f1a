//! Channel-backed event source.

use anima_runtime::EventSource;
use anima_types::Event;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tracing::debug;

/// Producer half. Cheap to clone; usable from async tasks and plain threads.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: UnboundedSender<Event>,
}

impl EventSender {
    /// Queue an event. Returns `false` once the runtime side is gone.
    pub fn send(&self, event: Event) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half, drained by the tick loop without blocking.
#[derive(Debug)]
pub struct ChannelEventSource {
    rx: UnboundedReceiver<Event>,
    disconnected: bool,
}

impl ChannelEventSource {
    /// All senders have been dropped and the queue is empty.
    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }
}

/// Create a connected sender/source pair.
pub fn channel() -> (EventSender, ChannelEventSource) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        EventSender { tx },
        ChannelEventSource {
            rx,
            disconnected: false,
        },
    )
}

impl EventSource for ChannelEventSource {
    fn drain(&mut self, limit: usize) -> Vec<Event> {
        let mut events = Vec::new();
        while events.len() < limit {
            match self.rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.disconnected {
                        debug!("All event senders dropped");
                        self.disconnected = true;
                    }
                    break;
                }
            }
        }
        events
    }
}
