/// file: src/events.rs
/// description: event system to decouple the channel driver from UI presentation
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Connecting {
        key: String,
        target: String,
        attempt: u32,
    },
    Connected {
        key: String,
        instance_id: String,
    },
    Updated {
        key: String,
        facets: usize,
    },
    ServerError {
        key: String,
        message: String,
    },
    MalformedFrame {
        key: String,
        reason: String,
    },
    ConnectionLost {
        key: String,
        reason: String,
    },
    Reconnecting {
        key: String,
        attempt: u32,
        delay_ms: u64,
    },
    Failed {
        key: String,
        attempts: u32,
    },
    TornDown {
        key: String,
    },
}

// Bounded so a stalled UI cannot grow memory; the driver drops events
// instead of waiting when the buffer is full.
const EVENT_CHANNEL_CAPACITY: usize = 1_024;

pub type EventSender = mpsc::Sender<ChannelEvent>;
pub type EventReceiver = mpsc::Receiver<ChannelEvent>;

pub fn create_event_channel() -> (EventSender, EventReceiver) {
    mpsc::channel(EVENT_CHANNEL_CAPACITY)
}
