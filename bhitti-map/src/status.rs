//! User-visible status signaling.
//!
//! The pipeline reports transient conditions (no tracking, no pose, waiting
//! for the first depth frame) and persistence failures through a
//! [`StatusSink`]. A [`StatusBoard`] sits in front of the sink and forwards
//! only transitions, so a condition that persists for many frames is shown
//! once.

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use parking_lot::Mutex;

/// Capacity of the status event channel
const STATUS_CHANNEL_CAPACITY: usize = 64;

/// Number of distinct status messages
const STATUS_COUNT: usize = 5;

/// A user-visible status condition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatusMessage {
    /// Tracking is running but no depth frame has been processed yet
    WaitingForDepth,
    /// Tracking is paused or lost
    NoTracking,
    /// Tracking is running but no pose is available
    NoPose,
    /// A saved map could not be loaded
    MapLoadFailed,
    /// A map could not be saved
    MapSaveFailed,
}

impl StatusMessage {
    /// All messages
    pub const ALL: [StatusMessage; STATUS_COUNT] = [
        StatusMessage::WaitingForDepth,
        StatusMessage::NoTracking,
        StatusMessage::NoPose,
        StatusMessage::MapLoadFailed,
        StatusMessage::MapSaveFailed,
    ];

    /// Human-readable text
    pub fn text(&self) -> &'static str {
        match self {
            StatusMessage::WaitingForDepth => "Waiting for depth data",
            StatusMessage::NoTracking => "Tracking lost, move the device slowly",
            StatusMessage::NoPose => "Camera pose unavailable",
            StatusMessage::MapLoadFailed => "Saved map could not be loaded",
            StatusMessage::MapSaveFailed => "Map could not be saved",
        }
    }

    fn index(self) -> usize {
        match self {
            StatusMessage::WaitingForDepth => 0,
            StatusMessage::NoTracking => 1,
            StatusMessage::NoPose => 2,
            StatusMessage::MapLoadFailed => 3,
            StatusMessage::MapSaveFailed => 4,
        }
    }
}

impl std::fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.text())
    }
}

/// Status change forwarded over a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusEvent {
    /// Message became visible
    Show(StatusMessage),
    /// Message was dismissed
    Hide(StatusMessage),
}

/// Receiver of status changes (the UI collaborator).
pub trait StatusSink: Send + Sync {
    /// Display a message
    fn show(&self, message: StatusMessage);
    /// Dismiss a message
    fn hide(&self, message: StatusMessage);
}

/// Logs status changes.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStatusSink;

impl StatusSink for LogStatusSink {
    fn show(&self, message: StatusMessage) {
        match message {
            StatusMessage::MapLoadFailed | StatusMessage::MapSaveFailed => {
                log::warn!("Status: {}", message)
            }
            _ => log::info!("Status: {}", message),
        }
    }

    fn hide(&self, message: StatusMessage) {
        log::debug!("Status cleared: {}", message);
    }
}

/// Discards status changes.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStatusSink;

impl StatusSink for NullStatusSink {
    fn show(&self, _message: StatusMessage) {}
    fn hide(&self, _message: StatusMessage) {}
}

/// Forwards status changes as [`StatusEvent`]s.
///
/// Never blocks: when the receiver falls behind, new events are dropped.
#[derive(Debug, Clone)]
pub struct ChannelStatusSink {
    tx: Sender<StatusEvent>,
}

impl ChannelStatusSink {
    /// Create a sink and the receiving end for the UI
    pub fn new() -> (Self, Receiver<StatusEvent>) {
        let (tx, rx) = bounded(STATUS_CHANNEL_CAPACITY);
        (Self { tx }, rx)
    }

    fn send(&self, event: StatusEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => log::debug!("Status channel full, dropped {:?}", event),
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

impl StatusSink for ChannelStatusSink {
    fn show(&self, message: StatusMessage) {
        self.send(StatusEvent::Show(message));
    }

    fn hide(&self, message: StatusMessage) {
        self.send(StatusEvent::Hide(message));
    }
}

/// Tracks which messages are visible and forwards only changes.
pub struct StatusBoard {
    sink: Box<dyn StatusSink>,
    visible: Mutex<[bool; STATUS_COUNT]>,
}

impl StatusBoard {
    /// Wrap a sink
    pub fn new(sink: Box<dyn StatusSink>) -> Self {
        Self {
            sink,
            visible: Mutex::new([false; STATUS_COUNT]),
        }
    }

    /// Show a message unless it is already visible
    pub fn show(&self, message: StatusMessage) {
        let mut visible = self.visible.lock();
        if !visible[message.index()] {
            visible[message.index()] = true;
            self.sink.show(message);
        }
    }

    /// Hide a message if it is visible
    pub fn hide(&self, message: StatusMessage) {
        let mut visible = self.visible.lock();
        if visible[message.index()] {
            visible[message.index()] = false;
            self.sink.hide(message);
        }
    }

    /// True if the message is currently shown
    pub fn is_visible(&self, message: StatusMessage) -> bool {
        self.visible.lock()[message.index()]
    }
}

impl std::fmt::Debug for StatusBoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let visible: Vec<StatusMessage> = StatusMessage::ALL
            .into_iter()
            .filter(|m| self.is_visible(*m))
            .collect();
        f.debug_struct("StatusBoard").field("visible", &visible).finish()
    }
}
