// factory-pipeline/src/channel.rs
//
// Many producers, one consumer. Each sender keeps its own order; events
// from different lanes interleave in arrival order.
use crate::event::Event;
use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("event channel closed: dispatcher is gone")]
pub struct ChannelClosed;

/// Result of a non-blocking pull.
#[derive(Debug)]
pub enum Pulled {
    Event(Event),
    Empty,
    /// No event pending and every sender has been dropped.
    Closed,
}

pub fn event_channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = unbounded();
    (
        EventSender { tx },
        EventReceiver {
            rx,
            pulled: 0,
            acked: 0,
        },
    )
}

#[derive(Clone)]
pub struct EventSender {
    tx: Sender<Event>,
}

impl EventSender {
    /// Enqueue without blocking. Fails only once the receiver is dropped.
    pub fn push(&self, event: Event) -> Result<(), ChannelClosed> {
        self.tx.send(event).map_err(|_| ChannelClosed)
    }
}

pub struct EventReceiver {
    rx: Receiver<Event>,
    pulled: u64,
    acked: u64,
}

impl EventReceiver {
    pub fn try_pull(&mut self) -> Pulled {
        match self.rx.try_recv() {
            Ok(event) => {
                self.pulled += 1;
                Pulled::Event(event)
            }
            Err(TryRecvError::Empty) => Pulled::Empty,
            Err(TryRecvError::Disconnected) => Pulled::Closed,
        }
    }

    /// Mark the most recently pulled event as handled.
    pub fn ack(&mut self) {
        if self.acked < self.pulled {
            self.acked += 1;
        }
    }

    /// Pulled but not yet acknowledged.
    pub fn unacked(&self) -> u64 {
        self.pulled - self.acked
    }

    /// Events still waiting in the queue.
    pub fn queued(&self) -> usize {
        self.rx.len()
    }
}
