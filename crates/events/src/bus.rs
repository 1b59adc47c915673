//! Event publishing/subscription abstraction (mechanics only).
//!
//! - **Best effort**: a failed publish never undoes the work the event describes.
//! - **Broadcast**: each subscription receives a copy of every message published after
//!   it subscribed.
//! - **No persistence**: the relational store is the source of truth; the bus is for
//!   distribution only.

use std::sync::Arc;
use std::sync::mpsc::Receiver;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// Internal lock poisoning.
    #[error("event bus poisoned")]
    Poisoned,

    #[error("event bus unavailable: {0}")]
    Unavailable(String),
}

/// A subscription to an event stream.
///
/// Designed for single-threaded consumption.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Drain every message currently queued.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}

/// Domain-agnostic event bus (pub/sub abstraction).
///
/// Object safe, so the pipeline can hold an `Arc<dyn EventBus<M>>`.
pub trait EventBus<M>: Send + Sync {
    fn publish(&self, message: M) -> Result<(), BusError>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    fn publish(&self, message: M) -> Result<(), BusError> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
