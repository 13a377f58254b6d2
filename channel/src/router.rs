//! Dispatch table for the sync channel.
//!
//! DESIGN
//! ======
//! Two separate maps keyed by tag: a FIFO queue of one-shot request waiters
//! and a list of persistent subscribers. An inbound message resolves the
//! oldest live waiter for its tag when one is pending; only when no waiter
//! exists does it fan out to subscribers, in registration order. Consumption
//! by a waiter is exclusive: the reply is not replayed to same-tag
//! subscribers.
//!
//! The table is only ever touched between suspension points of the channel's
//! single dispatch task and its handle methods, guarded by a std mutex that
//! is never held across an await.

use std::collections::{HashMap, VecDeque};

use messages::Message;
use tokio::sync::{mpsc, oneshot};

/// Identifier handed out per subscriber registration, used to unregister.
pub(crate) type SubscriberId = u64;

/// Where [`Router::dispatch`] delivered a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Delivery {
    /// Resolved the oldest pending request waiter for the tag.
    Request,
    /// Fanned out to this many subscribers (possibly zero).
    Subscribers(usize),
}

pub(crate) struct Router {
    /// One-shot request waiters, oldest first, per tag.
    pending: HashMap<String, VecDeque<oneshot::Sender<Message>>>,
    /// Persistent push subscribers, in registration order, per tag.
    subscribers: HashMap<String, Vec<(SubscriberId, mpsc::UnboundedSender<Message>)>>,
    next_subscriber_id: SubscriberId,
    closed: bool,
}

impl Router {
    pub(crate) fn new() -> Self {
        Self {
            pending: HashMap::new(),
            subscribers: HashMap::new(),
            next_subscriber_id: 0,
            closed: false,
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    /// Tear the table down: fail in-flight requests and drop every
    /// subscriber registration.
    pub(crate) fn close(&mut self) {
        self.closed = true;
        self.fail_pending();
        self.subscribers.clear();
    }

    pub(crate) fn register_pending(&mut self, action: String, waiter: oneshot::Sender<Message>) {
        self.pending.entry(action).or_default().push_back(waiter);
    }

    /// Drop every pending waiter. The receiving halves observe this as a
    /// connection-closed rejection.
    pub(crate) fn fail_pending(&mut self) {
        self.pending.clear();
    }

    pub(crate) fn subscribe(
        &mut self,
        action: String,
    ) -> (SubscriberId, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_subscriber_id;
        self.next_subscriber_id += 1;
        if !self.closed {
            self.subscribers.entry(action).or_default().push((id, tx));
        }
        (id, rx)
    }

    pub(crate) fn unsubscribe(&mut self, action: &str, id: SubscriberId) {
        let mut now_empty = false;
        if let Some(subs) = self.subscribers.get_mut(action) {
            subs.retain(|(sub_id, _)| *sub_id != id);
            now_empty = subs.is_empty();
        }
        if now_empty {
            self.subscribers.remove(action);
        }
    }

    /// Route one inbound message by its tag.
    pub(crate) fn dispatch(&mut self, message: Message) -> Delivery {
        if self.resolve_pending(&message) {
            return Delivery::Request;
        }

        let mut delivered = 0;
        let mut now_empty = false;
        if let Some(subs) = self.subscribers.get_mut(&message.action) {
            subs.retain(|(_, tx)| !tx.is_closed());
            for (_, tx) in subs.iter() {
                if tx.send(message.clone()).is_ok() {
                    delivered += 1;
                }
            }
            now_empty = subs.is_empty();
        }
        if now_empty {
            self.subscribers.remove(&message.action);
        }
        Delivery::Subscribers(delivered)
    }

    /// Hand the message to the oldest waiter still listening, if any.
    fn resolve_pending(&mut self, message: &Message) -> bool {
        let Some(queue) = self.pending.get_mut(&message.action) else {
            return false;
        };
        let mut resolved = false;
        while let Some(waiter) = queue.pop_front() {
            // A waiter whose future was dropped is skipped, not counted.
            if waiter.send(message.clone()).is_ok() {
                resolved = true;
                break;
            }
        }
        if queue.is_empty() {
            self.pending.remove(&message.action);
        }
        resolved
    }
}

#[cfg(test)]
#[path = "router_test.rs"]
mod tests;
