//! Single-slot observable
//!
//! Holds the latest value and fans every published value out to its
//! subscribers over unbounded channels, in publish order. A new subscriber
//! receives the current value first, so late subscribers never miss state.

use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;

pub struct Observable<T> {
    slot: Mutex<Slot<T>>,
}

struct Slot<T> {
    value: T,
    subscribers: Vec<mpsc::UnboundedSender<T>>,
    closed: bool,
}

impl<T: Clone> Observable<T> {
    pub fn new(value: T) -> Self {
        Self {
            slot: Mutex::new(Slot {
                value,
                subscribers: Vec::new(),
                closed: false,
            }),
        }
    }

    pub fn current(&self) -> T {
        self.slot.lock().value.clone()
    }

    /// Inspect the current value without cloning it
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.slot.lock().value)
    }

    /// Replace the value and notify every live subscriber
    ///
    /// Returns false once the observable is closed; the value is then left
    /// untouched.
    pub fn publish(&self, value: T) -> bool {
        self.update(|_| value)
    }

    /// Derive the next value from the current one and publish it
    pub fn update(&self, next: impl FnOnce(&T) -> T) -> bool {
        self.update_if(|value| Some(next(value)))
    }

    /// Like [`Observable::update`], but `next` may decline by returning `None`
    pub fn update_if(&self, next: impl FnOnce(&T) -> Option<T>) -> bool {
        let mut slot = self.slot.lock();
        if slot.closed {
            return false;
        }
        let Some(value) = next(&slot.value) else {
            return false;
        };
        slot.subscribers.retain(|tx| tx.send(value.clone()).is_ok());
        slot.value = value;
        true
    }

    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut slot = self.slot.lock();
        if !slot.closed && tx.send(slot.value.clone()).is_ok() {
            slot.subscribers.push(tx);
        }
        Subscription { rx }
    }

    /// Number of subscribers that have not been dropped yet
    pub fn subscriber_count(&self) -> usize {
        let mut slot = self.slot.lock();
        slot.subscribers.retain(|tx| !tx.is_closed());
        slot.subscribers.len()
    }

    /// Stop publishing and end every subscription stream
    pub fn close(&self) {
        let mut slot = self.slot.lock();
        slot.closed = true;
        slot.subscribers.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.slot.lock().closed
    }
}

/// Receiving end of an [`Observable`]; dropping it unsubscribes
#[derive(Debug)]
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> Subscription<T> {
    /// Wait for the next published value; `None` once the observable closed
    pub async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    pub fn try_next(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Everything published since the last read, oldest first
    pub fn drain(&mut self) -> Vec<T> {
        std::iter::from_fn(|| self.rx.try_recv().ok()).collect()
    }

    pub fn unsubscribe(mut self) {
        self.rx.close();
    }
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_current_value() {
        let observable = Observable::new(1);
        assert_eq!(observable.current(), 1);
        observable.publish(2);
        assert_eq!(observable.current(), 2);
    }

    #[test]
    fn test_late_subscriber_sees_current_value() {
        let observable = Observable::new("a");
        observable.publish("b");
        let mut subscription = observable.subscribe();
        assert_eq!(subscription.try_next(), Some("b"));
        assert_eq!(subscription.try_next(), None);
    }

    #[test]
    fn test_every_value_is_delivered_in_order() {
        let observable = Observable::new(0);
        let mut subscription = observable.subscribe();
        for value in 1..=3 {
            observable.publish(value);
        }
        observable.update(|value| value * 10);
        assert_eq!(subscription.drain(), vec![0, 1, 2, 3, 30]);
    }

    #[test]
    fn test_update_if_can_decline() {
        let observable = Observable::new(5);
        let mut subscription = observable.subscribe();
        assert!(!observable.update_if(|_| None));
        assert!(observable.update_if(|value| Some(value + 1)));
        assert_eq!(observable.read(|value| *value), 6);
        assert_eq!(subscription.drain(), vec![5, 6]);
    }

    #[test]
    fn test_dropped_subscription_is_pruned() {
        let observable = Observable::new(0);
        let first = observable.subscribe();
        let _second = observable.subscribe();
        assert_eq!(observable.subscriber_count(), 2);

        first.unsubscribe();
        observable.publish(1);
        assert_eq!(observable.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_close_ends_streams_and_rejects_publish() {
        let observable = Observable::new(0);
        let subscription = observable.subscribe();

        observable.close();
        assert!(!observable.publish(1));
        assert_eq!(observable.current(), 0);

        let values: Vec<_> = subscription.collect().await;
        assert_eq!(values, vec![0]);
        assert!(observable.is_closed());
    }
}
