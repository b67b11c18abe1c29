//! [`Subscription`], an owned handle on a push stream from a backend.
//!
//! Backends push values from a producer task into an mpsc channel. Dropping
//! the handle (or calling [`Subscription::unsubscribe`]) closes the channel
//! and aborts the producer, so holding a `Subscription` is the only thing that
//! keeps a live query running.

use tokio::{
  sync::mpsc,
  task::{AbortHandle, JoinHandle},
};

/// Buffer size for subscription channels.
pub const DEFAULT_SUBSCRIPTION_BUFFER: usize = 32;

#[derive(Debug)]
pub struct Subscription<T> {
  rx:       mpsc::Receiver<T>,
  producer: Option<AbortHandle>,
}

impl<T> Subscription<T> {
  pub fn new(rx: mpsc::Receiver<T>) -> Self { Self { rx, producer: None } }

  /// Tie the lifetime of a producer task to this handle.
  pub fn with_producer(mut self, producer: &JoinHandle<()>) -> Self {
    self.producer = Some(producer.abort_handle());
    self
  }

  /// Wait for the next pushed value. `None` means the producer has gone away
  /// and nothing further will arrive.
  pub async fn next(&mut self) -> Option<T> { self.rx.recv().await }

  /// Stop the stream. Equivalent to dropping the handle.
  pub fn unsubscribe(self) {}
}

impl<T> Drop for Subscription<T> {
  fn drop(&mut self) {
    self.rx.close();
    if let Some(producer) = self.producer.take() {
      producer.abort();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn delivers_in_order_then_ends() {
    let (tx, rx) = mpsc::channel(4);
    let mut sub = Subscription::new(rx);
    tx.send(1).await.unwrap();
    tx.send(2).await.unwrap();
    drop(tx);
    assert_eq!(sub.next().await, Some(1));
    assert_eq!(sub.next().await, Some(2));
    assert_eq!(sub.next().await, None);
  }

  #[tokio::test]
  async fn dropping_aborts_producer() {
    let (tx, rx) = mpsc::channel::<u32>(1);
    let producer = tokio::spawn(async move {
      let mut n = 0;
      while tx.send(n).await.is_ok() {
        n += 1;
      }
    });
    let sub = Subscription::new(rx).with_producer(&producer);
    sub.unsubscribe();
    let joined = producer.await;
    assert!(joined.is_ok() || joined.unwrap_err().is_cancelled());
  }
}
