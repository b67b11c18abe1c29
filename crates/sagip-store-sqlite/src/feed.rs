//! In-process change notifications and the live queries built on them.
//!
//! SQLite has no push channel of its own, so every write made through
//! [`crate::SqliteStore`] announces what it touched on a broadcast bus. A live
//! query listens to that bus, re-runs its `SELECT` when something relevant
//! changed, and pushes the result only if it differs from the last push.

use std::future::Future;

use sagip_core::subscription::{DEFAULT_SUBSCRIPTION_BUFFER, Subscription};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::Result;

/// Capacity of the change bus. A lagging listener simply re-queries.
pub const CHANGE_BUS_CAPACITY: usize = 256;

/// What a write touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
  Responder(Uuid),
  Emergency(Uuid),
}

/// Spawn a producer that pushes `initial`, then a fresh `query()` result after
/// every relevant change, skipping results equal to the previous push.
///
/// `changes` must be subscribed before `initial` was read so that no write
/// can slip between the two.
pub fn spawn_live_query<T, R, Q, Fut>(
  label: &'static str,
  mut changes: broadcast::Receiver<Change>,
  initial: T,
  relevant: R,
  query: Q,
) -> Subscription<T>
where
  T: Clone + PartialEq + Send + 'static,
  R: Fn(&Change) -> bool + Send + 'static,
  Q: Fn() -> Fut + Send + 'static,
  Fut: Future<Output = Result<T>> + Send,
{
  let (tx, rx) = mpsc::channel(DEFAULT_SUBSCRIPTION_BUFFER);

  let producer = tokio::spawn(async move {
    let mut last = initial;
    if tx.send(last.clone()).await.is_err() {
      return;
    }

    loop {
      match changes.recv().await {
        Ok(change) if relevant(&change) => {}
        Ok(_) => continue,
        Err(broadcast::error::RecvError::Lagged(missed)) => {
          debug!(query = label, missed, "change bus lagged, re-querying");
        }
        Err(broadcast::error::RecvError::Closed) => break,
      }

      match query().await {
        Ok(value) if value == last => {}
        Ok(value) => {
          last = value.clone();
          if tx.send(value).await.is_err() {
            break;
          }
        }
        Err(e) => {
          warn!(query = label, error = %e, "live query failed, closing subscription");
          break;
        }
      }
    }
  });

  Subscription::new(rx).with_producer(&producer)
}
