//! Dispatch engine for sagip.
//!
//! [`Dispatcher`] turns a requester's alert into an `EmergencyRequest`, runs
//! one session task per request, and exposes each request's live
//! [`DispatchView`]. It is written against the `sagip-core` traits only.

mod coordinator;
pub mod error;
mod reconcile;
pub mod view;

use std::{
  collections::HashMap,
  sync::Arc,
  time::Duration,
};

use sagip_core::{
  directory::{EmergencyStore, LocationSource, OpenOutcome},
  emergency::{EmergencyKind, EmergencyRequest, NewEmergency},
};
use tokio::{
  sync::{Mutex, watch},
  task::JoinHandle,
};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

pub use self::{
  error::{ActivateError, BoxError, Result},
  view::{CancelReason, DispatchView},
};
use self::coordinator::{Session, cancel_emergency, release_responder, settle_emergency};

/// Tunables for the dispatch engine.
#[derive(Debug, Clone, Default)]
pub struct DispatchConfig {
  /// Cancel a request that has been `searching` this long. `None` searches
  /// until the requester cancels.
  pub max_search: Option<Duration>,
}

struct SessionHandle {
  emergency_id: Uuid,
  stop:         watch::Sender<bool>,
  view:         watch::Receiver<DispatchView>,
  task:         JoinHandle<()>,
}

impl SessionHandle {
  fn is_running(&self) -> bool { !self.task.is_finished() }
}

pub struct Dispatcher<S> {
  store:    Arc<S>,
  config:   DispatchConfig,
  /// Keyed by requester.
  sessions: Mutex<HashMap<Uuid, SessionHandle>>,
}

impl<S: EmergencyStore + 'static> Dispatcher<S> {
  pub fn new(store: Arc<S>, config: DispatchConfig) -> Self {
    Self { store, config, sessions: Mutex::new(HashMap::new()) }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  // ─── Requester operations ───────────────────────────────────────────────

  /// Raise an alert for `requester_id`.
  ///
  /// A requester with a non-terminal request gets that request back, and its
  /// session is restarted if none is running; the location is not captured
  /// again. Otherwise the location is captured once, a `searching` request is
  /// written, and a session starts searching for it.
  #[instrument(skip(self, locator))]
  pub async fn activate<L: LocationSource>(
    &self,
    requester_id: Option<Uuid>,
    kind: EmergencyKind,
    locator: &L,
  ) -> Result<EmergencyRequest> {
    let requester_id = requester_id.ok_or(ActivateError::NotAuthenticated)?;

    if let Some(existing) =
      self.store.active_emergency_for(requester_id).await.map_err(ActivateError::store)?
    {
      debug!(emergency_id = %existing.emergency_id, "reusing active emergency");
      self.ensure_session(existing.clone()).await;
      return Ok(existing);
    }

    let origin = locator.current_location().await?;
    let outcome = self
      .store
      .open_emergency(NewEmergency { requester_id, kind, origin })
      .await
      .map_err(ActivateError::store)?;
    let emergency = match outcome {
      OpenOutcome::Opened(emergency) => {
        info!(emergency_id = %emergency.emergency_id, "emergency opened");
        emergency
      }
      OpenOutcome::Existing(emergency) => emergency,
    };

    self.ensure_session(emergency.clone()).await;
    Ok(emergency)
  }

  /// Cancel the requester's active request, if any.
  ///
  /// Idempotent. Once this returns the request is archived as `cancelled`,
  /// any responder it held is available again, and its subscriptions are
  /// closed. Failures are logged rather than returned.
  #[instrument(skip(self))]
  pub async fn cancel(&self, requester_id: Uuid) {
    let handle = self.sessions.lock().await.remove(&requester_id);
    if let Some(handle) = handle {
      handle.stop.send_replace(true);
      if let Err(e) = handle.task.await {
        error!(error = %e, "dispatch session failed");
      }
    }

    // A request with no running session is torn down here.
    match self.store.active_emergency_for(requester_id).await {
      Ok(Some(active)) => {
        if let Some(closed) = cancel_emergency(&*self.store, active.emergency_id).await {
          settle_emergency(&*self.store, &closed).await;
        }
      }
      Ok(None) => {}
      Err(e) => error!(error = %e, "could not look up active emergency"),
    }
  }

  /// Live view of the requester's latest request. The receiver keeps its
  /// final value after the session ends.
  pub async fn watch(&self, requester_id: Uuid) -> Option<watch::Receiver<DispatchView>> {
    self.sessions.lock().await.get(&requester_id).map(|h| h.view.clone())
  }

  /// Snapshot of the requester's latest request: the session's view when
  /// there is one, otherwise whatever active record the store holds.
  pub async fn view(&self, requester_id: Uuid) -> Result<Option<DispatchView>, BoxError> {
    if let Some(rx) = self.watch(requester_id).await {
      return Ok(Some(rx.borrow().clone()));
    }
    let active = self.store.active_emergency_for(requester_id).await?;
    Ok(active.map(|e| DispatchView::new(&e, None)))
  }

  // ─── Lifecycle ──────────────────────────────────────────────────────────

  /// Restart a session for every non-terminal request in the store. Call
  /// once at startup. Returns the number of sessions started.
  ///
  /// Responders whose claim no active request backs are freed first: the
  /// request is gone, or it never got to name the responder because the
  /// process stopped mid-commit.
  pub async fn resume_all(&self) -> Result<usize, BoxError> {
    let active = self.store.list_active_emergencies().await?;
    let holders: HashMap<Uuid, Option<Uuid>> =
      active.iter().map(|e| (e.emergency_id, e.responder_id)).collect();

    for responder in self.store.list_responders(None).await? {
      let Some(emergency_id) = responder.assigned_emergency else { continue };
      if holders.get(&emergency_id) != Some(&Some(responder.responder_id)) {
        warn!(responder_id = %responder.responder_id, %emergency_id, "freeing orphaned claim");
        release_responder(&*self.store, responder.responder_id, emergency_id).await;
      }
    }

    let resumed = active.len();
    for emergency in active {
      self.ensure_session(emergency).await;
    }
    info!(resumed, "dispatch sessions resumed");
    Ok(resumed)
  }

  /// Stop every session without touching its request, so the next
  /// [`Self::resume_all`] picks them up again.
  pub async fn shutdown(&self) {
    let handles: Vec<_> = self.sessions.lock().await.drain().map(|(_, h)| h).collect();
    for handle in handles {
      drop(handle.stop);
      if let Err(e) = handle.task.await {
        error!(error = %e, "dispatch session failed");
      }
    }
  }

  // ─── Internals ──────────────────────────────────────────────────────────

  /// Start a session for `emergency` unless one is already running. Handles
  /// of finished sessions are dropped here, so their final views stay
  /// readable only until the next session starts.
  async fn ensure_session(&self, emergency: EmergencyRequest) {
    let mut sessions = self.sessions.lock().await;
    let running = sessions
      .get(&emergency.requester_id)
      .is_some_and(|h| h.emergency_id == emergency.emergency_id && h.is_running());
    if running {
      return;
    }
    sessions.retain(|_, h| h.is_running());

    let requester_id = emergency.requester_id;
    let handle = self.spawn_session(emergency);
    // Dropping a replaced handle detaches its session.
    sessions.insert(requester_id, handle);
  }

  fn spawn_session(&self, emergency: EmergencyRequest) -> SessionHandle {
    let (stop_tx, stop_rx) = watch::channel(false);
    let (view_tx, view_rx) = watch::channel(DispatchView::new(&emergency, None));
    let emergency_id = emergency.emergency_id;

    let session = Session {
      store: self.store.clone(),
      emergency,
      responder: None,
      view: view_tx,
      stop: stop_rx,
      max_search: self.config.max_search,
    };
    let task = tokio::spawn(session.run());

    SessionHandle { emergency_id, stop: stop_tx, view: view_rx, task }
  }
}
