//! One task per active emergency.
//!
//! A [`Session`] searches while the request is `searching`, commits the
//! nearest candidate, hands over to reconciliation once `assigned`, and tears
//! the request down when it is cancelled, times out, or is completed.
//!
//! Commit order matters. The responder is claimed first and the request is
//! flipped to `assigned` second, both with conditional writes. If the second
//! write finds the request no longer `searching`, the claim is given back.
//! A request therefore never names a responder it does not hold. A commit
//! that fails outright gives the claim back and the search starts over from
//! a fresh subscription.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use sagip_core::{
  directory::{ClaimOutcome, EmergencyStore},
  emergency::{EmergencyRequest, EmergencyStatus},
  responder::ResponderSummary,
  selector::{CandidateResult, select_nearest},
};
use tokio::{sync::watch, time::Instant};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::{
  error::CommitError,
  reconcile::ReconcileEnd,
  view::{CancelReason, DispatchView},
};

/// Pause before searching again after a failed commit.
const COMMIT_RETRY_DELAY: Duration = Duration::from_millis(250);

/// How a search phase ended.
enum SearchEnd {
  Assigned,
  Stopped,
  TimedOut,
  /// The request left `searching` without this session's help.
  Superseded,
  /// The session can no longer drive the request; leave it as it is.
  Detached,
}

pub(crate) struct Session<S> {
  pub(crate) store:      Arc<S>,
  pub(crate) emergency:  EmergencyRequest,
  pub(crate) responder:  Option<ResponderSummary>,
  pub(crate) view:       watch::Sender<DispatchView>,
  pub(crate) stop:       watch::Receiver<bool>,
  pub(crate) max_search: Option<Duration>,
}

impl<S: EmergencyStore + 'static> Session<S> {
  #[instrument(
    name = "dispatch",
    skip_all,
    fields(emergency_id = %self.emergency.emergency_id, kind = %self.emergency.kind)
  )]
  pub(crate) async fn run(mut self) {
    if self.emergency.status == EmergencyStatus::Searching {
      match self.search().await {
        SearchEnd::Assigned => {}
        SearchEnd::Stopped => {
          self.close(CancelReason::Requester).await;
          return;
        }
        SearchEnd::TimedOut => {
          warn!("no responder found within the search window");
          self.close(CancelReason::SearchTimeout).await;
          return;
        }
        SearchEnd::Superseded => {
          self.settle_if_terminal().await;
          return;
        }
        SearchEnd::Detached => return,
      }
    }

    if self.emergency.status != EmergencyStatus::Assigned {
      return;
    }
    if self.responder.is_none() {
      self.load_responder().await;
    }

    match self.reconcile().await {
      ReconcileEnd::Stopped => self.close(CancelReason::Requester).await,
      ReconcileEnd::Settled(record) => self.settle(record, None).await,
      ReconcileEnd::Detached => {}
    }
  }

  // ─── Search ─────────────────────────────────────────────────────────────

  async fn search(&mut self) -> SearchEnd {
    let deadline = self.search_deadline();
    let timeout = async move {
      match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
      }
    };
    tokio::pin!(timeout);

    info!("searching for a responder");
    loop {
      let mut candidates =
        match self.store.subscribe_available_responders(self.emergency.kind).await {
          Ok(sub) => sub,
          Err(e) => {
            error!(error = %e, "could not subscribe to available responders");
            return SearchEnd::Detached;
          }
        };

      loop {
        tokio::select! {
          biased;

          stop = stop_requested(&mut self.stop) => {
            return if stop { SearchEnd::Stopped } else { SearchEnd::Detached };
          }
          _ = &mut timeout => return SearchEnd::TimedOut,
          snapshot = candidates.next() => {
            let Some(snapshot) = snapshot else {
              warn!("candidate subscription closed");
              return SearchEnd::Detached;
            };
            let Some(candidate) = select_nearest(&snapshot, self.emergency.origin) else {
              debug!("no available responders");
              continue;
            };
            match self.commit(candidate).await {
              Ok(true) => return SearchEnd::Assigned,
              Ok(false) => {
                info!("emergency stopped searching before the commit landed");
                return SearchEnd::Superseded;
              }
              Err(e @ CommitError::ClaimConflict(_)) => {
                debug!(error = %e, "waiting for next snapshot");
              }
              Err(e) => {
                warn!(error = %e, "commit failed, retrying");
                break;
              }
            }
          }
        }
      }

      // The snapshot that failed may never be pushed again, so start over
      // from a fresh subscription.
      drop(candidates);
      tokio::select! {
        biased;

        stop = stop_requested(&mut self.stop) => {
          return if stop { SearchEnd::Stopped } else { SearchEnd::Detached };
        }
        _ = &mut timeout => return SearchEnd::TimedOut,
        _ = tokio::time::sleep(COMMIT_RETRY_DELAY) => {}
      }
    }
  }

  /// The search window is measured from `created_at`, so a resumed search
  /// does not start a fresh window. A window too large to represent means
  /// no deadline.
  fn search_deadline(&self) -> Option<Instant> {
    let window = self.max_search?;
    let elapsed = (Utc::now() - self.emergency.created_at).to_std().unwrap_or_default();
    Instant::now().checked_add(window.saturating_sub(elapsed))
  }

  /// Returns `Ok(false)` when the request was no longer `searching`.
  async fn commit(&mut self, candidate: CandidateResult) -> Result<bool, CommitError> {
    let emergency_id = self.emergency.emergency_id;
    let responder_id = candidate.responder.responder_id;

    let claim = self
      .store
      .try_claim_responder(responder_id, emergency_id)
      .await
      .map_err(persistence)?;
    if claim == ClaimOutcome::AlreadyClaimed {
      return Err(CommitError::ClaimConflict(responder_id));
    }

    match self.store.mark_assigned(emergency_id, responder_id, candidate.distance_km).await {
      Ok(Some(assigned)) => {
        self.assigned(assigned, &candidate);
        Ok(true)
      }
      Ok(None) => {
        release_responder(&*self.store, responder_id, emergency_id).await;
        Ok(false)
      }
      Err(e) => {
        // The write can land even though the call failed.
        if let Ok(Some(record)) = self.store.get_emergency(emergency_id).await
          && record.status == EmergencyStatus::Assigned
          && record.responder_id == Some(responder_id)
        {
          warn!(error = %e, "assignment reported a failure but was written");
          self.assigned(record, &candidate);
          return Ok(true);
        }
        release_responder(&*self.store, responder_id, emergency_id).await;
        Err(persistence(e))
      }
    }
  }

  fn assigned(&mut self, record: EmergencyRequest, candidate: &CandidateResult) {
    info!(
      responder_id = %candidate.responder.responder_id,
      distance_km = candidate.distance_km,
      estimated = candidate.estimated,
      "responder assigned"
    );
    self.emergency = record;
    self.responder = Some(ResponderSummary::from(&candidate.responder));
    self.publish(None);
  }

  // ─── Teardown ───────────────────────────────────────────────────────────

  /// Cancel the request and tear it down. A request that went terminal on
  /// its own meanwhile is torn down as it is.
  async fn close(&mut self, reason: CancelReason) {
    if let Some(record) = cancel_emergency(&*self.store, self.emergency.emergency_id).await {
      let reason = (record.status == EmergencyStatus::Cancelled).then_some(reason);
      self.settle(record, reason).await;
    }
  }

  /// Tear down a request that was closed elsewhere. Anything still active
  /// is left to whoever moved it.
  async fn settle_if_terminal(&mut self) {
    let emergency_id = self.emergency.emergency_id;
    match self.store.get_emergency(emergency_id).await {
      Ok(Some(record)) if record.status.is_terminal() => {
        let cancelled = record.status == EmergencyStatus::Cancelled;
        self.settle(record, cancelled.then_some(CancelReason::Requester)).await;
      }
      Ok(_) => {}
      Err(e) => warn!(%emergency_id, error = %e, "could not read emergency"),
    }
  }

  async fn settle(&mut self, record: EmergencyRequest, reason: Option<CancelReason>) {
    settle_emergency(&*self.store, &record).await;
    self.emergency = record;
    self.publish(reason);
  }

  async fn load_responder(&mut self) {
    let Some(id) = self.emergency.responder_id else { return };
    match self.store.get_responder(id).await {
      Ok(Some(responder)) => {
        self.responder = Some(ResponderSummary::from(&responder));
        self.publish(None);
      }
      Ok(None) => warn!(responder_id = %id, "assigned responder is not in the directory"),
      Err(e) => warn!(responder_id = %id, error = %e, "could not load assigned responder"),
    }
  }

  pub(crate) fn publish(&self, cancel_reason: Option<CancelReason>) {
    let mut view = DispatchView::new(&self.emergency, self.responder.clone());
    view.cancel_reason = cancel_reason;
    self.view.send_replace(view);
  }
}

/// Resolves with `true` once a stop is requested, or `false` once the owner
/// has gone away without asking.
pub(crate) async fn stop_requested(stop: &mut watch::Receiver<bool>) -> bool {
  stop.wait_for(|stop| *stop).await.is_ok()
}

fn persistence(e: impl std::error::Error + Send + Sync + 'static) -> CommitError {
  CommitError::Persistence(Box::new(e))
}

// ─── Shared teardown steps ───────────────────────────────────────────────────

/// `searching | assigned → cancelled`. When the request had already gone
/// terminal, that record is returned instead so it can still be torn down.
pub(crate) async fn cancel_emergency<S: EmergencyStore>(
  store: &S,
  emergency_id: Uuid,
) -> Option<EmergencyRequest> {
  match store.mark_cancelled(emergency_id).await {
    Ok(Some(cancelled)) => {
      info!(%emergency_id, "emergency cancelled");
      Some(cancelled)
    }
    Ok(None) => match store.get_emergency(emergency_id).await {
      Ok(Some(record)) if record.status.is_terminal() => Some(record),
      Ok(_) => None,
      Err(e) => {
        warn!(%emergency_id, error = %e, "could not read emergency");
        None
      }
    },
    Err(e) => {
      error!(%emergency_id, error = %e, "could not cancel emergency");
      None
    }
  }
}

/// Give back the responder a terminal request held, then archive it.
pub(crate) async fn settle_emergency<S: EmergencyStore>(store: &S, record: &EmergencyRequest) {
  let emergency_id = record.emergency_id;
  if let Some(responder_id) = record.responder_id {
    release_responder(store, responder_id, emergency_id).await;
  }
  match store.archive_emergency(emergency_id).await {
    Ok(_) => info!(%emergency_id, status = %record.status, "emergency archived"),
    Err(e) => warn!(%emergency_id, error = %e, "could not archive emergency"),
  }
}

pub(crate) async fn release_responder<S: EmergencyStore>(
  store: &S,
  responder_id: Uuid,
  emergency_id: Uuid,
) {
  match store.release_responder(responder_id, emergency_id).await {
    Ok(true) => info!(%responder_id, %emergency_id, "responder released"),
    Ok(false) => debug!(%responder_id, %emergency_id, "responder was not held by this emergency"),
    Err(e) => error!(%responder_id, %emergency_id, error = %e, "could not release responder"),
  }
}
