//! Keeping distance and ETA current while a responder is on the way.

use chrono::Utc;
use sagip_core::{
  directory::EmergencyStore,
  emergency::{EmergencyRequest, EmergencyStatus},
  geo::GeoPoint,
};
use tracing::{debug, error, info, warn};

use crate::coordinator::{Session, stop_requested};

pub(crate) enum ReconcileEnd {
  Stopped,
  /// The record reached a terminal status outside this session.
  Settled(EmergencyRequest),
  Detached,
}

impl<S: EmergencyStore + 'static> Session<S> {
  /// Follow the assigned responder's location and the request record until
  /// the request leaves `assigned` or the session is stopped.
  pub(crate) async fn reconcile(&mut self) -> ReconcileEnd {
    let emergency_id = self.emergency.emergency_id;
    let Some(responder_id) = self.emergency.responder_id else {
      error!("assigned emergency names no responder");
      return ReconcileEnd::Detached;
    };

    let mut location = match self.store.subscribe_responder_location(responder_id).await {
      Ok(sub) => sub,
      Err(e) => {
        error!(%responder_id, error = %e, "could not subscribe to responder location");
        return ReconcileEnd::Detached;
      }
    };
    let mut record = match self.store.watch_emergency(emergency_id).await {
      Ok(sub) => sub,
      Err(e) => {
        error!(error = %e, "could not watch emergency");
        return ReconcileEnd::Detached;
      }
    };

    debug!(%responder_id, "following responder");
    loop {
      tokio::select! {
        biased;

        stop = stop_requested(&mut self.stop) => {
          return if stop { ReconcileEnd::Stopped } else { ReconcileEnd::Detached };
        }
        update = record.next() => match update {
          Some(Some(current)) if current.status == EmergencyStatus::Assigned => {}
          Some(Some(current)) => return ReconcileEnd::Settled(current),
          Some(None) => {
            info!("emergency left the active set");
            return ReconcileEnd::Detached;
          }
          None => {
            warn!("emergency subscription closed");
            return ReconcileEnd::Detached;
          }
        },
        update = location.next() => match update {
          Some(Some(point)) if point.is_valid() => self.apply_location(point).await,
          Some(_) => debug!("responder has no usable location, keeping last distance"),
          None => {
            warn!("location subscription closed");
            return ReconcileEnd::Detached;
          }
        },
      }
    }
  }

  async fn apply_location(&mut self, point: GeoPoint) {
    let km = self.emergency.origin.distance_to(&point);
    if self.emergency.distance_km == Some(km) {
      return;
    }
    self.emergency.distance_km = Some(km);
    self.emergency.updated_at = Utc::now();
    self.publish(None);

    if let Err(e) = self.store.record_distance(self.emergency.emergency_id, km).await {
      warn!(error = %e, "could not persist distance");
    }
  }
}
