//! HTTP host for the sagip dispatch engine.
//!
//! Glues configuration, the SQLite store and the JSON API into one axum
//! [`Router`]. The `server` binary in `main.rs` is a thin wrapper around
//! [`load_config`] and [`app`].

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use axum::{Router, routing::get};
use config::{Config, ConfigError, Environment, File};
use sagip_core::directory::EmergencyStore;
use sagip_dispatch::{DispatchConfig, Dispatcher};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

/// Prefix for environment overrides, e.g. `SAGIP_PORT=9000`.
pub const ENV_PREFIX: &str = "SAGIP";

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `SAGIP_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:            String,
  pub port:            u16,
  /// `~` is expanded by the binary.
  pub store_path:      PathBuf,
  /// Give up on a search after this many seconds. Unset searches until the
  /// requester cancels.
  #[serde(default)]
  pub max_search_secs: Option<u64>,
}

impl ServerConfig {
  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn dispatch_config(&self) -> DispatchConfig {
    DispatchConfig { max_search: self.max_search_secs.map(Duration::from_secs) }
  }
}

/// Read `path` if it exists, then apply environment overrides on top of the
/// built-in defaults.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
  Config::builder()
    .set_default("host", "127.0.0.1")?
    .set_default("port", 8080)?
    .set_default("store_path", "~/.local/share/sagip/sagip.db")?
    .add_source(File::from(path).required(false))
    .add_source(Environment::with_prefix(ENV_PREFIX))
    .build()?
    .try_deserialize()
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full application: `/health` plus the API under `/api`.
pub fn app<S>(dispatcher: Arc<Dispatcher<S>>) -> Router
where
  S: EmergencyStore + 'static,
{
  Router::new()
    .route("/health", get(|| async { "ok" }))
    .nest("/api", sagip_api::api_router(dispatcher))
    .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use sagip_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;

  use super::*;

  #[test]
  fn missing_config_file_falls_back_to_defaults() {
    let cfg = load_config(Path::new("/nonexistent/sagip-config.toml")).unwrap();
    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.max_search_secs, None);
    assert_eq!(cfg.dispatch_config().max_search, None);
  }

  #[test]
  fn config_file_overrides_defaults() {
    let path = std::env::temp_dir().join(format!("sagip-config-{}.toml", std::process::id()));
    std::fs::write(&path, "port = 9100\nmax_search_secs = 300\nstore_path = \"/tmp/s.db\"\n")
      .unwrap();
    let cfg = load_config(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(cfg.port, 9100);
    assert_eq!(cfg.address(), "127.0.0.1:9100");
    assert_eq!(cfg.store_path, PathBuf::from("/tmp/s.db"));
    assert_eq!(cfg.dispatch_config().max_search, Some(Duration::from_secs(300)));
  }

  #[tokio::test]
  async fn health_and_api_are_mounted() {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let app = app(Arc::new(Dispatcher::new(store, DispatchConfig::default())));

    let resp = app
      .clone()
      .oneshot(Request::get("/health").body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
      .oneshot(Request::get("/api/responders").body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
  }
}
