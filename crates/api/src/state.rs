use std::sync::Arc;

use academy_lifecycle::Academy;

use crate::config::ServerConfig;

/// Shared application state available to all handlers via `State<AppState>`.
///
/// Cheap to clone; every service inside [`Academy`] shares one context.
#[derive(Clone)]
pub struct AppState {
    pub academy: Academy,
    pub config: Arc<ServerConfig>,
}
