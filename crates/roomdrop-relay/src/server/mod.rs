//! HTTP and WebSocket surface.

mod handlers;


use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{any, get, post};
use axum::Router;
use roomdrop_common::RoomdropError;
use roomdrop_config::{RoomdropConfig, RoomsConfig};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::manager::RoomManager;
use crate::store::RoomConfigStore;

/// Shared state passed to axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub manager: RoomManager,
    pub rooms: Arc<RoomsConfig>,
}

/// Build the router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/rooms", post(handlers::create_room))
        .route("/ws/{room_id}", any(handlers::signaling))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Open the room store, start the reaper, bind, and serve in the background.
pub async fn start(config: &RoomdropConfig) -> Result<ServerHandle, RoomdropError> {
    let store = RoomConfigStore::open(
        config.storage.rooms_path(),
        config.storage.max_rooms as usize,
    )
    .await?;
    let manager = RoomManager::new(store, config.rooms.default_max_concurrent);

    let reaper = tokio::spawn(manager.clone().run_reaper(
        Duration::from_secs(config.rooms.reap_interval_secs),
        Duration::from_secs(config.rooms.idle_ttl_secs),
    ));

    let state = AppState {
        manager,
        rooms: Arc::new(config.rooms.clone()),
    };
    let listener = tokio::net::TcpListener::bind(config.server.addr()).await?;
    let addr = listener.local_addr()?;
    info!(%addr, "roomdrop relay listening");

    let router = build_router(state);
    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            error!(error = %e, "Server stopped");
        }
    });

    Ok(ServerHandle {
        addr,
        server,
        reaper,
    })
}

/// Keeps the server and reaper tasks alive.
pub struct ServerHandle {
    pub addr: SocketAddr,
    server: tokio::task::JoinHandle<()>,
    reaper: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    /// Wait for the server task to end.
    pub async fn wait(&mut self) {
        let _ = (&mut self.server).await;
    }

    pub fn shutdown(self) {
        self.server.abort();
        self.reaper.abort();
    }
}
