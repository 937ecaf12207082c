use axum::body::Bytes;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use roomdrop_common::{ClientId, RoomId};
use roomdrop_config::RoomsConfig;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info};

use super::AppState;
use crate::connection;
use crate::room::RoomConfig;

const ROOM_ID_ATTEMPTS: usize = 8;
const MAX_ROOM_ID_LEN: usize = 64;

/// Body of `POST /api/rooms`. Every field is optional and loosely typed so
/// bad values fall back to defaults instead of failing the request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CreateRoomRequest {
    #[serde(default)]
    max_concurrent: Option<Value>,
    #[serde(default)]
    creator_cid: Option<Value>,
}

impl CreateRoomRequest {
    /// An empty body or `null` is the same as `{}`. Anything else must be a
    /// JSON object.
    pub(super) fn parse(body: &[u8]) -> Result<Self, serde_json::Error> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        match serde_json::from_slice(body)? {
            Value::Null => Ok(Self::default()),
            object @ Value::Object(_) => serde_json::from_value(object),
            _ => Err(serde::de::Error::custom("expected a JSON object")),
        }
    }

    pub(super) fn into_config(self, rooms: &RoomsConfig) -> RoomConfig {
        let max_concurrent = self
            .max_concurrent
            .as_ref()
            .and_then(Value::as_f64)
            .filter(|n| n.is_finite())
            .map(|n| n.floor().clamp(1.0, f64::from(rooms.max_concurrent_limit)) as u32)
            .unwrap_or(rooms.default_max_concurrent);

        let config = RoomConfig::new(max_concurrent);
        match self
            .creator_cid
            .as_ref()
            .and_then(Value::as_str)
            .filter(|cid| !cid.is_empty())
        {
            Some(cid) => config.with_designated_offerer(ClientId::new(cid)),
            None => config,
        }
    }
}

pub(super) async fn create_room(State(state): State<AppState>, body: Bytes) -> Response {
    let request = match CreateRoomRequest::parse(&body) {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, "Rejecting room request");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "invalid JSON body"})),
            )
                .into_response();
        }
    };
    let config = request.into_config(&state.rooms);

    for _ in 0..ROOM_ID_ATTEMPTS {
        let room_id = RoomId::generate(state.rooms.room_id_length as usize);
        match state
            .manager
            .store()
            .insert_new(room_id.clone(), config.clone())
            .await
        {
            Ok(true) => {
                info!(
                    room = %room_id,
                    max_concurrent = config.max_concurrent,
                    designated = config.designated_offerer.is_some(),
                    "Room created"
                );
                return Json(json!({"roomId": room_id})).into_response();
            }
            Ok(false) => continue,
            Err(e) => {
                error!(room = %room_id, error = %e, "Failed to save room");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": "failed to save room"})),
                )
                    .into_response();
            }
        }
    }

    error!("Ran out of room id attempts");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "could not allocate room id"})),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub(super) struct ConnectParams {
    cid: Option<String>,
}

fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("websocket"))
}

fn valid_room_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ROOM_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

pub(super) async fn signaling(
    method: Method,
    headers: HeaderMap,
    Path(room_id): Path<String>,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if !is_websocket_upgrade(&headers) {
        return (StatusCode::UPGRADE_REQUIRED, "Expected Upgrade: websocket").into_response();
    }
    if method != Method::GET {
        return (StatusCode::BAD_REQUEST, "WebSocket handshake requires GET").into_response();
    }
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            debug!(error = %rejection.body_text(), "Bad WebSocket handshake");
            return (StatusCode::BAD_REQUEST, rejection.body_text()).into_response();
        }
    };
    if !valid_room_id(&room_id) {
        return (StatusCode::BAD_REQUEST, "invalid room id").into_response();
    }

    let room_id = RoomId::new(room_id);
    let client_id = match params.cid.filter(|cid| !cid.is_empty()) {
        Some(cid) => ClientId::new(cid),
        None => ClientId::random(),
    };
    let outbox_capacity = state.rooms.outbox_capacity as usize;
    let manager = state.manager.clone();
    ws.on_upgrade(move |socket| {
        connection::handle_socket(socket, room_id, client_id, manager, outbox_capacity)
    })
}

pub(super) async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "rooms": state.manager.count().await,
    }))
}
