//! WebSocket endpoint.
//!
//! Each socket gets a reader loop that feeds the orchestrator and a writer
//! task that drains the connection's outbound queue. The orchestrator never
//! touches the socket directly.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::response::Response;
use axum::{Router, routing::get};
use futures_util::{SinkExt, StreamExt};
use tablesync_core::error::DomainError;
use tablesync_core::id::{Identity, UserId};
use tablesync_protocol::envelope::Envelope;
use tablesync_protocol::server::ServerEvent;
use tablesync_session::FrameOutcome;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the authenticated display name.
pub const USER_NAME_HEADER: &str = "x-user-name";

/// How long the writer may keep flushing after the reader stops.
const WRITER_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Identity asserted by the upstream auth gateway.
#[derive(Debug, Clone)]
pub struct GatewayIdentity(pub Identity);

impl<S: Send + Sync> FromRequestParts<S> for GatewayIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ApiError::Unauthenticated(format!("missing {name} header")))
        };
        let user_id = Uuid::parse_str(header(USER_ID_HEADER)?)
            .map_err(|_| ApiError::Unauthenticated(format!("malformed {USER_ID_HEADER} header")))?;
        let identity = Identity::new(UserId::from(user_id), header(USER_NAME_HEADER)?);
        if !identity.is_well_formed() {
            return Err(DomainError::Validation("display name must be 1-64 characters".to_owned()).into());
        }
        Ok(Self(identity))
    }
}

/// GET /ws
async fn ws_upgrade(
    State(state): State<AppState>,
    GatewayIdentity(identity): GatewayIdentity,
    ws: WebSocketUpgrade,
) -> Response {
    debug!(user_id = %identity.user_id, "Upgrading to WebSocket");
    // Frames far beyond the limit close the socket outright; anything
    // smaller is parsed and rejected with an error event.
    let hard_limit = state.orchestrator.config().max_frame_bytes.saturating_mul(4);
    ws.max_message_size(hard_limit)
        .on_upgrade(move |socket| handle_socket(socket, state, identity))
}

/// Drives one WebSocket connection until it closes.
async fn handle_socket(socket: WebSocket, state: AppState, identity: Identity) {
    let orchestrator = Arc::clone(&state.orchestrator);
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Arc<Envelope>>(orchestrator.config().outbound_buffer);

    let connection_id = match orchestrator.on_connect(identity, tx) {
        Ok(id) => id,
        Err(e) => {
            warn!(error = %e, "Connection refused");
            return;
        }
    };
    info!(connection_id = %connection_id, "WebSocket connection established");

    let mut send_task = tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            let closing = matches!(envelope.event, ServerEvent::ForceDisconnect { .. });
            match serde_json::to_string(envelope.as_ref()) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(e) => error!(error = %e, "Failed to serialize envelope"),
            }
            if closing {
                let _ = ws_sender.send(Message::Close(None)).await;
                break;
            }
        }
    });

    let mut guard = orchestrator.flood_guard();
    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let outcome = orchestrator
                    .handle_frame(connection_id, text.as_str(), &mut guard)
                    .await;
                if outcome == FrameOutcome::Disconnect {
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                info!(connection_id = %connection_id, "WebSocket closed by client");
                break;
            }
            Ok(Message::Binary(_)) => {
                debug!(connection_id = %connection_id, "Ignoring binary frame");
            }
            Err(e) => {
                warn!(connection_id = %connection_id, error = %e, "WebSocket error");
                break;
            }
            // Ping/pong frames are answered by the transport.
            Ok(_) => {}
        }
    }

    // Unregistering drops the last sender, so the writer drains and stops.
    orchestrator.on_disconnect(connection_id).await;
    if tokio::time::timeout(WRITER_FLUSH_TIMEOUT, &mut send_task)
        .await
        .is_err()
    {
        send_task.abort();
    }

    info!(connection_id = %connection_id, "WebSocket connection terminated");
}

/// Returns the WebSocket router.
pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws_upgrade))
}
