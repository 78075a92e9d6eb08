// ============================
// realtime-dev-broker/src/ws_router.rs
// ============================
/** WebSocket router for the dev broker.
Each socket gets an outbound queue drained by its own send task; inbound
frames are handled in order on the socket's receive loop. */
use crate::{metrics, BrokerState};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        ConnectInfo, State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use realtime_common::{ClientFrame, ServerFrame, PROTOCOL_VERSION};
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Create the broker router
pub fn create_router(state: BrokerState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "Healthy"
}

async fn ws_handler(
    State(state): State<BrokerState>,
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> impl IntoResponse {
    tracing::debug!("WebSocket connection attempt from: {}", addr);
    ws.on_upgrade(move |socket| handle_socket(socket, state, addr))
}

/// What the receive loop should do after a frame
enum Flow {
    Continue,
    Close,
}

async fn handle_socket(socket: WebSocket, state: BrokerState, addr: SocketAddr) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerFrame>(32);
    let client = Uuid::new_v4();

    ::metrics::counter!(metrics::WS_CONNECTIONS).increment(1);
    ::metrics::gauge!(metrics::WS_ACTIVE).increment(1.0);
    tracing::debug!("WebSocket {} established from: {}", client, addr);

    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            match serde_json::to_string(&frame) {
                Ok(json) => {
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        tracing::debug!("Client went away while sending");
                        break;
                    }
                },
                Err(e) => tracing::error!("Failed to serialize frame: {}", e),
            }
        }
        let _ = sender.send(Message::Close(None)).await;
    });

    let mut connected = false;
    while let Some(msg_result) = receiver.next().await {
        let text = match msg_result {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!("WebSocket {} read error: {}", client, e);
                break;
            },
        };

        let frame = match serde_json::from_str::<ClientFrame>(text.as_str()) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Unparseable frame from {}: {}", client, e);
                ::metrics::counter!(metrics::FRAMES_REJECTED).increment(1);
                let _ = tx
                    .send(ServerFrame::Error {
                        message: format!("invalid frame: {e}"),
                    })
                    .await;
                continue;
            },
        };

        match handle_frame(&state, client, &tx, &mut connected, frame).await {
            Flow::Continue => {},
            Flow::Close => break,
        }
    }

    state.remove_client(client);
    drop(tx);
    let _ = send_task.await;
    ::metrics::gauge!(metrics::WS_ACTIVE).decrement(1.0);
    tracing::debug!("WebSocket {} closed", client);
}

async fn handle_frame(
    state: &BrokerState,
    client: Uuid,
    tx: &mpsc::Sender<ServerFrame>,
    connected: &mut bool,
    frame: ClientFrame,
) -> Flow {
    if !*connected && !matches!(frame, ClientFrame::Connect { .. } | ClientFrame::Disconnect) {
        ::metrics::counter!(metrics::FRAMES_REJECTED).increment(1);
        let _ = tx
            .send(ServerFrame::Error {
                message: "expected Connect first".to_string(),
            })
            .await;
        return Flow::Continue;
    }

    match frame {
        ClientFrame::Connect {
            accept_version,
            token,
        } => {
            if accept_version != PROTOCOL_VERSION {
                let _ = tx
                    .send(ServerFrame::Error {
                        message: format!("unsupported version {accept_version}"),
                    })
                    .await;
                return Flow::Close;
            }
            if !state.accepts(token.as_deref()) {
                let _ = tx
                    .send(ServerFrame::Error {
                        message: "invalid token".to_string(),
                    })
                    .await;
                return Flow::Close;
            }

            *connected = true;
            state.register(client, tx.clone());
            let _ = tx
                .send(ServerFrame::Connected {
                    version: PROTOCOL_VERSION.to_string(),
                    session: client.to_string(),
                })
                .await;
        },
        ClientFrame::Subscribe { id, destination } => {
            tracing::debug!("{} subscribed {} to {}", client, id, destination);
            state.subscribe(client, id, destination);
        },
        ClientFrame::Unsubscribe { id } => {
            state.unsubscribe(client, &id);
        },
        ClientFrame::Send { destination, body } => {
            state.publish(&destination, &body).await;
        },
        ClientFrame::Disconnect => return Flow::Close,
    }
    Flow::Continue
}
