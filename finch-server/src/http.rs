use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use finch_hub::Message as HubMessage;
use finch_protocol::{ClientMessage, ControlDescriptor, NativeControl};
use futures::{SinkExt, StreamExt};
use tower_http::services::fs::ServeDir;
use tracing::{info, warn};

use crate::coordinator::{Coordinator, PostDispatch};

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
}

/// Per-subscriber send timeout. A writer that can't clear this in time is
/// torn down; its queue's `OverflowDrop` policy on the Hub side is what
/// keeps a slow reader from ever blocking the others in the first place,
/// this is the backstop for when it stops reading entirely.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

pub fn build_router(state: AppState, static_dir: std::path::PathBuf) -> Router {
    let serve_dir = ServeDir::new(static_dir);
    Router::new()
        .route("/controls", get(controls_handler))
        .route("/ws", get(ws_handler))
        .fallback_service(serve_dir)
        .with_state(state)
}

async fn controls_handler(State(state): State<AppState>) -> impl IntoResponse {
    let descriptors = normalized_controls(&state.coordinator);
    axum::Json(descriptors)
}

/// Splits any `colour_gains` native control into `colour_gain_red` /
/// `colour_gain_blue` scalar siblings — this is the one place in the
/// whole server that split happens.
fn normalized_controls(coordinator: &Coordinator) -> Vec<ControlDescriptor> {
    coordinator
        .list_controls()
        .into_iter()
        .flat_map(|native| match native {
            NativeControl::Scalar(desc) => vec![desc],
            NativeControl::ColourGains {
                range,
                default,
                value,
            } => vec![
                ControlDescriptor::Float {
                    id: "colour_gain_red".into(),
                    name: "colour_gain_red".into(),
                    range,
                    default: default.0,
                    value: value.0,
                    step: 0.1,
                },
                ControlDescriptor::Float {
                    id: "colour_gain_blue".into(),
                    name: "colour_gain_blue".into(),
                    range,
                    default: default.1,
                    value: value.1,
                    step: 0.1,
                },
            ],
        })
        .collect()
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let coordinator = state.coordinator;
    let (id, queue) = coordinator.register_subscriber();
    info!("subscriber {id:?} connected");

    let (mut sink, mut stream) = socket.split();

    let writer = tokio::spawn(async move {
        loop {
            let msg = queue.recv().await;
            let frames = match msg {
                HubMessage::Text(text) => vec![WsMessage::Text(text.into())],
                HubMessage::TextAndBinary(text, binary) => vec![
                    WsMessage::Text(text.into()),
                    WsMessage::Binary(binary.to_vec().into()),
                ],
            };
            for frame in frames {
                match tokio::time::timeout(SEND_TIMEOUT, sink.send(frame)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        let err = crate::error::AppError::Transport(e.to_string());
                        warn!("subscriber {id:?} disconnecting: {err}");
                        return;
                    }
                    Err(_) => {
                        let err = crate::error::AppError::Transport("send timed out".into());
                        warn!("subscriber {id:?} disconnecting: {err}");
                        return;
                    }
                }
            }
        }
    });

    let mut awaiting_binary_image = false;
    while let Some(Ok(frame)) = stream.next().await {
        match frame {
            WsMessage::Text(text) => {
                if awaiting_binary_image {
                    // A binary frame was expected, not more text; drop the
                    // stale request and process this as a normal message.
                    awaiting_binary_image = false;
                }
                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(msg) => {
                        let post = coordinator.handle_client_message(id, &msg);
                        awaiting_binary_image = post == PostDispatch::AwaitBinaryImage;
                    }
                    Err(e) => warn!("malformed inbound message from {id:?}: {e}"),
                }
            }
            WsMessage::Binary(bytes) => {
                if awaiting_binary_image {
                    coordinator.display_binary_image(&bytes);
                    awaiting_binary_image = false;
                }
            }
            WsMessage::Close(_) => break,
            WsMessage::Ping(_) | WsMessage::Pong(_) => {}
        }
    }

    writer.abort();
    coordinator.unregister_subscriber(id);
    info!("subscriber {id:?} disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colour_gains_split_into_two_float_descriptors() {
        let native = vec![NativeControl::ColourGains {
            range: (0.0, 8.0),
            default: (1.0, 1.0),
            value: (2.0, 3.0),
        }];
        let split: Vec<ControlDescriptor> = native
            .into_iter()
            .flat_map(|n| match n {
                NativeControl::Scalar(d) => vec![d],
                NativeControl::ColourGains {
                    range,
                    default,
                    value,
                } => vec![
                    ControlDescriptor::Float {
                        id: "colour_gain_red".into(),
                        name: "colour_gain_red".into(),
                        range,
                        default: default.0,
                        value: value.0,
                        step: 0.1,
                    },
                    ControlDescriptor::Float {
                        id: "colour_gain_blue".into(),
                        name: "colour_gain_blue".into(),
                        range,
                        default: default.1,
                        value: value.1,
                        step: 0.1,
                    },
                ],
            })
            .collect();
        assert_eq!(split.len(), 2);
        assert_eq!(split[0].id(), "colour_gain_red");
        assert_eq!(split[1].id(), "colour_gain_blue");
    }
}
