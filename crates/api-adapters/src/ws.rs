//! `GET /ws`: push channel for fan-out frames.
//!
//! Each connection owns one broadcast receiver. Publishing never waits on a
//! socket; a connection that cannot keep up gets refresh frames in place of
//! what it missed, and a closed connection simply drops its receiver.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use services::fanout::recovery_frames;
use tokio::sync::broadcast::error::RecvError;

use crate::state::AppState;

pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| serve(socket, state))
}

async fn serve(socket: WebSocket, state: AppState) {
    let mut frames = state.hub.subscribe();
    let (mut sink, mut incoming) = socket.split();
    state.metrics.ws_subscribers.inc();
    tracing::debug!(subscribers = state.hub.subscriber_count(), "subscriber connected");

    loop {
        tokio::select! {
            frame = frames.recv() => {
                let batch = match frame {
                    Ok(frame) => vec![frame],
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "subscriber lagged, sending refresh");
                        state.hub.record_lag(skipped);
                        state.metrics.lag_recoveries.inc();
                        recovery_frames()
                    }
                    Err(RecvError::Closed) => break,
                };
                let mut failed = false;
                for frame in batch {
                    if sink.send(Message::Text(frame.to_string().into())).await.is_err() {
                        failed = true;
                        break;
                    }
                }
                if failed {
                    break;
                }
            }
            msg = incoming.next() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // Clients only listen; pings are answered by the socket itself.
                Some(Ok(_)) => {}
            }
        }
    }

    state.metrics.ws_subscribers.dec();
    tracing::debug!("subscriber disconnected");
}
