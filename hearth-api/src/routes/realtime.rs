/// Realtime WebSocket endpoint
///
/// ```text
/// GET /v1/realtime  (Upgrade: websocket)
///
/// client -> {"type":"auth","token":"<identity token>"}     within 10 s
/// server -> {"type":"ready","user_id":"…"}
/// server -> {"type":"task_update","action":"assigned",…}  per change
/// ```
///
/// Browsers cannot set headers on a WebSocket handshake, so the token
/// travels in the first frame instead of `Authorization`. Anything other
/// than a valid auth frame closes the socket with a policy-violation code.
///
/// After `ready` the socket is one-way: the server forwards the events
/// queued on the user's [`Session`] and pings every 30 seconds. Client text
/// frames are ignored. Dropping the session on return detaches it from the
/// registry.
///
/// [`Session`]: hearth_shared::realtime::Session

use crate::{app::AppState, middleware::auth::authenticate};
use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use hearth_shared::realtime::{ClientFrame, ControlFrame};
use std::borrow::Cow;
use std::time::Duration;
use tokio::time::{interval_at, timeout, Instant};
use tracing::{debug, info, warn};

const AUTH_TIMEOUT: Duration = Duration::from_secs(10);
const PING_INTERVAL: Duration = Duration::from_secs(30);

type Sender = SplitSink<WebSocket, Message>;

pub async fn realtime_socket(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Extracts the token from the first client frame
fn parse_auth_frame(text: &str) -> Result<String, &'static str> {
    match serde_json::from_str::<ClientFrame>(text) {
        Ok(ClientFrame::Auth { token }) if !token.trim().is_empty() => Ok(token),
        Ok(ClientFrame::Auth { .. }) => Err("Empty token"),
        Err(_) => Err("Expected an auth frame"),
    }
}

fn control_message(frame: &ControlFrame) -> Option<Message> {
    serde_json::to_string(frame).ok().map(Message::Text)
}

async fn reject(mut sender: Sender, reason: &'static str) {
    debug!(reason, "Rejecting realtime socket");

    if let Some(message) = control_message(&ControlFrame::Error {
        message: reason.to_string(),
    }) {
        let _ = sender.send(message).await;
    }
    let _ = sender
        .send(Message::Close(Some(CloseFrame {
            code: close_code::POLICY,
            reason: Cow::Borrowed(reason),
        })))
        .await;
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let token = match timeout(AUTH_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => match parse_auth_frame(&text) {
            Ok(token) => token,
            Err(reason) => return reject(sender, reason).await,
        },
        Ok(Some(Ok(_))) => return reject(sender, "Expected an auth frame").await,
        Ok(Some(Err(e))) => {
            debug!(error = %e, "Realtime socket failed before auth");
            return;
        }
        Ok(None) => return,
        Err(_) => return reject(sender, "Authentication timed out").await,
    };

    let user = match authenticate(&state, &token).await {
        Ok(user) => user,
        Err(e) => {
            debug!(error = %e, "Realtime authentication failed");
            return reject(sender, "Invalid token").await;
        }
    };

    let mut session = state.registry.open(user.id);
    info!(user_id = %user.id, session_id = %session.id(), "Realtime session opened");

    if let Some(ready) = control_message(&ControlFrame::Ready { user_id: user.id }) {
        if sender.send(ready).await.is_err() {
            return;
        }
    }

    let mut ping = interval_at(Instant::now() + PING_INTERVAL, PING_INTERVAL);

    loop {
        tokio::select! {
            payload = session.recv() => {
                let Some(payload) = payload else { break };
                if sender.send(Message::Text(payload.to_string())).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(user_id = %user.id, error = %e, "Realtime socket error");
                        break;
                    }
                }
            }
            _ = ping.tick() => {
                if sender.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    info!(user_id = %user.id, session_id = %session.id(), "Realtime session closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_parse_auth_frame() {
        assert_eq!(parse_auth_frame(r#"{"type":"auth","token":"abc"}"#), Ok("abc".to_string()));
        assert_eq!(parse_auth_frame(r#"{"type":"auth","token":"  "}"#), Err("Empty token"));
        assert_eq!(parse_auth_frame(r#"{"type":"subscribe"}"#), Err("Expected an auth frame"));
        assert_eq!(parse_auth_frame("hello"), Err("Expected an auth frame"));
    }

    #[test]
    fn test_ready_frame_shape() {
        let user_id = Uuid::new_v4();
        let Some(Message::Text(text)) = control_message(&ControlFrame::Ready { user_id }) else {
            panic!("expected a text frame");
        };
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "ready");
        assert_eq!(value["user_id"], user_id.to_string());
    }
}
