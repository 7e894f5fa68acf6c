// src/provider/chat_socket.rs — Voice-chat socket for a streaming session
//
// The socket is the voice channel: opening it is the negotiation the
// coordinator waits on, and while it is open the provider pushes user speech
// events over it. A close we did not ask for means the session is gone.

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::events::{EventHub, ProviderEvent};
use crate::infra::errors::AvatarError;

const OPERATION: &str = "streaming.chat";

type Writer = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Socket address for `session_id`, derived from the REST base URL
/// (`https` becomes `wss`).
pub fn chat_socket_url(
    base_url: &str,
    session_id: &str,
    session_token: &str,
    language: &str,
) -> Result<url::Url, AvatarError> {
    let mut url = url::Url::parse(base_url)
        .map_err(|e| AvatarError::provider(OPERATION, format!("invalid base URL: {e}")))?;
    let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
    url.set_scheme(scheme)
        .map_err(|_| AvatarError::provider(OPERATION, format!("no socket scheme for {base_url}")))?;
    url.set_path("/v1/ws/streaming.chat");
    url.query_pairs_mut()
        .clear()
        .append_pair("session_id", session_id)
        .append_pair("session_token", session_token)
        .append_pair("silence_response", "false")
        .append_pair("stt_language", language);
    Ok(url)
}

#[derive(Deserialize)]
struct Frame {
    event_type: String,
}

/// Event carried by one text frame. Frames without a known `event_type`
/// are ignored.
pub fn parse_event(frame: &str) -> Option<ProviderEvent> {
    let frame: Frame = serde_json::from_str(frame).ok()?;
    match frame.event_type.as_str() {
        "user_start" => Some(ProviderEvent::UserStart),
        "user_stop" => Some(ProviderEvent::UserStop),
        "avatar_start_talking" => Some(ProviderEvent::AvatarStartTalking),
        "avatar_stop_talking" => Some(ProviderEvent::AvatarStopTalking),
        _ => None,
    }
}

pub struct ChatSocket {
    writer: Writer,
    relay: JoinHandle<()>,
}

impl ChatSocket {
    /// Connect and relay incoming events into `hub`. Resolves once the
    /// handshake has completed.
    pub async fn open(url: &url::Url, hub: EventHub) -> Result<Self, AvatarError> {
        let (stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| AvatarError::provider(OPERATION, e.to_string()))?;
        let (writer, mut reader) = stream.split();

        let relay = tokio::spawn(async move {
            while let Some(frame) = reader.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        if let Some(event) = parse_event(&text) {
                            hub.emit(event);
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!("Chat socket error: {}", e);
                        break;
                    }
                }
            }
            tracing::info!("Chat socket closed by provider");
            hub.emit(ProviderEvent::StreamDisconnected);
        });

        Ok(Self { writer, relay })
    }

    /// Close from our side. The relay stops first, so this is not reported
    /// as a disconnect.
    pub async fn close(mut self) {
        self.relay.abort();
        if let Err(e) = self.writer.send(Message::Close(None)).await {
            tracing::debug!("Chat socket close frame not sent: {}", e);
        }
    }
}

impl Drop for ChatSocket {
    fn drop(&mut self) {
        self.relay.abort();
    }
}
