//! WebSocket connection
//!
//! Opens the gateway socket and splits it into a shared write half and the
//! receive stream owned by the session task.

use crate::error::GatewayResult;
use crate::protocol::Envelope;
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, Stream, StreamExt};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Receive half of the gateway socket
pub type FrameStream = SplitStream<WsStream>;

/// Outbound side of a gateway socket
///
/// Shared between the receive loop and the heartbeat task.
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Send one text frame
    async fn send_text(&self, frame: String) -> GatewayResult<()>;

    /// Close the socket with a normal close frame
    async fn close(&self) -> GatewayResult<()>;

    /// Encode and send an envelope
    async fn send(&self, envelope: &Envelope) -> GatewayResult<()> {
        let frame = envelope.encode()?;
        tracing::trace!(frame = %envelope, "Sending frame");
        self.send_text(frame).await
    }
}

/// [`FrameSink`] over the write half of a tungstenite socket
pub struct WsFrameSink {
    sink: Mutex<SplitSink<WsStream, Message>>,
}

#[async_trait]
impl FrameSink for WsFrameSink {
    async fn send_text(&self, frame: String) -> GatewayResult<()> {
        self.sink.lock().await.send(Message::Text(frame)).await?;
        Ok(())
    }

    async fn close(&self) -> GatewayResult<()> {
        let frame = CloseFrame {
            code: WsCloseCode::Normal,
            reason: "".into(),
        };
        let mut sink = self.sink.lock().await;
        // The peer may already be gone.
        match sink.send(Message::Close(Some(frame))).await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {}
            Err(e) => return Err(e.into()),
        }
        sink.close().await.or_else(|e| match e {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => Ok(()),
            other => Err(other.into()),
        })
    }
}

/// Open a socket to the gateway
pub async fn open_socket(url: &str) -> GatewayResult<(Arc<WsFrameSink>, FrameStream)> {
    let (socket, response) = connect_async(url).await?;
    tracing::debug!(url, status = %response.status(), "Gateway socket opened");

    let (sink, stream) = socket.split();
    Ok((
        Arc::new(WsFrameSink {
            sink: Mutex::new(sink),
        }),
        stream,
    ))
}

/// What the receive half produced
#[derive(Debug)]
pub enum Inbound {
    /// A text frame (binary frames are read as UTF-8 text)
    Text(String),
    /// The server sent a close frame; `None` when it carried no code
    Closed(Option<(u16, String)>),
    /// The transport failed
    Error(tungstenite::Error),
    /// The stream ended without a close frame
    Ended,
}

/// Read until the next frame that matters to the session
pub async fn read_frame<S>(stream: &mut S) -> Inbound
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    loop {
        let Some(message) = stream.next().await else {
            return Inbound::Ended;
        };

        match message {
            Ok(Message::Text(text)) => return Inbound::Text(text),
            Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                Ok(text) => return Inbound::Text(text),
                Err(e) => {
                    tracing::warn!(error = %e, "Binary frame is not UTF-8, ignoring");
                }
            },
            Ok(Message::Close(frame)) => {
                return Inbound::Closed(
                    frame.map(|frame| (u16::from(frame.code), frame.reason.into_owned())),
                );
            }
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {
                tracing::trace!("Control frame received");
            }
            Err(e) => return Inbound::Error(e),
        }
    }
}
