//! Native WebSocket transport using tokio-tungstenite.

use anyhow::Context;
use async_trait::async_trait;
use futures_channel::mpsc::unbounded;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::{CloseInfo, Connector, OutboundFrame, SocketConnection, TransportEvent};

/// [`Connector`] backed by `tokio-tungstenite`.
///
/// Each connection runs a read task and a write task; both end when the
/// socket closes or the channel drops its side.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> anyhow::Result<SocketConnection> {
        let (ws_stream, _response) = connect_async(url)
            .await
            .context("WebSocket handshake failed")?;
        let (mut write, mut read) = ws_stream.split();

        let (outgoing, mut outgoing_rx) = unbounded::<OutboundFrame>();
        let (events, incoming) = tokio::sync::mpsc::unbounded_channel();

        // Read task
        tokio::spawn(async move {
            let mut close = None;
            while let Some(msg_result) = read.next().await {
                let event = match msg_result {
                    Ok(Message::Text(text)) => TransportEvent::Message(text.to_string()),
                    Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                        Ok(text) => TransportEvent::Message(text),
                        Err(_) => {
                            tracing::debug!("Dropping non-UTF-8 binary frame");
                            continue;
                        }
                    },
                    Ok(Message::Close(frame)) => {
                        close = Some(match frame {
                            Some(frame) => CloseInfo::new(frame.code.into(), frame.reason.to_string()),
                            None => CloseInfo::new(1005, ""),
                        });
                        break;
                    }
                    Ok(Message::Ping(_)) => {
                        // Pong is handled automatically by tungstenite
                        continue;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::debug!("WebSocket read error: {}", e);
                        let _ = events.send(TransportEvent::Error(e.to_string()));
                        break;
                    }
                };
                if events.send(event).is_err() {
                    // The channel dropped this connection.
                    return;
                }
            }
            let close = close.unwrap_or_else(|| CloseInfo::abnormal("connection lost"));
            let _ = events.send(TransportEvent::Closed(close));
        });

        // Write task
        tokio::spawn(async move {
            while let Some(frame) = outgoing_rx.next().await {
                match frame {
                    OutboundFrame::Text(text) => {
                        if let Err(e) = write.send(Message::text(text)).await {
                            tracing::debug!("WebSocket send failed: {}", e);
                            break;
                        }
                    }
                    OutboundFrame::Close => {
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
            let _ = write.close().await;
        });

        Ok(SocketConnection { outgoing, incoming })
    }
}
