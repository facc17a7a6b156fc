use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, warn};
use rendezvous_protocol::SignalMessage;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_tungstenite::tungstenite::Message;

use crate::error::{Error, Result};

/// Open a websocket to the signaling server.
///
/// Returns the stream of decoded messages coming from the server and a sender for messages
/// going to it. Both ends are pumped by background tasks that stop when the socket closes.
pub(crate) async fn connect(
    signaling_server_url: &str,
) -> Result<(
    UnboundedReceiverStream<SignalMessage>,
    mpsc::UnboundedSender<SignalMessage>,
)> {
    let (websocket, _response) = tokio_tungstenite::connect_async(signaling_server_url)
        .await
        .with_context(|| {
            format!("failed to create connection with signaling server on {signaling_server_url}")
        })
        .map_err(Error::Transport)?;
    let (mut ws_tx, mut ws_rx) = websocket.split();

    let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<SignalMessage>();
    tokio::spawn(async move {
        while let Some(message) = outgoing_rx.recv().await {
            let frame = match message.to_json() {
                Ok(text) => Message::Text(text),
                Err(err) => {
                    error!("failed to encode {}: {}", message.tag(), err);
                    continue;
                }
            };
            if let Err(err) = ws_tx.send(frame).await {
                error!("failed to send message across the websocket: {}", err);
                break;
            }
        }
        if let Err(err) = ws_tx.close().await {
            debug!("websocket already closed: {}", err);
        }
    });

    let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(frame) = ws_rx.next().await {
            let decoded = match frame {
                Ok(Message::Text(text)) => SignalMessage::from_json(&text),
                Ok(Message::Binary(bytes)) => SignalMessage::from_msgpack(&bytes),
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(err) => {
                    error!("websocket error: {}", err);
                    break;
                }
            };
            match decoded {
                Ok(message) => {
                    if incoming_tx.send(message).is_err() {
                        break;
                    }
                }
                Err(err) => warn!("failed to deserialize message: {}", err),
            }
        }
    });

    Ok((UnboundedReceiverStream::new(incoming_rx), outgoing_tx))
}
