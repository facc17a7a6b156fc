use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, warn};
use rendezvous_protocol::{CodecError, Encoding, SignalMessage};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::error::RelayError;
use crate::relay::Relay;

/// Serve one peer until its websocket closes.
///
/// Outgoing messages are written by a separate task in the `encoding` the peer
/// asked for, incoming frames are accepted in either encoding.
pub async fn user_connected(ws: WebSocket, relay: Arc<Relay>, encoding: Encoding) {
    let (mut user_ws_tx, mut user_ws_rx) = ws.split();

    let (tx, rx) = mpsc::unbounded_channel();
    let mut rx = UnboundedReceiverStream::new(rx);
    let user_id = relay.connect(tx);

    let writer_id = user_id.clone();
    tokio::task::spawn(async move {
        while let Some(message) = rx.next().await {
            let frame = match encode(&message, encoding) {
                Ok(frame) => frame,
                Err(err) => {
                    error!("failed to encode {} for {}: {}", message.tag(), writer_id, err);
                    continue;
                }
            };
            if let Err(err) = user_ws_tx.send(frame).await {
                error!("websocket send error (id={}): {}", writer_id, err);
                break;
            }
        }
        if let Err(err) = user_ws_tx.close().await {
            debug!("websocket already closed (id={}): {}", writer_id, err);
        }
    });

    while let Some(result) = user_ws_rx.next().await {
        let msg = match result {
            Ok(msg) => msg,
            Err(err) => {
                error!("websocket error (id={}): {}", user_id, err);
                break;
            }
        };
        let request = match msg {
            Message::Text(text) => SignalMessage::from_json(&text),
            Message::Binary(bytes) => SignalMessage::from_msgpack(&bytes),
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(_) => break,
        };
        match request {
            Ok(request) => {
                debug!("message received from user {}: {:?}", user_id, request);
                relay.handle(&user_id, request);
            }
            Err(err) => {
                warn!("undecodable frame from user {}: {}", user_id, err);
                relay.reject(&user_id, &RelayError::violation(err.to_string()));
            }
        }
    }

    relay.disconnect(&user_id);
}

fn encode(message: &SignalMessage, encoding: Encoding) -> Result<Message, CodecError> {
    Ok(match encoding {
        Encoding::Json => Message::Text(message.to_json()?),
        Encoding::MessagePack => Message::Binary(message.to_msgpack()?),
    })
}
