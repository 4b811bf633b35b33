use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};
use tracing::{info, warn};

use crate::{
    dto::{
        events::{ErrorEvent, PartyStateEvent},
        ws::{ClientMessage, ServerEvent},
    },
    services::{
        party_service,
        room_events::{EVENT_ERROR, EVENT_PARTY_STATE},
    },
    state::{Membership, SharedState},
};

/// Failure to push a frame to a client.
#[derive(Debug, Error)]
enum SendError {
    /// Writer channel closed - connection should be terminated immediately.
    #[error("connection closed")]
    ConnectionClosed,
    #[error("failed to serialize frame: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Handle the full lifecycle of a room WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let ident_timeout = state.config().ident_timeout();
    let initial_message = match tokio::time::timeout(ident_timeout, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(error = %err, "websocket receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!("websocket identification timed out");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let join = match ClientMessage::from_json_str(&initial_message) {
        Ok(ClientMessage::JoinRoom(join)) => join,
        Ok(ClientMessage::Unknown) => {
            warn!("first message was not join_room");
            reject(&outbound_tx, "first message must be join_room");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Err(err) => {
            warn!(error = %err, "failed to parse or validate room message");
            reject(&outbound_tx, &err.to_string());
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let (room_rx, snapshot) =
        match party_service::join_room(&state, &join.party_code, join.participant_id).await {
            Ok(joined) => joined,
            Err(err) => {
                warn!(
                    party_code = %join.party_code,
                    participant_id = %join.participant_id,
                    error = %err,
                    "room join refused"
                );
                reject(&outbound_tx, &err.to_string());
                finalize(writer_task, outbound_tx).await;
                return;
            }
        };

    let membership = Membership {
        party_code: snapshot.code.clone(),
        participant_id: join.participant_id,
    };
    let connection_id = state.membership().register(membership.clone());
    info!(
        connection_id = %connection_id,
        party_code = %membership.party_code,
        participant_id = %membership.participant_id,
        connections = state.membership().len(),
        "room connection registered"
    );

    let sent = ServerEvent::json(EVENT_PARTY_STATE, &PartyStateEvent { party: snapshot })
        .map_err(SendError::from)
        .and_then(|event| send_event(&outbound_tx, &event));
    let forward_task = tokio::spawn(forward_room_events(
        BroadcastStream::new(room_rx),
        outbound_tx.clone(),
    ));

    if sent.is_ok() {
        while let Some(message) = receiver.next().await {
            match message {
                Ok(Message::Text(text)) => match ClientMessage::from_json_str(&text) {
                    Ok(ClientMessage::JoinRoom(_)) => {
                        warn!(connection_id = %connection_id, "ignoring duplicate join_room message");
                    }
                    Ok(ClientMessage::Unknown) => {}
                    Err(err) => {
                        warn!(connection_id = %connection_id, error = %err, "failed to parse room message");
                    }
                },
                Ok(Message::Ping(payload)) => {
                    let _ = outbound_tx.send(Message::Pong(payload));
                }
                Ok(Message::Close(frame)) => {
                    let _ = outbound_tx.send(Message::Close(frame));
                    break;
                }
                Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
                Err(err) => {
                    warn!(connection_id = %connection_id, error = %err, "websocket error");
                    break;
                }
            }
        }
    }

    forward_task.abort();
    let _ = forward_task.await;

    if let Some(left) = state.membership().deregister(connection_id) {
        party_service::leave_room(&state, &left.party_code, left.participant_id).await;
        state.rooms().release(&left.party_code);
        info!(
            connection_id = %connection_id,
            party_code = %left.party_code,
            participant_id = %left.participant_id,
            room_subscribers = state.rooms().subscriber_count(&left.party_code),
            connections = state.membership().len(),
            "room connection closed"
        );
    }

    finalize(writer_task, outbound_tx).await;
}

/// Pump room events into the connection until either side goes away.
async fn forward_room_events(
    mut events: BroadcastStream<ServerEvent>,
    outbound_tx: mpsc::UnboundedSender<Message>,
) {
    while let Some(item) = events.next().await {
        match item {
            Ok(event) => match send_event(&outbound_tx, &event) {
                Ok(()) => {}
                Err(SendError::ConnectionClosed) => break,
                Err(err) => warn!(event = %event.event, error = %err, "dropping room event"),
            },
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "room subscriber lagging; events skipped");
            }
        }
    }
}

/// Serialize an event and queue it on the writer channel.
fn send_event(
    tx: &mpsc::UnboundedSender<Message>,
    event: &ServerEvent,
) -> Result<(), SendError> {
    let payload = serde_json::to_string(event)?;
    tx.send(Message::Text(payload.into()))
        .map_err(|_| SendError::ConnectionClosed)
}

/// Tell the client why it is being dropped, then close.
fn reject(tx: &mpsc::UnboundedSender<Message>, message: &str) {
    let event = ServerEvent::json(
        EVENT_ERROR,
        &ErrorEvent {
            message: message.to_string(),
        },
    );
    match event {
        Ok(event) => {
            let _ = send_event(tx, &event);
        }
        Err(err) => warn!(error = %err, "failed to serialize error event"),
    }
    let _ = tx.send(Message::Close(None));
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
