use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{ClientMessage, ServerMessage},
    services::{answer_service, room_service},
    state::{ClientConnection, SharedState},
};

/// Handle the full lifecycle for an individual player WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let connection_id = Uuid::new_v4().to_string();
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we
    // await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    state.connections().insert(
        connection_id.clone(),
        ClientConnection {
            id: connection_id.clone(),
            tx: outbound_tx.clone(),
        },
    );
    info!(connection_id, "client connected");

    send_message_to_websocket(&outbound_tx, &ServerMessage::RequestName, "name request");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match ClientMessage::from_json_str(&text) {
                Ok(inbound) => dispatch(&state, &connection_id, inbound).await,
                Err(err) => {
                    warn!(connection_id, error = %err, "failed to parse client message");
                    state.send_to_connection(
                        &connection_id,
                        &ServerMessage::error("unreadable message"),
                    );
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(connection_id, error = %err, "websocket error");
                break;
            }
        }
    }

    room_service::handle_disconnect(&state, &connection_id).await;
    info!(connection_id, "client disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Route one inbound message to its handler; any failure becomes an `Error`
/// event to the caller and the connection stays open.
async fn dispatch(state: &SharedState, connection_id: &str, message: ClientMessage) {
    let result = match message {
        ClientMessage::SubmitName { name } => {
            room_service::handle_submit_name(state, connection_id, &name).await
        }
        ClientMessage::ReadyForGame { is_ready } => {
            room_service::handle_ready(state, connection_id, is_ready).await
        }
        ClientMessage::JoinGameByPassword { password } => {
            room_service::handle_join_by_password(state, connection_id, &password).await
        }
        ClientMessage::CreatePrivateRoomAndReady {
            room_name,
            topic,
            max_players,
        } => {
            room_service::handle_create_private_room(
                state,
                connection_id,
                &room_name,
                &topic,
                max_players,
            )
            .await
        }
        ClientMessage::SetQuizTopic {
            topic,
            num_questions,
        } => room_service::handle_set_topic(state, connection_id, &topic, num_questions).await,
        ClientMessage::SubmitAnswer { answer } => {
            answer_service::mark_answer(state, connection_id, &answer).await
        }
        ClientMessage::Ping => {
            state.send_to_connection(connection_id, &ServerMessage::pong());
            Ok(())
        }
        ClientMessage::Unknown => {
            debug!(connection_id, "ignoring unknown message type");
            Ok(())
        }
    };

    if let Err(err) = result {
        warn!(connection_id, error = %err, "inbound message failed");
        state.send_to_connection(connection_id, &ServerMessage::error(&err));
    }
}

/// Serialize a payload and push it onto the provided writer channel.
///
/// Serialization failure is a bug in our own types; it is logged and the
/// message dropped. A closed writer means the client is gone, which the
/// socket loop cleans up on its own.
pub fn send_message_to_websocket<T>(tx: &mpsc::UnboundedSender<Message>, value: &T, context: &str)
where
    T: ?Sized + serde::Serialize + std::fmt::Debug,
{
    let payload = match serde_json::to_string(value) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, context, "failed to serialize outbound message `{value:?}`");
            return;
        }
    };

    if tx.send(Message::Text(payload.into())).is_err() {
        debug!(context, "writer channel closed, dropping message");
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
