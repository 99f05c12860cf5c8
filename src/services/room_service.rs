use tracing::{debug, info, warn};

use crate::{
    dto::{
        validation::{validate_display_name, validate_topic},
        ws::{RoomSummary, ServerMessage, player_summaries},
    },
    error::ServiceError,
    services::countdown_service,
    state::{SharedState, catalog::RoomSnapshot, room::PlayerSession},
};

/// Record the display name for a connection in the lobby.
pub async fn handle_submit_name(
    state: &SharedState,
    connection_id: &str,
    name: &str,
) -> Result<(), ServiceError> {
    validate_display_name(name).map_err(|err| ServiceError::InvalidInput(err.to_string()))?;
    state
        .lobby()
        .submit_name(connection_id, name.trim().to_string());
    debug!(connection_id, name = %name.trim(), "name submitted");
    Ok(())
}

/// Match a named connection into an open public room.
pub async fn handle_ready(
    state: &SharedState,
    connection_id: &str,
    is_ready: bool,
) -> Result<(), ServiceError> {
    if !is_ready {
        debug!(connection_id, "ignoring not-ready signal");
        return Ok(());
    }
    let player = pending_player(state, connection_id)?;
    let snapshot = state.catalog().join(player).await?;
    state.lobby().remove(connection_id);
    info!(
        connection_id,
        room_id = %snapshot.room_id,
        players = snapshot.players.len(),
        "player joined room"
    );

    broadcast_roster(state, &snapshot);
    if snapshot.became_ready {
        on_room_filled(state, &snapshot).await;
    }
    Ok(())
}

/// Join the private room matching the submitted code.
pub async fn handle_join_by_password(
    state: &SharedState,
    connection_id: &str,
    password: &str,
) -> Result<(), ServiceError> {
    let player = pending_player(state, connection_id)?;
    let snapshot = state
        .catalog()
        .join_by_password(player, password.trim())
        .await
        .ok_or_else(|| ServiceError::NotFound("no open room with that password".into()))?;
    state.lobby().remove(connection_id);
    info!(
        connection_id,
        room_id = %snapshot.room_id,
        "player joined private room"
    );

    broadcast_roster(state, &snapshot);
    if snapshot.became_ready {
        on_room_filled(state, &snapshot).await;
    }
    Ok(())
}

/// Create a private room with a preset topic and enter it as the owner.
pub async fn handle_create_private_room(
    state: &SharedState,
    connection_id: &str,
    room_name: &str,
    topic: &str,
    max_players: Option<usize>,
) -> Result<(), ServiceError> {
    validate_display_name(room_name)
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;
    validate_topic(topic).map_err(|err| ServiceError::InvalidInput(err.to_string()))?;
    let max_players = max_players.unwrap_or(state.config().room_capacity);
    if max_players == 0 {
        return Err(ServiceError::InvalidInput(
            "room capacity must be at least one".into(),
        ));
    }

    let owner = pending_player(state, connection_id)?;
    let snapshot = state
        .catalog()
        .create_private_room(
            room_name,
            owner,
            max_players,
            Some(topic.trim().to_string()),
        )
        .await?;
    state.lobby().remove(connection_id);
    info!(
        connection_id,
        room_id = %snapshot.room_id,
        max_players,
        "private room created"
    );

    state.send_to_connection(
        connection_id,
        &ServerMessage::RoomCreated {
            room: RoomSummary::from(&snapshot),
        },
    );
    broadcast_roster(state, &snapshot);
    if snapshot.became_ready {
        on_room_filled(state, &snapshot).await;
    }
    Ok(())
}

/// Pick the quiz topic for the caller's room and start the countdown.
pub async fn handle_set_topic(
    state: &SharedState,
    connection_id: &str,
    topic: &str,
    num_questions: Option<usize>,
) -> Result<(), ServiceError> {
    validate_topic(topic).map_err(|err| ServiceError::InvalidInput(err.to_string()))?;
    let Some(handle) = state.catalog().room_by_connection(connection_id) else {
        return Err(ServiceError::NotFound("you are not in a room".into()));
    };
    let count = num_questions
        .unwrap_or(state.config().default_question_count)
        .max(1);
    countdown_service::start_for_room(state, handle, topic.trim().to_string(), count).await
}

/// Tear down a connection: lobby entry, room membership, socket registry.
pub async fn handle_disconnect(state: &SharedState, connection_id: &str) {
    state.connections().remove(connection_id);
    state.lobby().remove(connection_id);

    if let Some(departure) = state.catalog().leave(connection_id).await {
        info!(
            connection_id,
            room_id = %departure.room_id,
            remaining = departure.remaining.len(),
            room_removed = departure.room_removed,
            "player left room"
        );
        let members: Vec<String> = departure
            .remaining
            .iter()
            .map(|player| player.connection_id.clone())
            .collect();
        state.send_to_group(
            &members,
            &ServerMessage::PlayersStatus {
                players: player_summaries(&departure.remaining),
            },
        );
    }
}

fn pending_player(
    state: &SharedState,
    connection_id: &str,
) -> Result<PlayerSession, ServiceError> {
    state.lobby().get(connection_id).ok_or_else(|| {
        ServiceError::InvalidState("submit a name before joining a game".into())
    })
}

fn broadcast_roster(state: &SharedState, snapshot: &RoomSnapshot) {
    let members: Vec<String> = snapshot
        .players
        .iter()
        .map(|player| player.connection_id.clone())
        .collect();
    state.send_to_group(
        &members,
        &ServerMessage::PlayersStatus {
            players: player_summaries(&snapshot.players),
        },
    );
}

/// A room just reached capacity: start the countdown with its preset topic,
/// or ask the first player to pick one.
async fn on_room_filled(state: &SharedState, snapshot: &RoomSnapshot) {
    if let Some(topic) = snapshot.preset_topic.clone() {
        let Some(handle) = state.catalog().room(&snapshot.room_id) else {
            return;
        };
        let count = state.config().default_question_count;
        if let Err(err) =
            countdown_service::start_for_room(state, handle, topic, count).await
        {
            warn!(
                room_id = %snapshot.room_id,
                error = %err,
                "could not start countdown for filled room"
            );
        }
    } else if let Some(first) = snapshot.players.first() {
        state.send_to_connection(&first.connection_id, &ServerMessage::RequestSetTopic);
    }
}
