use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::{info, warn};

use crate::{
    dto::ws::{ServerMessage, player_summaries},
    error::ServiceError,
    services::quiz_service,
    state::{
        SharedState,
        room::{PlayerStatus, Room, RoomStatus},
    },
};

/// Kick off the countdown for a room that is waiting to start.
///
/// Validates under the room lock that the room is `Ready` and that no
/// countdown is already running, then spawns the detached countdown task and
/// parks its handle on the room so a close can abort it.
pub async fn start_for_room(
    state: &SharedState,
    handle: Arc<Mutex<Room>>,
    topic: String,
    question_count: usize,
) -> Result<(), ServiceError> {
    let mut room = handle.lock().await;
    if room.status != RoomStatus::Ready {
        return Err(ServiceError::InvalidState(
            "room is not waiting for a topic".into(),
        ));
    }
    if room.countdown.as_ref().is_some_and(|task| !task.is_finished()) {
        return Err(ServiceError::InvalidState(
            "countdown is already running".into(),
        ));
    }

    info!(room_id = %room.id, topic = %topic, question_count, "starting countdown");
    let task = tokio::spawn(run_countdown(
        state.clone(),
        room.id.clone(),
        topic,
        question_count,
    ));
    room.countdown = Some(task);
    Ok(())
}

/// The countdown body: announce, generate, wait out the remaining delay,
/// re-validate the room, then start the game.
///
/// No lock is held while the generator call or the sleep is pending; the room
/// is re-fetched and re-checked afterwards, so a room that started or closed
/// in the meantime is left untouched.
async fn run_countdown(state: SharedState, room_id: String, topic: String, question_count: usize) {
    let countdown = state.config().countdown();

    let members = {
        let Some(handle) = state.catalog().room(&room_id) else {
            return;
        };
        let room = handle.lock().await;
        room.member_ids()
    };
    state.send_to_group(
        &members,
        &ServerMessage::StartCountdown {
            seconds: countdown.as_secs(),
        },
    );

    let started = Instant::now();
    let source = state.question_source();
    let generator = state.config().generator.clone();
    let questions = quiz_service::generate_with_retry(
        source.as_ref(),
        &topic,
        question_count,
        generator.max_attempts,
        std::time::Duration::from_millis(generator.retry_backoff_ms),
    )
    .await;

    if questions.is_empty() {
        warn!(room_id = %room_id, topic = %topic, "question generation exhausted its retries");
        state.send_to_group(
            &members,
            &ServerMessage::error(ServiceError::Generation(format!(
                "could not generate questions for topic `{topic}`"
            ))),
        );
        if let Some(handle) = state.catalog().room(&room_id) {
            let mut room = handle.lock().await;
            room.countdown = None;
        }
        return;
    }

    // A slow generator eats into the countdown; when it overruns, the first
    // question goes out as soon as it is ready.
    let remaining = countdown.saturating_sub(started.elapsed());
    sleep(remaining).await;

    let Some(handle) = state.catalog().room(&room_id) else {
        warn!(room_id = %room_id, "room vanished during countdown");
        return;
    };
    let mut room = handle.lock().await;
    if room.status != RoomStatus::Ready {
        info!(
            room_id = %room_id,
            status = ?room.status,
            "room moved on during countdown; not starting"
        );
        return;
    }

    room.questions = questions;
    for player in room.players.values_mut() {
        player.status = PlayerStatus::WaitingForGame;
        player.current_question_index = 0;
    }
    if let Err(err) = room.advance_status(RoomStatus::GameStarted) {
        warn!(room_id = %room_id, error = %err, "could not start room");
        return;
    }
    room.countdown = None;

    let first_question = room.questions[0].clone();
    let members = room.member_ids();
    let players = player_summaries(&room.player_list());
    info!(room_id = %room_id, players = members.len(), "game started");
    drop(room);

    state.send_to_group(&members, &ServerMessage::PlayersStatus { players });
    state.send_to_group(
        &members,
        &ServerMessage::ReceiveQuestion {
            question: first_question,
        },
    );
}
