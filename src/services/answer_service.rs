use tracing::{debug, warn};

use crate::{
    dto::ws::{PlayerSummary, ServerMessage, player_summaries},
    error::ServiceError,
    state::{
        SharedState,
        room::{PlayerStatus, QuizQuestion, RoomStatus},
    },
};

/// What a submitted answer led to, computed under the room lock and acted on
/// after it is released.
enum Verdict {
    /// Correct, more questions remain; deliver the next one to the caller.
    Advance(QuizQuestion),
    /// Correct on the last question and first through the gate.
    Won {
        members: Vec<String>,
        players: Vec<PlayerSummary>,
    },
    /// Correct on the last question, but the winner was already decided.
    /// Deliberately silent: the desired outcome already happened.
    RaceLost,
    /// Wrong (or no pending question); the index tells the caller what to
    /// retry.
    Incorrect(usize),
}

/// Evaluate a submitted answer for the caller's current question.
///
/// The room lock is the arbitration boundary: among simultaneous correct
/// submissions on the last question, the first task through the lock records
/// the winner and every later one finds the slot taken.
pub async fn mark_answer(
    state: &SharedState,
    connection_id: &str,
    answer: &str,
) -> Result<(), ServiceError> {
    let Some(handle) = state.catalog().room_by_connection(connection_id) else {
        return Err(ServiceError::NotFound("you are not in a room".into()));
    };

    let verdict = {
        let mut room = handle.lock().await;

        let Some(player) = room.players.get(connection_id) else {
            return Err(ServiceError::NotFound("player is not in this room".into()));
        };
        let index = player.current_question_index;
        let name = player.name.clone();

        if index >= room.questions.len() {
            // No pending question for this player (game not started, or the
            // player already ran out of questions).
            Verdict::Incorrect(index)
        } else if !room.questions[index].accepts(answer) {
            Verdict::Incorrect(index)
        } else if index + 1 < room.questions.len() {
            if let Some(player) = room.players.get_mut(connection_id) {
                player.current_question_index = index + 1;
            }
            Verdict::Advance(room.questions[index + 1].clone())
        } else if room.try_set_winner(&name) {
            if let Some(player) = room.players.get_mut(connection_id) {
                player.status = PlayerStatus::GameWinner;
            }
            if let Err(err) = room.advance_status(RoomStatus::Closed) {
                warn!(room_id = %room.id, error = %err, "could not close finished room");
            }
            room.cancel_countdown();
            Verdict::Won {
                members: room.member_ids(),
                players: player_summaries(&room.player_list()),
            }
        } else {
            Verdict::RaceLost
        }
    };

    match verdict {
        Verdict::Advance(question) => {
            state.send_to_connection(connection_id, &ServerMessage::ReceiveQuestion { question });
        }
        Verdict::Won { members, players } => {
            state.send_to_group(&members, &ServerMessage::GameOver { players });
        }
        Verdict::RaceLost => {
            debug!(connection_id, "correct final answer after the winner was decided");
        }
        Verdict::Incorrect(question_index) => {
            state.send_to_connection(
                connection_id,
                &ServerMessage::IncorrectAnswer { question_index },
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use futures::future::BoxFuture;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use super::*;
    use crate::{
        config::AppConfig,
        services::quiz_service::{GenerationError, QuestionSource},
        state::{AppState, ClientConnection, room::PlayerSession},
    };

    /// The evaluator never generates; this source just satisfies the wiring.
    struct Unused;

    impl QuestionSource for Unused {
        fn generate(
            &self,
            _topic: &str,
            _count: usize,
        ) -> BoxFuture<'static, Result<Vec<QuizQuestion>, GenerationError>> {
            Box::pin(async { Ok(Vec::new()) })
        }
    }

    fn question(text: &str, answer: &str) -> QuizQuestion {
        QuizQuestion {
            question: text.into(),
            options: vec![answer.into(), "other".into()],
            answer: answer.into(),
        }
    }

    fn connect(
        state: &SharedState,
        id: &str,
    ) -> mpsc::UnboundedReceiver<axum::extract::ws::Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        state.connections().insert(
            id.to_string(),
            ClientConnection {
                id: id.to_string(),
                tx,
            },
        );
        rx
    }

    async fn next_event(
        rx: &mut mpsc::UnboundedReceiver<axum::extract::ws::Message>,
    ) -> serde_json::Value {
        let message = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("event expected")
            .expect("channel open");
        match message {
            axum::extract::ws::Message::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    /// Two players in a started room with the given questions.
    async fn started_room(questions: Vec<QuizQuestion>) -> SharedState {
        let config = AppConfig {
            room_capacity: 2,
            ..AppConfig::default()
        };
        let state = AppState::new(config, Arc::new(Unused));
        state
            .catalog()
            .join(PlayerSession::new("c0".into(), "alice".into()))
            .await
            .unwrap();
        let snapshot = state
            .catalog()
            .join(PlayerSession::new("c1".into(), "bob".into()))
            .await
            .unwrap();

        let handle = state.catalog().room(&snapshot.room_id).unwrap();
        let mut room = handle.lock().await;
        room.questions = questions;
        for player in room.players.values_mut() {
            player.status = PlayerStatus::WaitingForGame;
        }
        room.advance_status(RoomStatus::GameStarted).unwrap();
        drop(room);
        state
    }

    #[tokio::test]
    async fn correct_answer_advances_and_delivers_only_to_the_caller() {
        let state = started_room(vec![question("Q1?", "Paris"), question("Q2?", "Blue")]).await;
        let mut rx0 = connect(&state, "c0");
        let mut rx1 = connect(&state, "c1");

        mark_answer(&state, "c0", " paris ").await.unwrap();

        let event = next_event(&mut rx0).await;
        assert_eq!(event["type"], "receiveQuestion");
        assert_eq!(event["question"]["question"], "Q2?");
        assert!(rx1.try_recv().is_err());

        let room = state.catalog().room_by_connection("c0").unwrap();
        let room = room.lock().await;
        assert_eq!(room.players["c0"].current_question_index, 1);
        assert_eq!(room.players["c1"].current_question_index, 0);
    }

    #[tokio::test]
    async fn wrong_answer_reports_the_index_and_changes_nothing() {
        let state = started_room(vec![question("Q1?", "Paris")]).await;
        let mut rx0 = connect(&state, "c0");

        mark_answer(&state, "c0", "London").await.unwrap();

        let event = next_event(&mut rx0).await;
        assert_eq!(event["type"], "incorrectAnswer");
        assert_eq!(event["questionIndex"], 0);

        let room = state.catalog().room_by_connection("c0").unwrap();
        let room = room.lock().await;
        assert_eq!(room.players["c0"].current_question_index, 0);
        assert!(room.winner_name.is_empty());
    }

    #[tokio::test]
    async fn last_correct_answer_wins_closes_and_broadcasts_game_over() {
        let state = started_room(vec![question("Q1?", "Paris"), question("Q2?", "Blue")]).await;
        let mut rx0 = connect(&state, "c0");
        let mut rx1 = connect(&state, "c1");

        mark_answer(&state, "c0", "Paris").await.unwrap();
        next_event(&mut rx0).await; // next question
        mark_answer(&state, "c0", "blue").await.unwrap();

        let event = next_event(&mut rx0).await;
        assert_eq!(event["type"], "gameOver");
        let event = next_event(&mut rx1).await;
        assert_eq!(event["type"], "gameOver");
        let winner = event["players"]
            .as_array()
            .unwrap()
            .iter()
            .find(|p| p["status"] == "GameWinner")
            .unwrap();
        assert_eq!(winner["name"], "alice");

        let room = state.catalog().room_by_connection("c0").unwrap();
        let room = room.lock().await;
        assert_eq!(room.winner_name, "alice");
        assert_eq!(room.status, RoomStatus::Closed);
    }

    #[tokio::test]
    async fn a_retried_final_answer_does_not_win_twice() {
        let state = started_room(vec![question("Q1?", "Paris")]).await;
        let mut rx0 = connect(&state, "c0");
        let _rx1 = connect(&state, "c1");

        mark_answer(&state, "c0", "Paris").await.unwrap();
        let event = next_event(&mut rx0).await;
        assert_eq!(event["type"], "gameOver");

        // Simulated message retry: silently absorbed.
        mark_answer(&state, "c0", "Paris").await.unwrap();
        assert!(rx0.try_recv().is_err());

        let room = state.catalog().room_by_connection("c0").unwrap();
        let room = room.lock().await;
        assert_eq!(room.winner_name, "alice");
    }

    #[tokio::test]
    async fn concurrent_final_answers_produce_exactly_one_winner() {
        let state = started_room(vec![question("Q1?", "Paris")]).await;
        let _rx0 = connect(&state, "c0");
        let _rx1 = connect(&state, "c1");

        let a = {
            let state = state.clone();
            tokio::spawn(async move { mark_answer(&state, "c0", "Paris").await })
        };
        let b = {
            let state = state.clone();
            tokio::spawn(async move { mark_answer(&state, "c1", "Paris").await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let room = state.catalog().room_by_connection("c0").unwrap();
        let room = room.lock().await;
        assert!(room.winner_name == "alice" || room.winner_name == "bob");
        let winners = room
            .players
            .values()
            .filter(|p| p.status == PlayerStatus::GameWinner)
            .count();
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn answers_from_unassigned_connections_are_rejected() {
        let state = AppState::new(AppConfig::default(), Arc::new(Unused));
        let err = mark_answer(&state, "ghost", "Paris").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
