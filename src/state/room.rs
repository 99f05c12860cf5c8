use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use utoipa::ToSchema;
use uuid::Uuid;

/// A single generated quiz question with its answer options.
///
/// Immutable once generated. Deserialization accepts both lowercase and the
/// generator's PascalCase field spellings.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuizQuestion {
    /// Question text shown to every player in the room.
    #[serde(alias = "Question")]
    pub question: String,
    /// Answer options in display order; the answer is one of them.
    #[serde(alias = "Options")]
    pub options: Vec<String>,
    /// Correct answer, matched case-insensitively and whitespace-trimmed.
    #[serde(alias = "Answer")]
    pub answer: String,
}

impl QuizQuestion {
    /// Whether `submitted` matches the answer, ignoring case and surrounding
    /// whitespace.
    pub fn accepts(&self, submitted: &str) -> bool {
        submitted.trim().to_lowercase() == self.answer.trim().to_lowercase()
    }
}

/// Lifecycle of a player from the lobby to the end of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum PlayerStatus {
    /// Name submitted, not yet marked ready.
    JustJoined,
    /// Ready and placed in a room, waiting for the game to start.
    ReadyForGame,
    /// Game started; the player is answering questions.
    WaitingForGame,
    /// First player to answer the last question correctly.
    GameWinner,
    /// Connection lost. Terminal.
    Disconnected,
}

/// Per-connection player state, owned by the lobby before room assignment and
/// by exactly one room afterwards.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerSession {
    /// Stable key for the live connection.
    pub connection_id: String,
    /// Display name submitted by the client.
    pub name: String,
    /// Index of the question the player must answer next.
    pub current_question_index: usize,
    /// Current lifecycle status.
    pub status: PlayerStatus,
}

impl PlayerSession {
    /// Create a fresh session for a connection that just submitted its name.
    pub fn new(connection_id: String, name: String) -> Self {
        Self {
            connection_id,
            name,
            current_question_index: 0,
            status: PlayerStatus::JustJoined,
        }
    }
}

/// Lifecycle of a room. Moves strictly forward, never regresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub enum RoomStatus {
    /// Accepting players, below capacity.
    Active,
    /// Full; waiting for a topic and the countdown.
    Ready,
    /// Questions assigned and broadcast; answers are being evaluated.
    GameStarted,
    /// A winner has been recorded; the room only drains.
    Closed,
}

/// Error returned when a room status transition is not legal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid room transition: {from:?} -> {to:?}")]
pub struct InvalidTransition {
    /// Status the room was in.
    pub from: RoomStatus,
    /// Status that was requested.
    pub to: RoomStatus,
}

impl RoomStatus {
    /// Validate a requested transition, returning the new status when legal.
    ///
    /// The only legal moves are the forward steps
    /// `Active -> Ready -> GameStarted -> Closed`; anything else (including
    /// re-entering the current status) is rejected.
    pub fn advance_to(self, to: RoomStatus) -> Result<RoomStatus, InvalidTransition> {
        match (self, to) {
            (RoomStatus::Active, RoomStatus::Ready)
            | (RoomStatus::Ready, RoomStatus::GameStarted)
            | (RoomStatus::GameStarted, RoomStatus::Closed) => Ok(to),
            (from, to) => Err(InvalidTransition { from, to }),
        }
    }
}

/// A bounded group of players sharing one question set and one winner outcome.
#[derive(Debug)]
pub struct Room {
    /// Unique identifier, `room-{uuid}`.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Whether the room is joinable only by password.
    pub is_private: bool,
    /// Join code, present only for private rooms.
    pub password: Option<String>,
    /// Capacity, fixed at creation.
    pub max_players: usize,
    /// Lifecycle status.
    pub status: RoomStatus,
    /// Members keyed by connection id, in join order.
    pub players: IndexMap<String, PlayerSession>,
    /// Question set, empty until a topic has been generated.
    pub questions: Vec<QuizQuestion>,
    /// Winner display name; empty until the winner is decided.
    pub winner_name: String,
    /// Topic chosen at creation time (private rooms); seeds the countdown
    /// when the room fills.
    pub topic: Option<String>,
    /// Handle of the running countdown task, if any, so closing the room can
    /// abort it.
    pub countdown: Option<JoinHandle<()>>,
}

impl Room {
    /// Create an open public room.
    pub fn new_public(name: String, max_players: usize) -> Self {
        Self::new(name, max_players, false, None, None)
    }

    /// Create a private room with a join password and a preset topic.
    pub fn new_private(
        name: String,
        max_players: usize,
        password: String,
        topic: Option<String>,
    ) -> Self {
        Self::new(name, max_players, true, Some(password), topic)
    }

    fn new(
        name: String,
        max_players: usize,
        is_private: bool,
        password: Option<String>,
        topic: Option<String>,
    ) -> Self {
        Self {
            id: format!("room-{}", Uuid::new_v4()),
            name,
            is_private,
            password,
            max_players,
            status: RoomStatus::Active,
            players: IndexMap::new(),
            questions: Vec::new(),
            winner_name: String::new(),
            topic,
            countdown: None,
        }
    }

    /// Whether this room can still accept a player.
    pub fn is_open(&self) -> bool {
        !matches!(self.status, RoomStatus::GameStarted | RoomStatus::Closed)
            && self.winner_name.is_empty()
            && self.players.len() < self.max_players
    }

    /// Insert or overwrite a player entry.
    ///
    /// Returns `false` without mutating when the player is not already a
    /// member and the room is at capacity.
    pub fn insert_player(&mut self, player: PlayerSession) -> bool {
        if !self.players.contains_key(&player.connection_id)
            && self.players.len() >= self.max_players
        {
            return false;
        }
        self.players.insert(player.connection_id.clone(), player);
        true
    }

    /// Remove a player entry, returning it if present.
    pub fn remove_player(&mut self, connection_id: &str) -> Option<PlayerSession> {
        self.players.shift_remove(connection_id)
    }

    /// Apply a validated status transition.
    pub fn advance_status(&mut self, to: RoomStatus) -> Result<(), InvalidTransition> {
        self.status = self.status.advance_to(to)?;
        Ok(())
    }

    /// Record the winner if none has been recorded yet.
    ///
    /// This is the arbitration point: the first caller to observe an empty
    /// winner slot under the room lock wins; every later call is a no-op
    /// returning `false`.
    pub fn try_set_winner(&mut self, name: &str) -> bool {
        if !self.winner_name.is_empty() {
            return false;
        }
        self.winner_name = name.to_string();
        true
    }

    /// Abort the countdown task, if one is still parked on the room.
    pub fn cancel_countdown(&mut self) {
        if let Some(handle) = self.countdown.take() {
            handle.abort();
        }
    }

    /// Snapshot of every member in join order.
    pub fn player_list(&self) -> Vec<PlayerSession> {
        self.players.values().cloned().collect()
    }

    /// Connection ids of every member, for group sends.
    pub fn member_ids(&self) -> Vec<String> {
        self.players.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: &str, name: &str) -> PlayerSession {
        PlayerSession::new(id.to_string(), name.to_string())
    }

    #[test]
    fn status_moves_forward_through_lifecycle() {
        let mut room = Room::new_public("quiz".into(), 2);
        assert_eq!(room.status, RoomStatus::Active);
        room.advance_status(RoomStatus::Ready).unwrap();
        room.advance_status(RoomStatus::GameStarted).unwrap();
        room.advance_status(RoomStatus::Closed).unwrap();
        assert_eq!(room.status, RoomStatus::Closed);
    }

    #[test]
    fn status_rejects_skips_and_regressions() {
        assert_eq!(
            RoomStatus::Active.advance_to(RoomStatus::GameStarted),
            Err(InvalidTransition {
                from: RoomStatus::Active,
                to: RoomStatus::GameStarted,
            })
        );
        assert!(RoomStatus::Ready.advance_to(RoomStatus::Active).is_err());
        assert!(RoomStatus::Closed.advance_to(RoomStatus::Closed).is_err());

        let mut room = Room::new_public("quiz".into(), 2);
        room.advance_status(RoomStatus::Ready).unwrap();
        assert!(room.advance_status(RoomStatus::Ready).is_err());
        assert_eq!(room.status, RoomStatus::Ready);
    }

    #[test]
    fn winner_is_set_exactly_once() {
        let mut room = Room::new_public("quiz".into(), 2);
        assert!(room.try_set_winner("alice"));
        assert!(!room.try_set_winner("bob"));
        assert!(!room.try_set_winner("alice"));
        assert_eq!(room.winner_name, "alice");
    }

    #[test]
    fn insert_respects_capacity_but_allows_overwrite() {
        let mut room = Room::new_public("quiz".into(), 2);
        assert!(room.insert_player(player("c1", "alice")));
        assert!(room.insert_player(player("c2", "bob")));
        assert!(!room.insert_player(player("c3", "carol")));
        assert_eq!(room.players.len(), 2);

        // Re-joining under the same connection replaces the entry in place.
        let mut replacement = player("c2", "bob");
        replacement.status = PlayerStatus::ReadyForGame;
        assert!(room.insert_player(replacement));
        assert_eq!(room.players.len(), 2);
        assert_eq!(room.players["c2"].status, PlayerStatus::ReadyForGame);
    }

    #[test]
    fn open_predicate_tracks_status_winner_and_capacity() {
        let mut room = Room::new_public("quiz".into(), 2);
        assert!(room.is_open());

        room.insert_player(player("c1", "alice"));
        assert!(room.is_open());
        room.insert_player(player("c2", "bob"));
        assert!(!room.is_open());

        room.remove_player("c2");
        assert!(room.is_open());

        room.try_set_winner("alice");
        assert!(!room.is_open());
    }

    #[test]
    fn answers_match_ignoring_case_and_whitespace() {
        let question = QuizQuestion {
            question: "Capital of France?".into(),
            options: vec!["Paris".into(), "London".into(), "Berlin".into(), "Madrid".into()],
            answer: "Paris".into(),
        };
        assert!(question.accepts("Paris"));
        assert!(question.accepts(" paris "));
        assert!(question.accepts("PARIS"));
        assert!(!question.accepts("London"));
    }

    #[test]
    fn questions_parse_from_pascal_case_payloads() {
        let parsed: QuizQuestion = serde_json::from_str(
            r#"{"Question": "Q?", "Options": ["a", "b"], "Answer": "a"}"#,
        )
        .unwrap();
        assert_eq!(parsed.question, "Q?");
        assert_eq!(parsed.options, vec!["a", "b"]);
        assert_eq!(parsed.answer, "a");
    }
}
