use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    dto::format_system_time,
    state::{
        catalog::RoomSnapshot,
        room::{PlayerSession, PlayerStatus, QuizQuestion, RoomStatus},
    },
};

#[derive(Debug, Deserialize, Serialize, ToSchema)]
/// Messages accepted from quiz clients.
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Submit or update the display name for this connection.
    SubmitName {
        /// Chosen display name.
        name: String,
    },
    /// Ask to be matched into a public room.
    ReadyForGame {
        /// Only `true` triggers matchmaking; `false` is ignored.
        is_ready: bool,
    },
    /// Join the private room protected by this code.
    JoinGameByPassword {
        /// Join code distributed by the room owner.
        password: String,
    },
    /// Create a private room and enter it as its first member.
    CreatePrivateRoomAndReady {
        /// Display name for the new room.
        room_name: String,
        /// Topic used to generate questions once the room fills.
        topic: String,
        /// Optional capacity override.
        max_players: Option<usize>,
    },
    /// Choose the quiz topic for a room that is waiting to start.
    SetQuizTopic {
        /// Free-form topic string handed to the generator.
        topic: String,
        /// Optional number of questions to generate.
        num_questions: Option<usize>,
    },
    /// Submit an answer to the caller's current question.
    SubmitAnswer {
        /// Submitted answer text.
        answer: String,
    },
    /// Liveness probe.
    Ping,
    /// Unrecognized message type, ignored.
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Parse an inbound frame.
    pub fn from_json_str(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Messages pushed to quiz clients, addressed to one connection or to a
/// room's whole group.
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Ask the connection to submit a display name.
    RequestName,
    /// Ask the first ready player to pick the quiz topic.
    RequestSetTopic,
    /// Confirm room creation to its owner, join code included.
    RoomCreated {
        /// The freshly created room.
        room: RoomSummary,
    },
    /// Roster update for everyone in the room.
    PlayersStatus {
        /// Members in join order.
        players: Vec<PlayerSummary>,
    },
    /// The game starts in `seconds`.
    StartCountdown {
        /// Countdown length.
        seconds: u64,
    },
    /// Deliver a question to a player.
    ReceiveQuestion {
        /// The question to answer.
        question: QuizQuestion,
    },
    /// The submitted answer was wrong; the index identifies the question to
    /// retry.
    IncorrectAnswer {
        /// Index of the question the player is still on.
        question_index: usize,
    },
    /// The game ended; the roster includes the winner.
    GameOver {
        /// Final roster.
        players: Vec<PlayerSummary>,
    },
    /// Something went wrong with the caller's request.
    Error {
        /// Human-readable description.
        message: String,
    },
    /// Liveness reply.
    Pong {
        /// Server wall-clock time, RFC 3339.
        server_time: String,
    },
}

impl ServerMessage {
    /// Build a `Pong` stamped with the current server time.
    pub fn pong() -> Self {
        Self::Pong {
            server_time: format_system_time(std::time::SystemTime::now()),
        }
    }

    /// Build an `Error` event from anything displayable.
    pub fn error(message: impl std::fmt::Display) -> Self {
        Self::Error {
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Wire view of a player.
pub struct PlayerSummary {
    /// Connection the player is attached to.
    pub connection_id: String,
    /// Display name.
    pub name: String,
    /// Index of the question the player must answer next.
    pub current_question_index: usize,
    /// Lifecycle status.
    pub status: PlayerStatus,
}

impl From<&PlayerSession> for PlayerSummary {
    fn from(player: &PlayerSession) -> Self {
        Self {
            connection_id: player.connection_id.clone(),
            name: player.name.clone(),
            current_question_index: player.current_question_index,
            status: player.status,
        }
    }
}

/// Wire views for a list of players.
pub fn player_summaries(players: &[PlayerSession]) -> Vec<PlayerSummary> {
    players.iter().map(PlayerSummary::from).collect()
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Wire view of a room, sent to its owner on creation.
pub struct RoomSummary {
    /// Room identifier.
    pub room_id: String,
    /// Display name.
    pub room_name: String,
    /// Whether joining requires the password.
    pub is_private: bool,
    /// Join code; present so a private-room owner can distribute it.
    pub room_password: Option<String>,
    /// Capacity.
    pub max_players: usize,
    /// Status at the time of the snapshot.
    pub status: RoomStatus,
}

impl From<&RoomSnapshot> for RoomSummary {
    fn from(snapshot: &RoomSnapshot) -> Self {
        Self {
            room_id: snapshot.room_id.clone(),
            room_name: snapshot.room_name.clone(),
            is_private: snapshot.is_private,
            room_password: snapshot.password.clone(),
            max_players: snapshot.max_players,
            status: snapshot.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_frames_parse_by_tag() {
        let msg = ClientMessage::from_json_str(
            r#"{"type": "submitName", "name": "alice"}"#,
        )
        .unwrap();
        assert!(matches!(msg, ClientMessage::SubmitName { name } if name == "alice"));

        let msg = ClientMessage::from_json_str(
            r#"{"type": "setQuizTopic", "topic": "NBA", "numQuestions": 4}"#,
        )
        .unwrap();
        assert!(matches!(
            msg,
            ClientMessage::SetQuizTopic { topic, num_questions: Some(4) } if topic == "NBA"
        ));
    }

    #[test]
    fn unknown_frame_types_are_tolerated() {
        let msg = ClientMessage::from_json_str(r#"{"type": "somethingElse"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Unknown));
    }
}
