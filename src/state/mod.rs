pub mod catalog;
pub mod lobby;
pub mod room;

use std::sync::Arc;

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::{
    config::AppConfig,
    dto::ws::ServerMessage,
    services::{quiz_service::QuestionSource, websocket_service::send_message_to_websocket},
    state::{catalog::RoomCatalog, lobby::Lobby},
};

/// Shared handle to the application state.
pub type SharedState = Arc<AppState>;

#[derive(Clone)]
/// Handle used to push messages to a connected client.
pub struct ClientConnection {
    /// Connection identifier.
    pub id: String,
    /// Channel into the connection's dedicated writer task.
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Central application state: live connections, the lobby, the room catalog,
/// and the question generator handle.
pub struct AppState {
    config: AppConfig,
    connections: DashMap<String, ClientConnection>,
    lobby: Lobby,
    catalog: RoomCatalog,
    questions: Arc<dyn QuestionSource>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned
    /// cheaply.
    pub fn new(config: AppConfig, questions: Arc<dyn QuestionSource>) -> SharedState {
        let catalog = RoomCatalog::new(config.room_capacity, config.default_room_name.clone());
        Arc::new(Self {
            config,
            connections: DashMap::new(),
            lobby: Lobby::new(),
            catalog,
            questions,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Registry of active client sockets keyed by connection id.
    pub fn connections(&self) -> &DashMap<String, ClientConnection> {
        &self.connections
    }

    /// Pre-room holding area for named connections.
    pub fn lobby(&self) -> &Lobby {
        &self.lobby
    }

    /// Room catalog.
    pub fn catalog(&self) -> &RoomCatalog {
        &self.catalog
    }

    /// Handle to the question generator.
    pub fn question_source(&self) -> Arc<dyn QuestionSource> {
        self.questions.clone()
    }

    /// Push a message to a single connection. Drops silently when the
    /// connection is gone; disconnect cleanup happens in the socket loop.
    pub fn send_to_connection(&self, connection_id: &str, message: &ServerMessage) {
        let Some(connection) = self.connections.get(connection_id) else {
            return;
        };
        let tx = connection.tx.clone();
        drop(connection);
        send_message_to_websocket(&tx, message, "outbound event");
    }

    /// Push a message to every listed connection (a room's broadcast group).
    pub fn send_to_group(&self, connection_ids: &[String], message: &ServerMessage) {
        for connection_id in connection_ids {
            self.send_to_connection(connection_id, message);
        }
    }
}
