use std::sync::Arc;

use dashmap::DashMap;
use rand::Rng;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    error::ServiceError,
    state::room::{PlayerSession, PlayerStatus, Room, RoomStatus},
};

/// Snapshot of a room taken under its lock, handed back to callers so they
/// can notify clients without re-locking.
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    /// Room identifier.
    pub room_id: String,
    /// Display name.
    pub room_name: String,
    /// Whether the room is password-protected.
    pub is_private: bool,
    /// Join code for private rooms.
    pub password: Option<String>,
    /// Capacity.
    pub max_players: usize,
    /// Status at snapshot time.
    pub status: RoomStatus,
    /// Members in join order.
    pub players: Vec<PlayerSession>,
    /// Topic preset at creation time, if any.
    pub preset_topic: Option<String>,
    /// Whether this operation flipped the room to `Ready`.
    pub became_ready: bool,
}

/// Result of removing a player from their room.
#[derive(Debug, Clone)]
pub struct Departure {
    /// Room the player left.
    pub room_id: String,
    /// The removed session, marked `Disconnected`.
    pub player: PlayerSession,
    /// Members still in the room.
    pub remaining: Vec<PlayerSession>,
    /// Whether the room itself was dropped from the catalog.
    pub room_removed: bool,
}

/// Owns every room plus the connection -> room membership index.
///
/// Lock tiers: the matchmaking gate serializes only the find-or-create
/// decision; each room's `Mutex` guards that room's members, status,
/// questions, and winner. The gate is acquired before a room lock and no
/// `DashMap` guard is ever held across an `.await`, so the tiers cannot
/// deadlock. Membership lookups read the index without locking and may see a
/// stale entry; mutators re-validate under the room lock.
pub struct RoomCatalog {
    rooms: DashMap<String, Arc<Mutex<Room>>>,
    members: DashMap<String, String>,
    matchmaking_gate: Mutex<()>,
    default_capacity: usize,
    default_room_name: String,
}

impl RoomCatalog {
    /// Create an empty catalog with the defaults used for public rooms.
    pub fn new(default_capacity: usize, default_room_name: String) -> Self {
        Self {
            rooms: DashMap::new(),
            members: DashMap::new(),
            matchmaking_gate: Mutex::new(()),
            default_capacity,
            default_room_name,
        }
    }

    /// Number of rooms currently tracked.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Number of connections currently assigned to a room.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Handle to a room by id.
    pub fn room(&self, room_id: &str) -> Option<Arc<Mutex<Room>>> {
        self.rooms.get(room_id).map(|entry| entry.value().clone())
    }

    /// Room id a connection is assigned to, if any. Index read, may be stale.
    pub fn room_id_of(&self, connection_id: &str) -> Option<String> {
        self.members.get(connection_id).map(|entry| entry.value().clone())
    }

    /// Handle to the room a connection belongs to, if any.
    pub fn room_by_connection(&self, connection_id: &str) -> Option<Arc<Mutex<Room>>> {
        let room_id = self.room_id_of(connection_id)?;
        self.room(&room_id)
    }

    /// Assign a player to an open public room, creating one when no room has
    /// a free slot.
    ///
    /// The whole find-or-create decision runs under the matchmaking gate so
    /// two simultaneous joiners cannot both conclude "no open room" and
    /// create two rooms where one would do.
    pub async fn join(&self, player: PlayerSession) -> Result<RoomSnapshot, ServiceError> {
        let _gate = self.matchmaking_gate.lock().await;

        for handle in self.room_handles() {
            let mut room = handle.lock().await;
            if !room.is_open() || room.is_private {
                continue;
            }
            if let Some(snapshot) = Self::admit(&mut room, player.clone()) {
                self.members
                    .insert(player.connection_id.clone(), room.id.clone());
                return Ok(snapshot);
            }
        }

        let room = Room::new_public(self.default_room_name.clone(), self.default_capacity);
        let room_id = room.id.clone();
        info!(room_id = %room_id, "created public room");
        let handle = Arc::new(Mutex::new(room));
        self.rooms.insert(room_id.clone(), handle.clone());

        let mut room = handle.lock().await;
        let snapshot = Self::admit(&mut room, player.clone())
            .ok_or_else(|| ServiceError::InvalidState("freshly created room is full".into()))?;
        self.members.insert(player.connection_id, room_id);
        Ok(snapshot)
    }

    /// Assign a player to the open room matching `password` exactly.
    ///
    /// Returns `None` when no such room exists or the room has no free slot.
    pub async fn join_by_password(
        &self,
        player: PlayerSession,
        password: &str,
    ) -> Option<RoomSnapshot> {
        let _gate = self.matchmaking_gate.lock().await;

        for handle in self.room_handles() {
            let mut room = handle.lock().await;
            if room.password.as_deref() != Some(password) || !room.is_open() {
                continue;
            }
            if let Some(snapshot) = Self::admit(&mut room, player.clone()) {
                self.members
                    .insert(player.connection_id.clone(), room.id.clone());
                return Some(snapshot);
            }
        }
        None
    }

    /// Create a private room with a freshly generated join code and the owner
    /// as its first member.
    pub async fn create_private_room(
        &self,
        name: &str,
        owner: PlayerSession,
        max_players: usize,
        topic: Option<String>,
    ) -> Result<RoomSnapshot, ServiceError> {
        if name.trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "room name must not be empty".into(),
            ));
        }
        if owner.name.trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "room owner has no name".into(),
            ));
        }

        let room = Room::new_private(
            name.trim().to_string(),
            max_players,
            generate_join_code(),
            topic,
        );
        let room_id = room.id.clone();
        info!(room_id = %room_id, max_players, "created private room");
        let handle = Arc::new(Mutex::new(room));
        self.rooms.insert(room_id.clone(), handle.clone());

        let mut room = handle.lock().await;
        let snapshot = Self::admit(&mut room, owner.clone())
            .ok_or_else(|| ServiceError::InvalidState("freshly created room is full".into()))?;
        self.members.insert(owner.connection_id, room_id);
        Ok(snapshot)
    }

    /// Remove a connection from its room.
    ///
    /// The room itself is dropped from the catalog only when it is empty
    /// *and* closed; a room that empties out mid-game keeps its winner record
    /// and question set until the close transition lands.
    pub async fn leave(&self, connection_id: &str) -> Option<Departure> {
        let room_id = self.room_id_of(connection_id)?;
        let handle = self.room(&room_id)?;
        let mut room = handle.lock().await;

        let mut player = room.remove_player(connection_id)?;
        player.status = PlayerStatus::Disconnected;
        self.members.remove(connection_id);

        let room_removed = room.players.is_empty() && room.status == RoomStatus::Closed;
        if room_removed {
            room.cancel_countdown();
            self.rooms.remove(&room_id);
            info!(room_id = %room_id, "removed drained room");
        }

        Some(Departure {
            room_id,
            player,
            remaining: room.player_list(),
            room_removed,
        })
    }

    /// Transition a room's status under its lock.
    pub async fn set_status(
        &self,
        room_id: &str,
        to: RoomStatus,
    ) -> Result<RoomStatus, ServiceError> {
        let Some(handle) = self.room(room_id) else {
            warn!(room_id = %room_id, "cannot set status: room vanished");
            return Err(ServiceError::NotFound(format!("room `{room_id}` not found")));
        };
        let mut room = handle.lock().await;
        room.advance_status(to)
            .map_err(|err| ServiceError::InvalidState(err.to_string()))?;
        if to == RoomStatus::Closed {
            room.cancel_countdown();
        }
        Ok(room.status)
    }

    /// Clone out every room handle.
    ///
    /// Iteration holds `DashMap` shard guards, so handles are collected
    /// before any of them is locked.
    fn room_handles(&self) -> Vec<Arc<Mutex<Room>>> {
        self.rooms.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Insert the player and flip the room to `Ready` when it fills.
    fn admit(room: &mut Room, mut player: PlayerSession) -> Option<RoomSnapshot> {
        player.status = PlayerStatus::ReadyForGame;
        if !room.insert_player(player) {
            return None;
        }

        let became_ready = room.status == RoomStatus::Active
            && room.players.len() >= room.max_players
            && room.advance_status(RoomStatus::Ready).is_ok();

        Some(RoomSnapshot {
            room_id: room.id.clone(),
            room_name: room.name.clone(),
            is_private: room.is_private,
            password: room.password.clone(),
            max_players: room.max_players,
            status: room.status,
            players: room.player_list(),
            preset_topic: room.topic.clone(),
            became_ready,
        })
    }
}

/// Six-digit numeric join code from the thread-local CSPRNG.
fn generate_join_code() -> String {
    format!("{:06}", rand::rng().random_range(0..1_000_000))
}
