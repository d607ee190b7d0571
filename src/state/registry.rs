//! Process-wide room table.
//!
//! The map's shard locks are the only registry-level synchronisation and are
//! never held across a room mutex: callers clone the `Arc<Room>` out and the
//! guard drops before the room is locked.

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use rand::Rng;

use crate::state::room::{Player, Room};

/// Registry mapping 4-digit room codes to live rooms.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: DashMap<String, Arc<Room>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a room owned by `first_player` under a fresh random 4-digit
    /// code. Collisions retry; with a 10 000-code space this stays cheap
    /// until the registry is nearly full.
    pub fn create(&self, first_player: Player) -> Arc<Room> {
        let mut rng = rand::rng();
        loop {
            let id = format!("{:04}", rng.random_range(0..10_000));
            match self.rooms.entry(id.clone()) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    let room = Arc::new(Room::new(id, first_player));
                    slot.insert(room.clone());
                    return room;
                }
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<Room>> {
        self.rooms.get(id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, id: &str) {
        self.rooms.remove(id);
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
