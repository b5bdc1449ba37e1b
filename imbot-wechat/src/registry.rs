//! Whitelisted channels of the current session, keyed by resolved network id.

use std::collections::HashMap;
use std::sync::Arc;

use imbot_core::Identifiable;

use crate::channel::WechatChannel;

/// Rooms and contacts the bot accepts events from. Filled once per session at login.
#[derive(Default)]
pub struct ChannelRegistry {
    rooms: HashMap<String, Arc<WechatChannel>>,
    contacts: HashMap<String, Arc<WechatChannel>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_room(&mut self, channel: Arc<WechatChannel>) {
        self.rooms.insert(channel.id().to_string(), channel);
    }

    pub fn insert_contact(&mut self, channel: Arc<WechatChannel>) {
        self.contacts.insert(channel.id().to_string(), channel);
    }

    pub fn room(&self, id: &str) -> Option<Arc<WechatChannel>> {
        self.rooms.get(id).cloned()
    }

    pub fn contact(&self, id: &str) -> Option<Arc<WechatChannel>> {
        self.contacts.get(id).cloned()
    }

    pub fn room_ids(&self) -> Vec<String> {
        self.rooms.keys().cloned().collect()
    }

    pub fn contact_ids(&self) -> Vec<String> {
        self.contacts.keys().cloned().collect()
    }

    /// Every registered channel, rooms first.
    pub fn channels(&self) -> impl Iterator<Item = &Arc<WechatChannel>> {
        self.rooms.values().chain(self.contacts.values())
    }

    /// Runs a reclamation sweep on every channel. Returns the total number of removed threads.
    pub fn reclaim_threads(&self) -> usize {
        self.channels().map(|channel| channel.reclaim_threads()).sum()
    }

    /// Drops every channel (session teardown).
    pub fn clear(&mut self) {
        self.rooms.clear();
        self.contacts.clear();
    }
}
