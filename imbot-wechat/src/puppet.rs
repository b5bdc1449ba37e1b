//! Transport boundary: the [`Puppet`] trait and the wire types it exchanges with the bot.
//!
//! A puppet owns the physical WeChat session (login handshake, protocol, reconnects). The bot only
//! sees the events it emits and the few lookups and the single send primitive below.

use async_trait::async_trait;
use imbot_core::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// A contact as reported by the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    /// True when this contact is the logged-in account.
    #[serde(default, rename = "self")]
    pub is_self: bool,
}

impl Contact {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            alias: None,
            is_self: false,
        }
    }

    /// The logged-in account.
    pub fn myself(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            is_self: true,
            ..Self::new(id, name)
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// True if `name` is this contact's display name or alias.
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.alias.as_deref() == Some(name)
    }
}

/// A group chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub topic: String,
}

impl Room {
    pub fn new(id: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            topic: topic.into(),
        }
    }
}

/// Content type of an incoming message. Only [`MessageKind::Text`] is routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    Audio,
    Video,
    Emoticon,
    Attachment,
    Url,
    Unknown,
}

/// Login QR code state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Unknown,
    Cancel,
    Waiting,
    Scanned,
    Confirmed,
    Timeout,
}

/// A raw message as delivered by the puppet, before any filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Set for group messages.
    #[serde(default)]
    pub room: Option<Room>,
    pub talker: Contact,
    /// Addressee of a direct message.
    #[serde(default)]
    pub listener: Option<Contact>,
    #[serde(default)]
    pub kind: MessageKind,
    #[serde(default)]
    pub text: String,
    /// Contacts @-mentioned in the message, in the order the network lists them.
    #[serde(default)]
    pub mentions: Vec<Contact>,
}

impl IncomingMessage {
    /// True if the logged-in account is among the mentions.
    pub fn mentions_self(&self) -> bool {
        self.mentions.iter().any(|c| c.is_self)
    }
}

/// Events a puppet pushes to the bot, in network order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PuppetEvent {
    Scan { qrcode: String, status: ScanStatus },
    Login { myself: Contact },
    Logout,
    Message(IncomingMessage),
}

/// The external WeChat transport.
#[async_trait]
pub trait Puppet: Send + Sync {
    /// Starts the session; events are pushed to `events` until [`Puppet::stop`] or disconnect.
    /// Dropping the sender ends the bot's event loop.
    async fn start(&self, events: mpsc::Sender<PuppetEvent>) -> Result<()>;
    async fn stop(&self) -> Result<()>;
    /// Looks a room up by topic.
    async fn find_room(&self, topic: &str) -> Result<Option<Room>>;
    /// Every member of the room, the logged-in account included.
    async fn room_members(&self, room_id: &str) -> Result<Vec<Contact>>;
    /// Looks a contact up by display name or alias.
    async fn find_contact(&self, name: &str) -> Result<Option<Contact>>;
    /// Sends `text` to a room or contact id.
    async fn say(&self, target_id: &str, text: &str) -> Result<()>;
}
