//! Shared fixtures: an in-memory [`Puppet`] and helpers to build contacts and messages.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use imbot_core::{ImbotError, Message, MessageHandler, Result};
use imbot_wechat::{Contact, IncomingMessage, MessageKind, Puppet, PuppetEvent, Room};
use tokio::sync::mpsc;

pub const ME: &str = "wxid_me";
pub const ALICE: &str = "wxid_alice";
pub const BOB: &str = "wxid_bob";
pub const CAROL: &str = "wxid_carol";

pub fn me() -> Contact {
    Contact::myself(ME, "cosmos")
}

pub fn alice() -> Contact {
    Contact::new(ALICE, "Alice")
}

pub fn bob() -> Contact {
    Contact::new(BOB, "Bob")
}

pub fn carol() -> Contact {
    Contact::new(CAROL, "Carol")
}

/// In-memory puppet: fixed rooms and contacts, records every `say`, lets tests push events.
#[derive(Default)]
pub struct MockPuppet {
    rooms: Vec<(Room, Vec<Contact>)>,
    contacts: Vec<Contact>,
    sent: Mutex<Vec<(String, String)>>,
    fail_sends: AtomicBool,
    events: Mutex<Option<mpsc::Sender<PuppetEvent>>>,
    stopped: AtomicBool,
}

impl MockPuppet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_room(mut self, room: Room, members: Vec<Contact>) -> Self {
        self.rooms.push((room, members));
        self
    }

    pub fn with_contact(mut self, contact: Contact) -> Self {
        self.contacts.push(contact);
        self
    }

    /// Every `(target_id, text)` passed to `say`, in order.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn is_started(&self) -> bool {
        self.events.lock().unwrap().is_some()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Waits until the bot has called `start`.
    pub async fn wait_started(&self) {
        while !self.is_started() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    /// Pushes an event to the running bot.
    pub async fn emit(&self, event: PuppetEvent) {
        let sender = self.events.lock().unwrap().clone();
        sender
            .expect("puppet not started")
            .send(event)
            .await
            .expect("bot event loop gone");
    }

    /// Drops the event sender, ending the bot's loop.
    pub fn disconnect(&self) {
        self.events.lock().unwrap().take();
    }
}

#[async_trait]
impl Puppet for MockPuppet {
    async fn start(&self, events: mpsc::Sender<PuppetEvent>) -> Result<()> {
        *self.events.lock().unwrap() = Some(events);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.stopped.store(true, Ordering::SeqCst);
        self.disconnect();
        Ok(())
    }

    async fn find_room(&self, topic: &str) -> Result<Option<Room>> {
        Ok(self
            .rooms
            .iter()
            .find(|(room, _)| room.topic == topic)
            .map(|(room, _)| room.clone()))
    }

    async fn room_members(&self, room_id: &str) -> Result<Vec<Contact>> {
        self.rooms
            .iter()
            .find(|(room, _)| room.id == room_id)
            .map(|(_, members)| members.clone())
            .ok_or_else(|| ImbotError::Transport(format!("unknown room {}", room_id)))
    }

    async fn find_contact(&self, name: &str) -> Result<Option<Contact>> {
        Ok(self.contacts.iter().find(|c| c.answers_to(name)).cloned())
    }

    async fn say(&self, target_id: &str, text: &str) -> Result<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(ImbotError::Transport("send rejected".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((target_id.to_string(), text.to_string()));
        Ok(())
    }
}

/// Handler that forwards every message to a channel the test reads from.
pub struct CaptureHandler {
    tx: mpsc::UnboundedSender<Message>,
}

impl CaptureHandler {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

#[async_trait]
impl MessageHandler for CaptureHandler {
    async fn handle(&self, message: Message) -> Result<()> {
        let _ = self.tx.send(message);
        Ok(())
    }
}

pub fn room_text(room: &Room, talker: Contact, mentions: Vec<Contact>, text: &str) -> IncomingMessage {
    IncomingMessage {
        room: Some(room.clone()),
        talker,
        listener: None,
        kind: MessageKind::Text,
        text: text.to_string(),
        mentions,
    }
}

pub fn direct_text(talker: Contact, listener: Contact, text: &str) -> IncomingMessage {
    IncomingMessage {
        room: None,
        talker,
        listener: Some(listener),
        kind: MessageKind::Text,
        text: text.to_string(),
        mentions: Vec::new(),
    }
}

/// Receives the next captured message, failing the test after one second.
pub async fn next_message(rx: &mut mpsc::UnboundedReceiver<Message>) -> Message {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("no message dispatched")
        .expect("capture channel closed")
}
