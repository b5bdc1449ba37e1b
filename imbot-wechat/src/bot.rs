//! [`WechatBot`]: session lifecycle, whitelist population, and message routing.
//!
//! Events are consumed one at a time on a single loop, so routing, login population, and the
//! periodic reclamation sweep never interleave.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use imbot_core::{
    Bot, BotEventType, Channel, HandlerRegistry, Identifiable, Message, MessageHandler,
    Participant, Result,
};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use crate::channel::{ChannelKind, WechatChannel};
use crate::config::WechatBotConfig;
use crate::login_qrcode::write_login_qrcode;
use crate::participant::WechatParticipant;
use crate::puppet::{Contact, IncomingMessage, MessageKind, Puppet, PuppetEvent, Room, ScanStatus};
use crate::registry::ChannelRegistry;

const EVENT_QUEUE_CAPACITY: usize = 256;
const MIN_RECLAIM_INTERVAL: Duration = Duration::from_millis(10);

/// Why an inbound message was not dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Room or talker is not in the resolved whitelist.
    NotWhitelisted,
    /// Content is not plain text.
    NotText,
    /// Group message neither mentions the bot nor starts with the wake word.
    NotAddressed,
    /// Direct message addressed to someone other than the bot.
    NotForMe,
    /// Group message sent by the bot's own account.
    FromMyself,
    /// Neither a room nor a listener was present.
    Unclassified,
}

/// Result of routing one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    Dispatched { thread_id: String, handlers: usize },
    Dropped(DropReason),
}

/// [`Bot`] over a WeChat [`Puppet`].
pub struct WechatBot {
    puppet: Arc<dyn Puppet>,
    config: WechatBotConfig,
    registry: RwLock<ChannelRegistry>,
    handlers: HandlerRegistry,
    shutdown: watch::Sender<bool>,
}

impl WechatBot {
    pub fn new(puppet: Arc<dyn Puppet>, config: WechatBotConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            puppet,
            config,
            registry: RwLock::new(ChannelRegistry::new()),
            handlers: HandlerRegistry::new(),
            shutdown,
        }
    }

    pub fn config(&self) -> &WechatBotConfig {
        &self.config
    }

    fn registry(&self) -> RwLockReadGuard<'_, ChannelRegistry> {
        self.registry.read().unwrap_or_else(|e| e.into_inner())
    }

    fn registry_mut(&self) -> RwLockWriteGuard<'_, ChannelRegistry> {
        self.registry.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Whitelisted room channel by room id.
    pub fn room(&self, room_id: &str) -> Option<Arc<WechatChannel>> {
        self.registry().room(room_id)
    }

    /// Whitelisted contact channel by contact id.
    pub fn contact(&self, contact_id: &str) -> Option<Arc<WechatChannel>> {
        self.registry().contact(contact_id)
    }

    pub fn room_ids(&self) -> Vec<String> {
        self.registry().room_ids()
    }

    pub fn contact_ids(&self) -> Vec<String> {
        self.registry().contact_ids()
    }

    /// Sweeps idle threads on every registered channel. Returns the number removed.
    pub fn reclaim_threads(&self) -> usize {
        self.registry().reclaim_threads()
    }

    fn new_channel(
        &self,
        id: &str,
        kind: ChannelKind,
        members: Vec<Contact>,
    ) -> Arc<WechatChannel> {
        WechatChannel::new(
            id,
            kind,
            self.puppet.clone(),
            members.into_iter().map(WechatParticipant::from).collect(),
            self.config.thread_reclaim_timeout,
            self.config.activity_policy,
        )
    }

    /// Handles one puppet event.
    pub async fn handle_event(&self, event: PuppetEvent) -> Result<()> {
        match event {
            PuppetEvent::Scan { qrcode, status } => {
                self.handle_scan(&qrcode, status);
                Ok(())
            }
            PuppetEvent::Login { myself } => self.handle_login(myself).await,
            PuppetEvent::Logout => {
                self.handle_logout();
                Ok(())
            }
            PuppetEvent::Message(message) => {
                self.handle_message(message);
                Ok(())
            }
        }
    }

    /// Writes the login QR code while the puppet waits for a scan.
    pub fn handle_scan(&self, qrcode: &str, status: ScanStatus) {
        info!(status = ?status, "'scan' event triggered");
        if !matches!(status, ScanStatus::Waiting | ScanStatus::Timeout) {
            return;
        }
        match write_login_qrcode(&self.config.login_qrcode_path, qrcode) {
            Ok(()) => info!(
                path = %self.config.login_qrcode_path.display(),
                "login QR code written"
            ),
            Err(e) => error!(
                error = %e,
                path = %self.config.login_qrcode_path.display(),
                "failed to write login QR code"
            ),
        }
    }

    /// Builds the channel registry for the new session: the bot's own chat, every resolvable
    /// whitelisted room (with its member roster), and every resolvable whitelisted contact.
    /// Names that cannot be resolved are skipped with a warning.
    #[instrument(skip(self, myself), fields(myself = %myself.id))]
    pub async fn handle_login(&self, myself: Contact) -> Result<()> {
        info!("'login' event triggered");

        let mut registry = ChannelRegistry::new();
        registry.insert_contact(self.new_channel(
            &myself.id,
            ChannelKind::Contact,
            vec![myself.clone()],
        ));

        for group_name in &self.config.group_whitelist {
            match self.resolve_room(group_name).await {
                Some((room, members)) => {
                    let channel = self.new_channel(&room.id, ChannelKind::Room, members);
                    info!(
                        room = %group_name,
                        room_id = %room.id,
                        members = channel.roster().len(),
                        "room added"
                    );
                    registry.insert_room(channel);
                }
                None => warn!(room = %group_name, "room not found"),
            }
        }

        for user_name in &self.config.user_whitelist {
            match self.puppet.find_contact(user_name).await {
                Ok(Some(contact)) => {
                    let contact_id = contact.id.clone();
                    registry.insert_contact(self.new_channel(
                        &contact_id,
                        ChannelKind::Contact,
                        vec![contact],
                    ));
                    info!(friend = %user_name, contact_id = %contact_id, "friend added");
                }
                Ok(None) => warn!(friend = %user_name, "friend name/alias not found"),
                Err(e) => warn!(friend = %user_name, error = %e, "friend lookup failed"),
            }
        }

        *self.registry_mut() = registry;
        Ok(())
    }

    async fn resolve_room(&self, topic: &str) -> Option<(Room, Vec<Contact>)> {
        let room = match self.puppet.find_room(topic).await {
            Ok(Some(room)) => room,
            Ok(None) => return None,
            Err(e) => {
                warn!(room = %topic, error = %e, "room lookup failed");
                return None;
            }
        };
        match self.puppet.room_members(&room.id).await {
            Ok(members) => Some((room, members)),
            Err(e) => {
                warn!(room = %topic, room_id = %room.id, error = %e, "room member lookup failed");
                None
            }
        }
    }

    /// Ends the session: every channel and thread is dropped.
    pub fn handle_logout(&self) {
        info!("'logout' event triggered");
        self.registry_mut().clear();
    }

    /// Classifies one message and dispatches it to the registered handlers, or drops it.
    pub fn handle_message(&self, message: IncomingMessage) -> RouteOutcome {
        let outcome = match (message.room.clone(), message.listener.clone()) {
            (Some(room), _) => {
                debug!(room_id = %room.id, "channel message received");
                self.route_room_message(&room, message)
            }
            (None, Some(listener)) => {
                debug!(talker = %message.talker.id, "dm message received");
                self.route_direct_message(&listener, message)
            }
            (None, None) => RouteOutcome::Dropped(DropReason::Unclassified),
        };
        if let RouteOutcome::Dropped(reason) = &outcome {
            debug!(reason = ?reason, "message dropped");
        }
        outcome
    }

    fn route_room_message(&self, room: &Room, message: IncomingMessage) -> RouteOutcome {
        let Some(channel) = self.room(&room.id) else {
            info!(room_id = %room.id, "message not from whitelist, ignore it");
            return RouteOutcome::Dropped(DropReason::NotWhitelisted);
        };
        if message.talker.is_self {
            return RouteOutcome::Dropped(DropReason::FromMyself);
        }
        if message.kind != MessageKind::Text {
            info!(room_id = %room.id, kind = ?message.kind, "message is not text, ignore it");
            return RouteOutcome::Dropped(DropReason::NotText);
        }

        let mentioned_self = message.mentions_self();
        if !mentioned_self && !message.text.starts_with(&self.config.wake_word) {
            debug!(room_id = %room.id, "message does not mention me, ignore it");
            return RouteOutcome::Dropped(DropReason::NotAddressed);
        }

        let talker = Arc::new(WechatParticipant::from(message.talker.clone()));
        let mut mentions: Vec<Arc<WechatParticipant>> = Vec::new();
        for contact in message.mentions.iter().filter(|c| !c.is_self) {
            push_unique(&mut mentions, Arc::new(WechatParticipant::from(contact.clone())));
        }
        // Waking the bot with @ pulls the talker into the sub-thread.
        if mentioned_self {
            push_unique(&mut mentions, talker.clone());
        }

        let thread = channel.find_or_add_thread(&mentions);
        thread.touch();

        let cc = mentions
            .into_iter()
            .map(|p| p as Arc<dyn Participant>)
            .collect();
        self.dispatch(Message::new(thread, talker, cc, message.text))
    }

    fn route_direct_message(&self, listener: &Contact, message: IncomingMessage) -> RouteOutcome {
        let Some(channel) = self.contact(&message.talker.id) else {
            info!(talker = %message.talker.id, "message not from whitelist, ignore it");
            return RouteOutcome::Dropped(DropReason::NotWhitelisted);
        };
        if !listener.is_self {
            debug!(listener = %listener.id, "message not for me, ignore it");
            return RouteOutcome::Dropped(DropReason::NotForMe);
        }
        if message.kind != MessageKind::Text {
            info!(talker = %message.talker.id, kind = ?message.kind, "message is not text, ignore it");
            return RouteOutcome::Dropped(DropReason::NotText);
        }

        let thread = channel.default_wechat_thread();
        thread.touch();
        let talker = Arc::new(WechatParticipant::from(message.talker));
        self.dispatch(Message::new(thread, talker, Vec::new(), message.text))
    }

    fn dispatch(&self, message: Message) -> RouteOutcome {
        let thread_id = message.thread().id().to_string();
        let handlers = self.handlers.dispatch(BotEventType::Message, &message).len();
        info!(
            thread_id = %thread_id,
            from = %message.from().id(),
            cc = message.cc().len(),
            handlers,
            "message dispatched"
        );
        RouteOutcome::Dispatched {
            thread_id,
            handlers,
        }
    }
}

fn push_unique(set: &mut Vec<Arc<WechatParticipant>>, participant: Arc<WechatParticipant>) {
    if !set.iter().any(|p| p.id() == participant.id()) {
        set.push(participant);
    }
}

#[async_trait]
impl Bot for WechatBot {
    #[instrument(skip(self))]
    async fn run(&self) -> Result<()> {
        self.shutdown.send_replace(false);
        let mut shutdown = self.shutdown.subscribe();
        let (events_tx, mut events) = mpsc::channel(EVENT_QUEUE_CAPACITY);

        self.puppet.start(events_tx).await?;
        info!(bot_name = %self.config.bot_name, "bot started");

        let mut reclaim =
            tokio::time::interval(self.config.reclaim_interval.max(MIN_RECLAIM_INTERVAL));
        reclaim.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        reclaim.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("stop requested");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => {
                        if let Err(e) = self.handle_event(event).await {
                            error!(error = %e, "event handling failed");
                        }
                    }
                    None => {
                        info!("puppet event stream closed");
                        break;
                    }
                },
                _ = reclaim.tick() => {
                    let removed = self.reclaim_threads();
                    debug!(removed, "reclamation sweep finished");
                }
            }
        }

        self.registry_mut().clear();
        info!("bot stopped");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.shutdown.send_replace(true);
        self.puppet.stop().await
    }

    async fn find_channel(&self, name: &str) -> Result<Option<Arc<dyn Channel>>> {
        let Some(room) = self.puppet.find_room(name).await? else {
            return Ok(None);
        };
        Ok(self.room(&room.id).map(|c| c as Arc<dyn Channel>))
    }

    async fn find_dm(&self, name: &str) -> Result<Option<Arc<dyn Channel>>> {
        let Some(contact) = self.puppet.find_contact(name).await? else {
            return Ok(None);
        };
        Ok(self.contact(&contact.id).map(|c| c as Arc<dyn Channel>))
    }

    fn on(&self, event: BotEventType, handler: Arc<dyn MessageHandler>) {
        self.handlers.register(event, handler);
    }
}
