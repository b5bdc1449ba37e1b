//! Loopback transport: newline-delimited JSON [`PuppetEvent`]s in, JSON send lines out.
//!
//! Rooms and contacts come from a static roster, so the whole routing pipeline can be driven
//! from a terminal or a script without a network session.

use std::io::Write;
use std::sync::Mutex;

use async_trait::async_trait;
use imbot_core::{ImbotError, Result};
use imbot_wechat::{Contact, Puppet, PuppetEvent, Room};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConsoleRoom {
    pub id: String,
    pub topic: String,
    #[serde(default)]
    pub members: Vec<Contact>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConsoleRoster {
    /// When set, a login event for this account is emitted as soon as the transport starts.
    pub myself: Option<Contact>,
    pub rooms: Vec<ConsoleRoom>,
    pub contacts: Vec<Contact>,
}

/// One outgoing send, as written to the output.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutgoingLine {
    pub to: String,
    pub text: String,
}

pub type Input = Box<dyn AsyncBufRead + Unpin + Send>;
pub type Output = Box<dyn Write + Send>;

pub struct ConsolePuppet {
    roster: ConsoleRoster,
    input: Mutex<Option<Input>>,
    output: Mutex<Output>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl ConsolePuppet {
    /// Reads stdin, writes stdout.
    pub fn stdio(roster: ConsoleRoster) -> Self {
        Self::with_io(
            roster,
            Box::new(BufReader::new(tokio::io::stdin())),
            Box::new(std::io::stdout()),
        )
    }

    pub fn with_io(roster: ConsoleRoster, input: Input, output: Output) -> Self {
        Self {
            roster,
            input: Mutex::new(Some(input)),
            output: Mutex::new(output),
            reader: Mutex::new(None),
        }
    }

    fn set_reader(&self, handle: Option<JoinHandle<()>>) {
        let previous = std::mem::replace(
            &mut *self.reader.lock().unwrap_or_else(|e| e.into_inner()),
            handle,
        );
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    fn take_input(&self) -> Option<Input> {
        self.input.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    fn all_contacts(&self) -> impl Iterator<Item = &Contact> {
        self.roster
            .contacts
            .iter()
            .chain(self.roster.rooms.iter().flat_map(|room| room.members.iter()))
    }
}

/// Forwards each parsed line of `input` as an event until EOF or until the receiver is gone.
/// Blank and malformed lines are skipped.
pub async fn pump_events<R>(input: R, events: mpsc::Sender<PuppetEvent>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("console input closed");
                break;
            }
            Err(e) => {
                warn!(error = %e, "console read failed");
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let event = match serde_json::from_str::<PuppetEvent>(line) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "ignoring malformed console event");
                continue;
            }
        };
        debug!(event = ?event, "console event");
        if events.send(event).await.is_err() {
            break;
        }
    }
}

#[async_trait]
impl Puppet for ConsolePuppet {
    /// The input can be consumed once; a second start fails.
    async fn start(&self, events: mpsc::Sender<PuppetEvent>) -> Result<()> {
        let input = self
            .take_input()
            .ok_or_else(|| ImbotError::Transport("console input already consumed".to_string()))?;
        if let Some(myself) = self.roster.myself.clone() {
            events
                .send(PuppetEvent::Login { myself })
                .await
                .map_err(|_| ImbotError::Transport("event receiver closed".to_string()))?;
        }
        self.set_reader(Some(tokio::spawn(pump_events(input, events))));
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.set_reader(None);
        Ok(())
    }

    async fn find_room(&self, topic: &str) -> Result<Option<Room>> {
        Ok(self
            .roster
            .rooms
            .iter()
            .find(|room| room.topic == topic)
            .map(|room| Room::new(room.id.clone(), room.topic.clone())))
    }

    async fn room_members(&self, room_id: &str) -> Result<Vec<Contact>> {
        let room = self
            .roster
            .rooms
            .iter()
            .find(|room| room.id == room_id)
            .ok_or_else(|| ImbotError::Transport(format!("unknown room {}", room_id)))?;
        let mut members = room.members.clone();
        if let Some(myself) = &self.roster.myself {
            if !members.iter().any(|m| m.id == myself.id) {
                members.push(myself.clone());
            }
        }
        Ok(members)
    }

    async fn find_contact(&self, name: &str) -> Result<Option<Contact>> {
        Ok(self.all_contacts().find(|c| c.answers_to(name)).cloned())
    }

    async fn say(&self, target_id: &str, text: &str) -> Result<()> {
        let line = serde_json::to_string(&OutgoingLine {
            to: target_id.to_string(),
            text: text.to_string(),
        })
        .map_err(|e| ImbotError::Transport(e.to_string()))?;
        let mut output = self.output.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(output, "{}", line)?;
        output.flush()?;
        Ok(())
    }
}
