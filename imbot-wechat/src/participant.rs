use imbot_core::{Identifiable, Participant};

use crate::puppet::Contact;

/// [`Participant`] backed by a WeChat contact.
#[derive(Debug, Clone)]
pub struct WechatParticipant {
    contact: Contact,
}

impl WechatParticipant {
    pub fn new(contact: Contact) -> Self {
        Self { contact }
    }

    pub fn contact(&self) -> &Contact {
        &self.contact
    }
}

impl From<Contact> for WechatParticipant {
    fn from(contact: Contact) -> Self {
        Self::new(contact)
    }
}

impl PartialEq for WechatParticipant {
    fn eq(&self, other: &Self) -> bool {
        self.contact.id == other.contact.id
    }
}

impl Eq for WechatParticipant {}

impl Identifiable for WechatParticipant {
    fn id(&self) -> &str {
        &self.contact.id
    }
}

impl Participant for WechatParticipant {
    fn name(&self) -> String {
        self.contact.name.clone()
    }

    fn is_myself(&self) -> bool {
        self.contact.is_self
    }
}
