//! Per-call dialogue slots and the partial updates merged into them.

use serde::{Deserialize, Serialize};

/// Informational phase tag recorded on the session after each turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogStep {
    AskService,
    AskDatetime,
    AskContact,
    Unavailable,
    BookingFailed,
    Booked,
}

impl DialogStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            DialogStep::AskService => "ask_service",
            DialogStep::AskDatetime => "ask_datetime",
            DialogStep::AskContact => "ask_contact",
            DialogStep::Unavailable => "unavailable",
            DialogStep::BookingFailed => "booking_failed",
            DialogStep::Booked => "booked",
        }
    }
}

/// Slots collected for one call.
///
/// Every field starts out empty and is only ever replaced by a non-empty value,
/// see [`CallSession::apply`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSession {
    pub step: Option<DialogStep>,
    pub service: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub timezone: Option<String>,
}

/// Field-level update for a [`CallSession`]. `None` means "no new information".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionPatch {
    pub step: Option<DialogStep>,
    pub service: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub timezone: Option<String>,
}

impl SessionPatch {
    pub fn with_step(step: DialogStep) -> Self {
        Self {
            step: Some(step),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == SessionPatch::default()
    }
}

impl CallSession {
    /// Last-known-good merge: absent or blank incoming values never clear a slot.
    pub fn apply(&mut self, patch: SessionPatch) {
        if let Some(step) = patch.step {
            self.step = Some(step);
        }
        overwrite(&mut self.service, patch.service);
        overwrite(&mut self.date, patch.date);
        overwrite(&mut self.time, patch.time);
        overwrite(&mut self.name, patch.name);
        overwrite(&mut self.email, patch.email);
        overwrite(&mut self.phone, patch.phone);
        overwrite(&mut self.timezone, patch.timezone);
    }

    pub fn has_contact(&self) -> bool {
        self.email.is_some() || self.phone.is_some()
    }
}

fn overwrite(slot: &mut Option<String>, incoming: Option<String>) {
    if let Some(value) = incoming {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            *slot = Some(trimmed.to_string());
        }
    }
}
