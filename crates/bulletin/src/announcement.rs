use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gasline_core::{Aggregate, AggregateId, AggregateRoot, DomainError, UserId};
use gasline_events::Event;

const MAX_TITLE_CHARS: usize = 200;

/// Announcement identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnouncementId(pub AggregateId);

impl AnnouncementId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for AnnouncementId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: Announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    id: AnnouncementId,
    title: String,
    content: String,
    pinned: bool,
    version: u64,
    created: bool,
    withdrawn: bool,
}

impl Announcement {
    pub fn empty(id: AnnouncementId) -> Self {
        Self {
            id,
            title: String::new(),
            content: String::new(),
            pinned: false,
            version: 0,
            created: false,
            withdrawn: false,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn pinned(&self) -> bool {
        self.pinned
    }

    pub fn is_withdrawn(&self) -> bool {
        self.withdrawn
    }
}

impl Announcement {
    pub const AGGREGATE_TYPE: &'static str = "bulletin.announcement";
}

impl AggregateRoot for Announcement {
    type Id = AnnouncementId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishAnnouncement {
    pub announcement_id: AnnouncementId,
    pub author_id: UserId,
    pub title: String,
    pub content: String,
    pub pinned: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditAnnouncement {
    pub announcement_id: AnnouncementId,
    pub title: Option<String>,
    pub content: Option<String>,
    pub pinned: Option<bool>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawAnnouncement {
    pub announcement_id: AnnouncementId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnnouncementCommand {
    Publish(PublishAnnouncement),
    Edit(EditAnnouncement),
    Withdraw(WithdrawAnnouncement),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnouncementPublished {
    pub announcement_id: AnnouncementId,
    pub author_id: UserId,
    pub title: String,
    pub content: String,
    pub pinned: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnouncementEdited {
    pub announcement_id: AnnouncementId,
    pub title: Option<String>,
    pub content: Option<String>,
    pub pinned: Option<bool>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnouncementWithdrawn {
    pub announcement_id: AnnouncementId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnnouncementEvent {
    Published(AnnouncementPublished),
    Edited(AnnouncementEdited),
    Withdrawn(AnnouncementWithdrawn),
}

impl Event for AnnouncementEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AnnouncementEvent::Published(_) => "bulletin.announcement.published",
            AnnouncementEvent::Edited(_) => "bulletin.announcement.edited",
            AnnouncementEvent::Withdrawn(_) => "bulletin.announcement.withdrawn",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AnnouncementEvent::Published(e) => e.occurred_at,
            AnnouncementEvent::Edited(e) => e.occurred_at,
            AnnouncementEvent::Withdrawn(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Announcement {
    type Command = AnnouncementCommand;
    type Event = AnnouncementEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            AnnouncementEvent::Published(e) => {
                self.id = e.announcement_id;
                self.title = e.title.clone();
                self.content = e.content.clone();
                self.pinned = e.pinned;
                self.created = true;
            }
            AnnouncementEvent::Edited(e) => {
                if let Some(title) = &e.title {
                    self.title = title.clone();
                }
                if let Some(content) = &e.content {
                    self.content = content.clone();
                }
                if let Some(pinned) = e.pinned {
                    self.pinned = pinned;
                }
            }
            AnnouncementEvent::Withdrawn(_) => {
                self.withdrawn = true;
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            AnnouncementCommand::Publish(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("announcement already exists"));
                }
                let title = validate_title(&cmd.title)?;
                let content = validate_content(&cmd.content)?;
                Ok(vec![AnnouncementEvent::Published(AnnouncementPublished {
                    announcement_id: cmd.announcement_id,
                    author_id: cmd.author_id,
                    title,
                    content,
                    pinned: cmd.pinned,
                    occurred_at: cmd.occurred_at,
                })])
            }
            AnnouncementCommand::Edit(cmd) => {
                self.ensure_live()?;
                let title = cmd.title.as_deref().map(validate_title).transpose()?;
                let content = cmd.content.as_deref().map(validate_content).transpose()?;
                Ok(vec![AnnouncementEvent::Edited(AnnouncementEdited {
                    announcement_id: self.id,
                    title,
                    content,
                    pinned: cmd.pinned,
                    occurred_at: cmd.occurred_at,
                })])
            }
            AnnouncementCommand::Withdraw(cmd) => {
                self.ensure_live()?;
                Ok(vec![AnnouncementEvent::Withdrawn(AnnouncementWithdrawn {
                    announcement_id: self.id,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

impl Announcement {
    fn ensure_live(&self) -> Result<(), DomainError> {
        if !self.created || self.withdrawn {
            return Err(DomainError::not_found());
        }
        Ok(())
    }
}

fn validate_title(raw: &str) -> Result<String, DomainError> {
    let title = raw.trim();
    let len = title.chars().count();
    if len == 0 || len > MAX_TITLE_CHARS {
        return Err(DomainError::validation(format!(
            "title must be between 1 and {MAX_TITLE_CHARS} characters"
        )));
    }
    Ok(title.to_string())
}

fn validate_content(raw: &str) -> Result<String, DomainError> {
    if raw.trim().is_empty() {
        return Err(DomainError::validation("content cannot be empty"));
    }
    Ok(raw.to_string())
}
