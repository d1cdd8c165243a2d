//! User aggregate for identity management (event-sourced).
//!
//! Usernames are unique across the system; that set constraint is checked by the
//! service layer before `RegisterUser` is dispatched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gasline_core::{Aggregate, AggregateRoot, DomainError, PhoneNumber, UserId};
use gasline_events::Event;

use crate::Role;

// ─────────────────────────────────────────────────────────────────────────────
// User Aggregate
// ─────────────────────────────────────────────────────────────────────────────

/// User aggregate.
///
/// # Invariants
/// - `username` is immutable after registration.
/// - A removed user accepts no further commands.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub phone: Option<PhoneNumber>,
    pub real_name: Option<String>,
    pub station_id: Option<u32>,
    pub registered_at: Option<DateTime<Utc>>,
    pub version: u64,
    pub created: bool,
    pub removed: bool,
}

impl User {
    pub fn empty(id: UserId) -> Self {
        Self {
            id,
            username: String::new(),
            password_hash: String::new(),
            role: Role::User,
            phone: None,
            real_name: None,
            station_id: None,
            registered_at: None,
            version: 0,
            created: false,
            removed: false,
        }
    }

    fn ensure_active(&self) -> Result<(), DomainError> {
        if !self.created || self.removed {
            return Err(DomainError::NotFound);
        }
        Ok(())
    }
}

impl User {
    /// Stream type tag stored alongside every event of this aggregate.
    pub const AGGREGATE_TYPE: &'static str = "auth.user";
}

impl AggregateRoot for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUser {
    pub user_id: UserId,
    pub username: String,
    /// Already hashed; plaintext never reaches the event log.
    pub password_hash: String,
    pub role: Role,
    pub phone: Option<String>,
    pub real_name: Option<String>,
    pub station_id: Option<u32>,
    pub occurred_at: DateTime<Utc>,
}

/// Partial profile update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfile {
    pub role: Option<Role>,
    pub phone: Option<String>,
    pub real_name: Option<String>,
    pub station_id: Option<u32>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePassword {
    pub password_hash: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveUser {
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum UserCommand {
    Register(RegisterUser),
    UpdateProfile(UpdateProfile),
    ChangePassword(ChangePassword),
    Remove(RemoveUser),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRegistered {
    pub user_id: UserId,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub phone: Option<PhoneNumber>,
    pub real_name: Option<String>,
    pub station_id: Option<u32>,
    pub occurred_at: DateTime<Utc>,
}

/// Carries only the fields that changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdated {
    pub user_id: UserId,
    pub role: Option<Role>,
    pub phone: Option<PhoneNumber>,
    pub real_name: Option<String>,
    pub station_id: Option<u32>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordChanged {
    pub user_id: UserId,
    pub password_hash: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRemoved {
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserEvent {
    Registered(UserRegistered),
    ProfileUpdated(ProfileUpdated),
    PasswordChanged(PasswordChanged),
    Removed(UserRemoved),
}

impl Event for UserEvent {
    fn event_type(&self) -> &'static str {
        match self {
            UserEvent::Registered(_) => "user.registered",
            UserEvent::ProfileUpdated(_) => "user.profile_updated",
            UserEvent::PasswordChanged(_) => "user.password_changed",
            UserEvent::Removed(_) => "user.removed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            UserEvent::Registered(e) => e.occurred_at,
            UserEvent::ProfileUpdated(e) => e.occurred_at,
            UserEvent::PasswordChanged(e) => e.occurred_at,
            UserEvent::Removed(e) => e.occurred_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate Implementation
// ─────────────────────────────────────────────────────────────────────────────

impl Aggregate for User {
    type Command = UserCommand;
    type Event = UserEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            UserEvent::Registered(e) => {
                self.id = e.user_id;
                self.username = e.username.clone();
                self.password_hash = e.password_hash.clone();
                self.role = e.role;
                self.phone = e.phone.clone();
                self.real_name = e.real_name.clone();
                self.station_id = e.station_id;
                self.registered_at = Some(e.occurred_at);
                self.created = true;
            }
            UserEvent::ProfileUpdated(e) => {
                if let Some(role) = e.role {
                    self.role = role;
                }
                if let Some(phone) = &e.phone {
                    self.phone = Some(phone.clone());
                }
                if let Some(name) = &e.real_name {
                    self.real_name = Some(name.clone());
                }
                if let Some(station) = e.station_id {
                    self.station_id = Some(station);
                }
            }
            UserEvent::PasswordChanged(e) => {
                self.password_hash = e.password_hash.clone();
            }
            UserEvent::Removed(_) => {
                self.removed = true;
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            UserCommand::Register(cmd) => self.handle_register(cmd),
            UserCommand::UpdateProfile(cmd) => self.handle_update_profile(cmd),
            UserCommand::ChangePassword(cmd) => self.handle_change_password(cmd),
            UserCommand::Remove(cmd) => self.handle_remove(cmd),
        }
    }
}

impl User {
    // ─────────────────────────────────────────────────────────────────────────
    // Command Handlers
    // ─────────────────────────────────────────────────────────────────────────

    fn handle_register(&self, cmd: &RegisterUser) -> Result<Vec<UserEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("user already exists"));
        }

        let username = cmd.username.trim();
        if username.is_empty() {
            return Err(DomainError::validation("username cannot be empty"));
        }
        let len = username.chars().count();
        if !(3..=80).contains(&len) {
            return Err(DomainError::validation(
                "username must be between 3 and 80 characters",
            ));
        }
        if username.chars().any(char::is_whitespace) {
            return Err(DomainError::validation("username cannot contain whitespace"));
        }
        if cmd.password_hash.is_empty() {
            return Err(DomainError::validation("password hash cannot be empty"));
        }

        Ok(vec![UserEvent::Registered(UserRegistered {
            user_id: cmd.user_id,
            username: username.to_string(),
            password_hash: cmd.password_hash.clone(),
            role: cmd.role,
            phone: parse_phone(cmd.phone.as_deref())?,
            real_name: normalize(cmd.real_name.as_deref()),
            station_id: cmd.station_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_profile(&self, cmd: &UpdateProfile) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_active()?;

        let phone = parse_phone(cmd.phone.as_deref())?;
        let real_name = normalize(cmd.real_name.as_deref());

        let role = cmd.role.filter(|r| *r != self.role);
        let phone = phone.filter(|p| self.phone.as_ref() != Some(p));
        let real_name = real_name.filter(|n| self.real_name.as_ref() != Some(n));
        let station_id = cmd.station_id.filter(|s| self.station_id != Some(*s));

        if role.is_none() && phone.is_none() && real_name.is_none() && station_id.is_none() {
            return Err(DomainError::validation("profile update changes nothing"));
        }

        Ok(vec![UserEvent::ProfileUpdated(ProfileUpdated {
            user_id: self.id,
            role,
            phone,
            real_name,
            station_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_password(&self, cmd: &ChangePassword) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_active()?;
        if cmd.password_hash.is_empty() {
            return Err(DomainError::validation("password hash cannot be empty"));
        }
        Ok(vec![UserEvent::PasswordChanged(PasswordChanged {
            user_id: self.id,
            password_hash: cmd.password_hash.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove(&self, cmd: &RemoveUser) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_active()?;
        Ok(vec![UserEvent::Removed(UserRemoved {
            user_id: self.id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

fn parse_phone(raw: Option<&str>) -> Result<Option<PhoneNumber>, DomainError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => PhoneNumber::parse(s).map(Some),
        None => Ok(None),
    }
}

fn normalize(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(user_id: UserId, username: &str) -> UserCommand {
        UserCommand::Register(RegisterUser {
            user_id,
            username: username.to_string(),
            password_hash: "sha256$1$00$00".to_string(),
            role: Role::Delivery,
            phone: Some("13800138000".to_string()),
            real_name: Some("Li Lei".to_string()),
            station_id: Some(1),
            occurred_at: Utc::now(),
        })
    }

    fn registered(username: &str) -> User {
        let id = UserId::new();
        let mut user = User::empty(id);
        for ev in user.handle(&register(id, username)).unwrap() {
            user.apply(&ev);
        }
        user
    }

    #[test]
    fn register_sets_state_and_version() {
        let user = registered("courier01");
        assert!(user.created);
        assert_eq!(user.version(), 1);
        assert_eq!(user.username, "courier01");
        assert_eq!(user.role, Role::Delivery);
        assert_eq!(user.phone.as_ref().map(|p| p.as_str()), Some("13800138000"));
    }

    #[test]
    fn second_register_conflicts() {
        let user = registered("courier01");
        let err = user.handle(&register(user.id, "courier01")).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn rejects_bad_usernames_and_phones() {
        let id = UserId::new();
        let user = User::empty(id);
        for bad in ["", "ab", "has space", &"x".repeat(81)] {
            let err = user.handle(&register(id, bad)).unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)), "{bad:?}");
        }

        let mut cmd = register(id, "valid");
        if let UserCommand::Register(r) = &mut cmd {
            r.phone = Some("12345".to_string());
        }
        assert!(matches!(user.handle(&cmd), Err(DomainError::Validation(_))));
    }

    #[test]
    fn update_emits_only_changes() {
        let user = registered("courier01");
        let events = user
            .handle(&UserCommand::UpdateProfile(UpdateProfile {
                role: Some(Role::Delivery),
                real_name: Some("Han Meimei".to_string()),
                occurred_at: Utc::now(),
                ..Default::default()
            }))
            .unwrap();

        match &events[0] {
            UserEvent::ProfileUpdated(e) => {
                assert_eq!(e.role, None);
                assert_eq!(e.real_name.as_deref(), Some("Han Meimei"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn noop_update_is_rejected() {
        let user = registered("courier01");
        let err = user
            .handle(&UserCommand::UpdateProfile(UpdateProfile {
                station_id: Some(1),
                occurred_at: Utc::now(),
                ..Default::default()
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn removed_user_is_not_found() {
        let mut user = registered("courier01");
        for ev in user
            .handle(&UserCommand::Remove(RemoveUser { occurred_at: Utc::now() }))
            .unwrap()
        {
            user.apply(&ev);
        }
        assert!(user.removed);
        let err = user
            .handle(&UserCommand::ChangePassword(ChangePassword {
                password_hash: "x".to_string(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let user = registered("courier01");
        let before = user.version();
        let _ = user.handle(&UserCommand::ChangePassword(ChangePassword {
            password_hash: "new".to_string(),
            occurred_at: Utc::now(),
        }));
        assert_eq!(user.version(), before);
        assert_eq!(user.password_hash, "sha256$1$00$00");
    }
}
