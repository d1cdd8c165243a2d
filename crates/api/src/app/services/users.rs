use chrono::Utc;

use gasline_auth::{
    ChangePassword, RegisterUser, RemoveUser, Role, UpdateProfile, User, UserCommand, check_policy,
    hash_password, verify_password,
};
use gasline_core::{AggregateId, UserId};
use gasline_infra::projections::UserReadModel;

use super::AppServices;
use crate::app::errors::ApiError;
use crate::context::PrincipalContext;

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub role: Role,
    pub phone: Option<String>,
    pub real_name: Option<String>,
    pub station_id: Option<u32>,
}

/// Partial user update. `password`, when present, is re-hashed.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub role: Option<Role>,
    pub phone: Option<String>,
    pub real_name: Option<String>,
    pub station_id: Option<u32>,
    pub password: Option<String>,
}

impl UserChanges {
    fn touches_profile(&self, current: &UserReadModel) -> bool {
        let phone = self
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());
        let real_name = self
            .real_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());

        self.role.is_some_and(|r| r != current.role)
            || phone.is_some_and(|p| current.phone.as_ref().map(|c| c.as_str()) != Some(p))
            || real_name.is_some_and(|n| current.real_name.as_deref() != Some(n))
            || self.station_id.is_some_and(|s| current.station_id != Some(s))
    }
}

impl AppServices {
    pub fn user(&self, id: UserId) -> Result<UserReadModel, ApiError> {
        self.read_models
            .users
            .get(&id)
            .ok_or_else(|| ApiError::not_found("user"))
    }

    /// Users, newest first, optionally restricted to one role.
    pub fn list_users(&self, role: Option<Role>) -> Vec<UserReadModel> {
        let mut users: Vec<_> = self
            .read_models
            .users
            .list()
            .into_iter()
            .filter(|u| role.is_none_or(|r| u.role == r))
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        users
    }

    /// Check a username/password pair against the users read model.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<UserReadModel, ApiError> {
        let rejected = || ApiError::unauthorized("invalid username or password");

        let user = self
            .read_models
            .users
            .find_by_username(username.trim())
            .ok_or_else(rejected)?;
        if !verify_password(password, &user.password_hash)? {
            tracing::warn!(username = %user.username, "login rejected");
            return Err(rejected());
        }
        Ok(user)
    }

    pub fn create_user(&self, new: NewUser) -> Result<UserReadModel, ApiError> {
        check_policy(&new.password)?;
        let password_hash = hash_password(&new.password)?;

        let _gate = self.write_gate()?;
        let username = new.username.trim().to_string();
        if self.read_models.users.find_by_username(&username).is_some() {
            return Err(ApiError::conflict(format!("username {username} already exists")));
        }

        let user_id = UserId::new();
        let agg: AggregateId = user_id.into();
        self.dispatch::<User>(
            agg,
            User::AGGREGATE_TYPE,
            UserCommand::Register(RegisterUser {
                user_id,
                username,
                password_hash,
                role: new.role,
                phone: new.phone,
                real_name: new.real_name,
                station_id: new.station_id,
                occurred_at: Utc::now(),
            }),
            |id| User::empty(id.into()),
        )?;

        let user = self.user(user_id)?;
        tracing::info!(user_id = %user.id, username = %user.username, role = %user.role.as_str(), "user created");
        Ok(user)
    }

    /// Apply profile changes and/or a password change.
    ///
    /// A request that carries no password and changes nothing is left to the
    /// aggregate, which rejects it.
    pub fn update_user(&self, id: UserId, changes: UserChanges) -> Result<UserReadModel, ApiError> {
        let password_hash = match changes.password.as_deref() {
            Some(p) if !p.is_empty() => {
                check_policy(p)?;
                Some(hash_password(p)?)
            }
            _ => None,
        };

        let _gate = self.write_gate()?;
        let current = self.user(id)?;
        let agg: AggregateId = id.into();

        if changes.touches_profile(&current) || password_hash.is_none() {
            self.dispatch::<User>(
                agg,
                User::AGGREGATE_TYPE,
                UserCommand::UpdateProfile(UpdateProfile {
                    role: changes.role,
                    phone: changes.phone.clone(),
                    real_name: changes.real_name.clone(),
                    station_id: changes.station_id,
                    occurred_at: Utc::now(),
                }),
                |id| User::empty(id.into()),
            )?;
        }

        if let Some(password_hash) = password_hash {
            self.dispatch::<User>(
                agg,
                User::AGGREGATE_TYPE,
                UserCommand::ChangePassword(ChangePassword {
                    password_hash,
                    occurred_at: Utc::now(),
                }),
                |id| User::empty(id.into()),
            )?;
            tracing::info!(user_id = %id, "password changed");
        }

        self.user(id)
    }

    pub fn delete_user(&self, ctx: &PrincipalContext, id: UserId) -> Result<(), ApiError> {
        if ctx.user_id() == id {
            return Err(ApiError::validation("cannot delete yourself"));
        }

        let _gate = self.write_gate()?;
        self.user(id)?;
        self.dispatch::<User>(
            id.into(),
            User::AGGREGATE_TYPE,
            UserCommand::Remove(RemoveUser {
                occurred_at: Utc::now(),
            }),
            |id| User::empty(id.into()),
        )?;
        tracing::info!(user_id = %id, removed_by = %ctx.user_id(), "user removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::services::test_support::{ctx, services};

    fn new_user(username: &str, role: Role) -> NewUser {
        NewUser {
            username: username.to_string(),
            password: "secret123".to_string(),
            role,
            phone: Some("13800000001".to_string()),
            real_name: Some("Tester".to_string()),
            station_id: None,
        }
    }

    #[test]
    fn usernames_are_unique() {
        let svc = services();
        svc.create_user(new_user("alice", Role::User)).unwrap();
        let err = svc.create_user(new_user("alice", Role::Delivery)).unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[test]
    fn login_checks_the_password() {
        let svc = services();
        svc.create_user(new_user("bob", Role::Station)).unwrap();

        assert_eq!(svc.authenticate("bob", "secret123").unwrap().role, Role::Station);
        assert!(matches!(
            svc.authenticate("bob", "wrong-pass"),
            Err(ApiError::Unauthorized(_))
        ));
        assert!(matches!(
            svc.authenticate("nobody", "secret123"),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn password_only_update_skips_the_profile() {
        let svc = services();
        let user = svc.create_user(new_user("carol", Role::User)).unwrap();

        let changes = UserChanges {
            real_name: Some("Tester".to_string()),
            password: Some("another1".to_string()),
            ..UserChanges::default()
        };
        svc.update_user(user.id, changes).unwrap();

        assert!(svc.authenticate("carol", "another1").is_ok());
        assert!(svc.authenticate("carol", "secret123").is_err());
    }

    #[test]
    fn empty_update_is_rejected() {
        let svc = services();
        let user = svc.create_user(new_user("dave", Role::User)).unwrap();
        let err = svc.update_user(user.id, UserChanges::default()).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn users_cannot_delete_themselves() {
        let svc = services();
        let admin = svc.create_user(new_user("root", Role::Admin)).unwrap();
        let other = svc.create_user(new_user("erin", Role::User)).unwrap();
        let me = ctx(admin.id, Role::Admin);

        assert!(matches!(svc.delete_user(&me, admin.id), Err(ApiError::Validation(_))));
        svc.delete_user(&me, other.id).unwrap();
        assert!(matches!(svc.user(other.id), Err(ApiError::NotFound(_))));
        assert_eq!(svc.list_users(None).len(), 1);
    }

    #[test]
    fn listing_filters_by_role() {
        let svc = services();
        svc.create_user(new_user("courier1", Role::Delivery)).unwrap();
        svc.create_user(new_user("customer1", Role::User)).unwrap();

        let couriers = svc.list_users(Some(Role::Delivery));
        assert_eq!(couriers.len(), 1);
        assert_eq!(couriers[0].username, "courier1");
    }
}
