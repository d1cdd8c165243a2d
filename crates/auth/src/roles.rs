use serde::{Deserialize, Serialize};

use gasline_core::DomainError;

/// Role of a user in the distribution network.
///
/// `User` is the end customer; the wire name stays `user` for the SPA.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Station,
    Delivery,
    User,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Station, Role::Delivery, Role::User];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Station => "station",
            Role::Delivery => "delivery",
            Role::User => "user",
        }
    }

    /// Admin and station managers run the back office.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Admin | Role::Station)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("invalid role: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_names() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Delivery).unwrap(), "\"delivery\"");
    }
}
