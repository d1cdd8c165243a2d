use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Role;

/// Permission identifier.
///
/// Permissions are opaque strings (e.g. "cylinders.write"). The wildcard `"*"`
/// grants everything and is only handed to admins.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

const STATION: &[&str] = &[
    "users.read",
    "cylinders.read",
    "cylinders.write",
    "orders.read",
    "orders.create",
    "orders.assign",
    "orders.transition",
    "safety.read",
    "safety.write",
    "safety.rectify",
    "stats.read",
    "announcements.read",
    "ratings.read",
];

const DELIVERY: &[&str] = &[
    "cylinders.read",
    "orders.read",
    "orders.create",
    "orders.transition",
    "safety.read",
    "safety.write",
    "announcements.read",
    "ratings.read",
];

const CUSTOMER: &[&str] = &[
    "cylinders.read",
    "orders.read",
    "orders.create",
    "orders.transition",
    "safety.read",
    "announcements.read",
    "ratings.read",
    "ratings.write",
];

/// Fixed role → permission mapping.
///
/// Row-level rules (a courier only sees their own orders) are applied by the
/// API on top of these coarse grants.
pub fn role_permissions(role: Role) -> Vec<Permission> {
    let names: &[&'static str] = match role {
        Role::Admin => &["*"],
        Role::Station => STATION,
        Role::Delivery => DELIVERY,
        Role::User => CUSTOMER,
    };
    names.iter().map(|n| Permission::new(*n)).collect()
}
