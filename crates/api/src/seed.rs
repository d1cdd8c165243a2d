//! First-start data: the bootstrap admin and an optional demo data set.

use anyhow::Context;
use chrono::{Datelike, Months, NaiveDate, Utc};
use uuid::Uuid;

use gasline_auth::{Principal, Role};
use gasline_inventory::{CylinderSpec, CylinderStatus};

use crate::app::services::{AppServices, NewCylinder, NewUser};
use crate::config::ApiConfig;
use crate::context::PrincipalContext;

const DEMO_PASSWORD: &str = "123456";
const DEMO_CYLINDERS: u32 = 20;

/// Seed an empty store. A store that already has users is left untouched.
pub fn seed(services: &AppServices, config: &ApiConfig) -> anyhow::Result<()> {
    if !services.read_models().users.list().is_empty() {
        return Ok(());
    }

    let admin = services
        .create_user(NewUser {
            username: config.admin_username.clone(),
            password: config.admin_password.clone(),
            role: Role::Admin,
            phone: None,
            real_name: Some("Administrator".to_string()),
            station_id: None,
        })
        .context("failed to create bootstrap admin")?;
    tracing::info!(username = %admin.username, "bootstrap admin created");

    if config.seed_demo {
        let author = PrincipalContext::new(
            Principal::new(admin.id, admin.username.clone(), admin.role),
            Uuid::nil(),
            Utc::now(),
        );
        seed_demo(services, &author)?;
    }
    Ok(())
}

fn seed_demo(services: &AppServices, author: &PrincipalContext) -> anyhow::Result<()> {
    let people = [
        ("station", Role::Station, "Station Manager", "13800000001", Some(1)),
        ("delivery", Role::Delivery, "Courier Wang", "13800000002", Some(1)),
        ("user", Role::User, "Customer Li", "13800000003", None),
    ];
    for (username, role, real_name, phone, station_id) in people {
        services
            .create_user(NewUser {
                username: username.to_string(),
                password: DEMO_PASSWORD.to_string(),
                role,
                phone: Some(phone.to_string()),
                real_name: Some(real_name.to_string()),
                station_id,
            })
            .with_context(|| format!("failed to create demo user {username}"))?;
    }

    let made = NaiveDate::from_ymd_opt(2024, 1, 15).context("invalid demo date")?;
    for n in 1..=DEMO_CYLINDERS {
        let spec = CylinderSpec::ALL[(n as usize - 1) % CylinderSpec::ALL.len()];
        let manufactured = made
            .checked_add_months(Months::new(n % 12))
            .context("demo date out of range")?;
        let expiry = manufactured
            .with_year(manufactured.year() + 8)
            .context("demo date out of range")?;
        services
            .create_cylinder(NewCylinder {
                serial_code: Some(format!("CYL2024{n:06}")),
                spec,
                status: CylinderStatus::InStock,
                manufacturer: Some("Demo Cylinder Works".to_string()),
                manufacture_date: Some(manufactured),
                expiry_date: Some(expiry),
                station_id: Some(1),
            })
            .with_context(|| format!("failed to create demo cylinder {n}"))?;
    }

    services
        .publish_announcement(
            author,
            "Welcome".to_string(),
            "Online ordering is open. Deliveries run daily from 8:00 to 18:00.".to_string(),
            true,
        )
        .context("failed to publish demo announcement")?;

    tracing::info!(cylinders = DEMO_CYLINDERS, "demo data seeded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::services::test_support::services;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> ApiConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ApiConfig::from_lookup(|k| env.get(k).cloned()).unwrap()
    }

    #[test]
    fn bootstrap_admin_is_created_once() {
        let svc = services();
        let cfg = config(&[]);
        seed(&svc, &cfg).unwrap();
        seed(&svc, &cfg).unwrap();

        let users = svc.list_users(None);
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].role, Role::Admin);
        assert!(svc.authenticate("admin", "123456").is_ok());
        assert!(svc.list_cylinders(None, None).is_empty());
    }

    #[test]
    fn demo_data_covers_every_role_and_spec() {
        let svc = services();
        seed(&svc, &config(&[("GASLINE_SEED_DEMO", "true")])).unwrap();

        assert_eq!(svc.list_users(None).len(), 4);
        assert_eq!(svc.list_cylinders(None, None).len(), DEMO_CYLINDERS as usize);
        for spec in CylinderSpec::ALL {
            assert!(!svc.list_cylinders(Some(CylinderStatus::InStock), Some(spec)).is_empty());
        }
        assert!(svc.list_announcements()[0].pinned);
    }
}
