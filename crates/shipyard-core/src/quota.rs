//! Deployment allowance and free-tier limits.
//!
//! Users earn `monthly_deploy_allowance` deployments for the calendar month
//! they joined and for every month since; admins are unlimited. Free-tier
//! users may own at most `free_tier_limit` clusters, organizations and
//! projects each.

use chrono::{DateTime, Datelike, Utc};
use serde::{Serialize, Serializer};

use crate::error::{Result, ShipyardError};
use crate::model::User;

/// Whole calendar months from `since` to `now`; never negative.
pub fn months_between(since: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let years = i64::from(now.year()) - i64::from(since.year());
    let months = years * 12 + i64::from(now.month()) - i64::from(since.month());
    u32::try_from(months.max(0)).unwrap_or(u32::MAX)
}

/// Total deployments earned up to and including the current month.
pub fn allowed_deployments(since: DateTime<Utc>, now: DateTime<Utc>, per_month: u32) -> u32 {
    per_month.saturating_mul(months_between(since, now).saturating_add(1))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentsLeft {
    Unlimited,
    Remaining(u32),
}

impl Serialize for DeploymentsLeft {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            DeploymentsLeft::Unlimited => serializer.serialize_str("Unlimited"),
            DeploymentsLeft::Remaining(n) => serializer.serialize_u32(*n),
        }
    }
}

pub fn deployments_left(user: &User, now: DateTime<Utc>, per_month: u32) -> DeploymentsLeft {
    if user.is_admin() {
        return DeploymentsLeft::Unlimited;
    }
    let allowed = allowed_deployments(user.member_since, now, per_month);
    DeploymentsLeft::Remaining(allowed.saturating_sub(user.deployment))
}

/// Gate a new deployment. On success the caller must persist the user with
/// the incremented counter before triggering anything.
pub fn charge_deployment(user: &mut User, now: DateTime<Utc>, per_month: u32) -> Result<()> {
    if !user.is_admin() {
        let allowed = allowed_deployments(user.member_since, now, per_month);
        if user.deployment >= allowed {
            return Err(ShipyardError::QuotaExceeded {
                used: user.deployment,
                allowed,
            });
        }
    }
    user.deployment = user.deployment.saturating_add(1);
    Ok(())
}

/// Reject creating one more `kind` when a free-tier user already owns
/// `owned` of them.
pub fn check_free_tier(
    user: &User,
    free_code: &str,
    limit: usize,
    owned: usize,
    kind: &'static str,
) -> Result<()> {
    if user.is_free_tier(free_code) && owned >= limit {
        return Err(ShipyardError::FreeTierLimit { kind, limit });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewUser, Role};
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn user(role: Role, billing: &str, since: DateTime<Utc>, used: u32) -> User {
        let mut u = User::create(
            NewUser {
                user_id: Some("u1".into()),
                user_name: "alice".into(),
                email: String::new(),
                role,
                billing: billing.into(),
                member_since: Some(since),
            },
            since,
        );
        u.deployment = used;
        u
    }

    #[test]
    fn months_count_calendar_boundaries() {
        assert_eq!(months_between(at(2024, 1, 31), at(2024, 1, 1)), 0);
        assert_eq!(months_between(at(2024, 1, 31), at(2024, 2, 1)), 1);
        assert_eq!(months_between(at(2023, 11, 5), at(2024, 2, 5)), 3);
        assert_eq!(months_between(at(2024, 5, 1), at(2024, 3, 1)), 0);
    }

    #[test]
    fn allowance_grows_per_month() {
        assert_eq!(allowed_deployments(at(2024, 1, 1), at(2024, 1, 20), 200), 200);
        assert_eq!(allowed_deployments(at(2024, 1, 1), at(2024, 3, 1), 200), 600);
    }

    #[test]
    fn charge_stops_at_allowance() {
        let now = at(2024, 1, 10);
        let mut u = user(Role::User, "", at(2024, 1, 1), 199);
        charge_deployment(&mut u, now, 200).unwrap();
        assert_eq!(u.deployment, 200);

        let err = charge_deployment(&mut u, now, 200).unwrap_err();
        assert!(matches!(err, ShipyardError::QuotaExceeded { used: 200, allowed: 200 }));
        assert_eq!(u.deployment, 200);
    }

    #[test]
    fn admins_are_unlimited() {
        let now = at(2024, 1, 10);
        let mut admin = user(Role::Admin, "", at(2024, 1, 1), 10_000);
        charge_deployment(&mut admin, now, 200).unwrap();
        assert_eq!(admin.deployment, 10_001);
        assert_eq!(deployments_left(&admin, now, 200), DeploymentsLeft::Unlimited);
        assert_eq!(
            serde_json::to_value(DeploymentsLeft::Unlimited).unwrap(),
            serde_json::json!("Unlimited")
        );
    }

    #[test]
    fn remaining_never_underflows() {
        let now = at(2024, 2, 10);
        let u = user(Role::User, "", at(2024, 1, 1), 450);
        assert_eq!(deployments_left(&u, now, 200), DeploymentsLeft::Remaining(0));
        let u = user(Role::User, "", at(2024, 1, 1), 150);
        assert_eq!(deployments_left(&u, now, 200), DeploymentsLeft::Remaining(250));
    }

    #[test]
    fn free_tier_caps_each_kind() {
        let free = user(Role::User, "free", at(2024, 1, 1), 0);
        check_free_tier(&free, "free", 1, 0, "cluster").unwrap();
        let err = check_free_tier(&free, "free", 1, 1, "cluster").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Free users are not allowed to create more than 1 cluster."
        );

        let paid = user(Role::User, "pro", at(2024, 1, 1), 0);
        check_free_tier(&paid, "free", 1, 5, "cluster").unwrap();
    }
}
