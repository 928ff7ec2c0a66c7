//! Per-user, per-calendar-day lookup accounting.
//!
//! Consumption lives inside [`Counters::per_user_daily`], keyed by a day
//! string computed in a fixed reference timezone. A new day simply has a new
//! key, so counts never need to be reset or decremented.

use chrono::{DateTime, FixedOffset, Offset, Utc};

use crate::model::{Counters, Role, Tier, UserId};

/// Ceiling reported for the owner.
pub const UNLIMITED: u64 = 999_999;

const DELEGATE_DAILY_LIMIT: u64 = 20;
const DEFAULT_DAILY_LIMIT: u64 = 5;

#[derive(Debug, Clone, Copy)]
pub struct QuotaLedger {
    offset: FixedOffset,
}

impl Default for QuotaLedger {
    fn default() -> Self {
        Self { offset: Utc.fix() }
    }
}

impl QuotaLedger {
    /// Ledger whose days start at midnight in `UTC + utc_offset_minutes`.
    ///
    /// Out-of-range offsets fall back to UTC.
    #[must_use]
    pub fn new(utc_offset_minutes: i32) -> Self {
        let offset = utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix());
        Self { offset }
    }

    #[must_use]
    pub fn day_key(&self, now: DateTime<Utc>) -> String {
        now.with_timezone(&self.offset).format("%Y-%m-%d").to_string()
    }

    /// Lookups `user` has consumed on the day containing `now`.
    #[must_use]
    pub fn consumed(&self, counters: &Counters, user: &UserId, now: DateTime<Utc>) -> u64 {
        counters
            .per_user_daily
            .get(&self.day_key(now))
            .and_then(|users| users.get(user))
            .copied()
            .unwrap_or(0)
    }

    /// Charge one lookup to `user` on the day containing `now`, returning
    /// the new count.
    pub fn charge(&self, counters: &mut Counters, user: &UserId, now: DateTime<Utc>) -> u64 {
        let slot = counters
            .per_user_daily
            .entry(self.day_key(now))
            .or_default()
            .entry(user.clone())
            .or_insert(0);
        *slot += 1;
        *slot
    }

    /// Daily ceiling for a role and optionally an active subscription tier.
    #[must_use]
    pub const fn ceiling(role: Role, active_tier: Option<Tier>) -> u64 {
        match (role, active_tier) {
            (Role::Owner, _) => UNLIMITED,
            (_, Some(tier)) => tier.daily_limit(),
            (Role::Delegate, None) => DELEGATE_DAILY_LIMIT,
            (Role::Regular, None) => DEFAULT_DAILY_LIMIT,
        }
    }
}
