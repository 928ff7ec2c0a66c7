//! Persistent data model shared by the engine and every store backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Opaque, stable identifier of a bot user.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    /// Parse an administrator-supplied target id, which must be all digits.
    pub fn parse_numeric(raw: &str) -> crate::Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::InvalidArgument(format!(
                "user id must be numeric, got {raw:?}"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for UserId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Coarse access class, independent of any paid subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Owner,
    Delegate,
    Regular,
}

/// Mutable user sets kept by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserSet {
    /// Delegated administrators ("sudo" users).
    Delegates,
    Banned,
    /// Every user that ever interacted with the bot.
    Known,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Basic,
    Pro,
    Vip,
}

impl Tier {
    pub const ALL: [Self; 3] = [Self::Basic, Self::Pro, Self::Vip];

    /// Lookups per calendar day granted by an active subscription.
    #[must_use]
    pub const fn daily_limit(self) -> u64 {
        match self {
            Self::Basic => 25,
            Self::Pro => 50,
            Self::Vip => 100,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Pro => "pro",
            Self::Vip => "vip",
        }
    }

    #[must_use]
    pub const fn emoji(self) -> &'static str {
        match self {
            Self::Basic => "🥉",
            Self::Pro => "🥈",
            Self::Vip => "🥇",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "pro" => Ok(Self::Pro),
            "vip" => Ok(Self::Vip),
            other => Err(Error::InvalidArgument(format!("unknown tier: {other}"))),
        }
    }
}

/// Paid access record. Expired records stay in the store as inert history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(default)]
    pub tier: Tier,
    pub expires_at: DateTime<Utc>,
}

impl Subscription {
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Aggregate lookup counters, stored as a single document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Counters {
    pub total: u64,
    pub success: u64,
    pub failure: u64,
    /// Lookups across all users per day key.
    pub daily_totals: BTreeMap<String, u64>,
    pub per_user_lifetime: BTreeMap<UserId, u64>,
    /// Day key -> user -> consumed lookups. Absence means zero.
    pub per_user_daily: BTreeMap<String, BTreeMap<UserId, u64>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub query: String,
    pub time: DateTime<Utc>,
    pub result_preview: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotFlags {
    pub maintenance: bool,
}
