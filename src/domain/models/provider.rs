//! Provider identity and budget accounting models.

use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The configured provider slots.
///
/// A small tagged set rather than open-ended strings: routing order and
/// admission checks key off these, and adding a third slot is a local change
/// here plus a config entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Primary,
    Secondary,
}

impl ProviderId {
    /// Routing order: primary first, then secondary.
    pub const ROUTING_ORDER: [Self; 2] = [Self::Primary, Self::Secondary];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "primary" => Ok(Self::Primary),
            "secondary" => Ok(Self::Secondary),
            _ => Err(anyhow::anyhow!("Invalid provider id: {s}")),
        }
    }
}

/// An hourly usage bucket key: day plus hour-of-day.
pub type HourKey = (NaiveDate, u8);

/// Per-provider token accounting for the current retention window.
///
/// Hourly buckets are the ground truth; daily and monthly totals are
/// aggregates over them, so the monthly-equals-sum-of-daily invariant holds
/// by construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderAccount {
    /// Which provider slot this account tracks.
    pub provider: ProviderId,
    /// Monthly token limit from configuration.
    pub monthly_limit: u64,
    /// Hourly buckets, lazily created on first usage.
    pub hourly: BTreeMap<HourKey, u64>,
}

impl ProviderAccount {
    pub fn new(provider: ProviderId, monthly_limit: u64) -> Self {
        Self {
            provider,
            monthly_limit,
            hourly: BTreeMap::new(),
        }
    }

    /// Add tokens to the bucket for `day`/`hour`.
    pub fn add(&mut self, day: NaiveDate, hour: u8, tokens: u64) {
        *self.hourly.entry((day, hour)).or_insert(0) += tokens;
    }

    /// Tokens used on a given day (sum of that day's hourly buckets).
    pub fn daily_usage(&self, day: NaiveDate) -> u64 {
        self.hourly
            .range((day, 0)..=(day, 23))
            .map(|(_, v)| v)
            .sum()
    }

    /// Tokens used in a given hour of a given day.
    pub fn hourly_usage(&self, day: NaiveDate, hour: u8) -> u64 {
        self.hourly.get(&(day, hour)).copied().unwrap_or(0)
    }

    /// Tokens used in the month containing `day`.
    pub fn monthly_usage(&self, day: NaiveDate) -> u64 {
        self.hourly
            .iter()
            .filter(|((d, _), _)| d.year() == day.year() && d.month() == day.month())
            .map(|(_, v)| v)
            .sum()
    }

    /// Fraction of the monthly limit consumed in the month containing `day`,
    /// clamped to `[0, 1]`.
    pub fn usage_fraction(&self, day: NaiveDate) -> f64 {
        if self.monthly_limit == 0 {
            return 1.0;
        }
        let used = self.monthly_usage(day) as f64;
        (used / self.monthly_limit as f64).min(1.0)
    }

    /// Drop buckets older than the retention window (current + prior month).
    pub fn prune(&mut self, today: NaiveDate) {
        let cutoff = first_of_prior_month(today);
        self.hourly.retain(|(day, _), _| *day >= cutoff);
    }
}

/// First day of the month before the one containing `day`.
pub fn first_of_prior_month(day: NaiveDate) -> NaiveDate {
    let (year, month) = if day.month() == 1 {
        (day.year() - 1, 12)
    } else {
        (day.year(), day.month() - 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).expect("valid first-of-month date")
}

/// Number of days in the month containing `day`.
pub fn days_in_month(day: NaiveDate) -> u32 {
    let (year, month) = if day.month() == 12 {
        (day.year() + 1, 1)
    } else {
        (day.year(), day.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .expect("valid first-of-month date")
        .signed_duration_since(
            NaiveDate::from_ymd_opt(day.year(), day.month(), 1).expect("valid date"),
        )
        .num_days() as u32
}

/// Billing period label, e.g. `"2026-08"`.
pub fn period_label(day: NaiveDate) -> String {
    format!("{:04}-{:02}", day.year(), day.month())
}

/// Today's date in UTC.
pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}
