//! Competition document schema
//!
//! One competition per calendar day, keyed by an ISO date string. The
//! document is the single point of mutual exclusion for the end-of-day
//! transition: `prizes_distributed` only ever flips false -> true, via
//! an atomic conditional update.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Collection name for competitions
pub const COMPETITION_COLLECTION: &str = "competitions";

/// Competition lifecycle status
///
/// `upcoming --(now >= start_time)--> active
/// --(now >= end_time, prizes not yet distributed)--> completed`.
/// `cancelled` is terminal and set by admin tooling outside this crate;
/// the engine skips cancelled competitions everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompetitionStatus {
    Upcoming,
    Active,
    Completed,
    Cancelled,
}

impl std::fmt::Display for CompetitionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Upcoming => "upcoming",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// One prize winner recorded on the competition document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinnerSlot {
    pub entry_id: String,
    pub user_id: String,
    pub votes: i64,
    pub prize: i64,
}

/// Top-3 winners, filled at completion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Winners {
    pub first: Option<WinnerSlot>,
    pub second: Option<WinnerSlot>,
    pub third: Option<WinnerSlot>,
}

impl Winners {
    /// Record a winner at a 1-based position. Positions beyond third
    /// are ignored - only the top 3 are ever paid.
    pub fn set(&mut self, position: i32, slot: WinnerSlot) {
        match position {
            1 => self.first = Some(slot),
            2 => self.second = Some(slot),
            3 => self.third = Some(slot),
            _ => {}
        }
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_none() && self.second.is_none() && self.third.is_none()
    }
}

/// Competition document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitionDoc {
    #[serde(rename = "_id")]
    pub id: String,
    /// ISO date key, `YYYY-MM-DD`, unique per competition
    pub date: String,
    pub status: CompetitionStatus,
    /// Tokens debited from each entrant, snapshot into the prize pool
    pub entry_fee: i64,
    /// Accumulated entry fees of non-cancelled entries
    pub prize_pool: i64,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub end_time: DateTime<Utc>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub entry_start_time: DateTime<Utc>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub entry_end_time: DateTime<Utc>,
    pub total_entries: i64,
    pub total_votes: i64,
    pub winners: Winners,
    /// Fencing flag preventing double payout; flips false -> true once
    pub prizes_distributed: bool,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

/// Format a date as the competition's unique key
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_time(NaiveTime::MIN).and_utc();
    let end = start + Duration::days(1) - Duration::milliseconds(1);
    (start, end)
}

impl CompetitionDoc {
    /// Competition for today's UTC date, created retroactively if the
    /// nightly pre-creation was missed. Entry window is fixed to the
    /// day: opens one hour before the day starts and closes one hour
    /// before it ends.
    pub fn for_today(now: DateTime<Utc>, entry_fee: i64) -> Self {
        let date = now.date_naive();
        let (start, end) = day_bounds(date);

        Self {
            id: Uuid::new_v4().to_string(),
            date: date_key(date),
            status: CompetitionStatus::Active,
            entry_fee,
            prize_pool: 0,
            start_time: start,
            end_time: end,
            entry_start_time: start - Duration::hours(1),
            entry_end_time: end - Duration::hours(1),
            total_entries: 0,
            total_votes: 0,
            winners: Winners::default(),
            prizes_distributed: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Competition for tomorrow's UTC date, pre-created by the nightly
    /// tick. The entry window opens one hour after creation time (not
    /// at a fixed wall-clock point, so users can start entering soon
    /// after the competition appears) and closes one hour before the
    /// competition day starts.
    pub fn for_tomorrow(now: DateTime<Utc>, entry_fee: i64) -> Self {
        let date = now.date_naive() + Duration::days(1);
        let (start, end) = day_bounds(date);

        Self {
            id: Uuid::new_v4().to_string(),
            date: date_key(date),
            status: CompetitionStatus::Upcoming,
            entry_fee,
            prize_pool: 0,
            start_time: start,
            end_time: end,
            entry_start_time: now + Duration::hours(1),
            entry_end_time: start - Duration::hours(1),
            total_entries: 0,
            total_votes: 0,
            winners: Winners::default(),
            prizes_distributed: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether new entries are currently accepted. Status must not be
    /// terminal; upcoming competitions accept entries once their window
    /// opens.
    pub fn entry_window_open(&self, now: DateTime<Utc>) -> bool {
        !self.is_terminal() && now >= self.entry_start_time && now <= self.entry_end_time
    }

    /// Whether votes are currently accepted: active status, and now
    /// within [start_time, end_time).
    pub fn voting_open(&self, now: DateTime<Utc>) -> bool {
        self.status == CompetitionStatus::Active && now >= self.start_time && now < self.end_time
    }

    /// Completed and cancelled competitions never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            CompetitionStatus::Completed | CompetitionStatus::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_today_window_is_fixed_to_the_day() {
        let now = at(2025, 6, 15, 9, 30);
        let c = CompetitionDoc::for_today(now, 10);

        assert_eq!(c.date, "2025-06-15");
        assert_eq!(c.status, CompetitionStatus::Active);
        assert_eq!(c.start_time, at(2025, 6, 15, 0, 0));
        assert_eq!(
            c.end_time,
            at(2025, 6, 16, 0, 0) - Duration::milliseconds(1)
        );
        assert_eq!(c.entry_start_time, c.start_time - Duration::hours(1));
        assert_eq!(c.entry_end_time, c.end_time - Duration::hours(1));
        assert!(c.start_time < c.end_time);
        assert!(c.entry_start_time < c.start_time);
        assert!(c.entry_end_time < c.end_time);
    }

    #[test]
    fn test_tomorrow_window_is_relative_to_creation() {
        let now = at(2025, 6, 15, 14, 20);
        let c = CompetitionDoc::for_tomorrow(now, 10);

        assert_eq!(c.date, "2025-06-16");
        assert_eq!(c.status, CompetitionStatus::Upcoming);
        assert_eq!(c.start_time, at(2025, 6, 16, 0, 0));
        // Opens exactly one hour after creation, not at a clock boundary
        assert_eq!(c.entry_start_time, at(2025, 6, 15, 15, 20));
        // Closes strictly before the competition day starts
        assert_eq!(c.entry_end_time, at(2025, 6, 15, 23, 0));
        assert!(c.entry_end_time < c.start_time);
        assert!(c.start_time < c.end_time);
    }

    #[test]
    fn test_entry_window_predicate() {
        let created = at(2025, 6, 15, 10, 0);
        let c = CompetitionDoc::for_tomorrow(created, 10);

        assert!(!c.entry_window_open(at(2025, 6, 15, 10, 30)));
        assert!(c.entry_window_open(at(2025, 6, 15, 11, 0)));
        assert!(c.entry_window_open(at(2025, 6, 15, 22, 59)));
        assert!(!c.entry_window_open(at(2025, 6, 15, 23, 30)));
    }

    #[test]
    fn test_voting_open_requires_active_within_bounds() {
        let mut c = CompetitionDoc::for_today(at(2025, 6, 15, 1, 0), 10);

        assert!(c.voting_open(at(2025, 6, 15, 12, 0)));
        assert!(!c.voting_open(at(2025, 6, 16, 0, 0)));

        c.status = CompetitionStatus::Cancelled;
        assert!(!c.voting_open(at(2025, 6, 15, 12, 0)));
    }

    #[test]
    fn test_winners_set_ignores_positions_beyond_third() {
        let mut w = Winners::default();
        let slot = WinnerSlot {
            entry_id: "e".to_string(),
            user_id: "u".to_string(),
            votes: 1,
            prize: 1,
        };
        w.set(4, slot.clone());
        assert!(w.is_empty());

        w.set(2, slot);
        assert!(w.first.is_none());
        assert!(w.second.is_some());
    }
}
