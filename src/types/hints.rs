//! Metadata hints extracted during query triage
//!
//! Date bounds arrive as loose strings from the model. A bound may be a full
//! ISO date, a `YYYY-MM` month or a bare `YYYY` year; months and years widen
//! to their first day (start bound) or last day (end bound).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Largest result count a triage hint may request
pub const MAX_TOP_K_HINT: usize = 50;

/// Inclusive date window used by the filtered retrieval pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
}

/// Which side of a range a loose bound resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Start,
    End,
}

impl DateRange {
    /// Build a range, rejecting inverted bounds
    pub fn new(date_start: NaiveDate, date_end: NaiveDate) -> Option<Self> {
        (date_start <= date_end).then_some(Self {
            date_start,
            date_end,
        })
    }

    /// Calendar month window, e.g. 2024-12 → 2024-12-01..=2024-12-31
    pub fn month(year: i32, month: u32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        Self::new(start, last_day_of_month(year, month)?)
    }

    /// Calendar year window
    pub fn year(year: i32) -> Option<Self> {
        Self::new(
            NaiveDate::from_ymd_opt(year, 1, 1)?,
            NaiveDate::from_ymd_opt(year, 12, 31)?,
        )
    }

    /// Resolve two loose bounds into a range.
    ///
    /// Returns `None` when either bound is blank or unparseable, or when the
    /// resolved start falls after the resolved end.
    pub fn resolve(start: &str, end: &str) -> Option<Self> {
        let date_start = parse_bound(start, Bound::Start)?;
        let date_end = parse_bound(end, Bound::End)?;
        Self::new(date_start, date_end)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.date_start <= date && date <= self.date_end
    }

    /// Start bound rendered as `YYYY-MM-DD`
    pub fn start_iso(&self) -> String {
        self.date_start.format("%Y-%m-%d").to_string()
    }

    /// End bound rendered as `YYYY-MM-DD`
    pub fn end_iso(&self) -> String {
        self.date_end.format("%Y-%m-%d").to_string()
    }
}

/// Retrieval hints produced by triage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataHints {
    /// Present only when both bounds resolved
    pub date_range: Option<DateRange>,
    /// Requested result count, within 1..=MAX_TOP_K_HINT
    pub top_k_hint: Option<usize>,
}

impl MetadataHints {
    pub fn none() -> Self {
        Self::default()
    }

    /// Effective result count for retrieval
    pub fn top_k_or(&self, default_top_k: usize) -> usize {
        self.top_k_hint.unwrap_or(default_top_k)
    }
}

/// Accept a raw hint only inside the supported window
pub fn bounded_top_k_hint(raw: Option<u64>) -> Option<usize> {
    raw.and_then(|v| usize::try_from(v).ok())
        .filter(|v| (1..=MAX_TOP_K_HINT).contains(v))
}

fn parse_bound(raw: &str, bound: Bound) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }

    let parts: Vec<&str> = raw.split('-').collect();
    match parts.as_slice() {
        [year] if year.len() == 4 => {
            let range = DateRange::year(year.parse().ok()?)?;
            Some(pick(range, bound))
        }
        [year, month] if year.len() == 4 => {
            let range = DateRange::month(year.parse().ok()?, month.parse().ok()?)?;
            Some(pick(range, bound))
        }
        _ => None,
    }
}

fn pick(range: DateRange, bound: Bound) -> NaiveDate {
    match bound {
        Bound::Start => range.date_start,
        Bound::End => range.date_end,
    }
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_full_iso_dates() {
        let range = DateRange::resolve("2024-12-01", "2024-12-31").unwrap();
        assert_eq!(range.date_start, ymd(2024, 12, 1));
        assert_eq!(range.date_end, ymd(2024, 12, 31));
        assert_eq!(DateRange::month(2024, 12), Some(range));
    }

    #[test]
    fn test_bare_year_expands() {
        let range = DateRange::resolve("2024", "2024").unwrap();
        assert_eq!(range.start_iso(), "2024-01-01");
        assert_eq!(range.end_iso(), "2024-12-31");
    }

    #[test]
    fn test_month_expands_including_leap_february() {
        let range = DateRange::resolve("2024-02", "2024-02").unwrap();
        assert_eq!(range.date_end, ymd(2024, 2, 29));

        let range = DateRange::resolve("2023-02", "2023-02").unwrap();
        assert_eq!(range.date_end, ymd(2023, 2, 28));
    }

    #[test]
    fn test_december_rolls_to_year_end() {
        let range = DateRange::month(2024, 12).unwrap();
        assert_eq!(range.date_end, ymd(2024, 12, 31));
    }

    #[test]
    fn test_missing_or_bad_bounds() {
        assert!(DateRange::resolve("", "2024-12-31").is_none());
        assert!(DateRange::resolve("2024-12-01", "  ").is_none());
        assert!(DateRange::resolve("last winter", "2024").is_none());
        assert!(DateRange::resolve("2024-13", "2024-13").is_none());
    }

    #[test]
    fn test_inverted_range_rejected() {
        assert!(DateRange::resolve("2025-01-01", "2024-12-31").is_none());
    }

    #[test]
    fn test_top_k_hint_bounds() {
        assert_eq!(bounded_top_k_hint(Some(20)), Some(20));
        assert_eq!(bounded_top_k_hint(Some(1)), Some(1));
        assert_eq!(bounded_top_k_hint(Some(50)), Some(50));
        assert_eq!(bounded_top_k_hint(Some(0)), None);
        assert_eq!(bounded_top_k_hint(Some(100)), None);
        assert_eq!(bounded_top_k_hint(None), None);
        // would wrap to 5 if narrowed on a 32-bit target
        assert_eq!(bounded_top_k_hint(Some((1u64 << 32) + 5)), None);
        assert_eq!(bounded_top_k_hint(Some(u64::MAX)), None);
    }

    #[test]
    fn test_contains() {
        let range = DateRange::month(2024, 12).unwrap();
        assert!(range.contains(ymd(2024, 12, 18)));
        assert!(!range.contains(ymd(2024, 11, 7)));
    }
}
