//! Daily spend history.
//!
//! Keeps one total per UTC day for the trailing week. Backs the weekly total
//! and monthly pace figures. Persisted as a small JSON object keyed by date:
//!
//! ```json
//! {"days":{"2026-02-01":4.82,"2026-02-02":9.91}}
//! ```

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use chrono::{NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Days kept, today included.
pub const RETENTION_DAYS: i64 = 7;

/// Days in a billing month, for pace projection.
const DAYS_PER_MONTH: f64 = 30.0;

/// Per-day spend totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpendHistory {
    #[serde(default)]
    days: BTreeMap<NaiveDate, f64>,
}

impl SpendHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from disk. A missing file is an empty history.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write to disk via a temp file and rename.
    ///
    /// # Errors
    ///
    /// Returns error on I/O or serialization failure.
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;

        let content = serde_json::to_string(self)?;
        let temp_path = parent.join(format!(
            ".{}.tmp.{}",
            path.file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("history"),
            std::process::id()
        ));
        {
            let mut file = std::fs::File::create(&temp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Set the total for `date` and drop days that fell out of the window.
    pub fn record(&mut self, date: NaiveDate, total: f64) {
        self.days.insert(date, total.max(0.0));
        let oldest = date - TimeDelta::days(RETENTION_DAYS - 1);
        self.days.retain(|day, _| *day >= oldest);
    }

    /// Recorded total for one day.
    #[must_use]
    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.days.get(&date).copied()
    }

    /// Recorded days, oldest first.
    pub fn days(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.days.iter().map(|(day, total)| (*day, *total))
    }

    fn window(&self, today: NaiveDate) -> impl Iterator<Item = f64> + '_ {
        let oldest = today - TimeDelta::days(RETENTION_DAYS - 1);
        self.days
            .range(oldest..=today)
            .map(|(_, total)| *total)
    }

    /// Sum of the trailing seven days, today included.
    #[must_use]
    pub fn weekly_total(&self, today: NaiveDate) -> f64 {
        self.window(today).sum()
    }

    /// Projected 30-day spend from the average of days that had any spend.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn monthly_pace(&self, today: NaiveDate) -> f64 {
        let active_days = self.window(today).filter(|total| *total > 0.0).count();
        if active_days == 0 {
            return 0.0;
        }
        self.weekly_total(today) / active_days as f64 * DAYS_PER_MONTH
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, d).unwrap()
    }

    #[test]
    fn record_prunes_old_days() {
        let mut history = SpendHistory::new();
        for d in 1..=10 {
            history.record(day(d), 1.0);
        }
        let kept: Vec<NaiveDate> = history.days().map(|(d, _)| d).collect();
        assert_eq!(kept.first(), Some(&day(4)));
        assert_eq!(kept.len(), 7);
    }

    #[test]
    fn record_overwrites_same_day() {
        let mut history = SpendHistory::new();
        history.record(day(3), 1.0);
        history.record(day(3), 2.5);
        assert_eq!(history.get(day(3)), Some(2.5));
    }

    #[test]
    fn weekly_total_and_pace() {
        let mut history = SpendHistory::new();
        history.record(day(1), 2.0);
        history.record(day(2), 0.0);
        history.record(day(3), 4.0);

        assert!((history.weekly_total(day(3)) - 6.0).abs() < 1e-9);
        // Two active days averaging 3.0 -> 90.0 per month.
        assert!((history.monthly_pace(day(3)) - 90.0).abs() < 1e-9);
    }

    #[test]
    fn pace_is_zero_without_spend() {
        let mut history = SpendHistory::new();
        history.record(day(1), 0.0);
        assert!(history.monthly_pace(day(1)).abs() < f64::EPSILON);
        assert!(SpendHistory::new().monthly_pace(day(1)).abs() < f64::EPSILON);
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("daily-spend.json");

        let mut history = SpendHistory::new();
        history.record(day(5), 4.82);
        history.save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"2026-02-05\":4.82"));
        assert_eq!(SpendHistory::load(&path).unwrap(), history);
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let history = SpendHistory::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(history, SpendHistory::default());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daily-spend.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(SpendHistory::load(&path).is_err());
    }
}
