//! Download statistics computed from the whole download log on every call.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, Duration, NaiveDateTime, Timelike};
use serde::Serialize;

use apkdrop_shared::constants::{LOG_TIMESTAMP_FORMAT, RECENT_DOWNLOADS_LIMIT};
use apkdrop_shared::logline::{DownloadLogEntry, DownloadStatus};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CountEntry {
    pub label: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RecentDownload {
    pub timestamp: String,
    pub ip: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct AnalyticsSummary {
    pub total_downloads: u64,
    pub today_downloads: u64,
    pub this_week_downloads: u64,
    pub this_month_downloads: u64,
    pub downloads_by_version: Vec<CountEntry>,
    pub downloads_by_ip: Vec<CountEntry>,
    /// Completed downloads per hour of day, index 0..24.
    pub hourly_stats: Vec<u64>,
    /// `YYYY-MM-DD` to count, ascending.
    pub daily_stats: BTreeMap<String, u64>,
    pub recent_downloads: Vec<RecentDownload>,
    pub log_lines: u64,
    pub unparsed_lines: u64,
}

fn ranked(counts: HashMap<String, u64>) -> Vec<CountEntry> {
    let mut entries: Vec<CountEntry> = counts
        .into_iter()
        .map(|(label, count)| CountEntry { label, count })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    entries
}

/// Summarize `log_text` relative to `now`. Only `Completed` lines count as
/// downloads.
pub fn summarize(log_text: &str, now: NaiveDateTime) -> AnalyticsSummary {
    let today = now.date();
    let week_start = today - Duration::days(7);

    let mut summary = AnalyticsSummary {
        hourly_stats: vec![0; 24],
        ..AnalyticsSummary::default()
    };
    let mut by_version: HashMap<String, u64> = HashMap::new();
    let mut by_ip: HashMap<String, u64> = HashMap::new();
    let mut completed: Vec<DownloadLogEntry> = Vec::new();

    for line in log_text.lines().filter(|l| !l.trim().is_empty()) {
        summary.log_lines += 1;

        let Ok(entry) = DownloadLogEntry::parse(line) else {
            summary.unparsed_lines += 1;
            continue;
        };
        if entry.status != DownloadStatus::Completed {
            continue;
        }

        let date = entry.timestamp.date();
        summary.total_downloads += 1;
        if date == today {
            summary.today_downloads += 1;
        }
        if date >= week_start {
            summary.this_week_downloads += 1;
        }
        if date.year() == today.year() && date.month() == today.month() {
            summary.this_month_downloads += 1;
        }

        summary.hourly_stats[entry.timestamp.hour() as usize] += 1;
        *summary
            .daily_stats
            .entry(date.format("%Y-%m-%d").to_string())
            .or_insert(0) += 1;
        *by_version.entry(entry.version.clone()).or_insert(0) += 1;
        *by_ip.entry(entry.ip.clone()).or_insert(0) += 1;

        completed.push(entry);
    }

    // Stable sort keeps file order among equal timestamps.
    completed.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    summary.recent_downloads = completed
        .into_iter()
        .take(RECENT_DOWNLOADS_LIMIT)
        .map(|entry| RecentDownload {
            timestamp: entry.timestamp.format(LOG_TIMESTAMP_FORMAT).to_string(),
            ip: entry.ip,
            version: entry.version,
        })
        .collect();

    summary.downloads_by_version = ranked(by_version);
    summary.downloads_by_ip = ranked(by_ip);
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ts: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(ts, LOG_TIMESTAMP_FORMAT).unwrap()
    }

    fn line(ts: &str, ip: &str, version: &str, status: &str) -> String {
        format!("{ts} | IP: {ip} | UA: Mozilla/5.0 | Version: {version} | Status: {status}\n")
    }

    #[test]
    fn test_empty_log() {
        let summary = summarize("", at("2026-03-15 12:00:00"));
        assert_eq!(summary.total_downloads, 0);
        assert_eq!(summary.hourly_stats, vec![0; 24]);
        assert!(summary.recent_downloads.is_empty());
    }

    #[test]
    fn test_only_completed_counted() {
        let mut log = String::new();
        log += &line("2026-03-15 09:10:00", "1.1.1.1", "2.0.0", "Started");
        log += &line("2026-03-15 09:10:02", "1.1.1.1", "2.0.0", "Completed");
        log += &line("2026-03-15 10:00:00", "2.2.2.2", "2.0.0", "Failed");
        log += &line("2026-03-15 10:00:00", "2.2.2.2", "None", "No APK available");
        log += "garbage line\n";

        let summary = summarize(&log, at("2026-03-15 12:00:00"));
        assert_eq!(summary.total_downloads, 1);
        assert_eq!(summary.today_downloads, 1);
        assert_eq!(summary.log_lines, 5);
        assert_eq!(summary.unparsed_lines, 1);
        assert_eq!(summary.hourly_stats[9], 1);
    }

    #[test]
    fn test_time_windows() {
        let mut log = String::new();
        log += &line("2026-03-15 08:00:00", "a", "1.0.0", "Completed");
        log += &line("2026-03-08 08:00:00", "a", "1.0.0", "Completed");
        log += &line("2026-03-07 23:59:59", "a", "1.0.0", "Completed");
        log += &line("2026-03-01 00:00:00", "a", "1.0.0", "Completed");
        log += &line("2026-02-28 12:00:00", "a", "1.0.0", "Completed");

        let summary = summarize(&log, at("2026-03-15 20:00:00"));
        assert_eq!(summary.total_downloads, 5);
        assert_eq!(summary.today_downloads, 1);
        // Today minus seven days is inclusive.
        assert_eq!(summary.this_week_downloads, 2);
        assert_eq!(summary.this_month_downloads, 4);
        assert_eq!(
            summary.daily_stats.keys().next().map(String::as_str),
            Some("2026-02-28")
        );
    }

    #[test]
    fn test_rankings_and_recent() {
        let mut log = String::new();
        for minute in 0..12 {
            let version = if minute < 8 { "2.0.0" } else { "1.9.0" };
            let ip = if minute % 2 == 0 { "10.0.0.2" } else { "10.0.0.1" };
            log += &line(
                &format!("2026-03-15 10:{minute:02}:00"),
                ip,
                version,
                "Completed",
            );
        }

        let summary = summarize(&log, at("2026-03-15 12:00:00"));
        assert_eq!(
            summary.downloads_by_version,
            vec![
                CountEntry { label: "2.0.0".into(), count: 8 },
                CountEntry { label: "1.9.0".into(), count: 4 },
            ]
        );
        // Equal counts fall back to label order.
        assert_eq!(summary.downloads_by_ip[0].label, "10.0.0.1");
        assert_eq!(summary.downloads_by_ip[1].label, "10.0.0.2");

        assert_eq!(summary.recent_downloads.len(), RECENT_DOWNLOADS_LIMIT);
        assert_eq!(summary.recent_downloads[0].timestamp, "2026-03-15 10:11:00");
        assert_eq!(summary.recent_downloads[9].timestamp, "2026-03-15 10:02:00");
    }
}
