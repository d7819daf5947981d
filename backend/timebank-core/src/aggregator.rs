// src/aggregator.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::calendar::Period;
use crate::config::Config;
use crate::entry::{Entry, EntryBook};
use crate::evaluator::{absence_minutes, evaluate_entry, EntryEvaluation};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total_worked_minutes: i64,
    /// Daily target times the number of business days, whether worked or not.
    pub total_expected_minutes: i64,
    /// Sum of the daily series.
    pub balance_minutes: i64,
    pub average_per_day_minutes: i64,
    pub business_days: u32,
    /// Business days with a counted valid entry; the average's denominator.
    pub counted_days: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub minutes: i64,
}

/// One table row: the entry as recorded plus its evaluated figures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryResult {
    #[serde(flatten)]
    pub entry: Entry,
    #[serde(flatten)]
    pub evaluation: EntryEvaluation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub period: Period,
    pub summary: Summary,
    pub daily_series: Vec<SeriesPoint>,
    pub cumulative_series: Vec<SeriesPoint>,
    /// Entries inside the period, ascending by date then id.
    pub entries: Vec<EntryResult>,
}

/// Computes per-entry figures, the period summary and both balance series.
/// Pure: the same inputs always give the same report, and nothing fails.
pub fn compute_report(entries: &[Entry], config: &Config, period: &Period) -> Report {
    let in_period = entries.iter().filter(|e| period.contains(e.date)).cloned();
    let (book, superseded) = EntryBook::resolve(in_period);
    debug!(
        "{} of {} entries fall in {} ({} superseded)",
        book.len() + superseded.len(),
        entries.len(),
        period,
        superseded.len()
    );

    let mut summary = Summary::default();
    let mut daily_series = Vec::new();
    let mut cumulative_series = Vec::new();
    let mut results = Vec::with_capacity(book.len() + superseded.len());
    let mut running = 0_i64;

    for date in period.dates() {
        let business_day = config.is_business_day(date);
        if business_day {
            summary.business_days += 1;
            summary.total_expected_minutes += i64::from(config.expected_daily_minutes);
        }

        let evaluation = book.get(date).map(|entry| (entry, evaluate_entry(entry, config)));
        let daily_balance = match &evaluation {
            Some((_, eval)) if eval.valid => {
                summary.total_worked_minutes += eval.worked_minutes;
                if business_day {
                    summary.counted_days += 1;
                }
                eval.balance_minutes
            }
            _ => absence_minutes(date, config),
        };

        if let Some((entry, eval)) = evaluation {
            results.push(EntryResult {
                entry: entry.clone(),
                evaluation: eval,
            });
        }

        running += daily_balance;
        daily_series.push(SeriesPoint {
            date,
            minutes: daily_balance,
        });
        cumulative_series.push(SeriesPoint {
            date,
            minutes: running,
        });
    }

    results.extend(superseded.into_iter().map(|s| EntryResult {
        evaluation: EntryEvaluation::superseded(s.entry.date, config, s.by),
        entry: s.entry,
    }));
    results.sort_by_key(|r| (r.entry.date, r.entry.id));

    summary.balance_minutes = running;
    summary.average_per_day_minutes = if summary.counted_days > 0 {
        summary.total_worked_minutes / i64::from(summary.counted_days)
    } else {
        0
    };

    info!(
        "Report for {}: worked {} / expected {} min, balance {} min over {} business days",
        period,
        summary.total_worked_minutes,
        summary.total_expected_minutes,
        summary.balance_minutes,
        summary.business_days
    );

    Report {
        period: *period,
        summary,
        daily_series,
        cumulative_series,
        entries: results,
    }
}

#[cfg(test)]
mod report_tests {
    use super::*;
    use crate::calendar::DayCode;
    use crate::entry::NewEntry;
    use crate::evaluator::EntryIssue;

    fn d(date_str: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
            .unwrap_or_else(|_| panic!("Invalid date string format: {}", date_str))
    }

    fn build_entry(id: u64, date: &str, punches: [&str; 4]) -> Entry {
        let p = |s: &str| Some(s.to_string());
        NewEntry {
            date: d(date),
            clock_in: p(punches[0]),
            lunch_out: p(punches[1]),
            lunch_in: p(punches[2]),
            clock_out: p(punches[3]),
            note: String::new(),
        }
        .with_id(id)
    }

    fn debit_config() -> Config {
        Config {
            expected_daily_minutes: 480,
            business_days: DayCode::WORKWEEK.into_iter().collect(),
            count_absence_as_debit: true,
            rounding_minutes: None,
            ..Config::default()
        }
    }

    fn series_sum(series: &[SeriesPoint]) -> i64 {
        series.iter().map(|p| p.minutes).sum()
    }

    fn assert_consistent(report: &Report) {
        assert_eq!(
            report.summary.balance_minutes,
            series_sum(&report.daily_series),
            "summary balance must equal the daily series total"
        );
        let last = report.cumulative_series.last().map(|p| p.minutes).unwrap_or(0);
        assert_eq!(last, report.summary.balance_minutes);
        assert_eq!(report.daily_series.len(), report.cumulative_series.len());
    }

    #[test]
    fn absent_business_day_is_debited() {
        // Monday with no entry.
        let report = compute_report(&[], &debit_config(), &Period::day(d("2023-10-02")));
        assert_eq!(report.daily_series, vec![SeriesPoint { date: d("2023-10-02"), minutes: -480 }]);
        assert_eq!(report.summary.balance_minutes, -480);
        assert_eq!(report.summary.total_expected_minutes, 480);
        assert_eq!(report.summary.total_worked_minutes, 0);
        assert_consistent(&report);
    }

    #[test]
    fn absent_business_day_without_debit_is_neutral() {
        let config = Config {
            count_absence_as_debit: false,
            ..debit_config()
        };
        let report = compute_report(&[], &config, &Period::day(d("2023-10-02")));
        assert_eq!(report.daily_series[0].minutes, 0);
        assert_eq!(report.summary.balance_minutes, 0);
        // The target is still the theoretical one.
        assert_eq!(report.summary.total_expected_minutes, 480);
        assert_consistent(&report);
    }

    #[test]
    fn full_week_mixes_entries_and_absences() {
        let entries = vec![
            build_entry(1, "2023-10-02", ["08:30", "12:00", "13:30", "18:00"]), // 480
            build_entry(2, "2023-10-03", ["08:25", "12:05", "13:35", "19:10"]), // 555
            build_entry(3, "2023-10-04", ["08:40", "12:10", "13:40", "17:35"]), // 445
        ];
        let period = Period::week_of(d("2023-10-04")).unwrap();
        let report = compute_report(&entries, &debit_config(), &period);

        let daily: Vec<i64> = report.daily_series.iter().map(|p| p.minutes).collect();
        assert_eq!(daily, vec![0, 75, -35, -480, -480, 0, 0]);
        let cumulative: Vec<i64> = report.cumulative_series.iter().map(|p| p.minutes).collect();
        assert_eq!(cumulative, vec![0, 75, 40, -440, -920, -920, -920]);

        let s = &report.summary;
        assert_eq!(s.total_worked_minutes, 1480);
        assert_eq!(s.total_expected_minutes, 2400);
        assert_eq!(s.balance_minutes, -920);
        assert_eq!(s.business_days, 5);
        assert_eq!(s.counted_days, 3);
        assert_eq!(s.average_per_day_minutes, 493);
        assert_eq!(report.entries.len(), 3);
        assert_consistent(&report);
    }

    #[test]
    fn reversed_period_is_all_zero() {
        let entries = vec![build_entry(1, "2023-10-02", ["09:00", "12:00", "13:00", "18:00"])];
        let period = Period::range(d("2023-10-05"), d("2023-10-01"));
        let report = compute_report(&entries, &debit_config(), &period);
        assert_eq!(report.summary, Summary::default());
        assert!(report.daily_series.is_empty());
        assert!(report.cumulative_series.is_empty());
        assert!(report.entries.is_empty());
    }

    #[test]
    fn weekend_only_period_has_no_target() {
        let period = Period::range(d("2023-10-07"), d("2023-10-08"));
        let report = compute_report(&[], &debit_config(), &period);
        assert_eq!(report.summary.total_expected_minutes, 0);
        assert_eq!(report.summary.average_per_day_minutes, 0);
        assert_eq!(report.summary.balance_minutes, 0);
        assert_eq!(report.daily_series.len(), 2);
    }

    #[test]
    fn weekend_work_is_banked_as_surplus() {
        let entries = vec![build_entry(1, "2023-10-07", ["10:00", "12:00", "12:30", "14:30"])];
        let period = Period::range(d("2023-10-07"), d("2023-10-08"));
        let report = compute_report(&entries, &debit_config(), &period);
        assert_eq!(report.summary.total_worked_minutes, 240);
        assert_eq!(report.summary.balance_minutes, 240);
        // Not a business day, so it does not enter the average.
        assert_eq!(report.summary.counted_days, 0);
        assert_eq!(report.summary.average_per_day_minutes, 0);
        assert_consistent(&report);
    }

    #[test]
    fn invalid_entry_counts_as_absence() {
        let entries = vec![build_entry(1, "2023-10-02", ["13:00", "12:00", "13:00", "18:00"])];
        let report = compute_report(&entries, &debit_config(), &Period::day(d("2023-10-02")));

        let row = &report.entries[0];
        assert!(!row.evaluation.valid);
        assert_eq!(row.evaluation.worked_minutes, 0);
        assert_eq!(row.evaluation.balance_minutes, -480);
        assert_eq!(report.summary.total_worked_minutes, 0);
        assert_eq!(report.summary.balance_minutes, -480);
        assert_eq!(report.summary.average_per_day_minutes, 0);
        assert_consistent(&report);
    }

    #[test]
    fn entries_outside_period_are_ignored() {
        let entries = vec![
            build_entry(1, "2023-09-29", ["09:00", "12:00", "13:00", "18:00"]),
            build_entry(2, "2023-10-02", ["09:00", "12:00", "13:00", "18:00"]),
        ];
        let report = compute_report(&entries, &debit_config(), &Period::day(d("2023-10-02")));
        assert_eq!(report.entries.len(), 1);
        assert_eq!(report.entries[0].entry.id, 2);
    }

    #[test]
    fn duplicate_date_counts_latest_entry_once() {
        let entries = vec![
            build_entry(9, "2023-10-02", ["09:00", "12:00", "13:00", "17:00"]), // 420
            build_entry(3, "2023-10-02", ["09:00", "12:00", "13:00", "18:00"]), // 480
        ];
        let report = compute_report(&entries, &debit_config(), &Period::day(d("2023-10-02")));

        assert_eq!(report.summary.total_worked_minutes, 420);
        assert_eq!(report.summary.balance_minutes, -60);
        assert_eq!(report.entries.len(), 2);
        assert_eq!(report.entries[0].entry.id, 3);
        assert_eq!(
            report.entries[0].evaluation.issue,
            Some(EntryIssue::Superseded { by: 9 })
        );
        assert_eq!(report.entries[0].evaluation.balance_minutes, 0);
        assert!(report.entries[1].evaluation.valid);
        assert_consistent(&report);
    }

    #[test]
    fn rounding_applies_before_totals() {
        let config = Config {
            rounding_minutes: Some(15),
            ..debit_config()
        };
        // 472 raw minutes.
        let entries = vec![build_entry(1, "2023-10-02", ["09:00", "12:00", "13:00", "17:52"])];
        let report = compute_report(&entries, &config, &Period::day(d("2023-10-02")));
        assert_eq!(report.summary.total_worked_minutes, 465);
        assert_eq!(report.summary.balance_minutes, -15);
        assert_eq!(report.entries[0].evaluation.worked_minutes, 465);
    }

    #[test]
    fn holidays_are_not_business_days() {
        let mut config = debit_config();
        config.holidays.insert(d("2023-10-12"));
        let period = Period::range(d("2023-10-11"), d("2023-10-13"));
        let report = compute_report(&[], &config, &period);
        assert_eq!(report.summary.business_days, 2);
        assert_eq!(report.summary.total_expected_minutes, 960);
        let daily: Vec<i64> = report.daily_series.iter().map(|p| p.minutes).collect();
        assert_eq!(daily, vec![-480, 0, -480]);
    }

    #[test]
    fn report_serializes_entry_rows_flat() {
        let entries = vec![build_entry(1, "2023-10-02", ["09:00", "12:00", "13:00", "18:00"])];
        let report = compute_report(&entries, &debit_config(), &Period::day(d("2023-10-02")));
        let json = serde_json::to_value(&report).unwrap();
        let row = &json["entries"][0];
        assert_eq!(row["date"], "2023-10-02");
        assert_eq!(row["clock_in"], "09:00");
        assert_eq!(row["worked_minutes"], 480);
        assert_eq!(row["valid"], true);
        assert_eq!(json["summary"]["balance_minutes"], 0);
        assert_eq!(json["period"]["kind"], "day");
    }
}
