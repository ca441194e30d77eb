// src/hours_report.rs
use serde::Serialize;
use std::collections::HashMap;
use std::hash::Hash;

use crate::models::{DayHours, TaskTimeEntryDoc, TimeEntryDoc, UserDoc};

// --- Targets ---

pub const HOURS_MINIMUM: f64 = 6.0;
pub const HOURS_TARGET: f64 = 8.0;
pub const WORK_DAYS_PER_WEEK: f64 = 5.0;
pub const WEEKLY_TARGET: f64 = HOURS_TARGET * WORK_DAYS_PER_WEEK;
/// Below this a week counts as "low entry" rather than "partial".
pub const WEEKLY_LOW_THRESHOLD: f64 = HOURS_MINIMUM * WORK_DAYS_PER_WEEK;

/// Rounds half away from negative infinity, matching how the UI rounds percentages.
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

pub fn round2(value: f64) -> f64 {
    round_half_up(value * 100.0) / 100.0
}

// --- Aggregation ---

/// Anything that carries a number of logged hours.
pub trait HoursRecord {
    fn logged_hours(&self) -> f64;
}

impl HoursRecord for TimeEntryDoc {
    fn logged_hours(&self) -> f64 {
        self.hours.total()
    }
}

impl HoursRecord for TaskTimeEntryDoc {
    fn logged_hours(&self) -> f64 {
        self.hours
    }
}

pub fn total_hours<'a, T>(records: impl IntoIterator<Item = &'a T>) -> f64
where
    T: HoursRecord + 'a,
{
    records.into_iter().map(HoursRecord::logged_hours).sum()
}

/// Groups records by `key` and sums each group. Keys without records are absent;
/// callers treat a missing key as zero.
pub fn total_hours_by<'a, T, K, F>(
    records: impl IntoIterator<Item = &'a T>,
    key: F,
) -> HashMap<K, f64>
where
    T: HoursRecord + 'a,
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut totals: HashMap<K, f64> = HashMap::new();
    for record in records {
        *totals.entry(key(record)).or_insert(0.0) += record.logged_hours();
    }
    totals
}

/// Per-day sums of a user's weekly entries.
pub fn daily_breakdown<'a>(entries: impl IntoIterator<Item = &'a TimeEntryDoc>) -> DayHours {
    entries.into_iter().fold(DayHours::default(), |mut acc, e| {
        acc.add(&e.hours);
        acc
    })
}

// --- Classification ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HoursStatus {
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
}

impl HoursStatus {
    pub fn label(&self) -> &'static str {
        match self {
            HoursStatus::Red => "No entry",
            HoursStatus::Orange => "Low entry",
            HoursStatus::Yellow => "Partial",
            HoursStatus::Green => "Complete",
            HoursStatus::Blue => "Overtime",
        }
    }
}

pub fn classify_weekly_hours(total: f64) -> HoursStatus {
    if total == 0.0 {
        HoursStatus::Red
    } else if total < WEEKLY_LOW_THRESHOLD {
        HoursStatus::Orange
    } else if total < WEEKLY_TARGET {
        HoursStatus::Yellow
    } else if total == WEEKLY_TARGET {
        HoursStatus::Green
    } else {
        HoursStatus::Blue
    }
}

/// Share of the weekly target, uncapped.
pub fn completion_percentage(total: f64) -> f64 {
    round_half_up(total / WEEKLY_TARGET * 100.0)
}

// --- Employee hours report ---

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeHours {
    pub user_id: String,
    pub user_name: String,
    pub daily_hours: DayHours,
    pub total_hours: f64,
    pub average_daily_hours: f64,
    pub status: HoursStatus,
    pub status_label: &'static str,
    pub completion_percentage: f64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HoursSummary {
    pub total_employees: usize,
    pub completed: usize,
    pub over_time: usize,
    pub no_entry: usize,
    pub low_entry: usize,
    pub partial: usize,
    pub total_hours: f64,
    pub average_hours: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeHoursReport {
    pub employees: Vec<EmployeeHours>,
    pub summary: HoursSummary,
    pub week_number: u32,
    pub year: i32,
}

fn employee_hours(user: &UserDoc, entries: &[&TimeEntryDoc]) -> EmployeeHours {
    let daily_hours = daily_breakdown(entries.iter().copied());
    let total_hours = daily_hours.total();
    let status = classify_weekly_hours(total_hours);
    EmployeeHours {
        user_id: user.id.clone(),
        user_name: user.name.clone(),
        daily_hours,
        total_hours,
        average_daily_hours: round2(total_hours / WORK_DAYS_PER_WEEK),
        status,
        status_label: status.label(),
        completion_percentage: completion_percentage(total_hours),
    }
}

pub fn summarize(employees: &[EmployeeHours]) -> HoursSummary {
    let mut summary = HoursSummary {
        total_employees: employees.len(),
        ..HoursSummary::default()
    };
    for employee in employees {
        summary.total_hours += employee.total_hours;
        match employee.status {
            HoursStatus::Red => summary.no_entry += 1,
            HoursStatus::Orange => summary.low_entry += 1,
            HoursStatus::Yellow => summary.partial += 1,
            HoursStatus::Green => summary.completed += 1,
            HoursStatus::Blue => summary.over_time += 1,
        }
    }
    summary.average_hours = if employees.is_empty() {
        0.0
    } else {
        round2(summary.total_hours / employees.len() as f64)
    };
    summary
}

/// Builds the weekly report for every user, or just `only_user` when given.
/// Entries from other weeks are ignored.
pub fn build_employee_hours_report(
    users: &[UserDoc],
    entries: &[TimeEntryDoc],
    week_number: u32,
    year: i32,
    only_user: Option<&str>,
) -> EmployeeHoursReport {
    let mut by_user: HashMap<&str, Vec<&TimeEntryDoc>> = HashMap::new();
    for entry in entries
        .iter()
        .filter(|e| e.week_number == week_number && e.year == year)
    {
        by_user.entry(entry.user_id.as_str()).or_default().push(entry);
    }

    let employees: Vec<EmployeeHours> = users
        .iter()
        .filter(|u| only_user.map_or(true, |id| u.id == id))
        .map(|user| {
            let user_entries = by_user
                .get(user.id.as_str())
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            employee_hours(user, user_entries)
        })
        .collect();

    EmployeeHoursReport {
        summary: summarize(&employees),
        employees,
        week_number,
        year,
    }
}

#[cfg(test)]
mod hours_report_tests {
    use super::*;
    use crate::models::{Role, TimeEntryStatus};

    fn create_test_user(id: &str, name: &str) -> UserDoc {
        UserDoc {
            id: id.to_string(),
            name: name.to_string(),
            email: format!("{}@timeos.test", id),
            role: Role::Member,
            avatar: None,
            password: None,
            is_active: true,
            created_at: 0,
            updated_at: None,
        }
    }

    fn create_test_entry(id: &str, user_id: &str, week: u32, hours: DayHours) -> TimeEntryDoc {
        TimeEntryDoc {
            id: id.to_string(),
            user_id: user_id.to_string(),
            project_id: "proj_1".to_string(),
            activity: "Development".to_string(),
            notes: None,
            billable: true,
            week_number: week,
            year: 2026,
            total: hours.total(),
            hours,
            status: TimeEntryStatus::Draft,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_classify_boundaries() {
        assert_eq!(classify_weekly_hours(0.0), HoursStatus::Red);
        assert_eq!(classify_weekly_hours(29.99), HoursStatus::Orange);
        assert_eq!(classify_weekly_hours(30.0), HoursStatus::Yellow);
        assert_eq!(classify_weekly_hours(39.99), HoursStatus::Yellow);
        assert_eq!(classify_weekly_hours(40.0), HoursStatus::Green);
        assert_eq!(classify_weekly_hours(40.01), HoursStatus::Blue);
    }

    #[test]
    fn test_negative_total_is_low_entry() {
        assert_eq!(classify_weekly_hours(-2.0), HoursStatus::Orange);
    }

    #[test]
    fn test_completion_percentage_is_uncapped() {
        assert_eq!(completion_percentage(40.0), 100.0);
        assert_eq!(completion_percentage(20.0), 50.0);
        assert_eq!(completion_percentage(60.0), 150.0);
        assert_eq!(completion_percentage(0.0), 0.0);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(7.456), 7.46);
        assert_eq!(round2(7.0), 7.0);
        assert_eq!(round2(37.5 / 5.0), 7.5);
    }

    #[test]
    fn test_total_hours_by_key() {
        let entries = vec![
            create_test_entry("a", "user_2", 8, DayHours { mon: 8.0, ..DayHours::default() }),
            create_test_entry("b", "user_2", 8, DayHours { tue: 4.0, ..DayHours::default() }),
            create_test_entry("c", "user_3", 8, DayHours { wed: 2.5, ..DayHours::default() }),
        ];
        let totals = total_hours_by(&entries, |e| e.user_id.clone());
        assert_eq!(totals.get("user_2"), Some(&12.0));
        assert_eq!(totals.get("user_3"), Some(&2.5));
        assert_eq!(totals.get("user_4"), None);
        assert_eq!(total_hours(&entries), 14.5);
    }

    #[test]
    fn test_five_single_day_entries_make_a_complete_week() {
        let users = vec![create_test_user("user_2", "Carlos")];
        let entries = vec![
            create_test_entry("1", "user_2", 8, DayHours { mon: 8.0, ..DayHours::default() }),
            create_test_entry("2", "user_2", 8, DayHours { tue: 8.0, ..DayHours::default() }),
            create_test_entry("3", "user_2", 8, DayHours { wed: 8.0, ..DayHours::default() }),
            create_test_entry("4", "user_2", 8, DayHours { thu: 8.0, ..DayHours::default() }),
            create_test_entry("5", "user_2", 8, DayHours { fri: 8.0, ..DayHours::default() }),
        ];

        let report = build_employee_hours_report(&users, &entries, 8, 2026, None);
        let carlos = &report.employees[0];
        assert_eq!(carlos.total_hours, 40.0);
        assert_eq!(carlos.status, HoursStatus::Green);
        assert_eq!(carlos.status_label, "Complete");
        assert_eq!(carlos.completion_percentage, 100.0);
        assert_eq!(carlos.average_daily_hours, 8.0);
        assert_eq!(carlos.daily_hours.wed, 8.0);
        assert_eq!(report.summary.completed, 1);
    }

    #[test]
    fn test_report_ignores_other_weeks_and_counts_missing_users() {
        let users = vec![
            create_test_user("user_2", "Carlos"),
            create_test_user("user_3", "Lucia"),
            create_test_user("user_4", "Diego"),
        ];
        let full = DayHours { mon: 9.0, tue: 9.0, wed: 9.0, thu: 9.0, fri: 9.0, ..DayHours::default() };
        let entries = vec![
            create_test_entry("1", "user_2", 8, full),
            create_test_entry("2", "user_3", 8, DayHours { mon: 6.0, tue: 6.0, ..DayHours::default() }),
            create_test_entry("3", "user_4", 7, full),
            // Entry for someone without a user record.
            create_test_entry("4", "ghost", 8, full),
        ];

        let report = build_employee_hours_report(&users, &entries, 8, 2026, None);
        assert_eq!(report.summary.total_employees, 3);
        assert_eq!(report.summary.over_time, 1);
        assert_eq!(report.summary.low_entry, 1);
        assert_eq!(report.summary.no_entry, 1);
        assert_eq!(report.summary.total_hours, 57.0);
        assert_eq!(report.summary.average_hours, 19.0);

        let diego = report.employees.iter().find(|e| e.user_id == "user_4").unwrap();
        assert_eq!(diego.status, HoursStatus::Red);
        assert_eq!(diego.total_hours, 0.0);
    }

    #[test]
    fn test_report_for_single_user() {
        let users = vec![create_test_user("user_2", "Carlos"), create_test_user("user_3", "Lucia")];
        let report = build_employee_hours_report(&users, &[], 8, 2026, Some("user_3"));
        assert_eq!(report.employees.len(), 1);
        assert_eq!(report.employees[0].user_name, "Lucia");
    }

    #[test]
    fn test_empty_report_has_zero_average() {
        let report = build_employee_hours_report(&[], &[], 8, 2026, None);
        assert_eq!(report.summary, HoursSummary::default());
    }
}
