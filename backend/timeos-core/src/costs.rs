// src/costs.rs
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::calendar::parse_date_utc;
use crate::hours_report::{round_half_up, total_hours, total_hours_by};
use crate::models::{AllocationDoc, ProjectDoc, ResourceDoc, TaskStatus, TaskTimeEntryDoc};

/// Cost rate used when a user has no resource record.
pub const DEFAULT_RESOURCE_RATE: f64 = 50.0;
/// Billing rate used when a project has no hourly rate.
pub const DEFAULT_PROJECT_HOURLY_RATE: f64 = 100.0;

const ON_TRACK_TOLERANCE: f64 = 10.0;
const AT_RISK_TOLERANCE: f64 = 25.0;

// --- Rates ---

/// Hourly cost per user, taken from resource records.
#[derive(Debug, Clone, Default)]
pub struct RateCard {
    rates: HashMap<String, f64>,
}

impl RateCard {
    pub fn from_resources(resources: &[ResourceDoc]) -> Self {
        Self {
            rates: resources
                .iter()
                .map(|r| (r.user_id.clone(), r.hourly_rate))
                .collect(),
        }
    }

    pub fn rate_for(&self, user_id: &str) -> f64 {
        self.rates
            .get(user_id)
            .copied()
            .unwrap_or(DEFAULT_RESOURCE_RATE)
    }
}

// --- Project costs ---

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProjectCosts {
    pub actual_hours: f64,
    pub actual_cost: f64,
    pub revenue: f64,
    pub profit: f64,
    pub profit_margin: f64,
}

pub fn profit_margin(profit: f64, revenue: f64) -> f64 {
    if revenue > 0.0 {
        profit / revenue * 100.0
    } else {
        0.0
    }
}

pub fn project_costs(
    project: &ProjectDoc,
    entries: &[TaskTimeEntryDoc],
    rates: &RateCard,
) -> ProjectCosts {
    let project_entries: Vec<&TaskTimeEntryDoc> = entries
        .iter()
        .filter(|e| e.project_id == project.id)
        .collect();

    let actual_hours = total_hours(project_entries.iter().copied());
    let actual_cost: f64 = project_entries
        .iter()
        .map(|e| e.hours * rates.rate_for(&e.user_id))
        .sum();
    let revenue = if project.billable {
        actual_hours * project.hourly_rate.unwrap_or(DEFAULT_PROJECT_HOURLY_RATE)
    } else {
        0.0
    };
    let profit = revenue - actual_cost;

    ProjectCosts {
        actual_hours,
        actual_cost,
        revenue,
        profit,
        profit_margin: profit_margin(profit, revenue),
    }
}

/// Hours burned against the hour budget, capped at 100.
pub fn project_progress(actual_hours: f64, budget_hours: Option<f64>) -> f64 {
    match budget_hours {
        Some(budget) if budget > 0.0 && actual_hours > 0.0 => {
            round_half_up(actual_hours / budget * 100.0).min(100.0)
        }
        _ => 0.0,
    }
}

// --- Schedule health ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    OnTrack,
    AtRisk,
    Delayed,
    Completed,
}

/// Share of the planned window that has elapsed at `now`.
pub fn expected_progress(start: DateTime<Utc>, end: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    if end <= start {
        return if now >= end { 100.0 } else { 0.0 };
    }
    let elapsed = (now - start).num_milliseconds() as f64;
    let planned = (end - start).num_milliseconds() as f64;
    elapsed / planned * 100.0
}

pub fn schedule_status(
    progress: f64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> ScheduleStatus {
    if progress >= 100.0 {
        return ScheduleStatus::Completed;
    }
    let expected = expected_progress(start, end, now);
    if progress >= expected - ON_TRACK_TOLERANCE {
        ScheduleStatus::OnTrack
    } else if progress >= expected - AT_RISK_TOLERANCE {
        ScheduleStatus::AtRisk
    } else {
        ScheduleStatus::Delayed
    }
}

/// Schedule health for a project. `None` when either date is missing or unparsable.
pub fn project_schedule_status(
    project: &ProjectDoc,
    progress: f64,
    now: DateTime<Utc>,
) -> Option<ScheduleStatus> {
    let start = parse_date_utc(project.start_date.as_deref()?)?;
    let end = parse_date_utc(project.end_date.as_deref()?)?;
    Some(schedule_status(progress, start, end, now))
}

// --- Profitability ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfitabilityTier {
    Excellent,
    Good,
    Regular,
    Loss,
}

impl ProfitabilityTier {
    pub fn from_margin(margin: f64) -> Self {
        if margin >= 30.0 {
            ProfitabilityTier::Excellent
        } else if margin >= 15.0 {
            ProfitabilityTier::Good
        } else if margin >= 0.0 {
            ProfitabilityTier::Regular
        } else {
            ProfitabilityTier::Loss
        }
    }
}

/// A project with its computed financials written into the cost fields.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectCostView {
    #[serde(flatten)]
    pub project: ProjectDoc,
    pub revenue: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_status: Option<ScheduleStatus>,
    pub profitability: ProfitabilityTier,
}

pub fn project_cost_view(
    project: &ProjectDoc,
    entries: &[TaskTimeEntryDoc],
    rates: &RateCard,
    now: DateTime<Utc>,
) -> ProjectCostView {
    let costs = project_costs(project, entries, rates);
    let progress = project_progress(costs.actual_hours, project.budget_hours);

    let mut enriched = project.clone();
    enriched.actual_hours = Some(costs.actual_hours);
    enriched.actual_cost = Some(costs.actual_cost);
    enriched.profit = Some(costs.profit);
    enriched.profit_margin = Some(costs.profit_margin);
    enriched.progress = Some(progress);

    ProjectCostView {
        schedule_status: project_schedule_status(project, progress, now),
        profitability: ProfitabilityTier::from_margin(costs.profit_margin),
        revenue: costs.revenue,
        project: enriched,
    }
}

// --- Summary ---

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CostSummary {
    pub total_budget: f64,
    pub total_actual_cost: f64,
    pub total_profit: f64,
    pub average_profit_margin: f64,
    pub profitable_projects: usize,
    pub loss_projects: usize,
    pub billable_revenue: f64,
    pub budget_utilization: f64,
}

pub fn summarize_costs(projects: &[ProjectCostView]) -> CostSummary {
    let mut summary = CostSummary::default();
    let mut margin_sum = 0.0;
    for view in projects {
        let project = &view.project;
        let profit = project.profit.unwrap_or(0.0);
        summary.total_budget += project.budget.unwrap_or(0.0);
        summary.total_actual_cost += project.actual_cost.unwrap_or(0.0);
        summary.total_profit += profit;
        summary.billable_revenue += view.revenue;
        margin_sum += project.profit_margin.unwrap_or(0.0);
        if profit > 0.0 {
            summary.profitable_projects += 1;
        } else if profit < 0.0 {
            summary.loss_projects += 1;
        }
    }
    if !projects.is_empty() {
        summary.average_profit_margin = margin_sum / projects.len() as f64;
    }
    if summary.total_budget > 0.0 {
        summary.budget_utilization = summary.total_actual_cost / summary.total_budget * 100.0;
    }
    summary
}

// --- Resource costs ---

pub fn utilization(allocated_hours: f64, capacity: f64) -> f64 {
    if capacity > 0.0 {
        allocated_hours / capacity * 100.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceCosts {
    pub total_hours: f64,
    pub total_cost: f64,
    pub projects: Vec<String>,
    pub allocated_hours: f64,
    pub utilization: f64,
    pub overallocated: bool,
}

/// Costs for one resource. `allocations` should already be scoped to the
/// period of interest; `project_names` resolves ids for display.
pub fn resource_costs(
    resource: &ResourceDoc,
    entries: &[TaskTimeEntryDoc],
    allocations: &[AllocationDoc],
    project_names: &HashMap<String, String>,
) -> ResourceCosts {
    let own_entries: Vec<&TaskTimeEntryDoc> = entries
        .iter()
        .filter(|e| e.user_id == resource.user_id)
        .collect();
    let total_hours = total_hours(own_entries.iter().copied());

    let projects: BTreeSet<String> = own_entries
        .iter()
        .map(|e| {
            project_names
                .get(&e.project_id)
                .cloned()
                .unwrap_or_else(|| "Unknown".to_string())
        })
        .collect();

    let allocated_hours: f64 = allocations
        .iter()
        .filter(|a| a.resource_id == resource.id)
        .map(|a| a.allocated_hours)
        .sum();
    let utilization = utilization(allocated_hours, resource.capacity);

    ResourceCosts {
        total_hours,
        total_cost: total_hours * resource.hourly_rate,
        projects: projects.into_iter().collect(),
        allocated_hours,
        utilization,
        overallocated: utilization > 100.0,
    }
}

// --- Task time tracking ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskTimeStatus {
    NotStarted,
    OnTrack,
    OverBudget,
    UnderBudget,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskTimeTracking {
    pub remaining_hours: f64,
    pub over_hours: f64,
    pub variance: f64,
    pub time_status: TaskTimeStatus,
}

pub fn task_time_tracking(estimated: f64, actual: f64, status: TaskStatus) -> TaskTimeTracking {
    let time_status = if actual == 0.0 {
        TaskTimeStatus::NotStarted
    } else if actual > estimated {
        TaskTimeStatus::OverBudget
    } else if status == TaskStatus::Done && actual < estimated {
        TaskTimeStatus::UnderBudget
    } else {
        TaskTimeStatus::OnTrack
    };
    TaskTimeTracking {
        remaining_hours: (estimated - actual).max(0.0),
        over_hours: (actual - estimated).max(0.0),
        variance: actual - estimated,
        time_status,
    }
}

/// Logged hours per task id.
pub fn actual_hours_by_task(entries: &[TaskTimeEntryDoc]) -> HashMap<String, f64> {
    total_hours_by(entries, |e| e.task_id.clone())
}

#[cfg(test)]
mod costs_tests {
    use super::*;
    use chrono::TimeZone;

    fn create_test_project(id: &str, billable: bool, hourly_rate: Option<f64>) -> ProjectDoc {
        ProjectDoc {
            id: id.to_string(),
            name: format!("Project {}", id),
            code: id.to_uppercase(),
            client: None,
            description: None,
            billable,
            status: "active".to_string(),
            start_date: None,
            end_date: None,
            budget: Some(50_000.0),
            budget_hours: Some(400.0),
            actual_cost: None,
            actual_hours: None,
            hourly_rate,
            currency: Some("USD".to_string()),
            profit: None,
            profit_margin: None,
            baseline_start: None,
            baseline_end: None,
            baseline_budget: None,
            progress: None,
            created_at: 0,
            updated_at: None,
        }
    }

    fn create_test_resource(id: &str, user_id: &str, rate: f64, capacity: f64) -> ResourceDoc {
        ResourceDoc {
            id: id.to_string(),
            user_id: user_id.to_string(),
            capacity,
            skills: vec![],
            hourly_rate: rate,
            monthly_salary: None,
            currency: "USD".to_string(),
            created_at: 0,
            updated_at: None,
        }
    }

    fn create_test_entry(project_id: &str, user_id: &str, hours: f64) -> TaskTimeEntryDoc {
        TaskTimeEntryDoc {
            id: format!("tte_{}_{}_{}", project_id, user_id, hours),
            task_id: "task_1".to_string(),
            user_id: user_id.to_string(),
            project_id: project_id.to_string(),
            hours,
            date: "2026-02-16".to_string(),
            description: None,
            billable: true,
            week_number: 8,
            year: 2026,
            created_at: 0,
        }
    }

    fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_project_costs_reference_scenario() {
        let project = create_test_project("proj_1", true, Some(120.0));
        let rates = RateCard::from_resources(&[create_test_resource("res_1", "user_2", 45.0, 40.0)]);
        let entries = vec![
            create_test_entry("proj_1", "user_2", 60.0),
            create_test_entry("proj_1", "user_2", 40.0),
            create_test_entry("proj_2", "user_2", 12.0),
        ];

        let costs = project_costs(&project, &entries, &rates);
        assert_eq!(costs.actual_hours, 100.0);
        assert_eq!(costs.actual_cost, 4_500.0);
        assert_eq!(costs.revenue, 12_000.0);
        assert_eq!(costs.profit, 7_500.0);
        assert_eq!(costs.profit_margin, 62.5);
    }

    #[test]
    fn test_missing_rates_use_defaults() {
        let project = create_test_project("proj_1", true, None);
        let entries = vec![create_test_entry("proj_1", "nobody", 10.0)];
        let costs = project_costs(&project, &entries, &RateCard::default());
        assert_eq!(costs.actual_cost, 500.0);
        assert_eq!(costs.revenue, 1_000.0);
    }

    #[test]
    fn test_non_billable_project_has_zero_margin() {
        let project = create_test_project("proj_4", false, Some(150.0));
        let entries = vec![create_test_entry("proj_4", "user_3", 8.0)];
        let costs = project_costs(&project, &entries, &RateCard::default());
        assert_eq!(costs.revenue, 0.0);
        assert_eq!(costs.profit, -400.0);
        assert_eq!(costs.profit_margin, 0.0);
        assert_eq!(ProfitabilityTier::from_margin(costs.profit_margin), ProfitabilityTier::Regular);
    }

    #[test]
    fn test_profitability_tiers() {
        assert_eq!(ProfitabilityTier::from_margin(62.5), ProfitabilityTier::Excellent);
        assert_eq!(ProfitabilityTier::from_margin(30.0), ProfitabilityTier::Excellent);
        assert_eq!(ProfitabilityTier::from_margin(15.0), ProfitabilityTier::Good);
        assert_eq!(ProfitabilityTier::from_margin(0.0), ProfitabilityTier::Regular);
        assert_eq!(ProfitabilityTier::from_margin(-0.1), ProfitabilityTier::Loss);
    }

    #[test]
    fn test_project_progress() {
        assert_eq!(project_progress(100.0, Some(400.0)), 25.0);
        assert_eq!(project_progress(500.0, Some(400.0)), 100.0);
        assert_eq!(project_progress(10.0, None), 0.0);
        assert_eq!(project_progress(10.0, Some(0.0)), 0.0);
    }

    #[test]
    fn test_schedule_status_boundaries() {
        let start = day(2026, 1, 1);
        let end = day(2026, 1, 11);
        let now = day(2026, 1, 6); // halfway, expected 50
        assert_eq!(schedule_status(100.0, start, end, now), ScheduleStatus::Completed);
        assert_eq!(schedule_status(40.0, start, end, now), ScheduleStatus::OnTrack);
        assert_eq!(schedule_status(39.0, start, end, now), ScheduleStatus::AtRisk);
        assert_eq!(schedule_status(25.0, start, end, now), ScheduleStatus::AtRisk);
        assert_eq!(schedule_status(24.0, start, end, now), ScheduleStatus::Delayed);
    }

    #[test]
    fn test_expected_progress_with_degenerate_window() {
        let start = day(2026, 3, 1);
        assert_eq!(expected_progress(start, start, day(2026, 3, 2)), 100.0);
        assert_eq!(expected_progress(start, start, day(2026, 2, 1)), 0.0);
        assert_eq!(expected_progress(day(2026, 1, 1), day(2026, 1, 11), day(2025, 12, 22)), -100.0);
    }

    #[test]
    fn test_project_without_dates_has_no_schedule_status() {
        let project = create_test_project("proj_1", true, Some(120.0));
        assert_eq!(project_schedule_status(&project, 10.0, day(2026, 1, 1)), None);
    }

    #[test]
    fn test_cost_summary() {
        let rates = RateCard::default();
        let now = day(2026, 2, 18);
        let winning = create_test_project("proj_1", true, Some(120.0));
        let losing = create_test_project("proj_2", false, None);
        let entries = vec![
            create_test_entry("proj_1", "user_2", 10.0),
            create_test_entry("proj_2", "user_2", 10.0),
        ];
        let views = vec![
            project_cost_view(&winning, &entries, &rates, now),
            project_cost_view(&losing, &entries, &rates, now),
        ];

        let summary = summarize_costs(&views);
        assert_eq!(summary.total_budget, 100_000.0);
        assert_eq!(summary.total_actual_cost, 1_000.0);
        assert_eq!(summary.total_profit, 200.0);
        assert_eq!(summary.billable_revenue, 1_200.0);
        assert_eq!(summary.profitable_projects, 1);
        assert_eq!(summary.loss_projects, 1);
        assert_eq!(summary.budget_utilization, 1.0);
        assert_eq!(summary.average_profit_margin, (700.0 / 1_200.0 * 100.0) / 2.0);
        assert_eq!(summarize_costs(&[]), CostSummary::default());
    }

    #[test]
    fn test_cost_view_serializes_flat() {
        let project = create_test_project("proj_1", true, Some(120.0));
        let entries = vec![create_test_entry("proj_1", "user_2", 100.0)];
        let view = project_cost_view(&project, &entries, &RateCard::default(), day(2026, 2, 18));
        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value["actualHours"], 100.0);
        assert_eq!(value["revenue"], 12_000.0);
        assert_eq!(value["progress"], 25.0);
        assert_eq!(value["profitability"], "excellent");
        assert!(value.get("scheduleStatus").is_none());
    }

    #[test]
    fn test_resource_costs_and_overallocation() {
        let resource = create_test_resource("res_1", "user_2", 45.0, 40.0);
        let entries = vec![
            create_test_entry("proj_1", "user_2", 8.0),
            create_test_entry("proj_1", "user_2", 4.0),
            create_test_entry("proj_9", "user_2", 2.0),
            create_test_entry("proj_1", "user_3", 8.0),
        ];
        let allocations = vec![
            AllocationDoc {
                id: "alloc_1".into(),
                resource_id: "res_1".into(),
                project_id: "proj_1".into(),
                week_number: 8,
                year: 2026,
                allocated_hours: 30.0,
                created_at: 0,
            },
            AllocationDoc {
                id: "alloc_2".into(),
                resource_id: "res_1".into(),
                project_id: "proj_2".into(),
                week_number: 8,
                year: 2026,
                allocated_hours: 20.0,
                created_at: 0,
            },
        ];
        let names = HashMap::from([("proj_1".to_string(), "Portal".to_string())]);

        let costs = resource_costs(&resource, &entries, &allocations, &names);
        assert_eq!(costs.total_hours, 14.0);
        assert_eq!(costs.total_cost, 630.0);
        assert_eq!(costs.projects, vec!["Portal".to_string(), "Unknown".to_string()]);
        assert_eq!(costs.allocated_hours, 50.0);
        assert_eq!(costs.utilization, 125.0);
        assert!(costs.overallocated);
    }

    #[test]
    fn test_zero_capacity_utilization() {
        assert_eq!(utilization(20.0, 0.0), 0.0);
        assert_eq!(utilization(20.0, 40.0), 50.0);
    }

    #[test]
    fn test_task_time_tracking_cases() {
        let fresh = task_time_tracking(10.0, 0.0, TaskStatus::Todo);
        assert_eq!(fresh.time_status, TaskTimeStatus::NotStarted);
        assert_eq!(fresh.remaining_hours, 10.0);

        let over = task_time_tracking(10.0, 12.5, TaskStatus::InProgress);
        assert_eq!(over.time_status, TaskTimeStatus::OverBudget);
        assert_eq!(over.over_hours, 2.5);
        assert_eq!(over.remaining_hours, 0.0);
        assert_eq!(over.variance, 2.5);

        let under = task_time_tracking(10.0, 6.0, TaskStatus::Done);
        assert_eq!(under.time_status, TaskTimeStatus::UnderBudget);

        let running = task_time_tracking(10.0, 6.0, TaskStatus::InProgress);
        assert_eq!(running.time_status, TaskTimeStatus::OnTrack);
        assert_eq!(running.variance, -4.0);
    }

    #[test]
    fn test_actual_hours_by_task() {
        let mut a = create_test_entry("proj_1", "user_2", 3.0);
        a.task_id = "task_a".into();
        let mut b = create_test_entry("proj_1", "user_3", 2.5);
        b.task_id = "task_a".into();
        let c = create_test_entry("proj_1", "user_2", 1.0);
        let totals = actual_hours_by_task(&[a, b, c]);
        assert_eq!(totals["task_a"], 5.5);
        assert_eq!(totals["task_1"], 1.0);
    }
}
