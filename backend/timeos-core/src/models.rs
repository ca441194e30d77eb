// src/models.rs
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::approval::ApprovalStatus;
use crate::calendar::now_millis;

/// Per-day hours above this are flagged to the user, never rejected.
pub const DAY_HOURS_WARNING_THRESHOLD: f64 = 12.0;
pub const DEFAULT_CAPACITY_HOURS: f64 = 40.0;
pub const DEFAULT_CURRENCY: &str = "USD";

/// Builds a store id such as `te_1771234567890_k3j9x2`.
pub fn new_id(prefix: &str) -> String {
    let suffix: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect::<String>()
        .to_lowercase();
    format!("{}_{}_{}", prefix, now_millis(), suffix)
}

fn default_true() -> bool {
    true
}

fn default_capacity() -> f64 {
    DEFAULT_CAPACITY_HOURS
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_project_status() -> String {
    "active".to_string()
}

// --- Roles ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Role {
    Admin,
    Manager,
    #[default]
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Member => "member",
        }
    }
}

// Unknown roles fall back to the least privileged one.
impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "admin" => Role::Admin,
            "manager" => Role::Manager,
            _ => Role::Member,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Users ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserDoc {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

/// A user as returned by the API. Never carries the password.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub is_active: bool,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl From<&UserDoc> for UserView {
    fn from(user: &UserDoc) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            avatar: user.avatar.clone(),
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

// --- Weekly timesheets ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct DayHours {
    #[serde(default)]
    pub mon: f64,
    #[serde(default)]
    pub tue: f64,
    #[serde(default)]
    pub wed: f64,
    #[serde(default)]
    pub thu: f64,
    #[serde(default)]
    pub fri: f64,
    #[serde(default)]
    pub sat: f64,
    #[serde(default)]
    pub sun: f64,
}

impl DayHours {
    pub fn days(&self) -> [(&'static str, f64); 7] {
        [
            ("mon", self.mon),
            ("tue", self.tue),
            ("wed", self.wed),
            ("thu", self.thu),
            ("fri", self.fri),
            ("sat", self.sat),
            ("sun", self.sun),
        ]
    }

    pub fn total(&self) -> f64 {
        self.days().iter().map(|(_, hours)| hours).sum()
    }

    pub fn add(&mut self, other: &DayHours) {
        self.mon += other.mon;
        self.tue += other.tue;
        self.wed += other.wed;
        self.thu += other.thu;
        self.fri += other.fri;
        self.sat += other.sat;
        self.sun += other.sun;
    }

    /// Days outside the soft `[0, 12]` band.
    pub fn flagged_days(&self) -> Vec<&'static str> {
        self.days()
            .iter()
            .filter(|(_, hours)| *hours < 0.0 || *hours > DAY_HOURS_WARNING_THRESHOLD)
            .map(|(day, _)| *day)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimeEntryStatus {
    #[default]
    Draft,
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntryDoc {
    pub id: String,
    pub user_id: String,
    pub project_id: String,
    #[serde(default)]
    pub activity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default = "default_true")]
    pub billable: bool,
    pub week_number: u32,
    pub year: i32,
    #[serde(default)]
    pub hours: DayHours,
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub status: TimeEntryStatus,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

impl TimeEntryDoc {
    /// Keeps `total` equal to the sum of the day map.
    pub fn recompute_total(&mut self) {
        self.total = self.hours.total();
    }
}

// --- Tasks ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskDoc {
    pub id: String,
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default)]
    pub estimated_hours: f64,
    #[serde(default)]
    pub actual_hours: f64,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub is_epic: bool,
    #[serde(default)]
    pub is_milestone: bool,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskTimeEntryDoc {
    pub id: String,
    pub task_id: String,
    pub user_id: String,
    pub project_id: String,
    #[serde(default)]
    pub hours: f64,
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub billable: bool,
    #[serde(default)]
    pub week_number: u32,
    #[serde(default)]
    pub year: i32,
    #[serde(default)]
    pub created_at: i64,
}

// --- Projects ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDoc {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub billable: bool,
    #[serde(default = "default_project_status")]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hourly_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profit_margin: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_budget: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

// --- Resources ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDoc {
    pub id: String,
    pub user_id: String,
    #[serde(default = "default_capacity")]
    pub capacity: f64,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub hourly_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_salary: Option<f64>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AllocationDoc {
    pub id: String,
    pub resource_id: String,
    pub project_id: String,
    pub week_number: u32,
    pub year: i32,
    #[serde(default)]
    pub allocated_hours: f64,
    #[serde(default)]
    pub created_at: i64,
}

// --- Approvals ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalDoc {
    pub id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approver_id: Option<String>,
    pub week_number: u32,
    pub year: i32,
    #[serde(default)]
    pub total_hours: f64,
    #[serde(default)]
    pub status: ApprovalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<i64>,
    #[serde(default)]
    pub created_at: i64,
}

/// Display join used by list endpoints. Missing references render as "Unknown".
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NameRef {
    pub id: String,
    pub name: String,
}

impl NameRef {
    pub fn unknown(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: "Unknown".to_string(),
        }
    }

    /// Looks `id` up in an id-to-name map.
    pub fn resolve(names: &HashMap<String, String>, id: &str) -> Self {
        match names.get(id) {
            Some(name) => Self {
                id: id.to_string(),
                name: name.clone(),
            },
            None => Self::unknown(id),
        }
    }
}

#[cfg(test)]
mod models_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_day_hours_total_and_flags() {
        let hours = DayHours {
            mon: 8.0,
            tue: 13.5,
            wed: -1.0,
            fri: 4.5,
            ..DayHours::default()
        };
        assert_eq!(hours.total(), 25.0);
        assert_eq!(hours.flagged_days(), vec!["tue", "wed"]);
    }

    #[test]
    fn test_time_entry_defaults_from_sparse_document() {
        let entry: TimeEntryDoc = serde_json::from_value(json!({
            "id": "te_1",
            "userId": "user_2",
            "projectId": "proj_1",
            "weekNumber": 8,
            "year": 2026,
            "hours": { "mon": 8, "wed": 4 }
        }))
        .unwrap();
        assert!(entry.billable);
        assert_eq!(entry.status, TimeEntryStatus::Draft);
        assert_eq!(entry.hours.tue, 0.0);
        assert_eq!(entry.hours.total(), 12.0);
    }

    #[test]
    fn test_unknown_role_falls_back_to_member() {
        let user: UserDoc = serde_json::from_value(json!({
            "id": "u", "name": "N", "email": "n@example.com", "role": "owner"
        }))
        .unwrap();
        assert_eq!(user.role, Role::Member);
        assert!(user.is_active);
        assert_eq!(serde_json::to_value(Role::Manager).unwrap(), json!("manager"));
    }

    #[test]
    fn test_user_view_drops_password() {
        let user = UserDoc {
            id: "user_1".into(),
            name: "Ana".into(),
            email: "ana@example.com".into(),
            role: Role::Admin,
            avatar: None,
            password: Some("secret".into()),
            is_active: true,
            created_at: 1,
            updated_at: None,
        };
        let value = serde_json::to_value(UserView::from(&user)).unwrap();
        assert!(value.get("password").is_none());
        assert_eq!(value["role"], json!("admin"));
    }

    #[test]
    fn test_task_status_wire_names() {
        assert_eq!(
            serde_json::to_value(TaskStatus::InProgress).unwrap(),
            json!("in_progress")
        );
    }

    #[test]
    fn test_new_id_shape() {
        let id = new_id("te");
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "te");
        assert_eq!(parts[2].len(), 6);
        assert_ne!(new_id("te"), new_id("te"));
    }
}
