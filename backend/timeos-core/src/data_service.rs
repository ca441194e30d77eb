// src/data_service.rs
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::approval::{ApprovalStatus, TransitionError};
use crate::calendar::now_millis;
use crate::error::AppError;
use crate::hours_report;
use crate::luma_client::{
    Collection, DocumentStore, StoreError, StoredDoc, CLEAR_LIMIT, FIND_LIMIT,
};
use crate::models::{
    AllocationDoc, ApprovalDoc, DayHours, ProjectDoc, ResourceDoc, TaskDoc, TaskTimeEntryDoc,
    TimeEntryDoc, TimeEntryStatus, UserDoc,
};

/// Baselines are snapshotted when a project is created.
const PROJECT_PROTECTED_FIELDS: &[&str] = &["baselineStart", "baselineEnd", "baselineBudget"];
/// Derived from task entries on every read.
const TASK_PROTECTED_FIELDS: &[&str] = &["actualHours"];

fn field_matches<T: PartialEq + ?Sized>(wanted: Option<&T>, actual: &T) -> bool {
    wanted.map_or(true, |w| w == actual)
}

fn by_name(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

/// Approved entries only change through their approval.
fn ensure_unlocked(entry: &TimeEntryDoc) -> Result<(), AppError> {
    if entry.status == TimeEntryStatus::Approved {
        return Err(AppError::Conflict(format!(
            "Time entry {} belongs to an approved week",
            entry.id
        )));
    }
    Ok(())
}

// --- Filters ---

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntryFilter {
    pub user_id: Option<String>,
    pub project_id: Option<String>,
    pub week_number: Option<u32>,
    pub year: Option<i32>,
    pub status: Option<TimeEntryStatus>,
}

impl TimeEntryFilter {
    pub fn for_week(user_id: &str, week_number: u32, year: i32) -> Self {
        Self {
            user_id: Some(user_id.to_string()),
            week_number: Some(week_number),
            year: Some(year),
            ..Self::default()
        }
    }

    pub fn matches(&self, entry: &TimeEntryDoc) -> bool {
        field_matches(self.user_id.as_deref(), entry.user_id.as_str())
            && field_matches(self.project_id.as_deref(), entry.project_id.as_str())
            && field_matches(self.week_number.as_ref(), &entry.week_number)
            && field_matches(self.year.as_ref(), &entry.year)
            && field_matches(self.status.as_ref(), &entry.status)
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskTimeEntryFilter {
    pub task_id: Option<String>,
    pub user_id: Option<String>,
    pub project_id: Option<String>,
    pub week_number: Option<u32>,
    pub year: Option<i32>,
}

impl TaskTimeEntryFilter {
    pub fn matches(&self, entry: &TaskTimeEntryDoc) -> bool {
        field_matches(self.task_id.as_deref(), entry.task_id.as_str())
            && field_matches(self.user_id.as_deref(), entry.user_id.as_str())
            && field_matches(self.project_id.as_deref(), entry.project_id.as_str())
            && field_matches(self.week_number.as_ref(), &entry.week_number)
            && field_matches(self.year.as_ref(), &entry.year)
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationFilter {
    pub resource_id: Option<String>,
    pub project_id: Option<String>,
    pub week_number: Option<u32>,
    pub year: Option<i32>,
}

impl AllocationFilter {
    pub fn matches(&self, allocation: &AllocationDoc) -> bool {
        field_matches(self.resource_id.as_deref(), allocation.resource_id.as_str())
            && field_matches(self.project_id.as_deref(), allocation.project_id.as_str())
            && field_matches(self.week_number.as_ref(), &allocation.week_number)
            && field_matches(self.year.as_ref(), &allocation.year)
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalFilter {
    pub user_id: Option<String>,
    pub status: Option<ApprovalStatus>,
    pub week_number: Option<u32>,
    pub year: Option<i32>,
}

impl ApprovalFilter {
    pub fn matches(&self, approval: &ApprovalDoc) -> bool {
        field_matches(self.user_id.as_deref(), approval.user_id.as_str())
            && field_matches(self.status.as_ref(), &approval.status)
            && field_matches(self.week_number.as_ref(), &approval.week_number)
            && field_matches(self.year.as_ref(), &approval.year)
    }
}

// --- Partial updates ---

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntryUpdate {
    pub project_id: Option<String>,
    pub activity: Option<String>,
    pub notes: Option<String>,
    pub billable: Option<bool>,
    pub hours: Option<DayHours>,
    pub status: Option<TimeEntryStatus>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskTimeEntryUpdate {
    pub hours: Option<f64>,
    pub description: Option<String>,
    pub billable: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct ReviewDecision {
    pub status: ApprovalStatus,
    pub approver_id: String,
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CascadeSummary {
    pub tasks_deleted: usize,
    pub entries_deleted: usize,
}

#[derive(Clone)]
pub struct DataService {
    store: Arc<dyn DocumentStore>,
}

impl DataService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    // --- Generic document access ---

    fn decode<T: DeserializeOwned>(
        collection: Collection,
        stored: StoredDoc<Value>,
    ) -> Result<T, serde_json::Error> {
        let mut doc = stored.doc;
        if let Value::Object(fields) = &mut doc {
            fields
                .entry("id")
                .or_insert_with(|| Value::String(stored.id.clone()));
        }
        serde_json::from_value(doc).map_err(|e| {
            debug!("Decoding {}/{} failed: {}", collection, stored.id, e);
            e
        })
    }

    async fn find_all<T: DeserializeOwned>(
        &self,
        collection: Collection,
    ) -> Result<Vec<T>, AppError> {
        let docs = self
            .store
            .find_docs(collection, None, Some(FIND_LIMIT))
            .await
            .map_err(|e| {
                error!("Failed to list '{}': {}", collection, e);
                AppError::from(e)
            })?;

        let mut items = Vec::with_capacity(docs.len());
        for stored in docs {
            let id = stored.id.clone();
            match Self::decode::<T>(collection, stored) {
                Ok(item) => items.push(item),
                Err(e) => warn!("Skipping malformed document {}/{}: {}", collection, id, e),
            }
        }
        Ok(items)
    }

    async fn get_one<T: DeserializeOwned>(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<T>, AppError> {
        let stored = self.store.get_doc(collection, id).await.map_err(|e| {
            error!("Failed to fetch {}/{}: {}", collection, id, e);
            AppError::from(e)
        })?;
        match stored {
            None => Ok(None),
            Some(stored) => Self::decode(collection, stored)
                .map(Some)
                .map_err(|e| AppError::MalformedDocument(format!("{}/{}: {}", collection, id, e))),
        }
    }

    pub async fn put<T: Serialize>(
        &self,
        collection: Collection,
        id: &str,
        doc: &T,
    ) -> Result<(), AppError> {
        let value = serde_json::to_value(doc).map_err(StoreError::from)?;
        self.store
            .put_doc(collection, id, value)
            .await
            .map_err(|e| {
                error!("Failed to write {}/{}: {}", collection, id, e);
                AppError::from(e)
            })?;
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), AppError> {
        self.store.delete_doc(collection, id).await.map_err(|e| {
            error!("Failed to delete {}/{}: {}", collection, id, e);
            AppError::from(e)
        })
    }

    /// Shallow-merges `patch` over the stored document and writes it back.
    /// `id`, `createdAt` and the `protected` keys are never overwritten;
    /// `updatedAt` is stamped.
    async fn merge_update<T: Serialize + DeserializeOwned>(
        &self,
        collection: Collection,
        id: &str,
        patch: Map<String, Value>,
        protected: &[&str],
    ) -> Result<Option<T>, AppError> {
        let Some(stored) = self.store.get_doc(collection, id).await? else {
            return Ok(None);
        };
        let mut fields = match stored.doc {
            Value::Object(fields) => fields,
            _ => {
                return Err(AppError::MalformedDocument(format!(
                    "{}/{} is not an object",
                    collection, id
                )))
            }
        };
        for (key, value) in patch {
            if key == "id" || key == "createdAt" || protected.contains(&key.as_str()) {
                debug!("Ignoring protected field {} on {}/{}", key, collection, id);
                continue;
            }
            fields.insert(key, value);
        }
        fields.insert("id".to_string(), Value::String(id.to_string()));
        fields.insert("updatedAt".to_string(), Value::from(now_millis()));

        let updated: T = serde_json::from_value(Value::Object(fields))
            .map_err(|e| AppError::BadRequest(format!("Invalid update: {}", e)))?;
        self.put(collection, id, &updated).await?;
        Ok(Some(updated))
    }

    // --- Users ---

    pub async fn get_users(&self) -> Result<Vec<UserDoc>, AppError> {
        info!("Fetching all users...");
        let mut users: Vec<UserDoc> = self.find_all(Collection::Users).await?;
        users.sort_by(|a, b| by_name(&a.name, &b.name));
        Ok(users)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<UserDoc>, AppError> {
        let wanted = email.trim().to_lowercase();
        Ok(self
            .get_users()
            .await?
            .into_iter()
            .find(|u| u.email.to_lowercase() == wanted))
    }

    /// Returns the user only when the account is active and the password matches.
    pub async fn authenticate_user(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<UserDoc>, AppError> {
        let Some(user) = self.get_user_by_email(email).await? else {
            debug!("Login attempt for unknown email");
            return Ok(None);
        };
        if !user.is_active {
            info!("Login rejected for inactive user {}", user.id);
            return Ok(None);
        }
        match user.password.as_deref() {
            Some(stored) if stored == password => Ok(Some(user)),
            _ => Ok(None),
        }
    }

    pub async fn create_user(&self, user: UserDoc) -> Result<UserDoc, AppError> {
        if self.get_user_by_email(&user.email).await?.is_some() {
            return Err(AppError::BadRequest(format!(
                "A user with email '{}' already exists",
                user.email
            )));
        }
        self.put(Collection::Users, &user.id, &user).await?;
        info!("Created user {}", user.id);
        Ok(user)
    }

    // --- Projects ---

    pub async fn get_projects(&self) -> Result<Vec<ProjectDoc>, AppError> {
        info!("Fetching all projects...");
        let mut projects: Vec<ProjectDoc> = self.find_all(Collection::Projects).await?;
        projects.sort_by(|a, b| by_name(&a.name, &b.name));
        Ok(projects)
    }

    pub async fn get_project(&self, id: &str) -> Result<Option<ProjectDoc>, AppError> {
        self.get_one(Collection::Projects, id).await
    }

    pub async fn create_project(&self, project: ProjectDoc) -> Result<ProjectDoc, AppError> {
        self.put(Collection::Projects, &project.id, &project).await?;
        info!("Created project {} ({})", project.id, project.code);
        Ok(project)
    }

    pub async fn update_project(
        &self,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<Option<ProjectDoc>, AppError> {
        self.merge_update(Collection::Projects, id, patch, PROJECT_PROTECTED_FIELDS)
            .await
    }

    // --- Tasks ---

    pub async fn get_tasks(&self) -> Result<Vec<TaskDoc>, AppError> {
        info!("Fetching all tasks...");
        let mut tasks: Vec<TaskDoc> = self.find_all(Collection::Tasks).await?;
        tasks.sort_by(|a, b| a.start_date.cmp(&b.start_date));
        Ok(tasks)
    }

    pub async fn get_task(&self, id: &str) -> Result<Option<TaskDoc>, AppError> {
        self.get_one(Collection::Tasks, id).await
    }

    pub async fn create_task(&self, task: TaskDoc) -> Result<TaskDoc, AppError> {
        self.put(Collection::Tasks, &task.id, &task).await?;
        info!("Created task {} in project {}", task.id, task.project_id);
        Ok(task)
    }

    pub async fn update_task(
        &self,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<Option<TaskDoc>, AppError> {
        self.merge_update(Collection::Tasks, id, patch, TASK_PROTECTED_FIELDS)
            .await
    }

    /// Deletes a task with all of its descendants and their task entries.
    /// Children go before parents and entries before their task.
    pub async fn delete_task(&self, id: &str) -> Result<CascadeSummary, AppError> {
        let all_entries = TaskTimeEntryFilter::default();
        let (tasks, entries) = tokio::try_join!(
            self.get_tasks(),
            self.get_task_time_entries(&all_entries)
        )?;

        let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
        for task in &tasks {
            if let Some(parent) = task.parent_id.as_deref() {
                children.entry(parent).or_default().push(task.id.as_str());
            }
        }

        // Pre-order walk, reversed below so the deepest tasks are removed first.
        let mut order: Vec<&str> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            order.push(current);
            if let Some(kids) = children.get(current) {
                stack.extend(kids.iter().copied());
            }
        }
        order.reverse();

        let mut summary = CascadeSummary::default();
        for task_id in order {
            for entry in entries.iter().filter(|e| e.task_id == task_id) {
                self.delete(Collection::TaskTimeEntries, &entry.id).await?;
                summary.entries_deleted += 1;
            }
            self.delete(Collection::Tasks, task_id).await?;
            summary.tasks_deleted += 1;
        }
        info!(
            "Deleted task {} ({} tasks, {} task entries)",
            id, summary.tasks_deleted, summary.entries_deleted
        );
        Ok(summary)
    }

    // --- Task time entries ---

    pub async fn get_task_time_entries(
        &self,
        filter: &TaskTimeEntryFilter,
    ) -> Result<Vec<TaskTimeEntryDoc>, AppError> {
        debug!("Fetching task time entries with {:?}", filter);
        let mut entries: Vec<TaskTimeEntryDoc> = self
            .find_all::<TaskTimeEntryDoc>(Collection::TaskTimeEntries)
            .await?
            .into_iter()
            .filter(|e| filter.matches(e))
            .collect();
        entries.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(entries)
    }

    pub async fn create_task_time_entry(
        &self,
        entry: TaskTimeEntryDoc,
    ) -> Result<TaskTimeEntryDoc, AppError> {
        self.put(Collection::TaskTimeEntries, &entry.id, &entry).await?;
        info!(
            "Logged {}h on task {} for user {}",
            entry.hours, entry.task_id, entry.user_id
        );
        Ok(entry)
    }

    pub async fn update_task_time_entry(
        &self,
        id: &str,
        update: TaskTimeEntryUpdate,
    ) -> Result<Option<TaskTimeEntryDoc>, AppError> {
        let Some(mut entry) = self
            .get_one::<TaskTimeEntryDoc>(Collection::TaskTimeEntries, id)
            .await?
        else {
            return Ok(None);
        };
        if let Some(hours) = update.hours {
            entry.hours = hours;
        }
        if let Some(description) = update.description {
            entry.description = Some(description);
        }
        if let Some(billable) = update.billable {
            entry.billable = billable;
        }
        self.put(Collection::TaskTimeEntries, id, &entry).await?;
        Ok(Some(entry))
    }

    pub async fn delete_task_time_entry(&self, id: &str) -> Result<(), AppError> {
        self.delete(Collection::TaskTimeEntries, id).await
    }

    // --- Weekly timesheets ---

    pub async fn get_time_entries(
        &self,
        filter: &TimeEntryFilter,
    ) -> Result<Vec<TimeEntryDoc>, AppError> {
        debug!("Fetching time entries with {:?}", filter);
        let mut entries: Vec<TimeEntryDoc> = self
            .find_all::<TimeEntryDoc>(Collection::TimeEntries)
            .await?
            .into_iter()
            .filter(|e| filter.matches(e))
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    pub async fn get_time_entry(&self, id: &str) -> Result<Option<TimeEntryDoc>, AppError> {
        self.get_one(Collection::TimeEntries, id).await
    }

    pub async fn create_time_entry(
        &self,
        mut entry: TimeEntryDoc,
    ) -> Result<TimeEntryDoc, AppError> {
        entry.recompute_total();
        self.put(Collection::TimeEntries, &entry.id, &entry).await?;
        info!(
            "Created time entry {} for user {} (week {}/{})",
            entry.id, entry.user_id, entry.week_number, entry.year
        );
        Ok(entry)
    }

    pub async fn update_time_entry(
        &self,
        id: &str,
        update: TimeEntryUpdate,
    ) -> Result<Option<TimeEntryDoc>, AppError> {
        let Some(mut entry) = self.get_time_entry(id).await? else {
            return Ok(None);
        };
        ensure_unlocked(&entry)?;
        if let Some(project_id) = update.project_id {
            entry.project_id = project_id;
        }
        if let Some(activity) = update.activity {
            entry.activity = activity;
        }
        if let Some(notes) = update.notes {
            entry.notes = Some(notes);
        }
        if let Some(billable) = update.billable {
            entry.billable = billable;
        }
        if let Some(hours) = update.hours {
            entry.hours = hours;
        }
        if let Some(status) = update.status {
            entry.status = status;
        }
        entry.recompute_total();
        entry.updated_at = now_millis();
        self.put(Collection::TimeEntries, id, &entry).await?;
        Ok(Some(entry))
    }

    pub async fn delete_time_entry(&self, id: &str) -> Result<(), AppError> {
        if let Some(entry) = self.get_time_entry(id).await? {
            ensure_unlocked(&entry)?;
        }
        self.delete(Collection::TimeEntries, id).await
    }

    /// Overwrites the status of every entry in a user's week. Returns how many changed.
    pub async fn set_week_status(
        &self,
        user_id: &str,
        week_number: u32,
        year: i32,
        status: TimeEntryStatus,
    ) -> Result<usize, AppError> {
        let entries = self
            .get_time_entries(&TimeEntryFilter::for_week(user_id, week_number, year))
            .await?;
        let now = now_millis();
        let mut changed = 0;
        for mut entry in entries {
            entry.status = status;
            entry.updated_at = now;
            self.put(Collection::TimeEntries, &entry.id, &entry)
                .await?;
            changed += 1;
        }
        info!(
            "Marked {} entries of user {} week {}/{} as {:?}",
            changed, user_id, week_number, year, status
        );
        Ok(changed)
    }

    // --- Approvals ---

    pub async fn get_approvals(
        &self,
        filter: &ApprovalFilter,
    ) -> Result<Vec<ApprovalDoc>, AppError> {
        let mut approvals: Vec<ApprovalDoc> = self
            .find_all::<ApprovalDoc>(Collection::Approvals)
            .await?
            .into_iter()
            .filter(|a| filter.matches(a))
            .collect();
        approvals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(approvals)
    }

    /// Opens a pending approval for a week and moves its entries to `pending`.
    /// Without an explicit total the week's entries are summed. A week that
    /// already has a pending or approved approval is a 409.
    pub async fn submit_week(
        &self,
        user_id: &str,
        week_number: u32,
        year: i32,
        total_hours: Option<f64>,
    ) -> Result<ApprovalDoc, AppError> {
        let open = ApprovalFilter {
            user_id: Some(user_id.to_string()),
            week_number: Some(week_number),
            year: Some(year),
            ..ApprovalFilter::default()
        };
        // Only a rejected week may be submitted again.
        if let Some(existing) = self
            .get_approvals(&open)
            .await?
            .into_iter()
            .find(|a| a.status != ApprovalStatus::Rejected)
        {
            return Err(TransitionError {
                from: existing.status,
                to: ApprovalStatus::Pending,
            }
            .into());
        }

        let total_hours = match total_hours {
            Some(total) => total,
            None => {
                let entries = self
                    .get_time_entries(&TimeEntryFilter::for_week(user_id, week_number, year))
                    .await?;
                hours_report::total_hours(entries.iter())
            }
        };

        let now = now_millis();
        let approval = ApprovalDoc {
            id: crate::models::new_id("appr"),
            user_id: user_id.to_string(),
            approver_id: None,
            week_number,
            year,
            total_hours,
            status: ApprovalStatus::Pending,
            comments: None,
            submitted_at: Some(now),
            reviewed_at: None,
            created_at: now,
        };
        self.put(Collection::Approvals, &approval.id, &approval)
            .await?;
        self.set_week_status(user_id, week_number, year, TimeEntryStatus::Pending)
            .await?;
        info!(
            "User {} submitted week {}/{} ({}h)",
            user_id, week_number, year, total_hours
        );
        Ok(approval)
    }

    /// Applies a review decision. `Ok(None)` when the approval does not exist.
    pub async fn review_approval(
        &self,
        id: &str,
        decision: ReviewDecision,
    ) -> Result<Option<ApprovalDoc>, AppError> {
        let Some(mut approval) = self
            .get_one::<ApprovalDoc>(Collection::Approvals, id)
            .await?
        else {
            return Ok(None);
        };

        approval.status = approval.status.transition_to(decision.status)?;
        approval.approver_id = Some(decision.approver_id);
        if decision.comments.is_some() {
            approval.comments = decision.comments;
        }
        approval.reviewed_at = Some(now_millis());
        self.put(Collection::Approvals, id, &approval).await?;

        self.set_week_status(
            &approval.user_id,
            approval.week_number,
            approval.year,
            approval.status.into(),
        )
        .await?;
        info!("Approval {} is now {}", id, approval.status);
        Ok(Some(approval))
    }

    // --- Resources ---

    pub async fn get_resources(&self) -> Result<Vec<ResourceDoc>, AppError> {
        info!("Fetching all resources...");
        self.find_all(Collection::Resources).await
    }

    pub async fn create_resource(&self, resource: ResourceDoc) -> Result<ResourceDoc, AppError> {
        self.put(Collection::Resources, &resource.id, &resource)
            .await?;
        info!("Created resource {} for user {}", resource.id, resource.user_id);
        Ok(resource)
    }

    pub async fn update_resource(
        &self,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<Option<ResourceDoc>, AppError> {
        self.merge_update(Collection::Resources, id, patch, &[]).await
    }

    // --- Allocations ---

    pub async fn get_allocations(
        &self,
        filter: &AllocationFilter,
    ) -> Result<Vec<AllocationDoc>, AppError> {
        let mut allocations: Vec<AllocationDoc> = self
            .find_all::<AllocationDoc>(Collection::Allocations)
            .await?
            .into_iter()
            .filter(|a| filter.matches(a))
            .collect();
        allocations.sort_by(|a, b| {
            b.year
                .cmp(&a.year)
                .then_with(|| b.week_number.cmp(&a.week_number))
        });
        Ok(allocations)
    }

    pub async fn create_allocation(
        &self,
        allocation: AllocationDoc,
    ) -> Result<AllocationDoc, AppError> {
        self.put(Collection::Allocations, &allocation.id, &allocation)
            .await?;
        Ok(allocation)
    }

    pub async fn update_allocation_hours(
        &self,
        id: &str,
        allocated_hours: f64,
    ) -> Result<Option<AllocationDoc>, AppError> {
        let Some(mut allocation) = self
            .get_one::<AllocationDoc>(Collection::Allocations, id)
            .await?
        else {
            return Ok(None);
        };
        allocation.allocated_hours = allocated_hours;
        self.put(Collection::Allocations, id, &allocation).await?;
        Ok(Some(allocation))
    }

    pub async fn delete_allocation(&self, id: &str) -> Result<(), AppError> {
        self.delete(Collection::Allocations, id).await
    }

    // --- Maintenance ---

    /// Probes every collection with a single-document find.
    pub async fn health_check(&self) -> Result<Vec<&'static str>, AppError> {
        let mut checked = Vec::with_capacity(Collection::ALL.len());
        for collection in Collection::ALL {
            self.store
                .find_docs(collection, None, Some(1))
                .await
                .map_err(|e| {
                    error!("Health check failed on '{}': {}", collection, e);
                    AppError::from(e)
                })?;
            checked.push(collection.as_str());
        }
        Ok(checked)
    }

    /// Removes every document from every collection. Returns the number deleted.
    pub async fn clear_all_data(&self) -> Result<usize, AppError> {
        let mut deleted = 0;
        for collection in Collection::ALL {
            let docs = self
                .store
                .find_docs(collection, None, Some(CLEAR_LIMIT))
                .await?;
            for stored in &docs {
                self.delete(collection, &stored.id).await?;
            }
            info!("Cleared {} documents from '{}'", docs.len(), collection);
            deleted += docs.len();
        }
        Ok(deleted)
    }
}
