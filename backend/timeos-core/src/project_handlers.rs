// src/project_handlers.rs
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::info;

use crate::calendar::{iso_week, now_millis, parse_date, today};
use crate::costs::ProjectCostView;
use crate::data_service::{CascadeSummary, TaskTimeEntryFilter, TaskTimeEntryUpdate};
use crate::error::{ApiResponse, AppError};
use crate::handlers::{
    non_empty, project_cost_views, project_names, require_body_id, user_names, ApiResult,
    IdQuery,
};
use crate::models::{new_id, Priority, ProjectDoc, TaskDoc, TaskStatus, TaskTimeEntryDoc};
use crate::permissions::Permission;
use crate::routes::AppState;
use crate::session::Session;
use crate::task_tree::{apply_actual_hours, build_task_tree, find_subtree, NameLookup, TaskNode};

fn default_true() -> bool {
    true
}

// --- Projects ---

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectQuery {
    pub with_costs: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ProjectList {
    Plain(Vec<ProjectDoc>),
    WithCosts(Vec<ProjectCostView>),
}

pub async fn list_projects(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    query: Result<Query<ProjectQuery>, QueryRejection>,
) -> ApiResult<ProjectList> {
    session.require(Permission::ProjectsRead)?;
    let Query(query) = query?;

    if query.with_costs.unwrap_or(false) {
        session.require(Permission::ReportsCosts)?;
        let views = project_cost_views(&state).await?;
        return Ok(ApiResponse::ok(ProjectList::WithCosts(views)));
    }
    let projects = state.data.get_projects().await?;
    Ok(ApiResponse::ok(ProjectList::Plain(projects)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    pub name: String,
    pub code: String,
    pub client: Option<String>,
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub billable: bool,
    pub status: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub budget: Option<f64>,
    pub budget_hours: Option<f64>,
    pub hourly_rate: Option<f64>,
    pub currency: Option<String>,
}

pub async fn create_project(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    payload: Result<Json<CreateProjectRequest>, JsonRejection>,
) -> ApiResult<ProjectDoc> {
    session.require(Permission::ProjectsCreate)?;
    let Json(request) = payload?;
    if request.name.trim().is_empty() || request.code.trim().is_empty() {
        return Err(AppError::BadRequest(
            "name and code are required".to_string(),
        ));
    }

    let start_date = non_empty(request.start_date);
    let end_date = non_empty(request.end_date);
    let project = ProjectDoc {
        id: new_id("proj"),
        name: request.name.trim().to_string(),
        code: request.code.trim().to_string(),
        client: non_empty(request.client),
        description: non_empty(request.description),
        billable: request.billable,
        status: non_empty(request.status).unwrap_or_else(|| "active".to_string()),
        // The baseline snapshots the plan as it was first agreed.
        baseline_start: start_date.clone(),
        baseline_end: end_date.clone(),
        baseline_budget: request.budget,
        start_date,
        end_date,
        budget: request.budget,
        budget_hours: request.budget_hours,
        actual_cost: None,
        actual_hours: None,
        hourly_rate: request.hourly_rate,
        currency: Some(non_empty(request.currency).unwrap_or_else(|| "USD".to_string())),
        profit: None,
        profit_margin: None,
        progress: None,
        created_at: now_millis(),
        updated_at: None,
    };
    let project = state.data.create_project(project).await?;
    Ok(ApiResponse::ok(project))
}

pub async fn update_project(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> ApiResult<ProjectDoc> {
    session.require(Permission::ProjectsUpdate)?;
    let Json(body) = payload?;
    let id = require_body_id(&body)?;
    let project = state
        .data
        .update_project(&id, body)
        .await?
        .ok_or(AppError::NotFound("Project"))?;
    Ok(ApiResponse::ok(project))
}

// --- Tasks ---

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskQuery {
    pub id: Option<String>,
    pub project_id: Option<String>,
    pub assignee_id: Option<String>,
    /// `null` selects top-level tasks.
    pub parent_id: Option<String>,
    pub include_hierarchy: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum TaskList {
    One(Box<TaskNode>),
    Many(Vec<TaskNode>),
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    query: Result<Query<TaskQuery>, QueryRejection>,
) -> ApiResult<TaskList> {
    session.require(Permission::TasksRead)?;
    let Query(query) = query?;

    let all_entries = TaskTimeEntryFilter::default();
    let (mut tasks, entries, projects, users) = tokio::try_join!(
        state.data.get_tasks(),
        state.data.get_task_time_entries(&all_entries),
        state.data.get_projects(),
        state.data.get_users()
    )?;
    apply_actual_hours(&mut tasks, &entries);

    let projects = project_names(&projects);
    let users = user_names(&users);
    let lookup = NameLookup {
        projects: &projects,
        users: &users,
    };

    if let Some(id) = non_empty(query.id) {
        let subtree =
            find_subtree(build_task_tree(tasks), &id).ok_or(AppError::NotFound("Task"))?;
        return Ok(ApiResponse::ok(TaskList::One(Box::new(
            lookup.enrich_tree(subtree),
        ))));
    }

    let project_id = non_empty(query.project_id);
    let assignee_id = non_empty(query.assignee_id);
    let parent_id = non_empty(query.parent_id);
    tasks.retain(|t| {
        project_id.as_ref().map_or(true, |p| t.project_id == *p)
            && assignee_id
                .as_ref()
                .map_or(true, |a| t.assignee_id.as_deref() == Some(a.as_str()))
    });

    let unfiltered = project_id.is_none() && assignee_id.is_none() && parent_id.is_none();
    if query.include_hierarchy.unwrap_or(false) || unfiltered {
        let tree = build_task_tree(tasks);
        let selected = match parent_id.as_deref() {
            None => tree,
            Some("null") => tree
                .into_iter()
                .filter(|node| node.task.parent_id.is_none())
                .collect(),
            Some(parent) => find_subtree(tree, parent)
                .map(|node| node.children)
                .unwrap_or_default(),
        };
        let nodes = selected
            .into_iter()
            .map(|node| lookup.enrich_tree(node))
            .collect();
        return Ok(ApiResponse::ok(TaskList::Many(nodes)));
    }

    let mut child_counts: HashMap<String, usize> = HashMap::new();
    for task in &tasks {
        if let Some(parent) = &task.parent_id {
            *child_counts.entry(parent.clone()).or_default() += 1;
        }
    }
    let nodes = tasks
        .into_iter()
        .filter(|t| match parent_id.as_deref() {
            None => true,
            Some("null") => t.parent_id.is_none(),
            Some(parent) => t.parent_id.as_deref() == Some(parent),
        })
        .map(|task| {
            let count = child_counts.get(&task.id).copied().unwrap_or(0);
            let mut node = lookup.node(task, Vec::new());
            node.has_subtasks = count > 0;
            node.subtask_count = count;
            node
        })
        .collect();
    Ok(ApiResponse::ok(TaskList::Many(nodes)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub project_id: String,
    pub parent_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub assignee_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub estimated_hours: Option<f64>,
    pub progress: Option<f64>,
    pub priority: Option<Priority>,
    pub status: Option<TaskStatus>,
    pub dependencies: Option<Vec<String>>,
    pub is_epic: Option<bool>,
    pub is_milestone: Option<bool>,
}

pub async fn create_task(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> ApiResult<TaskDoc> {
    session.require(Permission::TasksCreate)?;
    let Json(request) = payload?;
    if request.name.trim().is_empty() || request.project_id.trim().is_empty() {
        return Err(AppError::BadRequest(
            "projectId and name are required".to_string(),
        ));
    }

    let now = now_millis();
    let start_date = non_empty(request.start_date).unwrap_or_else(today);
    let end_date = non_empty(request.end_date).unwrap_or_else(|| start_date.clone());
    let task = TaskDoc {
        id: new_id("task"),
        project_id: request.project_id,
        parent_id: non_empty(request.parent_id),
        name: request.name.trim().to_string(),
        description: non_empty(request.description),
        assignee_id: non_empty(request.assignee_id),
        start_date,
        end_date,
        estimated_hours: request.estimated_hours.unwrap_or(0.0),
        actual_hours: 0.0,
        progress: request.progress.unwrap_or(0.0),
        priority: request.priority.unwrap_or_default(),
        status: request.status.unwrap_or_default(),
        dependencies: request.dependencies.unwrap_or_default(),
        is_epic: request.is_epic.unwrap_or(false),
        is_milestone: request.is_milestone.unwrap_or(false),
        created_at: now,
        updated_at: now,
    };
    let task = state.data.create_task(task).await?;
    Ok(ApiResponse::ok(task))
}

pub async fn update_task(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> ApiResult<TaskDoc> {
    session.require(Permission::TasksUpdate)?;
    let Json(body) = payload?;
    let id = require_body_id(&body)?;
    let mut task = state
        .data
        .update_task(&id, body)
        .await?
        .ok_or(AppError::NotFound("Task"))?;

    let entries = state
        .data
        .get_task_time_entries(&TaskTimeEntryFilter {
            task_id: Some(id),
            ..TaskTimeEntryFilter::default()
        })
        .await?;
    apply_actual_hours(std::slice::from_mut(&mut task), &entries);
    Ok(ApiResponse::ok(task))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    query: Result<Query<IdQuery>, QueryRejection>,
) -> ApiResult<CascadeSummary> {
    session.require(Permission::TasksDelete)?;
    let Query(query) = query?;
    let id = query.require()?;
    let summary = state.data.delete_task(&id).await?;
    Ok(ApiResponse::ok(summary))
}

// --- Task time entries ---

pub async fn list_task_time_entries(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    query: Result<Query<TaskTimeEntryFilter>, QueryRejection>,
) -> ApiResult<Vec<TaskTimeEntryDoc>> {
    session.require(Permission::TimesheetsRead)?;
    let Query(filter) = query?;
    let entries = state.data.get_task_time_entries(&filter).await?;
    Ok(ApiResponse::ok(entries))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskTimeEntryRequest {
    pub task_id: String,
    pub user_id: Option<String>,
    pub project_id: Option<String>,
    pub hours: f64,
    pub date: Option<String>,
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub billable: bool,
}

pub async fn create_task_time_entry(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    payload: Result<Json<CreateTaskTimeEntryRequest>, JsonRejection>,
) -> ApiResult<TaskTimeEntryDoc> {
    session.require(Permission::TimesheetsCreate)?;
    let Json(request) = payload?;

    let date = non_empty(request.date).unwrap_or_else(today);
    let day = parse_date(&date)
        .ok_or_else(|| AppError::BadRequest(format!("Invalid date '{}'", date)))?;
    let (week_number, year) = iso_week(day);

    let project_id = match non_empty(request.project_id) {
        Some(project_id) => project_id,
        None => {
            state
                .data
                .get_task(&request.task_id)
                .await?
                .ok_or(AppError::NotFound("Task"))?
                .project_id
        }
    };

    let entry = TaskTimeEntryDoc {
        id: new_id("tte"),
        task_id: request.task_id,
        user_id: non_empty(request.user_id).unwrap_or_else(|| session.user.id.clone()),
        project_id,
        hours: request.hours,
        date,
        description: non_empty(request.description),
        billable: request.billable,
        week_number,
        year,
        created_at: now_millis(),
    };
    let entry = state.data.create_task_time_entry(entry).await?;
    Ok(ApiResponse::ok(entry))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskTimeEntryRequest {
    pub id: Option<String>,
    pub hours: Option<f64>,
    pub description: Option<String>,
    pub billable: Option<bool>,
}

pub async fn update_task_time_entry(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    payload: Result<Json<UpdateTaskTimeEntryRequest>, JsonRejection>,
) -> ApiResult<TaskTimeEntryDoc> {
    session.require(Permission::TimesheetsUpdate)?;
    let Json(request) = payload?;
    let id = IdQuery { id: request.id }.require()?;
    let update = TaskTimeEntryUpdate {
        hours: request.hours,
        description: request.description,
        billable: request.billable,
    };
    let entry = state
        .data
        .update_task_time_entry(&id, update)
        .await?
        .ok_or(AppError::NotFound("Task time entry"))?;
    Ok(ApiResponse::ok(entry))
}

pub async fn delete_task_time_entry(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    query: Result<Query<IdQuery>, QueryRejection>,
) -> ApiResult<()> {
    session.require(Permission::TimesheetsDelete)?;
    let Query(query) = query?;
    let id = query.require()?;
    state.data.delete_task_time_entry(&id).await?;
    info!("Deleted task time entry {}", id);
    Ok(ApiResponse::empty())
}
