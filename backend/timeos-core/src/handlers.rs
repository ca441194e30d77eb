// src/handlers.rs
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::info;

use crate::calendar::{current_iso_week, now_millis};
use crate::costs::{project_cost_view, summarize_costs, CostSummary, ProjectCostView, RateCard};
use crate::data_service::{TaskTimeEntryFilter, TimeEntryFilter};
use crate::error::{ApiResponse, AppError};
use crate::hours_report::{build_employee_hours_report, EmployeeHoursReport};
use crate::models::{new_id, ProjectDoc, Role, UserDoc, UserView};
use crate::permissions::{permissions_for, Permission};
use crate::routes::AppState;
use crate::seed::{self, SeedCounts};
use crate::session::{open_session, Session, SessionUser};

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

// --- Shared request helpers ---

#[derive(Debug, Default, Deserialize)]
pub struct IdQuery {
    pub id: Option<String>,
}

impl IdQuery {
    pub fn require(self) -> Result<String, AppError> {
        non_empty(self.id).ok_or_else(|| AppError::BadRequest("id is required".to_string()))
    }
}

pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Reads the mandatory `id` out of a partial-update body.
pub fn require_body_id(body: &Map<String, Value>) -> Result<String, AppError> {
    body.get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::BadRequest("id is required".to_string()))
}

pub fn project_names(projects: &[ProjectDoc]) -> HashMap<String, String> {
    projects
        .iter()
        .map(|p| (p.id.clone(), p.name.clone()))
        .collect()
}

pub fn user_names(users: &[UserDoc]) -> HashMap<String, String> {
    users.iter().map(|u| (u.id.clone(), u.name.clone())).collect()
}

// --- Health ---

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub store: &'static str,
    pub collections: Vec<&'static str>,
    pub timestamp: String,
}

pub async fn health(State(state): State<AppState>) -> ApiResult<HealthStatus> {
    let collections = state.data.health_check().await?;
    Ok(ApiResponse::ok(HealthStatus {
        status: "ok",
        store: "connected",
        collections,
        timestamp: Utc::now().to_rfc3339(),
    }))
}

// --- Auth ---

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: SessionUser,
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<LoginResponse> {
    let Json(request) = payload?;
    let (Some(email), Some(password)) = (non_empty(request.email), non_empty(request.password))
    else {
        return Err(AppError::BadRequest(
            "Email and password are required".to_string(),
        ));
    };

    let user = state
        .data
        .authenticate_user(&email, &password)
        .await?
        .ok_or(AppError::InvalidCredentials)?;
    let session = open_session(state.sessions.as_ref(), &user).await;
    Ok(ApiResponse::ok(LoginResponse {
        token: session.token,
        user: session.user,
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<()> {
    state.sessions.clear(&session.token).await;
    info!("Closed session for user {}", session.user.id);
    Ok(ApiResponse::empty())
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: SessionUser,
    pub permissions: Vec<Permission>,
}

pub async fn me(Extension(session): Extension<Session>) -> ApiResult<MeResponse> {
    Ok(ApiResponse::ok(MeResponse {
        permissions: permissions_for(session.user.role),
        user: session.user,
    }))
}

// --- Users ---

pub async fn list_users(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Vec<UserView>> {
    session.require(Permission::UsersRead)?;
    let users = state.data.get_users().await?;
    Ok(ApiResponse::ok(users.iter().map(UserView::from).collect()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub role: Option<Role>,
    pub password: Option<String>,
    pub avatar: Option<String>,
    pub is_active: Option<bool>,
}

pub async fn create_user(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult<UserView> {
    session.require(Permission::UsersCreate)?;
    let Json(request) = payload?;
    if request.name.trim().is_empty() || request.email.trim().is_empty() {
        return Err(AppError::BadRequest(
            "name and email are required".to_string(),
        ));
    }

    let user = UserDoc {
        id: new_id("user"),
        name: request.name.trim().to_string(),
        email: request.email.trim().to_string(),
        role: request.role.unwrap_or_default(),
        avatar: non_empty(request.avatar),
        password: non_empty(request.password),
        is_active: request.is_active.unwrap_or(true),
        created_at: now_millis(),
        updated_at: None,
    };
    let user = state.data.create_user(user).await?;
    Ok(ApiResponse::ok(UserView::from(&user)))
}

// --- Reports ---

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeHoursQuery {
    pub week_number: Option<u32>,
    pub year: Option<i32>,
    pub user_id: Option<String>,
}

pub async fn employee_hours_report(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    query: Result<Query<EmployeeHoursQuery>, QueryRejection>,
) -> ApiResult<EmployeeHoursReport> {
    session.require(Permission::ReportsRead)?;
    let Query(query) = query?;
    let (current_week, current_year) = current_iso_week();
    let week_number = query.week_number.unwrap_or(current_week);
    let year = query.year.unwrap_or(current_year);

    let filter = TimeEntryFilter {
        week_number: Some(week_number),
        year: Some(year),
        ..TimeEntryFilter::default()
    };
    let (users, entries) = tokio::try_join!(
        state.data.get_users(),
        state.data.get_time_entries(&filter)
    )?;

    let report = build_employee_hours_report(
        &users,
        &entries,
        week_number,
        year,
        non_empty(query.user_id).as_deref(),
    );
    info!(
        "Built hours report for week {}/{} ({} employees)",
        week_number, year, report.summary.total_employees
    );
    Ok(ApiResponse::ok(report))
}

#[derive(Debug, Serialize)]
pub struct CostReport {
    pub projects: Vec<ProjectCostView>,
    pub summary: CostSummary,
}

/// Computes the cost view of every project. Shared with `/api/projects?withCosts=true`.
pub async fn project_cost_views(state: &AppState) -> Result<Vec<ProjectCostView>, AppError> {
    let all_entries = TaskTimeEntryFilter::default();
    let (projects, entries, resources) = tokio::try_join!(
        state.data.get_projects(),
        state.data.get_task_time_entries(&all_entries),
        state.data.get_resources()
    )?;
    let rates = RateCard::from_resources(&resources);
    let now = Utc::now();
    Ok(projects
        .iter()
        .map(|project| project_cost_view(project, &entries, &rates, now))
        .collect())
}

pub async fn cost_report(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<CostReport> {
    session.require(Permission::ReportsCosts)?;
    let projects = project_cost_views(&state).await?;
    let summary = summarize_costs(&projects);
    Ok(ApiResponse::ok(CostReport { projects, summary }))
}

// --- Maintenance ---

pub async fn reset(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<SeedCounts> {
    session.require(Permission::SettingsUpdate)?;
    info!("User {} requested a data reset", session.user.id);
    let counts = seed::reset_store(&state.data).await?;
    Ok(ApiResponse::ok(counts))
}
