// src/timesheet_handlers.rs
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::approval::ApprovalStatus;
use crate::calendar::{current_iso_week, now_millis};
use crate::data_service::{ApprovalFilter, ReviewDecision, TimeEntryFilter, TimeEntryUpdate};
use crate::error::{ApiResponse, AppError};
use crate::handlers::{non_empty, project_names, user_names, ApiResult, IdQuery};
use crate::models::{
    new_id, ApprovalDoc, DayHours, NameRef, TimeEntryDoc, TimeEntryStatus,
};
use crate::permissions::Permission;
use crate::routes::AppState;
use crate::session::Session;

const DEFAULT_TIMESHEET_LIMIT: usize = 100;

/// Members act on their own timesheets; approvers may act for anyone.
fn owner_for(session: &Session, requested: Option<String>) -> String {
    match non_empty(requested) {
        Some(user_id) if session.can(Permission::TimesheetsApprove) => user_id,
        _ => session.user.id.clone(),
    }
}

/// Another user's entry may only be touched by an approver.
fn require_owner(session: &Session, entry: &TimeEntryDoc) -> Result<(), AppError> {
    if entry.user_id == session.user.id {
        Ok(())
    } else {
        session.require(Permission::TimesheetsApprove)
    }
}

// --- Weekly timesheets ---

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimesheetQuery {
    pub user_id: Option<String>,
    pub project_id: Option<String>,
    pub week_number: Option<u32>,
    pub year: Option<i32>,
    pub status: Option<TimeEntryStatus>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimesheetView {
    #[serde(flatten)]
    pub entry: TimeEntryDoc,
    pub project: NameRef,
    /// Days outside the usual 0..=12 hour band.
    pub flagged_days: Vec<&'static str>,
}

pub async fn list_timesheets(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    query: Result<Query<TimesheetQuery>, QueryRejection>,
) -> ApiResult<Vec<TimesheetView>> {
    session.require(Permission::TimesheetsRead)?;
    let Query(query) = query?;

    let user_id = if session.can(Permission::TimesheetsApprove) {
        non_empty(query.user_id)
    } else {
        Some(session.user.id.clone())
    };
    let filter = TimeEntryFilter {
        user_id,
        project_id: non_empty(query.project_id),
        week_number: query.week_number,
        year: query.year,
        status: query.status,
    };

    let (entries, projects) = tokio::try_join!(
        state.data.get_time_entries(&filter),
        state.data.get_projects()
    )?;
    let names = project_names(&projects);
    let views = entries
        .into_iter()
        .take(query.limit.unwrap_or(DEFAULT_TIMESHEET_LIMIT))
        .map(|entry| TimesheetView {
            project: NameRef::resolve(&names, &entry.project_id),
            flagged_days: entry.hours.flagged_days(),
            entry,
        })
        .collect();
    Ok(ApiResponse::ok(views))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTimesheetRequest {
    pub user_id: Option<String>,
    pub project_id: String,
    pub activity: Option<String>,
    pub notes: Option<String>,
    pub billable: Option<bool>,
    pub week_number: Option<u32>,
    pub year: Option<i32>,
    #[serde(default)]
    pub hours: DayHours,
}

pub async fn create_timesheet(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    payload: Result<Json<CreateTimesheetRequest>, JsonRejection>,
) -> ApiResult<TimeEntryDoc> {
    session.require(Permission::TimesheetsCreate)?;
    let Json(request) = payload?;
    if request.project_id.trim().is_empty() {
        return Err(AppError::BadRequest("projectId is required".to_string()));
    }

    let (current_week, current_year) = current_iso_week();
    let now = now_millis();
    let entry = TimeEntryDoc {
        id: new_id("te"),
        user_id: owner_for(&session, request.user_id),
        project_id: request.project_id,
        activity: request.activity.unwrap_or_default(),
        notes: non_empty(request.notes),
        billable: request.billable.unwrap_or(true),
        week_number: request.week_number.unwrap_or(current_week),
        year: request.year.unwrap_or(current_year),
        hours: request.hours,
        total: 0.0,
        status: TimeEntryStatus::Draft,
        created_at: now,
        updated_at: now,
    };
    let entry = state.data.create_time_entry(entry).await?;
    Ok(ApiResponse::ok(entry))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTimesheetRequest {
    pub id: Option<String>,
    pub project_id: Option<String>,
    pub activity: Option<String>,
    pub notes: Option<String>,
    pub billable: Option<bool>,
    pub hours: Option<DayHours>,
    pub status: Option<TimeEntryStatus>,
}

pub async fn update_timesheet(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    payload: Result<Json<UpdateTimesheetRequest>, JsonRejection>,
) -> ApiResult<TimeEntryDoc> {
    session.require(Permission::TimesheetsUpdate)?;
    let Json(request) = payload?;
    let id = IdQuery { id: request.id }.require()?;
    if matches!(
        request.status,
        Some(TimeEntryStatus::Approved) | Some(TimeEntryStatus::Rejected)
    ) {
        session.require(Permission::TimesheetsApprove)?;
    }
    let existing = state
        .data
        .get_time_entry(&id)
        .await?
        .ok_or(AppError::NotFound("Timesheet entry"))?;
    require_owner(&session, &existing)?;

    let update = TimeEntryUpdate {
        project_id: non_empty(request.project_id),
        activity: request.activity,
        notes: request.notes,
        billable: request.billable,
        hours: request.hours,
        status: request.status,
    };
    let entry = state
        .data
        .update_time_entry(&id, update)
        .await?
        .ok_or(AppError::NotFound("Timesheet entry"))?;
    Ok(ApiResponse::ok(entry))
}

pub async fn delete_timesheet(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    query: Result<Query<IdQuery>, QueryRejection>,
) -> ApiResult<()> {
    session.require(Permission::TimesheetsDelete)?;
    let Query(query) = query?;
    let id = query.require()?;
    let existing = state
        .data
        .get_time_entry(&id)
        .await?
        .ok_or(AppError::NotFound("Timesheet entry"))?;
    require_owner(&session, &existing)?;
    state.data.delete_time_entry(&id).await?;
    info!("Deleted time entry {}", id);
    Ok(ApiResponse::empty())
}

// --- Approvals ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalView {
    #[serde(flatten)]
    pub approval: ApprovalDoc,
    pub user: NameRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approver: Option<NameRef>,
}

pub async fn list_approvals(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    query: Result<Query<ApprovalFilter>, QueryRejection>,
) -> ApiResult<Vec<ApprovalView>> {
    session.require(Permission::ApprovalsRead)?;
    let Query(filter) = query?;
    let (approvals, users) = tokio::try_join!(
        state.data.get_approvals(&filter),
        state.data.get_users()
    )?;
    let names = user_names(&users);
    let views = approvals
        .into_iter()
        .map(|approval| ApprovalView {
            user: NameRef::resolve(&names, &approval.user_id),
            approver: approval
                .approver_id
                .as_deref()
                .map(|id| NameRef::resolve(&names, id)),
            approval,
        })
        .collect();
    Ok(ApiResponse::ok(views))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitWeekRequest {
    pub user_id: Option<String>,
    pub week_number: Option<u32>,
    pub year: Option<i32>,
    pub total_hours: Option<f64>,
}

pub async fn submit_approval(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    payload: Result<Json<SubmitWeekRequest>, JsonRejection>,
) -> ApiResult<ApprovalDoc> {
    session.require(Permission::TimesheetsCreate)?;
    let Json(request) = payload?;
    let (current_week, current_year) = current_iso_week();
    let user_id = owner_for(&session, request.user_id);
    let approval = state
        .data
        .submit_week(
            &user_id,
            request.week_number.unwrap_or(current_week),
            request.year.unwrap_or(current_year),
            request.total_hours,
        )
        .await?;
    Ok(ApiResponse::ok(approval))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub id: Option<String>,
    pub status: Option<ApprovalStatus>,
    pub approver_id: Option<String>,
    pub comments: Option<String>,
}

pub async fn review_approval(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    payload: Result<Json<ReviewRequest>, JsonRejection>,
) -> ApiResult<ApprovalDoc> {
    session.require(Permission::ApprovalsManage)?;
    let Json(request) = payload?;
    let id = IdQuery { id: request.id }.require()?;
    let status = request
        .status
        .ok_or_else(|| AppError::BadRequest("status is required".to_string()))?;

    let decision = ReviewDecision {
        status,
        approver_id: non_empty(request.approver_id).unwrap_or_else(|| session.user.id.clone()),
        comments: non_empty(request.comments),
    };
    let approval = state
        .data
        .review_approval(&id, decision)
        .await?
        .ok_or(AppError::NotFound("Approval"))?;
    Ok(ApiResponse::ok(approval))
}
