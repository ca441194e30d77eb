// src/resource_handlers.rs
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::calendar::{current_iso_week, now_millis};
use crate::costs::{resource_costs, ResourceCosts};
use crate::data_service::{AllocationFilter, TaskTimeEntryFilter};
use crate::error::{ApiResponse, AppError};
use crate::handlers::{non_empty, project_names, user_names, ApiResult, IdQuery};
use crate::models::{
    new_id, AllocationDoc, NameRef, ResourceDoc, DEFAULT_CAPACITY_HOURS, DEFAULT_CURRENCY,
};
use crate::permissions::Permission;
use crate::routes::AppState;
use crate::session::Session;

// --- Resources ---

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceQuery {
    pub with_costs: Option<bool>,
    pub week_number: Option<u32>,
    pub year: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceView {
    #[serde(flatten)]
    pub resource: ResourceDoc,
    pub user: NameRef,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub costs: Option<ResourceCosts>,
}

pub async fn list_resources(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    query: Result<Query<ResourceQuery>, QueryRejection>,
) -> ApiResult<Vec<ResourceView>> {
    session.require(Permission::ResourcesRead)?;
    let Query(query) = query?;
    let with_costs = query.with_costs.unwrap_or(false);
    if with_costs {
        session.require(Permission::ReportsCosts)?;
    }

    let (resources, users) =
        tokio::try_join!(state.data.get_resources(), state.data.get_users())?;
    let names = user_names(&users);

    if !with_costs {
        let views = resources
            .into_iter()
            .map(|resource| ResourceView {
                user: NameRef::resolve(&names, &resource.user_id),
                resource,
                costs: None,
            })
            .collect();
        return Ok(ApiResponse::ok(views));
    }

    // Capacity is weekly, so allocations are always scoped to a single week.
    let (current_week, current_year) = current_iso_week();
    let allocation_filter = AllocationFilter {
        week_number: Some(query.week_number.unwrap_or(current_week)),
        year: Some(query.year.unwrap_or(current_year)),
        ..AllocationFilter::default()
    };
    let all_entries = TaskTimeEntryFilter::default();
    let (entries, allocations, projects) = tokio::try_join!(
        state.data.get_task_time_entries(&all_entries),
        state.data.get_allocations(&allocation_filter),
        state.data.get_projects()
    )?;
    let projects = project_names(&projects);

    let views = resources
        .into_iter()
        .map(|resource| ResourceView {
            user: NameRef::resolve(&names, &resource.user_id),
            costs: Some(resource_costs(&resource, &entries, &allocations, &projects)),
            resource,
        })
        .collect();
    Ok(ApiResponse::ok(views))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateResourceRequest {
    pub user_id: String,
    pub capacity: Option<f64>,
    #[serde(default)]
    pub skills: Vec<String>,
    pub hourly_rate: Option<f64>,
    pub monthly_salary: Option<f64>,
    pub currency: Option<String>,
}

pub async fn create_resource(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    payload: Result<Json<CreateResourceRequest>, JsonRejection>,
) -> ApiResult<ResourceDoc> {
    session.require(Permission::ResourcesCreate)?;
    let Json(request) = payload?;
    if request.user_id.trim().is_empty() {
        return Err(AppError::BadRequest("userId is required".to_string()));
    }

    let resource = ResourceDoc {
        id: new_id("res"),
        user_id: request.user_id,
        capacity: request.capacity.unwrap_or(DEFAULT_CAPACITY_HOURS),
        skills: request.skills,
        hourly_rate: request.hourly_rate.unwrap_or(0.0),
        monthly_salary: request.monthly_salary,
        currency: non_empty(request.currency).unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        created_at: now_millis(),
        updated_at: None,
    };
    let resource = state.data.create_resource(resource).await?;
    Ok(ApiResponse::ok(resource))
}

// --- Allocations ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationView {
    #[serde(flatten)]
    pub allocation: AllocationDoc,
    pub project: NameRef,
    /// The person behind the resource.
    pub user: NameRef,
}

pub async fn list_allocations(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    query: Result<Query<AllocationFilter>, QueryRejection>,
) -> ApiResult<Vec<AllocationView>> {
    session.require(Permission::ResourcesRead)?;
    let Query(filter) = query?;
    let (allocations, projects, resources, users) = tokio::try_join!(
        state.data.get_allocations(&filter),
        state.data.get_projects(),
        state.data.get_resources(),
        state.data.get_users()
    )?;

    let projects = project_names(&projects);
    let users = user_names(&users);
    let views = allocations
        .into_iter()
        .map(|allocation| {
            let user = match resources.iter().find(|r| r.id == allocation.resource_id) {
                Some(resource) => NameRef::resolve(&users, &resource.user_id),
                None => NameRef::unknown(&allocation.resource_id),
            };
            AllocationView {
                project: NameRef::resolve(&projects, &allocation.project_id),
                user,
                allocation,
            }
        })
        .collect();
    Ok(ApiResponse::ok(views))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAllocationRequest {
    pub resource_id: String,
    pub project_id: String,
    pub week_number: Option<u32>,
    pub year: Option<i32>,
    #[serde(default)]
    pub allocated_hours: f64,
}

pub async fn create_allocation(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    payload: Result<Json<CreateAllocationRequest>, JsonRejection>,
) -> ApiResult<AllocationDoc> {
    session.require(Permission::ResourcesUpdate)?;
    let Json(request) = payload?;
    if request.resource_id.trim().is_empty() || request.project_id.trim().is_empty() {
        return Err(AppError::BadRequest(
            "resourceId and projectId are required".to_string(),
        ));
    }

    let (current_week, current_year) = current_iso_week();
    let allocation = AllocationDoc {
        id: new_id("alloc"),
        resource_id: request.resource_id,
        project_id: request.project_id,
        week_number: request.week_number.unwrap_or(current_week),
        year: request.year.unwrap_or(current_year),
        allocated_hours: request.allocated_hours,
        created_at: now_millis(),
    };
    let allocation = state.data.create_allocation(allocation).await?;
    info!(
        "Allocated {}h of {} to {} in week {}/{}",
        allocation.allocated_hours,
        allocation.resource_id,
        allocation.project_id,
        allocation.week_number,
        allocation.year
    );
    Ok(ApiResponse::ok(allocation))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAllocationRequest {
    pub id: Option<String>,
    pub allocated_hours: Option<f64>,
}

pub async fn update_allocation(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    payload: Result<Json<UpdateAllocationRequest>, JsonRejection>,
) -> ApiResult<AllocationDoc> {
    session.require(Permission::ResourcesUpdate)?;
    let Json(request) = payload?;
    let id = IdQuery { id: request.id }.require()?;
    let hours = request
        .allocated_hours
        .ok_or_else(|| AppError::BadRequest("allocatedHours is required".to_string()))?;

    let allocation = state
        .data
        .update_allocation_hours(&id, hours)
        .await?
        .ok_or(AppError::NotFound("Allocation"))?;
    Ok(ApiResponse::ok(allocation))
}

pub async fn delete_allocation(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    query: Result<Query<IdQuery>, QueryRejection>,
) -> ApiResult<()> {
    session.require(Permission::ResourcesUpdate)?;
    let Query(query) = query?;
    let id = query.require()?;
    state.data.delete_allocation(&id).await?;
    info!("Deleted allocation {}", id);
    Ok(ApiResponse::empty())
}
