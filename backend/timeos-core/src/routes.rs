// src/routes.rs
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::data_service::DataService;
use crate::handlers;
use crate::project_handlers;
use crate::resource_handlers;
use crate::session::{auth_middleware, SessionStore};
use crate::timesheet_handlers;

#[derive(Clone)]
pub struct AppState {
    pub data: DataService,
    pub sessions: Arc<dyn SessionStore>,
}

impl AppState {
    pub fn new(data: DataService, sessions: Arc<dyn SessionStore>) -> Self {
        Self { data, sessions }
    }
}

pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(handlers::health))
        .route("/auth/login", post(handlers::login));

    let protected = Router::new()
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/me", get(handlers::me))
        .route(
            "/users",
            get(handlers::list_users).post(handlers::create_user),
        )
        .route(
            "/reports/employee-hours",
            get(handlers::employee_hours_report),
        )
        .route("/reports/costs", get(handlers::cost_report))
        .route(
            "/projects",
            get(project_handlers::list_projects)
                .post(project_handlers::create_project)
                .put(project_handlers::update_project),
        )
        .route(
            "/tasks",
            get(project_handlers::list_tasks)
                .post(project_handlers::create_task)
                .put(project_handlers::update_task)
                .delete(project_handlers::delete_task),
        )
        .route(
            "/task-time-entries",
            get(project_handlers::list_task_time_entries)
                .post(project_handlers::create_task_time_entry)
                .put(project_handlers::update_task_time_entry)
                .delete(project_handlers::delete_task_time_entry),
        )
        .route(
            "/timesheets",
            get(timesheet_handlers::list_timesheets)
                .post(timesheet_handlers::create_timesheet)
                .put(timesheet_handlers::update_timesheet)
                .delete(timesheet_handlers::delete_timesheet),
        )
        .route(
            "/approvals",
            get(timesheet_handlers::list_approvals)
                .post(timesheet_handlers::submit_approval)
                .put(timesheet_handlers::review_approval),
        )
        .route(
            "/resources",
            get(resource_handlers::list_resources).post(resource_handlers::create_resource),
        )
        .route(
            "/allocations",
            get(resource_handlers::list_allocations)
                .post(resource_handlers::create_allocation)
                .put(resource_handlers::update_allocation)
                .delete(resource_handlers::delete_allocation),
        )
        .route("/reset", post(handlers::reset))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api", public.merge(protected))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
