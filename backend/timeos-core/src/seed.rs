// src/seed.rs
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::calendar::now_millis;
use crate::data_service::DataService;
use crate::error::AppError;
use crate::luma_client::Collection;
use crate::models::{
    AllocationDoc, ApprovalDoc, ProjectDoc, ResourceDoc, TaskDoc, TaskTimeEntryDoc, TimeEntryDoc,
    UserDoc,
};

const SEED_JSON: &str = include_str!("../seed/seed.json");

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedData {
    pub users: Vec<UserDoc>,
    pub projects: Vec<ProjectDoc>,
    pub resources: Vec<ResourceDoc>,
    pub allocations: Vec<AllocationDoc>,
    pub tasks: Vec<TaskDoc>,
    pub task_time_entries: Vec<TaskTimeEntryDoc>,
    pub time_entries: Vec<TimeEntryDoc>,
    pub approvals: Vec<ApprovalDoc>,
}

impl SeedData {
    pub fn embedded() -> Result<Self, AppError> {
        serde_json::from_str(SEED_JSON)
            .map_err(|e| AppError::MalformedDocument(format!("embedded seed data: {}", e)))
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeedCounts {
    pub cleared: usize,
    pub users: usize,
    pub projects: usize,
    pub resources: usize,
    pub allocations: usize,
    pub tasks: usize,
    pub task_time_entries: usize,
    pub time_entries: usize,
    pub approvals: usize,
}

/// Writes every fixture document, stamping `createdAt` on those without one.
pub async fn seed_store(data: &DataService, seed: SeedData) -> Result<SeedCounts, AppError> {
    let now = now_millis();
    let mut counts = SeedCounts::default();

    for mut user in seed.users {
        if user.created_at == 0 {
            user.created_at = now;
        }
        data.put(Collection::Users, &user.id, &user).await?;
        counts.users += 1;
    }
    for mut project in seed.projects {
        if project.created_at == 0 {
            project.created_at = now;
        }
        data.put(Collection::Projects, &project.id, &project).await?;
        counts.projects += 1;
    }
    for mut resource in seed.resources {
        if resource.created_at == 0 {
            resource.created_at = now;
        }
        data.put(Collection::Resources, &resource.id, &resource)
            .await?;
        counts.resources += 1;
    }
    for mut allocation in seed.allocations {
        if allocation.created_at == 0 {
            allocation.created_at = now;
        }
        data.put(Collection::Allocations, &allocation.id, &allocation)
            .await?;
        counts.allocations += 1;
    }
    for mut task in seed.tasks {
        if task.created_at == 0 {
            task.created_at = now;
            task.updated_at = now;
        }
        data.put(Collection::Tasks, &task.id, &task).await?;
        counts.tasks += 1;
    }
    for mut entry in seed.task_time_entries {
        if entry.created_at == 0 {
            entry.created_at = now;
        }
        data.put(Collection::TaskTimeEntries, &entry.id, &entry)
            .await?;
        counts.task_time_entries += 1;
    }
    for mut entry in seed.time_entries {
        entry.recompute_total();
        if entry.created_at == 0 {
            entry.created_at = now;
            entry.updated_at = now;
        }
        data.put(Collection::TimeEntries, &entry.id, &entry).await?;
        counts.time_entries += 1;
    }
    for mut approval in seed.approvals {
        if approval.created_at == 0 {
            approval.created_at = now;
        }
        data.put(Collection::Approvals, &approval.id, &approval)
            .await?;
        counts.approvals += 1;
    }

    info!(
        "Seeded {} users, {} projects, {} tasks, {} task entries, {} timesheets",
        counts.users, counts.projects, counts.tasks, counts.task_time_entries, counts.time_entries
    );
    Ok(counts)
}

/// Clears every collection, then loads the embedded fixture.
pub async fn reset_store(data: &DataService) -> Result<SeedCounts, AppError> {
    let seed = SeedData::embedded()?;
    let cleared = data.clear_all_data().await?;
    info!("Cleared {} documents before seeding", cleared);
    let counts = seed_store(data, seed).await?;
    Ok(SeedCounts { cleared, ..counts })
}
