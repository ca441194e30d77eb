// src/test_utils.rs
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::data_service::DataService;
use crate::luma_client::{Collection, DocumentStore, PutResponse, StoreError, StoredDoc};
use crate::models::{
    DayHours, ProjectDoc, ResourceDoc, Role, TaskDoc, TaskTimeEntryDoc, TimeEntryDoc,
    TimeEntryStatus, UserDoc,
};
use crate::routes::AppState;
use crate::session::{open_session, InMemorySessionStore};

/// A `DocumentStore` kept in process memory. `set_failing` makes every call
/// return a 503 the way an unreachable Luma would.
#[derive(Default)]
pub struct InMemoryStore {
    docs: Mutex<HashMap<Collection, BTreeMap<String, Value>>>,
    failing: AtomicBool,
    revision: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn insert<T: Serialize>(&self, collection: Collection, id: &str, doc: &T) {
        let value = serde_json::to_value(doc).unwrap();
        self.docs
            .lock()
            .unwrap()
            .entry(collection)
            .or_default()
            .insert(id.to_string(), value);
    }

    pub fn get(&self, collection: Collection, id: &str) -> Option<Value> {
        self.docs
            .lock()
            .unwrap()
            .get(&collection)
            .and_then(|docs| docs.get(id).cloned())
    }

    pub fn count(&self, collection: Collection) -> usize {
        self.docs
            .lock()
            .unwrap()
            .get(&collection)
            .map_or(0, BTreeMap::len)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Api {
                status: 503,
                message: "store unavailable".to_string(),
            })
        } else {
            Ok(())
        }
    }

    fn next_revision(&self) -> u64 {
        self.revision.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn find_docs(
        &self,
        collection: Collection,
        _filter: Option<Value>,
        limit: Option<usize>,
    ) -> Result<Vec<StoredDoc<Value>>, StoreError> {
        self.check()?;
        let docs = self.docs.lock().unwrap();
        let found = docs
            .get(&collection)
            .map(|docs| {
                docs.iter()
                    .take(limit.unwrap_or(usize::MAX))
                    .map(|(id, doc)| StoredDoc {
                        doc: doc.clone(),
                        id: id.clone(),
                        revision: 1,
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(found)
    }

    async fn get_doc(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<StoredDoc<Value>>, StoreError> {
        self.check()?;
        Ok(self.get(collection, id).map(|doc| StoredDoc {
            doc,
            id: id.to_string(),
            revision: 1,
        }))
    }

    async fn put_doc(
        &self,
        collection: Collection,
        id: &str,
        doc: Value,
    ) -> Result<PutResponse, StoreError> {
        self.check()?;
        self.insert(collection, id, &doc);
        Ok(PutResponse {
            id: id.to_string(),
            revision: self.next_revision(),
        })
    }

    async fn delete_doc(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        self.check()?;
        if let Some(docs) = self.docs.lock().unwrap().get_mut(&collection) {
            docs.remove(id);
        }
        Ok(())
    }
}

// --- Fixtures ---

pub fn test_state(store: Arc<InMemoryStore>) -> AppState {
    AppState::new(
        DataService::new(store),
        Arc::new(InMemorySessionStore::default()),
    )
}

/// Opens a session directly, skipping the login route.
pub async fn token_for(state: &AppState, user: &UserDoc) -> String {
    open_session(state.sessions.as_ref(), user).await.token
}

pub fn create_test_user(id: &str, name: &str, role: Role) -> UserDoc {
    UserDoc {
        id: id.to_string(),
        name: name.to_string(),
        email: format!("{}@timeos.test", id),
        role,
        avatar: None,
        password: Some(format!("{}-pass", id)),
        is_active: true,
        created_at: 1,
        updated_at: None,
    }
}

pub fn create_test_project(id: &str, name: &str) -> ProjectDoc {
    ProjectDoc {
        id: id.to_string(),
        name: name.to_string(),
        code: id.to_uppercase(),
        client: None,
        description: None,
        billable: true,
        status: "active".to_string(),
        start_date: None,
        end_date: None,
        budget: None,
        budget_hours: None,
        actual_cost: None,
        actual_hours: None,
        hourly_rate: None,
        currency: Some("USD".to_string()),
        profit: None,
        profit_margin: None,
        baseline_start: None,
        baseline_end: None,
        baseline_budget: None,
        progress: None,
        created_at: 1,
        updated_at: None,
    }
}

pub fn create_test_resource(id: &str, user_id: &str, hourly_rate: f64) -> ResourceDoc {
    ResourceDoc {
        id: id.to_string(),
        user_id: user_id.to_string(),
        capacity: 40.0,
        skills: vec![],
        hourly_rate,
        monthly_salary: None,
        currency: "USD".to_string(),
        created_at: 1,
        updated_at: None,
    }
}

pub fn create_test_task(id: &str, project_id: &str, parent_id: Option<&str>) -> TaskDoc {
    TaskDoc {
        id: id.to_string(),
        project_id: project_id.to_string(),
        parent_id: parent_id.map(str::to_string),
        name: format!("Task {}", id),
        description: None,
        assignee_id: None,
        start_date: "2026-02-16".to_string(),
        end_date: "2026-02-20".to_string(),
        estimated_hours: 10.0,
        actual_hours: 0.0,
        progress: 0.0,
        priority: Default::default(),
        status: Default::default(),
        dependencies: vec![],
        is_epic: false,
        is_milestone: false,
        created_at: 1,
        updated_at: 1,
    }
}

pub fn create_test_task_entry(
    id: &str,
    task_id: &str,
    user_id: &str,
    project_id: &str,
    hours: f64,
) -> TaskTimeEntryDoc {
    TaskTimeEntryDoc {
        id: id.to_string(),
        task_id: task_id.to_string(),
        user_id: user_id.to_string(),
        project_id: project_id.to_string(),
        hours,
        date: "2026-02-16".to_string(),
        description: None,
        billable: true,
        week_number: 8,
        year: 2026,
        created_at: 1,
    }
}

pub fn create_test_time_entry(
    id: &str,
    user_id: &str,
    project_id: &str,
    hours: DayHours,
) -> TimeEntryDoc {
    TimeEntryDoc {
        id: id.to_string(),
        user_id: user_id.to_string(),
        project_id: project_id.to_string(),
        activity: "Development".to_string(),
        notes: None,
        billable: true,
        week_number: 8,
        year: 2026,
        total: hours.total(),
        hours,
        status: TimeEntryStatus::Draft,
        created_at: 1,
        updated_at: 1,
    }
}
