// src/task_tree.rs
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::costs::{actual_hours_by_task, task_time_tracking, TaskTimeTracking};
use crate::models::{NameRef, TaskDoc, TaskTimeEntryDoc};

/// A task with its children, before display enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskTree {
    pub task: TaskDoc,
    pub children: Vec<TaskTree>,
}

/// Overwrites each task's `actualHours` with the sum of its task entries.
pub fn apply_actual_hours(tasks: &mut [TaskDoc], entries: &[TaskTimeEntryDoc]) {
    let totals = actual_hours_by_task(entries);
    for task in tasks.iter_mut() {
        task.actual_hours = totals.get(&task.id).copied().unwrap_or(0.0);
    }
}

fn by_start_date(tasks: &mut [TaskDoc]) {
    tasks.sort_by(|a, b| a.start_date.cmp(&b.start_date));
}

fn attach(
    task: TaskDoc,
    children_of: &mut HashMap<String, Vec<TaskDoc>>,
    placed: &mut HashSet<String>,
) -> TaskTree {
    placed.insert(task.id.clone());
    let mut kids = children_of.remove(&task.id).unwrap_or_default();
    by_start_date(&mut kids);
    let children = kids
        .into_iter()
        .filter(|kid| !placed.contains(&kid.id))
        .collect::<Vec<_>>()
        .into_iter()
        .map(|kid| attach(kid, children_of, placed))
        .collect();
    TaskTree { task, children }
}

/// Nests tasks under their parents. Tasks whose parent is missing become roots,
/// and tasks caught in a parent cycle are listed at the top level.
pub fn build_task_tree(tasks: Vec<TaskDoc>) -> Vec<TaskTree> {
    let ids: HashSet<String> = tasks.iter().map(|t| t.id.clone()).collect();
    let mut children_of: HashMap<String, Vec<TaskDoc>> = HashMap::new();
    let mut roots: Vec<TaskDoc> = Vec::new();

    for task in tasks {
        let parent = task
            .parent_id
            .clone()
            .filter(|parent| *parent != task.id && ids.contains(parent));
        match parent {
            Some(parent) => children_of.entry(parent).or_default().push(task),
            None => roots.push(task),
        }
    }

    by_start_date(&mut roots);
    let mut placed: HashSet<String> = HashSet::new();
    let mut tree: Vec<TaskTree> = roots
        .into_iter()
        .map(|root| attach(root, &mut children_of, &mut placed))
        .collect();

    // Whatever is left was only reachable through a cycle.
    let mut stranded: Vec<TaskDoc> = children_of.drain().flat_map(|(_, kids)| kids).collect();
    by_start_date(&mut stranded);
    for task in stranded {
        if !placed.contains(&task.id) {
            tree.push(attach(task, &mut children_of, &mut placed));
        }
    }
    tree
}

/// Detaches the subtree rooted at `id`, searching depth-first.
pub fn find_subtree(tree: Vec<TaskTree>, id: &str) -> Option<TaskTree> {
    for node in tree {
        if node.task.id == id {
            return Some(node);
        }
        if let Some(found) = find_subtree(node.children, id) {
            return Some(found);
        }
    }
    None
}

/// A task as served by `/api/tasks`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskNode {
    #[serde(flatten)]
    pub task: TaskDoc,
    #[serde(flatten)]
    pub tracking: TaskTimeTracking,
    pub project: NameRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<NameRef>,
    pub has_subtasks: bool,
    pub subtask_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<TaskNode>,
}

/// Resolves display names for project and assignee joins.
pub struct NameLookup<'a> {
    pub projects: &'a HashMap<String, String>,
    pub users: &'a HashMap<String, String>,
}

impl NameLookup<'_> {
    pub fn node(&self, task: TaskDoc, subtasks: Vec<TaskNode>) -> TaskNode {
        let tracking = task_time_tracking(task.estimated_hours, task.actual_hours, task.status);
        TaskNode {
            project: NameRef::resolve(self.projects, &task.project_id),
            assignee: task
                .assignee_id
                .as_deref()
                .map(|id| NameRef::resolve(self.users, id)),
            has_subtasks: !subtasks.is_empty(),
            subtask_count: subtasks.len(),
            subtasks,
            tracking,
            task,
        }
    }

    pub fn enrich_tree(&self, tree: TaskTree) -> TaskNode {
        let subtasks = tree
            .children
            .into_iter()
            .map(|child| self.enrich_tree(child))
            .collect();
        self.node(tree.task, subtasks)
    }
}

#[cfg(test)]
mod task_tree_tests {
    use super::*;
    use crate::models::{Priority, TaskStatus};

    fn create_test_task(id: &str, parent: Option<&str>, start: &str) -> TaskDoc {
        TaskDoc {
            id: id.to_string(),
            project_id: "proj_1".to_string(),
            parent_id: parent.map(str::to_string),
            name: format!("Task {}", id),
            description: None,
            assignee_id: Some("user_2".to_string()),
            start_date: start.to_string(),
            end_date: "2026-03-31".to_string(),
            estimated_hours: 10.0,
            actual_hours: 99.0,
            progress: 0.0,
            priority: Priority::Medium,
            status: TaskStatus::InProgress,
            dependencies: vec![],
            is_epic: false,
            is_milestone: false,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn create_test_entry(task_id: &str, hours: f64) -> TaskTimeEntryDoc {
        TaskTimeEntryDoc {
            id: format!("tte_{}_{}", task_id, hours),
            task_id: task_id.to_string(),
            user_id: "user_2".to_string(),
            project_id: "proj_1".to_string(),
            hours,
            date: "2026-02-16".to_string(),
            description: None,
            billable: true,
            week_number: 8,
            year: 2026,
            created_at: 0,
        }
    }

    fn ids(tree: &[TaskTree]) -> Vec<&str> {
        tree.iter().map(|t| t.task.id.as_str()).collect()
    }

    #[test]
    fn test_children_nest_under_parents() {
        let tasks = vec![
            create_test_task("sub_b", Some("epic"), "2026-02-10"),
            create_test_task("epic", None, "2026-02-01"),
            create_test_task("sub_a", Some("epic"), "2026-02-05"),
            create_test_task("leaf", Some("sub_a"), "2026-02-06"),
            create_test_task("solo", None, "2026-01-15"),
        ];
        let tree = build_task_tree(tasks);
        assert_eq!(ids(&tree), vec!["solo", "epic"]);
        assert_eq!(ids(&tree[1].children), vec!["sub_a", "sub_b"]);
        assert_eq!(ids(&tree[1].children[0].children), vec!["leaf"]);
    }

    #[test]
    fn test_orphans_become_roots() {
        let tasks = vec![
            create_test_task("orphan", Some("deleted_parent"), "2026-02-01"),
            create_test_task("self_parent", Some("self_parent"), "2026-02-02"),
        ];
        let tree = build_task_tree(tasks);
        assert_eq!(ids(&tree), vec!["orphan", "self_parent"]);
    }

    #[test]
    fn test_cycles_do_not_lose_tasks() {
        let tasks = vec![
            create_test_task("a", Some("b"), "2026-02-01"),
            create_test_task("b", Some("a"), "2026-02-02"),
            create_test_task("root", None, "2026-01-01"),
        ];
        let tree = build_task_tree(tasks);
        let mut all: Vec<&str> = ids(&tree);
        for node in &tree {
            all.extend(ids(&node.children));
        }
        all.sort();
        assert_eq!(all, vec!["a", "b", "root"]);
    }

    #[test]
    fn test_find_subtree() {
        let tasks = vec![
            create_test_task("epic", None, "2026-02-01"),
            create_test_task("sub", Some("epic"), "2026-02-02"),
            create_test_task("leaf", Some("sub"), "2026-02-03"),
        ];
        let sub = find_subtree(build_task_tree(tasks.clone()), "sub").unwrap();
        assert_eq!(ids(&sub.children), vec!["leaf"]);
        assert!(find_subtree(build_task_tree(tasks), "missing").is_none());
    }

    #[test]
    fn test_actual_hours_recomputed_from_entries() {
        let mut tasks = vec![
            create_test_task("t1", None, "2026-02-01"),
            create_test_task("t2", None, "2026-02-01"),
        ];
        let entries = vec![create_test_entry("t1", 4.0), create_test_entry("t1", 2.5)];
        apply_actual_hours(&mut tasks, &entries);
        assert_eq!(tasks[0].actual_hours, 6.5);
        assert_eq!(tasks[1].actual_hours, 0.0);
    }

    #[test]
    fn test_enriched_node_shape() {
        let projects = HashMap::from([("proj_1".to_string(), "Portal".to_string())]);
        let users = HashMap::new();
        let lookup = NameLookup {
            projects: &projects,
            users: &users,
        };
        let mut parent = create_test_task("epic", None, "2026-02-01");
        parent.actual_hours = 12.0;
        let tree = build_task_tree(vec![parent, create_test_task("sub", Some("epic"), "2026-02-02")]);
        let node = lookup.enrich_tree(tree.into_iter().next().unwrap());

        assert!(node.has_subtasks);
        assert_eq!(node.subtask_count, 1);
        assert_eq!(node.project.name, "Portal");
        assert_eq!(node.assignee.as_ref().unwrap().name, "Unknown");

        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["timeStatus"], "over_budget");
        assert_eq!(value["overHours"], 2.0);
        assert_eq!(value["subtasks"][0]["id"], "sub");
        assert!(value["subtasks"][0].get("subtasks").is_none());
    }
}
