// src/permissions.rs
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::models::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Permission {
    #[serde(rename = "projects:read")]
    ProjectsRead,
    #[serde(rename = "projects:create")]
    ProjectsCreate,
    #[serde(rename = "projects:update")]
    ProjectsUpdate,
    #[serde(rename = "projects:delete")]
    ProjectsDelete,
    #[serde(rename = "tasks:read")]
    TasksRead,
    #[serde(rename = "tasks:create")]
    TasksCreate,
    #[serde(rename = "tasks:update")]
    TasksUpdate,
    #[serde(rename = "tasks:delete")]
    TasksDelete,
    #[serde(rename = "timesheets:read")]
    TimesheetsRead,
    #[serde(rename = "timesheets:create")]
    TimesheetsCreate,
    #[serde(rename = "timesheets:update")]
    TimesheetsUpdate,
    #[serde(rename = "timesheets:delete")]
    TimesheetsDelete,
    #[serde(rename = "timesheets:approve")]
    TimesheetsApprove,
    #[serde(rename = "approvals:read")]
    ApprovalsRead,
    #[serde(rename = "approvals:manage")]
    ApprovalsManage,
    #[serde(rename = "resources:read")]
    ResourcesRead,
    #[serde(rename = "resources:create")]
    ResourcesCreate,
    #[serde(rename = "resources:update")]
    ResourcesUpdate,
    #[serde(rename = "resources:delete")]
    ResourcesDelete,
    #[serde(rename = "reports:read")]
    ReportsRead,
    #[serde(rename = "reports:costs")]
    ReportsCosts,
    #[serde(rename = "settings:read")]
    SettingsRead,
    #[serde(rename = "settings:update")]
    SettingsUpdate,
    #[serde(rename = "users:read")]
    UsersRead,
    #[serde(rename = "users:create")]
    UsersCreate,
    #[serde(rename = "users:update")]
    UsersUpdate,
    #[serde(rename = "users:delete")]
    UsersDelete,
}

impl Permission {
    pub const ALL: [Permission; 27] = [
        Permission::ProjectsRead,
        Permission::ProjectsCreate,
        Permission::ProjectsUpdate,
        Permission::ProjectsDelete,
        Permission::TasksRead,
        Permission::TasksCreate,
        Permission::TasksUpdate,
        Permission::TasksDelete,
        Permission::TimesheetsRead,
        Permission::TimesheetsCreate,
        Permission::TimesheetsUpdate,
        Permission::TimesheetsDelete,
        Permission::TimesheetsApprove,
        Permission::ApprovalsRead,
        Permission::ApprovalsManage,
        Permission::ResourcesRead,
        Permission::ResourcesCreate,
        Permission::ResourcesUpdate,
        Permission::ResourcesDelete,
        Permission::ReportsRead,
        Permission::ReportsCosts,
        Permission::SettingsRead,
        Permission::SettingsUpdate,
        Permission::UsersRead,
        Permission::UsersCreate,
        Permission::UsersUpdate,
        Permission::UsersDelete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ProjectsRead => "projects:read",
            Permission::ProjectsCreate => "projects:create",
            Permission::ProjectsUpdate => "projects:update",
            Permission::ProjectsDelete => "projects:delete",
            Permission::TasksRead => "tasks:read",
            Permission::TasksCreate => "tasks:create",
            Permission::TasksUpdate => "tasks:update",
            Permission::TasksDelete => "tasks:delete",
            Permission::TimesheetsRead => "timesheets:read",
            Permission::TimesheetsCreate => "timesheets:create",
            Permission::TimesheetsUpdate => "timesheets:update",
            Permission::TimesheetsDelete => "timesheets:delete",
            Permission::TimesheetsApprove => "timesheets:approve",
            Permission::ApprovalsRead => "approvals:read",
            Permission::ApprovalsManage => "approvals:manage",
            Permission::ResourcesRead => "resources:read",
            Permission::ResourcesCreate => "resources:create",
            Permission::ResourcesUpdate => "resources:update",
            Permission::ResourcesDelete => "resources:delete",
            Permission::ReportsRead => "reports:read",
            Permission::ReportsCosts => "reports:costs",
            Permission::SettingsRead => "settings:read",
            Permission::SettingsUpdate => "settings:update",
            Permission::UsersRead => "users:read",
            Permission::UsersCreate => "users:create",
            Permission::UsersUpdate => "users:update",
            Permission::UsersDelete => "users:delete",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const MANAGER_EXCLUDED: [Permission; 7] = [
    Permission::ProjectsDelete,
    Permission::TasksDelete,
    Permission::ResourcesCreate,
    Permission::ResourcesDelete,
    Permission::SettingsUpdate,
    Permission::UsersCreate,
    Permission::UsersDelete,
];

const MEMBER_GRANTED: [Permission; 9] = [
    Permission::ProjectsRead,
    Permission::TasksRead,
    Permission::TimesheetsRead,
    Permission::TimesheetsCreate,
    Permission::TimesheetsUpdate,
    Permission::TimesheetsDelete,
    Permission::ResourcesRead,
    Permission::ReportsRead,
    Permission::SettingsRead,
];

static ROLE_PERMISSIONS: Lazy<HashMap<Role, HashSet<Permission>>> = Lazy::new(|| {
    let admin: HashSet<Permission> = Permission::ALL.into_iter().collect();
    let manager: HashSet<Permission> = Permission::ALL
        .into_iter()
        .filter(|p| !MANAGER_EXCLUDED.contains(p))
        .collect();
    let member: HashSet<Permission> = MEMBER_GRANTED.into_iter().collect();

    HashMap::from([
        (Role::Admin, admin),
        (Role::Manager, manager),
        (Role::Member, member),
    ])
});

pub fn has_permission(role: Role, permission: Permission) -> bool {
    ROLE_PERMISSIONS
        .get(&role)
        .map(|granted| granted.contains(&permission))
        .unwrap_or(false)
}

/// Sorted permission list for a role, as reported by `/api/auth/me`.
pub fn permissions_for(role: Role) -> Vec<Permission> {
    let mut granted: Vec<Permission> = ROLE_PERMISSIONS
        .get(&role)
        .map(|set| set.iter().copied().collect())
        .unwrap_or_default();
    granted.sort();
    granted
}
