//! Role-to-permission tables for the admin dashboard.
//!
//! The mapping is a pure function over a closed role set. Permission sets
//! are precomputed constants; they are never derived from external data at
//! runtime, so grants cannot drift without a code change.

use std::fmt;

/// Administrator role, closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    SuperAdmin,
    Admin,
    Viewer,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::SuperAdmin, Role::Admin, Role::Viewer];

    /// Parse the persisted role string. Unknown values return `None`;
    /// callers fall back to the empty permission set.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "super_admin" => Some(Self::SuperAdmin),
            "admin" => Some(Self::Admin),
            "viewer" => Some(Self::Viewer),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Admin => "admin",
            Self::Viewer => "viewer",
        }
    }

    /// Permission table for this role. Total over the closed enum.
    #[must_use]
    pub const fn permissions(self) -> &'static PermissionSet {
        match self {
            Self::SuperAdmin => &SUPER_ADMIN_PERMISSIONS,
            Self::Admin => &ADMIN_PERMISSIONS,
            Self::Viewer => &VIEWER_PERMISSIONS,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fine-grained action, `family:action` on the wire and in audit details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    UsersView,
    UsersApprove,
    UsersReject,
    UsersSuspend,
    UsersUpdate,
    UsersDelete,
    AdminView,
    AdminCreate,
    AdminUpdate,
    AdminDelete,
    SettingsView,
    SettingsUpdate,
}

impl Permission {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UsersView => "users:view",
            Self::UsersApprove => "users:approve",
            Self::UsersReject => "users:reject",
            Self::UsersSuspend => "users:suspend",
            Self::UsersUpdate => "users:update",
            Self::UsersDelete => "users:delete",
            Self::AdminView => "admin:view",
            Self::AdminCreate => "admin:create",
            Self::AdminUpdate => "admin:update",
            Self::AdminDelete => "admin:delete",
            Self::SettingsView => "settings:view",
            Self::SettingsUpdate => "settings:update",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable permission table, grouped by action family.
#[derive(Debug, PartialEq, Eq)]
pub struct PermissionSet {
    pub users: &'static [Permission],
    pub admin: &'static [Permission],
    pub settings: &'static [Permission],
}

impl PermissionSet {
    /// Table for a raw role string; unknown roles get the empty set
    /// (fail safe, not fail open).
    #[must_use]
    pub fn for_role_name(role: &str) -> &'static Self {
        Role::parse(role).map_or(&EMPTY_PERMISSIONS, Role::permissions)
    }

    #[must_use]
    pub fn allows(&self, permission: Permission) -> bool {
        self.iter().any(|granted| granted == permission)
    }

    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        self.users
            .iter()
            .chain(self.admin)
            .chain(self.settings)
            .copied()
    }

    #[must_use]
    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.iter().all(|permission| other.allows(permission))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

pub static SUPER_ADMIN_PERMISSIONS: PermissionSet = PermissionSet {
    users: &[
        Permission::UsersView,
        Permission::UsersApprove,
        Permission::UsersReject,
        Permission::UsersSuspend,
        Permission::UsersUpdate,
        Permission::UsersDelete,
    ],
    admin: &[
        Permission::AdminView,
        Permission::AdminCreate,
        Permission::AdminUpdate,
        Permission::AdminDelete,
    ],
    settings: &[Permission::SettingsView, Permission::SettingsUpdate],
};

pub static ADMIN_PERMISSIONS: PermissionSet = PermissionSet {
    users: &[
        Permission::UsersView,
        Permission::UsersApprove,
        Permission::UsersReject,
        Permission::UsersSuspend,
        Permission::UsersUpdate,
    ],
    admin: &[Permission::AdminView],
    settings: &[Permission::SettingsView],
};

pub static VIEWER_PERMISSIONS: PermissionSet = PermissionSet {
    users: &[Permission::UsersView],
    admin: &[],
    settings: &[Permission::SettingsView],
};

pub static EMPTY_PERMISSIONS: PermissionSet = PermissionSet {
    users: &[],
    admin: &[],
    settings: &[],
};
