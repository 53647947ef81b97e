//! # Admin Roles and Permissions
//!
//! Four roles with a default flag set each. Flags live on the admin record
//! and can be edited individually; changing the role resets them.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Admin role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Moderator,
    Viewer,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Admin => "admin",
            Self::Moderator => "moderator",
            Self::Viewer => "viewer",
        }
    }

    /// Flags granted by this role.
    #[must_use]
    pub fn default_permissions(self) -> Permissions {
        match self {
            Self::SuperAdmin => Permissions {
                can_create: true,
                can_edit: true,
                can_delete: true,
                can_view: true,
                can_manage_users: true,
                can_manage_categories: true,
                can_manage_registrations: true,
                can_view_analytics: true,
            },
            Self::Admin => Permissions {
                can_manage_users: false,
                ..Self::SuperAdmin.default_permissions()
            },
            Self::Moderator => Permissions {
                can_create: true,
                can_edit: true,
                can_manage_registrations: true,
                ..Permissions::default()
            },
            Self::Viewer => Permissions::default(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "super_admin" => Ok(Self::SuperAdmin),
            "admin" => Ok(Self::Admin),
            "moderator" => Ok(Self::Moderator),
            "viewer" => Ok(Self::Viewer),
            other => Err(CoreError::validation(format!("unknown role: {other}"))),
        }
    }
}

/// Individual capability checked by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Create,
    Edit,
    Delete,
    View,
    ManageUsers,
    ManageCategories,
    ManageRegistrations,
    ViewAnalytics,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Edit => "edit",
            Self::Delete => "delete",
            Self::View => "view",
            Self::ManageUsers => "manage users",
            Self::ManageCategories => "manage categories",
            Self::ManageRegistrations => "manage registrations",
            Self::ViewAnalytics => "view analytics",
        };
        f.write_str(name)
    }
}

/// Permission flags stored on an admin record.
///
/// The default is the viewer set: read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub can_create: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    pub can_view: bool,
    pub can_manage_users: bool,
    pub can_manage_categories: bool,
    pub can_manage_registrations: bool,
    pub can_view_analytics: bool,
}

impl Default for Permissions {
    fn default() -> Self {
        Self {
            can_create: false,
            can_edit: false,
            can_delete: false,
            can_view: true,
            can_manage_users: false,
            can_manage_categories: false,
            can_manage_registrations: false,
            can_view_analytics: false,
        }
    }
}

impl Permissions {
    /// Whether a single capability is granted.
    #[must_use]
    pub fn allows(&self, permission: Permission) -> bool {
        match permission {
            Permission::Create => self.can_create,
            Permission::Edit => self.can_edit,
            Permission::Delete => self.can_delete,
            Permission::View => self.can_view,
            Permission::ManageUsers => self.can_manage_users,
            Permission::ManageCategories => self.can_manage_categories,
            Permission::ManageRegistrations => self.can_manage_registrations,
            Permission::ViewAnalytics => self.can_view_analytics,
        }
    }

    /// Whether every listed capability is granted.
    #[must_use]
    pub fn allows_all(&self, permissions: &[Permission]) -> bool {
        permissions.iter().all(|p| self.allows(*p))
    }

    /// First missing capability, if any.
    #[must_use]
    pub fn missing(&self, permissions: &[Permission]) -> Option<Permission> {
        permissions.iter().copied().find(|p| !self.allows(*p))
    }
}
