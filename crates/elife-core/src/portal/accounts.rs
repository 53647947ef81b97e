//! Admin accounts.
//!
//! Once a super admin exists, one active super admin always remains:
//! deleting, deactivating or demoting the last one is refused.

use super::{Portal, now};
use crate::error::{CoreError, Result};
use crate::password::{hash_password_with, verify_password};
use crate::permissions::Role;
use crate::storage::{Tables, WriteTx};
use crate::types::{Admin, AdminId, AdminUpdate, NewAdmin, clean_name};

fn check_password(password: &str) -> Result<()> {
    if password.trim().is_empty() {
        return Err(CoreError::validation("Username and password are required"));
    }
    if password.len() > crate::MAX_NAME_LEN {
        return Err(CoreError::validation("password is too long"));
    }
    Ok(())
}

fn username_taken(tx: &WriteTx, username: &str, except: Option<AdminId>) -> Result<bool> {
    Ok(tx
        .all::<Admin>()?
        .iter()
        .any(|a| Some(a.id) != except && a.username.eq_ignore_ascii_case(username)))
}

fn active_super_admins(admins: &[Admin]) -> usize {
    admins
        .iter()
        .filter(|a| a.is_active && a.role == Role::SuperAdmin)
        .count()
}

impl Portal {
    fn new_admin_record(&self, username: String, password: &str, role: Role) -> Admin {
        let at = now();
        Admin {
            id: AdminId::new(),
            username,
            password_hash: hash_password_with(password, self.hash_iterations),
            role,
            permissions: role.default_permissions(),
            is_active: true,
            created_at: at,
            updated_at: at,
        }
    }

    /// Check credentials. Unknown users, wrong passwords and inactive
    /// accounts all fail the same way.
    pub fn login(&self, username: &str, password: &str) -> Result<Admin> {
        let username = username.trim();
        let admin = self
            .store
            .read(|tx| tx.all::<Admin>())?
            .into_iter()
            .find(|a| a.username == username)
            .ok_or(CoreError::AuthenticationFailed)?;
        if !admin.is_active || !verify_password(&admin.password_hash, password) {
            return Err(CoreError::AuthenticationFailed);
        }
        Ok(admin)
    }

    /// Create the first super admin. Refused once any admin exists.
    pub fn bootstrap_admin(&self, username: &str, password: &str) -> Result<Admin> {
        let username = clean_name(username, "username")?;
        check_password(password)?;
        let admin = self.new_admin_record(username, password, Role::SuperAdmin);
        self.store.write(|tx| {
            if tx.count::<Admin>()? > 0 {
                return Err(CoreError::conflict("An administrator already exists"));
            }
            tx.put(&admin)?;
            Ok(admin)
        })
    }

    /// Create an admin. The role defaults to viewer.
    pub fn create_admin(&self, new: NewAdmin) -> Result<Admin> {
        let username = clean_name(&new.username, "username")?;
        check_password(&new.password)?;
        let admin =
            self.new_admin_record(username, &new.password, new.role.unwrap_or(Role::Viewer));
        self.store.write(|tx| {
            if username_taken(tx, &admin.username, None)? {
                return Err(CoreError::conflict(format!(
                    "Username {} is already taken",
                    admin.username
                )));
            }
            tx.put(&admin)?;
            Ok(admin)
        })
    }

    /// Apply a partial update. A role change resets the permission flags to
    /// the role defaults before any explicit flags are applied.
    pub fn update_admin(&self, id: AdminId, update: AdminUpdate) -> Result<Admin> {
        let username = update
            .username
            .as_deref()
            .map(|u| clean_name(u, "username"))
            .transpose()?;
        let password_hash = match update.password.as_deref() {
            Some(password) if !password.is_empty() => {
                check_password(password)?;
                Some(hash_password_with(password, self.hash_iterations))
            }
            _ => None,
        };

        self.store.write(|tx| {
            let mut admins = tx.all::<Admin>()?;
            let guarded = active_super_admins(&admins) > 0;
            let Some(slot) = admins.iter().position(|a| a.id == id) else {
                return Err(CoreError::not_found("admin", id));
            };

            if let Some(username) = username {
                if username_taken(tx, &username, Some(id))? {
                    return Err(CoreError::conflict(format!(
                        "Username {username} is already taken"
                    )));
                }
                admins[slot].username = username;
            }
            if let Some(hash) = password_hash {
                admins[slot].password_hash = hash;
            }
            if let Some(role) = update.role {
                admins[slot].role = role;
                admins[slot].permissions = role.default_permissions();
            }
            if let Some(permissions) = update.permissions {
                admins[slot].permissions = permissions;
            }
            if let Some(active) = update.is_active {
                admins[slot].is_active = active;
            }
            if guarded && active_super_admins(&admins) == 0 {
                return Err(CoreError::conflict(
                    "At least one active super admin must remain",
                ));
            }

            admins[slot].updated_at = now();
            tx.put(&admins[slot])?;
            Ok(admins[slot].clone())
        })
    }

    /// Delete an admin. `acting` is the admin performing the deletion.
    pub fn delete_admin(&self, id: AdminId, acting: AdminId) -> Result<()> {
        if id == acting {
            return Err(CoreError::conflict("You cannot delete your own account"));
        }
        self.store.write(|tx| {
            let mut admins = tx.all::<Admin>()?;
            let guarded = active_super_admins(&admins) > 0;
            let before = admins.len();
            admins.retain(|a| a.id != id);
            if admins.len() == before {
                return Err(CoreError::not_found("admin", id));
            }
            if guarded && active_super_admins(&admins) == 0 {
                return Err(CoreError::conflict(
                    "Cannot delete the last active super admin",
                ));
            }
            tx.remove::<Admin>(id.key())?;
            Ok(())
        })
    }

    pub fn get_admin(&self, id: AdminId) -> Result<Admin> {
        self.store.read(|tx| tx.require::<Admin>(id.key()))
    }

    /// All admins, oldest first.
    pub fn list_admins(&self) -> Result<Vec<Admin>> {
        let mut admins = self.store.read(|tx| tx.all::<Admin>())?;
        admins.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(admins)
    }
}
