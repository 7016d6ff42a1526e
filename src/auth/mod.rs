//! User roster, authentication and role-based permission checks.

pub mod password;
pub mod permissions;

use chrono::{Local, NaiveDate};

use crate::error::{AppError, Result};
use crate::models::user::{NewUser, Role, User, UserStatus, UserUpdate};

pub use password::{hash_password, verify_password};
pub use permissions::{Permission, role_permissions};

/// In-memory roster of staff accounts and the signed-in user.
///
/// The roster is owned here and handed to callers by reference. The
/// application validates with the `prepare_*` and `check_delete` methods,
/// writes through [`crate::db::user`], and applies the stored row with
/// [`UserManager::store_user`] or [`UserManager::remove_user`] once the write
/// succeeds.
#[derive(Debug, Clone)]
pub struct UserManager {
    users: Vec<User>,
    current: Option<String>,
    primary_admin: String,
}

impl UserManager {
    /// Create a manager over an existing roster.
    pub fn new(users: Vec<User>, primary_admin: impl Into<String>) -> Self {
        Self {
            users,
            current: None,
            primary_admin: primary_admin.into(),
        }
    }

    /// Authenticate and stamp today's date as last login.
    pub fn login(&mut self, username: &str, password: &str) -> bool {
        self.login_on(username, password, Local::now().date_naive())
    }

    /// Authenticate, stamping `today` as last login on success.
    pub fn login_on(&mut self, username: &str, password: &str, today: NaiveDate) -> bool {
        let Some(user) = self.users.iter_mut().find(|u| u.username == username) else {
            tracing::warn!("Login failed: unknown user '{}'", username);
            return false;
        };

        if !verify_password(password, &user.password_hash) {
            tracing::warn!("Login failed: wrong password for '{}'", username);
            return false;
        }

        if user.status == UserStatus::Blocked {
            tracing::warn!("Login refused: account '{}' is blocked", username);
            return false;
        }

        user.last_login = Some(today);
        self.current = Some(user.username.clone());
        tracing::info!("User '{}' logged in as {}", username, user.role);
        true
    }

    /// Forget the signed-in user.
    pub fn logout(&mut self) {
        if let Some(username) = self.current.take() {
            tracing::info!("User '{}' logged out", username);
        }
    }

    /// The signed-in user, if any.
    pub fn current_user(&self) -> Option<&User> {
        let username = self.current.as_deref()?;
        self.find(username)
    }

    /// Whether the signed-in user's role grants `permission`.
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.current_user()
            .is_some_and(|user| user.role.allows(permission))
    }

    /// Fail with a permission error unless `has_permission`.
    pub fn require(&self, permission: Permission) -> Result<()> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            Err(AppError::permission(format!("'{permission}' is not granted")))
        }
    }

    /// Username of the protected administrator.
    pub fn primary_admin(&self) -> &str {
        &self.primary_admin
    }

    pub fn is_primary_admin(&self, username: &str) -> bool {
        self.primary_admin == username
    }

    /// Look up a user by username.
    pub fn find(&self, username: &str) -> Option<&User> {
        self.users.iter().find(|u| u.username == username)
    }

    /// All users. Requires `manage_users`.
    pub fn list_users(&self) -> Result<&[User]> {
        self.require_manage_users()?;
        Ok(&self.users)
    }

    /// Add a user. Requires `manage_users`; usernames are unique.
    pub fn add_user(&mut self, new: NewUser) -> Result<&User> {
        let user = self.prepare_add(new)?;
        Ok(self.store_user(user))
    }

    /// Update a user in place. Requires `manage_users`; the username never
    /// changes and the primary admin keeps the admin role.
    pub fn edit_user(&mut self, username: &str, update: UserUpdate) -> Result<&User> {
        let user = self.prepare_edit(username, update)?;
        Ok(self.store_user(user))
    }

    /// Remove a user. Requires `manage_users`; the primary admin and the
    /// signed-in user cannot be removed.
    pub fn delete_user(&mut self, username: &str) -> Result<User> {
        self.check_delete(username)?;
        self.remove_user(username)
            .ok_or_else(|| AppError::not_found(format!("User '{username}'")))
    }

    /// Validate a new account and build it without touching the roster.
    pub fn prepare_add(&self, new: NewUser) -> Result<User> {
        self.require_manage_users()?;

        let username = new.username.trim().to_string();
        if username.is_empty() {
            return Err(AppError::validation("Username cannot be empty"));
        }
        if new.password.is_empty() {
            return Err(AppError::validation("Password cannot be empty"));
        }
        if new.full_name.trim().is_empty() {
            return Err(AppError::validation("Full name cannot be empty"));
        }
        if self.find(&username).is_some() {
            return Err(AppError::validation(format!("User '{username}' already exists")));
        }

        Ok(User {
            id: None,
            username,
            password_hash: hash_password(&new.password),
            full_name: new.full_name.trim().to_string(),
            email: non_blank(new.email),
            specialization: doctor_only(new.role, new.specialization),
            role: new.role,
            status: UserStatus::Active,
            last_login: None,
        })
    }

    /// Return a copy of `username` with `update` applied. The roster is
    /// left unchanged.
    pub fn prepare_edit(&self, username: &str, update: UserUpdate) -> Result<User> {
        self.require_manage_users()?;

        let index = self.index_of(username)?;

        if self.is_primary_admin(username) {
            if update.role.is_some_and(|role| role != Role::Admin) {
                return Err(AppError::validation("Cannot change the role of the primary administrator"));
            }
            if update.status == Some(UserStatus::Blocked) {
                return Err(AppError::validation("Cannot block the primary administrator"));
            }
        }

        let mut user = self.users[index].clone();
        if let Some(full_name) = update.full_name {
            let full_name = full_name.trim().to_string();
            if full_name.is_empty() {
                return Err(AppError::validation("Full name cannot be empty"));
            }
            user.full_name = full_name;
        }
        if let Some(password) = update.password.filter(|p| !p.is_empty()) {
            user.password_hash = hash_password(&password);
        }
        if let Some(email) = update.email {
            user.email = non_blank(email);
        }
        if let Some(role) = update.role {
            user.role = role;
        }
        if let Some(specialization) = update.specialization {
            user.specialization = specialization;
        }
        user.specialization = doctor_only(user.role, user.specialization.take());
        if let Some(status) = update.status {
            user.status = status;
        }

        Ok(user)
    }

    /// Check that `username` may be removed, without removing it.
    pub fn check_delete(&self, username: &str) -> Result<()> {
        self.require_manage_users()?;

        self.index_of(username)?;

        if self.is_primary_admin(username) {
            return Err(AppError::validation("Cannot delete the primary administrator"));
        }
        if self.current.as_deref() == Some(username) {
            return Err(AppError::validation("You cannot delete your own account"));
        }
        Ok(())
    }

    /// Put a validated or stored user into the roster, replacing the entry
    /// with the same username.
    pub fn store_user(&mut self, user: User) -> &User {
        let index = match self.users.iter().position(|u| u.username == user.username) {
            Some(index) => {
                tracing::info!("Updated user '{}'", user.username);
                self.users[index] = user;
                index
            }
            None => {
                tracing::info!("Added user '{}' ({})", user.username, user.role);
                self.users.push(user);
                self.users.len() - 1
            }
        };
        &self.users[index]
    }

    /// Drop a user from the roster.
    pub fn remove_user(&mut self, username: &str) -> Option<User> {
        let index = self.users.iter().position(|u| u.username == username)?;
        tracing::info!("Deleted user '{}'", username);
        Some(self.users.remove(index))
    }

    fn require_manage_users(&self) -> Result<()> {
        if self.has_permission(Permission::ManageUsers) {
            Ok(())
        } else {
            Err(AppError::permission("Insufficient rights to manage users"))
        }
    }

    fn index_of(&self, username: &str) -> Result<usize> {
        self.users
            .iter()
            .position(|u| u.username == username)
            .ok_or_else(|| AppError::not_found(format!("User '{username}'")))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn doctor_only(role: Role, specialization: Option<String>) -> Option<String> {
    if role == Role::Doctor {
        non_blank(specialization)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(username: &str, password: &str, role: Role) -> User {
        User {
            id: None,
            username: username.to_string(),
            password_hash: hash_password(password),
            full_name: format!("{username} full name"),
            email: None,
            role,
            specialization: None,
            status: UserStatus::Active,
            last_login: None,
        }
    }

    fn manager() -> UserManager {
        UserManager::new(
            vec![
                user("admin", "admin123", Role::Admin),
                user("doctor1", "doc123", Role::Doctor),
                user("nurse1", "nurse123", Role::LabNurse),
            ],
            "admin",
        )
    }

    fn new_user(username: &str, role: Role) -> NewUser {
        NewUser {
            username: username.to_string(),
            password: "secret".to_string(),
            full_name: "New Person".to_string(),
            email: None,
            role,
            specialization: Some("Therapist".to_string()),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 27).unwrap()
    }

    #[test]
    fn test_login_success_stamps_last_login() {
        let mut users = manager();
        assert!(users.login_on("doctor1", "doc123", today()));

        let current = users.current_user().unwrap();
        assert_eq!(current.username, "doctor1");
        assert_eq!(current.last_login, Some(today()));
    }

    #[test]
    fn test_login_failure_keeps_state() {
        let mut users = manager();
        assert!(!users.login_on("doctor1", "wrong", today()));
        assert!(!users.login_on("ghost", "doc123", today()));
        assert!(users.current_user().is_none());
        assert_eq!(users.find("doctor1").unwrap().last_login, None);
    }

    #[test]
    fn test_blocked_user_cannot_login() {
        let mut users = manager();
        assert!(users.login_on("admin", "admin123", today()));
        users
            .edit_user(
                "nurse1",
                UserUpdate {
                    status: Some(UserStatus::Blocked),
                    ..Default::default()
                },
            )
            .unwrap();
        users.logout();

        assert!(!users.login_on("nurse1", "nurse123", today()));
    }

    #[test]
    fn test_unauthenticated_has_no_permissions() {
        let users = manager();
        for permission in Permission::ALL {
            assert!(!users.has_permission(permission));
        }
        assert!(matches!(
            users.require(Permission::ViewPatients),
            Err(AppError::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_permissions_follow_role_table() {
        let mut users = manager();
        users.login_on("nurse1", "nurse123", today());
        for permission in Permission::ALL {
            assert_eq!(
                users.has_permission(permission),
                role_permissions(Role::LabNurse).contains(&permission)
            );
        }
    }

    #[test]
    fn test_management_requires_permission() {
        let mut users = manager();
        users.login_on("doctor1", "doc123", today());

        assert!(matches!(
            users.add_user(new_user("x", Role::Doctor)),
            Err(AppError::PermissionDenied(_))
        ));
        assert!(matches!(
            users.edit_user("nurse1", UserUpdate::default()),
            Err(AppError::PermissionDenied(_))
        ));
        assert!(matches!(users.delete_user("nurse1"), Err(AppError::PermissionDenied(_))));
        assert!(users.list_users().is_err());
    }

    #[test]
    fn test_add_user_enforces_unique_username() {
        let mut users = manager();
        users.login_on("admin", "admin123", today());

        assert!(matches!(
            users.add_user(new_user("doctor1", Role::Doctor)),
            Err(AppError::Validation(_))
        ));

        let added = users.add_user(new_user("doctor2", Role::Doctor)).unwrap();
        assert_eq!(added.specialization.as_deref(), Some("Therapist"));
        assert!(users.login_on("doctor2", "secret", today()));
    }

    #[test]
    fn test_add_user_drops_specialization_for_non_doctors() {
        let mut users = manager();
        users.login_on("admin", "admin123", today());
        let added = users.add_user(new_user("lab2", Role::LabNurse)).unwrap();
        assert_eq!(added.specialization, None);
    }

    #[test]
    fn test_add_user_rejects_blank_fields() {
        let mut users = manager();
        users.login_on("admin", "admin123", today());

        let mut blank_name = new_user("y", Role::Doctor);
        blank_name.full_name = "  ".to_string();
        assert!(users.add_user(blank_name).is_err());

        let mut blank_password = new_user("z", Role::Doctor);
        blank_password.password = String::new();
        assert!(users.add_user(blank_password).is_err());

        assert!(users.add_user(new_user(" ", Role::Doctor)).is_err());
    }

    #[test]
    fn test_primary_admin_role_is_protected() {
        let mut users = manager();
        users.login_on("admin", "admin123", today());

        let result = users.edit_user(
            "admin",
            UserUpdate {
                role: Some(Role::Doctor),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(users.find("admin").unwrap().role, Role::Admin);

        let renamed = users
            .edit_user(
                "admin",
                UserUpdate {
                    full_name: Some("Chief Administrator".to_string()),
                    role: Some(Role::Admin),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(renamed.full_name, "Chief Administrator");
    }

    #[test]
    fn test_other_admins_can_be_demoted_and_deleted() {
        let mut users = manager();
        users.login_on("admin", "admin123", today());
        users.add_user(new_user("admin2", Role::Admin)).unwrap();

        users
            .edit_user(
                "admin2",
                UserUpdate {
                    role: Some(Role::Doctor),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(users.find("admin2").unwrap().role, Role::Doctor);
        assert!(users.delete_user("admin2").is_ok());
    }

    #[test]
    fn test_edit_keeps_password_when_blank() {
        let mut users = manager();
        users.login_on("admin", "admin123", today());

        users
            .edit_user(
                "doctor1",
                UserUpdate {
                    password: Some(String::new()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(users.login_on("doctor1", "doc123", today()));
    }

    #[test]
    fn test_edit_unknown_user() {
        let mut users = manager();
        users.login_on("admin", "admin123", today());
        assert!(matches!(
            users.edit_user("ghost", UserUpdate::default()),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_primary_admin_cannot_be_deleted() {
        let mut users = manager();
        users.login_on("admin", "admin123", today());
        assert!(matches!(users.delete_user("admin"), Err(AppError::Validation(_))));
        assert!(users.find("admin").is_some());
    }

    #[test]
    fn test_cannot_delete_own_account() {
        let mut users = manager();
        users.login_on("admin", "admin123", today());
        users.add_user(new_user("admin2", Role::Admin)).unwrap();
        users.logout();
        users.login_on("admin2", "secret", today());

        assert!(matches!(users.delete_user("admin2"), Err(AppError::Validation(_))));
        let removed = users.delete_user("nurse1").unwrap();
        assert_eq!(removed.username, "nurse1");
        assert!(users.find("nurse1").is_none());
    }

    #[test]
    fn test_logout_revokes_permissions() {
        let mut users = manager();
        users.login_on("admin", "admin123", today());
        assert!(users.has_permission(Permission::ManageUsers));
        users.logout();
        assert!(!users.has_permission(Permission::ManageUsers));
    }

    #[test]
    fn test_unauthenticated_management_rejected() {
        let mut users = manager();

        assert!(matches!(
            users.add_user(new_user("x", Role::Doctor)),
            Err(AppError::PermissionDenied(_))
        ));
        assert!(matches!(
            users.edit_user("nurse1", UserUpdate::default()),
            Err(AppError::PermissionDenied(_))
        ));
        assert!(matches!(users.delete_user("nurse1"), Err(AppError::PermissionDenied(_))));
        assert!(matches!(users.list_users(), Err(AppError::PermissionDenied(_))));
        assert!(users.find("x").is_none());
        assert!(users.find("nurse1").is_some());
    }

    #[test]
    fn test_prepare_steps_leave_roster_unchanged() {
        let mut users = manager();
        users.login_on("admin", "admin123", today());

        let prepared = users.prepare_add(new_user("doctor2", Role::Doctor)).unwrap();
        assert_eq!(prepared.username, "doctor2");
        assert!(users.find("doctor2").is_none());

        let edited = users
            .prepare_edit(
                "nurse1",
                UserUpdate {
                    status: Some(UserStatus::Blocked),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(edited.status, UserStatus::Blocked);
        assert_eq!(users.find("nurse1").unwrap().status, UserStatus::Active);

        users.check_delete("nurse1").unwrap();
        assert!(users.find("nurse1").is_some());
    }

    #[test]
    fn test_store_user_replaces_by_username() {
        let mut users = manager();
        users.login_on("admin", "admin123", today());

        let mut stored = users.prepare_add(new_user("doctor2", Role::Doctor)).unwrap();
        stored.id = Some(7);
        users.store_user(stored.clone());
        assert_eq!(users.list_users().unwrap().len(), 4);

        stored.full_name = "Renamed".to_string();
        users.store_user(stored);
        assert_eq!(users.list_users().unwrap().len(), 4);
        let found = users.find("doctor2").unwrap();
        assert_eq!(found.id, Some(7));
        assert_eq!(found.full_name, "Renamed");

        assert!(users.remove_user("doctor2").is_some());
        assert!(users.remove_user("doctor2").is_none());
    }
}
