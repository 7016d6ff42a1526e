//! User repository: staff accounts and doctor specializations.

use std::collections::HashMap;

use chrono::NaiveDate;
use sea_orm::sea_query::Expr;
use sea_orm::*;

use crate::auth::hash_password;
use crate::entities::{doctors, prelude::*, users};
use crate::error::{AppError, Result};
use crate::models::user::{Role, User, UserStatus};

/// Accounts created in an empty database.
pub const DEFAULT_USERS: &[(&str, &str, &str, Role)] = &[
    ("admin", "admin123", "System Administrator", Role::Admin),
    ("doctor1", "doc123", "Ivan Petrov", Role::Doctor),
    ("nurse1", "nurse123", "Maria Ivanova", Role::LabNurse),
];

fn to_user(model: users::Model, specialization: Option<String>) -> Result<User> {
    Ok(User {
        id: Some(model.id),
        role: model.role.parse()?,
        status: model.status.parse()?,
        username: model.username,
        password_hash: model.password,
        full_name: model.full_name,
        email: model.email,
        specialization,
        last_login: model.last_login,
    })
}

/// List all users ordered by id, with doctor specializations attached.
pub async fn list_all(db: &DatabaseConnection) -> Result<Vec<User>> {
    let mut specializations: HashMap<i32, Option<String>> = Doctors::find()
        .all(db)
        .await?
        .into_iter()
        .map(|d| (d.user_id, d.specialization))
        .collect();

    Users::find()
        .order_by_asc(users::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(|model| {
            let specialization = specializations.remove(&model.id).flatten();
            to_user(model, specialization)
        })
        .collect()
}

/// Insert a user, plus a doctors row for doctors. Returns the stored user.
pub async fn create(db: &DatabaseConnection, user: &User) -> Result<User> {
    let model = users::ActiveModel {
        username: Set(user.username.clone()),
        password: Set(user.password_hash.clone()),
        full_name: Set(user.full_name.clone()),
        email: Set(user.email.clone()),
        role: Set(user.role.code().to_string()),
        status: Set(user.status.code().to_string()),
        last_login: Set(user.last_login),
        ..Default::default()
    };
    let inserted = model.insert(db).await?;

    if user.role == Role::Doctor {
        sync_doctor(db, inserted.id, Role::Doctor, user.specialization.clone()).await?;
    }

    to_user(inserted, user.specialization.clone())
}

/// Write back every mutable field of `user`, matched by username.
pub async fn update(db: &DatabaseConnection, user: &User) -> Result<User> {
    let existing = Users::find()
        .filter(users::Column::Username.eq(&user.username))
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found(format!("User '{}'", user.username)))?;

    let id = existing.id;
    let mut active: users::ActiveModel = existing.into();
    active.password = Set(user.password_hash.clone());
    active.full_name = Set(user.full_name.clone());
    active.email = Set(user.email.clone());
    active.role = Set(user.role.code().to_string());
    active.status = Set(user.status.code().to_string());
    active.last_login = Set(user.last_login);
    let updated = active.update(db).await?;

    sync_doctor(db, id, user.role, user.specialization.clone()).await?;

    to_user(updated, user.specialization.clone().filter(|_| user.role == Role::Doctor))
}

/// Keep the doctors row in step with the role: present for doctors,
/// absent for everyone else.
async fn sync_doctor(
    db: &DatabaseConnection,
    user_id: i32,
    role: Role,
    specialization: Option<String>,
) -> Result<()> {
    let existing = Doctors::find()
        .filter(doctors::Column::UserId.eq(user_id))
        .one(db)
        .await?;

    match (role, existing) {
        (Role::Doctor, Some(doctor)) => {
            let mut active: doctors::ActiveModel = doctor.into();
            active.specialization = Set(specialization);
            active.update(db).await?;
        }
        (Role::Doctor, None) => {
            doctors::ActiveModel {
                user_id: Set(user_id),
                specialization: Set(specialization),
                ..Default::default()
            }
            .insert(db)
            .await?;
        }
        (_, Some(doctor)) => {
            Doctors::delete_by_id(doctor.id).exec(db).await?;
        }
        (_, None) => {}
    }
    Ok(())
}

/// Delete a user and their doctors row.
pub async fn delete(db: &DatabaseConnection, username: &str) -> Result<bool> {
    let Some(model) = Users::find()
        .filter(users::Column::Username.eq(username))
        .one(db)
        .await?
    else {
        return Ok(false);
    };

    Doctors::delete_many()
        .filter(doctors::Column::UserId.eq(model.id))
        .exec(db)
        .await?;
    let result = Users::delete_by_id(model.id).exec(db).await?;
    Ok(result.rows_affected > 0)
}

/// Stamp the last login date.
pub async fn record_login(db: &DatabaseConnection, username: &str, date: NaiveDate) -> Result<()> {
    Users::update_many()
        .col_expr(users::Column::LastLogin, Expr::value(date))
        .filter(users::Column::Username.eq(username))
        .exec(db)
        .await?;
    Ok(())
}

/// Create the default roster when there are no users. Returns the number
/// of users created.
pub async fn seed_defaults_if_empty(db: &DatabaseConnection) -> Result<usize> {
    if Users::find().count(db).await? > 0 {
        return Ok(0);
    }

    for (username, password, full_name, role) in DEFAULT_USERS {
        let user = User {
            id: None,
            username: String::from(*username),
            password_hash: hash_password(password),
            full_name: String::from(*full_name),
            email: None,
            role: *role,
            specialization: (*role == Role::Doctor).then(|| "Therapist".to_string()),
            status: UserStatus::Active,
            last_login: None,
        };
        create(db, &user).await?;
    }

    tracing::info!("Seeded {} default users", DEFAULT_USERS.len());
    Ok(DEFAULT_USERS.len())
}
