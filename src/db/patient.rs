//! Patient repository with CRUD operations.

use chrono::Local;
use sea_orm::*;

use crate::entities::{patients, prelude::*};
use crate::models::patient::{CreatePatient, UpdatePatient};

/// List all patients ordered by name.
pub async fn list_all(db: &DatabaseConnection) -> Result<Vec<patients::Model>, DbErr> {
    Patients::find()
        .order_by_asc(patients::Column::FullName)
        .all(db)
        .await
}

/// Search by name, phone or email, case-insensitively. A blank query
/// lists everyone.
///
/// SQLite `lower()` and `LIKE` only fold ASCII, so matching runs in Rust.
pub async fn search(db: &DatabaseConnection, query: &str) -> Result<Vec<patients::Model>, DbErr> {
    let query = query.trim().to_lowercase();
    let patients = list_all(db).await?;
    if query.is_empty() {
        return Ok(patients);
    }

    Ok(patients.into_iter().filter(|p| matches_query(p, &query)).collect())
}

/// `query` must already be lowercased.
fn matches_query(patient: &patients::Model, query: &str) -> bool {
    let contains = |value: &str| value.to_lowercase().contains(query);
    contains(&patient.full_name)
        || patient.phone.as_deref().is_some_and(contains)
        || patient.email.as_deref().is_some_and(contains)
}

/// Get patient by ID.
pub async fn get_by_id(db: &DatabaseConnection, id: i32) -> Result<Option<patients::Model>, DbErr> {
    Patients::find_by_id(id).one(db).await
}

/// Create a new patient.
pub async fn create(db: &DatabaseConnection, data: CreatePatient) -> Result<patients::Model, DbErr> {
    let model = patients::ActiveModel {
        full_name: Set(data.full_name),
        birth_date: Set(data.birth_date),
        gender: Set(data.gender),
        phone: Set(data.phone),
        email: Set(data.email),
        address: Set(data.address),
        diagnosis: Set(data.diagnosis),
        status: Set(data.status),
        admitted_on: Set(data.admitted_on),
        created_at: Set(Local::now().naive_local()),
        ..Default::default()
    };
    model.insert(db).await
}

/// Update an existing patient.
pub async fn update(db: &DatabaseConnection, id: i32, data: UpdatePatient) -> Result<Option<patients::Model>, DbErr> {
    let existing = Patients::find_by_id(id).one(db).await?;

    match existing {
        Some(model) => {
            let mut active: patients::ActiveModel = model.into();

            if let Some(full_name) = data.full_name {
                active.full_name = Set(full_name);
            }
            if let Some(birth_date) = data.birth_date {
                active.birth_date = Set(birth_date);
            }
            if let Some(gender) = data.gender {
                active.gender = Set(gender);
            }
            if let Some(phone) = data.phone {
                active.phone = Set(phone);
            }
            if let Some(email) = data.email {
                active.email = Set(email);
            }
            if let Some(address) = data.address {
                active.address = Set(address);
            }
            if let Some(diagnosis) = data.diagnosis {
                active.diagnosis = Set(diagnosis);
            }
            if let Some(status) = data.status {
                active.status = Set(status);
            }

            let updated = active.update(db).await?;
            Ok(Some(updated))
        }
        None => Ok(None),
    }
}

/// Delete a patient by ID.
pub async fn delete(db: &DatabaseConnection, id: i32) -> Result<bool, DbErr> {
    let result = Patients::delete_by_id(id).exec(db).await?;
    Ok(result.rows_affected > 0)
}

/// Count all patients.
pub async fn count(db: &DatabaseConnection) -> Result<u64, DbErr> {
    Patients::find().count(db).await
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::db::test_support;
    use crate::models::patient::status;

    fn new_patient(name: &str, phone: &str) -> CreatePatient {
        CreatePatient {
            full_name: name.to_string(),
            birth_date: NaiveDate::from_ymd_opt(1980, 5, 12),
            gender: Some("M".to_string()),
            phone: Some(phone.to_string()),
            email: None,
            address: None,
            diagnosis: "Flu".to_string(),
            status: status::IN_TREATMENT.to_string(),
            admitted_on: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_create_and_search() {
        let (_dir, db) = test_support::open().await;
        create(&db, new_patient("Ivan Ivanov", "+7 900 111-22-33")).await.unwrap();
        create(&db, new_patient("Petr Sidorov", "+7 900 444-55-66")).await.unwrap();

        assert_eq!(count(&db).await.unwrap(), 2);
        assert_eq!(search(&db, "ivan").await.unwrap().len(), 1);
        assert_eq!(search(&db, "444").await.unwrap()[0].full_name, "Petr Sidorov");
        assert_eq!(search(&db, "  ").await.unwrap().len(), 2);
        assert!(search(&db, "nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_folds_cyrillic_case() {
        let (_dir, db) = test_support::open().await;
        create(&db, new_patient("Иванов Иван", "+7 900 111-22-33")).await.unwrap();
        create(&db, new_patient("Петров Пётр", "+7 900 444-55-66")).await.unwrap();

        assert_eq!(search(&db, "Иванов").await.unwrap().len(), 1);
        assert_eq!(search(&db, "иванов").await.unwrap().len(), 1);
        assert_eq!(search(&db, "ИВАН").await.unwrap()[0].full_name, "Иванов Иван");
    }

    #[tokio::test]
    async fn test_search_treats_wildcards_literally() {
        let (_dir, db) = test_support::open().await;
        create(&db, new_patient("Ivan Ivanov", "111")).await.unwrap();
        let mut with_email = new_patient("Anna_Smirnova", "222");
        with_email.email = Some("anna@clinic.ru".to_string());
        create(&db, with_email).await.unwrap();

        assert!(search(&db, "%").await.unwrap().is_empty());
        let found = search(&db, "_").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].full_name, "Anna_Smirnova");
        assert_eq!(search(&db, "CLINIC.RU").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (_dir, db) = test_support::open().await;
        let patient = create(&db, new_patient("Ivan Ivanov", "1")).await.unwrap();

        let updated = update(
            &db,
            patient.id,
            UpdatePatient {
                status: Some(status::DISCHARGED.to_string()),
                phone: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(updated.status, status::DISCHARGED);
        assert_eq!(updated.phone, None);
        assert_eq!(updated.diagnosis, "Flu");

        assert!(update(&db, 999, UpdatePatient::default()).await.unwrap().is_none());
        assert!(delete(&db, patient.id).await.unwrap());
        assert!(get_by_id(&db, patient.id).await.unwrap().is_none());
    }
}
