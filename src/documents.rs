//! Document templates and the in-memory list of created documents.

use std::collections::BTreeMap;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::user::{Role, User};

/// A named document shape with its fields and the roles that may fill it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub fields: &'static [&'static str],
    pub allowed_roles: &'static [Role],
}

impl DocumentTemplate {
    pub fn allows(&self, role: Role) -> bool {
        self.allowed_roles.contains(&role)
    }
}

/// Static template registry.
pub const TEMPLATES: &[DocumentTemplate] = &[
    DocumentTemplate {
        id: "medical_report",
        name: "Medical report",
        fields: &["patient_name", "diagnosis", "treatment", "doctor_name", "date"],
        allowed_roles: &[Role::Admin, Role::Doctor, Role::LabNurse],
    },
    DocumentTemplate {
        id: "prescription",
        name: "Prescription",
        fields: &["patient_name", "medications", "dosage", "period", "doctor_name", "date"],
        allowed_roles: &[Role::Admin, Role::Doctor],
    },
    DocumentTemplate {
        id: "sick_leave",
        name: "Sick leave certificate",
        fields: &["patient_name", "diagnosis", "start_date", "end_date", "doctor_name"],
        allowed_roles: &[Role::Admin, Role::Doctor],
    },
    DocumentTemplate {
        id: "analysis_report",
        name: "Analysis report",
        fields: &[
            "patient_name",
            "analysis_type",
            "results",
            "norm_values",
            "date",
            "lab_technician",
        ],
        allowed_roles: &[Role::Admin, Role::Doctor, Role::LabNurse],
    },
];

/// Look up a template by id.
pub fn template(id: &str) -> Option<&'static DocumentTemplate> {
    TEMPLATES.iter().find(|t| t.id == id)
}

/// Templates a role may fill, in registry order.
pub fn templates_for_role(role: Role) -> Vec<&'static DocumentTemplate> {
    TEMPLATES.iter().filter(|t| t.allows(role)).collect()
}

/// Human label for a field id: `start_date` → `Start Date`.
pub fn field_label(field: &str) -> String {
    field
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    #[default]
    Draft,
}

/// A filled-in document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Template id.
    pub kind: String,
    pub name: String,
    pub data: BTreeMap<String, String>,
    pub created_at: NaiveDate,
    pub status: DocumentStatus,
    pub created_by: Option<String>,
}

impl Document {
    /// The template this document was created from.
    pub fn template(&self) -> Option<&'static DocumentTemplate> {
        template(&self.kind)
    }

    /// Template fields that are absent or blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        self.template()
            .map(|t| {
                t.fields
                    .iter()
                    .copied()
                    .filter(|f| self.data.get(*f).is_none_or(|v| v.trim().is_empty()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Documents created during this session.
#[derive(Debug, Clone, Default)]
pub struct DocumentManager {
    documents: Vec<Document>,
}

impl DocumentManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a draft from a registered template, dated today.
    pub fn create_document(&mut self, template_id: &str, data: BTreeMap<String, String>) -> Result<&Document> {
        self.create_document_on(template_id, data, Local::now().date_naive())
    }

    /// Create a draft from a registered template, dated `today`.
    pub fn create_document_on(
        &mut self,
        template_id: &str,
        data: BTreeMap<String, String>,
        today: NaiveDate,
    ) -> Result<&Document> {
        let template = template(template_id)
            .ok_or_else(|| AppError::validation(format!("Unknown document type: {template_id}")))?;

        self.documents.push(Document {
            kind: template.id.to_string(),
            name: template.name.to_string(),
            data,
            created_at: today,
            status: DocumentStatus::Draft,
            created_by: None,
        });
        tracing::info!("Created document '{}'", template.name);
        Ok(&self.documents[self.documents.len() - 1])
    }

    /// Create a draft on behalf of `user`, checking the template's role list
    /// and recording the author.
    pub fn create_for_user(
        &mut self,
        user: &User,
        template_id: &str,
        mut data: BTreeMap<String, String>,
    ) -> Result<&Document> {
        let template = template(template_id)
            .ok_or_else(|| AppError::validation(format!("Unknown document type: {template_id}")))?;
        if !template.allows(user.role) {
            return Err(AppError::permission(format!(
                "{} cannot create '{}'",
                user.role, template.name
            )));
        }

        data.insert("created_by".to_string(), user.username.clone());
        data.insert("created_by_role".to_string(), user.role.code().to_string());

        self.create_document(template_id, data)?;
        let index = self.documents.len() - 1;
        self.documents[index].created_by = Some(user.username.clone());
        Ok(&self.documents[index])
    }

    /// All documents in creation order.
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Documents authored by `username`.
    pub fn documents_by(&self, username: &str) -> Vec<&Document> {
        self.documents
            .iter()
            .filter(|d| d.created_by.as_deref() == Some(username))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::UserStatus;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 27).unwrap()
    }

    fn staff(role: Role) -> User {
        User {
            id: Some(1),
            username: "nurse1".to_string(),
            password_hash: String::new(),
            full_name: "Maria Ivanova".to_string(),
            email: None,
            role,
            specialization: None,
            status: UserStatus::Active,
            last_login: None,
        }
    }

    #[test]
    fn test_create_document_stamps_draft() {
        let mut manager = DocumentManager::new();
        let data = BTreeMap::from([("patient_name".to_string(), "Ivan Ivanov".to_string())]);

        let doc = manager.create_document_on("prescription", data, today()).unwrap();
        assert_eq!(doc.name, "Prescription");
        assert_eq!(doc.status, DocumentStatus::Draft);
        assert_eq!(doc.created_at, today());
        assert_eq!(manager.documents().len(), 1);
    }

    #[test]
    fn test_unknown_template_rejected() {
        let mut manager = DocumentManager::new();
        let result = manager.create_document_on("death_certificate", BTreeMap::new(), today());
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(manager.documents().is_empty());
    }

    #[test]
    fn test_templates_for_role() {
        let nurse: Vec<_> = templates_for_role(Role::LabNurse).iter().map(|t| t.id).collect();
        assert_eq!(nurse, vec!["medical_report", "analysis_report"]);
        assert_eq!(templates_for_role(Role::Admin).len(), TEMPLATES.len());
    }

    #[test]
    fn test_create_for_user_checks_role() {
        let mut manager = DocumentManager::new();
        let nurse = staff(Role::LabNurse);

        let denied = manager.create_for_user(&nurse, "sick_leave", BTreeMap::new());
        assert!(matches!(denied, Err(AppError::PermissionDenied(_))));

        let doc = manager
            .create_for_user(&nurse, "medical_report", BTreeMap::new())
            .unwrap();
        assert_eq!(doc.created_by.as_deref(), Some("nurse1"));
        assert_eq!(doc.data.get("created_by_role").map(String::as_str), Some("lab"));
        assert_eq!(manager.documents_by("nurse1").len(), 1);
    }

    #[test]
    fn test_missing_fields() {
        let mut manager = DocumentManager::new();
        let data = BTreeMap::from([
            ("patient_name".to_string(), "Ivan Ivanov".to_string()),
            ("diagnosis".to_string(), " ".to_string()),
        ]);
        let doc = manager.create_document_on("medical_report", data, today()).unwrap();
        assert_eq!(doc.missing_fields(), vec!["diagnosis", "treatment", "doctor_name", "date"]);
    }

    #[test]
    fn test_field_label() {
        assert_eq!(field_label("start_date"), "Start Date");
        assert_eq!(field_label("norm_values"), "Norm Values");
    }
}
