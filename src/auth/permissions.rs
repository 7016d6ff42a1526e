//! Static role → capability table.

use std::fmt;
use std::str::FromStr;

use crate::error::AppError;
use crate::models::user::Role;

/// A capability checked before an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ViewPatients,
    AddPatient,
    EditPatient,
    DeletePatient,
    CreateReport,
    ManageUsers,
    ViewAllDocuments,
    CreateMedicalReport,
    CreatePrescription,
    CreateSickLeave,
    ViewStatistics,
    ExportData,
    ViewOwnDocuments,
    ViewAnalyses,
    SendResults,
}

impl Permission {
    pub const ALL: [Permission; 15] = [
        Permission::ViewPatients,
        Permission::AddPatient,
        Permission::EditPatient,
        Permission::DeletePatient,
        Permission::CreateReport,
        Permission::ManageUsers,
        Permission::ViewAllDocuments,
        Permission::CreateMedicalReport,
        Permission::CreatePrescription,
        Permission::CreateSickLeave,
        Permission::ViewStatistics,
        Permission::ExportData,
        Permission::ViewOwnDocuments,
        Permission::ViewAnalyses,
        Permission::SendResults,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ViewPatients => "view_patients",
            Permission::AddPatient => "add_patient",
            Permission::EditPatient => "edit_patient",
            Permission::DeletePatient => "delete_patient",
            Permission::CreateReport => "create_report",
            Permission::ManageUsers => "manage_users",
            Permission::ViewAllDocuments => "view_all_documents",
            Permission::CreateMedicalReport => "create_medical_report",
            Permission::CreatePrescription => "create_prescription",
            Permission::CreateSickLeave => "create_sick_leave",
            Permission::ViewStatistics => "view_statistics",
            Permission::ExportData => "export_data",
            Permission::ViewOwnDocuments => "view_own_documents",
            Permission::ViewAnalyses => "view_analyses",
            Permission::SendResults => "send_results",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| AppError::parse(format!("Unknown permission: {s}")))
    }
}

const ADMIN: &[Permission] = &[
    Permission::ViewPatients,
    Permission::AddPatient,
    Permission::EditPatient,
    Permission::DeletePatient,
    Permission::CreateReport,
    Permission::ManageUsers,
    Permission::ViewAllDocuments,
    Permission::CreateMedicalReport,
    Permission::CreatePrescription,
    Permission::CreateSickLeave,
    Permission::ViewStatistics,
    Permission::ExportData,
    Permission::ViewAnalyses,
    Permission::SendResults,
];

const DOCTOR: &[Permission] = &[
    Permission::ViewPatients,
    Permission::AddPatient,
    Permission::EditPatient,
    Permission::CreateMedicalReport,
    Permission::CreatePrescription,
    Permission::CreateSickLeave,
    Permission::ViewOwnDocuments,
    Permission::CreateReport,
    Permission::ViewAnalyses,
    Permission::SendResults,
];

const LAB_NURSE: &[Permission] = &[
    Permission::ViewPatients,
    Permission::AddPatient,
    Permission::CreateMedicalReport,
    Permission::ViewOwnDocuments,
    Permission::ViewAnalyses,
    Permission::SendResults,
];

/// Capabilities granted to a role.
pub fn role_permissions(role: Role) -> &'static [Permission] {
    match role {
        Role::Admin => ADMIN,
        Role::Doctor => DOCTOR,
        Role::LabNurse => LAB_NURSE,
    }
}

impl Role {
    /// Whether this role grants `permission`.
    pub fn allows(&self, permission: Permission) -> bool {
        role_permissions(*self).contains(&permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_admin_manages_users() {
        assert!(Role::Admin.allows(Permission::ManageUsers));
        assert!(!Role::Doctor.allows(Permission::ManageUsers));
        assert!(!Role::LabNurse.allows(Permission::ManageUsers));
    }

    #[test]
    fn test_doctor_capabilities() {
        assert!(Role::Doctor.allows(Permission::CreatePrescription));
        assert!(Role::Doctor.allows(Permission::CreateReport));
        assert!(!Role::Doctor.allows(Permission::DeletePatient));
        assert!(!Role::Doctor.allows(Permission::ExportData));
    }

    #[test]
    fn test_lab_nurse_capabilities() {
        assert!(Role::LabNurse.allows(Permission::AddPatient));
        assert!(!Role::LabNurse.allows(Permission::EditPatient));
        assert!(!Role::LabNurse.allows(Permission::CreateReport));
        assert!(!Role::LabNurse.allows(Permission::CreateSickLeave));
    }

    #[test]
    fn test_permission_names_parse() {
        assert_eq!("manage_users".parse::<Permission>().unwrap(), Permission::ManageUsers);
        assert!("fly".parse::<Permission>().is_err());
    }
}
