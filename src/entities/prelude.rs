pub use super::analysis_results::Entity as AnalysisResults;
pub use super::analysis_types::Entity as AnalysisTypes;
pub use super::appointments::Entity as Appointments;
pub use super::doctors::Entity as Doctors;
pub use super::patients::Entity as Patients;
pub use super::users::Entity as Users;
