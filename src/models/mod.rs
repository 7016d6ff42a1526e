//! Data models for users, patients and analysis results.

pub mod analysis;
pub mod patient;
pub mod user;

pub use analysis::{AnalysisFilter, AnalysisResultRow, AnalysisStatus, ResultData, status_label};
pub use patient::{CreatePatient, PatientRow, UpdatePatient};
pub use user::{NewUser, Role, User, UserStatus, UserUpdate};
