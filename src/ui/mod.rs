//! GUI panels and application state.

pub mod analysis_panel;
pub mod app;
pub mod components;
pub mod dashboard;
pub mod documents_panel;
pub mod login;
pub mod patients_panel;
pub mod reports_panel;
pub mod statistics_panel;
pub mod users_panel;

pub use app::App;
