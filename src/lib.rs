pub mod auth;
pub mod config;
pub mod db;
pub mod documents;
pub mod email;
pub mod entities;
pub mod error;
pub mod export;
pub mod models;
pub mod reference;
pub mod report;
pub mod ui;

pub use error::{AppError, Result};
