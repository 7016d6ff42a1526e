//! SeaORM entities mirroring the clinic schema.

pub mod prelude;

pub mod analysis_results;
pub mod analysis_types;
pub mod appointments;
pub mod doctors;
pub mod patients;
pub mod users;
