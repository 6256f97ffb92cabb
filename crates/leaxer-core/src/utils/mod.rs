//! Small shared helpers with no business logic of their own.

pub mod ids;

pub use ids::new_job_id;
