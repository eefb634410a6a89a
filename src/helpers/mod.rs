pub mod arctic;
pub mod email;
pub mod enrich;
pub mod schedule;
pub mod sheets;
