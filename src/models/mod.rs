pub mod arctic;
pub mod sheets;
