pub mod backup;
pub mod core;
pub mod cycle;
pub mod metrics;
pub mod records;
pub mod reports;
pub mod settings;
