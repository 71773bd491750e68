//! Application services: directory reads, registry statistics, revalidation.

pub mod controls;
pub mod directory;
pub mod error;
pub mod repos;
pub mod retry;
pub mod revalidation;
pub mod stats;
