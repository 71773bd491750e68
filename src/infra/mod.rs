//! Infrastructure adapters and runtime bootstrap.

pub mod db;
pub mod error;
pub mod http;
pub mod purge;
pub mod registry;
pub mod revalidate_client;
pub mod telemetry;
