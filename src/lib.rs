//! uidir: a directory service for UI component libraries.
//!
//! Listings and details come from Postgres through retry-wrapped repositories
//! and short-lived in-memory caches; per-package registry statistics are
//! cached in memory and in a durable table; a bearer-protected endpoint fans
//! revalidation out to the hosting platform's purge backend.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
