//! Catalog synchronization engine.
//!
//! Reconciles periodic scraped catalog dumps (courses, sections, professors,
//! subjects) into a canonical Postgres store. Entities are addressed by a
//! deterministic key derived from their identifying attributes, writes are
//! chunked idempotent bulk upserts, and courses that stop appearing in fresh
//! dumps are pruned once their update timestamp goes stale.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod dump;
pub mod logging;
pub mod store;
pub mod sync;
