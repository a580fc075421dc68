//! Storage seam for the sync pipeline.
//!
//! The orchestrator is handed an explicit store client rather than reaching
//! for a process-wide singleton, so the whole pipeline runs unchanged against
//! Postgres in production and [`MemoryStore`] in tests.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgCatalogStore;

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::catalog::models::{Course, Professor, Section, Subject};

/// Conflict-aware bulk writes plus the handful of reads the sync run needs.
///
/// Upserts are full replace-on-conflict: every mutable column of an existing
/// row is overwritten with the incoming value, so a dump that omits a
/// previously-set field clears it. The one exception is
/// `Course::last_update_time`, which only [`refresh_course_timestamps`]
/// touches after the initial insert.
///
/// [`refresh_course_timestamps`]: CatalogStore::refresh_course_timestamps
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn upsert_courses(&self, courses: &[Course]) -> Result<()>;

    async fn upsert_sections(&self, sections: &[Section]) -> Result<()>;

    async fn upsert_professors(&self, professors: &[Professor]) -> Result<()>;

    async fn upsert_subjects(&self, subjects: &[Subject]) -> Result<()>;

    /// Snapshot of every course key currently persisted. Queried once per
    /// run, after courses are written, to filter orphaned sections.
    async fn course_keys(&self) -> Result<HashSet<String>>;

    /// Stamp `last_update_time = now` for the given course keys. Returns the
    /// number of courses updated.
    async fn refresh_course_timestamps(&self, keys: &[String], now: DateTime<Utc>) -> Result<u64>;

    /// Delete courses whose term is in `terms` and whose `last_update_time`
    /// predates `cutoff`. Scoping to covered terms is a safety invariant: a
    /// run for one term must never delete another term's courses. Returns
    /// the number of courses deleted; their sections go with them.
    async fn prune_stale_courses(&self, terms: &[String], cutoff: DateTime<Utc>) -> Result<u64>;
}
