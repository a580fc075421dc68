//! Sync run orchestration.
//!
//! One run is a strict sequence: professors, courses, sections (normalized,
//! referentially filtered, then written), course timestamp refresh, subjects,
//! optional staleness pruning, reindex signal. Each stage's chunk writes are
//! fully awaited before the next stage begins, because later stages rely on
//! guarantees the earlier ones establish. A store failure anywhere is fatal
//! to the run; nothing is rolled back, and rerunning the dump reconciles any
//! gap.

pub mod batch;

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::catalog::models::{Course, Section, Subject};
use crate::catalog::normalize;
use crate::dump::{RawProfessor, TermDump};
use crate::store::CatalogStore;
use crate::sync::batch::upsert_in_chunks;

/// Default records per bulk-write chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 2000;

/// Default hours a course may go without a timestamp refresh before pruning
/// treats it as no longer offered.
pub const DEFAULT_STALE_AFTER_HOURS: u64 = 48;

/// Capability for telling the downstream search-index builder that catalog
/// data changed. Injected so the pipeline can run without a real index.
#[async_trait]
pub trait ReindexSignal: Send + Sync {
    async fn rebuild_index(&self) -> Result<()>;
}

/// Reindex signal that only records the request in the log.
pub struct LoggingReindex;

#[async_trait]
impl ReindexSignal for LoggingReindex {
    async fn rebuild_index(&self) -> Result<()> {
        info!("search reindex signalled");
        Ok(())
    }
}

/// Reindex signal that does nothing.
pub struct NoopReindex;

#[async_trait]
impl ReindexSignal for NoopReindex {
    async fn rebuild_index(&self) -> Result<()> {
        Ok(())
    }
}

/// Tunables for one run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub chunk_size: usize,
    pub stale_after: Duration,
    /// Whether to prune stale courses in the dump's terms at the end of the
    /// run. Destructive.
    pub prune: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            stale_after: Duration::hours(DEFAULT_STALE_AFTER_HOURS as i64),
            prune: false,
        }
    }
}

/// Per-run counters, logged on completion.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncStats {
    pub professors_upserted: usize,
    pub professors_invalid: usize,
    pub courses_upserted: usize,
    pub courses_invalid: usize,
    pub sections_received: usize,
    pub sections_invalid: usize,
    pub sections_filtered: usize,
    pub sections_upserted: usize,
    pub subjects_upserted: usize,
    pub courses_stamped: u64,
    pub courses_pruned: u64,
}

pub struct Orchestrator {
    store: Arc<dyn CatalogStore>,
    reindex: Arc<dyn ReindexSignal>,
    options: SyncOptions,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        reindex: Arc<dyn ReindexSignal>,
        options: SyncOptions,
    ) -> Self {
        Self {
            store,
            reindex,
            options,
        }
    }

    /// Run one full sync of a term dump plus professor dump.
    pub async fn run(&self, dump: &TermDump, professors: &[RawProfessor]) -> Result<SyncStats> {
        let now = Utc::now();
        let chunk_size = self.options.chunk_size;
        let mut stats = SyncStats::default();

        // Professors.
        let mut profs = Vec::with_capacity(professors.len());
        for raw in professors {
            match normalize::normalize_professor(raw) {
                Ok(p) => profs.push(p),
                Err(e) => {
                    stats.professors_invalid += 1;
                    warn!(error = %e, "dropping malformed professor record");
                }
            }
        }
        upsert_in_chunks(&profs, chunk_size, |chunk| {
            self.store.upsert_professors(chunk)
        })
        .await
        .context("failed to upsert professors")?;
        stats.professors_upserted = profs.len();
        info!(
            count = profs.len(),
            invalid = stats.professors_invalid,
            "professors upserted"
        );

        // Courses.
        let mut courses = Vec::with_capacity(dump.classes.len());
        for raw in dump.classes.values() {
            match normalize::normalize_course(raw, now) {
                Ok(c) => courses.push(c),
                Err(e) => {
                    stats.courses_invalid += 1;
                    warn!(error = %e, "dropping malformed course record");
                }
            }
        }
        let covered_terms = covered_terms(&courses);
        upsert_in_chunks(&courses, chunk_size, |chunk| {
            self.store.upsert_courses(chunk)
        })
        .await
        .context("failed to upsert courses")?;
        stats.courses_upserted = courses.len();
        info!(
            count = courses.len(),
            invalid = stats.courses_invalid,
            terms = ?covered_terms,
            "courses upserted"
        );

        // Sections: normalize, drop those whose course is absent, write.
        stats.sections_received = dump.sections.len();
        let mut sections = Vec::with_capacity(dump.sections.len());
        for raw in &dump.sections {
            match normalize::normalize_section(raw, now) {
                Ok(s) => sections.push(s),
                Err(e) => {
                    stats.sections_invalid += 1;
                    warn!(error = %e, "dropping malformed section record");
                }
            }
        }

        let known = self
            .store
            .course_keys()
            .await
            .context("failed to fetch known course keys")?;
        let before = sections.len();
        let sections = filter_orphaned_sections(sections, &known);
        stats.sections_filtered = before - sections.len();
        if stats.sections_filtered > 0 {
            info!(
                dropped = stats.sections_filtered,
                "filtered sections referencing unknown courses"
            );
        }

        upsert_in_chunks(&sections, chunk_size, |chunk| {
            self.store.upsert_sections(chunk)
        })
        .await
        .context("failed to upsert sections")?;
        stats.sections_upserted = sections.len();
        info!(
            count = sections.len(),
            invalid = stats.sections_invalid,
            filtered = stats.sections_filtered,
            "sections upserted"
        );

        // A course counts as currently offered only when one of its sections
        // was just processed.
        let touched = touched_course_keys(&sections);
        stats.courses_stamped = self
            .store
            .refresh_course_timestamps(&touched, now)
            .await
            .context("failed to refresh course timestamps")?;
        info!(count = stats.courses_stamped, "course timestamps refreshed");

        // Subjects.
        let subjects: Vec<Subject> = dump
            .subjects
            .iter()
            .filter(|(abbreviation, _)| !abbreviation.is_empty())
            .map(|(abbreviation, description)| Subject {
                abbreviation: abbreviation.clone(),
                description: description.clone(),
            })
            .collect();
        upsert_in_chunks(&subjects, chunk_size, |chunk| {
            self.store.upsert_subjects(chunk)
        })
        .await
        .context("failed to upsert subjects")?;
        stats.subjects_upserted = subjects.len();
        info!(count = subjects.len(), "subjects upserted");

        // Pruning runs strictly after the timestamp refresh and only touches
        // the dump's own terms.
        if self.options.prune {
            let cutoff = now - self.options.stale_after;
            stats.courses_pruned = self
                .store
                .prune_stale_courses(&covered_terms, cutoff)
                .await
                .context("failed to prune stale courses")?;
            info!(
                count = stats.courses_pruned,
                terms = ?covered_terms,
                "stale courses pruned"
            );
        }

        self.reindex
            .rebuild_index()
            .await
            .context("failed to signal search reindex")?;

        info!(
            professors = stats.professors_upserted,
            courses = stats.courses_upserted,
            sections = stats.sections_upserted,
            subjects = stats.subjects_upserted,
            stamped = stats.courses_stamped,
            pruned = stats.courses_pruned,
            "catalog sync complete"
        );
        Ok(stats)
    }
}

/// Distinct terms this dump covers, from its course records.
fn covered_terms(courses: &[Course]) -> Vec<String> {
    let mut terms: Vec<String> = courses.iter().map(|c| c.term_id.clone()).collect();
    terms.sort();
    terms.dedup();
    terms
}

/// Keep only sections whose owning course is known to the store. Dropped
/// sections are expected to reappear once their course does.
fn filter_orphaned_sections(sections: Vec<Section>, known: &HashSet<String>) -> Vec<Section> {
    sections
        .into_iter()
        .filter(|s| known.contains(&s.class_hash))
        .collect()
}

/// Distinct owning-course keys of the sections just written.
fn touched_course_keys(sections: &[Section]) -> Vec<String> {
    let mut keys: Vec<String> = sections.iter().map(|s| s.class_hash.clone()).collect();
    keys.sort();
    keys.dedup();
    keys
}
