//! In-memory catalog store.
//!
//! Implements the same replace-on-conflict semantics as the Postgres store
//! (including the preserved course timestamp and the section cascade on
//! prune) so the whole pipeline can be exercised without a database.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::catalog::models::{Course, Professor, Section, Subject};
use crate::store::CatalogStore;

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    courses: HashMap<String, Course>,
    sections: HashMap<String, Section>,
    professors: HashMap<String, Professor>,
    subjects: HashMap<String, Subject>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn course(&self, id: &str) -> Option<Course> {
        self.inner.lock().await.courses.get(id).cloned()
    }

    pub async fn section(&self, id: &str) -> Option<Section> {
        self.inner.lock().await.sections.get(id).cloned()
    }

    /// All courses, ordered by key.
    pub async fn courses(&self) -> Vec<Course> {
        let inner = self.inner.lock().await;
        let mut out: Vec<Course> = inner.courses.values().cloned().collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    /// All sections, ordered by key.
    pub async fn sections(&self) -> Vec<Section> {
        let inner = self.inner.lock().await;
        let mut out: Vec<Section> = inner.sections.values().cloned().collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    /// All professors, ordered by id.
    pub async fn professors(&self) -> Vec<Professor> {
        let inner = self.inner.lock().await;
        let mut out: Vec<Professor> = inner.professors.values().cloned().collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    /// All subjects, ordered by abbreviation.
    pub async fn subjects(&self) -> Vec<Subject> {
        let inner = self.inner.lock().await;
        let mut out: Vec<Subject> = inner.subjects.values().cloned().collect();
        out.sort_by(|a, b| a.abbreviation.cmp(&b.abbreviation));
        out
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn upsert_courses(&self, courses: &[Course]) -> Result<()> {
        let mut inner = self.inner.lock().await;
        for course in courses {
            inner
                .courses
                .entry(course.id.clone())
                .and_modify(|existing| {
                    // Full replace, except the timestamp: only the tracker
                    // refreshes it.
                    let kept = existing.last_update_time;
                    *existing = course.clone();
                    existing.last_update_time = kept;
                })
                .or_insert_with(|| course.clone());
        }
        Ok(())
    }

    async fn upsert_sections(&self, sections: &[Section]) -> Result<()> {
        let mut inner = self.inner.lock().await;
        for section in sections {
            inner
                .sections
                .insert(section.id.clone(), section.clone());
        }
        Ok(())
    }

    async fn upsert_professors(&self, professors: &[Professor]) -> Result<()> {
        let mut inner = self.inner.lock().await;
        for professor in professors {
            inner
                .professors
                .insert(professor.id.clone(), professor.clone());
        }
        Ok(())
    }

    async fn upsert_subjects(&self, subjects: &[Subject]) -> Result<()> {
        let mut inner = self.inner.lock().await;
        for subject in subjects {
            inner
                .subjects
                .insert(subject.abbreviation.clone(), subject.clone());
        }
        Ok(())
    }

    async fn course_keys(&self) -> Result<HashSet<String>> {
        let inner = self.inner.lock().await;
        Ok(inner.courses.keys().cloned().collect())
    }

    async fn refresh_course_timestamps(&self, keys: &[String], now: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.inner.lock().await;
        let mut updated = 0;
        for key in keys {
            if let Some(course) = inner.courses.get_mut(key) {
                course.last_update_time = now;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn prune_stale_courses(&self, terms: &[String], cutoff: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.inner.lock().await;
        let doomed: Vec<String> = inner
            .courses
            .values()
            .filter(|c| terms.contains(&c.term_id) && c.last_update_time < cutoff)
            .map(|c| c.id.clone())
            .collect();

        for id in &doomed {
            inner.courses.remove(id);
        }
        inner
            .sections
            .retain(|_, s| !doomed.contains(&s.class_hash));

        Ok(doomed.len() as u64)
    }
}
