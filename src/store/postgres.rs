//! Postgres-backed catalog store.
//!
//! Each bulk upsert is a single UNNEST statement: one parallel array per
//! column, `ON CONFLICT ... DO UPDATE SET col = EXCLUDED.col` for every
//! mutable column. All queries are parameterized.

use std::collections::HashSet;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::catalog::models::{Course, Professor, Section, Subject};
use crate::store::CatalogStore;

pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn upsert_courses(&self, courses: &[Course]) -> Result<()> {
        if courses.is_empty() {
            return Ok(());
        }

        let ids: Vec<&str> = courses.iter().map(|c| c.id.as_str()).collect();
        let hosts: Vec<&str> = courses.iter().map(|c| c.host.as_str()).collect();
        let term_ids: Vec<&str> = courses.iter().map(|c| c.term_id.as_str()).collect();
        let subjects: Vec<&str> = courses.iter().map(|c| c.subject.as_str()).collect();
        let class_ids: Vec<&str> = courses.iter().map(|c| c.class_id.as_str()).collect();
        let names: Vec<&str> = courses.iter().map(|c| c.name.as_str()).collect();
        let descriptions: Vec<Option<String>> =
            courses.iter().map(|c| c.description.clone()).collect();
        let min_credits: Vec<i32> = courses.iter().map(|c| c.min_credits).collect();
        let max_credits: Vec<i32> = courses.iter().map(|c| c.max_credits).collect();
        let class_attributes = json_column(courses, |c| &c.class_attributes)?;
        let nupath = json_column(courses, |c| &c.nupath)?;
        let prereqs = optional_json_column(courses, |c| c.prereqs.as_ref())?;
        let coreqs = optional_json_column(courses, |c| c.coreqs.as_ref())?;
        let prereqs_for = optional_json_column(courses, |c| c.prereqs_for.as_ref())?;
        let opt_prereqs_for = optional_json_column(courses, |c| c.opt_prereqs_for.as_ref())?;
        let fee_amounts: Vec<Option<i64>> = courses.iter().map(|c| c.fee_amount).collect();
        let fee_descriptions: Vec<Option<String>> =
            courses.iter().map(|c| c.fee_description.clone()).collect();
        let update_times: Vec<DateTime<Utc>> =
            courses.iter().map(|c| c.last_update_time).collect();

        // last_update_time is intentionally absent from the conflict SET
        // list: only the timestamp tracker refreshes it.
        sqlx::query(
            r#"
            INSERT INTO courses (
                id, host, term_id, subject, class_id, name, description,
                min_credits, max_credits, class_attributes, nupath,
                prereqs, coreqs, prereqs_for, opt_prereqs_for,
                fee_amount, fee_description, last_update_time
            )
            SELECT * FROM UNNEST(
                $1::text[], $2::text[], $3::text[], $4::text[], $5::text[],
                $6::text[], $7::text[], $8::int4[], $9::int4[], $10::jsonb[],
                $11::jsonb[], $12::jsonb[], $13::jsonb[], $14::jsonb[],
                $15::jsonb[], $16::int8[], $17::text[], $18::timestamptz[]
            )
            ON CONFLICT (id) DO UPDATE SET
                host = EXCLUDED.host,
                term_id = EXCLUDED.term_id,
                subject = EXCLUDED.subject,
                class_id = EXCLUDED.class_id,
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                min_credits = EXCLUDED.min_credits,
                max_credits = EXCLUDED.max_credits,
                class_attributes = EXCLUDED.class_attributes,
                nupath = EXCLUDED.nupath,
                prereqs = EXCLUDED.prereqs,
                coreqs = EXCLUDED.coreqs,
                prereqs_for = EXCLUDED.prereqs_for,
                opt_prereqs_for = EXCLUDED.opt_prereqs_for,
                fee_amount = EXCLUDED.fee_amount,
                fee_description = EXCLUDED.fee_description
            "#,
        )
        .bind(&ids)
        .bind(&hosts)
        .bind(&term_ids)
        .bind(&subjects)
        .bind(&class_ids)
        .bind(&names)
        .bind(&descriptions)
        .bind(&min_credits)
        .bind(&max_credits)
        .bind(&class_attributes)
        .bind(&nupath)
        .bind(&prereqs)
        .bind(&coreqs)
        .bind(&prereqs_for)
        .bind(&opt_prereqs_for)
        .bind(&fee_amounts)
        .bind(&fee_descriptions)
        .bind(&update_times)
        .execute(&self.pool)
        .await
        .context("failed to bulk upsert courses")?;

        Ok(())
    }

    async fn upsert_sections(&self, sections: &[Section]) -> Result<()> {
        if sections.is_empty() {
            return Ok(());
        }

        let ids: Vec<&str> = sections.iter().map(|s| s.id.as_str()).collect();
        let class_hashes: Vec<&str> = sections.iter().map(|s| s.class_hash.as_str()).collect();
        let crns: Vec<&str> = sections.iter().map(|s| s.crn.as_str()).collect();
        let class_types: Vec<Option<String>> =
            sections.iter().map(|s| s.class_type.clone()).collect();
        let seats_capacity: Vec<Option<i32>> = sections.iter().map(|s| s.seats_capacity).collect();
        let seats_remaining: Vec<Option<i32>> =
            sections.iter().map(|s| s.seats_remaining).collect();
        let wait_capacity: Vec<Option<i32>> = sections.iter().map(|s| s.wait_capacity).collect();
        let wait_remaining: Vec<Option<i32>> = sections.iter().map(|s| s.wait_remaining).collect();
        let campuses: Vec<Option<String>> = sections.iter().map(|s| s.campus.clone()).collect();
        let honors: Vec<bool> = sections.iter().map(|s| s.honors).collect();
        let meetings: Vec<Option<serde_json::Value>> =
            sections.iter().map(|s| s.meetings.clone()).collect();
        let profs = json_column(sections, |s| &s.profs)?;
        let urls: Vec<Option<String>> = sections.iter().map(|s| s.url.clone()).collect();
        let update_times: Vec<DateTime<Utc>> =
            sections.iter().map(|s| s.last_update_time).collect();

        sqlx::query(
            r#"
            INSERT INTO sections (
                id, class_hash, crn, class_type,
                seats_capacity, seats_remaining, wait_capacity, wait_remaining,
                campus, honors, meetings, profs, url, last_update_time
            )
            SELECT * FROM UNNEST(
                $1::text[], $2::text[], $3::text[], $4::text[],
                $5::int4[], $6::int4[], $7::int4[], $8::int4[],
                $9::text[], $10::bool[], $11::jsonb[], $12::jsonb[],
                $13::text[], $14::timestamptz[]
            )
            ON CONFLICT (id) DO UPDATE SET
                class_hash = EXCLUDED.class_hash,
                crn = EXCLUDED.crn,
                class_type = EXCLUDED.class_type,
                seats_capacity = EXCLUDED.seats_capacity,
                seats_remaining = EXCLUDED.seats_remaining,
                wait_capacity = EXCLUDED.wait_capacity,
                wait_remaining = EXCLUDED.wait_remaining,
                campus = EXCLUDED.campus,
                honors = EXCLUDED.honors,
                meetings = EXCLUDED.meetings,
                profs = EXCLUDED.profs,
                url = EXCLUDED.url,
                last_update_time = EXCLUDED.last_update_time
            "#,
        )
        .bind(&ids)
        .bind(&class_hashes)
        .bind(&crns)
        .bind(&class_types)
        .bind(&seats_capacity)
        .bind(&seats_remaining)
        .bind(&wait_capacity)
        .bind(&wait_remaining)
        .bind(&campuses)
        .bind(&honors)
        .bind(&meetings)
        .bind(&profs)
        .bind(&urls)
        .bind(&update_times)
        .execute(&self.pool)
        .await
        .context("failed to bulk upsert sections")?;

        Ok(())
    }

    async fn upsert_professors(&self, professors: &[Professor]) -> Result<()> {
        if professors.is_empty() {
            return Ok(());
        }

        let ids: Vec<&str> = professors.iter().map(|p| p.id.as_str()).collect();
        let names: Vec<&str> = professors.iter().map(|p| p.name.as_str()).collect();
        let emails = json_column(professors, |p| &p.emails)?;
        let departments: Vec<Option<String>> = professors
            .iter()
            .map(|p| p.primary_department.clone())
            .collect();
        let roles: Vec<Option<String>> =
            professors.iter().map(|p| p.primary_role.clone()).collect();
        let phones: Vec<Option<String>> = professors.iter().map(|p| p.phone.clone()).collect();
        let offices: Vec<Option<String>> =
            professors.iter().map(|p| p.office_room.clone()).collect();
        let sites: Vec<Option<String>> =
            professors.iter().map(|p| p.personal_site.clone()).collect();

        sqlx::query(
            r#"
            INSERT INTO professors (
                id, name, emails, primary_department, primary_role,
                phone, office_room, personal_site
            )
            SELECT * FROM UNNEST(
                $1::text[], $2::text[], $3::jsonb[], $4::text[],
                $5::text[], $6::text[], $7::text[], $8::text[]
            )
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                emails = EXCLUDED.emails,
                primary_department = EXCLUDED.primary_department,
                primary_role = EXCLUDED.primary_role,
                phone = EXCLUDED.phone,
                office_room = EXCLUDED.office_room,
                personal_site = EXCLUDED.personal_site
            "#,
        )
        .bind(&ids)
        .bind(&names)
        .bind(&emails)
        .bind(&departments)
        .bind(&roles)
        .bind(&phones)
        .bind(&offices)
        .bind(&sites)
        .execute(&self.pool)
        .await
        .context("failed to bulk upsert professors")?;

        Ok(())
    }

    async fn upsert_subjects(&self, subjects: &[Subject]) -> Result<()> {
        if subjects.is_empty() {
            return Ok(());
        }

        let abbreviations: Vec<&str> = subjects.iter().map(|s| s.abbreviation.as_str()).collect();
        let descriptions: Vec<&str> = subjects.iter().map(|s| s.description.as_str()).collect();

        sqlx::query(
            r#"
            INSERT INTO subjects (abbreviation, description)
            SELECT * FROM UNNEST($1::text[], $2::text[])
            ON CONFLICT (abbreviation)
            DO UPDATE SET description = EXCLUDED.description
            "#,
        )
        .bind(&abbreviations)
        .bind(&descriptions)
        .execute(&self.pool)
        .await
        .context("failed to bulk upsert subjects")?;

        Ok(())
    }

    async fn course_keys(&self) -> Result<HashSet<String>> {
        let keys: Vec<String> = sqlx::query_scalar("SELECT id FROM courses")
            .fetch_all(&self.pool)
            .await
            .context("failed to fetch known course keys")?;
        Ok(keys.into_iter().collect())
    }

    async fn refresh_course_timestamps(&self, keys: &[String], now: DateTime<Utc>) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query("UPDATE courses SET last_update_time = $2 WHERE id = ANY($1)")
            .bind(keys)
            .bind(now)
            .execute(&self.pool)
            .await
            .context("failed to refresh course timestamps")?;
        Ok(result.rows_affected())
    }

    async fn prune_stale_courses(&self, terms: &[String], cutoff: DateTime<Utc>) -> Result<u64> {
        if terms.is_empty() {
            return Ok(0);
        }

        // Sections cascade via their FK.
        let result =
            sqlx::query("DELETE FROM courses WHERE term_id = ANY($1) AND last_update_time < $2")
                .bind(terms)
                .bind(cutoff)
                .execute(&self.pool)
                .await
                .context("failed to prune stale courses")?;
        Ok(result.rows_affected())
    }
}

/// Serialize one field of every record into a jsonb array column.
fn json_column<T, V, F>(records: &[T], field: F) -> Result<Vec<serde_json::Value>>
where
    V: Serialize + ?Sized,
    F: Fn(&T) -> &V,
{
    records
        .iter()
        .map(|r| serde_json::to_value(field(r)).context("failed to serialize jsonb column"))
        .collect()
}

/// Like [`json_column`], for optional fields (absent becomes SQL NULL).
fn optional_json_column<T, V, F>(records: &[T], field: F) -> Result<Vec<Option<serde_json::Value>>>
where
    V: Serialize,
    F: Fn(&T) -> Option<&V>,
{
    records
        .iter()
        .map(|r| {
            field(r)
                .map(|v| serde_json::to_value(v).context("failed to serialize jsonb column"))
                .transpose()
        })
        .collect()
}
