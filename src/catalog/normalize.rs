//! Raw-to-canonical record normalization.
//!
//! Pure transforms: derive the identity key, coerce numeric fields, copy the
//! scraper's staging fields into their persisted homes, and canonicalize
//! set-valued attributes. A record missing an identity-defining field is a
//! data error; the caller drops it and the run continues.

use chrono::{DateTime, Utc};

use crate::catalog::keys;
use crate::catalog::models::{Course, Professor, Section};
use crate::dump::{RawCourse, RawProfessor, RawSection};

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("{kind} record is missing required field `{field}`")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },
}

/// Normalize a raw course record, stamping new rows with `now`.
pub fn normalize_course(raw: &RawCourse, now: DateTime<Utc>) -> Result<Course, NormalizeError> {
    let host = require("course", "host", raw.host.as_deref())?;
    let term_id = require("course", "termId", raw.term_id.as_deref())?;
    let subject = require("course", "subject", raw.subject.as_deref())?;
    let class_id = require("course", "classId", raw.class_id.as_deref())?;
    let name = require("course", "name", raw.name.as_deref())?;

    Ok(Course {
        id: keys::course_key(host, term_id, subject, class_id),
        host: host.to_owned(),
        term_id: term_id.to_owned(),
        subject: subject.to_owned(),
        class_id: class_id.to_owned(),
        name: name.to_owned(),
        // The scraper stages the description under `desc`; only the copy is
        // persisted.
        description: raw.desc.clone(),
        min_credits: floor_credits(raw.min_credits),
        max_credits: floor_credits(raw.max_credits),
        class_attributes: canonical_set(&raw.class_attributes),
        nupath: canonical_set(&raw.nupath),
        prereqs: raw.prereqs.clone(),
        coreqs: raw.coreqs.clone(),
        prereqs_for: raw.prereqs_for.clone(),
        opt_prereqs_for: raw.opt_prereqs_for.clone(),
        fee_amount: raw.fee_amount,
        fee_description: raw.fee_description.clone(),
        last_update_time: now,
    })
}

/// Normalize a raw section record, deriving its key and the owning course's.
pub fn normalize_section(raw: &RawSection, now: DateTime<Utc>) -> Result<Section, NormalizeError> {
    let host = require("section", "host", raw.host.as_deref())?;
    let term_id = require("section", "termId", raw.term_id.as_deref())?;
    let subject = require("section", "subject", raw.subject.as_deref())?;
    let class_id = require("section", "classId", raw.class_id.as_deref())?;
    let crn = require("section", "crn", raw.crn.as_deref())?;

    let class_hash = keys::course_key(host, term_id, subject, class_id);
    let id = keys::section_key(&class_hash, crn);

    Ok(Section {
        id,
        class_hash,
        crn: crn.to_owned(),
        class_type: raw.class_type.clone(),
        seats_capacity: raw.seats_capacity,
        seats_remaining: raw.seats_remaining,
        wait_capacity: raw.wait_capacity,
        wait_remaining: raw.wait_remaining,
        campus: raw.campus.clone(),
        honors: raw.honors.unwrap_or(false),
        meetings: raw.meetings.clone(),
        profs: raw.profs.clone(),
        url: raw.url.clone(),
        last_update_time: now,
    })
}

/// Normalize a raw professor record. Professors keep their scraper id.
pub fn normalize_professor(raw: &RawProfessor) -> Result<Professor, NormalizeError> {
    let id = require("professor", "id", raw.id.as_deref())?;
    let name = require("professor", "name", raw.name.as_deref())?;

    Ok(Professor {
        id: id.to_owned(),
        name: name.to_owned(),
        emails: canonical_set(&raw.emails),
        primary_department: raw.primary_department.clone(),
        primary_role: raw.primary_role.clone(),
        phone: raw.phone.clone(),
        office_room: raw.office_room.clone(),
        personal_site: raw.personal_site.clone(),
    })
}

fn require<'a>(
    kind: &'static str,
    field: &'static str,
    value: Option<&'a str>,
) -> Result<&'a str, NormalizeError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(NormalizeError::MissingField { kind, field }),
    }
}

/// Scraped credit values can be fractional; the store keeps floored integers.
fn floor_credits(credits: Option<f64>) -> i32 {
    credits.map(|c| c.floor() as i32).unwrap_or(0)
}

/// Canonical set form: sorted, deduplicated.
fn canonical_set(values: &[String]) -> Vec<String> {
    let mut out = values.to_vec();
    out.sort();
    out.dedup();
    out
}
