//! Raw dump input: the loosely-typed records the scraper produces.
//!
//! Identity-defining fields are `Option` here so that a record missing one is
//! caught at the normalization boundary as a typed data error instead of
//! surfacing as a malformed key deep in the write path. Unknown scraper
//! fields are tolerated and ignored.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::catalog::models::Requisite;

/// One term's worth of scraped catalog data.
///
/// `classes` is keyed by an opaque scraper-assigned id; the key is discarded
/// during normalization in favor of the derived course key.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TermDump {
    pub classes: BTreeMap<String, RawCourse>,
    pub sections: Vec<RawSection>,
    /// Subject abbreviation -> human-readable description.
    pub subjects: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawCourse {
    pub host: Option<String>,
    pub term_id: Option<String>,
    pub subject: Option<String>,
    pub class_id: Option<String>,
    pub name: Option<String>,
    /// Staging field from the scraper; copied into the persisted
    /// `description` during normalization and not stored itself.
    pub desc: Option<String>,
    pub min_credits: Option<f64>,
    pub max_credits: Option<f64>,
    pub class_attributes: Vec<String>,
    pub nupath: Vec<String>,
    pub prereqs: Option<Requisite>,
    pub coreqs: Option<Requisite>,
    pub prereqs_for: Option<Requisite>,
    pub opt_prereqs_for: Option<Requisite>,
    pub fee_amount: Option<i64>,
    pub fee_description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSection {
    pub host: Option<String>,
    pub term_id: Option<String>,
    pub subject: Option<String>,
    pub class_id: Option<String>,
    pub crn: Option<String>,
    pub class_type: Option<String>,
    pub seats_capacity: Option<i32>,
    pub seats_remaining: Option<i32>,
    pub wait_capacity: Option<i32>,
    pub wait_remaining: Option<i32>,
    pub campus: Option<String>,
    pub honors: Option<bool>,
    /// Meeting times are opaque to the sync engine; stored as-is.
    pub meetings: Option<serde_json::Value>,
    pub profs: Vec<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawProfessor {
    pub id: Option<String>,
    pub name: Option<String>,
    pub emails: Vec<String>,
    pub primary_department: Option<String>,
    pub primary_role: Option<String>,
    pub phone: Option<String>,
    pub office_room: Option<String>,
    pub personal_site: Option<String>,
}

/// Load a term dump from a JSON file.
pub fn load_term_dump(path: &Path) -> Result<TermDump> {
    let body = fs::read_to_string(path)
        .with_context(|| format!("failed to read term dump {}", path.display()))?;
    parse_json(&body).with_context(|| format!("failed to parse term dump {}", path.display()))
}

/// Load a professor dump from a JSON file.
pub fn load_professors(path: &Path) -> Result<Vec<RawProfessor>> {
    let body = fs::read_to_string(path)
        .with_context(|| format!("failed to read professor dump {}", path.display()))?;
    parse_json(&body).with_context(|| format!("failed to parse professor dump {}", path.display()))
}

/// Parse JSON, reporting the serde path of the failing element on error.
fn parse_json<T: serde::de::DeserializeOwned>(body: &str) -> Result<T> {
    let jd = &mut serde_json::Deserializer::from_str(body);
    serde_path_to_error::deserialize(jd)
        .map_err(|err| anyhow::anyhow!("at path '{}': {}", err.path(), err.inner()))
}
