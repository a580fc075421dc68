//! Canonical row types for the four catalog entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A boolean requisite expression: an and/or group over nested expressions,
/// a `{subject, classId}` course reference, or free text the scraper could
/// not resolve to a course (e.g. "placement exam").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Requisite {
    Group(RequisiteGroup),
    Course(CourseRef),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequisiteGroup {
    #[serde(rename = "type")]
    pub op: BoolOp,
    pub values: Vec<Requisite>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoolOp {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRef {
    pub subject: String,
    pub class_id: String,
}

/// A course, keyed by its derived identity.
///
/// `last_update_time` marks the last run in which a section of this course
/// was processed; it is refreshed only by the timestamp tracker, never by a
/// course upsert, and drives staleness pruning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub host: String,
    pub term_id: String,
    pub subject: String,
    pub class_id: String,
    pub name: String,
    pub description: Option<String>,
    pub min_credits: i32,
    pub max_credits: i32,
    pub class_attributes: Vec<String>,
    pub nupath: Vec<String>,
    pub prereqs: Option<Requisite>,
    pub coreqs: Option<Requisite>,
    pub prereqs_for: Option<Requisite>,
    pub opt_prereqs_for: Option<Requisite>,
    pub fee_amount: Option<i64>,
    pub fee_description: Option<String>,
    pub last_update_time: DateTime<Utc>,
}

/// A section, keyed by its derived identity (`class_hash` + CRN).
///
/// The rest of the identity tuple is implied by `class_hash` and not
/// duplicated as columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    /// Derived key of the owning course.
    pub class_hash: String,
    pub crn: String,
    pub class_type: Option<String>,
    pub seats_capacity: Option<i32>,
    pub seats_remaining: Option<i32>,
    pub wait_capacity: Option<i32>,
    pub wait_remaining: Option<i32>,
    pub campus: Option<String>,
    pub honors: bool,
    /// Opaque meeting-time structure, stored as scraped.
    pub meetings: Option<serde_json::Value>,
    /// Ordered professor names.
    pub profs: Vec<String>,
    pub url: Option<String>,
    pub last_update_time: DateTime<Utc>,
}

/// A professor, keyed by the scraper-supplied id. Never pruned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Professor {
    pub id: String,
    pub name: String,
    pub emails: Vec<String>,
    pub primary_department: Option<String>,
    pub primary_role: Option<String>,
    pub phone: Option<String>,
    pub office_room: Option<String>,
    pub personal_site: Option<String>,
}

/// A subject, keyed by its abbreviation. Never pruned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub abbreviation: String,
    pub description: String,
}
