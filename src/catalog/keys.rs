//! Derived identity keys.
//!
//! Courses and sections are addressed by a deterministic key computed from
//! their identifying tuple rather than a scraper-assigned surrogate id, so
//! the same logical entity seen across many sync runs collides to the same
//! row. Keys never incorporate mutable attributes.

/// Stable key for a course: `{host}/{term}/{subject}/{class_id}`.
pub fn course_key(host: &str, term_id: &str, subject: &str, class_id: &str) -> String {
    format!("{host}/{term_id}/{subject}/{class_id}")
}

/// Stable key for a section: the owning course key plus the CRN.
pub fn section_key(course_key: &str, crn: &str) -> String {
    format!("{course_key}/{crn}")
}
