//! Canonical catalog entities and the raw-to-canonical transform.

pub mod keys;
pub mod models;
pub mod normalize;
