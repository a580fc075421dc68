//! Command-line arguments for a sync run.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "registrar",
    about = "Reconcile scraped catalog dumps into the canonical store"
)]
pub struct Args {
    /// Path to the term dump JSON (classes, sections, subjects).
    #[arg(long, value_name = "FILE")]
    pub term_dump: PathBuf,

    /// Path to the professor dump JSON. Optional; professor sync is skipped
    /// when absent.
    #[arg(long, value_name = "FILE")]
    pub professors: Option<PathBuf>,

    /// Delete courses in the dump's terms whose update time has gone stale.
    #[arg(long)]
    pub prune: bool,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = TracingFormat::Pretty)]
    pub tracing: TracingFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TracingFormat {
    Pretty,
    Json,
}
