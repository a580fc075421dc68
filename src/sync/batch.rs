//! Chunked bulk-write fan-out.
//!
//! Records are partitioned into bounded chunks and every chunk write for one
//! entity kind is launched at once, then awaited together. Chunks never split
//! records sharing an identity (the normalizer emits at most one record per
//! key), so inter-chunk write order does not matter. A chunk failure fails
//! the whole call; completed chunks stay written, and the idempotent upserts
//! make a rerun safe.

use std::future::Future;

use anyhow::Result;
use futures::future::try_join_all;

/// Write `records` through `write`, one call per chunk of at most
/// `chunk_size`, all chunks in flight concurrently. Empty input is a no-op.
pub async fn upsert_in_chunks<'a, T, F, Fut>(
    records: &'a [T],
    chunk_size: usize,
    write: F,
) -> Result<()>
where
    F: Fn(&'a [T]) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    if records.is_empty() {
        return Ok(());
    }

    let chunk_size = chunk_size.max(1);
    try_join_all(records.chunks(chunk_size).map(write)).await?;
    Ok(())
}
