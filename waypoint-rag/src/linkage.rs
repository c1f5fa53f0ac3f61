//! Post-persistence parent-chunk linkage.
//!
//! Store identifiers exist only after insert, so the "parent = previous
//! chunk in the same document" relation is reconstructed in a second pass
//! over persisted records: group by file, sort by chunk index, link each
//! record to its predecessor.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::document::ChunkRef;
use crate::error::Result;
use crate::vectorstore::ChunkStore;

/// Outcome of a linkage pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkageReport {
    /// Number of file groups visited.
    pub files: usize,
    /// Number of parent links written.
    pub links_created: usize,
    /// Number of link updates that failed.
    pub failures: usize,
}

/// Reconstructs parent links over already-persisted chunks.
pub struct LinkageBuilder<'a> {
    store: &'a dyn ChunkStore,
}

impl<'a> LinkageBuilder<'a> {
    /// Create a builder over the given store.
    pub fn new(store: &'a dyn ChunkStore) -> Self {
        Self { store }
    }

    /// Link every persisted chunk to its predecessor within its file.
    ///
    /// Records are grouped by `file_name` and sorted by `chunk_index`; each
    /// record's parent becomes the member with the next-lower index, and the
    /// first keeps none. Missing indices (for example from chunks dropped
    /// before upload) are skipped naturally: whatever records exist are
    /// linked in order. Individual update failures are counted and the pass
    /// continues.
    ///
    /// # Errors
    ///
    /// Returns [`crate::WaypointError::Store`] only if the initial fetch of
    /// persisted records fails.
    pub async fn link_parents(&self) -> Result<LinkageReport> {
        let refs = self.store.fetch_chunk_refs().await?;

        let mut by_file: HashMap<String, Vec<ChunkRef>> = HashMap::new();
        for chunk_ref in refs {
            by_file.entry(chunk_ref.file_name.clone()).or_default().push(chunk_ref);
        }

        let files = by_file.len();
        let mut links_created = 0;
        let mut failures = 0;

        for group in by_file.values_mut() {
            group.sort_by_key(|r| r.chunk_index);
            for pair in group.windows(2) {
                match self.store.set_parent(pair[1].id, pair[0].id).await {
                    Ok(()) => links_created += 1,
                    Err(e) => {
                        warn!(
                            file = %pair[1].file_name,
                            chunk_index = pair[1].chunk_index,
                            error = %e,
                            "failed to set parent link"
                        );
                        failures += 1;
                    }
                }
            }
        }

        info!(files, links_created, failures, "parent linkage pass complete");
        Ok(LinkageReport { files, links_created, failures })
    }
}
