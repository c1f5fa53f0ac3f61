//! End-to-end pipeline tests with a mock embedder and the in-memory store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use waypoint_rag::{
    ChunkStore, EmbeddingProvider, IngestPipeline, InMemoryChunkStore, PipelineConfig, Result,
    SearchRequest, WaypointError,
};

// ---------------------------------------------------------------------------
// MockEmbedder — deterministic hash-based embeddings, scripted batch failures
// ---------------------------------------------------------------------------

struct MockEmbedder {
    dimensions: usize,
    fail_batches: Vec<usize>,
    batch_calls: Mutex<usize>,
}

impl MockEmbedder {
    fn new(dimensions: usize) -> Self {
        Self { dimensions, fail_batches: Vec::new(), batch_calls: Mutex::new(0) }
    }

    /// Fail the batches with the given 1-based ordinals.
    fn failing_batches(dimensions: usize, fail_batches: Vec<usize>) -> Self {
        Self { dimensions, fail_batches, batch_calls: Mutex::new(0) }
    }

    fn hash_embedding(&self, text: &str) -> Vec<f32> {
        let hash = text.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        let mut emb = vec![0.0f32; self.dimensions];
        for (i, v) in emb.iter_mut().enumerate() {
            *v = ((hash.wrapping_add(i as u64)) as f32).sin();
        }
        let norm: f32 = emb.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            emb.iter_mut().for_each(|x| *x /= norm);
        }
        emb
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.hash_embedding(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let call = {
            let mut calls = self.batch_calls.lock().unwrap();
            *calls += 1;
            *calls
        };
        if self.fail_batches.contains(&call) {
            return Err(WaypointError::Embedding {
                provider: "mock".to_string(),
                message: format!("batch {call} rejected"),
            });
        }
        Ok(texts.iter().map(|t| self.hash_embedding(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

const LUCERNE_MD: &str = r#"---
title: Lucerne Day Trips
category: day-trips
tags:
  - lucerne
location: Lucerne
---
# Mount Rigi

Take the boat from Lucerne to Vitznau and the cogwheel railway to the
summit. The round trip is covered by the Swiss Travel Pass.

# Mount Pilatus

Ride the world's steepest cogwheel railway from Alpnachstad. Combine boat,
railway, aerial cableway, and bus for the golden round trip.

# Lake Lucerne

Paddle steamers cross the lake all year. The panorama yacht is worth the
surcharge on a clear afternoon.
"#;

const ZERMATT_MD: &str = "The Gornergrat railway climbs above Zermatt with a full view of the Matterhorn.";

fn small_config() -> PipelineConfig {
    PipelineConfig::builder()
        .chunk_size(64)
        .chunk_overlap(16)
        .embed_batch_size(2)
        .upload_batch_size(2)
        .embedding_dimensions(8)
        .build()
        .unwrap()
}

fn write_dir(files: &[(&str, &str)]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, content) in files {
        std::fs::write(dir.path().join(name), content).unwrap();
    }
    dir
}

fn pipeline_with(
    embedder: MockEmbedder,
    store: Arc<InMemoryChunkStore>,
    config: PipelineConfig,
) -> IngestPipeline {
    IngestPipeline::builder()
        .config(config)
        .embedder(Arc::new(embedder))
        .store(store)
        .build()
        .unwrap()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_run_uploads_and_links_every_chunk() {
    let dir = write_dir(&[("lucerne.md", LUCERNE_MD), ("zermatt.md", ZERMATT_MD)]);
    let store = Arc::new(InMemoryChunkStore::new());
    let pipeline = pipeline_with(MockEmbedder::new(8), store.clone(), small_config());

    let report = pipeline.run(dir.path()).await.unwrap();

    assert_eq!(report.documents_processed, 2);
    assert_eq!(report.documents_skipped, 0);
    assert!(report.chunks_created > 0);
    assert_eq!(report.chunks_dropped, 0);
    assert_eq!(report.chunks_embedded, report.chunks_created);
    assert_eq!(report.chunks_uploaded, report.chunks_created);
    assert!(report.upload_complete);
    assert_eq!(report.store_total, report.chunks_uploaded as u64);

    // per file: dense indices from zero, consistent totals, parent chain
    let records = store.records().await;
    let mut by_file: HashMap<String, Vec<_>> = HashMap::new();
    for record in &records {
        by_file.entry(record.chunk.chunk.metadata.file_name.clone()).or_default().push(record);
    }
    assert_eq!(by_file.len(), 2);

    for group in by_file.values_mut() {
        group.sort_by_key(|r| r.chunk.chunk.chunk_index);
        for (i, record) in group.iter().enumerate() {
            assert_eq!(record.chunk.chunk.chunk_index, i);
            assert_eq!(record.chunk.chunk.total_chunks, group.len());
        }
        assert_eq!(group[0].parent_chunk_id, None);
        for pair in group.windows(2) {
            assert_eq!(pair[1].parent_chunk_id, Some(pair[0].id));
        }
    }

    // section metadata lands on section-derived chunks
    let lucerne = &by_file["lucerne.md"];
    assert!(lucerne
        .iter()
        .any(|r| r.chunk.chunk.section_title.as_deref() == Some("Mount Rigi")));
    assert!(lucerne.iter().all(|r| r.chunk.chunk.metadata.category == "day-trips"));

    // a document without sections still chunks through the fallback path
    let zermatt = &by_file["zermatt.md"];
    assert_eq!(zermatt.len(), 1);
    assert_eq!(zermatt[0].chunk.chunk.section_title, None);
    assert_eq!(zermatt[0].chunk.chunk.metadata.category, "general");
}

#[tokio::test]
async fn search_finds_the_exact_chunk() {
    let dir = write_dir(&[("lucerne.md", LUCERNE_MD)]);
    let store = Arc::new(InMemoryChunkStore::new());
    let pipeline = pipeline_with(MockEmbedder::new(8), store.clone(), small_config());
    pipeline.run(dir.path()).await.unwrap();

    let target = store.records().await[0].chunk.chunk.content.clone();
    let request = SearchRequest { limit: 3, threshold: 0.5, category: None };
    let hits = pipeline.search(&target, &request).await.unwrap();

    assert!(!hits.is_empty());
    assert_eq!(hits[0].content, target);
    assert!(hits[0].similarity > 0.99);
    for pair in hits.windows(2) {
        assert!(pair[0].similarity >= pair[1].similarity);
    }
}

#[tokio::test]
async fn failed_embedding_batch_drops_chunks_without_renumbering() {
    let dir = write_dir(&[("lucerne.md", LUCERNE_MD)]);
    let store = Arc::new(InMemoryChunkStore::new());
    let mut config = small_config();
    config.embed_batch_size = 1;

    // batch ordinals are per chunk; fail the second chunk's batch
    let embedder = MockEmbedder::failing_batches(8, vec![2]);
    let pipeline = pipeline_with(embedder, store.clone(), config);

    let report = pipeline.run(dir.path()).await.unwrap();

    assert_eq!(report.chunks_dropped, 1);
    assert_eq!(report.chunks_embedded, report.chunks_created - 1);
    assert!(report.upload_complete);

    let mut records = store.records().await;
    records.sort_by_key(|r| r.chunk.chunk.chunk_index);

    // index 1 is gone; survivors keep their original indices
    let indices: Vec<usize> = records.iter().map(|r| r.chunk.chunk.chunk_index).collect();
    assert!(!indices.contains(&1));
    assert_eq!(indices[0], 0);
    assert_eq!(indices[1], 2);

    // totals re-stamped to the surviving count
    for record in &records {
        assert_eq!(record.chunk.chunk.total_chunks, records.len());
    }

    // linkage bridges the gap: index 2's parent is index 0's id
    assert_eq!(records[0].parent_chunk_id, None);
    assert_eq!(records[1].parent_chunk_id, Some(records[0].id));
}

#[tokio::test]
async fn unparseable_document_is_skipped_not_fatal() {
    let dir = write_dir(&[
        ("bad.md", "---\ntitle: Unclosed frontmatter\nno closing delimiter"),
        ("good.md", ZERMATT_MD),
    ]);
    let store = Arc::new(InMemoryChunkStore::new());
    let pipeline = pipeline_with(MockEmbedder::new(8), store.clone(), small_config());

    let report = pipeline.run(dir.path()).await.unwrap();

    assert_eq!(report.documents_processed, 1);
    assert_eq!(report.documents_skipped, 1);
    assert_eq!(store.count().await.unwrap(), report.chunks_uploaded as u64);
    assert!(report.chunks_uploaded > 0);
}

#[tokio::test]
async fn empty_document_produces_no_chunks_and_no_error() {
    let dir = write_dir(&[("empty.md", "")]);
    let store = Arc::new(InMemoryChunkStore::new());
    let pipeline = pipeline_with(MockEmbedder::new(8), store.clone(), small_config());

    let report = pipeline.run(dir.path()).await.unwrap();

    assert_eq!(report.documents_processed, 1);
    assert_eq!(report.chunks_created, 0);
    assert!(report.upload_complete);
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn directory_without_markdown_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(InMemoryChunkStore::new());
    let pipeline = pipeline_with(MockEmbedder::new(8), store, small_config());

    let err = pipeline.run(dir.path()).await.unwrap_err();
    assert!(matches!(err, WaypointError::NoInput(_)));
}

#[tokio::test]
async fn dimension_mismatch_fails_preflight() {
    let dir = write_dir(&[("zermatt.md", ZERMATT_MD)]);
    let store = Arc::new(InMemoryChunkStore::new());
    // config expects 8 dimensions, the embedder produces 4
    let pipeline = pipeline_with(MockEmbedder::new(4), store.clone(), small_config());

    let err = pipeline.run(dir.path()).await.unwrap_err();
    assert!(matches!(err, WaypointError::Connectivity { .. }));
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn rerun_appends_rather_than_replacing() {
    let dir = write_dir(&[("zermatt.md", ZERMATT_MD)]);
    let store = Arc::new(InMemoryChunkStore::new());

    let first = pipeline_with(MockEmbedder::new(8), store.clone(), small_config());
    let report = first.run(dir.path()).await.unwrap();
    let after_first = store.count().await.unwrap();
    assert_eq!(after_first, report.chunks_uploaded as u64);

    let second = pipeline_with(MockEmbedder::new(8), store.clone(), small_config());
    second.run(dir.path()).await.unwrap();
    assert_eq!(store.count().await.unwrap(), after_first * 2);
}
