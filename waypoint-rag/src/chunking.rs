//! Token-budgeted text chunking with overlap.
//!
//! [`TextChunker`] splits text hierarchically — paragraphs, lines, sentence
//! ends, words, finally raw characters — and greedily packs the resulting
//! pieces into chunks measured against a token budget. Consecutive chunks
//! share an overlap window measured in tokens, and section-aware chunking
//! never lets that window cross a section boundary.

use std::collections::HashMap;

use crate::config::PipelineConfig;
use crate::document::{DocumentMetadata, EmbeddedChunk, PendingChunk, Section};
use crate::tokenizer::TokenCounter;

/// Candidate separators, from highest structural significance to lowest.
/// A piece that exceeds the budget at one granularity recurses to the next;
/// character slicing is the final fallback.
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "! ", "? ", " "];

/// Splits text into token-bounded, overlap-preserving chunks.
///
/// # Example
///
/// ```rust,ignore
/// use waypoint_rag::{PipelineConfig, TextChunker, TokenCounter};
///
/// let config = PipelineConfig::default();
/// let counter = TokenCounter::for_model(&config.embedding_model)?;
/// let chunker = TextChunker::new(&config, counter);
/// let chunks = chunker.chunk_sections(&document.sections, &document.metadata);
/// ```
#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    counter: TokenCounter,
}

impl TextChunker {
    /// Create a chunker from the pipeline configuration and token counter.
    ///
    /// The counter must match the embedding model the chunks are sized for.
    pub fn new(config: &PipelineConfig, counter: TokenCounter) -> Self {
        Self { chunk_size: config.chunk_size, chunk_overlap: config.chunk_overlap, counter }
    }

    /// Split raw text into chunk contents without metadata.
    ///
    /// Returns an empty `Vec` for empty or all-whitespace input. Every
    /// returned chunk is trimmed and non-empty.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let pieces = self.split_pieces(text, SEPARATORS);
        self.pack(pieces)
    }

    /// Chunk a text span, stamping chunk metadata.
    ///
    /// `chunk_index` runs densely from zero and `total_chunks` is the
    /// produced count; `token_count` is measured on the final trimmed
    /// content. Section fields are left unset.
    pub fn chunk(&self, text: &str, metadata: &DocumentMetadata) -> Vec<PendingChunk> {
        let splits = self.split_text(text);
        let total_chunks = splits.len();
        splits
            .into_iter()
            .enumerate()
            .map(|(chunk_index, content)| PendingChunk {
                token_count: self.counter.count(&content),
                content,
                chunk_index,
                total_chunks,
                section_title: None,
                section_level: None,
                metadata: metadata.clone(),
            })
            .collect()
    }

    /// Chunk each section independently, then merge into one globally
    /// indexed sequence.
    ///
    /// Sections are rendered with their reconstructed heading line so the
    /// heading text stays embedded with the body. Because each section is
    /// chunked on its own, the overlap window never crosses a section
    /// boundary. After all sections are chunked, `chunk_index` is
    /// reassigned densely across the concatenated sequence and
    /// `total_chunks` is stamped with the grand total.
    pub fn chunk_sections(
        &self,
        sections: &[Section],
        metadata: &DocumentMetadata,
    ) -> Vec<PendingChunk> {
        let mut all_chunks: Vec<PendingChunk> = Vec::new();

        for section in sections {
            let rendered = render_section(section);
            for mut chunk in self.chunk(&rendered, metadata) {
                chunk.section_title = Some(section.title.clone());
                chunk.section_level = Some(section.level);
                chunk.chunk_index = all_chunks.len();
                all_chunks.push(chunk);
            }
        }

        let total_chunks = all_chunks.len();
        for chunk in &mut all_chunks {
            chunk.total_chunks = total_chunks;
        }

        all_chunks
    }

    /// Soft diagnostic: whether `text` fits within 1.2× the chunk budget.
    pub fn within_budget(&self, text: &str) -> bool {
        self.counter.count(text) <= self.chunk_size + self.chunk_size / 5
    }

    /// Split `text` into pieces that each fit the token budget, trying
    /// separators in priority order and recursing into oversized pieces.
    fn split_pieces(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let Some((separator, rest)) = separators.split_first() else {
            return self.split_chars(text);
        };

        let mut pieces = Vec::new();
        for part in split_keeping_separator(text, separator) {
            if self.counter.count(part) <= self.chunk_size {
                pieces.push(part.to_string());
            } else {
                pieces.extend(self.split_pieces(part, rest));
            }
        }
        pieces
    }

    /// Character-level fallback: slices of `chunk_size` characters. A
    /// character never tokenizes to more than one token for the plain-text
    /// inputs this pipeline handles, so a slice cannot exceed the budget.
    fn split_chars(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        chars.chunks(self.chunk_size).map(|window| window.iter().collect()).collect()
    }

    /// Greedily pack pieces into chunks up to the token budget, re-seeding
    /// each new chunk with trailing pieces of the previous one totalling at
    /// most `chunk_overlap` tokens.
    fn pack(&self, pieces: Vec<String>) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: Vec<String> = Vec::new();

        for piece in pieces {
            if !window.is_empty()
                && self.window_tokens(&window, Some(piece.as_str())) > self.chunk_size
            {
                push_trimmed(&mut chunks, &window);
                window = self.overlap_tail(&window);
                // the carried tail plus a large incoming piece can still overflow
                while !window.is_empty()
                    && self.window_tokens(&window, Some(piece.as_str())) > self.chunk_size
                {
                    window.remove(0);
                }
            }
            window.push(piece);
        }

        push_trimmed(&mut chunks, &window);
        chunks
    }

    fn window_tokens(&self, window: &[String], extra: Option<&str>) -> usize {
        let mut text = window.concat();
        if let Some(extra) = extra {
            text.push_str(extra);
        }
        self.counter.count(&text)
    }

    /// Trailing pieces of `window` totalling at most `chunk_overlap` tokens.
    fn overlap_tail(&self, window: &[String]) -> Vec<String> {
        if self.chunk_overlap == 0 {
            return Vec::new();
        }
        let mut tail: Vec<String> = Vec::new();
        let mut tokens = 0;
        for piece in window.iter().rev() {
            let piece_tokens = self.counter.count(piece);
            if tokens + piece_tokens > self.chunk_overlap {
                break;
            }
            tokens += piece_tokens;
            tail.insert(0, piece.clone());
        }
        tail
    }
}

/// Render a section back to markdown: heading line, blank line, body.
/// The preamble (level 0) has no heading line and renders its body only.
fn render_section(section: &Section) -> String {
    if section.level == 0 || section.title.is_empty() {
        return section.body.clone();
    }
    format!("{} {}\n\n{}", "#".repeat(section.level as usize), section.title, section.body)
}

/// Split text at a separator while keeping the separator attached to the
/// preceding segment.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        parts.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        parts.push(&text[start..]);
    }

    parts
}

fn push_trimmed(chunks: &mut Vec<String>, window: &[String]) {
    let joined = window.concat();
    let content = joined.trim();
    if !content.is_empty() {
        chunks.push(content.to_string());
    }
}

/// Recompute `total_chunks` per file after chunks were dropped.
///
/// `chunk_index` values are left untouched, so a dropped chunk leaves a gap
/// in the index sequence of its document; downstream linkage orders by
/// whatever indices survive.
pub fn restamp_total_chunks(chunks: &mut [EmbeddedChunk]) {
    let mut totals: HashMap<&str, usize> = HashMap::new();
    for chunk in chunks.iter() {
        *totals.entry(chunk.chunk.metadata.file_name.as_str()).or_insert(0) += 1;
    }
    let totals: HashMap<String, usize> =
        totals.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    for chunk in chunks.iter_mut() {
        if let Some(total) = totals.get(&chunk.chunk.metadata.file_name) {
            chunk.chunk.total_chunks = *total;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;

    fn test_chunker(chunk_size: usize, chunk_overlap: usize) -> TextChunker {
        let config = PipelineConfig::builder()
            .chunk_size(chunk_size)
            .chunk_overlap(chunk_overlap)
            .build()
            .unwrap();
        let counter = TokenCounter::for_model(&config.embedding_model).unwrap();
        TextChunker::new(&config, counter)
    }

    fn metadata(file_name: &str) -> DocumentMetadata {
        DocumentMetadata { file_name: file_name.to_string(), ..Default::default() }
    }

    /// Unique words make shared overlap text detectable exactly.
    fn numbered_words(n: usize) -> String {
        (0..n).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let chunker = test_chunker(100, 20);
        assert!(chunker.split_text("").is_empty());
        assert!(chunker.split_text("   \n\n  ").is_empty());
        assert!(chunker.chunk("", &metadata("a.md")).is_empty());
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunker = test_chunker(100, 20);
        let chunks = chunker.chunk("One short paragraph.", &metadata("a.md"));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "One short paragraph.");
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].total_chunks, 1);
        assert!(chunks[0].token_count > 0);
    }

    #[test]
    fn chunks_respect_the_token_budget() {
        let chunker = test_chunker(60, 15);
        let counter = TokenCounter::for_model("text-embedding-ada-002").unwrap();
        let chunks = chunker.split_text(&numbered_words(400));
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(
                counter.count(chunk) <= 60,
                "chunk exceeds budget: {} tokens",
                counter.count(chunk)
            );
        }
    }

    #[test]
    fn indices_are_contiguous_and_totals_stamped() {
        let chunker = test_chunker(60, 15);
        let chunks = chunker.chunk(&numbered_words(300), &metadata("a.md"));
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i);
            assert_eq!(chunk.total_chunks, chunks.len());
        }
    }

    #[test]
    fn adjacent_chunks_share_overlap() {
        let chunker = test_chunker(60, 15);
        let chunks = chunker.split_text(&numbered_words(300));
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let first_word = pair[1].split_whitespace().next().unwrap();
            assert!(
                pair[0].contains(first_word),
                "no overlap between '{}…' and '{}…'",
                &pair[0][..30.min(pair[0].len())],
                &pair[1][..30.min(pair[1].len())]
            );
        }
    }

    #[test]
    fn zero_overlap_produces_disjoint_chunks() {
        let chunker = test_chunker(60, 0);
        let chunks = chunker.split_text(&numbered_words(300));
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let first_word = pair[1].split_whitespace().next().unwrap();
            assert!(!pair[0].contains(first_word));
        }
    }

    #[test]
    fn splitting_is_deterministic() {
        let chunker = test_chunker(60, 15);
        let text = numbered_words(300);
        assert_eq!(chunker.split_text(&text), chunker.split_text(&text));
    }

    #[test]
    fn oversized_sentence_falls_through_to_words() {
        // one long "sentence" with no paragraph or sentence breaks
        let chunker = test_chunker(40, 10);
        let counter = TokenCounter::for_model("text-embedding-ada-002").unwrap();
        let text = numbered_words(200);
        let chunks = chunker.split_text(&text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(counter.count(chunk) <= 40);
        }
    }

    #[test]
    fn unbroken_run_falls_back_to_characters() {
        let chunker = test_chunker(30, 5);
        // no separators anywhere; digits tokenize in groups of at most three
        let text = "0123456789".repeat(50);
        let chunks = chunker.split_text(&text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 30);
        }
    }

    #[test]
    fn sections_chunk_independently_with_global_indices() {
        let chunker = test_chunker(60, 15);
        let sections = vec![
            Section { title: "Rigi".to_string(), level: 1, body: numbered_words(200) },
            Section { title: "Pilatus".to_string(), level: 2, body: "cable car".to_string() },
        ];
        let chunks = chunker.chunk_sections(&sections, &metadata("lucerne.md"));

        assert!(chunks.len() > 2);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i);
            assert_eq!(chunk.total_chunks, chunks.len());
        }

        // no chunk mixes the two sections' bodies
        for chunk in &chunks {
            assert!(!(chunk.content.contains("word0") && chunk.content.contains("cable car")));
        }

        let last = chunks.last().unwrap();
        assert_eq!(last.section_title.as_deref(), Some("Pilatus"));
        assert_eq!(last.section_level, Some(2));
        assert!(last.content.contains("## Pilatus"));
    }

    #[test]
    fn default_budget_splits_a_long_section_with_overlap() {
        let chunker = test_chunker(800, 200);
        let counter = TokenCounter::for_model("text-embedding-ada-002").unwrap();
        let sections = vec![
            Section { title: "Routes".to_string(), level: 1, body: numbered_words(700) },
            Section { title: "Fares".to_string(), level: 2, body: "gamma".to_string() },
        ];
        let chunks = chunker.chunk_sections(&sections, &metadata("routes.md"));

        let routes =
            chunks.iter().filter(|c| c.section_title.as_deref() == Some("Routes")).count();
        let fares = chunks.iter().filter(|c| c.section_title.as_deref() == Some("Fares")).count();
        assert!(routes >= 2, "long section should split, got {routes} chunk(s)");
        assert_eq!(fares, 1);

        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i);
            assert_eq!(chunk.total_chunks, chunks.len());
            assert!(counter.count(&chunk.content) <= 800);
        }
    }

    #[test]
    fn heading_only_section_keeps_the_heading_line() {
        let chunker = test_chunker(100, 20);
        let sections =
            vec![Section { title: "Timetable".to_string(), level: 2, body: String::new() }];
        let chunks = chunker.chunk_sections(&sections, &metadata("a.md"));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "## Timetable");
    }

    #[test]
    fn preamble_section_renders_body_only() {
        let chunker = test_chunker(100, 20);
        let sections = vec![Section {
            title: String::new(),
            level: 0,
            body: "An introduction without a heading.".to_string(),
        }];
        let chunks = chunker.chunk_sections(&sections, &metadata("a.md"));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "An introduction without a heading.");
        assert!(!chunks[0].content.contains('#'));
    }

    #[test]
    fn within_budget_allows_twenty_percent_headroom() {
        let chunker = test_chunker(10, 2);
        assert!(chunker.within_budget("short"));
        assert!(!chunker.within_budget(&numbered_words(100)));
    }

    #[test]
    fn restamp_recounts_per_file_but_keeps_indices() {
        let chunker = test_chunker(60, 15);
        let chunks = chunker.chunk(&numbered_words(300), &metadata("a.md"));
        assert!(chunks.len() >= 3);

        let mut embedded: Vec<EmbeddedChunk> = chunks
            .into_iter()
            .map(|chunk| EmbeddedChunk { chunk, embedding: vec![0.0; 4] })
            .collect();
        // drop the middle chunk, as an embedding failure would
        embedded.remove(1);

        let survivors = embedded.len();
        restamp_total_chunks(&mut embedded);

        assert_eq!(embedded[0].chunk.chunk_index, 0);
        assert_eq!(embedded[1].chunk.chunk_index, 2);
        for chunk in &embedded {
            assert_eq!(chunk.chunk.total_chunks, survivors);
        }
    }
}
