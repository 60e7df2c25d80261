//! Fixed-width overlapping window chunker.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::json;

use crate::types::{DocumentChunk, ParsedDocument};

#[derive(Debug, thiserror::Error)]
pub enum ChunkerError {
    #[error("chunk window invalid: chunk_size {chunk_size}, overlap_size {overlap_size}")]
    InvalidWindow {
        chunk_size: usize,
        overlap_size: usize,
    },
}

/// Chunker configuration report, exposed through system info.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkerInfo {
    pub chunker_type: &'static str,
    pub chunk_size: usize,
    pub overlap_size: usize,
    pub step_size: usize,
}

/// Splits document text into overlapping fixed-width character windows.
///
/// Deterministic: identical `(text, chunk_size, overlap_size)` always yields
/// an identical chunk sequence. Offsets are character offsets, so multi-byte
/// text slices safely.
#[derive(Debug, Clone)]
pub struct OverlapChunker {
    chunk_size: usize,
    overlap_size: usize,
}

impl OverlapChunker {
    /// # Errors
    ///
    /// Returns an error unless `0 <= overlap_size < chunk_size`, which
    /// guarantees a strictly positive step and therefore termination.
    pub fn new(chunk_size: usize, overlap_size: usize) -> Result<Self, ChunkerError> {
        if chunk_size == 0 || overlap_size >= chunk_size {
            return Err(ChunkerError::InvalidWindow {
                chunk_size,
                overlap_size,
            });
        }
        Ok(Self {
            chunk_size,
            overlap_size,
        })
    }

    /// Split a document into ordered chunks with positional metadata.
    ///
    /// An all-whitespace window emits no chunk but still consumes one step;
    /// `chunk_index` counts emitted chunks only. `start_position` and
    /// `end_position` are pre-trim character offsets.
    #[must_use]
    pub fn chunk(&self, document: &ParsedDocument) -> Vec<DocumentChunk> {
        let chars: Vec<char> = document.text.chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }

        let step = self.chunk_size - self.overlap_size;
        let source = document
            .metadata
            .get("source")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_owned();

        let mut chunks = Vec::new();
        let mut start = 0;
        let mut chunk_index = 0usize;

        while start < chars.len() {
            let end = (start + self.chunk_size).min(chars.len());
            let window: String = chars[start..end].iter().collect();
            let content = window.trim();

            if content.is_empty() {
                start += step;
                continue;
            }

            let mut metadata: HashMap<String, serde_json::Value> = HashMap::from([
                ("chunk_index".to_owned(), json!(chunk_index)),
                ("start_position".to_owned(), json!(start)),
                ("end_position".to_owned(), json!(end)),
                ("chunk_size".to_owned(), json!(content.chars().count())),
                (
                    "overlap_size".to_owned(),
                    json!(if start > 0 { self.overlap_size } else { 0 }),
                ),
                ("source_document".to_owned(), json!(source)),
            ]);

            // Document-level metadata wins on key collisions.
            for (key, value) in &document.metadata {
                metadata.insert(key.clone(), value.clone());
            }

            chunks.push(DocumentChunk {
                content: content.to_owned(),
                metadata,
                embedding: None,
            });

            chunk_index += 1;
            start += step;
        }

        chunks
    }

    #[must_use]
    pub fn info(&self) -> ChunkerInfo {
        ChunkerInfo {
            chunker_type: "overlap",
            chunk_size: self.chunk_size,
            overlap_size: self.overlap_size,
            step_size: self.chunk_size - self.overlap_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_doc(text: &str) -> ParsedDocument {
        ParsedDocument {
            text: text.to_owned(),
            metadata: HashMap::from([("source".to_owned(), json!("test.txt"))]),
        }
    }

    #[test]
    fn reject_overlap_equal_to_chunk_size() {
        assert!(OverlapChunker::new(50, 50).is_err());
        assert!(OverlapChunker::new(50, 60).is_err());
        assert!(OverlapChunker::new(0, 0).is_err());
    }

    #[test]
    fn empty_document_yields_no_chunks() {
        let chunker = OverlapChunker::new(50, 10).unwrap();
        assert!(chunker.chunk(&make_doc("")).is_empty());
    }

    #[test]
    fn window_positions_50_10_over_120_chars() {
        let text: String = ('a'..='z').cycle().take(120).collect();
        let chunker = OverlapChunker::new(50, 10).unwrap();
        let chunks = chunker.chunk(&make_doc(&text));

        assert_eq!(chunks.len(), 3);
        for (i, expected_start) in [0, 40, 80].into_iter().enumerate() {
            assert_eq!(chunks[i].metadata["chunk_index"], json!(i));
            assert_eq!(chunks[i].metadata["start_position"], json!(expected_start));
        }
        assert_eq!(chunks[0].metadata["end_position"], json!(50));
        assert_eq!(chunks[2].metadata["end_position"], json!(120));
    }

    #[test]
    fn first_chunk_records_zero_overlap() {
        let text: String = "x".repeat(100);
        let chunker = OverlapChunker::new(50, 10).unwrap();
        let chunks = chunker.chunk(&make_doc(&text));

        assert_eq!(chunks[0].metadata["overlap_size"], json!(0));
        assert_eq!(chunks[1].metadata["overlap_size"], json!(10));
    }

    #[test]
    fn consecutive_windows_share_overlap() {
        let text: String = ('0'..='9').cycle().take(200).collect();
        let chunker = OverlapChunker::new(40, 15).unwrap();
        let chunks = chunker.chunk(&make_doc(&text));

        for pair in chunks.windows(2) {
            let prev_end = pair[0].metadata["end_position"].as_u64().unwrap();
            let next_start = pair[1].metadata["start_position"].as_u64().unwrap();
            assert_eq!(prev_end - next_start, 15);
        }
    }

    #[test]
    fn blank_window_skipped_but_step_consumed() {
        // chars 10..20 are whitespace, so the second window (start 10) emits
        // nothing; the third window (start 20) is still emitted with
        // chunk_index 1.
        let text = format!("{}{}{}", "a".repeat(10), " ".repeat(10), "b".repeat(10));
        let chunker = OverlapChunker::new(10, 0).unwrap();
        let chunks = chunker.chunk(&make_doc(&text));

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].metadata["start_position"], json!(0));
        assert_eq!(chunks[1].metadata["start_position"], json!(20));
        assert_eq!(chunks[1].metadata["chunk_index"], json!(1));
    }

    #[test]
    fn whitespace_only_document_yields_no_chunks() {
        let chunker = OverlapChunker::new(10, 2).unwrap();
        assert!(chunker.chunk(&make_doc("   \n\t  \n   ")).is_empty());
    }

    #[test]
    fn content_is_trimmed_but_positions_are_not() {
        let chunker = OverlapChunker::new(10, 0).unwrap();
        let chunks = chunker.chunk(&make_doc("  hello   "));

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "hello");
        assert_eq!(chunks[0].metadata["start_position"], json!(0));
        assert_eq!(chunks[0].metadata["end_position"], json!(10));
        assert_eq!(chunks[0].metadata["chunk_size"], json!(5));
    }

    #[test]
    fn document_metadata_inherited_and_wins() {
        let mut doc = make_doc(&"z".repeat(30));
        doc.metadata
            .insert("author".to_owned(), json!("somebody"));
        doc.metadata.insert("chunk_size".to_owned(), json!(999));

        let chunker = OverlapChunker::new(20, 5).unwrap();
        let chunks = chunker.chunk(&doc);

        assert_eq!(chunks[0].metadata["author"], json!("somebody"));
        assert_eq!(chunks[0].metadata["source_document"], json!("test.txt"));
        // document keys overwrite chunk-provided keys
        assert_eq!(chunks[0].metadata["chunk_size"], json!(999));
    }

    #[test]
    fn multibyte_text_slices_by_chars() {
        let text = "日本語のテキストです".repeat(5);
        let chunker = OverlapChunker::new(12, 4).unwrap();
        let chunks = chunker.chunk(&make_doc(&text));

        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.content.chars().count() <= 12);
        }
    }

    #[test]
    fn deterministic_output() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(10);
        let chunker = OverlapChunker::new(64, 16).unwrap();
        let doc = make_doc(&text);

        let first = chunker.chunk(&doc);
        let second = chunker.chunk(&doc);
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.content, b.content);
            assert_eq!(a.metadata, b.metadata);
        }
    }

    #[test]
    fn info_reports_window() {
        let chunker = OverlapChunker::new(100, 20).unwrap();
        let info = chunker.info();
        assert_eq!(info.chunk_size, 100);
        assert_eq!(info.overlap_size, 20);
        assert_eq!(info.step_size, 80);
    }

    mod proptest_chunker {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(500))]

            #[test]
            fn chunk_never_panics_and_terminates(
                text in "\\PC{0,2000}",
                chunk_size in 1usize..300,
                overlap in 0usize..300,
            ) {
                prop_assume!(overlap < chunk_size);
                let chunker = OverlapChunker::new(chunk_size, overlap).unwrap();
                let _ = chunker.chunk(&make_doc(&text));
            }

            #[test]
            fn chunk_indices_sequential(
                text in "[a-z ]{0,1000}",
                chunk_size in 2usize..100,
            ) {
                let chunker = OverlapChunker::new(chunk_size, chunk_size / 2).unwrap();
                let chunks = chunker.chunk(&make_doc(&text));
                for (i, chunk) in chunks.iter().enumerate() {
                    prop_assert_eq!(&chunk.metadata["chunk_index"], &json!(i));
                }
            }

            #[test]
            fn no_empty_chunks_emitted(
                text in "[a-z \\n]{0,1000}",
                chunk_size in 1usize..100,
            ) {
                let chunker = OverlapChunker::new(chunk_size, 0).unwrap();
                for chunk in chunker.chunk(&make_doc(&text)) {
                    prop_assert!(!chunk.content.trim().is_empty());
                }
            }

            #[test]
            fn starts_advance_by_step(
                text in "[a-z]{1,500}",
                chunk_size in 2usize..64,
                overlap in 0usize..63,
            ) {
                prop_assume!(overlap < chunk_size);
                let step = chunk_size - overlap;
                let chunker = OverlapChunker::new(chunk_size, overlap).unwrap();
                let chunks = chunker.chunk(&make_doc(&text));
                for chunk in &chunks {
                    let start = chunk.metadata["start_position"].as_u64().unwrap();
                    prop_assert_eq!(start as usize % step, 0);
                }
            }
        }
    }
}
