//! End-to-end ingestion and query behaviour with in-process fakes.

mod common;

use std::collections::BTreeSet;
use std::fs;
use std::sync::atomic::Ordering;

use common::{CannedLlm, FailingEmbedder, KeywordEmbedder};
use hsbc_assist::pipeline::{PipelineError, RagPipeline};
use hsbc_assist::{Answerer, ChunkingConfig, DocumentSource, RowId, StoreInconsistencyError};
use tempfile::TempDir;

const THREE_PARAGRAPHS: &str = "Paragraph one. Paragraph two. Paragraph three.";
const FIVE_PARAGRAPHS: &str =
    "Paragraph one. Paragraph two. Paragraph three. Paragraph four. Paragraph five.";

fn pipeline_with(llm: CannedLlm) -> RagPipeline {
    RagPipeline::new(
        ChunkingConfig::new(20, 5),
        Box::new(KeywordEmbedder::new()),
        Box::new(llm),
    )
    .unwrap()
}

fn assert_dense(pipeline: &RagPipeline) {
    let kb = pipeline.knowledge();
    let kb = kb.read();
    let ids: Vec<RowId> = kb.document_store().ids().collect();
    let expected: Vec<RowId> = (0..kb.len()).map(RowId).collect();
    assert_eq!(ids, expected);
    assert_eq!(kb.find_inconsistency(), None);
}

#[test]
fn test_three_paragraph_end_to_end() {
    let llm = CannedLlm::new("  The second paragraph says: Paragraph two.\n");
    let pipeline = pipeline_with(llm.clone());

    let added = pipeline
        .ingest(&DocumentSource::from_text("doc", THREE_PARAGRAPHS))
        .unwrap();
    assert_eq!(added, 3);

    let kb = pipeline.knowledge();
    {
        let kb = kb.read();
        let texts: Vec<&str> = kb
            .document_store()
            .iter()
            .map(|(_, c)| c.text.as_str())
            .collect();
        assert_eq!(texts, vec!["Paragraph one. ", "Paragraph two. ", "Paragraph three."]);
    }

    let rows = pipeline.query("second paragraph", 1).unwrap();
    assert_eq!(rows, vec![RowId(1)]);
    let hit = kb.read().document_store().get(rows[0]).unwrap().text.clone();
    assert_eq!(hit, "Paragraph two. ");

    let answer = pipeline.with_top_k(1).ask("second paragraph").unwrap();
    assert_eq!(answer, "The second paragraph says: Paragraph two.");
    let prompts = llm.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Paragraph two."));
    assert!(!prompts[0].contains("Paragraph three."));
}

#[test]
fn test_rows_stay_dense_across_documents() {
    let pipeline = pipeline_with(CannedLlm::new("ok"));
    let first = pipeline
        .ingest(&DocumentSource::from_text("a", THREE_PARAGRAPHS))
        .unwrap();
    let second = pipeline
        .ingest(&DocumentSource::from_text("b", FIVE_PARAGRAPHS))
        .unwrap();
    assert_eq!(first + second, 8);
    assert_eq!(pipeline.len(), 8);
    assert_dense(&pipeline);

    let kb = pipeline.knowledge();
    let kb = kb.read();
    let sources = kb.sources();
    assert_eq!(sources[0].rows, 0..3);
    assert_eq!(sources[1].rows, 3..8);
    assert_eq!(kb.document_store().get(RowId(3)).unwrap().source_id.as_str(), "b");
    assert_eq!(kb.document_store().get(RowId(3)).unwrap().sequence_index, 0);
}

#[test]
fn test_concurrent_ingest_keeps_rows_dense() {
    let pipeline = pipeline_with(CannedLlm::new("ok"));

    let totals: Vec<usize> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let pipeline = &pipeline;
                scope.spawn(move || {
                    let text = if i % 2 == 0 { THREE_PARAGRAPHS } else { FIVE_PARAGRAPHS };
                    pipeline
                        .ingest(&DocumentSource::from_text(format!("doc-{i}"), text))
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(totals.iter().sum::<usize>(), 4 * 3 + 4 * 5);
    assert_eq!(pipeline.len(), 32);
    assert_dense(&pipeline);

    // Every document occupies one contiguous block of rows, in sequence order
    let kb = pipeline.knowledge();
    let kb = kb.read();
    for source in kb.sources() {
        for (offset, row) in source.rows.clone().enumerate() {
            let chunk = kb.document_store().get(RowId(row)).unwrap();
            assert_eq!(chunk.source_id, source.source_id);
            assert_eq!(chunk.sequence_index, offset);
        }
    }
}

#[test]
fn test_failed_embedding_batch_commits_nothing() {
    let chunks = hsbc_assist::documents::chunk_text(FIVE_PARAGRAPHS, &ChunkingConfig::new(20, 5));
    assert_eq!(chunks.len(), 5);

    let pipeline = RagPipeline::new(
        ChunkingConfig::new(20, 5),
        Box::new(FailingEmbedder::new(3)),
        Box::new(CannedLlm::new("ok")),
    )
    .unwrap();

    let err = pipeline
        .ingest(&DocumentSource::from_text("doc", FIVE_PARAGRAPHS))
        .unwrap_err();
    assert!(matches!(err, PipelineError::Embedding(_)));
    assert!(pipeline.is_empty());
    assert!(pipeline.knowledge().read().document_store().is_empty());
    assert!(pipeline.knowledge().read().sources().is_empty());

    // The failure is spent; the next ingest starts from row 0
    let added = pipeline
        .ingest(&DocumentSource::from_text("doc", THREE_PARAGRAPHS))
        .unwrap();
    assert_eq!(added, 3);
    assert_dense(&pipeline);
}

#[test]
fn test_query_is_deterministic() {
    let a = pipeline_with(CannedLlm::new("ok"));
    let b = pipeline_with(CannedLlm::new("ok"));
    for pipeline in [&a, &b] {
        pipeline
            .ingest(&DocumentSource::from_text("doc", FIVE_PARAGRAPHS))
            .unwrap();
    }

    let first = a.query("third paragraph", 3).unwrap();
    assert_eq!(first, a.query("third paragraph", 3).unwrap());
    assert_eq!(first, b.query("third paragraph", 3).unwrap());
    assert_eq!(first[0], RowId(2));
    // Rows 3 and 4 tie on distance and come back in row order
    assert_eq!(&first[1..], &[RowId(3), RowId(4)]);
}

#[test]
fn test_empty_index_query_skips_embedder() {
    let embedder = KeywordEmbedder::new();
    let calls = embedder.calls.clone();
    let pipeline = RagPipeline::new(
        ChunkingConfig::new(20, 5),
        Box::new(embedder),
        Box::new(CannedLlm::new("ok")),
    )
    .unwrap();

    assert!(pipeline.query("anything", 5).unwrap().is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    pipeline
        .ingest(&DocumentSource::from_text("doc", THREE_PARAGRAPHS))
        .unwrap();
    let after_ingest = calls.load(Ordering::SeqCst);
    assert!(pipeline.query("anything", 0).unwrap().is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), after_ingest);
}

#[test]
fn test_k_larger_than_index_returns_all_rows() {
    let pipeline = pipeline_with(CannedLlm::new("ok"));
    pipeline
        .ingest(&DocumentSource::from_text("doc", THREE_PARAGRAPHS))
        .unwrap();
    let rows: BTreeSet<RowId> = pipeline.query("paragraph", 10).unwrap().into_iter().collect();
    assert_eq!(rows, (0..3).map(RowId).collect());
}

#[test]
fn test_missing_chunk_is_reported() {
    let llm = CannedLlm::new("should not be called");
    let pipeline = pipeline_with(llm.clone());
    pipeline
        .ingest(&DocumentSource::from_text("doc", THREE_PARAGRAPHS))
        .unwrap();

    let mut store = pipeline.knowledge().read().document_store().clone();
    store.remove(RowId(1));

    let rows = pipeline.query("second paragraph", 2).unwrap();
    assert_eq!(rows[0], RowId(1));
    let err = Answerer::default()
        .answer("second paragraph", &rows, &store, &llm)
        .unwrap_err();
    assert!(matches!(
        err,
        hsbc_assist::qa::AnswerError::Store(StoreInconsistencyError { row_id: RowId(1) })
    ));
    assert!(llm.prompts.lock().unwrap().is_empty());
}

#[test]
fn test_empty_document_adds_nothing() {
    let pipeline = pipeline_with(CannedLlm::new("ok"));
    let added = pipeline
        .ingest(&DocumentSource::from_text("blank", "  \n\n "))
        .unwrap();
    assert_eq!(added, 0);
    assert!(pipeline.is_empty());
}

#[test]
fn test_invalid_chunking_is_rejected() {
    let err = RagPipeline::new(
        ChunkingConfig::new(10, 10),
        Box::new(KeywordEmbedder::new()),
        Box::new(CannedLlm::new("ok")),
    )
    .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidConfig(_)));
}

#[test]
fn test_directory_ingest() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.txt"), THREE_PARAGRAPHS).unwrap();
    fs::create_dir(dir.path().join("nested")).unwrap();
    fs::write(dir.path().join("nested").join("b.md"), FIVE_PARAGRAPHS).unwrap();
    fs::write(dir.path().join("scan.png"), [0x89, b'P', b'N', b'G']).unwrap();
    fs::write(dir.path().join("data.bin"), [0u8, 1, 2]).unwrap();
    fs::write(dir.path().join("broken.txt"), [0xff, 0xfe, 0xfd]).unwrap();
    fs::write(dir.path().join("garbage.pdf"), b"%PDF-1.7\n1 0 obj\n<< /Type").unwrap();

    let pipeline = pipeline_with(CannedLlm::new("ok"));
    let report = pipeline.ingest_path(dir.path()).unwrap();

    assert_eq!(report.documents, 2);
    assert_eq!(report.chunks, 8);
    // No OCR configured, so the image is skipped along with the unknown file
    assert_eq!(report.skipped.len(), 2);
    // Unreadable text and a malformed PDF fail on their own; the walk goes on
    assert_eq!(report.failed.len(), 2);
    assert!(report.failed[0].0.as_str().ends_with("broken.txt"));
    assert!(report.failed[1].0.as_str().ends_with("garbage.pdf"));
    assert_eq!(pipeline.len(), 8);
    assert_dense(&pipeline);
}

#[test]
fn test_duplicate_content_is_still_indexed() {
    let pipeline = pipeline_with(CannedLlm::new("ok"));
    pipeline
        .ingest(&DocumentSource::from_text("a", THREE_PARAGRAPHS))
        .unwrap();
    pipeline
        .ingest(&DocumentSource::from_text("copy-of-a", THREE_PARAGRAPHS))
        .unwrap();
    let kb = pipeline.knowledge();
    let kb = kb.read();
    assert_eq!(kb.len(), 6);
    assert_eq!(kb.sources()[0].content_hash, kb.sources()[1].content_hash);
}
