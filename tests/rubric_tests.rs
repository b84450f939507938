
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rand::Rng;
use ta_marking::error::MarkingError;
use ta_marking::rubric::{CorrectionOutcome, FileSink, MemorySink, RubricLine, RubricStore};
use test_harness::FailingSink;

fn memory_store(questions: usize) -> (Arc<RubricStore>, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let store = RubricStore::with_defaults(questions, sink.clone());
    (Arc::new(store), sink)
}

#[tokio::test]
async fn test_single_correction() {
    let (store, sink) = memory_store(5);

    let outcome = store.begin_write().await.correct_line(0, 1).await;

    assert_eq!(
        outcome,
        CorrectionOutcome::Corrected {
            before: 'A',
            after: 'B',
            persisted: true
        }
    );
    assert_eq!(store.snapshot().await[0], "1, B");
    assert_eq!(
        sink.latest().unwrap(),
        vec!["1, B", "2, B", "3, C", "4, D", "5, E"]
    );
}

#[tokio::test]
async fn test_sequential_corrections_accumulate() {
    let (store, sink) = memory_store(5);

    let mut befores = Vec::new();
    for _ in 0..4 {
        let mut writer = store.begin_write().await;
        match writer.correct_line(2, 1).await {
            CorrectionOutcome::Corrected { before, .. } => befores.push(before),
            CorrectionOutcome::Unchanged => panic!("line 3 is well formed"),
        }
    }

    assert_eq!(befores, vec!['C', 'D', 'E', 'F']);
    assert_eq!(store.snapshot().await[2], "3, G");
    assert_eq!(sink.snapshots().len(), 4);
}

#[tokio::test]
async fn test_malformed_line_is_not_corrected() {
    let sink = Arc::new(MemorySink::new());
    let lines = vec![RubricLine::from_text("1 A"), RubricLine::new(2, 'B')];
    let store = RubricStore::new(lines, sink.clone());

    let outcome = store.begin_write().await.correct_line(0, 1).await;

    assert_eq!(outcome, CorrectionOutcome::Unchanged);
    assert_eq!(store.snapshot().await, vec!["1 A", "2, B"]);
    assert!(sink.snapshots().is_empty());
}

#[tokio::test]
async fn test_out_of_bounds_correction_is_not_applied() {
    let (store, sink) = memory_store(2);

    let outcome = store.begin_write().await.correct_line(7, 1).await;

    assert_eq!(outcome, CorrectionOutcome::Unchanged);
    assert_eq!(store.snapshot().await, vec!["1, A", "2, B"]);
    assert!(sink.snapshots().is_empty());
}

#[tokio::test]
async fn test_persist_failure_keeps_correction() {
    let store = RubricStore::with_defaults(3, Arc::new(FailingSink));

    let outcome = store.begin_write().await.correct_line(1, 2).await;

    assert_eq!(
        outcome,
        CorrectionOutcome::Corrected {
            before: 'B',
            after: 'C',
            persisted: false
        }
    );
    assert_eq!(store.snapshot().await[1], "2, C");
    assert!(store.flush().await.is_err());
}

#[tokio::test]
async fn test_file_sink_overwrites_rubric_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rubric.txt");
    let store = RubricStore::with_defaults(3, Arc::new(FileSink::new(&path)));

    store.flush().await.unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "1, A\n2, B\n3, C\n");

    store.begin_write().await.correct_line(2, 1).await;
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "1, A\n2, B\n3, D\n");
}

#[tokio::test]
async fn test_file_sink_reports_unwritable_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("rubric.txt");
    let store = RubricStore::with_defaults(1, Arc::new(FileSink::new(&path)));

    let err = store.flush().await.unwrap_err();
    assert!(matches!(err, MarkingError::Persist { .. }));

    let outcome = store.begin_write().await.correct_line(0, 1).await;
    assert!(matches!(
        outcome,
        CorrectionOutcome::Corrected {
            persisted: false,
            ..
        }
    ));
}

#[tokio::test]
async fn test_load_rubric_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("input.txt");
    std::fs::write(&path, "1, C\n2 broken\n3, A\n").unwrap();

    let store = RubricStore::load(&path, 3, Arc::new(MemorySink::new()))
        .await
        .unwrap();
    assert_eq!(store.question_count(), 3);
    assert_eq!(store.snapshot().await, vec!["1, C", "2 broken", "3, A"]);

    let mut writer = store.begin_write().await;
    assert_eq!(writer.correct_line(1, 1).await, CorrectionOutcome::Unchanged);
    assert!(matches!(
        writer.correct_line(0, 1).await,
        CorrectionOutcome::Corrected { after: 'D', .. }
    ));
}

#[tokio::test]
async fn test_load_rejects_wrong_line_count() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("input.txt");
    std::fs::write(&path, "1, A\n2, B\n").unwrap();

    let err = RubricStore::load(&path, 5, Arc::new(MemorySink::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, MarkingError::InvalidRubric(_)));
}

/// Many tasks mixing reads and writes; instrumented counters check that no
/// two writers overlap and no writer overlaps a reader.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_and_writers_never_overlap() {
    let (store, sink) = memory_store(5);
    let readers = Arc::new(AtomicUsize::new(0));
    let writers = Arc::new(AtomicUsize::new(0));
    let max_readers = Arc::new(AtomicUsize::new(0));
    let writes = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for task_id in 0..8usize {
        let store = store.clone();
        let readers = readers.clone();
        let writers = writers.clone();
        let max_readers = max_readers.clone();
        let writes = writes.clone();
        handles.push(tokio::spawn(async move {
            for round in 0..200usize {
                let write = rand::thread_rng().gen_bool(0.1);
                if write {
                    let mut writer = store.begin_write().await;
                    assert_eq!(writers.fetch_add(1, Ordering::SeqCst), 0, "two writers");
                    assert_eq!(readers.load(Ordering::SeqCst), 0, "writer with readers");
                    writer.correct_line((task_id + round) % 5, task_id).await;
                    tokio::task::yield_now().await;
                    writers.fetch_sub(1, Ordering::SeqCst);
                    writes.fetch_add(1, Ordering::SeqCst);
                } else {
                    let lines = store.begin_read().await;
                    let now = readers.fetch_add(1, Ordering::SeqCst) + 1;
                    max_readers.fetch_max(now, Ordering::SeqCst);
                    assert_eq!(writers.load(Ordering::SeqCst), 0, "reader with writer");
                    assert_eq!(lines.len(), 5);
                    tokio::task::yield_now().await;
                    readers.fetch_sub(1, Ordering::SeqCst);
                }
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // Every write advanced exactly one criterion by one step.
    let advanced: u32 = store
        .snapshot()
        .await
        .iter()
        .zip(RubricLine::defaults(5))
        .map(|(now, initial)| {
            test_harness::criterion_of(now) as u32 - initial.criterion().unwrap() as u32
        })
        .sum();
    assert_eq!(advanced as usize, writes.load(Ordering::SeqCst));
    assert_eq!(sink.snapshots().len(), writes.load(Ordering::SeqCst));
    assert!(max_readers.load(Ordering::SeqCst) >= 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_corrections_on_different_questions() {
    let (store, sink) = memory_store(5);

    let mut handles = Vec::new();
    for question in 0..5usize {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let mut befores = Vec::new();
            for _ in 0..3 {
                if let CorrectionOutcome::Corrected { before, .. } =
                    store.begin_write().await.correct_line(question, question + 1).await
                {
                    befores.push(before);
                }
            }
            befores
        }));
    }

    for (question, handle) in handles.into_iter().enumerate() {
        let befores = handle.await.unwrap();
        let start = b'A' + question as u8;
        let expected: Vec<char> = (0..3).map(|i| (start + i) as char).collect();
        assert_eq!(befores, expected);
    }
    assert_eq!(
        store.snapshot().await,
        vec!["1, D", "2, E", "3, F", "4, G", "5, H"]
    );
    assert_eq!(sink.snapshots().len(), 15);
}
