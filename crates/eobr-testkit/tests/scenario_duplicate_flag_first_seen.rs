//! Within one run the first record with a duplicate key is clean and the
//! next one is flagged; both are still processed and paid.

use eobr_reconcile::DuplicateIndex;
use eobr_testkit::*;

#[tokio::test]
async fn resubmission_in_same_run_is_flagged_not_rejected() {
    let ledger = memory_ledger().await.unwrap();
    let mut engine = fixture_engine(RecordingSink::default(), ledger, DuplicateIndex::empty());

    // Same order, patient, provider, DOS and CPT; different ledger line.
    let batch = vec![
        item("a1.json", service_lines_record("A1", 42, "99213", 80.0)),
        item("a1_again.json", service_lines_record("A1", 99, "99213", 80.0)),
    ];
    let summary = engine.run(&batch).await;

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.duplicates, 1);
    assert_eq!(summary.ledger_writes, 2);

    let paths = fixture_paths(std::path::Path::new("fixture"));
    let rows = engine.sink().rows_for(&paths.run_export);
    assert_eq!(rows.len(), 2);
    assert!(!rows[0].duplicate);
    assert!(rows[1].duplicate);
    assert_eq!(rows[1].duplicate_check(), "DUPLICATE");
    assert_eq!(rows[1].release_payment(), "No");
    assert_ne!(rows[0].document_number, rows[1].document_number);
}

#[tokio::test]
async fn history_flags_and_reserves_numbers() {
    let ledger = memory_ledger().await.unwrap();
    let key = "A1|Acme Clinic|Jane Doe|2025-03-01|99213".to_string();
    let index = DuplicateIndex::from_parts([key], ["EOBR-20250305-0001".to_string()]);
    let mut engine = fixture_engine(RecordingSink::default(), ledger, index);

    engine.run(&[item("a1.json", example_record())]).await;

    let paths = fixture_paths(std::path::Path::new("fixture"));
    let rows = engine.sink().rows_for(&paths.run_export);
    assert!(rows[0].duplicate);
    assert_eq!(rows[0].document_number, "EOBR-20250305-0002");
}
