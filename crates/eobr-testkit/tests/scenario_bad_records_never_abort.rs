//! Malformed input, upstream rejections, invalid records and an unreachable
//! ledger are all local to their record.

use eobr_db::Ledger;
use eobr_ingest::{IngestError, InputItem};
use eobr_reconcile::DuplicateIndex;
use eobr_testkit::*;
use serde_json::json;

#[tokio::test]
async fn every_item_is_either_processed_or_skipped() {
    let ledger = memory_ledger().await.unwrap();
    let mut engine = fixture_engine(RecordingSink::default(), ledger, DuplicateIndex::empty());

    let mut not_passed = example_record();
    not_passed["validation_status"] = json!("FAIL");

    let mut no_rate = service_lines_record("C3", 5, "99213", 10.0);
    no_rate["service_lines"][0]["assigned_rate"] = json!(null);

    let batch = vec![
        InputItem {
            source: "broken.json".into(),
            parsed: Err(IngestError::Json {
                source: "broken.json".into(),
                message: "expected value at line 1".into(),
            }),
        },
        item("unknown.json", json!({ "foo": 1 })),
        item("not_passed.json", not_passed),
        item("no_rate.json", no_rate),
        item("empty.json", json!({ "order_id": "E1", "service_lines": [] })),
        item("good.json", service_lines_record("G1", 1, "99213", 15.5)),
    ];

    let s = engine.run(&batch).await;
    assert_eq!(s.processed + s.skipped, batch.len() as u64);
    assert_eq!(s.processed, 1);
    assert_eq!(s.input_errors, 2);
    assert_eq!(s.not_passed, 1);
    assert_eq!(s.invalid, 2);
}

#[tokio::test]
async fn unreachable_ledger_means_unpaid_and_failed_writes() {
    let mut engine = fixture_engine(
        RecordingSink::default(),
        Ledger::unavailable(),
        DuplicateIndex::empty(),
    );

    let s = engine.run(&[item("a1.json", example_record())]).await;
    assert_eq!(s.processed, 1);
    assert_eq!(s.ledger_writes, 0);
    assert_eq!(s.ledger_write_failures, 1);
    assert_eq!(engine.sink().rendered.len(), 1);
}

#[tokio::test]
async fn rates_too_large_to_total_are_invalid_not_fatal() {
    let ledger = memory_ledger().await.unwrap();
    let mut engine = fixture_engine(RecordingSink::default(), ledger, DuplicateIndex::empty());

    let mut huge = service_lines_record("H1", 7, "99213", 5e16);
    let second = huge["service_lines"][0].clone();
    huge["service_lines"].as_array_mut().unwrap().push(second);
    huge["service_lines"][1]["payment_id"] = json!({ "line_item_id": 8 });

    let batch = vec![
        item("huge.json", huge),
        item("good.json", service_lines_record("G1", 1, "99213", 15.5)),
    ];

    let s = engine.run(&batch).await;
    assert_eq!(s.invalid, 1);
    assert_eq!(s.processed, 1);
    assert_eq!(engine.sink().rendered.len(), 1);
}
