//! Two records sharing a duplicate key in one run: the first is clean, the
//! second is flagged. History counts as "seen before" too.

use chrono::NaiveDate;
use eobr_config::{DefaultsConfig, RulesConfig};
use eobr_reconcile::*;
use eobr_schemas::{CanonicalRecord, Cents, LineItem, PatientInfo, ProviderInfo};

fn record(order: &str, source: &str) -> CanonicalRecord {
    CanonicalRecord {
        order_id: Some(order.to_string()),
        source_file: source.to_string(),
        date_of_service: Some("2025-03-01".to_string()),
        patient_info: PatientInfo {
            name: Some("Jane Doe".to_string()),
            ..PatientInfo::default()
        },
        provider_info: ProviderInfo {
            billing_name: Some("Acme Clinic".to_string()),
            ..ProviderInfo::default()
        },
        line_items: vec![LineItem {
            cpt: Some("99213".to_string()),
            validated_rate: Some(Cents::new(8_000)),
            ..LineItem::default()
        }],
    }
}

fn run(index: &mut DuplicateIndex, records: &[CanonicalRecord]) -> Vec<bool> {
    let rules = RulesConfig::default();
    let defaults = DefaultsConfig::default();
    let bill_date = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
    let mut numbers = DocumentNumberAllocator::new("EOBR-", bill_date);

    records
        .iter()
        .map(|r| {
            let key = duplicate_key(r);
            let dup = index.is_duplicate(&key);
            let doc = numbers.allocate(|n| index.is_seen_control_number(n));
            let row = build_output_row(
                r,
                RowContext {
                    rules: &rules,
                    defaults: &defaults,
                    bill_date,
                },
                &doc,
                dup,
            )
            .unwrap();
            index.register(row.duplicate_key.clone());
            row.duplicate
        })
        .collect()
}

#[test]
fn second_submission_in_same_run_is_flagged() {
    let mut index = DuplicateIndex::empty();
    let flags = run(
        &mut index,
        &[record("A1", "a.json"), record("A1", "a_resubmitted.json"), record("B2", "b.json")],
    );
    assert_eq!(flags, vec![false, true, false]);
}

#[test]
fn key_from_history_is_flagged_on_first_sight() {
    let r = record("A1", "a.json");
    let mut index = DuplicateIndex::from_parts([duplicate_key(&r)], Vec::<String>::new());
    assert_eq!(run(&mut index, &[r]), vec![true]);
}

#[test]
fn document_numbers_skip_history() {
    let bill_date = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
    let index = DuplicateIndex::from_parts(
        Vec::<String>::new(),
        [format_document_number("EOBR-", bill_date, 1)],
    );
    let mut numbers = DocumentNumberAllocator::new("EOBR-", bill_date);
    assert_eq!(
        numbers.allocate(|n| index.is_seen_control_number(n)),
        "EOBR-20250305-0002"
    );
}
