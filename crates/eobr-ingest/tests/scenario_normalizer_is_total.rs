//! Normalization never fails for either known shape, however sparse.
//!
//! Rejection is the validator's job: every record here normalizes, and the
//! incomplete ones then fail validation with a reason.

use eobr_ingest::{load_input, normalize, validate, RawRecord, ValidationFailure};
use serde_json::json;

fn normalize_value(v: serde_json::Value) -> eobr_schemas::CanonicalRecord {
    let raw = RawRecord::from_value(v, "fixture.json").expect("known shape");
    normalize(&raw, "fixture.json")
}

#[test]
fn empty_service_lines_normalize_then_fail_validation() {
    let rec = normalize_value(json!({
        "order_id": "E1",
        "service_lines": [],
        "order_details": { "PatientName": "Jane Doe" },
        "provider_details": { "Billing_Name": "Acme Clinic" }
    }));

    assert!(rec.line_items.is_empty());
    assert_eq!(validate(&rec), Err(ValidationFailure::NoLineItems));
}

#[test]
fn sparse_inputs_of_both_shapes_normalize() {
    let inputs = [
        json!({ "service_lines": [{}] }),
        json!({ "line_items": [{}], "patient_info": "oops", "provider_info": [] }),
        json!({ "data": { "line_items": [] } }),
        json!({ "data": {} , "line_items": [] }),
    ];

    for v in inputs {
        let rec = normalize_value(v);
        assert!(validate(&rec).is_err());
    }
}

#[test]
fn null_rate_on_any_line_rejects_record() {
    let rec = normalize_value(json!({
        "order_id": "R1",
        "service_lines": [
            { "date_of_service": "2025-03-01", "cpt_code": "99213", "assigned_rate": 80.0 },
            { "date_of_service": "2025-03-01", "cpt_code": "99214", "assigned_rate": null }
        ],
        "order_details": { "PatientName": "Jane Doe" },
        "provider_details": { "Billing_Name": "Acme Clinic" }
    }));

    assert_eq!(rec.line_items.len(), 2);
    assert_eq!(
        validate(&rec),
        Err(ValidationFailure::MissingValidatedRate { line: 1 })
    );
}

#[test]
fn directory_of_mixed_shapes_loads_in_name_order() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("02_canonical.json"),
        json!({
            "data": {
                "order_id": "C2",
                "date_of_service": "2025-02-02",
                "patient_info": { "name": "Sam Roe" },
                "provider_info": { "billing_name": "Roe Imaging" },
                "line_items": [{ "cpt": "70450", "validated_rate": "120.00" }]
            }
        })
        .to_string(),
    )
    .unwrap();
    std::fs::write(
        dir.path().join("01_service_lines.json"),
        json!({
            "order_id": "S1",
            "service_lines": [{ "date_of_service": "2025-01-01", "cpt_code": 99213, "assigned_rate": 80 }],
            "order_details": { "PatientName": "Jane Doe" },
            "provider_details": { "Billing_Name": "Acme Clinic" }
        })
        .to_string(),
    )
    .unwrap();

    let items = load_input(dir.path()).unwrap();
    assert_eq!(items.len(), 2);

    let records: Vec<_> = items
        .iter()
        .map(|i| normalize(i.parsed.as_ref().unwrap(), &i.source))
        .collect();

    assert_eq!(records[0].order_id.as_deref(), Some("S1"));
    assert_eq!(records[0].source_file, "01_service_lines.json");
    assert_eq!(records[1].order_id.as_deref(), Some("C2"));
    assert!(records.iter().all(|r| validate(r).is_ok()));
}
