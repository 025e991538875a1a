//! Administrative reset nulls payment fields for exactly the given keys.

use chrono::NaiveDate;
use eobr_db::{Ledger, PaymentUpdate};
use eobr_schemas::{Cents, LedgerKey};

#[tokio::test]
async fn reset_clears_only_listed_keys() {
    let ledger = Ledger::connect("sqlite::memory:").await.unwrap();
    let keys = [
        LedgerKey::new(1, "A1"),
        LedgerKey::new(2, "A1"),
        LedgerKey::new(3, "B2"),
    ];
    for k in &keys {
        let ok = ledger
            .upsert_payment(&PaymentUpdate {
                key: k.clone(),
                cpt: None,
                paid: Cents::new(1_000),
                rate: Cents::new(1_000),
                document_number: "EOBR-X".to_string(),
                processed_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            })
            .await;
        assert!(ok);
    }

    let missing = LedgerKey::new(99, "NOPE");
    let n = ledger
        .reset_payments(&[keys[0].clone(), keys[2].clone(), missing])
        .await
        .unwrap();
    assert_eq!(n, 2);

    assert!(!ledger.is_paid(&keys[0]).await);
    assert!(ledger.is_paid(&keys[1]).await);
    assert!(!ledger.is_paid(&keys[2]).await);

    let row = ledger.get(&keys[0]).await.unwrap().expect("row kept");
    assert_eq!(row.rate, None);
    assert_eq!(row.eobr_doc_no, None);
    assert_eq!(row.hcfa_doc_no, None);
    assert_eq!(row.processed_date, None);
}
