//! `eobr ledger status|list|reset`
//!
//! Administrative access to the payment ledger. Nothing here is reachable
//! from the reconciliation engine.

use anyhow::{anyhow, bail, Result};

use eobr_db::Ledger;
use eobr_schemas::LedgerKey;

pub async fn status(url: &str) -> Result<()> {
    let ledger = Ledger::connect(url).await?;
    let s = ledger.status().await?;
    println!("ledger_ok={} has_line_items_table={}", s.ok, s.has_line_items_table);
    ledger.close().await;
    Ok(())
}

pub async fn list(url: &str, order_id: Option<&str>, limit: i64) -> Result<()> {
    let ledger = Ledger::connect(url).await?;
    let rows = ledger.list_line_items(order_id, limit).await?;

    println!("rows={}", rows.len());
    for r in &rows {
        println!(
            "key={} cpt={} paid={} rate={} eobr_doc_no={} processed_date={} updated_at={}",
            r.key,
            r.cpt.as_deref().unwrap_or(""),
            r.paid.map(|c| c.to_plain_string()).unwrap_or_default(),
            r.rate.map(|c| c.to_plain_string()).unwrap_or_default(),
            r.eobr_doc_no.as_deref().unwrap_or(""),
            r.processed_date.as_deref().unwrap_or(""),
            r.updated_at,
        );
    }
    ledger.close().await;
    Ok(())
}

pub async fn reset(url: &str, raw_keys: &[String], yes: bool) -> Result<()> {
    let keys = parse_keys(raw_keys)?;
    if !yes {
        bail!(
            "REFUSING RESET: {} line item(s) would be billed again on the next run. Re-run with: `eobr ledger reset ... --yes`",
            keys.len()
        );
    }

    let ledger = Ledger::connect(url).await?;
    let n = ledger.reset_payments(&keys).await?;
    println!("reset_rows={}", n);
    ledger.close().await;
    Ok(())
}

fn parse_keys(raw: &[String]) -> Result<Vec<LedgerKey>> {
    raw.iter()
        .map(|s| s.parse::<LedgerKey>().map_err(|e| anyhow!(e)))
        .collect()
}
