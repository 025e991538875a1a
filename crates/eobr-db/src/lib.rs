//! eobr-db
//!
//! Payment ledger over SQLite. One row per `(line_item_id, order_id)`
//! holding the paid amount, applied rate, both document numbers and the
//! processed date.
//!
//! The pool is opened once per run and closed by the caller. The hot-path
//! calls ([`Ledger::is_paid`], [`Ledger::upsert_payment`]) never return an
//! error: an unreachable ledger reads as "not paid" and a failed write as
//! `false`, with a `warn!` either way.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::{debug, warn};

use eobr_schemas::{Cents, LedgerKey};

pub const LEDGER_TABLE: &str = "line_items";

const CREATE_LINE_ITEMS: &str = r#"
create table if not exists line_items (
  id                integer not null,
  order_id          text    not null,
  cpt               text,
  br_paid           real,
  br_rate           real,
  eobr_doc_no       text,
  hcfa_doc_no       text,
  br_date_processed text,
  updated_at        text    not null default current_timestamp,
  primary key (id, order_id)
)
"#;

/// One payment write: everything the ledger stores for a line item.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentUpdate {
    pub key: LedgerKey,
    pub cpt: Option<String>,
    pub paid: Cents,
    pub rate: Cents,
    /// Written to both document-number columns.
    pub document_number: String,
    pub processed_date: NaiveDate,
}

/// A ledger row as read back for admin listings and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRow {
    pub key: LedgerKey,
    pub cpt: Option<String>,
    pub paid: Option<Cents>,
    pub rate: Option<Cents>,
    pub eobr_doc_no: Option<String>,
    pub hcfa_doc_no: Option<String>,
    pub processed_date: Option<String>,
    pub updated_at: String,
}

impl LedgerRow {
    pub fn is_paid(&self) -> bool {
        self.paid.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct LedgerStatus {
    pub ok: bool,
    pub has_line_items_table: bool,
}

/// Scoped handle on the payment ledger.
///
/// `pool == None` is the degraded mode used when the store could not be
/// opened: reads say "not paid", writes return `false`.
#[derive(Debug, Clone)]
pub struct Ledger {
    pool: Option<SqlitePool>,
}

impl Ledger {
    /// Open (creating the file and schema if needed).
    pub async fn connect(url: &str) -> Result<Self> {
        if let Some(path) = sqlite_file_path(url) {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create ledger directory: {}", parent.display())
                })?;
            }
        }

        let opts = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("invalid ledger url: {url}"))?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        // Single writer; one connection also keeps `sqlite::memory:` alive.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await
            .context("failed to connect to ledger")?;

        let ledger = Self { pool: Some(pool) };
        ledger.ensure_schema().await?;
        Ok(ledger)
    }

    /// Like [`Ledger::connect`] but never fails: an unreachable store yields
    /// a degraded ledger.
    pub async fn open_or_degraded(url: &str) -> Self {
        match Self::connect(url).await {
            Ok(l) => l,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "ledger unavailable; treating every line item as unpaid");
                Self::unavailable()
            }
        }
    }

    /// Wrap an existing pool. The schema is created if absent.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let ledger = Self { pool: Some(pool) };
        ledger.ensure_schema().await?;
        Ok(ledger)
    }

    pub fn unavailable() -> Self {
        Self { pool: None }
    }

    pub fn is_available(&self) -> bool {
        self.pool.is_some()
    }

    pub fn pool(&self) -> Option<&SqlitePool> {
        self.pool.as_ref()
    }

    fn require_pool(&self) -> Result<&SqlitePool> {
        self.pool.as_ref().ok_or_else(|| anyhow!("ledger is not available"))
    }

    /// Idempotent: checks for the table before creating it.
    pub async fn ensure_schema(&self) -> Result<()> {
        let pool = self.require_pool()?;
        if table_exists(pool).await? {
            return Ok(());
        }
        sqlx::query(CREATE_LINE_ITEMS)
            .execute(pool)
            .await
            .context("create line_items table failed")?;
        debug!("ledger schema created");
        Ok(())
    }

    /// Connectivity + schema presence.
    pub async fn status(&self) -> Result<LedgerStatus> {
        let pool = self.require_pool()?;
        let (one,): (i64,) = sqlx::query_as::<_, (i64,)>("select 1")
            .fetch_one(pool)
            .await
            .context("status connectivity query failed")?;

        Ok(LedgerStatus {
            ok: one == 1,
            has_line_items_table: table_exists(pool).await?,
        })
    }

    // -----------------------------------------------------------------------
    // Hot path (fail open)
    // -----------------------------------------------------------------------

    /// `true` only when a row exists for `key` and its paid amount is set.
    pub async fn is_paid(&self, key: &LedgerKey) -> bool {
        let Some(pool) = self.pool.as_ref() else {
            return false;
        };
        if key.order_id.trim().is_empty() {
            return false;
        }

        let res = sqlx::query_as::<_, (Option<f64>,)>(
            "select br_paid from line_items where id = ?1 and order_id = ?2",
        )
        .bind(key.line_item_id)
        .bind(&key.order_id)
        .fetch_optional(pool)
        .await;

        match res {
            Ok(row) => matches!(row, Some((Some(_),))),
            Err(e) => {
                warn!(key = %key, error = %e, "ledger lookup failed; treating as unpaid");
                false
            }
        }
    }

    /// Insert-or-overwrite the row for `update.key` in one transaction.
    /// Returns `false` (after logging) on any failure.
    pub async fn upsert_payment(&self, update: &PaymentUpdate) -> bool {
        let Some(pool) = self.pool.as_ref() else {
            warn!(key = %update.key, "ledger unavailable; payment not recorded");
            return false;
        };

        match upsert_in_tx(pool, update).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key = %update.key, error = %format!("{e:#}"), "ledger upsert failed");
                false
            }
        }
    }

    // -----------------------------------------------------------------------
    // Administration (outside the reconciliation path)
    // -----------------------------------------------------------------------

    /// Null every payment field for `keys` in one transaction. Returns rows affected.
    pub async fn reset_payments(&self, keys: &[LedgerKey]) -> Result<u64> {
        let pool = self.require_pool()?;
        let mut tx = pool.begin().await.context("reset_payments begin failed")?;

        let mut affected = 0u64;
        for key in keys {
            let res = sqlx::query(
                r#"
                update line_items
                set br_paid = null,
                    br_rate = null,
                    eobr_doc_no = null,
                    hcfa_doc_no = null,
                    br_date_processed = null,
                    updated_at = current_timestamp
                where id = ?1 and order_id = ?2
                "#,
            )
            .bind(key.line_item_id)
            .bind(&key.order_id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("reset_payments failed for {key}"))?;
            affected += res.rows_affected();
        }

        tx.commit().await.context("reset_payments commit failed")?;
        Ok(affected)
    }

    /// Most recently updated rows first, optionally for one order.
    pub async fn list_line_items(&self, order_id: Option<&str>, limit: i64) -> Result<Vec<LedgerRow>> {
        let pool = self.require_pool()?;
        let rows = sqlx::query(
            r#"
            select id, order_id, cpt, br_paid, br_rate, eobr_doc_no, hcfa_doc_no,
                   br_date_processed, updated_at
            from line_items
            where ?1 is null or order_id = ?1
            order by updated_at desc, order_id, id
            limit ?2
            "#,
        )
        .bind(order_id)
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("list_line_items failed")?;

        rows.iter().map(row_to_ledger_row).collect()
    }

    pub async fn get(&self, key: &LedgerKey) -> Result<Option<LedgerRow>> {
        let pool = self.require_pool()?;
        let row = sqlx::query(
            r#"
            select id, order_id, cpt, br_paid, br_rate, eobr_doc_no, hcfa_doc_no,
                   br_date_processed, updated_at
            from line_items
            where id = ?1 and order_id = ?2
            "#,
        )
        .bind(key.line_item_id)
        .bind(&key.order_id)
        .fetch_optional(pool)
        .await
        .context("ledger get failed")?;

        row.as_ref().map(row_to_ledger_row).transpose()
    }

    /// Release the pool. A degraded ledger closes trivially.
    pub async fn close(self) {
        if let Some(pool) = self.pool {
            pool.close().await;
        }
    }
}

async fn table_exists(pool: &SqlitePool) -> Result<bool> {
    let (n,): (i64,) = sqlx::query_as::<_, (i64,)>(
        "select count(*) from sqlite_master where type = 'table' and name = ?1",
    )
    .bind(LEDGER_TABLE)
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;
    Ok(n > 0)
}

async fn upsert_in_tx(pool: &SqlitePool, u: &PaymentUpdate) -> Result<()> {
    let mut tx = pool.begin().await.context("upsert begin failed")?;

    sqlx::query(
        r#"
        insert into line_items (
          id, order_id, cpt, br_paid, br_rate, eobr_doc_no, hcfa_doc_no, br_date_processed, updated_at
        ) values (
          ?1, ?2, ?3, ?4, ?5, ?6, ?6, ?7, current_timestamp
        )
        on conflict (id, order_id) do update set
          cpt               = coalesce(excluded.cpt, line_items.cpt),
          br_paid           = excluded.br_paid,
          br_rate           = excluded.br_rate,
          eobr_doc_no       = excluded.eobr_doc_no,
          hcfa_doc_no       = excluded.hcfa_doc_no,
          br_date_processed = excluded.br_date_processed,
          updated_at        = current_timestamp
        "#,
    )
    .bind(u.key.line_item_id)
    .bind(&u.key.order_id)
    .bind(&u.cpt)
    .bind(u.paid.to_dollars())
    .bind(u.rate.to_dollars())
    .bind(&u.document_number)
    .bind(u.processed_date)
    .execute(&mut *tx)
    .await
    .context("upsert line_items failed")?;

    tx.commit().await.context("upsert commit failed")?;
    Ok(())
}

fn row_to_ledger_row(r: &sqlx::sqlite::SqliteRow) -> Result<LedgerRow> {
    let id: i64 = r.try_get("id")?;
    let order_id: String = r.try_get("order_id")?;
    let paid: Option<f64> = r.try_get("br_paid")?;
    let rate: Option<f64> = r.try_get("br_rate")?;

    Ok(LedgerRow {
        key: LedgerKey::new(id, order_id),
        cpt: r.try_get("cpt")?,
        paid: paid.and_then(Cents::from_dollars),
        rate: rate.and_then(Cents::from_dollars),
        eobr_doc_no: r.try_get("eobr_doc_no")?,
        hcfa_doc_no: r.try_get("hcfa_doc_no")?,
        processed_date: r.try_get("br_date_processed")?,
        updated_at: r.try_get("updated_at")?,
    })
}

/// File behind a `sqlite:` URL, if it names one.
fn sqlite_file_path(url: &str) -> Option<PathBuf> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path == ":memory:" {
        return None;
    }
    Some(PathBuf::from(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_urls_resolve_to_files() {
        assert_eq!(
            sqlite_file_path("sqlite://EOBR/database/eobr_records.db"),
            Some(PathBuf::from("EOBR/database/eobr_records.db"))
        );
        assert_eq!(
            sqlite_file_path("sqlite:ledger.db?mode=rwc"),
            Some(PathBuf::from("ledger.db"))
        );
        assert_eq!(sqlite_file_path("sqlite::memory:"), None);
        assert_eq!(sqlite_file_path("postgres://x"), None);
    }

    #[tokio::test]
    async fn degraded_ledger_fails_open() {
        let l = Ledger::unavailable();
        let key = LedgerKey::new(1, "A1");
        assert!(!l.is_available());
        assert!(!l.is_paid(&key).await);
        assert!(
            !l.upsert_payment(&PaymentUpdate {
                key,
                cpt: None,
                paid: Cents::new(100),
                rate: Cents::new(100),
                document_number: "EOBR-1".to_string(),
                processed_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            })
            .await
        );
        assert!(l.status().await.is_err());
        assert!(l.reset_payments(&[]).await.is_err());
    }
}
