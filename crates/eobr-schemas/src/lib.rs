//! eobr-schemas
//!
//! Value types shared by every stage of the billing pipeline: the canonical
//! record the normalizer produces, the ledger key, and the exported output
//! row. No I/O lives here.

mod money;

pub use money::Cents;

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Ledger key
// ---------------------------------------------------------------------------

/// Identifies one billable line item's payment record: `(line_item_id, order_id)`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LedgerKey {
    pub line_item_id: i64,
    pub order_id: String,
}

impl LedgerKey {
    pub fn new(line_item_id: i64, order_id: impl Into<String>) -> Self {
        Self {
            line_item_id,
            order_id: order_id.into(),
        }
    }
}

impl fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line_item_id, self.order_id)
    }
}

/// Parses the CLI form `<line_item_id>:<order_id>`.
impl FromStr for LedgerKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, order) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| format!("invalid ledger key '{s}'. expected <line_item_id>:<order_id>"))?;
        let line_item_id = id
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("invalid line_item_id in ledger key '{s}'"))?;
        let order_id = order.trim();
        if order_id.is_empty() {
            return Err(format!("empty order_id in ledger key '{s}'"));
        }
        Ok(LedgerKey::new(line_item_id, order_id))
    }
}

// ---------------------------------------------------------------------------
// Canonical record
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientInfo {
    pub name: Option<String>,
    pub date_of_birth: Option<String>,
    pub account_number: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MailingAddress {
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
}

impl MailingAddress {
    /// Single-line rendering used in the export; empty parts are dropped.
    pub fn one_line(&self) -> String {
        let street: Vec<&str> = [self.line1.as_deref(), self.line2.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        let state_zip: Vec<&str> = [self.state.as_deref(), self.postal_code.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        let mut parts: Vec<String> = Vec::new();
        if !street.is_empty() {
            parts.push(street.join(" "));
        }
        if let Some(city) = self.city.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            parts.push(city.to_string());
        }
        if !state_zip.is_empty() {
            parts.push(state_zip.join(" "));
        }
        parts.join(", ")
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub billing_name: Option<String>,
    pub tin: Option<String>,
    pub npi: Option<String>,
    pub address: MailingAddress,
}

/// One service line in canonical form.
///
/// Every field is optional: the normalizer never fails, so absent input
/// fields surface here as `None` and the validator decides.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub date_of_service: Option<String>,
    pub cpt: Option<String>,
    /// Comma-joined modifier codes, e.g. `"26,59"`.
    pub modifier: Option<String>,
    pub pos: Option<String>,
    pub units: Option<i64>,
    pub charge: Option<Cents>,
    pub validated_rate: Option<Cents>,
    pub ledger_key: Option<LedgerKey>,
}

impl LineItem {
    /// Individual modifier codes, trimmed, empties dropped.
    pub fn modifiers(&self) -> Vec<&str> {
        self.modifier
            .as_deref()
            .map(|m| {
                m.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// The single shape all downstream logic consumes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub order_id: Option<String>,
    /// Where this record came from (file name, or `file#index` for arrays).
    pub source_file: String,
    pub date_of_service: Option<String>,
    pub patient_info: PatientInfo,
    pub provider_info: ProviderInfo,
    pub line_items: Vec<LineItem>,
}

impl CanonicalRecord {
    /// Record-level date of service, falling back to the first line that has one.
    pub fn service_date(&self) -> Option<&str> {
        non_blank(self.date_of_service.as_deref()).or_else(|| {
            self.line_items
                .iter()
                .find_map(|li| non_blank(li.date_of_service.as_deref()))
        })
    }

    pub fn patient_name(&self) -> Option<&str> {
        non_blank(self.patient_info.name.as_deref())
    }

    pub fn billing_name(&self) -> Option<&str> {
        non_blank(self.provider_info.billing_name.as_deref())
    }

    /// Order id for logs; never empty.
    pub fn order_label(&self) -> &str {
        non_blank(self.order_id.as_deref()).unwrap_or("<no order_id>")
    }

    pub fn ledger_keys(&self) -> impl Iterator<Item = &LedgerKey> {
        self.line_items.iter().filter_map(|li| li.ledger_key.as_ref())
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Output row
// ---------------------------------------------------------------------------

/// Column order of both the per-run export and the historical export.
pub const EXPORT_HEADERS: [&str; 15] = [
    "Release Payment",
    "Duplicate Check",
    "Full Duplicate Key",
    "Input File",
    "EOBR Number",
    "Vendor",
    "Mailing Address",
    "Terms",
    "Bill Date",
    "Due Date",
    "Category",
    "Description",
    "Amount",
    "Memo",
    "Total",
];

pub const COL_DUPLICATE_KEY: &str = "Full Duplicate Key";
pub const COL_DOCUMENT_NUMBER: &str = "EOBR Number";

/// One exported row. Append-only: once written it is never updated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRow {
    pub duplicate: bool,
    pub duplicate_key: String,
    pub input_file: String,
    pub document_number: String,
    pub vendor: String,
    pub mailing_address: String,
    pub terms: String,
    pub bill_date: NaiveDate,
    pub due_date: NaiveDate,
    pub category: String,
    pub description: String,
    pub memo: String,
    pub total: Cents,
}

impl OutputRow {
    pub fn release_payment(&self) -> &'static str {
        if self.duplicate {
            "No"
        } else {
            "Yes"
        }
    }

    pub fn duplicate_check(&self) -> &'static str {
        if self.duplicate {
            "DUPLICATE"
        } else {
            ""
        }
    }

    /// Cells in [`EXPORT_HEADERS`] order.
    pub fn to_record(&self) -> [String; 15] {
        [
            self.release_payment().to_string(),
            self.duplicate_check().to_string(),
            self.duplicate_key.clone(),
            self.input_file.clone(),
            self.document_number.clone(),
            self.vendor.clone(),
            self.mailing_address.clone(),
            self.terms.clone(),
            self.bill_date.format("%m/%d/%Y").to_string(),
            self.due_date.format("%m/%d/%Y").to_string(),
            self.category.clone(),
            self.description.clone(),
            self.total.to_plain_string(),
            self.memo.clone(),
            self.total.to_currency_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_key_parses_cli_form() {
        let k: LedgerKey = "21718:ORD-9".parse().unwrap();
        assert_eq!(k, LedgerKey::new(21718, "ORD-9"));
        assert_eq!(k.to_string(), "21718:ORD-9");

        assert!("21718".parse::<LedgerKey>().is_err());
        assert!("abc:ORD".parse::<LedgerKey>().is_err());
        assert!("1: ".parse::<LedgerKey>().is_err());
    }

    #[test]
    fn service_date_falls_back_to_line_items() {
        let mut rec = CanonicalRecord {
            date_of_service: Some("  ".to_string()),
            line_items: vec![
                LineItem::default(),
                LineItem {
                    date_of_service: Some("2025-03-01".to_string()),
                    ..LineItem::default()
                },
            ],
            ..CanonicalRecord::default()
        };
        assert_eq!(rec.service_date(), Some("2025-03-01"));

        rec.date_of_service = Some("2025-02-01".to_string());
        assert_eq!(rec.service_date(), Some("2025-02-01"));
    }

    #[test]
    fn modifiers_split_and_trim() {
        let li = LineItem {
            modifier: Some("26, 59,,".to_string()),
            ..LineItem::default()
        };
        assert_eq!(li.modifiers(), vec!["26", "59"]);
        assert!(LineItem::default().modifiers().is_empty());
    }

    #[test]
    fn address_one_line_skips_blanks() {
        let a = MailingAddress {
            line1: Some("12 Main St".to_string()),
            line2: Some("".to_string()),
            city: Some("Springfield".to_string()),
            state: Some("IL".to_string()),
            postal_code: Some("62701".to_string()),
        };
        assert_eq!(a.one_line(), "12 Main St, Springfield, IL 62701");
        assert_eq!(MailingAddress::default().one_line(), "");
    }

    #[test]
    fn output_row_cells_follow_header_order() {
        let row = OutputRow {
            duplicate: true,
            duplicate_key: "A1|Acme|Jane|2025-01-01|99213".to_string(),
            input_file: "a1.json".to_string(),
            document_number: "EOBR-20250101-0001".to_string(),
            vendor: "Acme".to_string(),
            mailing_address: "".to_string(),
            terms: "Net 45".to_string(),
            bill_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2025, 2, 15).unwrap(),
            category: "Cat".to_string(),
            description: "99213".to_string(),
            memo: "memo".to_string(),
            total: Cents::new(8000),
        };
        let cells = row.to_record();
        assert_eq!(cells.len(), EXPORT_HEADERS.len());
        assert_eq!(cells[0], "No");
        assert_eq!(cells[1], "DUPLICATE");
        assert_eq!(cells[8], "01/01/2025");
        assert_eq!(cells[9], "02/15/2025");
        assert_eq!(cells[12], "80.00");
        assert_eq!(cells[14], "$80.00");
    }
}
