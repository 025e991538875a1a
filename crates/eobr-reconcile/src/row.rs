//! Output-row computation for a validated record.

use chrono::{Duration, NaiveDate};

use eobr_config::{DefaultsConfig, RulesConfig};
use eobr_schemas::{CanonicalRecord, Cents, LineItem, OutputRow};

/// Everything a row needs besides the record itself.
#[derive(Debug, Clone, Copy)]
pub struct RowContext<'a> {
    pub rules: &'a RulesConfig,
    pub defaults: &'a DefaultsConfig,
    pub bill_date: NaiveDate,
}

/// `order_id|billing_name|patient_name|dos|cpt1,cpt2`.
pub fn duplicate_key(record: &CanonicalRecord) -> String {
    let cpts = record
        .line_items
        .iter()
        .filter_map(|li| li.cpt.as_deref())
        .collect::<Vec<_>>()
        .join(",");

    [
        record.order_id.as_deref().unwrap_or_default().trim(),
        record.billing_name().unwrap_or_default(),
        record.patient_name().unwrap_or_default(),
        record.service_date().unwrap_or_default(),
        cpts.as_str(),
    ]
    .join("|")
}

/// Sum of validated rates; lines without one contribute nothing. `None`
/// when the sum overflows.
pub fn record_total(record: &CanonicalRecord) -> Option<Cents> {
    Cents::checked_sum(record.line_items.iter().filter_map(|li| li.validated_rate))
}

/// `CPT[-mods] POS x units`; disallowed modifiers and POS are dropped.
pub fn describe_line(li: &LineItem, rules: &RulesConfig) -> String {
    let mut out = li.cpt.clone().unwrap_or_default();

    let mods: Vec<&str> = li
        .modifiers()
        .into_iter()
        .filter(|m| rules.acceptable_modifiers.contains(*m))
        .collect();
    if !mods.is_empty() {
        out.push('-');
        out.push_str(&mods.join("-"));
    }

    if let Some(pos) = li
        .pos
        .as_deref()
        .filter(|p| rules.acceptable_pos.contains(*p))
    {
        out.push_str(&format!(" POS {pos}"));
    }

    out.push_str(&format!(" x {}", li.units.unwrap_or(1)));
    out
}

/// The exported row for a validated record. `None` only when the total
/// overflows, which validation already rejects.
pub fn build_output_row(
    record: &CanonicalRecord,
    ctx: RowContext<'_>,
    document_number: &str,
    duplicate: bool,
) -> Option<OutputRow> {
    let total = record_total(record)?;
    let due_date = Duration::try_days(ctx.defaults.net_days())
        .and_then(|d| ctx.bill_date.checked_add_signed(d))
        .unwrap_or(ctx.bill_date);

    let description = record
        .line_items
        .iter()
        .map(|li| describe_line(li, ctx.rules))
        .collect::<Vec<_>>()
        .join("; ");

    Some(OutputRow {
        duplicate,
        duplicate_key: duplicate_key(record),
        input_file: record.source_file.clone(),
        document_number: document_number.to_string(),
        vendor: record.billing_name().unwrap_or_default().to_string(),
        mailing_address: record.provider_info.address.one_line(),
        terms: ctx.defaults.terms.clone(),
        bill_date: ctx.bill_date,
        due_date,
        category: ctx.defaults.category.clone(),
        description,
        memo: format!(
            "Patient: {} DOS: {}",
            record.patient_name().unwrap_or_default(),
            record.service_date().unwrap_or_default()
        ),
        total,
    })
}
