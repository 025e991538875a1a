//! Record normalization: every supported raw shape into one
//! [`CanonicalRecord`].
//!
//! Normalization is total. Absent or unusable fields become `None` / empty
//! and all rejection decisions are left to the validator.
//!
//! It does **not**:
//! - read files (see `loader.rs`)
//! - reject records (see `validator.rs`)
//! - consult the allow-lists (the output row builder filters modifiers and POS)

use eobr_schemas::{CanonicalRecord, Cents, LineItem, MailingAddress, PatientInfo, ProviderInfo};
use serde_json::{Map, Value};

use crate::lenient::first_string;
use crate::raw::{
    ledger_key_from_payment_ref, CanonicalLine, CanonicalShape, RawRecord, RawShape, ServiceLine,
    ServiceLinesShape,
};

/// One impl per supported input shape.
pub trait ShapeNormalizer {
    fn normalize(&self, source_file: &str) -> CanonicalRecord;
}

/// Normalize a raw record of any supported shape.
pub fn normalize(raw: &RawRecord, source_file: &str) -> CanonicalRecord {
    match &raw.shape {
        RawShape::Canonical(shape) => shape.normalize(source_file),
        RawShape::ServiceLines(shape) => shape.normalize(source_file),
    }
}

// ---------------------------------------------------------------------------
// Party blocks (key spellings seen across upstream exports)
// ---------------------------------------------------------------------------

const PATIENT_NAME_KEYS: &[&str] = &["PatientName", "patient_name", "name"];
const PATIENT_DOB_KEYS: &[&str] = &["Patient_DOB", "PatientDOB", "patient_dob", "date_of_birth"];
const PATIENT_ACCOUNT_KEYS: &[&str] = &["Patient_Account_No", "PatientAccountNo", "account_number"];

const BILLING_NAME_KEYS: &[&str] = &["Billing_Name", "BillingName", "billing_name"];
const TIN_KEYS: &[&str] = &["TIN", "tin", "Tax_ID"];
const NPI_KEYS: &[&str] = &["NPI", "npi", "Billing_NPI"];
const ADDR1_KEYS: &[&str] = &["Billing_Address1", "billing_address1", "address1"];
const ADDR2_KEYS: &[&str] = &["Billing_Address2", "billing_address2", "address2"];
const CITY_KEYS: &[&str] = &["Billing_Address_City", "billing_city", "city"];
const STATE_KEYS: &[&str] = &["Billing_Address_State", "billing_state", "state"];
const ZIP_KEYS: &[&str] = &["Billing_Address_Postal_Code", "billing_postal_code", "postal_code", "zip"];

fn patient_from(block: &Map<String, Value>) -> PatientInfo {
    PatientInfo {
        name: first_string(block, PATIENT_NAME_KEYS),
        date_of_birth: first_string(block, PATIENT_DOB_KEYS),
        account_number: first_string(block, PATIENT_ACCOUNT_KEYS),
    }
}

fn provider_from(block: &Map<String, Value>) -> ProviderInfo {
    ProviderInfo {
        billing_name: first_string(block, BILLING_NAME_KEYS),
        tin: first_string(block, TIN_KEYS),
        npi: first_string(block, NPI_KEYS),
        address: MailingAddress {
            line1: first_string(block, ADDR1_KEYS),
            line2: first_string(block, ADDR2_KEYS),
            city: first_string(block, CITY_KEYS),
            state: first_string(block, STATE_KEYS),
            postal_code: first_string(block, ZIP_KEYS),
        },
    }
}

fn join_modifiers(mods: &[String]) -> Option<String> {
    let joined = mods
        .iter()
        .map(|m| m.trim())
        .filter(|m| !m.is_empty())
        .collect::<Vec<_>>()
        .join(",");
    (!joined.is_empty()).then_some(joined)
}

fn cents(v: Option<f64>) -> Option<Cents> {
    v.and_then(Cents::from_dollars)
}

// ---------------------------------------------------------------------------
// Canonical shape: pass-through with type cleanup
// ---------------------------------------------------------------------------

impl ShapeNormalizer for CanonicalShape {
    fn normalize(&self, source_file: &str) -> CanonicalRecord {
        let order_id = self.order_id.as_deref();
        CanonicalRecord {
            order_id: self.order_id.clone(),
            source_file: source_file.to_string(),
            date_of_service: self.date_of_service.clone(),
            patient_info: patient_from(&self.patient_info),
            provider_info: provider_from(&self.provider_info),
            line_items: self
                .line_items
                .iter()
                .map(|l| canonical_line(l, order_id))
                .collect(),
        }
    }
}

fn canonical_line(l: &CanonicalLine, order_id: Option<&str>) -> LineItem {
    LineItem {
        date_of_service: l.date_of_service.clone(),
        cpt: l.cpt().cloned(),
        modifier: join_modifiers(l.modifiers()),
        pos: l.pos().cloned(),
        units: l.units,
        charge: cents(l.charge()),
        validated_rate: cents(l.validated_rate()),
        ledger_key: l
            .payment_ref()
            .and_then(|v| ledger_key_from_payment_ref(v, order_id)),
    }
}

// ---------------------------------------------------------------------------
// Service-lines shape: field-by-field mapping
// ---------------------------------------------------------------------------

impl ShapeNormalizer for ServiceLinesShape {
    fn normalize(&self, source_file: &str) -> CanonicalRecord {
        let order_id = self.order_id.as_deref();
        let line_items: Vec<LineItem> = self
            .service_lines
            .iter()
            .map(|l| service_line(l, order_id))
            .collect();

        // This export has no record-level DOS; order_details sometimes does.
        let date_of_service = first_string(&self.order_details, &["date_of_service", "DOS"]);

        CanonicalRecord {
            order_id: self.order_id.clone(),
            source_file: source_file.to_string(),
            date_of_service,
            patient_info: patient_from(&self.order_details),
            provider_info: provider_from(&self.provider_details),
            line_items,
        }
    }
}

fn service_line(l: &ServiceLine, order_id: Option<&str>) -> LineItem {
    LineItem {
        date_of_service: l.date_of_service.clone(),
        cpt: l.cpt_code.clone(),
        modifier: join_modifiers(&l.modifiers),
        pos: l.place_of_service.clone(),
        units: l.units,
        charge: cents(l.charge_amount),
        validated_rate: cents(l.assigned_rate),
        ledger_key: l
            .payment_id
            .as_ref()
            .and_then(|v| ledger_key_from_payment_ref(v, order_id)),
    }
}
