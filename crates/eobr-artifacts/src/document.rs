//! The EOBR document in its two forms: structured JSON and a one-or-more
//! page A4 PDF.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};
use serde::{Deserialize, Serialize};

use eobr_schemas::{CanonicalRecord, Cents, OutputRow};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentLine {
    pub date_of_service: Option<String>,
    pub cpt: Option<String>,
    pub modifier: Option<String>,
    pub pos: Option<String>,
    pub units: Option<i64>,
    pub charge: Option<Cents>,
    pub validated_rate: Option<Cents>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EobrDocument {
    pub document_number: String,
    pub order_id: Option<String>,
    pub source_file: String,
    pub bill_date: NaiveDate,
    pub due_date: NaiveDate,
    pub terms: String,
    pub vendor: String,
    pub tin: Option<String>,
    pub npi: Option<String>,
    pub mailing_address: String,
    pub patient_name: String,
    pub patient_dob: Option<String>,
    pub patient_account: Option<String>,
    pub date_of_service: Option<String>,
    pub lines: Vec<DocumentLine>,
    pub total: Cents,
    pub duplicate: bool,
}

impl EobrDocument {
    pub fn new(record: &CanonicalRecord, row: &OutputRow) -> Self {
        Self {
            document_number: row.document_number.clone(),
            order_id: record.order_id.clone(),
            source_file: record.source_file.clone(),
            bill_date: row.bill_date,
            due_date: row.due_date,
            terms: row.terms.clone(),
            vendor: row.vendor.clone(),
            tin: record.provider_info.tin.clone(),
            npi: record.provider_info.npi.clone(),
            mailing_address: row.mailing_address.clone(),
            patient_name: record.patient_name().unwrap_or_default().to_string(),
            patient_dob: record.patient_info.date_of_birth.clone(),
            patient_account: record.patient_info.account_number.clone(),
            date_of_service: record.service_date().map(String::from),
            lines: record
                .line_items
                .iter()
                .map(|li| DocumentLine {
                    date_of_service: li.date_of_service.clone(),
                    cpt: li.cpt.clone(),
                    modifier: li.modifier.clone(),
                    pos: li.pos.clone(),
                    units: li.units,
                    charge: li.charge,
                    validated_rate: li.validated_rate,
                })
                .collect(),
            total: row.total,
            duplicate: row.duplicate,
        }
    }
}

pub fn render_json(doc: &EobrDocument, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(doc).context("serialize document failed")?;
    fs::write(path, format!("{json}\n"))
        .with_context(|| format!("write document json failed: {}", path.display()))
}

// ---------------------------------------------------------------------------
// PDF
// ---------------------------------------------------------------------------

const PAGE_W: Mm = Mm(210.0);
const PAGE_H: Mm = Mm(297.0);
const TOP: f32 = 280.0;
const BOTTOM: f32 = 20.0;

/// Text cursor that starts a new page when it runs off the bottom.
struct PageWriter<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    y: f32,
}

impl PageWriter<'_> {
    fn line(&mut self, text: &str, size: f32, x: f32, font: &IndirectFontRef, advance: f32) {
        if self.y < BOTTOM {
            let (page, layer) = self.doc.add_page(PAGE_W, PAGE_H, "Layer 1");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = TOP;
        }
        self.layer.use_text(text, size, Mm(x), Mm(self.y), font);
        self.y -= advance;
    }

    fn gap(&mut self, mm: f32) {
        self.y -= mm;
    }
}

pub fn render_pdf(doc: &EobrDocument, path: &Path) -> Result<()> {
    let title = format!("Explanation of Benefits Report {}", doc.document_number);
    let (pdf, page1, layer1) = PdfDocument::new(&title, PAGE_W, PAGE_H, "Layer 1");
    let font = pdf
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| anyhow!("pdf font error: {e}"))?;
    let bold = pdf
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| anyhow!("pdf font error: {e}"))?;

    let mut w = PageWriter {
        doc: &pdf,
        layer: pdf.get_page(page1).get_layer(layer1),
        y: TOP,
    };

    w.line("EXPLANATION OF BENEFITS REPORT", 14.0, 20.0, &bold, 8.0);
    w.line(&format!("EOBR Number: {}", doc.document_number), 10.0, 20.0, &font, 5.0);
    w.line(
        &format!(
            "Bill Date: {}   Due Date: {}   Terms: {}",
            doc.bill_date.format("%m/%d/%Y"),
            doc.due_date.format("%m/%d/%Y"),
            doc.terms
        ),
        10.0,
        20.0,
        &font,
        5.0,
    );
    if doc.duplicate {
        w.line("DUPLICATE - DO NOT RELEASE PAYMENT", 10.0, 20.0, &bold, 5.0);
    }
    w.gap(4.0);

    w.line("PROVIDER", 11.0, 20.0, &bold, 6.0);
    w.line(&doc.vendor, 9.0, 25.0, &font, 4.5);
    if !doc.mailing_address.is_empty() {
        w.line(&doc.mailing_address, 9.0, 25.0, &font, 4.5);
    }
    if let Some(tin) = doc.tin.as_deref() {
        w.line(&format!("TIN: {tin}"), 9.0, 25.0, &font, 4.5);
    }
    if let Some(npi) = doc.npi.as_deref() {
        w.line(&format!("NPI: {npi}"), 9.0, 25.0, &font, 4.5);
    }
    w.gap(4.0);

    w.line("PATIENT", 11.0, 20.0, &bold, 6.0);
    w.line(&doc.patient_name, 9.0, 25.0, &font, 4.5);
    if let Some(dob) = doc.patient_dob.as_deref() {
        w.line(&format!("DOB: {dob}"), 9.0, 25.0, &font, 4.5);
    }
    if let Some(order) = doc.order_id.as_deref() {
        w.line(&format!("Order: {order}"), 9.0, 25.0, &font, 4.5);
    }
    w.gap(4.0);

    w.line("SERVICES", 11.0, 20.0, &bold, 6.0);
    w.line("DOS          CPT     MOD      POS  UNITS     CHARGE       RATE", 9.0, 25.0, &bold, 4.5);
    for l in &doc.lines {
        let text = format!(
            "{:<12} {:<7} {:<8} {:<4} {:>5} {:>10} {:>10}",
            l.date_of_service.as_deref().unwrap_or("-"),
            l.cpt.as_deref().unwrap_or("-"),
            l.modifier.as_deref().unwrap_or(""),
            l.pos.as_deref().unwrap_or(""),
            l.units.map(|u| u.to_string()).unwrap_or_default(),
            l.charge.map(|c| c.to_currency_string()).unwrap_or_default(),
            l.validated_rate.map(|c| c.to_currency_string()).unwrap_or_default(),
        );
        w.line(&text, 9.0, 25.0, &font, 4.5);
    }
    w.gap(4.0);
    w.line(&format!("TOTAL: {}", doc.total.to_currency_string()), 11.0, 20.0, &bold, 6.0);

    let file = File::create(path).with_context(|| format!("create pdf failed: {}", path.display()))?;
    let mut out = BufWriter::new(file);
    pdf.save(&mut out).map_err(|e| anyhow!("pdf save error: {e}"))?;
    Ok(())
}
