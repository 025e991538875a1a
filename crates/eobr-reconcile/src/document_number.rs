use chrono::NaiveDate;

/// `<prefix><YYYYMMDD>-<NNNN>`.
pub fn format_document_number(prefix: &str, date: NaiveDate, seq: u32) -> String {
    format!("{prefix}{}-{seq:04}", date.format("%Y%m%d"))
}

/// Per-run document numbers. Monotonic within a run; skips numbers
/// already issued by earlier runs.
#[derive(Debug, Clone)]
pub struct DocumentNumberAllocator {
    prefix: String,
    date: NaiveDate,
    next_seq: u32,
}

impl DocumentNumberAllocator {
    pub fn new(prefix: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            prefix: prefix.into(),
            date,
            next_seq: 1,
        }
    }

    /// Next number for which `is_taken` is false.
    pub fn allocate(&mut self, is_taken: impl Fn(&str) -> bool) -> String {
        loop {
            let candidate = format_document_number(&self.prefix, self.date, self.next_seq);
            self.next_seq = self.next_seq.saturating_add(1);
            if !is_taken(&candidate) {
                return candidate;
            }
        }
    }
}
