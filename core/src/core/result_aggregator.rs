use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::core::events::LogLevel;
use crate::core::target_manager::RootDomain;
use crate::SinkRef;

pub const CSV_HEADER: [&str; 4] = ["Domain", "URL", "Status", "Size(Bytes)"];

/// One non-200 observation inside a status bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub domain: RootDomain,
    pub url: String,
    pub size: u64,
}

/// Flattened export row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRow {
    pub domain: RootDomain,
    pub url: String,
    pub status: u16,
    pub size: u64,
}

/// Collects non-200 probe records from every domain job, bucketed by status
/// code. Appends are serialized by one lock, so concurrent jobs never lose or
/// interleave records.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    buckets: Mutex<BTreeMap<u16, Vec<StatusRecord>>>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, code: u16, record: StatusRecord) {
        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        buckets.entry(code).or_default().push(record);
    }

    /// Copy of the current buckets, ascending by status code.
    pub fn snapshot(&self) -> BTreeMap<u16, Vec<StatusRecord>> {
        self.buckets.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Total number of records across all buckets.
    pub fn len(&self) -> usize {
        self.buckets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows ordered by status code, then by insertion within each code.
    pub fn export_rows(&self) -> Vec<ExportRow> {
        self.snapshot()
            .into_iter()
            .flat_map(|(status, records)| {
                records.into_iter().map(move |r| ExportRow {
                    domain: r.domain,
                    url: r.url,
                    status,
                    size: r.size,
                })
            })
            .collect()
    }

    /// Renders the export as CSV, header row first, CRLF line endings.
    pub fn to_csv(&self) -> String {
        render_csv(&self.export_rows())
    }

    /// Returns the number of data rows written.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> std::io::Result<usize> {
        let rows = self.export_rows();
        std::fs::write(path, render_csv(&rows))?;
        Ok(rows.len())
    }

    /// Writes one JSON object per row.
    pub fn write_jsonl(&self, path: impl AsRef<Path>) -> std::io::Result<usize> {
        let rows = self.export_rows();
        let mut file = std::fs::File::create(path)?;
        for row in &rows {
            let line = serde_json::to_string(row)?;
            writeln!(file, "{}", line)?;
        }
        Ok(rows.len())
    }

    /// Lists every bucket through the sink, lowest code first.
    pub fn report_summary(&self, sink: &SinkRef) {
        let buckets = self.snapshot();
        if buckets.is_empty() {
            sink.on_log(LogLevel::Success, "[+] No non-200 responses recorded.");
            return;
        }

        for (code, records) in &buckets {
            sink.on_log(LogLevel::Warn, &format!("--- {} ---", code));
            for r in records {
                sink.on_log(LogLevel::Info, &format!("{} | {} | {} Bytes", r.domain, r.url, r.size));
            }
        }
    }
}

fn render_csv(rows: &[ExportRow]) -> String {
    let mut csv = CSV_HEADER.join(",");
    csv.push_str("\r\n");
    for row in rows {
        let fields = [
            csv_field(row.domain.as_str()),
            csv_field(&row.url),
            row.status.to_string(),
            row.size.to_string(),
        ];
        csv.push_str(&fields.join(","));
        csv.push_str("\r\n");
    }
    csv
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
