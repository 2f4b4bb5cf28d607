//! CSV rendering of audit entries
//!
//! Quoting follows RFC 4180: a field containing a comma, a double quote, CR
//! or LF is wrapped in double quotes with embedded quotes doubled. Records
//! end with CRLF.

use crate::db::format_db_timestamp;
use crate::models::AuditLogEntry;

/// Column order of every audit export
pub const AUDIT_CSV_COLUMNS: [&str; 6] = [
    "timestamp",
    "user",
    "action",
    "entity_type",
    "entity_id",
    "details",
];

const RECORD_END: &str = "\r\n";

/// Quote a field if it needs quoting
pub fn escape_csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn push_record<I, S>(out: &mut String, fields: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let line = fields
        .into_iter()
        .map(|f| escape_csv_field(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    out.push_str(&line);
    out.push_str(RECORD_END);
}

/// Compact JSON for the details column; empty when the entry has none
pub fn encode_details(entry: &AuditLogEntry) -> String {
    entry
        .details
        .as_ref()
        .map(|d| serde_json::Value::Object(d.clone()).to_string())
        .unwrap_or_default()
}

/// Header row followed by one record per entry, in the given order
pub fn audit_logs_to_csv(entries: &[AuditLogEntry]) -> String {
    let mut csv = String::new();
    push_record(&mut csv, AUDIT_CSV_COLUMNS);

    for entry in entries {
        let timestamp = format_db_timestamp(&entry.created_at);
        let details = encode_details(entry);
        push_record(
            &mut csv,
            [
                timestamp.as_str(),
                entry.actor_label(),
                entry.action.as_str(),
                entry.entity_type.as_str(),
                entry.entity_id.as_str(),
                details.as_str(),
            ],
        );
    }

    csv
}
