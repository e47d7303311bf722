//! CSV/Excel record-list export
//!
//! Formats an already-materialized record set as delimited text: `;`
//! between fields, `\n` between records, every cell quoted with `"` and
//! embedded quotes doubled. Spreadsheet tools assume one line per record,
//! so an optional replacement token substitutes for line feeds inside
//! cell values before delimiting.
//!
//! The exporter is stateless across calls except for that configured
//! replacement token.

use crate::config::ExportSettings;
use crate::node::Node;
use crate::record::Record;
use bytes::Bytes;

/// Delimiter between fields of a record
pub const FIELD_DELIMITER: char = ';';

/// Delimiter between records
pub const RECORD_DELIMITER: char = '\n';

/// Quote character wrapping every cell
pub const QUOTE: char = '"';

/// Per-call output parameters
#[derive(Debug, Clone, Default)]
pub struct OutputParams {
    /// Download filename; the configured default applies when absent
    pub filename: Option<String>,
}

/// A rendered export: payload plus download metadata
#[derive(Debug, Clone)]
pub struct ExportOutput {
    /// The delimited text as bytes
    pub bytes: Bytes,
    /// Download filename
    pub filename: String,
    /// MIME content type
    pub content_type: &'static str,
}

/// CSV/Excel variant of the record-list renderer
#[derive(Debug, Clone)]
pub struct CsvExporter {
    line_feed_replacement: Option<String>,
    default_filename: String,
}

impl CsvExporter {
    /// Create an exporter with no line-feed replacement and the default
    /// filename `export.csv`
    #[must_use]
    pub fn new() -> Self {
        Self {
            line_feed_replacement: None,
            default_filename: "export.csv".to_string(),
        }
    }

    /// Create an exporter from configuration
    #[must_use]
    pub fn from_settings(settings: &ExportSettings) -> Self {
        Self {
            line_feed_replacement: settings.line_feed_replacement.clone(),
            default_filename: settings.filename.clone(),
        }
    }

    /// Configure the token substituted for line feeds inside cell values
    pub fn set_line_feed_replacement(&mut self, token: impl Into<String>) {
        self.line_feed_replacement = Some(token.into());
    }

    /// Render a record set as delimited text
    ///
    /// Columns come from the node's attributes in declaration order,
    /// minus those named in `suppress`. `title_row` prepends a row of
    /// attribute labels; `decode` selects display formatting over raw
    /// stored text for attributes that distinguish the two.
    #[must_use]
    pub fn render(
        &self,
        node: &dyn Node,
        records: &[Record],
        suppress: &[&str],
        params: &OutputParams,
        title_row: bool,
        decode: bool,
    ) -> ExportOutput {
        let columns: Vec<_> = node
            .attributes()
            .into_iter()
            .filter(|attribute| !suppress.contains(&attribute.field_name()))
            .collect();

        let mut out = String::new();
        if title_row {
            let labels: Vec<String> = columns
                .iter()
                .map(|attribute| self.quote_cell(&attribute.label()))
                .collect();
            out.push_str(&labels.join(&FIELD_DELIMITER.to_string()));
            out.push(RECORD_DELIMITER);
        }

        for record in records {
            let cells: Vec<String> = columns
                .iter()
                .map(|attribute| {
                    let value = record
                        .get(attribute.field_name())
                        .cloned()
                        .unwrap_or(serde_json::Value::Null);
                    self.quote_cell(&attribute.export_value(&value, decode))
                })
                .collect();
            out.push_str(&cells.join(&FIELD_DELIMITER.to_string()));
            out.push(RECORD_DELIMITER);
        }

        ExportOutput {
            bytes: Bytes::from(out),
            filename: params
                .filename
                .clone()
                .unwrap_or_else(|| self.default_filename.clone()),
            content_type: "text/csv; charset=utf-8",
        }
    }

    /// Quote one cell: substitute line feeds, double embedded quotes,
    /// wrap in the quote character
    fn quote_cell(&self, value: &str) -> String {
        let mut cell = value.to_string();
        if let Some(token) = &self.line_feed_replacement {
            cell = cell
                .replace("\r\n", token)
                .replace(['\n', '\r'], token);
        }
        let escaped = cell.replace(QUOTE, "\"\"");
        format!("{QUOTE}{escaped}{QUOTE}")
    }
}

impl Default for CsvExporter {
    fn default() -> Self {
        Self::new()
    }
}
