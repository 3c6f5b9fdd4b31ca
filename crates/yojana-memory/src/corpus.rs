//! Scheme corpus loading.
//!
//! The corpus is a JSON array of scheme records as published in the state
//! and central scheme dataset. Field values are loosely typed: most fields
//! may be a string or a list, and the application process may be a string
//! or a `{Mode, Steps}` object.

use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use tracing::info;
use yojana_core::{SchemeDocument, YojanaError, YojanaResult};

/// A loosely typed field value from the corpus.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<Value>),
    Object(serde_json::Map<String, Value>),
    Other(Value),
}

impl FieldValue {
    fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::List(items) => items.is_empty(),
            FieldValue::Object(map) => map.is_empty(),
            FieldValue::Other(v) => v.is_null() || v == &Value::Bool(false),
        }
    }

    /// Lists are joined with `separator`; everything else is rendered as text.
    fn render(&self, separator: &str) -> String {
        match self {
            FieldValue::Text(s) => s.trim().to_string(),
            FieldValue::List(items) => items
                .iter()
                .map(value_text)
                .collect::<Vec<_>>()
                .join(separator),
            FieldValue::Object(map) => value_text(&Value::Object(map.clone())),
            FieldValue::Other(v) => value_text(v),
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

/// One scheme as it appears in the corpus file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemeRecord {
    #[serde(rename = "Scheme Name", default)]
    pub scheme_name: Option<String>,
    #[serde(rename = "Department", default)]
    pub department: Option<String>,
    #[serde(rename = "Details", default)]
    pub details: Option<FieldValue>,
    #[serde(rename = "Benefits", default)]
    pub benefits: Option<FieldValue>,
    #[serde(rename = "Eligibility", default)]
    pub eligibility: Option<FieldValue>,
    #[serde(rename = "Application Process", default)]
    pub application_process: Option<FieldValue>,
    #[serde(rename = "Documents Required", default)]
    pub documents_required: Option<FieldValue>,
}

fn present(field: &Option<FieldValue>) -> Option<&FieldValue> {
    field.as_ref().filter(|v| !v.is_empty())
}

impl SchemeRecord {
    /// Scheme name, or `Unknown Scheme`.
    pub fn name(&self) -> &str {
        self.scheme_name
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or("Unknown Scheme")
    }

    /// Department, or `Unknown Department`.
    pub fn department_name(&self) -> &str {
        self.department
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or("Unknown Department")
    }

    /// Serialize the record as `Label: value` lines.
    pub fn render(&self) -> String {
        let mut parts = vec![
            format!("Scheme Name: {}", self.name()),
            format!("Department: {}", self.department_name()),
        ];

        if let Some(details) = present(&self.details) {
            parts.push(format!("Details: {}", details.render(" ")));
        }
        if let Some(benefits) = present(&self.benefits) {
            parts.push(format!("Benefits: {}", benefits.render("; ")));
        }
        if let Some(eligibility) = present(&self.eligibility) {
            parts.push(format!("Eligibility: {}", eligibility.render("; ")));
        }
        if let Some(process) = present(&self.application_process) {
            parts.push(render_application_process(process));
        }
        if let Some(docs) = present(&self.documents_required) {
            parts.push(format!("Documents Required: {}", docs.render("; ")));
        }

        parts.join("\n")
    }

    /// Convert into an indexable document with id `scheme_{index}`.
    pub fn into_document(self, index: usize) -> SchemeDocument {
        let text = self.render();
        SchemeDocument::new(format!("scheme_{index}"), text)
            .with_metadata("scheme_name", self.name())
            .with_metadata("department", self.department_name())
            .with_metadata("index", index.to_string())
    }
}

fn render_application_process(process: &FieldValue) -> String {
    match process {
        FieldValue::Object(map) => {
            let mode = map.get("Mode").map(value_text).unwrap_or_default();
            let steps = match map.get("Steps") {
                Some(Value::Array(steps)) => steps
                    .iter()
                    .map(value_text)
                    .collect::<Vec<_>>()
                    .join(" "),
                Some(other) => value_text(other),
                None => String::new(),
            };
            format!("Application Process: Mode - {mode}. Steps: {steps}")
        }
        other => format!("Application Process: {}", other.render(" ")),
    }
}

/// Parse a corpus JSON array into documents, in corpus order.
pub fn parse_corpus(json: &str) -> YojanaResult<Vec<SchemeDocument>> {
    let records: Vec<SchemeRecord> = serde_json::from_str(json)
        .map_err(|e| YojanaError::Corpus(format!("Invalid scheme corpus: {e}")))?;
    Ok(records
        .into_iter()
        .enumerate()
        .map(|(i, record)| record.into_document(i))
        .collect())
}

/// Read and parse the corpus file at `path`.
pub async fn load_corpus(path: &Path) -> YojanaResult<Vec<SchemeDocument>> {
    let data = tokio::fs::read_to_string(path).await.map_err(|e| {
        YojanaError::Corpus(format!(
            "Failed to read scheme corpus '{}': {e}",
            path.display()
        ))
    })?;
    let documents = parse_corpus(&data)?;
    info!(path = %path.display(), schemes = documents.len(), "Scheme corpus loaded");
    Ok(documents)
}
