//! Recovery of the structured payload embedded in a model's free-text reply.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::models::form::{ExtractedPdfData, FieldType, FieldValue, FormField, FormSection};
use crate::patterns::FENCED_BLOCK;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VisionPayload {
    summary: Option<String>,
    sections: Vec<VisionSection>,
    notes: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VisionSection {
    title: String,
    fields: Vec<VisionField>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VisionField {
    name: String,
    value: Value,
    #[serde(rename = "type")]
    field_type: Option<String>,
    note: Option<String>,
}

/// Locate the JSON payload: fenced block first, then outermost braces.
pub fn locate_payload(response: &str) -> Option<&str> {
    if let Some(caps) = FENCED_BLOCK.captures(response) {
        let block = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
        if !block.is_empty() {
            return Some(block);
        }
    }
    balanced_braces(response)
}

/// First `{` through its matching `}`, skipping braces inside strings.
fn balanced_braces(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse a model response into the reviewer model.
///
/// A response without a readable payload is not an error: the raw text
/// becomes the summary and no sections are produced.
pub fn parse_vision(response: &str) -> ExtractedPdfData {
    let payload = locate_payload(response)
        .and_then(|json| match serde_json::from_str::<VisionPayload>(json) {
            Ok(payload) => Some(payload),
            Err(e) => {
                debug!("Vision payload is not valid JSON: {}", e);
                None
            }
        });

    let Some(payload) = payload else {
        warn!("Could not parse structured data from vision response; returning raw text");
        return ExtractedPdfData::degraded(response);
    };

    let sections: Vec<FormSection> = payload
        .sections
        .into_iter()
        .map(|section| {
            let title = section.title;
            let fields = section
                .fields
                .into_iter()
                .map(|field| convert_field(field, &title))
                .collect();
            FormSection::new(title, fields)
        })
        .collect();

    ExtractedPdfData::from_sections(
        sections,
        payload.summary.unwrap_or_default(),
        payload.notes,
        Some(response.to_string()),
    )
}

fn convert_field(field: VisionField, section: &str) -> FormField {
    let field_type = field
        .field_type
        .as_deref()
        .map(FieldType::from_str)
        .unwrap_or_default();

    let mut note = field.note.filter(|n| !n.trim().is_empty());

    let value = if field_type.is_selection() {
        let (checked, recognized) = selection_state(&field.value);
        if !recognized {
            let flag = format!("Uncertain selection: {}", field.value);
            note = Some(match note {
                Some(existing) => format!("{}; {}", existing, flag),
                None => flag,
            });
        }
        FieldValue::Bool(checked)
    } else {
        FieldValue::Text(value_to_string(&field.value))
    };

    FormField {
        name: field.name,
        value,
        field_type,
        section: Some(section.to_string()),
        note,
        confidence: None,
    }
}

/// (is checked, whether the token was a known true/false spelling).
///
/// Only `true`, `"true"` and `"checked"` count as selected.
pub fn selection_state(value: &Value) -> (bool, bool) {
    match value {
        Value::Bool(b) => (*b, true),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "checked" => (true, true),
            "false" | "unchecked" | "" => (false, true),
            _ => (false, false),
        },
        Value::Null => (false, true),
        _ => (false, false),
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
