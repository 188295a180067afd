//! Reviewer-facing form data model shared by both extraction strategies.

use serde::{Deserialize, Serialize};

/// Kind of a form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Free text.
    #[default]
    Text,
    /// Checkbox (boolean value).
    Checkbox,
    /// Radio button (boolean value).
    Radio,
    /// Dropdown selection.
    Dropdown,
    /// Anything else.
    Other,
}

impl FieldType {
    /// Parse a loosely-spelled type name; unknown names map to `Other`.
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "text" | "" => Self::Text,
            "checkbox" => Self::Checkbox,
            "radio" => Self::Radio,
            "dropdown" | "select" => Self::Dropdown,
            _ => Self::Other,
        }
    }

    /// Whether values of this type are booleans.
    pub fn is_selection(&self) -> bool {
        matches!(self, Self::Checkbox | Self::Radio)
    }

    /// Lowercase name as serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Checkbox => "checkbox",
            Self::Radio => "radio",
            Self::Dropdown => "dropdown",
            Self::Other => "other",
        }
    }
}

/// A field value: boolean for selections, string otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Text(String),
}

impl FieldValue {
    /// Boolean content, if this is a selection value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Text(_) => None,
        }
    }

    /// String content, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Bool(_) => None,
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

/// A single extracted field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    /// Field label.
    pub name: String,

    /// Field value. Boolean iff `field_type` is checkbox or radio.
    pub value: FieldValue,

    /// Field kind.
    #[serde(rename = "type")]
    pub field_type: FieldType,

    /// Title of the owning section.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,

    /// Reviewer note.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    /// Back-end confidence (0.0 - 1.0).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl FormField {
    /// Create a text field.
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Text(value.into()),
            field_type: FieldType::Text,
            section: None,
            note: None,
            confidence: None,
        }
    }

    /// Create a checkbox field.
    pub fn checkbox(name: impl Into<String>, checked: bool) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Bool(checked),
            field_type: FieldType::Checkbox,
            section: None,
            note: None,
            confidence: None,
        }
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_confidence(mut self, confidence: Option<f32>) -> Self {
        self.confidence = confidence.map(|c| c.clamp(0.0, 1.0));
        self
    }
}

/// A titled group of fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSection {
    pub title: String,
    pub fields: Vec<FormField>,
}

impl FormSection {
    pub fn new(title: impl Into<String>, fields: Vec<FormField>) -> Self {
        Self {
            title: title.into(),
            fields,
        }
    }
}

/// The single output contract of an extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedPdfData {
    /// All section fields, flattened in section order then field order.
    pub form_fields: Vec<FormField>,

    /// Sections in document order.
    pub sections: Vec<FormSection>,

    /// Human-readable summary.
    pub summary: String,

    /// Free-form notes for the reviewer.
    pub notes: Vec<String>,

    /// Raw text returned by the back-end.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
}

impl ExtractedPdfData {
    /// Build a result from sections, dropping empty ones and flattening fields.
    pub fn from_sections(
        sections: Vec<FormSection>,
        summary: impl Into<String>,
        notes: Vec<String>,
        raw_text: Option<String>,
    ) -> Self {
        let sections: Vec<FormSection> = sections
            .into_iter()
            .filter(|s| !s.fields.is_empty())
            .collect();
        let form_fields = flatten(&sections);

        Self {
            form_fields,
            sections,
            summary: summary.into(),
            notes,
            raw_text,
        }
    }

    /// Result for an unparsable response: raw text as summary, nothing else.
    pub fn degraded(raw: &str) -> Self {
        Self {
            form_fields: Vec::new(),
            sections: Vec::new(),
            summary: raw.to_string(),
            notes: Vec::new(),
            raw_text: Some(raw.to_string()),
        }
    }

    /// Total number of fields across all sections.
    pub fn field_count(&self) -> usize {
        self.sections.iter().map(|s| s.fields.len()).sum()
    }
}

fn flatten(sections: &[FormSection]) -> Vec<FormField> {
    sections
        .iter()
        .flat_map(|s| s.fields.iter().cloned())
        .collect()
}

/// "Extracted {n} fields across {m} sections: {titles}".
pub fn summarize_sections(sections: &[FormSection]) -> String {
    let total: usize = sections.iter().map(|s| s.fields.len()).sum();
    let titles: Vec<&str> = sections.iter().map(|s| s.title.as_str()).collect();
    format!(
        "Extracted {} fields across {} sections: {}",
        total,
        sections.len(),
        titles.join(", ")
    )
}
