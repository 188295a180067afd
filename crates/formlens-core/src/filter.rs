//! Which fields count as "filled" for display and export.

use crate::models::form::{ExtractedPdfData, FieldValue, FormField, FormSection};

/// Values treated as blank after trimming and lowercasing.
pub const PLACEHOLDER_VALUES: &[&str] = &["", "(empty)", "n/a", "na", "-", "--", "null", "undefined"];

/// A selection is filled only when `true`; text only when not a placeholder.
pub fn is_filled(field: &FormField) -> bool {
    if field.field_type.is_selection() {
        return field.value == FieldValue::Bool(true);
    }

    match &field.value {
        FieldValue::Text(text) => {
            let normalized = text.trim().to_lowercase();
            !PLACEHOLDER_VALUES.contains(&normalized.as_str())
        }
        FieldValue::Bool(_) => false,
    }
}

/// Copy of `data` keeping only filled fields; emptied sections are dropped.
pub fn filter_filled(data: &ExtractedPdfData) -> ExtractedPdfData {
    let sections: Vec<FormSection> = data
        .sections
        .iter()
        .map(|section| {
            FormSection::new(
                section.title.clone(),
                section.fields.iter().filter(|f| is_filled(f)).cloned().collect(),
            )
        })
        .collect();

    ExtractedPdfData::from_sections(
        sections,
        data.summary.clone(),
        data.notes.clone(),
        data.raw_text.clone(),
    )
}

/// Number of filled fields.
pub fn filled_count(data: &ExtractedPdfData) -> usize {
    data.form_fields.iter().filter(|f| is_filled(f)).count()
}
