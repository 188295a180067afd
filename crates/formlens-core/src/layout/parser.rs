//! Reconstruction of form sections from a layout-analysis payload.
//!
//! Pure functions only: the payload goes in, an [`ExtractedPdfData`] comes out.

use std::collections::BTreeMap;

use tracing::debug;

use crate::models::form::{ExtractedPdfData, FormField, FormSection, summarize_sections};
use crate::models::layout::{AnalyzeResult, KeyValuePair, LayoutPage, Paragraph, Table};
use crate::patterns::KEY_VALUE;

/// Title used until the first header paragraph.
pub const DEFAULT_SECTION: &str = "Document Content";
/// Section holding service-detected key-value pairs.
pub const FORM_FIELDS_SECTION: &str = "Form Fields";
/// Section holding all selection marks.
pub const SELECTIONS_SECTION: &str = "Checkboxes & Selections";
/// Placeholder for a key whose value is present but empty.
pub const EMPTY_PLACEHOLDER: &str = "(empty)";

const HEADING_ROLES: &[&str] = &["title", "sectionHeading"];

/// Convert a layout payload into sections, notes and a summary.
pub fn parse_layout(result: &AnalyzeResult) -> ExtractedPdfData {
    let mut sections = Vec::new();

    if !result.key_value_pairs.is_empty() {
        sections.push(key_value_section(&result.key_value_pairs));
    }

    sections.extend(paragraph_sections(&result.paragraphs));

    for (i, table) in result.tables.iter().enumerate() {
        sections.push(table_section(table, i + 1));
    }

    if result.pages.iter().any(|p| !p.selection_marks.is_empty()) {
        sections.push(selection_section(&result.pages));
    }

    let mut notes = vec![format!("Document has {} page(s)", result.pages.len())];
    if !result.languages.is_empty() {
        let locales: Vec<&str> = result.languages.iter().map(|l| l.locale.as_str()).collect();
        notes.push(format!("Detected languages: {}", locales.join(", ")));
    }

    let sections: Vec<FormSection> = sections.into_iter().filter(|s| !s.fields.is_empty()).collect();
    let summary = summarize_sections(&sections);

    debug!(
        "Layout parse: {} paragraphs, {} tables, {} key-value pairs -> {} sections",
        result.paragraphs.len(),
        result.tables.len(),
        result.key_value_pairs.len(),
        sections.len()
    );

    ExtractedPdfData::from_sections(sections, summary, notes, result.content.clone())
}

/// Whether a paragraph opens a new section.
pub fn is_section_header(paragraph: &Paragraph) -> bool {
    if paragraph
        .role
        .as_deref()
        .is_some_and(|role| HEADING_ROLES.contains(&role))
    {
        return true;
    }

    let text = paragraph.content.trim();
    let len = text.chars().count();

    if len < 100 && text.ends_with(':') {
        return true;
    }

    len < 50 && text.chars().any(char::is_alphabetic) && text == text.to_uppercase()
}

/// Split paragraphs into sections at header paragraphs.
pub fn paragraph_sections(paragraphs: &[Paragraph]) -> Vec<FormSection> {
    let mut sections = Vec::new();
    let mut title = DEFAULT_SECTION.to_string();
    let mut fields: Vec<FormField> = Vec::new();
    let mut text_counter = 0;

    for paragraph in paragraphs {
        let text = paragraph.content.trim();
        if text.is_empty() {
            continue;
        }

        if is_section_header(paragraph) {
            if !fields.is_empty() {
                sections.push(FormSection::new(title.clone(), std::mem::take(&mut fields)));
            }
            title = header_title(text);
            continue;
        }

        let field = match KEY_VALUE.captures(text) {
            Some(caps) => FormField::text(caps[1].trim(), caps[2].trim()),
            None => {
                text_counter += 1;
                FormField::text(format!("Text {}", text_counter), text)
            }
        };
        fields.push(field.with_section(title.clone()));
    }

    if !fields.is_empty() {
        sections.push(FormSection::new(title, fields));
    }

    sections
}

fn header_title(text: &str) -> String {
    let stripped = text.trim_end_matches(':').trim();
    if stripped.is_empty() {
        text.to_string()
    } else {
        stripped.to_string()
    }
}

/// One field per key-value pair with a non-empty key.
pub fn key_value_section(pairs: &[KeyValuePair]) -> FormSection {
    let fields = pairs
        .iter()
        .filter_map(|pair| {
            let key = pair.key.content.trim();
            if key.is_empty() {
                return None;
            }

            // A blank value was detected on the form; no value means none was found.
            let value = match &pair.value {
                Some(v) if !v.content.trim().is_empty() => v.content.trim().to_string(),
                Some(_) => EMPTY_PLACEHOLDER.to_string(),
                None => String::new(),
            };

            Some(
                FormField::text(key.trim_end_matches(':').trim(), value)
                    .with_section(FORM_FIELDS_SECTION)
                    .with_confidence(pair.confidence),
            )
        })
        .collect();

    FormSection::new(FORM_FIELDS_SECTION, fields)
}

/// Column headers from row 0, defaulting to "Column {i}" for missing cells.
fn table_headers(table: &Table, columns: usize) -> Vec<String> {
    let mut headers: Vec<String> = (1..=columns).map(|i| format!("Column {}", i)).collect();
    for cell in table.cells.iter().filter(|c| c.row_index == 0) {
        let content = cell.content.trim();
        if cell.column_index < columns && !content.is_empty() {
            headers[cell.column_index] = content.to_string();
        }
    }
    headers
}

/// Rows after the header as header -> value maps, tolerating missing cells.
pub fn table_rows(table: &Table) -> Vec<(usize, Vec<(String, String)>)> {
    let columns = table
        .cells
        .iter()
        .map(|c| c.column_index + 1)
        .max()
        .unwrap_or(0)
        .max(table.column_count);
    let headers = table_headers(table, columns);

    let mut grid: BTreeMap<usize, BTreeMap<usize, &str>> = BTreeMap::new();
    for cell in table.cells.iter().filter(|c| c.row_index > 0) {
        grid.entry(cell.row_index)
            .or_default()
            .insert(cell.column_index, cell.content.trim());
    }

    grid.into_iter()
        .map(|(row, cells)| {
            let values = cells
                .into_iter()
                .map(|(col, content)| (headers[col].clone(), content.to_string()))
                .collect();
            (row, values)
        })
        .collect()
}

/// Section "Table {n}" with one field per non-empty body cell.
pub fn table_section(table: &Table, number: usize) -> FormSection {
    let title = format!("Table {}", number);

    let fields = table_rows(table)
        .into_iter()
        .flat_map(|(row, values)| {
            let title = title.clone();
            values
                .into_iter()
                .filter(|(_, value)| !value.is_empty())
                .map(move |(header, value)| {
                    FormField::text(format!("{} (Row {})", header, row), value).with_section(title.clone())
                })
        })
        .collect();

    FormSection::new(title, fields)
}

/// All selection marks across pages as checkbox fields.
pub fn selection_section(pages: &[LayoutPage]) -> FormSection {
    let fields = pages
        .iter()
        .flat_map(|page| {
            page.selection_marks.iter().enumerate().map(move |(index, mark)| {
                FormField::checkbox(
                    format!("Selection {} (Page {})", index + 1, page.page_number),
                    mark.is_selected(),
                )
                .with_section(SELECTIONS_SECTION)
                .with_note(format!("State: {}", mark.state))
                .with_confidence(mark.confidence)
            })
        })
        .collect();

    FormSection::new(SELECTIONS_SECTION, fields)
}
