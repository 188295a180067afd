//! Rendering of extraction results as JSON, CSV or text.

use formlens_core::filter::is_filled;
use formlens_core::models::form::ExtractedPdfData;

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV, one row per field
    Csv,
    /// Plain text, grouped by section
    Text,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

pub fn render(data: &ExtractedPdfData, format: OutputFormat, pretty: bool) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json if pretty => Ok(serde_json::to_string_pretty(data)?),
        OutputFormat::Json => Ok(serde_json::to_string(data)?),
        OutputFormat::Csv => format_csv(data),
        OutputFormat::Text => Ok(format_text(data)),
    }
}

fn format_csv(data: &ExtractedPdfData) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record(["section", "name", "type", "value", "note", "confidence", "filled"])?;

    for section in &data.sections {
        for field in &section.fields {
            wtr.write_record([
                section.title.as_str(),
                field.name.as_str(),
                field.field_type.as_str(),
                &field.value.to_string(),
                field.note.as_deref().unwrap_or(""),
                &field.confidence.map(|c| format!("{:.2}", c)).unwrap_or_default(),
                if is_filled(field) { "yes" } else { "no" },
            ])?;
        }
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(data: &ExtractedPdfData) -> String {
    let mut output = String::new();

    output.push_str(&format!("{}\n", data.summary));

    for section in &data.sections {
        output.push_str(&format!("\n{}:\n", section.title));
        for field in &section.fields {
            let value = match field.value.as_bool() {
                Some(true) => "[x]".to_string(),
                Some(false) => "[ ]".to_string(),
                None => field.value.to_string(),
            };
            output.push_str(&format!("  {}: {}", field.name, value));
            if let Some(note) = &field.note {
                output.push_str(&format!("  ({})", note));
            }
            output.push('\n');
        }
    }

    if !data.notes.is_empty() {
        output.push_str("\nNotes:\n");
        for note in &data.notes {
            output.push_str(&format!("  - {}\n", note));
        }
    }

    output
}
