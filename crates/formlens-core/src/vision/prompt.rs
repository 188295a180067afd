//! Extraction instruction sent alongside the page images.

/// Marker the model must use for characters it cannot read.
pub const UNCERTAIN_MARKER: &str = "[?]";

const SELECTION_RULES: &str = "\
SELECTION MARKS:
- A checkbox or radio option is selected ONLY if it visibly contains a mark: a checkmark, an X, \
a filled or shaded region, or a dot inside the box or circle.
- Bold, underlined, circled-by-font, or highlighted TEXT is never evidence of selection. \
Judge the box or circle itself, not the label next to it.
- An empty box is unselected. Report every checkbox and radio option you can see, selected or not.";

fn transcription_rules() -> String {
    format!(
        "NUMBERS AND IDENTIFIERS:\n\
         - Transcribe phone numbers, dates, ID numbers, policy numbers, lot numbers, amounts and codes \
         character by character exactly as written.\n\
         - Never round, reformat, complete or guess digits.\n\
         - If a character is illegible, write {} in its place instead of inventing it.",
        UNCERTAIN_MARKER
    )
}

const SCHEMA: &str = r#"OUTPUT FORMAT:
Respond with a single JSON object inside a ```json code block and nothing else of substance:
{
  "summary": "one or two sentences describing the document",
  "sections": [
    {
      "title": "section title as printed on the form",
      "fields": [
        {"name": "field label", "value": "text value", "type": "text", "note": "optional remark"},
        {"name": "checkbox label", "value": true, "type": "checkbox"}
      ]
    }
  ],
  "notes": ["anything a reviewer should double-check"]
}
- "type" is one of: text, checkbox, radio, dropdown, other.
- For checkbox and radio fields "value" is true or false.
- For all other fields "value" is a string; use "" for a field that is present but blank.
- Keep sections and fields in the order they appear on the page."#;

/// Build the instruction for a document of `page_count` pages.
pub fn build_prompt(page_count: usize) -> String {
    let pages = if page_count == 1 {
        "The attached image is a scanned form.".to_string()
    } else {
        format!(
            "The {} attached images are the pages of one scanned form, in order.",
            page_count
        )
    };

    format!(
        "You are extracting data from a form for human review. {}\n\
         Extract every field, its value, and every checkbox or radio selection.\n\n\
         {}\n\n{}\n\n{}",
        pages,
        SELECTION_RULES,
        transcription_rules(),
        SCHEMA
    )
}
