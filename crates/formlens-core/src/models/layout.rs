//! Raw payload of the layout-analysis service.
//!
//! Every collection is optional on the wire and defaults to empty.

use serde::{Deserialize, Serialize};

/// Analysis payload returned once an operation succeeds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyzeResult {
    /// Full document text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub pages: Vec<LayoutPage>,
    pub paragraphs: Vec<Paragraph>,
    pub tables: Vec<Table>,
    pub key_value_pairs: Vec<KeyValuePair>,
    pub languages: Vec<DetectedLanguage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutPage {
    pub page_number: u32,
    pub selection_marks: Vec<SelectionMark>,
}

/// A detected checkbox/radio mark.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SelectionMark {
    /// "selected" or "unselected".
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl SelectionMark {
    pub fn is_selected(&self) -> bool {
        self.state == "selected"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Paragraph {
    pub content: String,
    /// Structural role such as "title" or "sectionHeading".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Table {
    pub row_count: usize,
    pub column_count: usize,
    pub cells: Vec<TableCell>,
}

/// A table cell (0-based indices).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableCell {
    pub row_index: usize,
    pub column_index: usize,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyValuePair {
    pub key: KeyValueElement,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<KeyValueElement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyValueElement {
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectedLanguage {
    pub locale: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

/// Body of a status query against an operation handle.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OperationStatus {
    pub status: String,
    pub analyze_result: Option<AnalyzeResult>,
    pub error: Option<OperationError>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OperationError {
    pub code: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_sparse_payload() {
        let json = r#"{
            "status": "succeeded",
            "analyzeResult": {
                "pages": [{"pageNumber": 1, "selectionMarks": [{"state": "selected", "confidence": 0.9}]}],
                "keyValuePairs": [{"key": {"content": "Name"}, "value": {"content": "Jane Doe"}}]
            }
        }"#;
        let status: OperationStatus = serde_json::from_str(json).unwrap();
        let result = status.analyze_result.unwrap();

        assert_eq!(status.status, "succeeded");
        assert!(result.paragraphs.is_empty());
        assert!(result.pages[0].selection_marks[0].is_selected());
        assert_eq!(result.key_value_pairs[0].value.as_ref().unwrap().content, "Jane Doe");
    }

    #[test]
    fn test_deserialize_failed_status() {
        let json = r#"{"status": "failed", "error": {"code": "InvalidContent", "message": "corrupt file"}}"#;
        let status: OperationStatus = serde_json::from_str(json).unwrap();

        assert_eq!(status.error.unwrap().message, "corrupt file");
        assert!(status.analyze_result.is_none());
    }
}
