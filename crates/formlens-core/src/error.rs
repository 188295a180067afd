//! Error types for the formlens-core library.

use thiserror::Error;

/// Main error type for the formlens library.
///
/// Every fatal condition aborts the extraction; the `Display` output is the
/// message shown to the user.
#[derive(Error, Debug)]
pub enum FormlensError {
    /// The input is neither a page-oriented document nor a JPEG/PNG image.
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// An analysis back-end answered with a non-success status.
    #[error("analysis service returned {status}: {body}")]
    AnalysisService { status: u16, body: String },

    /// The layout service accepted the document but sent no operation location.
    #[error("analysis service response is missing the operation location")]
    MissingOperationHandle,

    /// The layout service reported a terminal failure.
    #[error("document analysis failed: {0}")]
    AnalysisFailed(String),

    /// The polling attempt cap was reached without a terminal status.
    #[error("document analysis timed out after {attempts} attempts")]
    AnalysisTimeout { attempts: u32 },

    /// The caller cancelled the extraction.
    #[error("extraction cancelled")]
    Cancelled,

    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// Image processing error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Transport-level HTTP error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Malformed JSON from a back-end.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A blocking worker panicked or was aborted.
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Invalid page number requested.
    #[error("invalid page number: {0}")]
    InvalidPage(u32),

    /// The rendering library could not be loaded.
    #[error("PDF renderer unavailable: {0}")]
    Unavailable(String),

    /// A page could not be turned into a raster image.
    #[error("failed to render page {page}: {reason}")]
    Render { page: u32, reason: String },
}

impl FormlensError {
    /// Build an [`FormlensError::AnalysisService`] from a status and body.
    pub fn service(status: reqwest::StatusCode, body: impl Into<String>) -> Self {
        Self::AnalysisService {
            status: status.as_u16(),
            body: body.into(),
        }
    }
}

/// Result type for the formlens library.
pub type Result<T> = std::result::Result<T, FormlensError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_message() {
        let err = FormlensError::service(reqwest::StatusCode::UNAUTHORIZED, "bad key");
        assert_eq!(err.to_string(), "analysis service returned 401: bad key");
    }

    #[test]
    fn test_timeout_message() {
        let err = FormlensError::AnalysisTimeout { attempts: 60 };
        assert_eq!(err.to_string(), "document analysis timed out after 60 attempts");
    }
}
