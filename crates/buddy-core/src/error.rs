// ABOUTME: Error types for buddy-core
// ABOUTME: One taxonomy for extraction, request, tool, persistence and lookup failures

use thiserror::Error;

/// Errors that can occur in buddy-core operations
#[derive(Debug, Error)]
pub enum BuddyError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Extraction failed for {name}: {reason}")]
    Extraction { name: String, reason: String },

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    #[error("Invalid tool call: {0}")]
    InvalidToolCall(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Chat not found: {0}")]
    ChatNotFound(String),

    #[error("Message not found: {0}")]
    MessageNotFound(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Reply target not found in chat: {0}")]
    ReplyTargetNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, BuddyError>;

impl BuddyError {
    pub fn extraction(name: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        BuddyError::Extraction {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<reqwest::Error> for BuddyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BuddyError::Request(format!("timed out: {}", err))
        } else {
            BuddyError::Request(err.to_string())
        }
    }
}

impl From<serde_json::Error> for BuddyError {
    fn from(err: serde_json::Error) -> Self {
        BuddyError::Persistence(format!("serialization: {}", err))
    }
}

impl From<std::io::Error> for BuddyError {
    fn from(err: std::io::Error) -> Self {
        BuddyError::Persistence(err.to_string())
    }
}

impl From<zip::result::ZipError> for BuddyError {
    fn from(err: zip::result::ZipError) -> Self {
        BuddyError::ToolExecution(format!("zip: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buddy_error_display_extraction() {
        let err = BuddyError::extraction("report.pdf", "no text layer");
        let display = format!("{}", err);
        assert!(display.contains("Extraction failed"));
        assert!(display.contains("report.pdf"));
        assert!(display.contains("no text layer"));
    }

    #[test]
    fn test_buddy_error_display_unsupported() {
        let err = BuddyError::UnsupportedFormat("bin".to_string());
        assert_eq!(format!("{}", err), "Unsupported format: bin");
    }

    #[test]
    fn test_buddy_error_display_reply_target() {
        let err = BuddyError::ReplyTargetNotFound("msg-9".to_string());
        let display = format!("{}", err);
        assert!(display.contains("Reply target"));
        assert!(display.contains("msg-9"));
    }

    #[test]
    fn test_from_serde_json_error() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: BuddyError = parse_err.into();
        assert!(matches!(err, BuddyError::Persistence(_)));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err: BuddyError = io_err.into();
        match err {
            BuddyError::Persistence(msg) => assert!(msg.contains("disk full")),
            other => panic!("Expected Persistence error, got {:?}", other),
        }
    }

    #[test]
    fn test_buddy_error_debug() {
        let err = BuddyError::ChatNotFound("chat-1".to_string());
        let debug_str = format!("{:?}", err);
        assert!(debug_str.contains("ChatNotFound"));
        assert!(debug_str.contains("chat-1"));
    }
}
