//! HTTP API message definitions for Filedeck.
//!
//! This module defines the JSON bodies exchanged between the daemon and the
//! browser client. Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};

/// A single file or directory entry in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Whether the entry is a directory.
    pub is_directory: bool,
    /// Size in bytes. For directories this is the aggregated size of the tree.
    pub size: u64,
}

impl FileEntry {
    /// Create a file entry.
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            is_directory: false,
            size,
        }
    }

    /// Create a directory entry.
    pub fn directory(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            is_directory: true,
            size,
        }
    }
}

/// Query string carrying a sandbox-relative path.
///
/// A missing `path` parameter is the empty path, i.e. the sandbox root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathQuery {
    /// Path relative to the sandbox root.
    #[serde(default)]
    pub path: String,
}

/// Request to rename an entry in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameRequest {
    /// Current path relative to the sandbox root.
    pub old_path: String,
    /// New name, a single path segment.
    pub new_name: String,
}

/// Request to create a folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateFolderRequest {
    /// Name of the new folder, a single path segment.
    pub name: String,
    /// Parent directory relative to the sandbox root.
    #[serde(default)]
    pub path: String,
}

/// Success body for mutating operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Human-readable message.
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error body returned with every non-2xx JSON response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Error codes for the conditions the API distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Invalid request or parameters (bad name, malformed body).
    InvalidRequest,
    /// Path escapes the sandbox root.
    Forbidden,
    /// Resource not found.
    NotFound,
    /// Resource already exists.
    AlreadyExists,
    /// Request body exceeds the configured limit.
    PayloadTooLarge,
    /// Server-side error.
    InternalError,
}

impl ErrorCode {
    /// HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::InvalidRequest => 400,
            ErrorCode::Forbidden => 403,
            ErrorCode::NotFound => 404,
            ErrorCode::AlreadyExists => 409,
            ErrorCode::PayloadTooLarge => 413,
            ErrorCode::InternalError => 500,
        }
    }
}
