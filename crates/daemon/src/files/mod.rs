//! Sandboxed file operations.
//!
//! This module provides the file manager core:
//! - Lexical path resolution confined to one sandbox root
//! - Best-effort recursive directory size aggregation
//! - List, open, delete, rename, create-folder and upload operations
//!
//! # Security
//!
//! Every caller-supplied path goes through [`PathResolver`] before any
//! filesystem call. The operations only accept [`ResolvedPath`], which the
//! resolver alone can construct, so an unchecked path cannot reach the
//! filesystem.

pub mod error;
pub mod resolver;
pub mod service;
pub mod size;

pub use error::{FileError, FileResult};
pub use resolver::{validate_name, PathResolver, ResolvedPath};
pub use service::{DirectoryEntry, FileService, OpenedFile, PendingUpload, UPLOAD_TEMP_PREFIX};
pub use size::{DirectorySizeAggregator, DEFAULT_MAX_DEPTH};
