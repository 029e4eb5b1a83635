//! # Filedeck Protocol Library
//!
//! Wire types for the Filedeck HTTP API, shared by the daemon and its tests.
//!
//! ## Overview
//!
//! - **Message Definitions**: JSON bodies for listings, rename, create-folder,
//!   and the `{message}` / `{error}` envelopes
//! - **Error Codes**: the error taxonomy and its HTTP status numbers
//!
//! ## Example Usage
//!
//! ```rust
//! use filedeck_protocol::FileEntry;
//!
//! let body = r#"[{"name":"notes.txt","isDirectory":false,"size":42}]"#;
//! let entries: Vec<FileEntry> = serde_json::from_str(body).unwrap();
//! assert_eq!(entries, vec![FileEntry::file("notes.txt", 42)]);
//! ```

pub mod messages;

pub use messages::{
    CreateFolderRequest, ErrorCode, ErrorResponse, FileEntry, MessageResponse, PathQuery,
    RenameRequest,
};
