//! File actions.
//!
//! Duplicate removal is either permanent or a move to the system trash.
//! Both paths refuse to touch a file that changed after it was
//! fingerprinted.
//!
//! ```no_run
//! use mediavault::actions::delete_to_trash;
//! use std::path::Path;
//!
//! let result = delete_to_trash(Path::new("downloads/alice/copy.jpg"));
//! ```

pub mod delete;

pub use delete::{
    delete_to_trash, permanent_delete, remove_duplicate, DeleteError, DeleteResult,
    FileSnapshot, RemovalMode,
};
