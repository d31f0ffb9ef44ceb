//! Plain data types shared by both backends.
//!
//! These structs are serialized to JSON by the CLI.
//! - `blame`: BlameLine, InputFile, padding of uncommitted lines
//! - `diff`: ChangedFiles, ChangedLines, DiffStatus
//! - `refs`: ResolvedRef and the namespaces searched for a branch

pub mod blame;
pub mod diff;
pub mod refs;

pub use blame::*;
pub use diff::*;
pub use refs::*;
