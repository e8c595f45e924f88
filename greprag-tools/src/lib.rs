//! # greprag Tools
//!
//! Document tools for the greprag agent: pattern search through ugrep,
//! ripgrep, or an in-process matcher, folder listing, and line-range reads,
//! all confined to one document root.

pub mod executor;
pub mod folder;
pub mod invocation;
pub mod paths;
pub mod read;
pub mod search;
pub mod tree;

pub use executor::{DocumentToolExecutor, truncate_head};
pub use invocation::ToolInvocation;
pub use search::{NativeSearch, RipgrepSearch, SearchBackend, SearchRequest, UgrepSearch};
pub use tree::document_tree;
