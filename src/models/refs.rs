//! Target ref types.

use serde::Serialize;

/// Namespaces searched for a target branch, in order of preference.
pub const REF_NAMESPACES: [&str; 2] = ["refs/heads/", "refs/remotes/origin/"];

/// A branch name resolved to a full ref and the commit it points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedRef {
    /// Full ref name, e.g. `refs/remotes/origin/main`
    pub name: String,
    /// Commit id the ref pointed at when resolved
    pub oid: String,
}

impl ResolvedRef {
    pub fn is_remote(&self) -> bool {
        self.name.starts_with("refs/remotes/")
    }
}
