//! Transactional server-side procedures
//!
//! Each procedure pairs a base name with a JavaScript body. The body hash is
//! part of the installed name, so a changed body installs next to the old
//! one instead of replacing it under running clients.
//!
//! - [`UpsertWithHistory`] - writes a new current version, optionally
//!   retaining the prior one as history
//! - [`HardDelete`] - removes every version of a logical resource

pub mod hard_delete;
pub mod installer;
pub mod upsert_with_history;

pub use hard_delete::HardDelete;
pub use installer::StoredProcedureInstaller;
pub use upsert_with_history::UpsertWithHistory;

use sha2::{Digest, Sha256};

/// Number of hex characters of the body hash in an installed name
const HASH_PREFIX_LEN: usize = 16;

/// A named server-side procedure and its body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcedureDefinition {
    /// Name without the body hash
    pub base_name: &'static str,

    /// JavaScript source
    pub body: &'static str,
}

impl ProcedureDefinition {
    /// Name the procedure is installed and invoked under
    ///
    /// `{base_name}_{first 16 hex chars of sha256(body)}`
    pub fn installed_name(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.body.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        format!("{}_{}", self.base_name, &digest[..HASH_PREFIX_LEN])
    }

    /// Whether `name` is an installed name of this procedure
    pub fn matches(&self, name: &str) -> bool {
        name.strip_prefix(self.base_name)
            .and_then(|rest| rest.strip_prefix('_'))
            .is_some_and(|hash| hash.len() == HASH_PREFIX_LEN)
    }
}

/// Every procedure the data store invokes
pub fn all() -> [ProcedureDefinition; 2] {
    [UpsertWithHistory::DEFINITION, HardDelete::DEFINITION]
}
