//! Rule-identity hashing.
//!
//! Custom commands become one Ninja rule each; identical commands across
//! targets would otherwise produce a forest of duplicate rules. The
//! [`RuleHasher`] computes a stable SHA-256 digest over everything that
//! distinguishes one rule from another so equal commands collapse into a
//! single rule.

use sha2::{Digest, Sha256};

use crate::generate::Rule;

/// Computes stable digests for [`Rule`] definitions.
pub struct RuleHasher;

impl RuleHasher {
    /// Length of the hex digest fragment used in rule names.
    const NAME_LEN: usize = 16;

    /// Digest of everything that distinguishes `rule`.
    #[must_use]
    pub fn hash(rule: &Rule) -> String {
        let mut hasher = Sha256::new();
        Self::update_with_len(&mut hasher, rule.command.as_bytes());
        Self::hash_optional(&mut hasher, rule.description.as_deref());
        Self::hash_optional(&mut hasher, rule.depfile.as_deref());
        Self::hash_optional(&mut hasher, rule.deps.map(|d| d.as_str()));
        Self::hash_optional(&mut hasher, rule.pool.as_deref());
        hasher.update(if rule.restat { b"1" } else { b"0" });
        format!("{:x}", hasher.finalize())
    }

    /// A rule name derived from the digest, `c_` plus a short hex prefix.
    #[must_use]
    pub fn rule_name(rule: &Rule) -> String {
        let digest = Self::hash(rule);
        let short = digest.get(..Self::NAME_LEN).unwrap_or(&digest);
        format!("c_{short}")
    }

    fn hash_optional(hasher: &mut Sha256, value: Option<&str>) {
        match value {
            Some(v) => {
                hasher.update(b"1");
                Self::update_with_len(hasher, v.as_bytes());
            }
            None => hasher.update(b"0"),
        }
    }

    fn update_with_len(hasher: &mut Sha256, bytes: &[u8]) {
        let len = bytes.len();
        hasher.update(format!("{len}:").as_bytes());
        hasher.update(bytes);
    }
}
