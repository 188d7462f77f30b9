//! Build option snapshots.
//!
//! The persisted option store lives in an external frontend; daiku only sees
//! a resolved snapshot per target. The snapshot deserialises from the same
//! JSON document the frontend persists, so collections default to the stock
//! configuration when absent.

use serde::{Deserialize, Serialize};

use crate::toolchain::Language;

/// Optimisation/debug profile selected for a build.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildType {
    /// No flags beyond what the toolchain always emits.
    Plain,
    /// Debug info, no optimisation.
    #[default]
    Debug,
    /// Debug info with optimisation.
    DebugOptimized,
    /// Full optimisation, no debug info.
    Release,
    /// Optimise for size.
    MinSize,
}

/// Runtime instrumentation requested for compiled code.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sanitizer {
    /// No sanitizer.
    #[default]
    None,
    /// AddressSanitizer.
    Address,
    /// ThreadSanitizer.
    Thread,
    /// UndefinedBehaviorSanitizer.
    Undefined,
    /// MemorySanitizer.
    Memory,
}

impl Sanitizer {
    /// The `-fsanitize=` value for this sanitizer, if any.
    #[must_use]
    pub const fn flag_value(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Address => Some("address"),
            Self::Thread => Some("thread"),
            Self::Undefined => Some("undefined"),
            Self::Memory => Some("memory"),
        }
    }
}

/// A resolved per-target option snapshot.
///
/// Every target in the graph carries one of these; the frontend is
/// responsible for merging project defaults with per-target overrides
/// before daiku runs.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct BuildOptions {
    /// Optimisation/debug profile.
    pub buildtype: BuildType,
    /// Warning level, 0 (quiet) to 3 (everything).
    pub warning_level: u8,
    /// Treat warnings as errors.
    pub werror: bool,
    /// Merge compatible sources into unity translation units.
    pub unity: bool,
    /// Number of sources per unity translation unit.
    pub unity_size: usize,
    /// Requested sanitizer instrumentation.
    pub sanitize: Sanitizer,
    /// Compile and link with coverage instrumentation.
    pub coverage: bool,
    /// Compile and link with link-time optimisation.
    pub lto: bool,
    /// Define `NDEBUG` for compiled code.
    pub ndebug: bool,
    /// Build static libraries as position-independent code.
    pub staticpic: bool,
    /// Language order used to resolve ambiguous source suffixes.
    ///
    /// Narrower languages must precede their supersets so that, for
    /// example, an assembly source lands on the C compiler when both the C
    /// and C++ compilers accept it.
    pub language_priority: Vec<Language>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            buildtype: BuildType::default(),
            warning_level: 1,
            werror: false,
            unity: false,
            unity_size: 4,
            sanitize: Sanitizer::default(),
            coverage: false,
            lto: false,
            ndebug: false,
            staticpic: true,
            language_priority: Language::default_priority(),
        }
    }
}
