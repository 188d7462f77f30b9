//! Source and generated-file classification, plus unity grouping.
//!
//! Every non-header source must land on exactly one compiler; outputs of
//! generators are sorted into compile inputs, link inputs, or conservative
//! order-only dependencies when nothing better is known about them.

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use thiserror::Error;

use crate::target::{ExtractedObjects, Target};
use crate::toolchain::Language;

/// Suffixes treated as headers.
const HEADER_SUFFIXES: &[&str] = &["h", "hh", "hpp", "hxx", "H", "ipp"];

/// Suffixes treated as objects.
const OBJ_SUFFIXES: &[&str] = &["o", "obj"];

/// Suffixes treated as libraries.
const LIB_SUFFIXES: &[&str] = &["a", "lib", "dll", "dylib", "so"];

fn suffix_of(path: &Utf8Path) -> Option<&str> {
    path.extension()
}

/// Whether `path` is a header.
#[must_use]
pub fn is_header(path: &Utf8Path) -> bool {
    suffix_of(path).is_some_and(|s| HEADER_SUFFIXES.contains(&s))
}

/// Whether `path` is an object file.
#[must_use]
pub fn is_object(path: &Utf8Path) -> bool {
    suffix_of(path).is_some_and(|s| OBJ_SUFFIXES.contains(&s))
}

/// Whether `path` is a library.
#[must_use]
pub fn is_library(path: &Utf8Path) -> bool {
    suffix_of(path).is_some_and(|s| LIB_SUFFIXES.contains(&s))
}

/// Whether `path` belongs to one of the compiled languages.
#[must_use]
pub fn is_source(path: &Utf8Path) -> bool {
    suffix_of(path).is_some_and(|s| {
        Language::default_priority()
            .iter()
            .any(|lang| lang.suffixes().contains(&s))
    })
}

/// How a generator output participates in dependent builds.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GeneratedRole {
    /// Compiled like a declared source.
    Source,
    /// Passed straight to the link.
    Object,
    /// Used at link time only.
    Library,
    /// Must exist before compiles run; the generating tool's behaviour is
    /// otherwise unknown, so this is the conservative default.
    OrderOnly,
}

/// Classify one output of a generator or custom command by suffix.
#[must_use]
pub fn classify_generated(path: &Utf8Path) -> GeneratedRole {
    if is_source(path) {
        GeneratedRole::Source
    } else if is_object(path) {
        GeneratedRole::Object
    } else if is_library(path) {
        GeneratedRole::Library
    } else {
        GeneratedRole::OrderOnly
    }
}

/// One synthetic translation unit of a unity build.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UnityGroup {
    /// Language the merged unit compiles as.
    pub language: Language,
    /// Position among this language's groups.
    pub index: usize,
    /// Sources merged into the unit.
    pub sources: Vec<Utf8PathBuf>,
}

impl UnityGroup {
    /// Filename of the synthesised source, relative to the target's
    /// private directory.
    #[must_use]
    pub fn filename(&self, target_name: &str) -> String {
        format!(
            "{target_name}-unity{}.{}",
            self.index,
            self.language.default_suffix()
        )
    }
}

/// Result of splitting a target's sources for a unity build.
#[derive(Clone, Debug, Default)]
pub struct UnityPartition {
    /// Merged units to compile.
    pub groups: Vec<UnityGroup>,
    /// Sources whose language cannot be merged; compiled individually.
    pub exempt: Vec<(Language, Utf8PathBuf)>,
}

/// Split sources, already assigned to languages, into unity groups of at
/// most `block_size` sources.
#[must_use]
pub fn partition_unity(
    by_language: &IndexMap<Language, Vec<Utf8PathBuf>>,
    block_size: usize,
) -> UnityPartition {
    let block = block_size.max(1);
    let mut partition = UnityPartition::default();
    for (language, sources) in by_language {
        if !language.supports_unity() {
            partition
                .exempt
                .extend(sources.iter().map(|s| (*language, s.clone())));
            continue;
        }
        for (index, chunk) in sources.chunks(block).enumerate() {
            partition.groups.push(UnityGroup {
                language: *language,
                index,
                sources: chunk.to_vec(),
            });
        }
    }
    partition
}

/// A rejected object-extraction request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractionError {
    /// The requested source is not compiled by the named target.
    #[error("target {target:?} does not compile {source_path:?}, cannot extract its object")]
    UnknownSource {
        /// The target objects were requested from.
        target: String,
        /// The unknown source.
        source_path: Utf8PathBuf,
    },
    /// Under a unity build, the requested subset matches neither the whole
    /// target nor exactly one unity group.
    #[error(
        "cannot extract single objects from unity-built target {target:?}: \
         request all objects or one full unity group"
    )]
    PartialUnityExtraction {
        /// The target objects were requested from.
        target: String,
    },
}

/// Validate an object-extraction request against the owning target.
///
/// Outside unity builds any subset of the target's own sources is legal.
/// Under a unity build an object no longer corresponds to one source, so
/// only "everything" or "exactly one unity group" can be honoured.
///
/// # Errors
///
/// Returns [`ExtractionError`] for unknown sources or illegal unity
/// subsets.
pub fn check_object_extraction(
    extraction: &ExtractedObjects,
    target: &Target,
    unity_groups: Option<&[UnityGroup]>,
) -> Result<(), ExtractionError> {
    if extraction.all {
        return Ok(());
    }
    for source in &extraction.sources {
        if !target.sources.iter().any(|s| s.path == *source) {
            return Err(ExtractionError::UnknownSource {
                target: target.id(),
                source_path: source.clone(),
            });
        }
    }
    let Some(groups) = unity_groups else {
        return Ok(());
    };
    if extraction.sources.len() == target.sources.len() {
        return Ok(());
    }
    let matches_one_group = groups.iter().any(|group| {
        group.sources.len() == extraction.sources.len()
            && group.sources.iter().all(|s| extraction.sources.contains(s))
    });
    if matches_one_group {
        Ok(())
    } else {
        Err(ExtractionError::PartialUnityExtraction {
            target: target.id(),
        })
    }
}
