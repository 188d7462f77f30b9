//! Generation errors and warnings.
//!
//! Configuration and tool-probe errors abort the whole pass; nothing is
//! published when any of them fires. Warnings accumulate on the generator
//! context and never block generation.

use camino::Utf8PathBuf;
use itertools::Itertools;
use miette::Diagnostic;
use thiserror::Error;

use crate::classify::ExtractionError;
use crate::target::TargetId;
use crate::toolchain::{Language, Machine};

/// A fatal generation failure.
#[derive(Debug, Error, Diagnostic)]
pub enum GenError {
    /// Two edges claimed the same output path.
    #[error("targets {first:?} and {second:?} both declare output {output:?}")]
    #[diagnostic(code(daiku::generate::duplicate_output))]
    DuplicateOutput {
        /// The contested output path.
        output: Utf8PathBuf,
        /// Target that claimed it first.
        first: TargetId,
        /// Target that claimed it second.
        second: TargetId,
    },

    /// The target graph contains a dependency cycle.
    #[error("dependency cycle detected: {}", .cycle.iter().join(" -> "))]
    #[diagnostic(code(daiku::generate::dependency_cycle))]
    DependencyCycle {
        /// The cycle, starting and ending at the same target.
        cycle: Vec<TargetId>,
    },

    /// A dependency reference names no target in the graph.
    #[error("target {target:?} references unknown target {dependency:?}")]
    #[diagnostic(code(daiku::generate::unknown_target))]
    UnknownTarget {
        /// The referencing target.
        target: TargetId,
        /// The dangling reference.
        dependency: TargetId,
    },

    /// Something other than a library appeared in a link list.
    #[error("target {target:?} cannot link with non-library target {dependency:?}")]
    #[diagnostic(code(daiku::generate::non_library_link))]
    NonLibraryLinkTarget {
        /// The linking target.
        target: TargetId,
        /// The non-library dependency.
        dependency: TargetId,
    },

    /// A link mixes cross-built and native artifacts.
    #[error("target {target:?} ({target_machine}) cannot link with {dependency:?} ({dependency_machine})")]
    #[diagnostic(code(daiku::generate::cross_native_mix))]
    CrossNativeMix {
        /// The linking target.
        target: TargetId,
        /// Its machine.
        target_machine: Machine,
        /// The mismatched dependency.
        dependency: TargetId,
        /// The dependency's machine.
        dependency_machine: Machine,
    },

    /// A non-PIC static library was linked into a shared library.
    #[error(
        "shared library {target:?} links non-PIC static library {dependency:?}; \
         build it with position-independent code"
    )]
    #[diagnostic(code(daiku::generate::non_pic_static))]
    NonPicStaticIntoShared {
        /// The shared library.
        target: TargetId,
        /// The non-PIC static dependency.
        dependency: TargetId,
    },

    /// An illegal object-extraction request.
    #[error(transparent)]
    #[diagnostic(code(daiku::generate::object_extraction))]
    Extraction(#[from] ExtractionError),

    /// No compiler accepts a source file.
    #[error("no compiler accepts source {source_path:?} of target {target:?}")]
    #[diagnostic(code(daiku::generate::no_compiler_for_source))]
    NoCompilerForSource {
        /// The owning target.
        target: TargetId,
        /// The unclaimed source.
        source_path: Utf8PathBuf,
    },

    /// A source compiles to a language the generic link path cannot take.
    #[error(
        "source {source_path:?} of target {target:?} is {language}, which must be \
         bundled by a dedicated target kind rather than linked"
    )]
    #[diagnostic(code(daiku::generate::non_linkable_language))]
    NonLinkableLanguage {
        /// The owning target.
        target: TargetId,
        /// The offending source.
        source_path: Utf8PathBuf,
        /// Its language.
        language: Language,
    },

    /// A required compiler was never probed. Generation fails closed
    /// rather than emitting an edge against a missing tool.
    #[error("no {language} compiler configured for the {machine} machine")]
    #[diagnostic(code(daiku::generate::missing_compiler))]
    MissingCompiler {
        /// Needed language.
        language: Language,
        /// Needed machine.
        machine: Machine,
    },

    /// A required static archiver was never probed.
    #[error("no static linker configured for the {machine} machine")]
    #[diagnostic(code(daiku::generate::missing_static_linker))]
    MissingStaticLinker {
        /// Needed machine.
        machine: Machine,
    },

    /// A cross target exists but no cross platform is configured.
    #[error("target {target:?} is cross-built but no cross platform is configured")]
    #[diagnostic(code(daiku::generate::missing_platform))]
    MissingPlatform {
        /// The orphaned target.
        target: TargetId,
    },

    /// Capturing stdout is only possible into exactly one output.
    #[error("custom target {target:?} captures output but declares {count} outputs")]
    #[diagnostic(code(daiku::generate::capture_outputs))]
    CaptureWithMultipleOutputs {
        /// The custom target.
        target: TargetId,
        /// Declared output count.
        count: usize,
    },

    /// `@OUTPUT@` cannot be combined with stdout capture.
    #[error("custom target {target:?} uses @OUTPUT@ in its command while capturing stdout")]
    #[diagnostic(code(daiku::generate::capture_output_token))]
    OutputTokenWithCapture {
        /// The custom target.
        target: TargetId,
    },

    /// A single-valued token was used while several values exist.
    #[error(
        "custom target {target:?} embeds {token} in an argument but has \
         {count} candidate values; use an indexed token"
    )]
    #[diagnostic(code(daiku::generate::ambiguous_token))]
    SingleValuedToken {
        /// The custom target.
        target: TargetId,
        /// The offending token.
        token: String,
        /// How many values were available.
        count: usize,
    },

    /// A substitution token has nothing to expand to.
    #[error("custom target {target:?} uses {token} but has no value for it")]
    #[diagnostic(code(daiku::generate::empty_token))]
    TokenWithoutValues {
        /// The custom target.
        target: TargetId,
        /// The valueless token.
        token: String,
    },

    /// An indexed substitution token is out of range.
    #[error("custom target {target:?} uses {token} but only {count} values exist")]
    #[diagnostic(code(daiku::generate::token_index))]
    TokenIndexOutOfRange {
        /// The custom target.
        target: TargetId,
        /// The out-of-range token.
        token: String,
        /// How many values exist.
        count: usize,
    },

    /// A substituted command does not parse as a shell word sequence.
    #[error("custom target {target:?} produced an unparseable command: {snippet}")]
    #[diagnostic(code(daiku::generate::invalid_command))]
    InvalidCommand {
        /// The custom target.
        target: TargetId,
        /// Leading fragment of the offending command.
        snippet: String,
    },

    /// A literal newline reached an argument outside the wrapper path.
    #[error("argument {argument:?} in {location} contains a literal newline")]
    #[diagnostic(code(daiku::generate::embedded_newline))]
    EmbeddedNewline {
        /// Where the argument was headed.
        location: String,
        /// Leading fragment of the argument.
        argument: String,
    },

    /// Writing generated output failed.
    #[error("failed to write {path}")]
    #[diagnostic(code(daiku::generate::io))]
    Io {
        /// The path being written.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// A non-fatal observation surfaced to the caller.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Warning {
    /// Target the warning concerns, when there is one.
    pub target: Option<TargetId>,
    /// Human-readable message.
    pub message: String,
}

impl Warning {
    /// A warning attached to `target`.
    #[must_use]
    pub fn for_target(target: impl Into<TargetId>, message: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            message: message.into(),
        }
    }
}
