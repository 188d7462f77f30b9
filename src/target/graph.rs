//! Target records and the graph container.

use camino::Utf8PathBuf;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::options::BuildOptions;
use crate::toolchain::{Language, Machine};

use super::version::LibraryVersion;

/// Stable identifier of a target: its name plus a kind tag, e.g.
/// `core@sta`. Globally unique within one graph.
pub type TargetId = String;

/// Where a source file lives.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceOrigin {
    /// Checked into the source tree.
    SourceTree,
    /// Present in the build tree before generation (configured files).
    BuildTree,
    /// Produced during the build by another target.
    Generated {
        /// The producing target.
        by: TargetId,
    },
}

/// One source file of a target.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Source {
    /// Path relative to the owning tree (or to the producer's output
    /// directory for generated sources).
    pub path: Utf8PathBuf,
    /// Which tree the path is relative to.
    pub origin: SourceOrigin,
}

impl Source {
    /// A plain source-tree file.
    #[must_use]
    pub fn in_tree(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            origin: SourceOrigin::SourceTree,
        }
    }
}

/// A set of include directories declared relative to one subdirectory.
///
/// Each entry expands to the source-tree directory followed by the
/// build-tree mirror of the same directory.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct IncludeDirs {
    /// Subdirectory the entries are relative to.
    #[serde(default)]
    pub curdir: Utf8PathBuf,
    /// Relative directory names.
    pub dirs: Vec<Utf8PathBuf>,
    /// Emit as system include paths.
    #[serde(default)]
    pub is_system: bool,
}

/// Objects fed to the link without compiling them here.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectSource {
    /// A prebuilt object file in the source tree.
    File(Utf8PathBuf),
    /// Objects extracted from another target's compilation.
    Extracted(ExtractedObjects),
}

/// A request for a subset of another target's objects.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ExtractedObjects {
    /// The target whose objects are reused.
    pub target: TargetId,
    /// The sources whose objects are wanted; empty when `all` is set.
    #[serde(default)]
    pub sources: Vec<Utf8PathBuf>,
    /// Take every object of the target.
    #[serde(default)]
    pub all: bool,
}

/// An opaque dependency resolved by the toolchain-discovery collaborator.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ExternalDependency {
    /// Display name used in diagnostics.
    pub name: String,
    /// Compile arguments, in the dependency's own order.
    #[serde(default)]
    pub compile_args: Vec<String>,
    /// Link arguments, in the dependency's own order.
    #[serde(default)]
    pub link_args: Vec<String>,
    /// Whether linking this dependency requires the thread runtime.
    #[serde(default)]
    pub is_threads: bool,
}

/// A dependency on other declared build products.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct InternalDependency {
    /// Include directories contributed to dependents.
    #[serde(default)]
    pub include_dirs: Vec<IncludeDirs>,
    /// Extra compile arguments contributed to dependents.
    #[serde(default)]
    pub compile_args: Vec<String>,
    /// Library targets dependents must link.
    #[serde(default)]
    pub link_with: Vec<TargetId>,
    /// Dependencies composed transitively.
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

/// Either an internal composition of targets or an opaque external
/// dependency.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dependency {
    /// Composed from other targets in this graph.
    Internal(InternalDependency),
    /// Opaque compile/link arguments from outside the graph.
    External(ExternalDependency),
}

/// One argument of a custom command, possibly still list-valued.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CommandArg {
    /// A single argument.
    Single(String),
    /// A list flattened in place before substitution.
    Group(Vec<String>),
}

/// The command of a custom target, prior to token substitution.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CustomCommand {
    /// Argument vector; may contain `@INPUT@`-style tokens.
    pub command: Vec<CommandArg>,
    /// Output filenames, relative to the target directory; never contain a
    /// path separator.
    pub outputs: Vec<String>,
    /// Capture the command's stdout into the single output.
    #[serde(default)]
    pub capture: bool,
    /// Depfile name written by the command.
    #[serde(default)]
    pub depfile: Option<String>,
    /// Rerun on every build.
    #[serde(default)]
    pub build_always: bool,
    /// Extra targets that must be built first.
    #[serde(default)]
    pub extra_depends: Vec<TargetId>,
    /// Files read by the command but absent from its argument list.
    #[serde(default)]
    pub depend_files: Vec<Utf8PathBuf>,
}

/// The closed set of target shapes.
///
/// Kind-specific data lives in the variant payloads; everything shared sits
/// on [`Target`]. Dispatch is by pattern match throughout.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetKind {
    /// A linked program.
    Executable {
        /// Link as a GUI application where the platform distinguishes.
        #[serde(default)]
        gui_app: bool,
    },
    /// A shared library with optional versioning.
    SharedLibrary {
        /// Release version `X[.Y[.Z]]` naming the file on disk.
        #[serde(default)]
        version: Option<LibraryVersion>,
        /// ABI version embedded in the soname; defaults to the release
        /// version's major component.
        #[serde(default)]
        soversion: Option<String>,
    },
    /// A dynamically loaded module: shared, never versioned, never linked
    /// against.
    SharedModule,
    /// An archive of objects. Carries no link arguments of its own; those
    /// propagate to whatever links it.
    StaticLibrary {
        /// Compile the objects as position-independent code.
        #[serde(default)]
        pic: bool,
    },
    /// An arbitrary command producing declared outputs.
    CustomTarget(CustomCommand),
    /// A command run on demand, producing nothing tracked.
    RunTarget {
        /// Argument vector to execute.
        command: Vec<String>,
        /// Targets that must be up to date before the command runs.
        #[serde(default)]
        depends: Vec<TargetId>,
    },
    /// A Java archive, bundled rather than linked.
    Jar {
        /// Entry-point class recorded in the archive manifest.
        #[serde(default)]
        main_class: Option<String>,
    },
}

impl TargetKind {
    /// Short tag distinguishing kinds within target ids.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Executable { .. } => "exe",
            Self::SharedLibrary { .. } => "sha",
            Self::SharedModule => "shm",
            Self::StaticLibrary { .. } => "sta",
            Self::CustomTarget(_) => "cus",
            Self::RunTarget { .. } => "run",
            Self::Jar { .. } => "jar",
        }
    }

    /// Whether this kind can appear in `link_with` lists.
    #[must_use]
    pub const fn is_linkable_library(&self) -> bool {
        matches!(self, Self::SharedLibrary { .. } | Self::StaticLibrary { .. })
    }
}

/// One declared build product.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Target {
    /// Base name without prefix or suffix.
    pub name: String,
    /// Subdirectory within the project, mirrored into the build tree.
    #[serde(default)]
    pub subdir: Utf8PathBuf,
    /// Owning subproject; empty for the main project.
    #[serde(default)]
    pub subproject: String,
    /// Machine this target is built for.
    #[serde(default)]
    pub machine: Machine,
    /// Shape and kind-specific data.
    #[serde(flatten)]
    pub kind: TargetKind,
    /// Sources compiled into this target.
    #[serde(default)]
    pub sources: Vec<Source>,
    /// Objects linked without compiling here.
    #[serde(default)]
    pub objects: Vec<ObjectSource>,
    /// Include directories, lowest priority first.
    #[serde(default)]
    pub include_dirs: Vec<IncludeDirs>,
    /// Per-language extra compile arguments.
    #[serde(default)]
    pub extra_args: IndexMap<Language, Vec<String>>,
    /// Explicit link arguments.
    #[serde(default)]
    pub link_args: Vec<String>,
    /// Internal and external dependencies.
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    /// Library targets linked in.
    #[serde(default)]
    pub link_with: Vec<TargetId>,
    /// Static libraries whose every object must reach the link.
    #[serde(default)]
    pub link_whole: Vec<TargetId>,
    /// Precompiled header per language.
    #[serde(default)]
    pub pch: IndexMap<Language, Utf8PathBuf>,
    /// Install this target's output.
    #[serde(default)]
    pub install: bool,
    /// Installation directory overriding the platform default.
    #[serde(default)]
    pub install_dir: Option<Utf8PathBuf>,
    /// Rpath to embed after installation.
    #[serde(default)]
    pub install_rpath: String,
    /// Resolved option snapshot for this target.
    #[serde(default)]
    pub options: BuildOptions,
    /// Keywords the frontend did not recognise; surfaced as warnings.
    #[serde(default)]
    pub extra_keywords: Vec<String>,
}

impl Target {
    /// The target's globally unique id.
    #[must_use]
    pub fn id(&self) -> TargetId {
        format!("{}@{}", self.name, self.kind.tag())
    }

    /// Effective soversion for shared libraries.
    #[must_use]
    pub fn soversion(&self) -> Option<String> {
        match &self.kind {
            TargetKind::SharedLibrary { version, soversion } => soversion
                .clone()
                .or_else(|| version.as_ref().map(|v| v.major().to_owned())),
            _ => None,
        }
    }
}

/// A second target claimed an already-used id.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("duplicate target id {id:?}")]
pub struct DuplicateTargetId {
    /// The contested id.
    pub id: TargetId,
}

/// The immutable record set generation walks.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct TargetGraph {
    /// Targets keyed by id, in declaration order.
    targets: IndexMap<TargetId, Target>,
}

impl TargetGraph {
    /// An empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a target.
    ///
    /// # Errors
    ///
    /// Returns [`DuplicateTargetId`] when the target's id is already taken.
    pub fn insert(&mut self, target: Target) -> Result<(), DuplicateTargetId> {
        let id = target.id();
        if self.targets.contains_key(&id) {
            return Err(DuplicateTargetId { id });
        }
        self.targets.insert(id, target);
        Ok(())
    }

    /// Look up a target by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Target> {
        self.targets.get(id)
    }

    /// All targets in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&TargetId, &Target)> {
        self.targets.iter()
    }

    /// Number of targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether the graph holds no targets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exe(name: &str) -> Target {
        Target {
            name: name.into(),
            subdir: Utf8PathBuf::new(),
            subproject: String::new(),
            machine: Machine::Native,
            kind: TargetKind::Executable { gui_app: false },
            sources: Vec::new(),
            objects: Vec::new(),
            include_dirs: Vec::new(),
            extra_args: IndexMap::new(),
            link_args: Vec::new(),
            dependencies: Vec::new(),
            link_with: Vec::new(),
            link_whole: Vec::new(),
            pch: IndexMap::new(),
            install: false,
            install_dir: None,
            install_rpath: String::new(),
            options: BuildOptions::default(),
            extra_keywords: Vec::new(),
        }
    }

    #[test]
    fn ids_combine_name_and_kind() {
        assert_eq!(exe("tool").id(), "tool@exe");
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut graph = TargetGraph::new();
        graph.insert(exe("tool")).expect("first insert");
        let err = graph.insert(exe("tool")).expect_err("duplicate");
        assert_eq!(err.id, "tool@exe");
    }

    #[test]
    fn soversion_defaults_to_version_major() {
        let mut lib = exe("a");
        lib.kind = TargetKind::SharedLibrary {
            version: Some("2.1.0".parse().expect("version")),
            soversion: None,
        };
        assert_eq!(lib.soversion(), Some("2".to_owned()));
    }
}
