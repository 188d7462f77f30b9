//! Build environment: roots, platforms and project-wide arguments.

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::target::{Platform, Target};
use crate::toolchain::{Language, Machine};

/// Everything about the build that is not a target: directory roots, the
/// platforms binaries run on, and argument stores scoped wider than one
/// target.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Environment {
    /// Absolute path of the source tree.
    pub source_root: Utf8PathBuf,
    /// Absolute path of the build tree.
    pub build_root: Utf8PathBuf,
    /// Platform native binaries run on.
    #[serde(default)]
    pub native_platform: Platform,
    /// Platform cross binaries run on, when a cross toolchain exists.
    #[serde(default)]
    pub cross_platform: Option<Platform>,
    /// Project-wide compile arguments per language.
    #[serde(default)]
    pub global_args: IndexMap<Language, Vec<String>>,
    /// Project-wide link arguments per language.
    #[serde(default)]
    pub global_link_args: IndexMap<Language, Vec<String>>,
    /// Per-subproject compile arguments, keyed by subproject name.
    #[serde(default)]
    pub project_args: IndexMap<String, IndexMap<Language, Vec<String>>>,
    /// Per-subproject link arguments.
    #[serde(default)]
    pub project_link_args: IndexMap<String, IndexMap<Language, Vec<String>>>,
    /// Link arguments captured from the calling environment (`LDFLAGS`).
    /// Applied to native targets only.
    #[serde(default)]
    pub env_link_args: IndexMap<Language, Vec<String>>,
}

impl Environment {
    /// An environment with the given roots and no extra arguments.
    #[must_use]
    pub fn new(source_root: impl Into<Utf8PathBuf>, build_root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            build_root: build_root.into(),
            native_platform: Platform::default(),
            cross_platform: None,
            global_args: IndexMap::new(),
            global_link_args: IndexMap::new(),
            project_args: IndexMap::new(),
            project_link_args: IndexMap::new(),
            env_link_args: IndexMap::new(),
        }
    }

    /// The platform `machine`'s binaries run on, if configured.
    #[must_use]
    pub const fn platform_for(&self, machine: Machine) -> Option<Platform> {
        match machine {
            Machine::Native => Some(self.native_platform),
            Machine::Cross => self.cross_platform,
        }
    }

    /// Relative path from the build root to the source root.
    #[must_use]
    pub fn build_to_src(&self) -> Utf8PathBuf {
        relative_to(&self.source_root, &self.build_root)
    }

    /// Directory of a target's outputs, relative to the build root.
    ///
    /// The build tree mirrors the source tree layout.
    #[must_use]
    pub fn target_dir(&self, target: &Target) -> Utf8PathBuf {
        target.subdir.clone()
    }

    /// A target's private scratch directory, relative to the build root.
    #[must_use]
    pub fn private_dir(&self, target: &Target) -> Utf8PathBuf {
        self.target_dir(target).join(target.id())
    }

    /// A source-tree file's path as seen from the build root.
    #[must_use]
    pub fn source_path(&self, subdir: &Utf8Path, file: &Utf8Path) -> Utf8PathBuf {
        self.build_to_src().join(subdir).join(file)
    }

    /// Project-wide compile arguments for `language`.
    #[must_use]
    pub fn global_args_for(&self, language: Language) -> &[String] {
        self.global_args.get(&language).map_or(&[], Vec::as_slice)
    }

    /// Project-wide link arguments for `language`.
    #[must_use]
    pub fn global_link_args_for(&self, language: Language) -> &[String] {
        self.global_link_args
            .get(&language)
            .map_or(&[], Vec::as_slice)
    }

    /// Subproject compile arguments for `language`.
    #[must_use]
    pub fn project_args_for(&self, subproject: &str, language: Language) -> &[String] {
        self.project_args
            .get(subproject)
            .and_then(|by_lang| by_lang.get(&language))
            .map_or(&[], Vec::as_slice)
    }

    /// Subproject link arguments for `language`.
    #[must_use]
    pub fn project_link_args_for(&self, subproject: &str, language: Language) -> &[String] {
        self.project_link_args
            .get(subproject)
            .and_then(|by_lang| by_lang.get(&language))
            .map_or(&[], Vec::as_slice)
    }

    /// Environment-sourced link arguments for `language` on `machine`.
    #[must_use]
    pub fn env_link_args_for(&self, machine: Machine, language: Language) -> &[String] {
        if machine == Machine::Cross {
            return &[];
        }
        self.env_link_args.get(&language).map_or(&[], Vec::as_slice)
    }
}

/// An `$ORIGIN`-relative rpath entry pointing from `from_dir` to `dir`.
pub(crate) fn origin_relative(dir: &Utf8Path, from_dir: &Utf8Path) -> Utf8PathBuf {
    Utf8PathBuf::from("$ORIGIN").join(relative_to(dir, from_dir))
}

/// Compute `path` relative to `base` by walking up common components.
fn relative_to(path: &Utf8Path, base: &Utf8Path) -> Utf8PathBuf {
    let path_components: Vec<Utf8Component<'_>> = path.components().collect();
    let base_components: Vec<Utf8Component<'_>> = base.components().collect();
    let common = path_components
        .iter()
        .zip(base_components.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let mut result = Utf8PathBuf::new();
    for _ in base_components.iter().skip(common) {
        result.push("..");
    }
    for component in path_components.iter().skip(common) {
        result.push(component.as_str());
    }
    if result.as_str().is_empty() {
        result.push(".");
    }
    result
}
