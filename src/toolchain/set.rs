//! Per-machine toolchain sets.

use camino::Utf8Path;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::compiler::Compiler;
use super::language::Language;
use super::linker::StaticLinker;

/// Which machine a target's binaries run on.
///
/// A target is entirely cross-built or entirely native; the two never mix
/// within one link.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Machine {
    /// The machine daiku itself runs on.
    #[default]
    Native,
    /// The machine described by the cross file.
    Cross,
}

impl std::fmt::Display for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Native => f.write_str("native"),
            Self::Cross => f.write_str("cross"),
        }
    }
}

/// All probed compilers and archivers, split by machine.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ToolchainSet {
    /// Native compilers keyed by language.
    #[serde(default)]
    pub native: IndexMap<Language, Compiler>,
    /// Cross compilers keyed by language.
    #[serde(default)]
    pub cross: IndexMap<Language, Compiler>,
    /// Native static archiver.
    #[serde(default)]
    pub native_static_linker: Option<StaticLinker>,
    /// Cross static archiver.
    #[serde(default)]
    pub cross_static_linker: Option<StaticLinker>,
}

impl ToolchainSet {
    /// The compiler for `language` on `machine`, if one was probed.
    #[must_use]
    pub fn compiler_for(&self, machine: Machine, language: Language) -> Option<&Compiler> {
        match machine {
            Machine::Native => self.native.get(&language),
            Machine::Cross => self.cross.get(&language),
        }
    }

    /// Compilers for `machine` in `priority` order.
    ///
    /// The order decides which compiler claims an ambiguous suffix, so the
    /// caller passes the policy from the option snapshot.
    #[must_use]
    pub fn compilers_in_priority<'a>(
        &'a self,
        machine: Machine,
        priority: &[Language],
    ) -> Vec<&'a Compiler> {
        priority
            .iter()
            .filter_map(|lang| self.compiler_for(machine, *lang))
            .collect()
    }

    /// The compiler on `machine` that accepts `source`, honouring
    /// `priority`.
    #[must_use]
    pub fn compiler_for_source<'a>(
        &'a self,
        machine: Machine,
        priority: &[Language],
        source: &Utf8Path,
    ) -> Option<&'a Compiler> {
        self.compilers_in_priority(machine, priority)
            .into_iter()
            .find(|c| c.can_compile(source))
    }

    /// The static archiver for `machine`, if one was probed.
    #[must_use]
    pub const fn static_linker(&self, machine: Machine) -> Option<&StaticLinker> {
        match machine {
            Machine::Native => self.native_static_linker.as_ref(),
            Machine::Cross => self.cross_static_linker.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::{CompilerId, LinkerClass};

    fn set_with(languages: &[Language]) -> ToolchainSet {
        let mut set = ToolchainSet::default();
        for lang in languages {
            set.native.insert(
                *lang,
                Compiler {
                    id: CompilerId::Gcc,
                    language: *lang,
                    machine: Machine::Native,
                    exelist: vec!["cc".into()],
                    linker: LinkerClass::GnuLd,
                },
            );
        }
        set
    }

    #[test]
    fn ambiguous_assembly_lands_on_c() {
        let set = set_with(&[Language::Cpp, Language::C]);
        let priority = Language::default_priority();
        let chosen = set
            .compiler_for_source(Machine::Native, &priority, Utf8Path::new("boot.S"))
            .expect("compiler");
        assert_eq!(chosen.language, Language::C);
    }

    #[test]
    fn missing_cross_compiler_is_none() {
        let set = set_with(&[Language::C]);
        assert!(set.compiler_for(Machine::Cross, Language::C).is_none());
    }
}
