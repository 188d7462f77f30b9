//! Shared fixtures for integration tests.

use camino::Utf8PathBuf;
use indexmap::IndexMap;

use daiku::env::Environment;
use daiku::options::BuildOptions;
use daiku::target::{Source, Target, TargetGraph, TargetKind};
use daiku::toolchain::{
    Compiler, CompilerId, Language, LinkerClass, Machine, StaticLinker, ToolchainSet,
};

/// An environment rooted at fixed absolute paths; fine for tests that
/// never touch the filesystem.
pub fn test_env() -> Environment {
    Environment::new("/work/src", "/work/build")
}

/// A GCC-flavoured compiler descriptor for `language`.
pub fn gcc(language: Language) -> Compiler {
    Compiler {
        id: CompilerId::Gcc,
        language,
        machine: Machine::Native,
        exelist: vec!["cc".into()],
        linker: LinkerClass::GnuLd,
    }
}

/// A native toolchain set with C, C++ and Java compilers plus an
/// archiver.
pub fn toolchains() -> ToolchainSet {
    let mut set = ToolchainSet::default();
    for language in [Language::C, Language::Cpp, Language::Java] {
        set.native.insert(language, gcc(language));
    }
    if let Some(javac) = set.native.get_mut(&Language::Java) {
        javac.exelist = vec!["javac".into()];
    }
    set.native_static_linker = Some(StaticLinker {
        exelist: vec!["ar".into()],
    });
    set
}

/// A bare target of the given kind with `sources` from the source tree.
pub fn target(name: &str, kind: TargetKind, sources: &[&str]) -> Target {
    Target {
        name: name.into(),
        subdir: Utf8PathBuf::new(),
        subproject: String::new(),
        machine: Machine::Native,
        kind,
        sources: sources.iter().map(|s| Source::in_tree(*s)).collect(),
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

/// An executable target.
pub fn exe(name: &str, sources: &[&str]) -> Target {
    target(name, TargetKind::Executable { gui_app: false }, sources)
}

/// A PIC static library target.
pub fn static_lib(name: &str, sources: &[&str]) -> Target {
    target(name, TargetKind::StaticLibrary { pic: true }, sources)
}

/// A shared library target with optional version strings.
pub fn shared_lib(
    name: &str,
    sources: &[&str],
    version: Option<&str>,
    soversion: Option<&str>,
) -> Target {
    target(
        name,
        TargetKind::SharedLibrary {
            version: version.map(|v| v.parse().expect("valid version")),
            soversion: soversion.map(ToOwned::to_owned),
        },
        sources,
    )
}

/// Collect targets into a graph.
pub fn graph(targets: Vec<Target>) -> TargetGraph {
    let mut result = TargetGraph::new();
    for t in targets {
        result.insert(t).expect("unique target id");
    }
    result
}
