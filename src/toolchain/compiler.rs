//! Compiler descriptors and their flag templates.

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::options::{BuildOptions, BuildType};

use super::language::Language;
use super::linker::LinkerClass;
use super::set::Machine;

/// Dialect family a compiler belongs to.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompilerId {
    /// GNU Compiler Collection.
    Gcc,
    /// Clang/LLVM in GCC-compatible mode.
    Clang,
    /// Microsoft Visual C++.
    Msvc,
}

/// How the executor should interpret a compile edge's dependency output.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DepsStyle {
    /// Makefile-style depfile written by the compiler.
    Gcc,
    /// `/showIncludes` parsing of compiler stdout.
    Msvc,
}

impl DepsStyle {
    /// The value of the `deps` rule variable.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gcc => "gcc",
            Self::Msvc => "msvc",
        }
    }
}

/// An already-probed compiler for one language on one machine.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Compiler {
    /// Dialect family.
    pub id: CompilerId,
    /// Language this compiler accepts.
    pub language: Language,
    /// Machine whose binaries this compiler produces.
    pub machine: Machine,
    /// Command line used to invoke the compiler.
    pub exelist: Vec<String>,
    /// Linker driven through this compiler.
    pub linker: LinkerClass,
}

impl Compiler {
    /// Whether this compiler accepts `path` as a translation unit.
    #[must_use]
    pub fn can_compile(&self, path: &Utf8Path) -> bool {
        let Some(ext) = path.extension() else {
            return false;
        };
        self.language
            .compilable_suffixes()
            .iter()
            .any(|s| *s == ext)
    }

    /// Flags emitted on every invocation.
    #[must_use]
    pub fn always_args(&self) -> Vec<String> {
        match self.id {
            CompilerId::Gcc => vec!["-pipe".into()],
            CompilerId::Clang => Vec::new(),
            CompilerId::Msvc => vec!["/nologo".into()],
        }
    }

    /// Include-path argument for `path`.
    #[must_use]
    pub fn include_args(&self, path: &Utf8Path, is_system: bool) -> Vec<String> {
        let dir = if path.as_str().is_empty() {
            "."
        } else {
            path.as_str()
        };
        if is_system && self.id != CompilerId::Msvc {
            return vec!["-isystem".into(), dir.into()];
        }
        vec![format!("-I{dir}")]
    }

    /// Compile-without-linking flag.
    #[must_use]
    pub fn compile_only_args(&self) -> Vec<String> {
        match self.id {
            CompilerId::Gcc | CompilerId::Clang => vec!["-c".into()],
            CompilerId::Msvc => vec!["/c".into()],
        }
    }

    /// Object-output arguments for `target`.
    #[must_use]
    pub fn output_args(&self, target: &str) -> Vec<String> {
        match self.id {
            CompilerId::Gcc | CompilerId::Clang => vec!["-o".into(), target.into()],
            CompilerId::Msvc => vec![format!("/Fo{target}")],
        }
    }

    /// Suffix of object files this compiler writes.
    #[must_use]
    pub const fn object_suffix(&self) -> &'static str {
        match self.id {
            CompilerId::Gcc | CompilerId::Clang => "o",
            CompilerId::Msvc => "obj",
        }
    }

    /// Link-output arguments for `target`.
    #[must_use]
    pub fn linker_output_args(&self, target: &str) -> Vec<String> {
        match self.id {
            CompilerId::Gcc | CompilerId::Clang => vec!["-o".into(), target.into()],
            CompilerId::Msvc => vec![format!("/OUT:{target}")],
        }
    }

    /// Position-independent-code flags, empty where PIC is implicit.
    #[must_use]
    pub fn pic_args(&self) -> Vec<String> {
        match self.id {
            CompilerId::Gcc | CompilerId::Clang => vec!["-fPIC".into()],
            CompilerId::Msvc => Vec::new(),
        }
    }

    /// Whether this compiler can emit per-object include lists.
    #[must_use]
    pub const fn supports_depfile(&self) -> bool {
        matches!(self.id, CompilerId::Gcc | CompilerId::Clang)
    }

    /// Dependency-scanning style for the executor.
    #[must_use]
    pub const fn deps_style(&self) -> DepsStyle {
        match self.id {
            CompilerId::Gcc | CompilerId::Clang => DepsStyle::Gcc,
            CompilerId::Msvc => DepsStyle::Msvc,
        }
    }

    /// Arguments that make the compiler write a depfile for `outtarget`
    /// into `outfile`.
    #[must_use]
    pub fn dependency_gen_args(&self, outtarget: &str, outfile: &str) -> Vec<String> {
        match self.id {
            CompilerId::Gcc | CompilerId::Clang => vec![
                "-MD".into(),
                "-MQ".into(),
                outtarget.into(),
                "-MF".into(),
                outfile.into(),
            ],
            CompilerId::Msvc => vec!["/showIncludes".into()],
        }
    }

    /// Optimisation/debug flags for `buildtype`.
    #[must_use]
    pub fn buildtype_args(&self, buildtype: BuildType) -> Vec<String> {
        let args: &[&str] = match self.id {
            CompilerId::Gcc | CompilerId::Clang => match buildtype {
                BuildType::Plain => &[],
                BuildType::Debug => &["-O0", "-g"],
                BuildType::DebugOptimized => &["-O2", "-g"],
                BuildType::Release => &["-O3"],
                BuildType::MinSize => &["-Os", "-g"],
            },
            CompilerId::Msvc => match buildtype {
                BuildType::Plain => &[],
                BuildType::Debug => &["/MDd", "/Zi", "/Ob0", "/Od", "/RTC1"],
                BuildType::DebugOptimized => &["/MD", "/Zi", "/O2", "/Ob1"],
                BuildType::Release => &["/MD", "/O2", "/Ob2"],
                BuildType::MinSize => &["/MD", "/Zi", "/Os", "/Ob1"],
            },
        };
        args.iter().map(|a| (*a).into()).collect()
    }

    /// Linker flags for `buildtype`.
    #[must_use]
    pub fn buildtype_linker_args(&self, buildtype: BuildType) -> Vec<String> {
        match (self.linker, buildtype) {
            (LinkerClass::GnuLd, BuildType::Release) => vec!["-Wl,-O1".into()],
            (LinkerClass::MsvcLink, BuildType::MinSize) => vec!["/INCREMENTAL:NO".into()],
            _ => Vec::new(),
        }
    }

    /// Flags emitted on every link.
    #[must_use]
    pub fn linker_always_args(&self) -> Vec<String> {
        match self.id {
            CompilerId::Gcc | CompilerId::Clang => Vec::new(),
            CompilerId::Msvc => vec!["/nologo".into()],
        }
    }

    /// Warning flags for `level` (0 quiet, 3 everything).
    #[must_use]
    pub fn warn_args(&self, level: u8) -> Vec<String> {
        let args: &[&str] = match self.id {
            CompilerId::Gcc | CompilerId::Clang => match level {
                0 => &[],
                1 => &["-Wall"],
                2 => &["-Wall", "-Wextra"],
                _ => &["-Wall", "-Wextra", "-Wpedantic"],
            },
            CompilerId::Msvc => match level {
                0 => &[],
                1 => &["/W2"],
                2 => &["/W3"],
                _ => &["/W4"],
            },
        };
        args.iter().map(|a| (*a).into()).collect()
    }

    /// Warnings-as-errors flag.
    #[must_use]
    pub fn werror_args(&self) -> Vec<String> {
        match self.id {
            CompilerId::Gcc | CompilerId::Clang => vec!["-Werror".into()],
            CompilerId::Msvc => vec!["/WX".into()],
        }
    }

    /// Compile flags derived from the option snapshot (LTO, sanitizers,
    /// coverage, `NDEBUG`).
    #[must_use]
    pub fn option_compile_args(&self, options: &BuildOptions) -> Vec<String> {
        let mut args = Vec::new();
        let msvc = self.id == CompilerId::Msvc;
        if options.lto {
            args.push(if msvc { "/GL".into() } else { "-flto".to_owned() });
        }
        if let Some(value) = options.sanitize.flag_value() {
            if msvc {
                args.push(format!("/fsanitize:{value}"));
            } else {
                args.push(format!("-fsanitize={value}"));
            }
        }
        if options.coverage && !msvc {
            args.push("--coverage".into());
        }
        if options.ndebug {
            args.push("-DNDEBUG".into());
        }
        args
    }

    /// Link flags derived from the option snapshot.
    #[must_use]
    pub fn option_link_args(&self, options: &BuildOptions) -> Vec<String> {
        let mut args = Vec::new();
        let msvc = self.id == CompilerId::Msvc;
        if options.lto {
            args.push(if msvc { "/LTCG".into() } else { "-flto".to_owned() });
        }
        if let Some(value) = options.sanitize.flag_value()
            && !msvc
        {
            args.push(format!("-fsanitize={value}"));
        }
        if options.coverage && !msvc {
            args.push("--coverage".into());
        }
        args
    }

    /// Flags to compile threaded code.
    #[must_use]
    pub fn thread_flags(&self) -> Vec<String> {
        match self.id {
            CompilerId::Gcc | CompilerId::Clang => vec!["-pthread".into()],
            CompilerId::Msvc => Vec::new(),
        }
    }

    /// Flags to link against the thread runtime.
    #[must_use]
    pub fn thread_link_flags(&self) -> Vec<String> {
        self.thread_flags()
    }

    /// Flags that produce a shared library.
    #[must_use]
    pub fn std_shared_lib_link_args(&self) -> Vec<String> {
        match self.linker {
            LinkerClass::GnuLd => vec!["-shared".into()],
            LinkerClass::AppleLd => vec!["-dynamiclib".into()],
            LinkerClass::MsvcLink => vec!["/DLL".into()],
        }
    }

    /// Flags that produce a dynamically loadable module.
    #[must_use]
    pub fn std_shared_module_link_args(&self) -> Vec<String> {
        match self.linker {
            LinkerClass::AppleLd => vec!["-bundle".into()],
            LinkerClass::GnuLd | LinkerClass::MsvcLink => self.std_shared_lib_link_args(),
        }
    }

    /// Soname (or install-name) arguments for a shared library.
    #[must_use]
    pub fn soname_args(
        &self,
        prefix: &str,
        name: &str,
        suffix: &str,
        soversion: Option<&str>,
    ) -> Vec<String> {
        match self.linker {
            LinkerClass::GnuLd => {
                let sostr = soversion.map(|v| format!(".{v}")).unwrap_or_default();
                vec![format!("-Wl,-soname,{prefix}{name}.{suffix}{sostr}")]
            }
            LinkerClass::AppleLd => vec![
                "-install_name".into(),
                format!("@rpath/{prefix}{name}.{suffix}"),
            ],
            LinkerClass::MsvcLink => Vec::new(),
        }
    }

    /// Import-library generation arguments for Windows toolchains.
    #[must_use]
    pub fn import_library_args(&self, implibname: &str) -> Vec<String> {
        match self.linker {
            LinkerClass::MsvcLink => vec![format!("/IMPLIB:{implibname}")],
            LinkerClass::GnuLd => vec![format!("-Wl,--out-implib={implibname}")],
            LinkerClass::AppleLd => Vec::new(),
        }
    }

    /// Wrap `libs` so the linker pulls every object out of them.
    #[must_use]
    pub fn whole_archive_args(&self, libs: &[String]) -> Vec<String> {
        if libs.is_empty() {
            return Vec::new();
        }
        match self.linker {
            LinkerClass::GnuLd => {
                let mut args = vec!["-Wl,--whole-archive".to_owned()];
                args.extend(libs.iter().cloned());
                args.push("-Wl,--no-whole-archive".into());
                args
            }
            LinkerClass::AppleLd => libs
                .iter()
                .map(|l| format!("-Wl,-force_load,{l}"))
                .collect(),
            LinkerClass::MsvcLink => libs.iter().map(|l| format!("/WHOLEARCHIVE:{l}")).collect(),
        }
    }

    /// Rpath arguments padded for a later in-place install-rpath rewrite.
    ///
    /// `rpath_entries` are already origin-relative. The joined list is
    /// padded with `X` filler up to the install rpath's length so the
    /// post-install patch never changes the binary's size; linkers without
    /// that patching capability get the plain unpadded form.
    #[must_use]
    pub fn build_rpath_args(&self, rpath_entries: &[String], install_rpath: &str) -> Vec<String> {
        if rpath_entries.is_empty() && install_rpath.is_empty() {
            return Vec::new();
        }
        let mut paths = rpath_entries.join(":");
        if self.linker.supports_rpath_padding() && paths.len() < install_rpath.len() {
            let padding = "X".repeat(install_rpath.len() - paths.len());
            if paths.is_empty() {
                paths = padding;
            } else {
                paths = format!("{paths}:{padding}");
            }
        }
        match self.linker {
            LinkerClass::GnuLd | LinkerClass::AppleLd => vec![format!("-Wl,-rpath,{paths}")],
            LinkerClass::MsvcLink => Vec::new(),
        }
    }

    /// GUI-subsystem arguments for executables.
    #[must_use]
    pub fn gui_app_args(&self) -> Vec<String> {
        match self.linker {
            LinkerClass::MsvcLink => vec!["/SUBSYSTEM:WINDOWS".into()],
            LinkerClass::GnuLd | LinkerClass::AppleLd => Vec::new(),
        }
    }

    /// Suffix of precompiled-header outputs.
    #[must_use]
    pub const fn pch_suffix(&self) -> &'static str {
        match self.id {
            CompilerId::Gcc => "gch",
            CompilerId::Clang | CompilerId::Msvc => "pch",
        }
    }

    /// Arguments that make the compiler treat the input as a header to
    /// precompile.
    #[must_use]
    pub fn pch_compile_args(&self) -> Vec<String> {
        match (self.id, self.language) {
            (CompilerId::Gcc | CompilerId::Clang, Language::Cpp | Language::ObjCpp) => {
                vec!["-x".into(), "c++-header".into()]
            }
            (CompilerId::Gcc | CompilerId::Clang, _) => vec!["-x".into(), "c-header".into()],
            (CompilerId::Msvc, _) => Vec::new(),
        }
    }

    /// Arguments that make compile edges consume a precompiled header.
    #[must_use]
    pub fn pch_use_args(&self, header: &str) -> Vec<String> {
        match self.id {
            CompilerId::Gcc | CompilerId::Clang => vec!["-include".into(), header.into()],
            CompilerId::Msvc => vec![format!("/Yu{header}")],
        }
    }

    /// Rewrite GCC-style tokens into this compiler's native dialect.
    #[must_use]
    pub fn unix_args_to_native(&self, args: &[String]) -> Vec<String> {
        if self.id != CompilerId::Msvc {
            return args.to_vec();
        }
        let mut out = Vec::with_capacity(args.len());
        for arg in args {
            if arg == "-pthread" || arg.starts_with("-Wl,") {
                continue;
            }
            if let Some(rest) = arg.strip_prefix("-l") {
                out.push(format!("{rest}.lib"));
            } else if let Some(rest) = arg.strip_prefix("-L") {
                out.push(format!("/LIBPATH:{rest}"));
            } else if let Some(rest) = arg.strip_prefix("-I") {
                out.push(format!("/I{rest}"));
            } else if let Some(rest) = arg.strip_prefix("-D") {
                out.push(format!("/D{rest}"));
            } else if let Some(rest) = arg.strip_prefix("-U") {
                out.push(format!("/U{rest}"));
            } else {
                out.push(arg.clone());
            }
        }
        out
    }

    /// Rule-name fragment identifying this compiler's machine and
    /// language, e.g. `c` or `cpp_CROSS`.
    #[must_use]
    pub fn rule_id(&self) -> String {
        match self.machine {
            Machine::Native => self.language.name().to_owned(),
            Machine::Cross => format!("{}_CROSS", self.language.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8Path;

    fn gcc(language: Language) -> Compiler {
        Compiler {
            id: CompilerId::Gcc,
            language,
            machine: Machine::Native,
            exelist: vec!["cc".into()],
            linker: LinkerClass::GnuLd,
        }
    }

    fn msvc(language: Language) -> Compiler {
        Compiler {
            id: CompilerId::Msvc,
            language,
            machine: Machine::Native,
            exelist: vec!["cl".into()],
            linker: LinkerClass::MsvcLink,
        }
    }

    #[test]
    fn c_compiler_accepts_assembly() {
        assert!(gcc(Language::C).can_compile(Utf8Path::new("boot.S")));
        assert!(!gcc(Language::C).can_compile(Utf8Path::new("notes.txt")));
    }

    #[test]
    fn soname_args_include_soversion() {
        let args = gcc(Language::C).soname_args("lib", "foo", "so", Some("2"));
        assert_eq!(args, vec!["-Wl,-soname,libfoo.so.2".to_owned()]);
    }

    #[test]
    fn rpath_is_padded_to_install_rpath_length() {
        let args = gcc(Language::C).build_rpath_args(
            &["$ORIGIN/sub".to_owned()],
            "/usr/lib/very/long/install/path",
        );
        let expected_len = "-Wl,-rpath,".len() + "/usr/lib/very/long/install/path".len();
        assert_eq!(args.len(), 1);
        assert_eq!(args.first().map(String::len), Some(expected_len));
    }

    #[test]
    fn msvc_dialect_rewrites_gcc_tokens() {
        let native = msvc(Language::C).unix_args_to_native(&[
            "-Iinc".to_owned(),
            "-DFOO=1".to_owned(),
            "-Llibs".to_owned(),
            "-lz".to_owned(),
            "-pthread".to_owned(),
        ]);
        assert_eq!(native, vec!["/Iinc", "/DFOO=1", "/LIBPATH:libs", "z.lib"]);
    }
}
