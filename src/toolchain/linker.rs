//! Dynamic-linker classes and static archivers.

use serde::{Deserialize, Serialize};

/// Family of the dynamic linker a compiler drives.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkerClass {
    /// GNU ld / gold / lld in GNU mode.
    GnuLd,
    /// Apple's ld64.
    AppleLd,
    /// Microsoft link.exe.
    MsvcLink,
}

impl LinkerClass {
    /// Whether circular static-library references need an explicit
    /// start/end-group span.
    #[must_use]
    pub const fn needs_group_wrapping(self) -> bool {
        matches!(self, Self::GnuLd)
    }

    /// Whether the embedded rpath can be rewritten in place after install,
    /// which requires padding it to the final length up front.
    #[must_use]
    pub const fn supports_rpath_padding(self) -> bool {
        matches!(self, Self::GnuLd)
    }

    /// Command that dumps a shared library's exported symbols, with `$in`
    /// and `$out` placeholders, when the platform has such a tool.
    #[must_use]
    pub const fn symbol_dump_command(self) -> Option<&'static str> {
        match self {
            Self::GnuLd => Some("nm --dynamic --defined-only $in > $out"),
            Self::AppleLd => Some("nm -gU $in > $out"),
            Self::MsvcLink => None,
        }
    }
}

/// An archiver producing static libraries.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StaticLinker {
    /// Command line used to invoke the archiver.
    pub exelist: Vec<String>,
}

impl StaticLinker {
    /// Arguments always passed when creating an archive.
    #[must_use]
    pub fn std_args(&self) -> Vec<String> {
        vec!["csr".into()]
    }

    /// Archive-output arguments for `target`.
    #[must_use]
    pub fn output_args(&self, target: &str) -> Vec<String> {
        vec![target.into()]
    }
}
