//! Source languages and their suffix tables.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A compiled language daiku can route sources to.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// C.
    C,
    /// C++.
    Cpp,
    /// Objective-C.
    ObjC,
    /// Objective-C++.
    ObjCpp,
    /// Java (bundled into jars rather than linked).
    Java,
}

/// Suffixes that are unambiguously assembly and accepted by C-family
/// compilers.
const ASM_SUFFIXES: &[&str] = &["s", "S"];

impl Language {
    /// Suffixes of files that are always in this language.
    ///
    /// Headers are deliberately absent; a `.h` could belong to C, C++ or
    /// Objective-C, so header handling lives with the source classifier.
    #[must_use]
    pub const fn suffixes(self) -> &'static [&'static str] {
        match self {
            Self::C => &["c"],
            Self::Cpp => &["cpp", "cc", "cxx", "c++"],
            Self::ObjC => &["m"],
            Self::ObjCpp => &["mm"],
            Self::Java => &["java"],
        }
    }

    /// Suffixes a compiler for this language will accept on the command
    /// line, including ambiguous ones such as assembly.
    #[must_use]
    pub fn compilable_suffixes(self) -> Vec<&'static str> {
        let mut all: Vec<&'static str> = self.suffixes().to_vec();
        match self {
            Self::C | Self::Cpp | Self::ObjC | Self::ObjCpp => {
                all.push("h");
                all.extend_from_slice(ASM_SUFFIXES);
            }
            Self::Java => {}
        }
        all
    }

    /// Default suffix used for synthesised sources such as unity files.
    #[must_use]
    pub const fn default_suffix(self) -> &'static str {
        match self {
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::ObjC => "m",
            Self::ObjCpp => "mm",
            Self::Java => "java",
        }
    }

    /// Whether sources of this language may be merged into unity
    /// translation units.
    #[must_use]
    pub const fn supports_unity(self) -> bool {
        matches!(self, Self::C | Self::Cpp | Self::ObjC | Self::ObjCpp)
    }

    /// Whether this language links through the generic object/link path.
    ///
    /// Languages that answer `false` are bundled by a dedicated step (a jar
    /// archiver for Java) instead of the platform linker.
    #[must_use]
    pub const fn links_generically(self) -> bool {
        !matches!(self, Self::Java)
    }

    /// The stock priority order for resolving ambiguous suffixes.
    ///
    /// Narrower languages come first: an `.s` file accepted by both the C
    /// and C++ compilers lands on C.
    #[must_use]
    pub fn default_priority() -> Vec<Self> {
        vec![Self::C, Self::Cpp, Self::ObjC, Self::ObjCpp, Self::Java]
    }

    /// Short lowercase name used in rule identifiers.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::ObjC => "objc",
            Self::ObjCpp => "objcpp",
            Self::Java => "java",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
