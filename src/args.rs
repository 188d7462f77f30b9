//! Ordered argument lists with override-aware composition.
//!
//! Compiler and linker command lines are assembled from many sources
//! (options, project defaults, dependencies, per-target extras). Simply
//! concatenating them would duplicate flags and, worse, let a stale include
//! path shadow a newer one. [`ArgumentList`] applies a small algebra on
//! append: path-like flags override and stay grouped ahead of everything
//! else, defines are last-write-wins, single-use flags are idempotent, and
//! positional tokens (objects, libraries fed to the linker) are never
//! reordered because symbol resolution depends on their order.

use std::fmt;

use crate::toolchain::Compiler;

/// Library suffixes a linker resolves positionally.
const LIB_SUFFIXES: &[&str] = &[".a", ".so", ".dylib", ".lib", ".dll"];

/// Flags that may appear at most once on a command line.
const UNIQUE_FLAGS: &[&str] = &["-c", "-S", "-E", "-pipe", "-pthread"];

/// Append behaviour of one token.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Category {
    /// Path-like flags (`-I`, `-L`): re-adding overrides the earlier copy
    /// and the whole category stays ahead of non-prependable tokens.
    PrependOverride,
    /// Define-style flags (`-D`, `-U`): last write wins.
    Replace,
    /// Single-use flags and library references: repeats are dropped.
    Idempotent,
    /// Everything else: order is meaning, never touched.
    Positional,
}

/// Whether `token` names a library on the link line.
#[must_use]
pub fn is_library_token(token: &str) -> bool {
    token.starts_with("-l")
        || LIB_SUFFIXES.iter().any(|s| token.ends_with(s))
        || has_versioned_so_suffix(token)
}

/// Recognises `libfoo.so.1` and friends, where the suffix after `.so.` is
/// purely numeric components.
fn has_versioned_so_suffix(token: &str) -> bool {
    token.rfind(".so.").is_some_and(|idx| {
        token
            .get(idx + ".so.".len()..)
            .is_some_and(|v| !v.is_empty() && v.chars().all(|c| c.is_ascii_digit() || c == '.'))
    })
}

/// Classify `token` into its append category.
#[must_use]
pub fn categorize(token: &str) -> Category {
    if token.starts_with("-I") || token.starts_with("-L") {
        return Category::PrependOverride;
    }
    if token.starts_with("-D") || token.starts_with("-U") {
        return Category::Replace;
    }
    if UNIQUE_FLAGS.contains(&token) || is_library_token(token) {
        return Category::Idempotent;
    }
    Category::Positional
}

/// An ordered token sequence with category-aware append semantics.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ArgumentList {
    /// Prependable region: all category-A tokens, in insertion order.
    pre: Vec<String>,
    /// Everything else, in insertion order.
    main: Vec<String>,
}

impl ArgumentList {
    /// An empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pre: Vec::new(),
            main: Vec::new(),
        }
    }

    /// Append one token, applying its category rule.
    pub fn append(&mut self, token: impl Into<String>) {
        let merged = apply(self, &[token.into()]);
        *self = merged;
    }

    /// Append many tokens, applying category rules to each in order.
    pub fn extend<I, S>(&mut self, tokens: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let incoming: Vec<String> = tokens.into_iter().map(Into::into).collect();
        let merged = apply(self, &incoming);
        *self = merged;
    }

    /// Append tokens exactly as given, bypassing every category rule.
    ///
    /// Used at dependency boundaries: an external dependency's `-L dir`
    /// followed by `-lfoo` is an ordered pair and must survive verbatim.
    pub fn extend_verbatim<I, S>(&mut self, tokens: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.main.extend(tokens.into_iter().map(Into::into));
    }

    /// Whether `token` is already present.
    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.pre.iter().any(|t| t == token) || self.main.iter().any(|t| t == token)
    }

    /// Number of tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pre.len() + self.main.len()
    }

    /// Whether the list holds no tokens.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pre.is_empty() && self.main.is_empty()
    }

    /// Iterate tokens in final command-line order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.pre
            .iter()
            .chain(self.main.iter())
            .map(String::as_str)
    }

    /// The tokens in final command-line order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        self.iter().map(ToOwned::to_owned).collect()
    }

    /// Render for `compiler`'s dialect.
    ///
    /// GCC-style tokens are rewritten into the toolchain's native spelling
    /// and, for GNU-ld-class linkers, the span from the first to the last
    /// library-looking token is wrapped in a single start/end-group pair so
    /// circular static-library references resolve.
    #[must_use]
    pub fn to_native(&self, compiler: &Compiler) -> Vec<String> {
        let converted = compiler.unix_args_to_native(&self.to_vec());
        if !compiler.linker.needs_group_wrapping() {
            return converted;
        }
        wrap_library_group(converted)
    }
}

impl fmt::Display for ArgumentList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for token in self.iter() {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{token}")?;
            first = false;
        }
        Ok(())
    }
}

impl<S: Into<String>> FromIterator<S> for ArgumentList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut list = Self::new();
        list.extend(iter);
        list
    }
}

/// Merge `incoming` into `existing` under the category rules.
///
/// This is the whole override/dedup algorithm as a pure function: category-A
/// tokens replace earlier identical copies and settle at the end of the
/// prependable region (ahead of all non-prependable tokens), category-B
/// tokens drop every earlier exact match before appending, category-C
/// repeats are discarded, and category-D tokens append unconditionally.
#[must_use]
pub fn apply(existing: &ArgumentList, incoming: &[String]) -> ArgumentList {
    let mut merged = existing.clone();
    for token in incoming {
        match categorize(token) {
            Category::PrependOverride => {
                merged.pre.retain(|t| t != token);
                merged.pre.push(token.clone());
            }
            Category::Replace => {
                merged.main.retain(|t| t != token);
                merged.main.push(token.clone());
            }
            Category::Idempotent => {
                if !merged.contains(token) {
                    merged.main.push(token.clone());
                }
            }
            Category::Positional => merged.main.push(token.clone()),
        }
    }
    merged
}

/// Wrap the contiguous library span in `-Wl,--start-group` /
/// `-Wl,--end-group`.
fn wrap_library_group(args: Vec<String>) -> Vec<String> {
    let first = args.iter().position(|a| is_library_token(a));
    let last = args.iter().rposition(|a| is_library_token(a));
    let (Some(first), Some(last)) = (first, last) else {
        return args;
    };
    let mut wrapped = Vec::with_capacity(args.len() + 2);
    for (idx, arg) in args.into_iter().enumerate() {
        if idx == first {
            wrapped.push("-Wl,--start-group".to_owned());
        }
        wrapped.push(arg);
        if idx == last {
            wrapped.push("-Wl,--end-group".to_owned());
        }
    }
    wrapped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::{CompilerId, Language, LinkerClass, Machine};

    fn gnu() -> Compiler {
        Compiler {
            id: CompilerId::Gcc,
            language: Language::C,
            machine: Machine::Native,
            exelist: vec!["cc".into()],
            linker: LinkerClass::GnuLd,
        }
    }

    fn list(tokens: &[&str]) -> ArgumentList {
        tokens.iter().copied().collect()
    }

    #[test]
    fn include_paths_stay_ahead_of_positional_tokens() {
        let args = list(&["main.o", "-Iinc", "-lz"]);
        assert_eq!(args.to_vec(), vec!["-Iinc", "main.o", "-lz"]);
    }

    #[test]
    fn readding_include_path_moves_it_to_the_end_of_its_region() {
        let args = list(&["-Ia", "-Ib", "-Ia", "main.o"]);
        assert_eq!(args.to_vec(), vec!["-Ib", "-Ia", "main.o"]);
    }

    #[test]
    fn defines_are_last_write_wins() {
        let args = list(&["-DFOO", "-DBAR", "-DFOO"]);
        assert_eq!(args.to_vec(), vec!["-DBAR", "-DFOO"]);
    }

    #[test]
    fn single_use_flags_are_idempotent() {
        let args = list(&["-pthread", "-lm", "-pthread", "-lm"]);
        assert_eq!(args.to_vec(), vec!["-pthread", "-lm"]);
    }

    #[test]
    fn positional_tokens_keep_call_order() {
        let args = list(&["b.o", "a.o", "b.o"]);
        assert_eq!(args.to_vec(), vec!["b.o", "a.o", "b.o"]);
    }

    #[test]
    fn duplicate_insertion_order_does_not_change_rendering() {
        let with_repeat = list(&["-Ia", "-lfoo", "-DX", "-Ia", "-lfoo", "-DX"]);
        let without = list(&["-Ia", "-lfoo", "-DX"]);
        assert_eq!(with_repeat.to_vec(), without.to_vec());
    }

    #[test]
    fn verbatim_extension_preserves_dependency_adjacency() {
        let mut args = list(&["-Iown"]);
        args.extend_verbatim(["-Ldep", "-ldep"]);
        assert_eq!(args.to_vec(), vec!["-Iown", "-Ldep", "-ldep"]);
    }

    #[test]
    fn apply_is_pure() {
        let base = list(&["-Ia"]);
        let merged = apply(&base, &["-Ib".to_owned()]);
        assert_eq!(base.to_vec(), vec!["-Ia"]);
        assert_eq!(merged.to_vec(), vec!["-Ia", "-Ib"]);
    }

    #[test]
    fn versioned_shared_objects_are_idempotent() {
        let args = list(&["sub/libx.so.1.2.3", "sub/libx.so.1.2.3"]);
        assert_eq!(args.to_vec(), vec!["sub/libx.so.1.2.3"]);
        assert!(is_library_token("sub/libx.so.1.2.3"));
        assert!(!is_library_token("notes.so.txt"));
    }

    #[test]
    fn gnu_rendering_wraps_one_library_group() {
        let args = list(&["-o", "prog", "main.o", "liba.a", "-lz", "-Wl,-O1"]);
        let native = args.to_native(&gnu());
        assert_eq!(
            native,
            vec![
                "-o",
                "prog",
                "main.o",
                "-Wl,--start-group",
                "liba.a",
                "-lz",
                "-Wl,--end-group",
                "-Wl,-O1",
            ]
        );
    }
}
