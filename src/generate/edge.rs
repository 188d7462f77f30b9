//! Rule and edge records consumed by the file writer.

use camino::Utf8PathBuf;
use indexmap::IndexMap;

use crate::toolchain::DepsStyle;

/// One Ninja rule: a command template plus executor hints.
#[derive(Clone, Debug, PartialEq)]
pub struct Rule {
    /// Unique rule name.
    pub name: String,
    /// Command line with `$in`/`$out`/variable placeholders.
    pub command: String,
    /// Human-readable progress line.
    pub description: Option<String>,
    /// Depfile path template, when the tool writes one.
    pub depfile: Option<String>,
    /// Dependency-scanning style.
    pub deps: Option<DepsStyle>,
    /// Re-stat outputs after running to cut short no-op rebuild chains.
    pub restat: bool,
    /// Execution pool.
    pub pool: Option<String>,
}

impl Rule {
    /// A rule with only a name and command.
    #[must_use]
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            description: None,
            depfile: None,
            deps: None,
            restat: false,
            pool: None,
        }
    }
}

/// One build edge: rule instantiation over concrete paths.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Edge {
    /// Rule this edge instantiates; `phony` for aliases.
    pub rule: String,
    /// Declared outputs.
    pub outputs: Vec<Utf8PathBuf>,
    /// Outputs produced as side effects.
    pub implicit_outputs: Vec<Utf8PathBuf>,
    /// Inputs substituted into `$in`.
    pub inputs: Vec<Utf8PathBuf>,
    /// Dependencies that trigger rebuilds without appearing in `$in`.
    pub implicit_deps: Vec<Utf8PathBuf>,
    /// Dependencies that must exist but whose timestamps do not trigger
    /// rebuilds on their own.
    pub order_only_deps: Vec<Utf8PathBuf>,
    /// Per-edge variable bindings.
    pub variables: IndexMap<String, String>,
}

impl Edge {
    /// An edge instantiating `rule` with one output.
    #[must_use]
    pub fn new(rule: impl Into<String>, output: impl Into<Utf8PathBuf>) -> Self {
        Self {
            rule: rule.into(),
            outputs: vec![output.into()],
            ..Self::default()
        }
    }

    /// A phony alias edge.
    #[must_use]
    pub fn phony(output: impl Into<Utf8PathBuf>, inputs: Vec<Utf8PathBuf>) -> Self {
        Self {
            rule: "phony".into(),
            outputs: vec![output.into()],
            inputs,
            ..Self::default()
        }
    }

    /// All declared and implicit outputs.
    pub fn all_outputs(&self) -> impl Iterator<Item = &Utf8PathBuf> {
        self.outputs.iter().chain(self.implicit_outputs.iter())
    }
}

/// Characters that survive a shell and the Ninja lexer unquoted.
fn is_safe_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '@' | '%' | '+' | '=' | ':' | ',' | '.' | '/' | '-')
}

/// Quote one argument for a POSIX shell, leaving plain words untouched.
pub(crate) fn sh_quote_word(arg: &str) -> String {
    use shell_quote::{QuoteRefExt, Sh};
    if !arg.is_empty() && arg.chars().all(is_safe_char) {
        return arg.to_owned();
    }
    let bytes: Vec<u8> = arg.quoted(Sh);
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Double `$` so the Ninja lexer hands shell text through intact.
pub(crate) fn ninja_escape(text: &str) -> String {
    text.replace('$', "$$")
}

/// Quote one argument for embedding in a rule command: shell quoting
/// first, then Ninja `$` escaping.
pub(crate) fn shell_word(arg: &str) -> String {
    ninja_escape(&sh_quote_word(arg))
}

/// Render an argument vector as a single rule-command fragment.
pub(crate) fn command_text(args: &[String]) -> String {
    args.iter()
        .map(|a| shell_word(a))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render an argument vector as plain shell text, without Ninja escaping.
pub(crate) fn sh_join(args: &[String]) -> String {
    args.iter()
        .map(|a| sh_quote_word(a))
        .collect::<Vec<_>>()
        .join(" ")
}
