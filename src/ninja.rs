//! Ninja file writer.
//!
//! Serialises a [`Generation`] into the textual grammar the executor
//! consumes. Rules and edges are sorted so regenerating from an unchanged
//! graph yields byte-identical output. Publication is atomic: the file is
//! written to a temporary sibling and renamed into place only on success,
//! so a failed pass leaves the previous build file untouched.

use std::fmt::{self, Display, Formatter};
use std::io::Write as _;

use camino::{Utf8Path, Utf8PathBuf};
use itertools::Itertools;

use crate::generate::{Edge, GenError, Generation, Rule};

macro_rules! write_kv {
    ($f:expr, $key:expr, $opt:expr) => {
        if let Some(val) = $opt {
            writeln!($f, "  {} = {}", $key, val)?;
        }
    };
}

macro_rules! write_flag {
    ($f:expr, $key:expr, $cond:expr) => {
        if $cond {
            writeln!($f, "  {} = 1", $key)?;
        }
    };
}

/// Lowest Ninja version understanding the emitted grammar.
const REQUIRED_VERSION: &str = "1.8";

/// Escape `$`, space and `:` in a path for the build-line grammar.
#[must_use]
pub fn escape_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for ch in path.chars() {
        match ch {
            '$' => out.push_str("$$"),
            ' ' => out.push_str("$ "),
            ':' => out.push_str("$:"),
            _ => out.push(ch),
        }
    }
    out
}

fn join_paths(paths: &[Utf8PathBuf]) -> String {
    paths.iter().map(|p| escape_path(p.as_str())).join(" ")
}

/// Render the generation as Ninja text.
///
/// # Errors
///
/// Returns [`GenError::EmbeddedNewline`] when a rule command or variable
/// binding smuggles a literal newline; such arguments must have been
/// routed through the wrapper path earlier.
pub fn render(generation: &Generation) -> Result<String, GenError> {
    check_newlines(generation)?;
    Ok(NinjaFile(generation).to_string())
}

/// Render and atomically publish the build file at `path`.
///
/// # Errors
///
/// Propagates rendering errors and reports I/O failures with the path
/// being written; on any error the previous file at `path` is untouched.
pub fn write_to(generation: &Generation, path: &Utf8Path) -> Result<(), GenError> {
    let text = render(generation)?;
    let io_err = |source| GenError::Io {
        path: path.to_owned(),
        source,
    };
    let dir = path.parent().unwrap_or(Utf8Path::new("."));
    std::fs::create_dir_all(dir).map_err(io_err)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(text.as_bytes()).map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

fn check_newlines(generation: &Generation) -> Result<(), GenError> {
    for rule in generation.rules.values() {
        if rule.command.contains('\n') {
            return Err(newline_error(&rule.name, &rule.command));
        }
    }
    for edge in &generation.edges {
        for (key, value) in &edge.variables {
            if value.contains('\n') {
                return Err(newline_error(key, value));
            }
        }
    }
    Ok(())
}

fn newline_error(location: &str, argument: &str) -> GenError {
    let snippet: String = argument.chars().take(80).collect();
    GenError::EmbeddedNewline {
        location: location.to_owned(),
        argument: snippet,
    }
}

struct NinjaFile<'a>(&'a Generation);

impl Display for NinjaFile<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Generated by daiku. Do not edit by hand.")?;
        writeln!(f, "ninja_required_version = {REQUIRED_VERSION}")?;
        writeln!(f)?;

        let mut rules: Vec<&Rule> = self.0.rules.values().collect();
        rules.sort_by(|a, b| a.name.cmp(&b.name));
        for rule in rules {
            write!(f, "{}", DisplayRule(rule))?;
        }

        let mut edges: Vec<&Edge> = self.0.edges.iter().collect();
        edges.sort_by_key(|e| edge_key(e));
        for edge in edges {
            write!(f, "{}", DisplayEdge(edge))?;
        }

        if !self.0.default_targets.is_empty() {
            let mut defaults = self.0.default_targets.clone();
            defaults.sort();
            writeln!(f, "default {}", join_paths(&defaults))?;
        }
        Ok(())
    }
}

/// Stable sort key over an edge's declared outputs.
fn edge_key(edge: &Edge) -> String {
    let mut parts: Vec<&str> = edge.outputs.iter().map(|p| p.as_str()).collect();
    parts.sort_unstable();
    parts.join("\u{0}")
}

struct DisplayRule<'a>(&'a Rule);

impl Display for DisplayRule<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "rule {}", self.0.name)?;
        writeln!(f, "  command = {}", self.0.command)?;
        write_kv!(f, "description", &self.0.description);
        write_kv!(f, "depfile", &self.0.depfile);
        write_kv!(f, "deps", self.0.deps.map(|d| d.as_str()));
        write_kv!(f, "pool", &self.0.pool);
        write_flag!(f, "restat", self.0.restat);
        writeln!(f)
    }
}

struct DisplayEdge<'a>(&'a Edge);

impl Display for DisplayEdge<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "build {}", join_paths(&self.0.outputs))?;
        if !self.0.implicit_outputs.is_empty() {
            write!(f, " | {}", join_paths(&self.0.implicit_outputs))?;
        }
        write!(f, ": {}", self.0.rule)?;
        if !self.0.inputs.is_empty() {
            write!(f, " {}", join_paths(&self.0.inputs))?;
        }
        if !self.0.implicit_deps.is_empty() {
            write!(f, " | {}", join_paths(&self.0.implicit_deps))?;
        }
        if !self.0.order_only_deps.is_empty() {
            write!(f, " || {}", join_paths(&self.0.order_only_deps))?;
        }
        writeln!(f)?;
        for (key, value) in &self.0.variables {
            // Unset variables expand to the empty string anyway.
            if !value.is_empty() {
                writeln!(f, "  {key} = {value}")?;
            }
        }
        writeln!(f)
    }
}
