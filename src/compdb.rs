//! Data surfaces handed to external collaborators.
//!
//! Two by-products of generation are consumed outside the executor: the
//! compile-command database (one resolved compiler invocation per object)
//! and the install manifest (what to copy where). Daiku only produces the
//! records; the tools that read them are out of scope.

use camino::Utf8PathBuf;
use serde::Serialize;
use thiserror::Error;

use crate::target::TargetId;

/// One resolved compiler invocation, in `compile_commands.json` shape.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct CompileCommand {
    /// Working directory of the invocation (the build root).
    pub directory: Utf8PathBuf,
    /// The full command line.
    pub command: String,
    /// The compiled source file.
    pub file: Utf8PathBuf,
    /// The produced object file.
    pub output: Utf8PathBuf,
}

/// One installable artifact.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct InstallRecord {
    /// Target that produced the artifact.
    pub target: TargetId,
    /// Built file, relative to the build root.
    pub source: Utf8PathBuf,
    /// Destination directory, relative to the prefix.
    pub dest_dir: Utf8PathBuf,
    /// Alias filenames to recreate next to the installed file.
    pub aliases: Vec<String>,
}

/// Everything the install executor needs from one generation pass.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct InstallManifest {
    /// Artifacts in generation order.
    pub records: Vec<InstallRecord>,
}

/// Serialisation of a collaborator surface failed.
#[derive(Debug, Error)]
#[error("failed to serialise {what}")]
pub struct SerialiseError {
    /// Which surface was being written.
    pub what: &'static str,
    /// Underlying error.
    #[source]
    pub source: serde_json::Error,
}

/// Render compile commands as a `compile_commands.json` document.
///
/// # Errors
///
/// Returns [`SerialiseError`] when serialisation fails.
pub fn compile_commands_json(commands: &[CompileCommand]) -> Result<String, SerialiseError> {
    serde_json::to_string_pretty(commands).map_err(|source| SerialiseError {
        what: "compile commands",
        source,
    })
}

/// Render the install manifest as JSON.
///
/// # Errors
///
/// Returns [`SerialiseError`] when serialisation fails.
pub fn install_manifest_json(manifest: &InstallManifest) -> Result<String, SerialiseError> {
    serde_json::to_string_pretty(manifest).map_err(|source| SerialiseError {
        what: "install manifest",
        source,
    })
}
