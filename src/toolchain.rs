//! Compiler and linker descriptors.
//!
//! Tool autodetection happens in an external collaborator; daiku receives
//! already-probed descriptors and only consults them for flag templates and
//! dialect rewrites. Native and cross descriptors are kept in disjoint sets
//! so a target is always built entirely by one machine's tools.

mod compiler;
mod language;
mod linker;
mod set;

pub use compiler::{Compiler, CompilerId, DepsStyle};
pub use language::Language;
pub use linker::{LinkerClass, StaticLinker};
pub use set::{Machine, ToolchainSet};
