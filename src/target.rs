//! The resolved build-target graph daiku consumes.
//!
//! The graph arrives fully resolved from the project-description frontend:
//! every dependency reference names a concrete target id and every option
//! snapshot is already merged. Daiku never mutates the graph; generation
//! reads it and produces edges.

mod filename;
mod graph;
mod version;

pub use filename::{
    Alias, Platform, filename_for_linking, import_filename, output_filename, shlib_aliases,
};
pub use graph::{
    CommandArg, CustomCommand, Dependency, DuplicateTargetId, ExternalDependency, ExtractedObjects,
    IncludeDirs, InternalDependency, ObjectSource, Source, SourceOrigin, Target, TargetGraph,
    TargetId, TargetKind,
};
pub use version::{LibraryVersion, VersionError};
