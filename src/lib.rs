//! Daiku core library.
//!
//! Daiku compiles a resolved build-target graph into concrete Ninja build
//! rules. The graph itself is produced by an external project-description
//! frontend; daiku's job starts where that frontend stops: composing
//! compiler and linker argument lists, assigning sources to compilers,
//! planning link commands, and emitting one build edge per produced file.

pub mod args;
pub mod classify;
pub mod compdb;
pub mod env;
pub mod generate;
pub mod hasher;
pub mod link;
pub mod ninja;
pub mod options;
pub mod resolve;
pub mod target;
pub mod toolchain;
