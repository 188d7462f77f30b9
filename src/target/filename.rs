//! Output filename rules per platform.
//!
//! A target's on-disk name is a deterministic function of its prefix, base
//! name and suffix, with the platform deciding all three. Shared-library
//! versioning only ever appears in the filename on ELF platforms.

use serde::{Deserialize, Serialize};

use crate::toolchain::CompilerId;

use super::graph::{Target, TargetKind};

/// Platform family a machine's binaries follow.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// ELF platforms with GNU-style naming.
    #[default]
    Linux,
    /// macOS and friends.
    Darwin,
    /// Windows.
    Windows,
}

/// A filename pointing at a more specific sibling.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Alias {
    /// The alias filename.
    pub name: String,
    /// The filename it resolves to.
    pub points_to: String,
}

/// The filename `target` produces on `platform` when built by a compiler
/// of `compiler_id`'s family.
#[must_use]
pub fn output_filename(target: &Target, platform: Platform, compiler_id: CompilerId) -> String {
    match &target.kind {
        TargetKind::Executable { .. } => match platform {
            Platform::Windows => format!("{}.exe", target.name),
            Platform::Linux | Platform::Darwin => target.name.clone(),
        },
        TargetKind::StaticLibrary { .. } => format!("lib{}.a", target.name),
        TargetKind::SharedLibrary { version, .. } => {
            shared_filename(target, platform, compiler_id, version.as_ref().map(|v| v.as_str()))
        }
        TargetKind::SharedModule => shared_filename(target, platform, compiler_id, None),
        TargetKind::CustomTarget(cmd) => {
            cmd.outputs.first().cloned().unwrap_or_else(|| target.name.clone())
        }
        TargetKind::RunTarget { .. } => target.name.clone(),
        TargetKind::Jar { .. } => format!("{}.jar", target.name),
    }
}

fn shared_filename(
    target: &Target,
    platform: Platform,
    compiler_id: CompilerId,
    version: Option<&str>,
) -> String {
    match platform {
        Platform::Windows => {
            let prefix = if compiler_id == CompilerId::Msvc {
                ""
            } else {
                "lib"
            };
            match target.soversion() {
                Some(sover) => format!("{prefix}{}-{sover}.dll", target.name),
                None => format!("{prefix}{}.dll", target.name),
            }
        }
        // The dylib filename never carries the version.
        Platform::Darwin => format!("lib{}.dylib", target.name),
        Platform::Linux => match (version, target.soversion()) {
            (Some(ltversion), _) => format!("lib{}.so.{ltversion}", target.name),
            (None, Some(sover)) => format!("lib{}.so.{sover}", target.name),
            (None, None) => format!("lib{}.so", target.name),
        },
    }
}

/// The import-library filename, for platforms that link through one.
#[must_use]
pub fn import_filename(
    target: &Target,
    platform: Platform,
    compiler_id: CompilerId,
) -> Option<String> {
    if platform != Platform::Windows {
        return None;
    }
    match &target.kind {
        TargetKind::SharedLibrary { .. } | TargetKind::SharedModule => {
            if compiler_id == CompilerId::Msvc {
                Some(format!("{}.lib", target.name))
            } else {
                Some(format!("lib{}.dll.a", target.name))
            }
        }
        _ => None,
    }
}

/// Version aliases for a shared library, most specific first.
///
/// A library versioned `2.1.0` with soversion `2` is written as
/// `libfoo.so.2.1.0`; `libfoo.so.2` points at it and the link-time name
/// `libfoo.so` points at `libfoo.so.2`. An unversioned library needs no
/// aliases.
#[must_use]
pub fn shlib_aliases(target: &Target, platform: Platform, compiler_id: CompilerId) -> Vec<Alias> {
    if platform != Platform::Linux {
        return Vec::new();
    }
    let TargetKind::SharedLibrary { version, .. } = &target.kind else {
        return Vec::new();
    };
    let filename = output_filename(target, platform, compiler_id);
    if filename.ends_with(".so") {
        return Vec::new();
    }
    let unversioned = format!("lib{}.so", target.name);
    let mut aliases = Vec::new();
    let soversion_name = target.soversion().map(|s| format!("lib{}.so.{s}", target.name));
    match soversion_name {
        Some(soname) if version.is_some() && soname != filename => {
            aliases.push(Alias {
                name: soname.clone(),
                points_to: filename,
            });
            aliases.push(Alias {
                name: unversioned,
                points_to: soname,
            });
        }
        _ => {
            aliases.push(Alias {
                name: unversioned,
                points_to: filename,
            });
        }
    }
    aliases
}

/// The filename dependents pass to their linker for `target`.
///
/// On Windows that is the import library; elsewhere it is the real output
/// file.
#[must_use]
pub fn filename_for_linking(
    target: &Target,
    platform: Platform,
    compiler_id: CompilerId,
) -> String {
    import_filename(target, platform, compiler_id)
        .unwrap_or_else(|| output_filename(target, platform, compiler_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::BuildOptions;
    use crate::toolchain::Machine;
    use camino::Utf8PathBuf;
    use indexmap::IndexMap;

    fn shared(version: Option<&str>, soversion: Option<&str>) -> Target {
        Target {
            name: "A".into(),
            subdir: Utf8PathBuf::new(),
            subproject: String::new(),
            machine: Machine::Native,
            kind: TargetKind::SharedLibrary {
                version: version.map(|v| v.parse().expect("version")),
                soversion: soversion.map(ToOwned::to_owned),
            },
            sources: Vec::new(),
            objects: Vec::new(),
            include_dirs: Vec::new(),
            extra_args: IndexMap::new(),
            link_args: Vec::new(),
            dependencies: Vec::new(),
            link_with: Vec::new(),
            link_whole: Vec::new(),
            pch: IndexMap::new(),
            install: false,
            install_dir: None,
            install_rpath: String::new(),
            options: BuildOptions::default(),
            extra_keywords: Vec::new(),
        }
    }

    #[test]
    fn versioned_library_has_two_aliases() {
        let lib = shared(Some("2.1.0"), Some("2"));
        assert_eq!(
            output_filename(&lib, Platform::Linux, CompilerId::Gcc),
            "libA.so.2.1.0"
        );
        let aliases = shlib_aliases(&lib, Platform::Linux, CompilerId::Gcc);
        assert_eq!(
            aliases,
            vec![
                Alias {
                    name: "libA.so.2".into(),
                    points_to: "libA.so.2.1.0".into(),
                },
                Alias {
                    name: "libA.so".into(),
                    points_to: "libA.so.2".into(),
                },
            ]
        );
    }

    #[test]
    fn unversioned_library_has_no_aliases() {
        let lib = shared(None, None);
        assert_eq!(
            output_filename(&lib, Platform::Linux, CompilerId::Gcc),
            "libA.so"
        );
        assert!(shlib_aliases(&lib, Platform::Linux, CompilerId::Gcc).is_empty());
    }

    #[test]
    fn soversion_only_library_gets_unversioned_alias() {
        let lib = shared(None, Some("3"));
        assert_eq!(
            output_filename(&lib, Platform::Linux, CompilerId::Gcc),
            "libA.so.3"
        );
        let aliases = shlib_aliases(&lib, Platform::Linux, CompilerId::Gcc);
        assert_eq!(
            aliases,
            vec![Alias {
                name: "libA.so".into(),
                points_to: "libA.so.3".into(),
            }]
        );
    }

    #[test]
    fn darwin_never_versions_the_filename() {
        let lib = shared(Some("2.1.0"), None);
        assert_eq!(
            output_filename(&lib, Platform::Darwin, CompilerId::Clang),
            "libA.dylib"
        );
        assert!(shlib_aliases(&lib, Platform::Darwin, CompilerId::Clang).is_empty());
    }
}
