//! Link planning.
//!
//! Builds the final link argument list for a target in a fixed order so
//! symbol resolution is reproducible: toolchain-derived flags first, then
//! everything the target graph contributes, then rpath and caller extras.
//! Static-library circular dependencies are not handled here; the argument
//! list's native rendering wraps the library span in one start/end-group
//! pair.

use camino::Utf8PathBuf;

use crate::args::ArgumentList;
use crate::generate::GenError;
use crate::resolve::Resolver;
use crate::target::{
    Platform, Target, TargetKind, filename_for_linking, import_filename, output_filename,
};
use crate::toolchain::Compiler;

/// Inputs to link planning beyond the target itself.
#[derive(Debug, Default)]
pub struct LinkInputs<'a> {
    /// Caller-supplied arguments appended near the end of the line.
    pub extra_args: &'a [String],
    /// Libraries produced by custom targets among the generated sources.
    pub custom_target_libs: &'a [Utf8PathBuf],
}

/// Compose the link argument list for `target` driven by `compiler`.
///
/// The order is fixed: build-type linker args, always-on args, target-type
/// args (soname, PIC, import library, GUI subsystem), whole-archive
/// libraries, project then global extras, environment-sourced args for
/// native builds, transitive internal libraries with each static library's
/// own external dependencies, thread flags, the target's explicit link
/// args, external dependency args verbatim, option-derived args, rpath,
/// caller extras, and finally custom-target-provided libraries.
///
/// # Errors
///
/// Propagates unknown-target and missing-platform errors from dependency
/// resolution.
pub fn link_args(
    resolver: &Resolver<'_>,
    target: &Target,
    compiler: &Compiler,
    inputs: &LinkInputs<'_>,
) -> Result<ArgumentList, GenError> {
    let env = resolver.environment();
    let platform = env
        .platform_for(target.machine)
        .ok_or_else(|| GenError::MissingPlatform { target: target.id() })?;
    let options = &target.options;
    let lang = compiler.language;
    let mut args = ArgumentList::new();

    args.extend(compiler.buildtype_linker_args(options.buildtype));
    args.extend(compiler.linker_always_args());

    match &target.kind {
        TargetKind::Executable { gui_app } => {
            if *gui_app && platform == Platform::Windows {
                args.extend(compiler.gui_app_args());
            }
        }
        TargetKind::SharedLibrary { .. } => {
            args.extend(compiler.std_shared_lib_link_args());
            args.extend(compiler.pic_args());
            let (prefix, suffix) = shared_name_parts(platform);
            args.extend(compiler.soname_args(
                prefix,
                &target.name,
                suffix,
                target.soversion().as_deref(),
            ));
            if platform == Platform::Windows
                && let Some(implib) = import_filename(target, platform, compiler.id)
            {
                let implib_path = env.target_dir(target).join(implib);
                args.extend(compiler.import_library_args(implib_path.as_str()));
            }
        }
        TargetKind::SharedModule => {
            args.extend(compiler.std_shared_module_link_args());
            args.extend(compiler.pic_args());
        }
        TargetKind::StaticLibrary { .. }
        | TargetKind::CustomTarget(_)
        | TargetKind::RunTarget { .. }
        | TargetKind::Jar { .. } => {}
    }

    let whole_files = whole_archive_files(resolver, target, compiler, platform)?;
    args.extend(compiler.whole_archive_args(&whole_files));

    args.extend(
        env.project_link_args_for(&target.subproject, lang)
            .iter()
            .cloned(),
    );
    args.extend(env.global_link_args_for(lang).iter().cloned());
    args.extend(
        env.env_link_args_for(target.machine, lang)
            .iter()
            .cloned(),
    );

    args.extend(resolver.dependency_link_args(target, compiler)?);

    if resolver.needs_threads(target) {
        args.extend(compiler.thread_link_flags());
    }

    args.extend(target.link_args.iter().cloned());

    for ext in resolver.flat_deps(target).externals {
        args.extend_verbatim(ext.link_args.iter().cloned());
    }

    args.extend(compiler.option_link_args(options));

    let rpath_entries = origin_relative_rpaths(resolver, target);
    args.extend(compiler.build_rpath_args(&rpath_entries, &target.install_rpath));

    args.extend(inputs.extra_args.iter().cloned());

    args.extend(
        inputs
            .custom_target_libs
            .iter()
            .map(|p| p.as_str().to_owned()),
    );

    Ok(args)
}

/// Resolved paths of the target's whole-archive libraries.
fn whole_archive_files(
    resolver: &Resolver<'_>,
    target: &Target,
    compiler: &Compiler,
    platform: Platform,
) -> Result<Vec<String>, GenError> {
    let env = resolver.environment();
    let mut files = Vec::new();
    for id in &target.link_whole {
        let dep = resolver
            .lookup(id)
            .ok_or_else(|| GenError::UnknownTarget {
                target: target.id(),
                dependency: id.clone(),
            })?;
        let file = filename_for_linking(dep, platform, compiler.id);
        files.push(env.target_dir(dep).join(file).into_string());
    }
    Ok(files)
}

/// `$ORIGIN`-relative rpath entries for every directory holding a linked
/// shared library.
fn origin_relative_rpaths(resolver: &Resolver<'_>, target: &Target) -> Vec<String> {
    let env = resolver.environment();
    let own_dir = env.target_dir(target);
    resolver
        .shared_lib_dirs(target)
        .into_iter()
        .map(|dir| {
            if dir == own_dir {
                "$ORIGIN".to_owned()
            } else {
                crate::env::origin_relative(&dir, &own_dir).into_string()
            }
        })
        .collect()
}

const fn shared_name_parts(platform: Platform) -> (&'static str, &'static str) {
    match platform {
        Platform::Windows => ("", "dll"),
        Platform::Darwin => ("lib", "dylib"),
        Platform::Linux => ("lib", "so"),
    }
}

/// The on-disk output path of a link edge, relative to the build root.
#[must_use]
pub fn link_output_path(
    resolver: &Resolver<'_>,
    target: &Target,
    compiler: &Compiler,
    platform: Platform,
) -> Utf8PathBuf {
    let env = resolver.environment();
    env.target_dir(target)
        .join(output_filename(target, platform, compiler.id))
}
