//! Per-target flag resolution.
//!
//! The resolver walks a target's dependency graph and composes its compile
//! and link argument lists. Composition runs lowest priority to highest so
//! the override categories of [`crate::args`] let later, more specific
//! sources win.

use camino::Utf8PathBuf;
use indexmap::IndexSet;

use crate::args::ArgumentList;
use crate::env::Environment;
use crate::generate::GenError;
use crate::target::{
    Dependency, ExternalDependency, IncludeDirs, Platform, Target, TargetGraph, TargetId,
    TargetKind, filename_for_linking,
};
use crate::toolchain::{Compiler, Language, Machine, ToolchainSet};

/// A target's dependencies flattened out of their internal nesting.
#[derive(Debug, Default)]
pub struct FlatDeps<'a> {
    /// External dependencies in declaration order.
    pub externals: Vec<&'a ExternalDependency>,
    /// Include directories contributed by internal dependencies.
    pub include_dirs: Vec<&'a IncludeDirs>,
    /// Compile arguments contributed by internal dependencies.
    pub compile_args: Vec<&'a [String]>,
    /// Library targets contributed by internal dependencies.
    pub link_with: Vec<TargetId>,
}

/// Resolves compile and link arguments against one graph and environment.
pub struct Resolver<'a> {
    graph: &'a TargetGraph,
    env: &'a Environment,
    toolchains: &'a ToolchainSet,
}

impl<'a> Resolver<'a> {
    /// A resolver over `graph` in `env` with `toolchains`.
    #[must_use]
    pub const fn new(
        graph: &'a TargetGraph,
        env: &'a Environment,
        toolchains: &'a ToolchainSet,
    ) -> Self {
        Self {
            graph,
            env,
            toolchains,
        }
    }

    /// Flatten `deps` recursively, preserving declaration order.
    fn flatten_into<'t>(deps: &'t [Dependency], flat: &mut FlatDeps<'t>) {
        for dep in deps {
            match dep {
                Dependency::External(ext) => flat.externals.push(ext),
                Dependency::Internal(int) => {
                    flat.include_dirs.extend(int.include_dirs.iter());
                    if !int.compile_args.is_empty() {
                        flat.compile_args.push(int.compile_args.as_slice());
                    }
                    flat.link_with.extend(int.link_with.iter().cloned());
                    Self::flatten_into(&int.dependencies, flat);
                }
            }
        }
    }

    /// The target's dependencies with internal nesting flattened away.
    #[must_use]
    pub fn flat_deps<'t>(&self, target: &'t Target) -> FlatDeps<'t> {
        let mut flat = FlatDeps::default();
        Self::flatten_into(&target.dependencies, &mut flat);
        flat
    }

    /// Library targets this target links, including those contributed by
    /// internal dependencies.
    #[must_use]
    pub fn effective_link_with(&self, target: &Target) -> Vec<TargetId> {
        let mut ids: Vec<TargetId> = target.link_with.clone();
        ids.extend(self.flat_deps(target).link_with);
        ids
    }

    /// Check every link reference of `target` for existence, shape,
    /// machine and PIC compatibility.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error found.
    pub fn validate_links(&self, target: &Target) -> Result<(), GenError> {
        let into_shared = matches!(
            target.kind,
            TargetKind::SharedLibrary { .. } | TargetKind::SharedModule
        );
        let needs_pic = self.env.platform_for(target.machine) == Some(Platform::Linux);
        for id in self
            .effective_link_with(target)
            .iter()
            .chain(target.link_whole.iter())
        {
            let dep = self.graph.get(id).ok_or_else(|| GenError::UnknownTarget {
                target: target.id(),
                dependency: id.clone(),
            })?;
            if !dep.kind.is_linkable_library() {
                return Err(GenError::NonLibraryLinkTarget {
                    target: target.id(),
                    dependency: id.clone(),
                });
            }
            if dep.machine != target.machine {
                return Err(GenError::CrossNativeMix {
                    target: target.id(),
                    target_machine: target.machine,
                    dependency: id.clone(),
                    dependency_machine: dep.machine,
                });
            }
            if into_shared
                && needs_pic
                && matches!(dep.kind, TargetKind::StaticLibrary { pic: false })
            {
                return Err(GenError::NonPicStaticIntoShared {
                    target: target.id(),
                    dependency: id.clone(),
                });
            }
        }
        Ok(())
    }

    /// External dependencies reached through linked static libraries,
    /// cycle-safe and in link order.
    fn static_transitive_externals(&self, target: &Target) -> Vec<&'a ExternalDependency> {
        let mut visited: IndexSet<TargetId> = IndexSet::new();
        let mut externals = Vec::new();
        let mut stack: Vec<TargetId> = self.effective_link_with(target);
        stack.extend(target.link_whole.iter().cloned());
        while let Some(id) = stack.pop() {
            if !visited.insert(id.clone()) {
                continue;
            }
            let Some(dep) = self.graph.get(&id) else {
                continue;
            };
            if matches!(dep.kind, TargetKind::StaticLibrary { .. }) {
                let mut flat = FlatDeps::default();
                Self::flatten_into(&dep.dependencies, &mut flat);
                externals.extend(flat.externals);
                stack.extend(self.effective_link_with(dep));
                stack.extend(dep.link_whole.iter().cloned());
            }
        }
        externals
    }

    /// Expand one include-directory set into compiler arguments, source
    /// tree first so checked-in headers are found before generated ones.
    fn expand_include_dirs(&self, incs: &IncludeDirs, compiler: &Compiler) -> Vec<String> {
        let mut args = Vec::new();
        for dir in &incs.dirs {
            let source = self.env.source_path(&incs.curdir, dir);
            let build = incs.curdir.join(dir);
            args.extend(compiler.include_args(&source, incs.is_system));
            args.extend(compiler.include_args(&build, incs.is_system));
        }
        args
    }

    /// Compose the compile argument list for `target` as seen by
    /// `compiler`.
    ///
    /// Priority runs lowest to highest: option-derived flags, global then
    /// subproject flags, flags reached through static links, direct
    /// dependency flags (kept in each dependency's own order), the
    /// target's extra arguments, its include directories, and finally its
    /// private scratch directory.
    ///
    /// # Errors
    ///
    /// Currently infallible in itself but typed for parity with link
    /// resolution; reserved for per-option validation.
    pub fn compile_args(
        &self,
        target: &Target,
        compiler: &Compiler,
    ) -> Result<ArgumentList, GenError> {
        let lang = compiler.language;
        let options = &target.options;
        let mut args = ArgumentList::new();

        args.extend(compiler.always_args());
        args.extend(compiler.warn_args(options.warning_level));
        if options.werror {
            args.extend(compiler.werror_args());
        }
        args.extend(compiler.option_compile_args(options));
        args.extend(compiler.buildtype_args(options.buildtype));
        match target.kind {
            TargetKind::SharedLibrary { .. } | TargetKind::SharedModule => {
                args.extend(compiler.pic_args());
            }
            TargetKind::StaticLibrary { pic: true } => args.extend(compiler.pic_args()),
            _ => {}
        }

        args.extend(self.env.global_args_for(lang).iter().cloned());
        args.extend(
            self.env
                .project_args_for(&target.subproject, lang)
                .iter()
                .cloned(),
        );

        for ext in self.static_transitive_externals(target) {
            args.extend_verbatim(ext.compile_args.iter().cloned());
        }

        let flat = self.flat_deps(target);
        for contributed in &flat.compile_args {
            args.extend(contributed.iter().cloned());
        }
        for ext in &flat.externals {
            args.extend_verbatim(ext.compile_args.iter().cloned());
        }
        for incs in &flat.include_dirs {
            args.extend(self.expand_include_dirs(incs, compiler));
        }

        if let Some(extra) = target.extra_args.get(&lang) {
            args.extend(extra.iter().cloned());
        }

        for incs in &target.include_dirs {
            args.extend(self.expand_include_dirs(incs, compiler));
        }
        args.extend(compiler.include_args(&self.env.private_dir(target), false));

        Ok(args)
    }

    /// Link arguments contributed by internal library dependencies:
    /// each library's file, each static library's own external link
    /// arguments, and the same again transitively.
    ///
    /// `include_own_file` is false for whole-archive libraries whose file
    /// already sits inside the whole-archive span.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::UnknownTarget`] for dangling references and
    /// [`GenError::MissingPlatform`] for unconfigured cross targets.
    pub fn dependency_link_args(
        &self,
        target: &Target,
        compiler: &Compiler,
    ) -> Result<Vec<String>, GenError> {
        let mut visited: IndexSet<TargetId> = IndexSet::new();
        let mut out = Vec::new();
        for id in self.effective_link_with(target) {
            self.collect_dep_link_args(target, compiler, &id, true, &mut visited, &mut out)?;
        }
        for id in &target.link_whole {
            self.collect_dep_link_args(target, compiler, id, false, &mut visited, &mut out)?;
        }
        Ok(out)
    }

    fn collect_dep_link_args(
        &self,
        root: &Target,
        compiler: &Compiler,
        id: &TargetId,
        include_file: bool,
        visited: &mut IndexSet<TargetId>,
        out: &mut Vec<String>,
    ) -> Result<(), GenError> {
        if !visited.insert(id.clone()) {
            return Ok(());
        }
        let dep = self.graph.get(id).ok_or_else(|| GenError::UnknownTarget {
            target: root.id(),
            dependency: id.clone(),
        })?;
        let platform = self
            .env
            .platform_for(dep.machine)
            .ok_or_else(|| GenError::MissingPlatform { target: dep.id() })?;
        if include_file {
            let file = filename_for_linking(dep, platform, compiler.id);
            out.push(self.env.target_dir(dep).join(file).into_string());
        }
        if matches!(dep.kind, TargetKind::StaticLibrary { .. }) {
            let mut flat = FlatDeps::default();
            Self::flatten_into(&dep.dependencies, &mut flat);
            for ext in flat.externals {
                out.extend(ext.link_args.iter().cloned());
            }
        }
        for sub in self.effective_link_with(dep) {
            self.collect_dep_link_args(root, compiler, &sub, true, visited, out)?;
        }
        for sub in &dep.link_whole {
            self.collect_dep_link_args(root, compiler, sub, true, visited, out)?;
        }
        Ok(())
    }

    /// Whether any dependency, direct or reached through linked targets,
    /// needs the thread runtime.
    #[must_use]
    pub fn needs_threads(&self, target: &Target) -> bool {
        let mut visited: IndexSet<TargetId> = IndexSet::new();
        let mut pending: Vec<&Target> = vec![target];
        while let Some(current) = pending.pop() {
            let flat = self.flat_deps(current);
            if flat.externals.iter().any(|ext| ext.is_threads) {
                return true;
            }
            for id in self
                .effective_link_with(current)
                .into_iter()
                .chain(current.link_whole.iter().cloned())
            {
                if visited.insert(id.clone())
                    && let Some(dep) = self.graph.get(&id)
                {
                    pending.push(dep);
                }
            }
        }
        false
    }

    /// Every library target reachable through link lists, in discovery
    /// order.
    #[must_use]
    pub fn transitive_link_targets(&self, target: &Target) -> Vec<TargetId> {
        let mut visited: IndexSet<TargetId> = IndexSet::new();
        let mut pending: Vec<&Target> = vec![target];
        while let Some(current) = pending.pop() {
            for id in self
                .effective_link_with(current)
                .into_iter()
                .chain(current.link_whole.iter().cloned())
            {
                if visited.insert(id.clone())
                    && let Some(dep) = self.graph.get(&id)
                {
                    pending.push(dep);
                }
            }
        }
        visited.into_iter().collect()
    }

    /// Directories holding shared libraries this target links, in
    /// discovery order, relative to the build root.
    #[must_use]
    pub fn shared_lib_dirs(&self, target: &Target) -> Vec<Utf8PathBuf> {
        let mut visited: IndexSet<TargetId> = IndexSet::new();
        let mut dirs: IndexSet<Utf8PathBuf> = IndexSet::new();
        let mut pending: Vec<&Target> = vec![target];
        while let Some(current) = pending.pop() {
            for id in self
                .effective_link_with(current)
                .into_iter()
                .chain(current.link_whole.iter().cloned())
            {
                if visited.insert(id.clone())
                    && let Some(dep) = self.graph.get(&id)
                {
                    if matches!(
                        dep.kind,
                        TargetKind::SharedLibrary { .. } | TargetKind::SharedModule
                    ) {
                        dirs.insert(self.env.target_dir(dep));
                    }
                    pending.push(dep);
                }
            }
        }
        dirs.into_iter().collect()
    }

    /// The compiler that drives `target`'s link.
    ///
    /// C++ wins whenever any source is C++; otherwise the first compiler
    /// in priority order that claims a source. Zero-source link-only
    /// targets fall back to the first configured compiler.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::MissingCompiler`] when no compiler exists for
    /// the target's machine.
    pub fn linker_for(&self, target: &Target) -> Result<&'a Compiler, GenError> {
        let priority = &target.options.language_priority;
        let compilers = self
            .toolchains
            .compilers_in_priority(target.machine, priority);
        let missing = || GenError::MissingCompiler {
            language: priority.first().copied().unwrap_or(Language::C),
            machine: target.machine,
        };
        if compilers.is_empty() {
            return Err(missing());
        }
        if let Some(cpp) = compilers.iter().find(|c| c.language == Language::Cpp).copied()
            && target.sources.iter().any(|s| cpp.can_compile(&s.path))
        {
            return Ok(cpp);
        }
        for source in &target.sources {
            if let Some(compiler) = compilers
                .iter()
                .find(|c| c.can_compile(&source.path))
                .copied()
            {
                return Ok(compiler);
            }
        }
        compilers.into_iter().next().ok_or_else(missing)
    }

    /// Look up a target by id.
    #[must_use]
    pub fn lookup(&self, id: &str) -> Option<&'a Target> {
        self.graph.get(id)
    }

    /// Convenience accessor for the environment this resolver reads.
    #[must_use]
    pub const fn environment(&self) -> &'a Environment {
        self.env
    }

    /// Convenience accessor for the toolchain set this resolver reads.
    #[must_use]
    pub const fn toolchains(&self) -> &'a ToolchainSet {
        self.toolchains
    }

    /// Look up a machine's compiler, failing closed when it is absent.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::MissingCompiler`].
    pub fn require_compiler(
        &self,
        machine: Machine,
        language: Language,
    ) -> Result<&'a Compiler, GenError> {
        self.toolchains
            .compiler_for(machine, language)
            .ok_or(GenError::MissingCompiler { language, machine })
    }
}
