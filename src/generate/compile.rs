//! Compile, precompiled-header and link edge emission for build targets.

use std::fs;
use std::io::Write as _;

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;

use crate::args::ArgumentList;
use crate::classify::{self, GeneratedRole, UnityGroup};
use crate::compdb::{CompileCommand, InstallRecord};
use crate::link::{self, LinkInputs};
use crate::target::{
    ObjectSource, Platform, Source, SourceOrigin, Target, TargetKind, import_filename,
    shlib_aliases,
};
use crate::toolchain::{Compiler, Language};

use super::context::{Generator, TargetObjects};
use super::edge::{Edge, Rule, command_text};
use super::error::{GenError, Warning};

/// One source ready to compile.
struct CompileSource<'a> {
    /// Path as declared on the target; keys object names and extraction.
    logical: Utf8PathBuf,
    /// Path as seen from the build root.
    input: Utf8PathBuf,
    compiler: &'a Compiler,
}

/// Sources and side inputs gathered from a target's declarations.
#[derive(Default)]
struct Collected<'a> {
    compile: Vec<CompileSource<'a>>,
    /// Generated files compiles must wait for (headers and unknowns).
    order_only: Vec<Utf8PathBuf>,
    /// Generated objects passed straight to the link.
    generated_objects: Vec<Utf8PathBuf>,
    /// Generated libraries appended to the link line.
    custom_libs: Vec<Utf8PathBuf>,
}

impl<'a> Generator<'a> {
    pub(crate) fn emit_build_target(&mut self, target: &'a Target) -> Result<(), GenError> {
        let id = target.id();
        self.env
            .platform_for(target.machine)
            .ok_or_else(|| GenError::MissingPlatform { target: id.clone() })?;
        self.resolver.validate_links(target)?;

        let pch = self.emit_pch_edges(target)?;
        let collected = self.collect_sources(target)?;
        let custom_libs = collected.custom_libs.clone();
        let generated_objects = collected.generated_objects.clone();
        let info = if target.options.unity {
            self.compile_unity(target, collected, &pch)?
        } else {
            self.compile_individually(target, collected, &pch)?
        };

        let mut link_inputs = info.all.clone();
        self.objects.insert(id.clone(), info);
        link_inputs.extend(generated_objects);
        link_inputs.extend(self.explicit_objects(target)?);

        self.emit_link_edge(target, link_inputs, &custom_libs)
    }

    /// Resolve the target's declared sources into compile jobs and side
    /// inputs.
    fn collect_sources(&self, target: &'a Target) -> Result<Collected<'a>, GenError> {
        let id = target.id();
        let mut collected = Collected::default();
        for source in &target.sources {
            let (input, logical, role) = self.locate_source(target, source);
            match role {
                GeneratedRole::Object => collected.generated_objects.push(input),
                GeneratedRole::Library => collected.custom_libs.push(input),
                GeneratedRole::OrderOnly => collected.order_only.push(input),
                GeneratedRole::Source => {
                    let compiler = self
                        .resolver
                        .toolchains()
                        .compiler_for_source(
                            target.machine,
                            &target.options.language_priority,
                            &logical,
                        )
                        .ok_or_else(|| GenError::NoCompilerForSource {
                            target: id.clone(),
                            source_path: logical.clone(),
                        })?;
                    if !compiler.language.links_generically() {
                        return Err(GenError::NonLinkableLanguage {
                            target: id.clone(),
                            source_path: logical,
                            language: compiler.language,
                        });
                    }
                    collected.compile.push(CompileSource {
                        logical,
                        input,
                        compiler,
                    });
                }
            }
        }
        Ok(collected)
    }

    /// Resolve one source declaration to its build-root path, logical
    /// name and role.
    fn locate_source(
        &self,
        target: &Target,
        source: &Source,
    ) -> (Utf8PathBuf, Utf8PathBuf, GeneratedRole) {
        match &source.origin {
            SourceOrigin::SourceTree => {
                let input = self.env.source_path(&target.subdir, &source.path);
                let role = if classify::is_header(&source.path) {
                    GeneratedRole::OrderOnly
                } else {
                    GeneratedRole::Source
                };
                (input, source.path.clone(), role)
            }
            SourceOrigin::BuildTree => {
                let role = classify::classify_generated(&source.path);
                (source.path.clone(), source.path.clone(), role)
            }
            SourceOrigin::Generated { by } => {
                let base = self
                    .graph
                    .get(by)
                    .map(|producer| self.env.target_dir(producer))
                    .unwrap_or_default();
                let input = base.join(&source.path);
                let role = classify::classify_generated(&source.path);
                (input.clone(), input, role)
            }
        }
    }

    fn compile_individually(
        &mut self,
        target: &'a Target,
        collected: Collected<'a>,
        pch: &IndexMap<Language, (Utf8PathBuf, Vec<String>)>,
    ) -> Result<TargetObjects, GenError> {
        let mut info = TargetObjects::default();
        for job in &collected.compile {
            let object = self.emit_compile_edge(target, job, &collected.order_only, pch)?;
            info.by_source.insert(job.logical.clone(), object.clone());
            info.all.push(object);
        }
        Ok(info)
    }

    fn compile_unity(
        &mut self,
        target: &'a Target,
        collected: Collected<'a>,
        pch: &IndexMap<Language, (Utf8PathBuf, Vec<String>)>,
    ) -> Result<TargetObjects, GenError> {
        let id = target.id();
        let mut info = TargetObjects::default();
        let mut by_language: IndexMap<Language, Vec<Utf8PathBuf>> = IndexMap::new();
        let mut inputs_by_logical: IndexMap<Utf8PathBuf, Utf8PathBuf> = IndexMap::new();
        let mut compiler_by_language: IndexMap<Language, &Compiler> = IndexMap::new();
        let mut unmergeable: Vec<&CompileSource<'a>> = Vec::new();
        for job in &collected.compile {
            let language = job.compiler.language;
            // A merged unit can only include sources written in the
            // language itself; assembly accepted by the same compiler
            // stays on its own.
            let mergeable = job
                .logical
                .extension()
                .is_some_and(|ext| language.suffixes().contains(&ext));
            if !mergeable {
                unmergeable.push(job);
                continue;
            }
            by_language
                .entry(language)
                .or_default()
                .push(job.logical.clone());
            inputs_by_logical.insert(job.logical.clone(), job.input.clone());
            compiler_by_language.insert(language, job.compiler);
        }

        let partition = classify::partition_unity(&by_language, target.options.unity_size);
        for (language, logical) in &partition.exempt {
            self.warn(Warning::for_target(
                id.clone(),
                format!("{language} does not support unity builds; compiling {logical} separately"),
            ));
        }
        for job in &unmergeable {
            self.warn(Warning::for_target(
                id.clone(),
                format!(
                    "cannot merge {} into a unity unit; compiling it separately",
                    job.logical
                ),
            ));
        }

        let mut grouped: indexmap::IndexSet<Utf8PathBuf> = indexmap::IndexSet::new();
        for group in partition.groups {
            let Some(compiler) = compiler_by_language.get(&group.language).copied() else {
                continue;
            };
            grouped.extend(group.sources.iter().cloned());
            let member_inputs: Vec<Utf8PathBuf> = group
                .sources
                .iter()
                .filter_map(|l| inputs_by_logical.get(l).cloned())
                .collect();
            let unity_input = self.write_unity_file(target, &group, &member_inputs)?;
            let job = CompileSource {
                logical: Utf8PathBuf::from(group.filename(&target.name)),
                input: unity_input,
                compiler,
            };
            let mut order_only = collected.order_only.clone();
            order_only.extend(member_inputs);
            let object = self.emit_compile_edge(target, &job, &order_only, pch)?;
            info.unity.push((group, object.clone()));
            info.all.push(object);
        }

        for job in collected
            .compile
            .iter()
            .filter(|j| !grouped.contains(&j.logical))
        {
            let object = self.emit_compile_edge(target, job, &collected.order_only, pch)?;
            info.by_source.insert(job.logical.clone(), object.clone());
            info.all.push(object);
        }
        Ok(info)
    }

    /// Write one unity source under the target's private directory,
    /// leaving the file untouched when its content is unchanged.
    fn write_unity_file(
        &self,
        target: &Target,
        group: &UnityGroup,
        member_inputs: &[Utf8PathBuf],
    ) -> Result<Utf8PathBuf, GenError> {
        let rel = self
            .env
            .private_dir(target)
            .join(group.filename(&target.name));
        let abs = self.env.build_root.join(&rel);
        let mut content = String::new();
        for input in member_inputs {
            let absolute_input = self.env.build_root.join(input);
            content.push_str(&format!("#include \"{absolute_input}\"\n"));
        }
        replace_if_different(&abs, &content)?;
        Ok(rel)
    }

    /// Emit one compile edge and return its object path.
    fn emit_compile_edge(
        &mut self,
        target: &'a Target,
        job: &CompileSource<'a>,
        order_only: &[Utf8PathBuf],
        pch: &IndexMap<Language, (Utf8PathBuf, Vec<String>)>,
    ) -> Result<Utf8PathBuf, GenError> {
        let id = target.id();
        let compiler = job.compiler;
        let object = self
            .env
            .private_dir(target)
            .join(object_name(&job.logical, compiler));
        let rule = self.compile_rule(compiler);

        let mut args = self.resolver.compile_args(target, compiler)?;
        if let Some((pch_out, use_args)) = pch.get(&compiler.language) {
            args.extend(use_args.iter().cloned());
            let mut edge = self.base_compile_edge(rule, &object, job, order_only, compiler, &args);
            edge.order_only_deps.push(pch_out.clone());
            self.record_compile_command(job, &object, compiler, &args);
            self.add_edge(edge, &id)?;
            return Ok(object);
        }
        let edge = self.base_compile_edge(rule, &object, job, order_only, compiler, &args);
        self.record_compile_command(job, &object, compiler, &args);
        self.add_edge(edge, &id)?;
        Ok(object)
    }

    fn base_compile_edge(
        &self,
        rule: String,
        object: &Utf8Path,
        job: &CompileSource<'a>,
        order_only: &[Utf8PathBuf],
        compiler: &Compiler,
        args: &ArgumentList,
    ) -> Edge {
        let mut edge = Edge::new(rule, object.to_owned());
        edge.inputs.push(job.input.clone());
        edge.order_only_deps.extend(order_only.iter().cloned());
        edge.variables
            .insert("ARGS".into(), command_text(&args.to_native(compiler)));
        if compiler.supports_depfile() {
            edge.variables
                .insert("DEPFILE".into(), format!("{object}.d"));
        }
        edge
    }

    /// Register the link rule for `compiler` once.
    fn link_rule(&mut self, compiler: &Compiler) -> String {
        let name = format!("{}_LINKER", compiler.rule_id());
        if self.rules.contains_key(&name) {
            return name;
        }
        let mut parts: Vec<String> = compiler.exelist.clone();
        parts.push("$ARGS".into());
        parts.extend(compiler.linker_output_args("$out"));
        parts.push("$in".into());
        parts.push("$LINK_ARGS".into());
        let mut rule = Rule::new(name.clone(), parts.join(" "));
        rule.description = Some("Linking target $out".into());
        self.ensure_rule(rule)
    }

    /// Register the compile rule for `compiler` once.
    fn compile_rule(&mut self, compiler: &Compiler) -> String {
        let name = format!("{}_COMPILER", compiler.rule_id());
        if self.rules.contains_key(&name) {
            return name;
        }
        let mut parts: Vec<String> = compiler.exelist.clone();
        parts.push("$ARGS".into());
        parts.extend(compiler.dependency_gen_args("$out", "$DEPFILE"));
        parts.extend(compiler.output_args("$out"));
        parts.extend(compiler.compile_only_args());
        parts.push("$in".into());
        let rule = Rule {
            name: name.clone(),
            command: parts.join(" "),
            description: Some(format!("Compiling {} object $out", compiler.language)),
            depfile: compiler.supports_depfile().then(|| "$DEPFILE".to_owned()),
            deps: Some(compiler.deps_style()),
            restat: false,
            pool: None,
        };
        self.ensure_rule(rule)
    }

    fn record_compile_command(
        &mut self,
        job: &CompileSource<'a>,
        object: &Utf8Path,
        compiler: &Compiler,
        args: &ArgumentList,
    ) {
        let mut argv = compiler.exelist.clone();
        argv.extend(args.to_native(compiler));
        argv.extend(compiler.output_args(object.as_str()));
        argv.extend(compiler.compile_only_args());
        argv.push(job.input.as_str().to_owned());
        self.compile_commands.push(CompileCommand {
            directory: self.env.build_root.clone(),
            command: command_text(&argv),
            file: job.input.clone(),
            output: object.to_owned(),
        });
    }

    /// Emit precompiled-header edges, returning per-language outputs and
    /// consumer arguments.
    fn emit_pch_edges(
        &mut self,
        target: &'a Target,
    ) -> Result<IndexMap<Language, (Utf8PathBuf, Vec<String>)>, GenError> {
        let mut map = IndexMap::new();
        for (language, header) in &target.pch {
            let compiler = self.resolver.require_compiler(target.machine, *language)?;
            let header_name = header.file_name().unwrap_or("pch.h").to_owned();
            let output = self
                .env
                .private_dir(target)
                .join(format!("{header_name}.{}", compiler.pch_suffix()));
            let rule = self.compile_rule(compiler);
            let mut args = self.resolver.compile_args(target, compiler)?;
            args.extend(compiler.pch_compile_args());
            let mut edge = Edge::new(rule, output.clone());
            edge.inputs
                .push(self.env.source_path(&target.subdir, header));
            edge.variables
                .insert("ARGS".into(), command_text(&args.to_native(compiler)));
            if compiler.supports_depfile() {
                edge.variables
                    .insert("DEPFILE".into(), format!("{output}.d"));
            }
            self.add_edge(edge, &target.id())?;
            map.insert(*language, (output, compiler.pch_use_args(&header_name)));
        }
        Ok(map)
    }

    /// Prebuilt and extracted objects declared on the target.
    fn explicit_objects(&self, target: &'a Target) -> Result<Vec<Utf8PathBuf>, GenError> {
        let mut objects = Vec::new();
        for declared in &target.objects {
            match declared {
                ObjectSource::File(path) => {
                    objects.push(self.env.source_path(&target.subdir, path));
                }
                ObjectSource::Extracted(extraction) => {
                    objects.extend(self.extracted_objects(target, extraction)?);
                }
            }
        }
        Ok(objects)
    }

    fn extracted_objects(
        &self,
        requester: &Target,
        extraction: &crate::target::ExtractedObjects,
    ) -> Result<Vec<Utf8PathBuf>, GenError> {
        let source_target =
            self.graph
                .get(&extraction.target)
                .ok_or_else(|| GenError::UnknownTarget {
                    target: requester.id(),
                    dependency: extraction.target.clone(),
                })?;
        let info = self
            .objects
            .get(&extraction.target)
            .ok_or_else(|| GenError::UnknownTarget {
                target: requester.id(),
                dependency: extraction.target.clone(),
            })?;
        let groups: Option<Vec<UnityGroup>> = source_target
            .options
            .unity
            .then(|| info.unity.iter().map(|(g, _)| g.clone()).collect());
        classify::check_object_extraction(extraction, source_target, groups.as_deref())?;
        if extraction.all {
            return Ok(info.all.clone());
        }
        if source_target.options.unity {
            let matched = info
                .unity
                .iter()
                .find(|(group, _)| {
                    group.sources.len() == extraction.sources.len()
                        && group.sources.iter().all(|s| extraction.sources.contains(s))
                })
                .map(|(_, object)| vec![object.clone()]);
            return matched.ok_or_else(|| {
                GenError::Extraction(classify::ExtractionError::PartialUnityExtraction {
                    target: source_target.id(),
                })
            });
        }
        let mut objects = Vec::new();
        for source in &extraction.sources {
            let object = info.by_source.get(source).ok_or_else(|| {
                GenError::Extraction(classify::ExtractionError::UnknownSource {
                    target: source_target.id(),
                    source_path: source.clone(),
                })
            })?;
            objects.push(object.clone());
        }
        Ok(objects)
    }

    /// Emit the link (or archive) edge plus shared-library follow-ups.
    fn emit_link_edge(
        &mut self,
        target: &'a Target,
        objects: Vec<Utf8PathBuf>,
        custom_libs: &[Utf8PathBuf],
    ) -> Result<(), GenError> {
        let id = target.id();
        if matches!(target.kind, TargetKind::StaticLibrary { .. }) {
            return self.emit_archive_edge(target, objects);
        }
        let compiler = self.resolver.linker_for(target)?;
        let platform = self
            .env
            .platform_for(target.machine)
            .ok_or_else(|| GenError::MissingPlatform { target: id.clone() })?;
        let output = link::link_output_path(&self.resolver, target, compiler, platform);
        let plan = link::link_args(
            &self.resolver,
            target,
            compiler,
            &LinkInputs {
                extra_args: &[],
                custom_target_libs: custom_libs,
            },
        )?;

        let rule = self.link_rule(compiler);
        let mut edge = Edge::new(rule, output.clone());
        edge.inputs = objects;
        edge.variables
            .insert("LINK_ARGS".into(), command_text(&plan.to_native(compiler)));
        for dep_id in self.resolver.transitive_link_targets(target) {
            if let Some(artifact) = self
                .symbol_files
                .get(&dep_id)
                .or_else(|| self.link_outputs.get(&dep_id))
            {
                edge.implicit_deps.push(artifact.clone());
            }
        }
        edge.implicit_deps.extend(custom_libs.iter().cloned());
        if platform == Platform::Windows
            && let Some(implib) = import_filename(target, platform, compiler.id)
        {
            edge.implicit_outputs
                .push(self.env.target_dir(target).join(implib));
        }
        self.add_edge(edge, &id)?;
        self.link_outputs.insert(id.clone(), output.clone());

        if matches!(target.kind, TargetKind::SharedLibrary { .. }) {
            self.emit_shared_followups(target, compiler, platform, &output)?;
        }
        self.record_install(target, &output, platform, compiler.id);
        Ok(())
    }

    fn emit_archive_edge(
        &mut self,
        target: &'a Target,
        objects: Vec<Utf8PathBuf>,
    ) -> Result<(), GenError> {
        let id = target.id();
        let archiver = self
            .resolver
            .toolchains()
            .static_linker(target.machine)
            .ok_or(GenError::MissingStaticLinker {
                machine: target.machine,
            })?
            .clone();
        let platform = self
            .env
            .platform_for(target.machine)
            .ok_or_else(|| GenError::MissingPlatform { target: id.clone() })?;
        let compiler = self.resolver.linker_for(target)?;
        let rule_name = match target.machine {
            crate::toolchain::Machine::Native => "STATIC_LINKER".to_owned(),
            crate::toolchain::Machine::Cross => "STATIC_LINKER_CROSS".to_owned(),
        };
        if !self.rules.contains_key(&rule_name) {
            let mut parts = archiver.exelist.clone();
            parts.push("$LINK_ARGS".into());
            parts.push("$out".into());
            parts.push("$in".into());
            let mut rule = Rule::new(rule_name.clone(), parts.join(" "));
            rule.description = Some("Linking static target $out".into());
            self.ensure_rule(rule);
        }
        let output = link::link_output_path(&self.resolver, target, compiler, platform);
        let mut edge = Edge::new(rule_name, output.clone());
        edge.inputs = objects;
        edge.variables
            .insert("LINK_ARGS".into(), command_text(&archiver.std_args()));
        self.add_edge(edge, &id)?;
        self.link_outputs.insert(id.clone(), output.clone());
        self.record_install(target, &output, platform, compiler.id);
        Ok(())
    }

    /// Symbol-extraction edge and version alias edges for shared
    /// libraries.
    fn emit_shared_followups(
        &mut self,
        target: &'a Target,
        compiler: &Compiler,
        platform: Platform,
        output: &Utf8Path,
    ) -> Result<(), GenError> {
        let id = target.id();
        if let Some(command) = compiler.linker.symbol_dump_command() {
            let rule = {
                let mut rule = Rule::new("SHSYM", command);
                rule.description = Some("Generating symbol file $out".into());
                rule.restat = true;
                rule
            };
            let rule_name = self.ensure_rule(rule);
            let symbols = Utf8PathBuf::from(format!("{output}.symbols"));
            let mut edge = Edge::new(rule_name, symbols.clone());
            edge.inputs.push(output.to_owned());
            self.add_edge(edge, &id)?;
            self.symbol_files.insert(id.clone(), symbols);
        } else {
            self.warn(Warning::for_target(
                id.clone(),
                "no symbol extraction tool for this toolchain; dependents relink on every binary change",
            ));
        }

        for alias in shlib_aliases(target, platform, compiler.id) {
            let rule = {
                let mut rule = Rule::new("SYMLINK", "ln -sf $POINTS_TO $out");
                rule.description = Some("Creating library alias $out".into());
                rule.restat = true;
                rule
            };
            let rule_name = self.ensure_rule(rule);
            let dir = self.env.target_dir(target);
            let mut edge = Edge::new(rule_name, dir.join(&alias.name));
            edge.implicit_deps.push(dir.join(&alias.points_to));
            edge.variables
                .insert("POINTS_TO".into(), alias.points_to.clone());
            self.add_edge(edge, &id)?;
        }
        Ok(())
    }

    pub(super) fn record_install(
        &mut self,
        target: &'a Target,
        output: &Utf8Path,
        platform: Platform,
        compiler_id: crate::toolchain::CompilerId,
    ) {
        if !target.install {
            return;
        }
        let dest_dir = target.install_dir.clone().unwrap_or_else(|| {
            match target.kind {
                TargetKind::Executable { .. } => "bin",
                _ => "lib",
            }
            .into()
        });
        let aliases = shlib_aliases(target, platform, compiler_id)
            .into_iter()
            .map(|a| a.name)
            .collect();
        self.install.records.push(InstallRecord {
            target: target.id(),
            source: output.to_owned(),
            dest_dir,
            aliases,
        });
    }
}

/// Munge a logical source path into an object filename.
fn object_name(logical: &Utf8Path, compiler: &Compiler) -> String {
    let munged = logical.as_str().replace(['/', '\\'], "_");
    format!("{munged}.{}", compiler.object_suffix())
}

/// Write `content` to `path` only when it differs from what is on disk,
/// going through a temporary file so readers never observe a partial
/// write.
fn replace_if_different(path: &Utf8Path, content: &str) -> Result<(), GenError> {
    let io_err = |source| GenError::Io {
        path: path.to_owned(),
        source,
    };
    if let Ok(existing) = fs::read_to_string(path)
        && existing == content
    {
        return Ok(());
    }
    let dir = path.parent().unwrap_or(Utf8Path::new("."));
    fs::create_dir_all(dir).map_err(io_err)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(content.as_bytes()).map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}
