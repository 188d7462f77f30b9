//! The generator context and graph traversal.

use camino::Utf8PathBuf;
use indexmap::{IndexMap, IndexSet};

use crate::classify::UnityGroup;
use crate::compdb::{CompileCommand, InstallManifest};
use crate::env::Environment;
use crate::resolve::Resolver;
use crate::target::{
    ObjectSource, SourceOrigin, Target, TargetGraph, TargetId, TargetKind,
};
use crate::toolchain::ToolchainSet;

use super::edge::{Edge, Rule};
use super::error::{GenError, Warning};

/// Everything one generation pass produced.
#[derive(Debug, Default)]
pub struct Generation {
    /// Rules keyed by name.
    pub rules: IndexMap<String, Rule>,
    /// Edges in emission order.
    pub edges: Vec<Edge>,
    /// Outputs built when the executor is invoked bare.
    pub default_targets: Vec<Utf8PathBuf>,
    /// Non-fatal observations collected along the way.
    pub warnings: Vec<Warning>,
    /// Resolved compiler invocations for the compile-command database.
    pub compile_commands: Vec<CompileCommand>,
    /// Artifacts for the install executor.
    pub install: InstallManifest,
}

/// Objects a build target produced, kept for extraction and linking.
#[derive(Debug, Default)]
pub(crate) struct TargetObjects {
    /// Per-source objects keyed by the source's logical path.
    pub(crate) by_source: IndexMap<Utf8PathBuf, Utf8PathBuf>,
    /// Unity groups with their object paths.
    pub(crate) unity: Vec<(UnityGroup, Utf8PathBuf)>,
    /// Every object in emission order.
    pub(crate) all: Vec<Utf8PathBuf>,
}

/// Generate build rules for every target in `graph`.
///
/// The traversal is a memoized depth-first walk in dependency order; the
/// generator context owns every cache so repeated calls are fully
/// independent.
///
/// # Errors
///
/// Returns the first configuration or tool-probe error; no output is
/// produced in that case.
pub fn generate(
    graph: &TargetGraph,
    env: &Environment,
    toolchains: &ToolchainSet,
) -> Result<Generation, GenError> {
    let mut generator = Generator::new(graph, env, toolchains);
    let ids: Vec<TargetId> = graph.iter().map(|(id, _)| id.clone()).collect();
    for id in &ids {
        generator.visit(id, None)?;
    }
    Ok(generator.finish())
}

pub(crate) struct Generator<'a> {
    pub(crate) graph: &'a TargetGraph,
    pub(crate) env: &'a Environment,
    pub(crate) resolver: Resolver<'a>,
    pub(crate) rules: IndexMap<String, Rule>,
    pub(crate) edges: Vec<Edge>,
    pub(crate) warnings: Vec<Warning>,
    pub(crate) compile_commands: Vec<CompileCommand>,
    pub(crate) install: InstallManifest,
    /// Output-path collision table, updated eagerly per edge.
    outputs_seen: IndexMap<Utf8PathBuf, TargetId>,
    processed: IndexSet<TargetId>,
    visiting: Vec<TargetId>,
    pub(crate) objects: IndexMap<TargetId, TargetObjects>,
    pub(crate) link_outputs: IndexMap<TargetId, Utf8PathBuf>,
    pub(crate) symbol_files: IndexMap<TargetId, Utf8PathBuf>,
    pub(crate) custom_outputs: IndexMap<TargetId, Vec<Utf8PathBuf>>,
    always_phony_emitted: bool,
}

impl<'a> Generator<'a> {
    pub(crate) fn new(
        graph: &'a TargetGraph,
        env: &'a Environment,
        toolchains: &'a ToolchainSet,
    ) -> Self {
        Self {
            graph,
            env,
            resolver: Resolver::new(graph, env, toolchains),
            rules: IndexMap::new(),
            edges: Vec::new(),
            warnings: Vec::new(),
            compile_commands: Vec::new(),
            install: InstallManifest::default(),
            outputs_seen: IndexMap::new(),
            processed: IndexSet::new(),
            visiting: Vec::new(),
            objects: IndexMap::new(),
            link_outputs: IndexMap::new(),
            symbol_files: IndexMap::new(),
            custom_outputs: IndexMap::new(),
            always_phony_emitted: false,
        }
    }

    /// Visit `id`, generating its dependencies first.
    pub(crate) fn visit(
        &mut self,
        id: &TargetId,
        requested_by: Option<&TargetId>,
    ) -> Result<(), GenError> {
        if self.processed.contains(id) {
            return Ok(());
        }
        if let Some(pos) = self.visiting.iter().position(|v| v == id) {
            let mut cycle: Vec<TargetId> =
                self.visiting.iter().skip(pos).cloned().collect();
            cycle.push(id.clone());
            return Err(GenError::DependencyCycle {
                cycle: canonicalize_cycle(cycle),
            });
        }
        let target = self.graph.get(id).ok_or_else(|| GenError::UnknownTarget {
            target: requested_by.cloned().unwrap_or_default(),
            dependency: id.clone(),
        })?;
        tracing::debug!(id = %id, "generating rules");
        self.visiting.push(id.clone());
        let result = self.emit_target(id, target);
        self.visiting.pop();
        result?;
        self.processed.insert(id.clone());
        Ok(())
    }

    fn emit_target(&mut self, id: &TargetId, target: &'a Target) -> Result<(), GenError> {
        for dep in Self::dependency_ids(&self.resolver, target) {
            self.visit(&dep, Some(id))?;
        }
        for keyword in &target.extra_keywords {
            self.warn(Warning::for_target(
                id.clone(),
                format!("unknown target keyword {keyword:?}"),
            ));
        }
        match &target.kind {
            TargetKind::Executable { .. }
            | TargetKind::SharedLibrary { .. }
            | TargetKind::SharedModule
            | TargetKind::StaticLibrary { .. } => self.emit_build_target(target),
            TargetKind::CustomTarget(cmd) => self.emit_custom_target(target, cmd),
            TargetKind::RunTarget { command, depends } => {
                self.emit_run_target(target, command, depends)
            }
            TargetKind::Jar { main_class } => self.emit_jar_target(target, main_class.as_deref()),
        }
    }

    /// Every target that must be generated before `target`.
    fn dependency_ids(resolver: &Resolver<'a>, target: &Target) -> Vec<TargetId> {
        let mut ids: Vec<TargetId> = resolver.effective_link_with(target);
        ids.extend(target.link_whole.iter().cloned());
        for source in &target.sources {
            if let SourceOrigin::Generated { by } = &source.origin {
                ids.push(by.clone());
            }
        }
        for object in &target.objects {
            if let ObjectSource::Extracted(extracted) = object {
                ids.push(extracted.target.clone());
            }
        }
        match &target.kind {
            TargetKind::CustomTarget(cmd) => ids.extend(cmd.extra_depends.iter().cloned()),
            TargetKind::RunTarget { depends, .. } => ids.extend(depends.iter().cloned()),
            _ => {}
        }
        ids
    }

    /// Record an edge, checking its outputs against the collision table.
    pub(crate) fn add_edge(&mut self, edge: Edge, owner: &TargetId) -> Result<(), GenError> {
        for output in edge.all_outputs() {
            if let Some(first) = self.outputs_seen.get(output) {
                return Err(GenError::DuplicateOutput {
                    output: output.clone(),
                    first: first.clone(),
                    second: owner.clone(),
                });
            }
        }
        for output in edge.all_outputs() {
            self.outputs_seen.insert(output.clone(), owner.clone());
        }
        self.edges.push(edge);
        Ok(())
    }

    /// Register `rule` unless an identically named one already exists.
    pub(crate) fn ensure_rule(&mut self, rule: Rule) -> String {
        let name = rule.name.clone();
        self.rules.entry(name.clone()).or_insert(rule);
        name
    }

    pub(crate) fn warn(&mut self, warning: Warning) {
        tracing::warn!(
            target_id = warning.target.as_deref().unwrap_or("<project>"),
            "{}",
            warning.message
        );
        self.warnings.push(warning);
    }

    /// The phony edge always-stale targets depend on.
    pub(crate) fn always_phony(&mut self) -> Utf8PathBuf {
        let path = Utf8PathBuf::from("PHONY");
        if !self.always_phony_emitted {
            self.edges.push(Edge::phony(path.clone(), Vec::new()));
            self.always_phony_emitted = true;
        }
        path
    }

    fn finish(mut self) -> Generation {
        let all_outputs: Vec<Utf8PathBuf> = self
            .link_outputs
            .values()
            .cloned()
            .chain(self.custom_outputs.values().flatten().cloned())
            .collect();
        let default_targets = if all_outputs.is_empty() {
            Vec::new()
        } else {
            self.edges.push(Edge::phony("all", all_outputs));
            vec![Utf8PathBuf::from("all")]
        };
        Generation {
            rules: self.rules,
            edges: self.edges,
            default_targets,
            warnings: self.warnings,
            compile_commands: self.compile_commands,
            install: self.install,
        }
    }
}

/// Rotate a cycle so it starts at its smallest member, keeping the closing
/// repetition intact.
fn canonicalize_cycle(mut cycle: Vec<TargetId>) -> Vec<TargetId> {
    if cycle.len() < 2 {
        return cycle;
    }
    let len = cycle.len() - 1;
    let start = cycle
        .iter()
        .take(len)
        .enumerate()
        .min_by(|(_, a), (_, b)| a.cmp(b))
        .map_or(0, |(idx, _)| idx);
    let (prefix, suffix) = cycle.split_at_mut(len);
    prefix.rotate_left(start);
    if let (Some(first), Some(slot)) = (prefix.first().cloned(), suffix.first_mut()) {
        slot.clone_from(&first);
    }
    cycle
}
