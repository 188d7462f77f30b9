//! Custom-command, run-target and jar edge emission.

use camino::Utf8PathBuf;

use crate::compdb::InstallRecord;
use crate::hasher::RuleHasher;
use crate::target::{CommandArg, CustomCommand, SourceOrigin, Target, TargetId};
use crate::toolchain::{DepsStyle, Language};

use super::context::Generator;
use super::edge::{Edge, Rule, command_text, ninja_escape, sh_join, sh_quote_word};
use super::error::{GenError, Warning};

impl<'a> Generator<'a> {
    pub(crate) fn emit_custom_target(
        &mut self,
        target: &'a Target,
        cmd: &'a CustomCommand,
    ) -> Result<(), GenError> {
        let id = target.id();
        let outdir = self.env.target_dir(target);
        let outputs: Vec<Utf8PathBuf> = cmd.outputs.iter().map(|o| outdir.join(o)).collect();
        if cmd.capture && outputs.len() != 1 {
            return Err(GenError::CaptureWithMultipleOutputs {
                target: id,
                count: outputs.len(),
            });
        }
        let inputs = self.custom_inputs(target);
        let argv = self.substitute_command(target, cmd, &inputs, &outputs)?;

        let needs_wrapper = cmd.capture || argv.iter().any(|a| a.contains('\n'));
        let command = if needs_wrapper {
            let mut line = sh_join(&argv);
            if cmd.capture
                && let Some(first) = outputs.first()
            {
                line.push_str(" > ");
                line.push_str(&sh_quote_word(first.as_str()));
            }
            ninja_escape(&wrap_multiline(&line))
        } else {
            let line = sh_join(&argv);
            if shlex::split(&line).is_none() {
                let snippet: String = line.chars().take(160).collect();
                return Err(GenError::InvalidCommand {
                    target: id,
                    snippet,
                });
            }
            ninja_escape(&line)
        };

        let mut rule = Rule::new(String::new(), command);
        rule.description = Some("Generating $out with a custom command".into());
        if let Some(depfile) = &cmd.depfile {
            rule.depfile = Some(ninja_escape(outdir.join(depfile).as_str()));
            rule.deps = Some(DepsStyle::Gcc);
        }
        rule.name = RuleHasher::rule_name(&rule);
        let rule_name = self.ensure_rule(rule);

        let mut edge = Edge {
            rule: rule_name,
            outputs: outputs.clone(),
            inputs,
            ..Edge::default()
        };
        for dep in &cmd.extra_depends {
            edge.implicit_deps.extend(self.target_artifacts(dep));
        }
        for file in &cmd.depend_files {
            edge.implicit_deps
                .push(self.env.source_path(&target.subdir, file));
        }
        if cmd.build_always {
            let phony = self.always_phony();
            edge.implicit_deps.push(phony);
        }
        self.add_edge(edge, &id)?;
        self.custom_outputs.insert(id.clone(), outputs.clone());

        if target.install {
            if let Some(dest_dir) = target.install_dir.clone() {
                if let Some(first) = outputs.first() {
                    self.install.records.push(InstallRecord {
                        target: id,
                        source: first.clone(),
                        dest_dir,
                        aliases: Vec::new(),
                    });
                }
            } else {
                self.warn(Warning::for_target(
                    id,
                    "custom target is marked for installation but has no install_dir; skipping",
                ));
            }
        }
        Ok(())
    }

    pub(crate) fn emit_run_target(
        &mut self,
        target: &'a Target,
        command: &'a [String],
        depends: &'a [TargetId],
    ) -> Result<(), GenError> {
        let id = target.id();
        let line = sh_join(command);
        let command_text_line = ninja_escape(&wrap_multiline(&line));
        let mut rule = Rule::new(String::new(), command_text_line);
        rule.description = Some(format!("Running external command {}", target.name));
        rule.pool = Some("console".into());
        rule.name = RuleHasher::rule_name(&rule);
        let rule_name = self.ensure_rule(rule);

        let mut edge = Edge::new(rule_name, self.env.target_dir(target).join(&target.name));
        for dep in depends {
            edge.implicit_deps.extend(self.target_artifacts(dep));
        }
        let phony = self.always_phony();
        edge.implicit_deps.push(phony);
        self.add_edge(edge, &id)
    }

    pub(crate) fn emit_jar_target(
        &mut self,
        target: &'a Target,
        main_class: Option<&str>,
    ) -> Result<(), GenError> {
        let id = target.id();
        let platform = self
            .env
            .platform_for(target.machine)
            .ok_or_else(|| GenError::MissingPlatform { target: id.clone() })?;
        let compiler = self
            .resolver
            .require_compiler(target.machine, Language::Java)?;
        let private = self.env.private_dir(target);

        let rule_name = {
            let name = format!("{}_COMPILER", compiler.rule_id());
            if !self.rules.contains_key(&name) {
                let mut parts = compiler.exelist.clone();
                parts.push("$ARGS".into());
                parts.push("$in".into());
                let mut rule = Rule::new(name.clone(), parts.join(" "));
                rule.description = Some("Compiling Java sources $in".into());
                self.ensure_rule(rule);
            }
            name
        };

        let mut class_files = Vec::new();
        for source in &target.sources {
            let input = match &source.origin {
                SourceOrigin::SourceTree => self.env.source_path(&target.subdir, &source.path),
                SourceOrigin::BuildTree => source.path.clone(),
                SourceOrigin::Generated { by } => {
                    let base = self
                        .graph
                        .get(by)
                        .map(|producer| self.env.target_dir(producer))
                        .unwrap_or_default();
                    base.join(&source.path)
                }
            };
            if source.path.extension() != Some("java") {
                return Err(GenError::NoCompilerForSource {
                    target: id.clone(),
                    source_path: source.path.clone(),
                });
            }
            let stem = source.path.file_stem().unwrap_or("Class");
            let class_file = private.join(format!("{stem}.class"));
            let mut args: Vec<String> = vec![
                "-d".into(),
                private.as_str().into(),
                "-cp".into(),
                private.as_str().into(),
            ];
            if let Some(extra) = target.extra_args.get(&Language::Java) {
                args.extend(extra.iter().cloned());
            }
            let mut edge = Edge::new(rule_name.clone(), class_file.clone());
            edge.inputs.push(input);
            edge.variables.insert("ARGS".into(), command_text(&args));
            self.add_edge(edge, &id)?;
            class_files.push(class_file);
        }

        let jar_rule = {
            let name = "java_LINKER".to_owned();
            if !self.rules.contains_key(&name) {
                let mut rule = Rule::new(name.clone(), "jar $ARGS");
                rule.description = Some("Creating JAR $out".into());
                self.ensure_rule(rule);
            }
            name
        };
        let output = self
            .env
            .target_dir(target)
            .join(format!("{}.jar", target.name));
        let mut jar_args: Vec<String> = Vec::new();
        if let Some(main) = main_class {
            jar_args.push("cfe".into());
            jar_args.push(output.as_str().into());
            jar_args.push(main.into());
        } else {
            jar_args.push("cf".into());
            jar_args.push(output.as_str().into());
        }
        jar_args.extend(class_files.iter().map(|c| c.as_str().to_owned()));
        let mut edge = Edge::new(jar_rule, output.clone());
        edge.inputs = class_files;
        edge.variables
            .insert("ARGS".into(), command_text(&jar_args));
        self.add_edge(edge, &id)?;
        self.link_outputs.insert(id.clone(), output.clone());
        self.record_install(target, &output, platform, compiler.id);
        Ok(())
    }

    /// Resolve a custom target's declared sources to build-root paths.
    fn custom_inputs(&self, target: &Target) -> Vec<Utf8PathBuf> {
        target
            .sources
            .iter()
            .map(|source| match &source.origin {
                SourceOrigin::SourceTree => self.env.source_path(&target.subdir, &source.path),
                SourceOrigin::BuildTree => source.path.clone(),
                SourceOrigin::Generated { by } => {
                    let base = self
                        .graph
                        .get(by)
                        .map(|producer| self.env.target_dir(producer))
                        .unwrap_or_default();
                    base.join(&source.path)
                }
            })
            .collect()
    }

    /// Built artifacts of a target, for dependency edges.
    pub(crate) fn target_artifacts(&self, id: &TargetId) -> Vec<Utf8PathBuf> {
        if let Some(output) = self.link_outputs.get(id) {
            return vec![output.clone()];
        }
        self.custom_outputs.get(id).cloned().unwrap_or_default()
    }

    /// Resolve every substitution token in the command, after flattening
    /// list-valued arguments.
    fn substitute_command(
        &self,
        target: &Target,
        cmd: &CustomCommand,
        inputs: &[Utf8PathBuf],
        outputs: &[Utf8PathBuf],
    ) -> Result<Vec<String>, GenError> {
        let id = target.id();
        let flattened: Vec<&String> = cmd
            .command
            .iter()
            .flat_map(|arg| match arg {
                CommandArg::Single(s) => std::slice::from_ref(s),
                CommandArg::Group(list) => list.as_slice(),
            })
            .collect();
        if cmd.capture && flattened.iter().any(|a| a.contains("@OUTPUT@")) {
            return Err(GenError::OutputTokenWithCapture { target: id });
        }

        let outdir = self.env.target_dir(target);
        let outdir_text = if outdir.as_str().is_empty() {
            ".".to_owned()
        } else {
            outdir.to_string()
        };
        let input_texts: Vec<String> = inputs.iter().map(|p| p.to_string()).collect();
        let output_texts: Vec<String> = outputs.iter().map(|p| p.to_string()).collect();

        let mut argv = Vec::new();
        for arg in flattened {
            if arg == "@INPUT@" {
                if input_texts.is_empty() {
                    return Err(GenError::TokenWithoutValues {
                        target: id,
                        token: "@INPUT@".into(),
                    });
                }
                argv.extend(input_texts.iter().cloned());
                continue;
            }
            if arg == "@OUTPUT@" {
                if output_texts.is_empty() {
                    return Err(GenError::TokenWithoutValues {
                        target: id,
                        token: "@OUTPUT@".into(),
                    });
                }
                argv.extend(output_texts.iter().cloned());
                continue;
            }
            let mut text = replace_indexed(&id, arg, "INPUT", &input_texts)?;
            text = replace_indexed(&id, &text, "OUTPUT", &output_texts)?;
            text = replace_single(&id, &text, "@INPUT@", &input_texts)?;
            text = replace_single(&id, &text, "@OUTPUT@", &output_texts)?;
            text = text.replace("@OUTDIR@", &outdir_text);
            if text.contains("@DEPFILE@") {
                let depfile = cmd.depfile.as_ref().ok_or_else(|| {
                    GenError::TokenWithoutValues {
                        target: id.clone(),
                        token: "@DEPFILE@".into(),
                    }
                })?;
                text = text.replace("@DEPFILE@", outdir.join(depfile).as_str());
            }
            text = text.replace("@SOURCE_ROOT@", self.env.build_to_src().as_str());
            text = text.replace("@BUILD_ROOT@", ".");
            text = text.replace(
                "@CURRENT_SOURCE_DIR@",
                self.env.build_to_src().join(&target.subdir).as_str(),
            );
            argv.push(text);
        }
        Ok(argv)
    }
}

/// Replace an embedded single-valued token, rejecting ambiguity.
fn replace_single(
    target: &TargetId,
    text: &str,
    token: &str,
    values: &[String],
) -> Result<String, GenError> {
    if !text.contains(token) {
        return Ok(text.to_owned());
    }
    match values {
        [] => Err(GenError::TokenWithoutValues {
            target: target.clone(),
            token: token.to_owned(),
        }),
        [single] => Ok(text.replace(token, single)),
        _ => Err(GenError::SingleValuedToken {
            target: target.clone(),
            token: token.to_owned(),
            count: values.len(),
        }),
    }
}

/// Replace `@KEYn@` tokens with the n-th value.
fn replace_indexed(
    target: &TargetId,
    text: &str,
    key: &str,
    values: &[String],
) -> Result<String, GenError> {
    let pattern = format!("@{key}");
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find(&pattern) {
        let (before, found) = rest.split_at(pos);
        out.push_str(before);
        let after = found.get(pattern.len()..).unwrap_or("");
        let digits: String = after.chars().take_while(char::is_ascii_digit).collect();
        let tail = after.get(digits.len()..).unwrap_or("");
        if !digits.is_empty() && tail.starts_with('@') {
            let token = format!("{pattern}{digits}@");
            let index: usize = digits.parse().map_err(|_| GenError::TokenIndexOutOfRange {
                target: target.clone(),
                token: token.clone(),
                count: values.len(),
            })?;
            let value = values.get(index).ok_or_else(|| GenError::TokenIndexOutOfRange {
                target: target.clone(),
                token: token.clone(),
                count: values.len(),
            })?;
            out.push_str(value);
            rest = tail.get(1..).unwrap_or("");
        } else {
            out.push_str(&pattern);
            rest = after;
        }
    }
    out.push_str(rest);
    Ok(out)
}

/// Encode embedded newlines through a `printf %b` round trip so the rule
/// command stays on one line.
fn wrap_multiline(line: &str) -> String {
    if !line.contains('\n') {
        return line.to_owned();
    }
    let escaped = line
        .replace('\\', "\\\\")
        .replace('$', "\\$")
        .replace('"', "\\\"")
        .replace('`', "\\`")
        .replace('\'', "'\"'\"'")
        .replace('\n', "\\n");
    format!("/bin/sh -e -c \"printf %b '{escaped}' | /bin/sh -e\"")
}
