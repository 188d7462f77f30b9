//! End-to-end edge generation tests.

mod common;

use camino::Utf8PathBuf;
use rstest::rstest;

use common::{exe, graph, shared_lib, static_lib, target, test_env, toolchains};
use daiku::generate::{GenError, generate};
use daiku::target::{CommandArg, CustomCommand, Source, SourceOrigin, TargetKind};

fn custom(name: &str, command: &[&str], outputs: &[&str]) -> daiku::target::Target {
    target(
        name,
        TargetKind::CustomTarget(CustomCommand {
            command: command
                .iter()
                .map(|c| CommandArg::Single((*c).to_owned()))
                .collect(),
            outputs: outputs.iter().map(|o| (*o).to_owned()).collect(),
            capture: false,
            depfile: None,
            build_always: false,
            extra_depends: Vec::new(),
            depend_files: Vec::new(),
        }),
        &[],
    )
}

#[rstest]
fn one_compile_edge_per_source_plus_link() {
    let prog = exe("prog", &["main.c", "util.c"]);
    let graph = graph(vec![prog]);
    let generation = generate(&graph, &test_env(), &toolchains()).expect("generate");

    let compile_edges: Vec<_> = generation
        .edges
        .iter()
        .filter(|e| e.rule == "c_COMPILER")
        .collect();
    assert_eq!(compile_edges.len(), 2);
    let link_edges: Vec<_> = generation
        .edges
        .iter()
        .filter(|e| e.rule == "c_LINKER")
        .collect();
    assert_eq!(link_edges.len(), 1);
    assert_eq!(
        link_edges.first().map(|e| e.outputs.clone()),
        Some(vec![Utf8PathBuf::from("prog")])
    );
}

#[rstest]
fn compile_edges_carry_depfiles() {
    let graph = graph(vec![exe("prog", &["main.c"])]);
    let generation = generate(&graph, &test_env(), &toolchains()).expect("generate");

    let rule = generation.rules.get("c_COMPILER").expect("compile rule");
    assert_eq!(rule.depfile.as_deref(), Some("$DEPFILE"));
    let edge = generation
        .edges
        .iter()
        .find(|e| e.rule == "c_COMPILER")
        .expect("compile edge");
    assert_eq!(
        edge.variables.get("DEPFILE").map(String::as_str),
        Some("prog@exe/main.c.o.d")
    );
}

#[rstest]
fn generated_headers_become_order_only_deps() {
    let gen_header = custom("confgen", &["gen.py", "@OUTPUT@"], &["config.h"]);
    let mut prog = exe("prog", &["main.c"]);
    prog.sources.push(Source {
        path: "config.h".into(),
        origin: SourceOrigin::Generated {
            by: "confgen@cus".into(),
        },
    });
    let graph = graph(vec![gen_header, prog]);
    let generation = generate(&graph, &test_env(), &toolchains()).expect("generate");

    let edge = generation
        .edges
        .iter()
        .find(|e| e.rule == "c_COMPILER")
        .expect("compile edge");
    assert!(
        edge.order_only_deps
            .contains(&Utf8PathBuf::from("config.h")),
        "generated header must be an order-only dependency"
    );
}

#[rstest]
fn shared_library_gets_symbol_extraction_edge() {
    let lib = shared_lib("A", &["a.c"], Some("2.1.0"), Some("2"));
    let graph = graph(vec![lib]);
    let generation = generate(&graph, &test_env(), &toolchains()).expect("generate");

    let shsym = generation
        .edges
        .iter()
        .find(|e| e.rule == "SHSYM")
        .expect("symbol extraction edge");
    assert_eq!(shsym.outputs, vec![Utf8PathBuf::from("libA.so.2.1.0.symbols")]);
    assert_eq!(shsym.inputs, vec![Utf8PathBuf::from("libA.so.2.1.0")]);
    assert!(generation.rules.get("SHSYM").is_some_and(|r| r.restat));
}

#[rstest]
fn dependents_depend_on_symbols_not_binaries() {
    let lib = shared_lib("A", &["a.c"], None, None);
    let mut prog = exe("prog", &["main.c"]);
    prog.link_with.push("A@sha".into());
    let graph = graph(vec![lib, prog]);
    let generation = generate(&graph, &test_env(), &toolchains()).expect("generate");

    let link = generation
        .edges
        .iter()
        .find(|e| e.rule == "c_LINKER" && e.outputs == vec![Utf8PathBuf::from("prog")])
        .expect("prog link edge");
    assert!(
        link.implicit_deps
            .contains(&Utf8PathBuf::from("libA.so.symbols")),
        "dependent must rebuild on symbol changes, not binary changes"
    );
}

#[rstest]
fn versioned_library_emits_two_aliases() {
    let lib = shared_lib("A", &["a.c"], Some("2.1.0"), Some("2"));
    let graph = graph(vec![lib]);
    let generation = generate(&graph, &test_env(), &toolchains()).expect("generate");

    let aliases: Vec<_> = generation
        .edges
        .iter()
        .filter(|e| e.rule == "SYMLINK")
        .collect();
    assert_eq!(aliases.len(), 2);
    let so2 = aliases
        .iter()
        .find(|e| e.outputs == vec![Utf8PathBuf::from("libA.so.2")])
        .expect("soversion alias");
    assert_eq!(
        so2.variables.get("POINTS_TO").map(String::as_str),
        Some("libA.so.2.1.0")
    );
    let unversioned = aliases
        .iter()
        .find(|e| e.outputs == vec![Utf8PathBuf::from("libA.so")])
        .expect("unversioned alias");
    assert_eq!(
        unversioned.variables.get("POINTS_TO").map(String::as_str),
        Some("libA.so.2")
    );
}

#[rstest]
fn unversioned_library_has_no_aliases() {
    let lib = shared_lib("A", &["a.c"], None, None);
    let graph = graph(vec![lib]);
    let generation = generate(&graph, &test_env(), &toolchains()).expect("generate");

    assert!(generation.edges.iter().all(|e| e.rule != "SYMLINK"));
    assert!(
        generation
            .edges
            .iter()
            .any(|e| e.outputs == vec![Utf8PathBuf::from("libA.so")])
    );
}

#[rstest]
fn static_libs_in_a_chain_contribute_no_link_edges() {
    let mut s2 = static_lib("s2", &["s2.c"]);
    s2.dependencies.push(daiku::target::Dependency::External(
        daiku::target::ExternalDependency {
            name: "m".into(),
            compile_args: Vec::new(),
            link_args: vec!["-lm".into()],
            is_threads: false,
        },
    ));
    let mut s1 = static_lib("s1", &["s1.c"]);
    s1.link_with.push("s2@sta".into());
    let mut prog = exe("prog", &["main.c"]);
    prog.link_with.push("s1@sta".into());
    let graph = graph(vec![s2, s1, prog]);
    let generation = generate(&graph, &test_env(), &toolchains()).expect("generate");

    let archive_edges: Vec<_> = generation
        .edges
        .iter()
        .filter(|e| e.rule == "STATIC_LINKER")
        .collect();
    assert_eq!(archive_edges.len(), 2);
    for edge in &archive_edges {
        assert_eq!(
            edge.variables.get("LINK_ARGS").map(String::as_str),
            Some("csr"),
            "a static library's own edge must not carry link args"
        );
    }

    let link = generation
        .edges
        .iter()
        .find(|e| e.rule == "c_LINKER")
        .expect("one link edge");
    let link_args = link.variables.get("LINK_ARGS").expect("LINK_ARGS");
    let start = link_args.find("-Wl,--start-group");
    let end = link_args.rfind("-Wl,--end-group");
    assert!(start.is_some() && end.is_some());
    assert_eq!(
        link_args.matches("-Wl,--start-group").count(),
        1,
        "exactly one group span"
    );
    assert!(link_args.find("libs1.a") > start, "libraries inside the group");
    assert!(link_args.find("libs2.a") < end);
    assert!(link_args.find("-lm") < end);
}

#[rstest]
fn duplicate_outputs_abort_generation() {
    let a = custom("gen_a", &["tool"], &["out.bin"]);
    let b = custom("gen_b", &["tool2"], &["out.bin"]);
    let graph = graph(vec![a, b]);

    let err = generate(&graph, &test_env(), &toolchains()).expect_err("must fail");
    assert!(matches!(err, GenError::DuplicateOutput { .. }));
}

#[rstest]
fn dependency_cycles_are_fatal() {
    let mut s1 = static_lib("s1", &["s1.c"]);
    s1.link_with.push("s2@sta".into());
    let mut s2 = static_lib("s2", &["s2.c"]);
    s2.link_with.push("s1@sta".into());
    let graph = graph(vec![s1, s2]);

    let err = generate(&graph, &test_env(), &toolchains()).expect_err("must fail");
    assert!(matches!(err, GenError::DependencyCycle { .. }));
}

#[rstest]
fn capture_with_two_outputs_is_rejected() {
    let mut bad = custom("gen", &["tool", "@INPUT@"], &["a.txt", "b.txt"]);
    if let TargetKind::CustomTarget(cmd) = &mut bad.kind {
        cmd.capture = true;
    }
    let graph = graph(vec![bad]);

    let err = generate(&graph, &test_env(), &toolchains()).expect_err("must fail");
    assert!(matches!(err, GenError::CaptureWithMultipleOutputs { .. }));
}

#[rstest]
fn output_token_with_capture_is_rejected() {
    let mut bad = custom("gen", &["tool", "@OUTPUT@"], &["a.txt"]);
    if let TargetKind::CustomTarget(cmd) = &mut bad.kind {
        cmd.capture = true;
    }
    let graph = graph(vec![bad]);

    let err = generate(&graph, &test_env(), &toolchains()).expect_err("must fail");
    assert!(matches!(err, GenError::OutputTokenWithCapture { .. }));
}

#[rstest]
fn embedded_output_token_with_two_outputs_is_rejected() {
    let bad = custom("gen", &["tool", "--out=@OUTPUT@"], &["a.txt", "b.txt"]);
    let graph = graph(vec![bad]);

    let err = generate(&graph, &test_env(), &toolchains()).expect_err("must fail");
    assert!(matches!(err, GenError::SingleValuedToken { .. }));
}

#[rstest]
fn custom_command_substitutes_tokens() {
    let mut r#gen = custom(
        "gen",
        &["tool", "@INPUT0@", "--dir", "@OUTDIR@", "@OUTPUT0@"],
        &["out.c"],
    );
    r#gen.sources.push(Source::in_tree("in.txt"));
    let graph = graph(vec![r#gen]);
    let generation = generate(&graph, &test_env(), &toolchains()).expect("generate");

    let edge = generation
        .edges
        .iter()
        .find(|e| e.outputs == vec![Utf8PathBuf::from("out.c")])
        .expect("custom edge");
    let rule = generation.rules.get(&edge.rule).expect("custom rule");
    assert!(rule.command.contains("../src/in.txt"));
    assert!(rule.command.contains("out.c"));
    assert!(rule.command.contains("--dir ."));
}

#[rstest]
fn identical_custom_commands_share_one_rule() {
    let a = custom("gen_a", &["regen-all"], &["a.txt"]);
    let b = custom("gen_b", &["regen-all"], &["b.txt"]);
    let graph = graph(vec![a, b]);
    let generation = generate(&graph, &test_env(), &toolchains()).expect("generate");

    let custom_rules: Vec<_> = generation
        .rules
        .values()
        .filter(|r| r.command == "regen-all")
        .collect();
    assert_eq!(custom_rules.len(), 1, "equal commands collapse into one rule");
    let custom_edges: Vec<_> = generation
        .edges
        .iter()
        .filter(|e| {
            custom_rules
                .first()
                .is_some_and(|r| r.name == e.rule)
        })
        .collect();
    assert_eq!(custom_edges.len(), 2);
}

#[rstest]
fn zero_source_link_only_target_still_links() {
    let lib = shared_lib("A", &["a.c"], None, None);
    let mut prog = exe("prog", &[]);
    prog.link_with.push("A@sha".into());
    let graph = graph(vec![lib, prog]);
    let generation = generate(&graph, &test_env(), &toolchains()).expect("generate");

    let link = generation
        .edges
        .iter()
        .find(|e| e.rule == "c_LINKER" && e.outputs == vec![Utf8PathBuf::from("prog")])
        .expect("link edge for zero-source target");
    assert!(link.inputs.is_empty());
    assert!(
        link.variables
            .get("LINK_ARGS")
            .is_some_and(|args| args.contains("libA.so"))
    );
}

#[rstest]
fn run_targets_rerun_every_build() {
    let lint = target(
        "lint",
        TargetKind::RunTarget {
            command: vec!["lint.sh".into(), "--all".into()],
            depends: Vec::new(),
        },
        &[],
    );
    let graph = graph(vec![lint]);
    let generation = generate(&graph, &test_env(), &toolchains()).expect("generate");

    let edge = generation
        .edges
        .iter()
        .find(|e| e.outputs == vec![Utf8PathBuf::from("lint")])
        .expect("run edge");
    assert!(edge.implicit_deps.contains(&Utf8PathBuf::from("PHONY")));
    let rule = generation.rules.get(&edge.rule).expect("run rule");
    assert_eq!(rule.pool.as_deref(), Some("console"));
    assert!(
        !generation.default_targets.iter().any(|d| d == "lint"),
        "run targets never join the default set"
    );
}

#[rstest]
fn jar_targets_bundle_instead_of_linking() {
    let app = target(
        "app",
        TargetKind::Jar {
            main_class: Some("com.example.Main".into()),
        },
        &["Main.java"],
    );
    let graph = graph(vec![app]);
    let generation = generate(&graph, &test_env(), &toolchains()).expect("generate");

    let compile = generation
        .edges
        .iter()
        .find(|e| e.rule == "java_COMPILER")
        .expect("javac edge");
    assert_eq!(compile.outputs, vec![Utf8PathBuf::from("app@jar/Main.class")]);
    let bundle = generation
        .edges
        .iter()
        .find(|e| e.rule == "java_LINKER")
        .expect("jar edge");
    assert_eq!(bundle.outputs, vec![Utf8PathBuf::from("app.jar")]);
    let args = bundle.variables.get("ARGS").expect("jar args");
    assert!(args.contains("cfe"));
    assert!(args.contains("com.example.Main"));
}

#[rstest]
fn unknown_target_keywords_warn_but_generate() {
    let mut prog = exe("prog", &["main.c"]);
    prog.extra_keywords.push("shiny_new_option".into());
    let graph = graph(vec![prog]);
    let generation = generate(&graph, &test_env(), &toolchains()).expect("generate");

    assert!(
        generation
            .warnings
            .iter()
            .any(|w| w.message.contains("shiny_new_option"))
    );
    assert!(generation.edges.iter().any(|e| e.rule == "c_LINKER"));
}

#[rstest]
fn compile_commands_are_recorded_per_object() {
    let graph = graph(vec![exe("prog", &["main.c", "util.c"])]);
    let generation = generate(&graph, &test_env(), &toolchains()).expect("generate");

    assert_eq!(generation.compile_commands.len(), 2);
    assert!(
        generation
            .compile_commands
            .iter()
            .all(|c| c.directory == Utf8PathBuf::from("/work/build"))
    );
}

#[rstest]
fn installed_targets_join_the_manifest() {
    let mut lib = shared_lib("A", &["a.c"], Some("1.0.0"), None);
    lib.install = true;
    let graph = graph(vec![lib]);
    let generation = generate(&graph, &test_env(), &toolchains()).expect("generate");

    let record = generation.install.records.first().expect("install record");
    assert_eq!(record.dest_dir, Utf8PathBuf::from("lib"));
    assert_eq!(record.source, Utf8PathBuf::from("libA.so.1.0.0"));
    assert_eq!(record.aliases, vec!["libA.so.1".to_owned(), "libA.so".to_owned()]);
}
