//! Tests for per-target flag resolution.

mod common;

use camino::Utf8PathBuf;
use rstest::rstest;

use common::{exe, gcc, graph, shared_lib, static_lib, test_env, toolchains};
use daiku::generate::GenError;
use daiku::resolve::Resolver;
use daiku::target::{Dependency, ExternalDependency, IncludeDirs, TargetKind};
use daiku::toolchain::{Language, Machine};

fn external(name: &str, compile: &[&str], link: &[&str]) -> Dependency {
    Dependency::External(ExternalDependency {
        name: name.into(),
        compile_args: compile.iter().map(|s| (*s).to_owned()).collect(),
        link_args: link.iter().map(|s| (*s).to_owned()).collect(),
        is_threads: false,
    })
}

#[rstest]
fn private_include_dir_comes_last() {
    let mut prog = exe("prog", &["main.c"]);
    prog.include_dirs.push(IncludeDirs {
        curdir: Utf8PathBuf::new(),
        dirs: vec!["include".into()],
        is_system: false,
    });
    let graph = graph(vec![prog]);
    let env = test_env();
    let tools = toolchains();
    let resolver = Resolver::new(&graph, &env, &tools);
    let target = graph.get("prog@exe").expect("target");

    let args = resolver
        .compile_args(target, &gcc(Language::C))
        .expect("compile args");
    let tokens = args.to_vec();
    let includes: Vec<&String> = tokens.iter().filter(|t| t.starts_with("-I")).collect();
    assert_eq!(
        includes.last().map(|s| s.as_str()),
        Some("-Iprog@exe"),
        "private scratch dir must be the last include path"
    );
    let source_inc = tokens.iter().position(|t| t == "-I../src/include");
    let build_inc = tokens.iter().position(|t| t == "-Iinclude");
    assert!(
        source_inc < build_inc,
        "source include dir must precede its build-tree mirror"
    );
}

#[rstest]
fn external_dependency_order_is_preserved() {
    let mut prog = exe("prog", &["main.c"]);
    prog.dependencies
        .push(external("zlib", &[], &["-L/opt/z", "-lz"]));
    prog.dependencies
        .push(external("png", &[], &["-L/opt/png", "-lpng"]));
    let graph = graph(vec![prog]);
    let env = test_env();
    let tools = toolchains();
    let resolver = Resolver::new(&graph, &env, &tools);
    let target = graph.get("prog@exe").expect("target");

    let plan = daiku::link::link_args(
        &resolver,
        target,
        &gcc(Language::C),
        &daiku::link::LinkInputs::default(),
    )
    .expect("link args");
    let tokens = plan.to_vec();
    let zdir = tokens.iter().position(|t| t == "-L/opt/z");
    let zlib = tokens.iter().position(|t| t == "-lz");
    let pdir = tokens.iter().position(|t| t == "-L/opt/png");
    assert_eq!(zdir.map(|i| i + 1), zlib, "-L/-l adjacency must survive");
    assert!(zlib < pdir, "dependencies must stay in declaration order");
}

#[rstest]
fn static_library_externals_reach_dependents() {
    let mut lib = static_lib("util", &["util.c"]);
    lib.dependencies.push(external("m", &[], &["-lm"]));
    let mut prog = exe("prog", &["main.c"]);
    prog.link_with.push("util@sta".into());
    let graph = graph(vec![lib, prog]);
    let env = test_env();
    let tools = toolchains();
    let resolver = Resolver::new(&graph, &env, &tools);
    let target = graph.get("prog@exe").expect("target");

    let args = resolver
        .dependency_link_args(target, &gcc(Language::C))
        .expect("link args");
    assert!(args.contains(&"libutil.a".to_owned()));
    assert!(args.contains(&"-lm".to_owned()));
}

#[rstest]
fn cross_native_link_mix_is_fatal() {
    let mut lib = static_lib("util", &["util.c"]);
    lib.machine = Machine::Cross;
    let mut prog = exe("prog", &["main.c"]);
    prog.link_with.push("util@sta".into());
    let graph = graph(vec![lib, prog]);
    let env = test_env();
    let tools = toolchains();
    let resolver = Resolver::new(&graph, &env, &tools);
    let target = graph.get("prog@exe").expect("target");

    let err = resolver.validate_links(target).expect_err("must fail");
    assert!(matches!(err, GenError::CrossNativeMix { .. }));
}

#[rstest]
fn non_pic_static_into_shared_is_fatal() {
    let mut lib = static_lib("util", &["util.c"]);
    lib.kind = TargetKind::StaticLibrary { pic: false };
    let mut shared = shared_lib("wrap", &["wrap.c"], None, None);
    shared.link_with.push("util@sta".into());
    let graph = graph(vec![lib, shared]);
    let env = test_env();
    let tools = toolchains();
    let resolver = Resolver::new(&graph, &env, &tools);
    let target = graph.get("wrap@sha").expect("target");

    let err = resolver.validate_links(target).expect_err("must fail");
    assert!(matches!(err, GenError::NonPicStaticIntoShared { .. }));
}

#[rstest]
fn linker_prefers_cpp_when_sources_mix() {
    let prog = exe("prog", &["main.c", "ui.cpp"]);
    let graph = graph(vec![prog]);
    let env = test_env();
    let tools = toolchains();
    let resolver = Resolver::new(&graph, &env, &tools);
    let target = graph.get("prog@exe").expect("target");

    let linker = resolver.linker_for(target).expect("linker");
    assert_eq!(linker.language, Language::Cpp);
}
