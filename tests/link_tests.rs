//! Link-planning tests.

mod common;

use camino::Utf8PathBuf;
use rstest::rstest;

use common::{exe, gcc, graph, shared_lib, test_env, toolchains};
use daiku::link::{LinkInputs, link_args};
use daiku::options::BuildType;
use daiku::resolve::Resolver;
use daiku::target::{Dependency, ExternalDependency};
use daiku::toolchain::Language;

#[rstest]
fn buildtype_linker_args_come_first() {
    let mut prog = exe("prog", &["main.c"]);
    prog.options.buildtype = BuildType::Release;
    prog.link_args.push("-Wl,--as-needed".into());
    let graph = graph(vec![prog]);
    let env = test_env();
    let tools = toolchains();
    let resolver = Resolver::new(&graph, &env, &tools);
    let target = graph.get("prog@exe").expect("target");

    let plan = link_args(&resolver, target, &gcc(Language::C), &LinkInputs::default())
        .expect("link args");
    let tokens = plan.to_vec();
    assert_eq!(tokens.first().map(String::as_str), Some("-Wl,-O1"));
}

#[rstest]
fn shared_library_links_with_soname_and_pic() {
    let lib = shared_lib("A", &["a.c"], Some("2.1.0"), Some("2"));
    let graph = graph(vec![lib]);
    let env = test_env();
    let tools = toolchains();
    let resolver = Resolver::new(&graph, &env, &tools);
    let target = graph.get("A@sha").expect("target");

    let plan = link_args(&resolver, target, &gcc(Language::C), &LinkInputs::default())
        .expect("link args");
    let tokens = plan.to_vec();
    assert!(tokens.contains(&"-shared".to_owned()));
    assert!(tokens.contains(&"-fPIC".to_owned()));
    assert!(tokens.contains(&"-Wl,-soname,libA.so.2".to_owned()));
}

#[rstest]
fn rpath_is_origin_relative_and_padded() {
    let mut lib = shared_lib("A", &["a.c"], None, None);
    lib.subdir = "sub".into();
    let mut prog = exe("prog", &["main.c"]);
    prog.link_with.push("A@sha".into());
    prog.install_rpath = "/opt/app/lib/quite/long/path".into();
    let graph = graph(vec![lib, prog]);
    let env = test_env();
    let tools = toolchains();
    let resolver = Resolver::new(&graph, &env, &tools);
    let target = graph.get("prog@exe").expect("target");

    let plan = link_args(&resolver, target, &gcc(Language::C), &LinkInputs::default())
        .expect("link args");
    let rpath = plan
        .to_vec()
        .into_iter()
        .find(|t| t.starts_with("-Wl,-rpath,"))
        .expect("rpath argument");
    assert!(rpath.contains("$ORIGIN/sub"));
    let value = rpath.trim_start_matches("-Wl,-rpath,");
    assert_eq!(
        value.len(),
        "/opt/app/lib/quite/long/path".len(),
        "build rpath must be padded to the install rpath's length"
    );
}

#[rstest]
fn thread_dependency_pulls_thread_flags() {
    let mut prog = exe("prog", &["main.c"]);
    prog.dependencies
        .push(Dependency::External(ExternalDependency {
            name: "threads".into(),
            compile_args: Vec::new(),
            link_args: Vec::new(),
            is_threads: true,
        }));
    let graph = graph(vec![prog]);
    let env = test_env();
    let tools = toolchains();
    let resolver = Resolver::new(&graph, &env, &tools);
    let target = graph.get("prog@exe").expect("target");

    let plan = link_args(&resolver, target, &gcc(Language::C), &LinkInputs::default())
        .expect("link args");
    assert!(plan.to_vec().contains(&"-pthread".to_owned()));
}

#[rstest]
fn environment_link_args_apply_to_native_targets() {
    let mut env = test_env();
    env.env_link_args
        .insert(Language::C, vec!["-Wl,--icf=all".into()]);
    let graph = graph(vec![exe("prog", &["main.c"])]);
    let tools = toolchains();
    let resolver = Resolver::new(&graph, &env, &tools);
    let target = graph.get("prog@exe").expect("target");

    let plan = link_args(&resolver, target, &gcc(Language::C), &LinkInputs::default())
        .expect("link args");
    assert!(plan.to_vec().contains(&"-Wl,--icf=all".to_owned()));
}

#[rstest]
fn caller_extras_and_custom_libs_come_last() {
    let graph = graph(vec![exe("prog", &["main.c"])]);
    let env = test_env();
    let tools = toolchains();
    let resolver = Resolver::new(&graph, &env, &tools);
    let target = graph.get("prog@exe").expect("target");

    let extras = vec!["-Wl,-z,defs".to_owned()];
    let custom_libs = vec![Utf8PathBuf::from("gen/libplugin.a")];
    let plan = link_args(
        &resolver,
        target,
        &gcc(Language::C),
        &LinkInputs {
            extra_args: &extras,
            custom_target_libs: &custom_libs,
        },
    )
    .expect("link args");
    let tokens = plan.to_vec();
    assert_eq!(tokens.last().map(String::as_str), Some("gen/libplugin.a"));
    let extra_pos = tokens.iter().position(|t| t == "-Wl,-z,defs");
    let lib_pos = tokens.iter().position(|t| t == "gen/libplugin.a");
    assert!(extra_pos < lib_pos);
}
