use std::path::Path;

use runway_core::{Error, FrameworkRegistry, RuntimeKind, TaskDefinition};
use tempfile::TempDir;

fn write_definition(dir: &Path, yaml: &str) -> std::path::PathBuf {
    let path = dir.join("runway.task.yaml");
    std::fs::write(&path, yaml).unwrap();
    path
}

// ── Task definitions ──

#[test]
fn load_node_definition() {
    let tmp = TempDir::new().unwrap();
    let path = write_definition(
        tmp.path(),
        r#"
slug: hello_world
name: Hello world
node:
  entrypoint: main.ts
  language: typescript
  nodeVersion: 16
"#,
    );

    let def = TaskDefinition::load(&path).unwrap();
    let request = def.build_request().unwrap();

    assert_eq!(request.slug, "hello_world");
    assert_eq!(request.kind, RuntimeKind::Node);
    assert_eq!(request.options["entrypoint"], "main.ts");
    assert_eq!(request.options["language"], "typescript");
    // Numeric YAML scalars are accepted as option strings.
    assert_eq!(request.options["nodeVersion"], "16");
    assert!(request.image.is_none());
    assert!(request.command.is_empty());
}

#[test]
fn load_manual_definition_passes_image_through() {
    let tmp = TempDir::new().unwrap();
    let path = write_definition(
        tmp.path(),
        r#"
slug: prebuilt
manual:
  image: alpine:3.14
  command: ["echo", "hello"]
"#,
    );

    let request = TaskDefinition::load(&path)
        .unwrap()
        .build_request()
        .unwrap();

    assert_eq!(request.kind, RuntimeKind::Manual);
    assert!(!request.kind.needs_building());
    assert_eq!(request.image.as_deref(), Some("alpine:3.14"));
    assert_eq!(request.command, vec!["echo", "hello"]);
    assert!(request.options.is_empty());
}

#[test]
fn bare_runtime_section_uses_defaults() {
    let tmp = TempDir::new().unwrap();
    let path = write_definition(tmp.path(), "slug: hello\ndeno:\n");

    let request = TaskDefinition::load(&path)
        .unwrap()
        .build_request()
        .unwrap();

    assert_eq!(request.kind, RuntimeKind::Deno);
    assert!(request.options.is_empty());
}

#[test]
fn bare_sections_still_count_as_runtimes() {
    let tmp = TempDir::new().unwrap();
    let path = write_definition(tmp.path(), "slug: hello\ndeno:\npython:\n");

    let err = TaskDefinition::load(&path).unwrap_err();
    assert!(matches!(err, Error::MultipleRuntimes { .. }), "got: {err:?}");
}

#[test]
fn load_without_runtime_errors() {
    let tmp = TempDir::new().unwrap();
    let path = write_definition(tmp.path(), "slug: nothing\nname: Nothing\n");

    let err = TaskDefinition::load(&path).unwrap_err();
    assert!(matches!(err, Error::NoRuntime { .. }), "got: {err:?}");
}

#[test]
fn load_with_two_runtimes_errors() {
    let tmp = TempDir::new().unwrap();
    let path = write_definition(
        tmp.path(),
        r#"
slug: confused
python:
  entrypoint: main.py
deno:
  entrypoint: main.ts
"#,
    );

    let err = TaskDefinition::load(&path).unwrap_err();
    match err {
        Error::MultipleRuntimes { found, .. } => assert_eq!(found, vec!["python", "deno"]),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn load_missing_file_errors() {
    let tmp = TempDir::new().unwrap();
    let err = TaskDefinition::load(&tmp.path().join("nope.yaml")).unwrap_err();
    assert!(matches!(err, Error::DefinitionRead { .. }));
}

#[test]
fn nested_option_values_are_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = write_definition(
        tmp.path(),
        "slug: bad\nshell:\n  entrypoint:\n    nested: true\n",
    );

    let err = TaskDefinition::load(&path).unwrap_err();
    assert!(matches!(err, Error::DefinitionParse { .. }), "got: {err:?}");
}

#[test]
fn root_dir_defaults_to_definition_parent() {
    let def = TaskDefinition {
        slug: "t".to_owned(),
        ..Default::default()
    };
    assert_eq!(
        def.root_dir(Path::new("/work/tasks/t.yaml")),
        Path::new("/work/tasks")
    );
    assert_eq!(def.root_dir(Path::new("t.yaml")), Path::new("."));
}

#[test]
fn root_dir_is_relative_to_definition() {
    let def = TaskDefinition {
        slug: "t".to_owned(),
        root: Some("..".to_owned()),
        ..Default::default()
    };
    assert_eq!(
        def.root_dir(Path::new("/work/tasks/t.yaml")),
        Path::new("/work/tasks/..")
    );
}

// ── Runtime kinds ──

#[test]
fn runtime_kind_round_trips_through_str() {
    for kind in RuntimeKind::ALL {
        assert_eq!(kind.as_str().parse::<RuntimeKind>().unwrap(), kind);
    }
    assert!(matches!(
        "cobol".parse::<RuntimeKind>(),
        Err(Error::UnknownKind(k)) if k == "cobol"
    ));
}

#[test]
fn only_manual_skips_building() {
    let building: Vec<_> = RuntimeKind::ALL
        .into_iter()
        .filter(|k| k.needs_building())
        .collect();
    assert_eq!(
        building,
        vec![
            RuntimeKind::Node,
            RuntimeKind::Python,
            RuntimeKind::Deno,
            RuntimeKind::Shell
        ]
    );
}

// ── Frameworks ──

#[test]
fn default_registry_lists_django() {
    let registry = FrameworkRegistry::with_defaults();
    assert_eq!(registry.names(), vec!["django"]);
}

#[test]
fn registering_twice_errors() {
    let mut registry = FrameworkRegistry::with_defaults();
    let err = registry
        .register("django", runway_core::Django::open)
        .unwrap_err();
    assert!(matches!(err, Error::FrameworkRegistered(name) if name == "django"));
}

#[test]
fn open_unknown_framework_lists_known() {
    let registry = FrameworkRegistry::with_defaults();
    let err = registry.open("rails", Path::new(".")).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("rails"), "got: {msg}");
    assert!(msg.contains("django"), "got: {msg}");
}

#[test]
fn django_requires_manage_py() {
    let tmp = TempDir::new().unwrap();
    let registry = FrameworkRegistry::with_defaults();

    let err = registry.open("django", tmp.path()).unwrap_err();
    assert!(matches!(err, Error::FrameworkMissingFile { .. }));

    std::fs::write(tmp.path().join("manage.py"), "#!/usr/bin/env python\n").unwrap();
    let framework = registry.open("django", tmp.path()).unwrap();
    assert_eq!(framework.name(), "django");
}

#[test]
fn empty_registry_has_no_names() {
    assert!(FrameworkRegistry::new().names().is_empty());
}
