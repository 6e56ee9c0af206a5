use std::path::Path;

use runway_build::{BuildContext, DockerfileRenderer, SynthError, Synthesize, synthesize};
use runway_core::{Base, BuildRecipe, Instruction, Options, RuntimeKind};
use tempfile::TempDir;

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

fn opts(pairs: &[(&str, &str)]) -> Options {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn runs(recipe: &BuildRecipe) -> Vec<&str> {
    recipe
        .instructions
        .iter()
        .filter_map(|i| match i {
            Instruction::Run(cmd) => Some(cmd.as_str()),
            _ => None,
        })
        .collect()
}

fn position(recipe: &BuildRecipe, wanted: &Instruction) -> usize {
    recipe
        .instructions
        .iter()
        .position(|i| i == wanted)
        .unwrap_or_else(|| panic!("{wanted:?} not in recipe"))
}

// ── Node ──

#[test]
fn node_typescript_with_package_lock() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "main.ts", "export default async () => {}");
    write(tmp.path(), "package.json", "{}");
    write(tmp.path(), "package-lock.json", "{}");

    let recipe = synthesize(
        tmp.path(),
        RuntimeKind::Node,
        &opts(&[("entrypoint", "main.ts"), ("language", "typescript")]),
    )
    .unwrap();

    assert_eq!(recipe.base_image(), Some("node:15.14.0-buster"));

    let commands = runs(&recipe);
    assert_eq!(commands.iter().filter(|c| c.contains("npm ci")).count(), 1);
    assert!(!commands.iter().any(|c| c.contains("yarn")));

    let configs: Vec<_> = recipe
        .injected_files
        .keys()
        .filter(|k| k.ends_with("tsconfig.json"))
        .collect();
    assert_eq!(configs, vec![".runway/tsconfig.json"]);
    assert!(recipe.injected_files.contains_key(".runway/shim.ts"));

    assert_eq!(
        recipe.entrypoint,
        vec!["node", "/runway/.runway/dist/.runway/shim.js"]
    );
}

#[test]
fn node_copies_manifest_and_lockfile_before_install() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "main.ts", "");
    write(tmp.path(), "package.json", "{}");
    write(tmp.path(), "package-lock.json", "{}");

    let recipe = synthesize(tmp.path(), RuntimeKind::Node, &Options::new()).unwrap();

    let manifest = position(&recipe, &Instruction::copy("package.json", "."));
    let lock = position(&recipe, &Instruction::copy("package-lock.json", "."));
    let install = position(&recipe, &Instruction::run("npm ci"));
    let source = position(&recipe, &Instruction::copy(".", "."));
    assert!(manifest < install && lock < install && install < source);
}

#[test]
fn node_uses_yarn_without_package_lock() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "main.js", "module.exports = async () => {}");
    write(tmp.path(), "package.json", "{}");
    write(tmp.path(), "yarn.lock", "");

    let recipe = synthesize(
        tmp.path(),
        RuntimeKind::Node,
        &opts(&[("entrypoint", "main.js")]),
    )
    .unwrap();

    let commands = runs(&recipe);
    assert!(commands.contains(&"yarn install --frozen-lockfile"));
    assert!(!commands.iter().any(|c| c.contains("npm ci")));
    assert!(!commands.iter().any(|c| c.contains("typescript")));
    assert!(recipe.injected_files.is_empty());
    assert_eq!(recipe.entrypoint, vec!["node", "/runway/main.js"]);
}

#[test]
fn node_without_manifest_writes_empty_one() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "main.ts", "");

    let recipe = synthesize(tmp.path(), RuntimeKind::Node, &Options::new()).unwrap();
    let commands = runs(&recipe);

    assert!(commands.contains(&"echo '{}' > package.json"));
    assert!(!commands.iter().any(|c| c.contains("npm ci") || c.contains("yarn")));
}

#[test]
fn node_supports_private_registry_args() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "main.ts", "");

    let recipe = synthesize(tmp.path(), RuntimeKind::Node, &Options::new()).unwrap();
    assert!(recipe
        .instructions
        .contains(&Instruction::Arg("BUILD_NPM_TOKEN".to_owned())));
    assert!(recipe
        .instructions
        .contains(&Instruction::Arg("BUILD_NPM_RC".to_owned())));
}

#[test]
fn node_version_selects_base_image() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "main.ts", "");

    let recipe = synthesize(
        tmp.path(),
        RuntimeKind::Node,
        &opts(&[("nodeVersion", "12")]),
    )
    .unwrap();
    assert_eq!(recipe.base_image(), Some("node:12.22.1-buster"));

    let tsconfig: serde_json::Value =
        serde_json::from_slice(&recipe.injected_files[".runway/tsconfig.json"]).unwrap();
    assert_eq!(tsconfig["compilerOptions"]["target"], "es2019");
}

#[test]
fn node_user_tsconfig_is_extended() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "main.ts", "");
    write(
        tmp.path(),
        "tsconfig.json",
        r#"{"compilerOptions": {"strict": true, "target": "es2018"}}"#,
    );

    let recipe = synthesize(tmp.path(), RuntimeKind::Node, &Options::new()).unwrap();
    let tsconfig: serde_json::Value =
        serde_json::from_slice(&recipe.injected_files[".runway/tsconfig.json"]).unwrap();

    assert_eq!(tsconfig["extends"], "../tsconfig.json");
    assert!(tsconfig["compilerOptions"].get("target").is_none());
    assert!(tsconfig["compilerOptions"].get("strict").is_none());
    assert_eq!(tsconfig["compilerOptions"]["module"], "commonjs");
}

#[test]
fn node_missing_entrypoint() {
    let tmp = TempDir::new().unwrap();

    let err = synthesize(tmp.path(), RuntimeKind::Node, &Options::new()).unwrap_err();
    match err {
        SynthError::MissingFile { path } => assert_eq!(path, tmp.path().join("main.ts")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn node_unsupported_language() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "main.ts", "");

    let err = synthesize(
        tmp.path(),
        RuntimeKind::Node,
        &opts(&[("language", "elm")]),
    )
    .unwrap_err();
    assert!(
        matches!(err, SynthError::UnsupportedOption { key: "language", ref value, .. } if value == "elm")
    );
}

// ── Python ──

#[test]
fn python_installs_requirements_before_copying_source() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "main.py", "");
    write(tmp.path(), "requirements.txt", "");

    let recipe = RuntimeKind::Python
        .synthesize(tmp.path(), &Options::new())
        .unwrap();

    assert_eq!(recipe.base_image(), Some("python:3.9.1-buster"));
    assert_eq!(
        recipe.instructions,
        vec![
            Instruction::Workdir("/runway".to_owned()),
            Instruction::copy("requirements.txt", "."),
            Instruction::run("pip install -r requirements.txt"),
            Instruction::copy(".", "."),
        ]
    );
    assert_eq!(recipe.entrypoint, vec!["python", "main.py"]);
}

#[test]
fn python_requires_requirements_file() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "main.py", "");

    let err = synthesize(tmp.path(), RuntimeKind::Python, &Options::new()).unwrap_err();
    match err {
        SynthError::MissingFile { path } => {
            assert_eq!(path, tmp.path().join("requirements.txt"))
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

// ── Deno ──

#[test]
fn deno_caches_then_drops_privileges() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "task.ts", "");

    let recipe = synthesize(
        tmp.path(),
        RuntimeKind::Deno,
        &opts(&[("entrypoint", "task.ts")]),
    )
    .unwrap();

    let cache = position(&recipe, &Instruction::run("deno cache task.ts"));
    let user = position(&recipe, &Instruction::User("deno".to_owned()));
    assert!(cache < user);
    assert_eq!(recipe.entrypoint, vec!["deno", "run", "-A", "task.ts"]);
}

// ── Shell ──

#[test]
fn shell_defaults_to_ubuntu_with_packages() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "run.sh", "echo hi");

    let recipe = synthesize(
        tmp.path(),
        RuntimeKind::Shell,
        &opts(&[("entrypoint", "run.sh")]),
    )
    .unwrap();

    assert_eq!(recipe.base_image(), Some("ubuntu:22.04"));
    assert!(runs(&recipe)[0].contains("jq"));
    assert!(runs(&recipe).contains(&"chmod +x run.sh"));
    assert_eq!(recipe.entrypoint, vec!["bash", ".runway/shim.sh"]);
}

#[test]
fn shell_discovers_root_dockerfile() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "run.sh", "echo hi");
    write(tmp.path(), "Dockerfile", "FROM alpine:3.13\nRUN apk add bash\n");

    let recipe = synthesize(
        tmp.path(),
        RuntimeKind::Shell,
        &opts(&[("entrypoint", "run.sh")]),
    )
    .unwrap();

    assert_eq!(recipe.base_image(), None);
    assert_eq!(
        recipe.base,
        Base::Dockerfile {
            path: "Dockerfile".to_owned(),
            contents: "FROM alpine:3.13\nRUN apk add bash\n".to_owned(),
        }
    );
    assert!(!runs(&recipe).iter().any(|c| c.contains("apt-get")));

    let rendered = DockerfileRenderer::new(&recipe).render();
    assert!(rendered.starts_with("FROM alpine:3.13\nRUN apk add bash\nWORKDIR /runway\n"));
}

#[test]
fn shell_explicit_dockerfile_must_exist() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "run.sh", "echo hi");

    let err = synthesize(
        tmp.path(),
        RuntimeKind::Shell,
        &opts(&[("entrypoint", "run.sh"), ("dockerfile", "docker/Task.Dockerfile")]),
    )
    .unwrap_err();
    match err {
        SynthError::MissingFile { path } => {
            assert_eq!(path, tmp.path().join("docker/Task.Dockerfile"))
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn shell_requires_entrypoint_option() {
    let tmp = TempDir::new().unwrap();
    let err = synthesize(tmp.path(), RuntimeKind::Shell, &Options::new()).unwrap_err();
    assert!(
        matches!(err, SynthError::MissingOption { key: "entrypoint" }),
        "got: {err:?}"
    );
    assert_eq!(err.to_string(), r#"option "entrypoint" is required"#);
}

#[test]
fn shell_requires_entrypoint_file() {
    let tmp = TempDir::new().unwrap();
    let err = synthesize(
        tmp.path(),
        RuntimeKind::Shell,
        &opts(&[("entrypoint", "run.sh")]),
    )
    .unwrap_err();
    match err {
        SynthError::MissingFile { path } => assert_eq!(path, tmp.path().join("run.sh")),
        other => panic!("unexpected error: {other:?}"),
    }
}

// ── Context ──

#[test]
fn context_adds_rendered_dockerfile() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "main.ts", "");

    let recipe = synthesize(tmp.path(), RuntimeKind::Node, &Options::new()).unwrap();
    let context = BuildContext::from_recipe(&recipe);

    let files: Vec<&str> = context.files().keys().map(String::as_str).collect();
    assert_eq!(
        files,
        vec![".runway/Dockerfile", ".runway/shim.ts", ".runway/tsconfig.json"]
    );
    assert!(context.dockerfile().starts_with("FROM node:15.14.0-buster\n"));
    assert!(
        context
            .dockerfile()
            .ends_with("ENTRYPOINT [\"node\", \"/runway/.runway/dist/.runway/shim.js\"]\n")
    );
}

// ── Determinism ──

mod determinism {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn node_recipes_are_deterministic(
            version in prop_oneof![Just("12"), Just("14"), Just("15"), Just("16"), Just("18.2.0")],
            typescript in any::<bool>(),
            has_lock in any::<bool>(),
            has_yarn in any::<bool>(),
            has_tsconfig in any::<bool>(),
        ) {
            let tmp = TempDir::new().unwrap();
            let entry = if typescript { "main.ts" } else { "main.js" };
            write(tmp.path(), entry, "");
            if has_lock { write(tmp.path(), "package-lock.json", "{}"); }
            if has_yarn { write(tmp.path(), "yarn.lock", ""); }
            if has_tsconfig { write(tmp.path(), "tsconfig.json", r#"{"compilerOptions": {}}"#); }

            let options = opts(&[("entrypoint", entry), ("nodeVersion", version)]);
            let first = synthesize(tmp.path(), RuntimeKind::Node, &options).unwrap();
            let second = synthesize(tmp.path(), RuntimeKind::Node, &options).unwrap();
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(
                DockerfileRenderer::new(&first).render(),
                DockerfileRenderer::new(&second).render()
            );

            let installs = runs(&first)
                .iter()
                .filter(|c| c.contains("npm ci") || c.contains("yarn install"))
                .count();
            prop_assert_eq!(installs, usize::from(has_lock || has_yarn));
        }

        #[test]
        fn other_runtimes_are_deterministic(
            kind in prop_oneof![
                Just(RuntimeKind::Python),
                Just(RuntimeKind::Deno),
                Just(RuntimeKind::Shell),
            ],
            dockerfile in prop_oneof![
                Just(None),
                Just(Some("Dockerfile")),
                Just(Some("build/Dockerfile")),
            ],
            nested_entry in any::<bool>(),
        ) {
            let tmp = TempDir::new().unwrap();
            let entry = match (kind, nested_entry) {
                (RuntimeKind::Python, false) => "main.py",
                (RuntimeKind::Python, true) => "src/main.py",
                (RuntimeKind::Deno, false) => "main.ts",
                (RuntimeKind::Deno, true) => "src/main.ts",
                (_, false) => "run.sh",
                (_, true) => "scripts/run.sh",
            };
            write(tmp.path(), entry, "");
            write(tmp.path(), "requirements.txt", "");

            let mut options = opts(&[("entrypoint", entry)]);
            if let Some(path) = dockerfile {
                write(tmp.path(), path, "FROM alpine:3.14\nRUN apk add --no-cache bash jq\n");
                if path != "Dockerfile" {
                    options.insert("dockerfile".to_owned(), path.to_owned());
                }
            }

            let first = synthesize(tmp.path(), kind, &options).unwrap();
            let second = synthesize(tmp.path(), kind, &options).unwrap();
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(
                DockerfileRenderer::new(&first).render(),
                DockerfileRenderer::new(&second).render()
            );
            let first_ctx = BuildContext::from_recipe(&first);
            let second_ctx = BuildContext::from_recipe(&second);
            prop_assert_eq!(first_ctx.files(), second_ctx.files());
        }
    }
}
