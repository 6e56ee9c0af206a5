use std::path::Path;

use runway_core::{Base, BuildRecipe, Instruction, Options};
use serde_json::{Map, Value, json};

use super::{SynthError, WORKDIR, entrypoint, generated, has_file, option, require_file};

pub const DEFAULT_NODE_VERSION: &str = "15";

/// Pinned images for the major versions we know about.
static NODE_IMAGES: &[(&str, &str)] = &[
    ("12", "node:12.22.1-buster"),
    ("14", "node:14.17.0-buster"),
    ("15", "node:15.14.0-buster"),
    ("16", "node:16.2.0-buster"),
];

const LANGUAGES: &[&str] = &["typescript", "javascript"];

const TYPESCRIPT_VERSION: &str = "4.2";

const SHIM_TEMPLATE: &str = include_str!("shims/node_shim.ts");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Language {
    TypeScript,
    JavaScript,
}

/// Base image for a Node version; versions not in the table pass through.
pub fn node_base_image(version: &str) -> String {
    NODE_IMAGES
        .iter()
        .find(|(v, _)| *v == version)
        .map(|(_, image)| (*image).to_owned())
        .unwrap_or_else(|| format!("node:{version}-buster"))
}

pub(super) fn synthesize(root: &Path, options: &Options) -> Result<BuildRecipe, SynthError> {
    let entry = entrypoint(options, "main.ts");
    require_file(root, &entry)?;
    let language = language(options, &entry)?;
    let version = option(options, "nodeVersion", DEFAULT_NODE_VERSION);

    let mut recipe = BuildRecipe::new(Base::Image(node_base_image(version)));
    recipe
        .push(Instruction::Workdir(WORKDIR.to_owned()))
        .push(Instruction::Arg("BUILD_NPM_RC".to_owned()))
        .push(Instruction::Arg("BUILD_NPM_TOKEN".to_owned()))
        .push(Instruction::run(
            r#"[ -z "${BUILD_NPM_RC}" ] || echo "${BUILD_NPM_RC}" > .npmrc"#,
        ))
        .push(Instruction::run(
            r#"[ -z "${BUILD_NPM_TOKEN}" ] || echo "//registry.npmjs.org/:_authToken=${BUILD_NPM_TOKEN}" > .npmrc"#,
        ));

    if language == Language::TypeScript {
        recipe.push(Instruction::run(format!(
            "npm install -g typescript@{TYPESCRIPT_VERSION}"
        )));
    }

    if has_file(root, "package.json") {
        recipe.push(Instruction::copy("package.json", "."));
    } else {
        recipe.push(Instruction::run("echo '{}' > package.json"));
    }

    if has_file(root, "package-lock.json") {
        recipe
            .push(Instruction::copy("package-lock.json", "."))
            .push(Instruction::run("npm ci"));
    } else if has_file(root, "yarn.lock") {
        recipe
            .push(Instruction::copy("yarn.lock", "."))
            .push(Instruction::run("yarn install --frozen-lockfile"));
    } else {
        tracing::debug!(root = %root.display(), "no lockfile; skipping dependency install");
    }

    recipe.push(Instruction::copy(".", "."));

    match language {
        Language::TypeScript => {
            let tsconfig = generated("tsconfig.json");
            recipe
                .inject(generated("shim.ts"), render_shim(&entry))
                .inject(tsconfig.clone(), ts_config(root, version)?)
                .push(Instruction::run(format!("tsc --project {tsconfig}")));
            recipe.entrypoint = vec![
                "node".to_owned(),
                format!("{WORKDIR}/{}", generated("dist/.runway/shim.js")),
            ];
        }
        Language::JavaScript => {
            recipe.entrypoint = vec!["node".to_owned(), format!("{WORKDIR}/{entry}")];
        }
    }
    Ok(recipe)
}

fn language(options: &Options, entry: &str) -> Result<Language, SynthError> {
    match options.get("language").map(|v| v.trim()) {
        Some("typescript") => Ok(Language::TypeScript),
        Some("javascript") => Ok(Language::JavaScript),
        Some(other) if !other.is_empty() => Err(SynthError::UnsupportedOption {
            key: "language",
            value: other.to_owned(),
            expected: LANGUAGES,
        }),
        _ => {
            let is_js = [".js", ".mjs", ".cjs"].iter().any(|ext| entry.ends_with(ext));
            Ok(if is_js {
                Language::JavaScript
            } else {
                Language::TypeScript
            })
        }
    }
}

/// The shim lives in `.runway/`, so the import climbs one level and drops
/// the source extension.
fn render_shim(entry: &str) -> String {
    let module = [".tsx", ".ts", ".mjs", ".cjs", ".js"]
        .iter()
        .find_map(|ext| entry.strip_suffix(ext))
        .unwrap_or(entry);
    SHIM_TEMPLATE.replace("{{entrypoint}}", &format!("../{module}"))
}

/// Compiler options filled in when the user leaves them unset.
fn default_compiler_options(version: &str) -> [(&'static str, Value); 6] {
    let major = version.split('.').next().unwrap_or(version);
    let target = if major == "12" { "es2019" } else { "es2020" };
    [
        ("allowJs", json!(true)),
        ("esModuleInterop", json!(true)),
        ("lib", json!([target, "dom"])),
        ("module", json!("commonjs")),
        ("skipLibCheck", json!(true)),
        ("target", json!(target)),
    ]
}

fn ts_config(root: &Path, version: &str) -> Result<Vec<u8>, SynthError> {
    let mut config = Map::new();
    let mut user_options = Map::new();

    let user_path = root.join("tsconfig.json");
    if user_path.is_file() {
        let raw = std::fs::read(&user_path).map_err(|e| SynthError::Read {
            path: user_path.clone(),
            source: e,
        })?;
        let parsed: Value = serde_json::from_slice(&raw).map_err(|e| SynthError::ParseJson {
            path: user_path.clone(),
            source: e,
        })?;
        let Value::Object(user) = parsed else {
            return Err(SynthError::NotAnObject { path: user_path });
        };
        if let Some(Value::Object(options)) = user.get("compilerOptions") {
            user_options = options.clone();
        }
        config.insert("extends".to_owned(), json!("../tsconfig.json"));
    }

    let mut compiler = Map::new();
    for (key, value) in default_compiler_options(version) {
        if !user_options.contains_key(key) {
            compiler.insert(key.to_owned(), value);
        }
    }
    compiler.insert("outDir".to_owned(), json!("./dist"));
    compiler.insert("rootDir".to_owned(), json!(".."));

    config.insert("compilerOptions".to_owned(), Value::Object(compiler));
    config.insert("files".to_owned(), json!(["./shim.ts"]));

    serde_json::to_vec_pretty(&Value::Object(config)).map_err(|e| SynthError::Render {
        name: generated("tsconfig.json"),
        source: e,
    })
}
