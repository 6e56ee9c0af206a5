use std::path::Path;

use runway_core::{Base, BuildRecipe, Instruction, Options};

use super::{SynthError, WORKDIR, entrypoint, generated, has_file, require_file};

pub const DEFAULT_SHELL_IMAGE: &str = "ubuntu:22.04";

/// Installed on the default shell image.
pub const DEFAULT_SHELL_PACKAGES: &[&str] = &[
    "apt-utils",
    "openssh-client",
    "gnupg2",
    "iproute2",
    "procps",
    "lsof",
    "htop",
    "net-tools",
    "curl",
    "wget",
    "ca-certificates",
    "unzip",
    "zip",
    "nano",
    "vim-tiny",
    "less",
    "jq",
    "lsb-release",
    "apt-transport-https",
    "dialog",
    "zlib1g",
    "locales",
    "strace",
];

const SHIM_TEMPLATE: &str = include_str!("shims/shell_shim.sh");

pub(super) fn synthesize(root: &Path, options: &Options) -> Result<BuildRecipe, SynthError> {
    let entry = entrypoint(options, "");
    if entry.is_empty() {
        return Err(SynthError::MissingOption { key: "entrypoint" });
    }
    require_file(root, &entry)?;

    let mut recipe = BuildRecipe::new(base(root, options)?);
    if recipe.base_image().is_some() {
        recipe.push(Instruction::run(install_packages()));
    }

    let shim = generated("shim.sh");
    recipe
        .inject(shim.clone(), SHIM_TEMPLATE.replace("{{entrypoint}}", &format!("./{entry}")))
        .push(Instruction::Workdir(WORKDIR.to_owned()))
        .push(Instruction::copy(".", "."))
        .push(Instruction::run(format!("chmod +x {entry}")));
    recipe.entrypoint = vec!["bash".to_owned(), shim];
    Ok(recipe)
}

fn base(root: &Path, options: &Options) -> Result<Base, SynthError> {
    let dockerfile = match options.get("dockerfile").map(|v| v.trim()) {
        Some(path) if !path.is_empty() => path.to_owned(),
        _ if has_file(root, "Dockerfile") => "Dockerfile".to_owned(),
        _ => {
            tracing::info!(
                root = %root.display(),
                image = DEFAULT_SHELL_IMAGE,
                "no Dockerfile found; using the default shell image"
            );
            return Ok(Base::Image(DEFAULT_SHELL_IMAGE.to_owned()));
        }
    };

    let path = require_file(root, &dockerfile)?;
    tracing::info!(path = %path.display(), "using Dockerfile as the base for the shell task");
    let contents = std::fs::read_to_string(&path).map_err(|e| SynthError::Read {
        path: path.clone(),
        source: e,
    })?;
    Ok(Base::Dockerfile {
        path: dockerfile,
        contents,
    })
}

fn install_packages() -> String {
    format!(
        "apt-get update && export DEBIAN_FRONTEND=noninteractive \
         && apt-get -y install --no-install-recommends {} \
         && apt-get autoremove -y && apt-get clean -y && rm -rf /var/lib/apt/lists/*",
        DEFAULT_SHELL_PACKAGES.join(" ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_command_lists_every_package() {
        let cmd = install_packages();
        for package in DEFAULT_SHELL_PACKAGES {
            assert!(cmd.contains(package), "missing {package}");
        }
        assert!(cmd.starts_with("apt-get update"));
    }

    #[test]
    fn shim_execs_entrypoint_relative_to_workdir() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("run.sh"), "echo hi").unwrap();
        let mut options = Options::new();
        options.insert("entrypoint".to_owned(), "run.sh".to_owned());

        let recipe = synthesize(tmp.path(), &options).unwrap();
        let shim = String::from_utf8(recipe.injected_files[".runway/shim.sh"].clone()).unwrap();
        assert!(shim.contains(r#"exec "./run.sh""#));
        assert!(shim.contains(super::super::ERROR_OUTPUT_MARKER));
    }
}
