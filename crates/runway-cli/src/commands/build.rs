use std::path::Path;

use runway_cloud::{
    BuildOrchestrator, BuildPreference, DockerBuilder, HttpBuildService, OrchestratorError,
};
use runway_core::{FrameworkRegistry, RunwayConfig};
use tokio_util::sync::CancellationToken;

use super::load_task;

const API_KEY_ENV: &str = "RUNWAY_API_KEY";

/// Build the task image and print the resulting reference.
pub async fn build(
    file: &Path,
    local: bool,
    frameworks: &FrameworkRegistry,
) -> anyhow::Result<()> {
    let task = load_task(file)?;
    let mut config = RunwayConfig::load(&task.root)?;
    if let Some(key) = std::env::var(API_KEY_ENV)
        // arch-lint: allow(no-silent-result-drop) reason="an unset key falls back to runway.toml"
        .ok()
        .filter(|k| !k.is_empty())
    {
        config.api.api_key = Some(key);
    }

    let preference = if local || config.build.local {
        BuildPreference::Local
    } else {
        BuildPreference::Remote
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("interrupt received, cancelling build");
                on_signal.cancel();
            }
            Err(e) => tracing::warn!(error = %e, "cannot listen for interrupts"),
        }
    });

    let orchestrator = BuildOrchestrator::new(
        HttpBuildService::new(&config.api),
        DockerBuilder::new(&config.build.docker_bin),
        frameworks,
        config.build.clone(),
    );

    match preference {
        BuildPreference::Local => println!("Building {} locally...", task.request.slug),
        BuildPreference::Remote => println!(
            "Building {} with {}...",
            task.request.slug, config.api.endpoint
        ),
    }

    let result = orchestrator
        .run(&task.root, &task.request, preference, &cancel, |entry| {
            println!("[build] {}", entry.text);
        })
        .await;

    match result {
        Ok(output) => {
            if let Some(id) = &output.build_id {
                println!("Build {id} succeeded");
            }
            match &output.image {
                Some(image) => println!("Image: {image}"),
                None => println!("Build finished without an image reference"),
            }
            Ok(())
        }
        Err(OrchestratorError::NoBuildNeeded { image, command }) => {
            println!("No build needed: {} uses a pre-built image", task.request.slug);
            if let Some(image) = image {
                println!("Image: {image}");
            }
            if !command.is_empty() {
                println!("Command: {}", command.join(" "));
            }
            Ok(())
        }
        Err(OrchestratorError::Cancelled) => anyhow::bail!("build cancelled"),
        Err(e) => Err(e.into()),
    }
}
