use serde::{Deserialize, Serialize};

/// runway.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunwayConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub build: BuildConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the build service
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// API key sent with every request (overridden by `RUNWAY_API_KEY`)
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Build with the local container engine instead of the build service
    #[serde(default)]
    pub local: bool,
    /// Interval between remote build status polls, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Container engine binary used for local builds
    #[serde(default = "default_docker_bin")]
    pub docker_bin: String,
    /// Repository prefix for locally built image tags
    #[serde(default = "default_image_repo")]
    pub image_repo: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            local: false,
            poll_interval_ms: default_poll_interval_ms(),
            docker_bin: default_docker_bin(),
            image_repo: default_image_repo(),
        }
    }
}

impl BuildConfig {
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms)
    }
}

impl RunwayConfig {
    /// Load from runway.toml in the given directory, or return defaults if not found.
    pub fn load(dir: &std::path::Path) -> crate::Result<Self> {
        let config_path = dir.join("runway.toml");
        if config_path.exists() {
            tracing::debug!(path = %config_path.display(), "loading config");
            let content =
                std::fs::read_to_string(&config_path).map_err(|e| crate::Error::ConfigLoad {
                    path: config_path.clone(),
                    source: e,
                })?;
            toml::from_str(&content).map_err(|e| crate::Error::ConfigParse {
                path: config_path,
                source: e,
            })
        } else {
            Ok(Self::default())
        }
    }
}

fn default_endpoint() -> String {
    "https://api.runway.dev".to_owned()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_docker_bin() -> String {
    "docker".to_owned()
}

fn default_image_repo() -> String {
    "runway".to_owned()
}
