use serde::Deserialize;
use std::{env, path::PathBuf};

/// Cloud name used when the config file does not name one.
pub const DEFAULT_CLOUD_NAME: &str = "vitrine-demo";
/// Upload preset wired to the server-side moderation pipeline.
pub const DEFAULT_UPLOAD_PRESET: &str = "moderated-images";
/// Asset shown wherever a profile picture is needed but none was uploaded.
pub const DEFAULT_PROFILE_IMAGE: &str = "samples/people/smiling-man";
/// Product environment hosting user-generated review videos.
pub const DEFAULT_VIDEO_CLOUD_NAME: &str = "cld-demo-ugc";
/// Upload preset for review videos. Videos skip the moderation pipeline.
pub const DEFAULT_VIDEO_PRESET: &str = "ugc-video";
/// Moderation status endpoint of the companion backend.
pub const DEFAULT_MODERATION_ENDPOINT: &str = "http://localhost:3000/api/moderate";

#[derive(Debug, Default, Deserialize)]
pub struct VitrineConfig {
    pub cloud: Option<CloudConfigSection>,
    pub moderation: Option<ModerationConfigSection>,
    /// Scripted inputs for the headless demo driver.
    pub demo: Option<DemoConfigSection>,
}

#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

/// Product environment and upload widget settings.
///
/// ```toml
/// [cloud]
/// cloud_name = "my-cloud"
/// upload_preset = "moderated-images"
/// default_image = "samples/people/smiling-man"
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct CloudConfigSection {
    pub cloud_name: Option<String>,
    /// Preset applied to profile pictures and post attachments. The backend
    /// runs its moderation pipeline off this preset.
    pub upload_preset: Option<String>,
    pub default_image: Option<String>,
    /// Override the delivery host, mainly for tests.
    pub base_url: Option<String>,
    /// Separate environment for review videos.
    pub video_cloud_name: Option<String>,
    pub video_preset: Option<String>,
}

/// Moderation poll settings.
///
/// ```toml
/// [moderation]
/// endpoint = "http://localhost:3000/api/moderate"
/// timeout_secs = 60
/// interval_ms = 1000
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct ModerationConfigSection {
    /// Status endpoint. Supports `${ENV_VAR}` expansion.
    pub endpoint: Option<String>,
    /// Give up after this many seconds without a verdict.
    pub timeout_secs: Option<u64>,
    /// Delay between consecutive status requests.
    pub interval_ms: Option<u64>,
}

/// Scripted inputs for the headless demo driver.
///
/// ```toml
/// [demo]
/// outcome = "complete"
/// profile_image = "users/alice/portrait"
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct DemoConfigSection {
    /// How the scripted dialog resolves: "complete", "cancel", or "fail".
    pub outcome: Option<String>,
    /// Asset id the profile picture round reports.
    pub profile_image: Option<String>,
    /// Asset id the post attachment round reports.
    pub post_image: Option<String>,
    /// Asset id the review video round reports.
    pub review_video: Option<String>,
}

pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut i = 0;

    while i < value.len() {
        if value[i..].starts_with("${") {
            let start = i + 2;
            if let Some(end_rel) = value[start..].find('}') {
                let end = start + end_rel;
                let var = &value[start..end];
                if !var.is_empty() {
                    let replacement = env::var(var).unwrap_or_default();
                    out.push_str(&replacement);
                }
                i = end + 1;
                continue;
            }
        }

        let ch = value[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }

    out
}

impl VitrineConfig {
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let path = match config_path() {
            Some(path) => path,
            None => return Ok(None),
        };
        if !path.exists() {
            return Ok(None);
        }

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read { path, source: err });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse { path, source: err })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".vitrine").join("config.toml"))
}
