//! Media service clients for Vitrine.
//!
//! # Architecture
//!
//! The crate is organized around the three boundaries the application has
//! with its external media service:
//!
//! - [`dialog`] - the injectable upload dialog capability and the trigger
//!   that owns one dialog per component lifetime
//! - [`moderation`] - the moderation status client the poll loop drives
//! - [`delivery`] - pure resolution of transformation recipes into public
//!   delivery URLs
//!
//! HTTP-speaking clients share one tuned [`http_client`]. Destination
//! configuration enters through [`CloudConfig`], whose constructor validates
//! everything that later becomes a URL component.
//!
//! # Outcome Shapes
//!
//! Service interactions return structural outcomes so callers must branch
//! on every case instead of collapsing failures into a catch-all error:
//!
//! | Type | Cases |
//! |------|-------|
//! | [`vitrine_types::ModerationVerdict`] | `Approved` / `Rejected` / `Pending` / `NetworkError` |
//! | [`dialog::DialogOutcome`] | `Completed` / `Cancelled` |

pub mod delivery;
pub mod dialog;
pub mod moderation;

use std::sync::OnceLock;
use std::time::Duration;

use thiserror::Error;
use url::Url;
use vitrine_types::{AssetId, EmptyAssetIdError};

pub use vitrine_types;

/// Public delivery host assets resolve against unless configured otherwise.
pub const DEFAULT_DELIVERY_BASE_URL: &str = "https://res.cloudinary.com";

const CONNECT_TIMEOUT_SECS: u64 = 30;

// reqwest only exposes tcp_keepalive (idle time); interval/retries use
// platform defaults.
const TCP_KEEPALIVE_SECS: u64 = 60;

const POOL_MAX_IDLE_PER_HOST: usize = 100;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

pub fn http_client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        base_client_builder().build().unwrap_or_else(|e| {
            tracing::error!("Failed to build tuned HTTP client: {e}. Using minimal fallback.");
            reqwest::Client::builder()
                .redirect(reqwest::redirect::Policy::none())
                .build()
                .expect("Minimal HTTP client must build; cannot proceed without one")
        })
    })
}

/// Moderation endpoints are app-local in development, so plain http must
/// stay allowed. Redirects are refused to keep requests on the configured
/// host.
fn base_client_builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .redirect(reqwest::redirect::Policy::none())
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
}

/// Destination cloud configuration for delivery URL resolution.
///
/// The constructor validates every piece that later becomes a URL
/// component, making malformed delivery URLs impossible at runtime.
///
/// ```rust
/// use vitrine_providers::CloudConfig;
///
/// let config = CloudConfig::new("demo-cloud", "placeholder").unwrap();
/// assert_eq!(config.cloud_name(), "demo-cloud");
/// ```
#[derive(Debug, Clone)]
pub struct CloudConfig {
    cloud_name: String,
    base_url: Url,
    default_image: AssetId,
}

#[derive(Debug, Error)]
pub enum CloudConfigError {
    #[error("cloud name must not be empty")]
    EmptyCloudName,
    #[error("delivery base URL is invalid: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),
    #[error("delivery base URL cannot carry path segments")]
    BaseUrlNotABase,
    #[error("default image id is invalid: {0}")]
    InvalidDefaultImage(#[from] EmptyAssetIdError),
}

impl CloudConfig {
    /// Configuration against the public delivery host.
    ///
    /// `default_image` is the asset shown wherever a profile picture is
    /// needed but none has been uploaded yet.
    pub fn new(
        cloud_name: impl Into<String>,
        default_image: &str,
    ) -> Result<Self, CloudConfigError> {
        Self::with_base_url(cloud_name, default_image, DEFAULT_DELIVERY_BASE_URL)
    }

    /// Configuration against an explicit delivery host.
    pub fn with_base_url(
        cloud_name: impl Into<String>,
        default_image: &str,
        base_url: &str,
    ) -> Result<Self, CloudConfigError> {
        let cloud_name = cloud_name.into();
        let cloud_name = cloud_name.trim();
        if cloud_name.is_empty() {
            return Err(CloudConfigError::EmptyCloudName);
        }
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(CloudConfigError::BaseUrlNotABase);
        }
        Ok(Self {
            cloud_name: cloud_name.to_string(),
            base_url,
            default_image: AssetId::new(default_image)?,
        })
    }

    #[must_use]
    pub fn cloud_name(&self) -> &str {
        &self.cloud_name
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn default_image(&self) -> &AssetId {
        &self.default_image
    }
}
