//! Core domain types for Vitrine.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// NonEmpty Text
// ============================================================================

/// A string guaranteed to be non-empty (after trimming).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NonEmptyText(String);

#[derive(Debug, Error)]
#[error("text content must not be empty")]
pub struct EmptyTextError;

impl NonEmptyText {
    pub fn new(value: impl Into<String>) -> Result<Self, EmptyTextError> {
        let value = value.into();
        if value.trim().is_empty() {
            Err(EmptyTextError)
        } else {
            Ok(Self(value))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for NonEmptyText {
    type Error = EmptyTextError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for NonEmptyText {
    type Error = EmptyTextError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NonEmptyText> for String {
    fn from(value: NonEmptyText) -> Self {
        value.0
    }
}

impl std::ops::Deref for NonEmptyText {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

// ============================================================================
// Identifiers
// ============================================================================

/// Public identifier the media service assigns to an uploaded asset.
///
/// Opaque to this application beyond being a non-empty path segment of the
/// delivery URL. Stored trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssetId(String);

#[derive(Debug, Error)]
#[error("asset id must not be empty")]
pub struct EmptyAssetIdError;

impl AssetId {
    pub fn new(value: impl Into<String>) -> Result<Self, EmptyAssetIdError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            Err(EmptyAssetIdError)
        } else {
            Ok(Self(trimmed.to_string()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for AssetId {
    type Error = EmptyAssetIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for AssetId {
    type Error = EmptyAssetIdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AssetId> for String {
    fn from(value: AssetId) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(Uuid);

impl PostId {
    /// Mint a fresh random id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn value(self) -> Uuid {
        self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewId(Uuid);

impl ReviewId {
    /// Mint a fresh random id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn value(self) -> Uuid {
        self.0
    }
}

impl fmt::Display for ReviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Media Kinds
// ============================================================================

/// Kind of media an asset holds, named the way the delivery service names
/// its resource types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Image,
    Video,
}

impl MediaKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    /// Parse from the service's resource-type string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "image" => Some(MediaKind::Image),
            "video" => Some(MediaKind::Video),
            _ => None,
        }
    }

    /// All media kinds the application handles.
    #[must_use]
    pub fn all() -> &'static [MediaKind] {
        &[MediaKind::Image, MediaKind::Video]
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Upload & Moderation
// ============================================================================

/// Raw record a completed upload hands back, exactly once per upload.
///
/// `info` is the dialog provider's opaque payload. It is forwarded verbatim
/// to the moderation endpoint, which needs it to look the asset up; nothing
/// here interprets it beyond the already-extracted `asset_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub asset_id: AssetId,
    pub info: serde_json::Value,
}

impl UploadReceipt {
    #[must_use]
    pub fn new(asset_id: AssetId, info: serde_json::Value) -> Self {
        Self { asset_id, info }
    }
}

/// Domain reading of one moderation poll attempt.
///
/// This is a sum type that structurally distinguishes every outcome,
/// ensuring callers cannot accidentally treat a transport failure as a
/// backend decision. Only `Approved` and `Rejected` are decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum ModerationVerdict {
    /// Asset accepted; carries the id to deliver and the source-quality flag.
    Approved { asset_id: AssetId, poor_quality: bool },
    /// Asset explicitly declined, with the backend's reason.
    Rejected { reason: String },
    /// No decision yet; the caller may ask again.
    Pending,
    /// The status request itself failed at the transport level.
    NetworkError { reason: String },
}

impl ModerationVerdict {
    /// True if the moderation backend has made a final decision.
    #[must_use]
    pub const fn is_decision(&self) -> bool {
        matches!(self, Self::Approved { .. } | Self::Rejected { .. })
    }
}

// ============================================================================
// Session Records
// ============================================================================

/// Profile picture reference plus the quality flag that drives conditional
/// enhancement at render time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePicture {
    pub asset_id: AssetId,
    pub poor_quality: bool,
}

/// The user's profile as edited on the profile page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub location: String,
    pub birthday: Option<NaiveDate>,
    pub picture: Option<ProfilePicture>,
}

/// A published post: text plus an optional moderated image attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub body: NonEmptyText,
    pub attachment: Option<AssetId>,
}

/// A product review: text plus an optional video.
///
/// A review submitted alongside a video keeps whatever draft text was
/// present, empty included. Only text-only submission requires content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub body: String,
    pub video: Option<AssetId>,
    pub posted_on: NaiveDate,
}

// ============================================================================
// Workflow Errors
// ============================================================================

/// Terminal failure of one upload-and-moderation round.
///
/// `Display` is the exact message shown next to the upload control. No
/// variant is fatal: each returns the workflow to its pre-upload state,
/// ready for a new attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    /// The upload dialog itself reported a failure.
    #[error("Upload failed: {detail}")]
    Dialog { detail: String },
    /// The user closed the dialog without completing an upload.
    #[error("Upload cancelled or failed. Please try again.")]
    Cancelled,
    /// A moderation status request failed at the transport level. The
    /// carried reason goes to logs; the displayed message stays generic.
    #[error("An error occurred while processing your image.")]
    Network { reason: String },
    /// The moderation backend declined the asset.
    #[error("{reason}")]
    Rejected { reason: String },
    /// No verdict arrived within the moderation deadline.
    #[error("Moderation check timed out. Please try again.")]
    TimedOut,
}

impl WorkflowError {
    /// Dialog failure, substituting the historical fallback when the
    /// provider supplies no detail.
    #[must_use]
    pub fn dialog(detail: Option<String>) -> Self {
        let detail = detail
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| "Unknown error".to_string());
        Self::Dialog { detail }
    }
}
