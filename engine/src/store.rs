//! Records for the signed-in demo user: profile, posts, and product reviews,
//! plus the snapshot format that persists them between runs.

use std::path::PathBuf;

use chrono::Local;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use vitrine_transform::{Recipe, RenderIntent, recipe};
use vitrine_types::{
    AssetId, NonEmptyText, Post, PostId, Profile, ProfilePicture, Review, ReviewId,
};

/// Reasons a submission is refused. Refusals leave the store untouched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    /// Posts always need text.
    #[error("post text must not be empty")]
    EmptyPost,
    /// Text-only reviews need text; a review with a video may leave it blank.
    #[error("review text must not be empty without a video")]
    EmptyReview,
}

/// In-memory records for the signed-in user. Both feeds are newest first.
#[derive(Debug, Default)]
pub struct UserStore {
    profile: Profile,
    posts: Vec<Post>,
    reviews: Vec<Review>,
}

impl UserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    #[must_use]
    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    #[must_use]
    pub fn reviews(&self) -> &[Review] {
        &self.reviews
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.profile.name = name.into();
    }

    pub fn set_location(&mut self, location: impl Into<String>) {
        self.profile.location = location.into();
    }

    pub fn set_birthday(&mut self, birthday: Option<chrono::NaiveDate>) {
        self.profile.birthday = birthday;
    }

    /// Install an approved upload as the profile picture, replacing any
    /// previous one.
    pub fn set_profile_picture(&mut self, asset_id: AssetId, poor_quality: bool) {
        self.profile.picture = Some(ProfilePicture {
            asset_id,
            poor_quality,
        });
    }

    /// Publish a post at the head of the feed. The attachment, when present,
    /// must already have cleared moderation.
    pub fn submit_post(
        &mut self,
        body: &str,
        attachment: Option<AssetId>,
    ) -> Result<PostId, SubmitError> {
        let body = NonEmptyText::new(body).map_err(|_| SubmitError::EmptyPost)?;
        let id = PostId::generate();
        self.posts.insert(
            0,
            Post {
                id,
                body,
                attachment,
            },
        );
        Ok(id)
    }

    /// Publish a review at the head of the feed, dated today.
    ///
    /// A review carrying a video keeps its draft text as-is, empty included.
    /// Only text-only submissions require content.
    pub fn submit_review(
        &mut self,
        body: &str,
        video: Option<AssetId>,
    ) -> Result<ReviewId, SubmitError> {
        if video.is_none() && body.trim().is_empty() {
            return Err(SubmitError::EmptyReview);
        }
        let id = ReviewId::generate();
        self.reviews.insert(
            0,
            Review {
                id,
                body: body.to_string(),
                video,
                posted_on: Local::now().date_naive(),
            },
        );
        Ok(id)
    }

    /// Recipe for the large profile portrait. Falls back to the configured
    /// sample asset when no picture has been uploaded; the fallback gets no
    /// enhancement chain.
    #[must_use]
    pub fn portrait_recipe(&self, default_image: &AssetId) -> Recipe {
        match &self.profile.picture {
            Some(picture) => recipe(
                picture.asset_id.clone(),
                RenderIntent::Profile {
                    poor_quality: picture.poor_quality,
                },
            ),
            None => recipe(default_image.clone(), RenderIntent::ProfileFallback),
        }
    }

    /// Recipe for the navbar badge. The fallback asset runs through the same
    /// badge chain as an uploaded picture.
    #[must_use]
    pub fn badge_recipe(&self, default_image: &AssetId) -> Recipe {
        let (asset_id, poor_quality) = match &self.profile.picture {
            Some(picture) => (picture.asset_id.clone(), picture.poor_quality),
            None => (default_image.clone(), false),
        };
        recipe(asset_id, RenderIntent::ProfileBadge { poor_quality })
    }

    /// Capture the current records for persistence.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            profile: self.profile.clone(),
            posts: self.posts.clone(),
            reviews: self.reviews.clone(),
            version: SessionSnapshot::CURRENT_VERSION,
        }
    }

    /// Replace the records with a snapshot's contents. Returns false and
    /// leaves the store untouched when the snapshot was written by a
    /// different schema version.
    pub fn restore(&mut self, snapshot: SessionSnapshot) -> bool {
        if !snapshot.is_compatible() {
            return false;
        }
        self.profile = snapshot.profile;
        self.posts = snapshot.posts;
        self.reviews = snapshot.reviews;
        true
    }

    /// Persist the records as pretty JSON, creating parent directories as
    /// needed.
    pub fn save(&self, path: &std::path::Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Restore records from disk if a readable, compatible snapshot exists.
    /// Any failure keeps the current records and logs why.
    pub fn load_if_exists(&mut self, path: &std::path::Path) -> bool {
        if !path.exists() {
            return false;
        }
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Failed to read session snapshot");
                return false;
            }
        };
        let snapshot: SessionSnapshot = match serde_json::from_str(&content) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Failed to parse session snapshot");
                return false;
            }
        };
        if !self.restore(snapshot) {
            tracing::warn!(path = %path.display(), "Session snapshot has an incompatible version; starting fresh");
            return false;
        }
        true
    }
}

/// On-disk form of the session records.
///
/// # Version Compatibility
///
/// `version` gates restores: snapshots from any other schema version are
/// ignored rather than half-read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub profile: Profile,
    #[serde(default)]
    pub posts: Vec<Post>,
    #[serde(default)]
    pub reviews: Vec<Review>,
    pub version: u32,
}

impl SessionSnapshot {
    pub const CURRENT_VERSION: u32 = 1;
    pub const FILENAME: &'static str = "session.json";

    /// Whether this build can restore the snapshot.
    #[must_use]
    pub const fn is_compatible(&self) -> bool {
        self.version == Self::CURRENT_VERSION
    }
}

/// Default location of the persisted session snapshot.
#[must_use]
pub fn default_session_path() -> PathBuf {
    match dirs::data_local_dir() {
        Some(dir) => dir.join("vitrine").join(SessionSnapshot::FILENAME),
        None => PathBuf::from(".vitrine").join(SessionSnapshot::FILENAME),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(id: &str) -> AssetId {
        AssetId::new(id).expect("valid asset id")
    }

    #[test]
    fn posts_are_newest_first() {
        let mut store = UserStore::new();
        store.submit_post("first", None).expect("post");
        store.submit_post("second", None).expect("post");
        let bodies: Vec<&str> = store.posts().iter().map(|p| p.body.as_str()).collect();
        assert_eq!(bodies, vec!["second", "first"]);
    }

    #[test]
    fn post_requires_text() {
        let mut store = UserStore::new();
        let err = store.submit_post("   ", Some(asset("pic"))).unwrap_err();
        assert_eq!(err, SubmitError::EmptyPost);
        assert!(store.posts().is_empty());
    }

    #[test]
    fn post_keeps_optional_attachment() {
        let mut store = UserStore::new();
        store
            .submit_post("look at this", Some(asset("posts/cat")))
            .expect("post");
        assert_eq!(store.posts()[0].attachment, Some(asset("posts/cat")));
    }

    #[test]
    fn text_review_requires_content() {
        let mut store = UserStore::new();
        let err = store.submit_review("  ", None).unwrap_err();
        assert_eq!(err, SubmitError::EmptyReview);
        assert!(store.reviews().is_empty());
    }

    #[test]
    fn video_review_allows_empty_text() {
        let mut store = UserStore::new();
        store
            .submit_review("", Some(asset("reviews/clip")))
            .expect("video review");
        let review = &store.reviews()[0];
        assert_eq!(review.body, "");
        assert_eq!(review.video, Some(asset("reviews/clip")));
        assert_eq!(review.posted_on, Local::now().date_naive());
    }

    #[test]
    fn reviews_are_newest_first() {
        let mut store = UserStore::new();
        store.submit_review("older", None).expect("review");
        store
            .submit_review("newer", Some(asset("reviews/clip")))
            .expect("review");
        let bodies: Vec<&str> = store.reviews().iter().map(|r| r.body.as_str()).collect();
        assert_eq!(bodies, vec!["newer", "older"]);
    }

    #[test]
    fn portrait_falls_back_to_default_asset() {
        let store = UserStore::new();
        let fallback = store.portrait_recipe(&asset("samples/default"));
        assert_eq!(fallback.asset_id, asset("samples/default"));
        assert_eq!(
            fallback.transformation.to_url_component(),
            "c_fill,g_auto,h_300,w_300/f_auto/q_auto"
        );
    }

    #[test]
    fn portrait_enhances_poor_quality_uploads() {
        let mut store = UserStore::new();
        store.set_profile_picture(asset("users/me"), true);
        let portrait = store.portrait_recipe(&asset("samples/default"));
        assert_eq!(portrait.asset_id, asset("users/me"));
        assert_eq!(
            portrait.transformation.to_url_component(),
            "c_fill,g_face:auto,h_300,w_300/f_auto/q_auto/e_enhance/e_gen_restore/e_upscale"
        );
    }

    #[test]
    fn badge_runs_default_asset_through_full_chain() {
        let store = UserStore::new();
        let badge = store.badge_recipe(&asset("samples/default"));
        assert_eq!(badge.asset_id, asset("samples/default"));
        assert_eq!(
            badge.transformation.to_url_component(),
            "c_fill,g_face:auto,h_75,w_75/r_max/co_pink,e_outline/f_auto/q_auto"
        );
    }

    #[test]
    fn replacing_profile_picture_updates_recipes() {
        let mut store = UserStore::new();
        store.set_profile_picture(asset("users/old"), false);
        store.set_profile_picture(asset("users/new"), false);
        let portrait = store.portrait_recipe(&asset("samples/default"));
        assert_eq!(portrait.asset_id, asset("users/new"));
    }

    #[test]
    fn snapshot_roundtrip_preserves_records() {
        let mut store = UserStore::new();
        store.set_name("Ada");
        store.set_location("London");
        store.set_profile_picture(asset("users/ada"), true);
        store.submit_post("hello", Some(asset("posts/pic"))).expect("post");
        store.submit_review("great", None).expect("review");

        let json = serde_json::to_string(&store.snapshot()).expect("serialize");
        let parsed: SessionSnapshot = serde_json::from_str(&json).expect("deserialize");

        let mut restored = UserStore::new();
        assert!(restored.restore(parsed));
        assert_eq!(restored.profile(), store.profile());
        assert_eq!(restored.posts(), store.posts());
        assert_eq!(restored.reviews(), store.reviews());
    }

    #[test]
    fn restore_rejects_newer_snapshot_version() {
        let mut snapshot = UserStore::new().snapshot();
        snapshot.version = SessionSnapshot::CURRENT_VERSION + 1;
        let mut store = UserStore::new();
        store.submit_post("keep me", None).expect("post");
        assert!(!store.restore(snapshot));
        assert_eq!(store.posts().len(), 1);
    }

    #[test]
    fn save_and_load_roundtrip_on_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join(SessionSnapshot::FILENAME);

        let mut store = UserStore::new();
        store.set_name("Grace");
        store.submit_post("from disk", None).expect("post");
        store.save(&path).expect("save");

        let mut loaded = UserStore::new();
        assert!(loaded.load_if_exists(&path));
        assert_eq!(loaded.profile().name, "Grace");
        assert_eq!(loaded.posts().len(), 1);
    }

    #[test]
    fn load_missing_file_is_a_clean_no_op() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = UserStore::new();
        assert!(!store.load_if_exists(&dir.path().join("absent.json")));
    }

    #[test]
    fn load_corrupt_file_keeps_current_records() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(SessionSnapshot::FILENAME);
        std::fs::write(&path, "not json at all").expect("write");

        let mut store = UserStore::new();
        store.submit_post("survives", None).expect("post");
        assert!(!store.load_if_exists(&path));
        assert_eq!(store.posts().len(), 1);
    }
}
