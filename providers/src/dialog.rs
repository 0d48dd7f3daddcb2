//! Injectable upload dialog capability.
//!
//! The upload surface is third-party UI: a modal file picker that uploads
//! straight to the media service and hands back a receipt. This module
//! abstracts it behind [`UploadDialog`] so the workflow can be driven by a
//! real widget adapter in a frontend, or by [`SimulatedDialog`] in tests
//! and the demo binary.
//!
//! [`UploadTrigger`] owns exactly one dialog for its lifetime. It refuses
//! overlapping `open()` calls while a dialog is showing, and dropping it
//! releases the provider whether or not it was ever opened.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use vitrine_types::{MediaKind, UploadReceipt};

/// Where the dialog lets the user pick a file from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadSource {
    /// Local file system.
    Local,
    /// Device camera.
    Camera,
}

impl UploadSource {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadSource::Local => "local",
            UploadSource::Camera => "camera",
        }
    }
}

/// Everything a dialog provider needs to show one upload surface.
///
/// Selection is always single-file; the media kind doubles as the
/// client-side format allow-list, enforced by the dialog rather than
/// re-validated here.
#[derive(Debug, Clone)]
pub struct DialogRequest {
    pub cloud_name: String,
    pub upload_preset: String,
    pub kind: MediaKind,
    pub sources: Vec<UploadSource>,
}

impl DialogRequest {
    /// Single-file selection is part of the contract, not a knob.
    pub const MULTIPLE: bool = false;
    pub const MAX_FILES: u32 = 1;

    /// Image upload from the local file system only.
    #[must_use]
    pub fn image(cloud_name: impl Into<String>, upload_preset: impl Into<String>) -> Self {
        Self {
            cloud_name: cloud_name.into(),
            upload_preset: upload_preset.into(),
            kind: MediaKind::Image,
            sources: vec![UploadSource::Local],
        }
    }

    /// Video upload from the local file system or the device camera.
    #[must_use]
    pub fn video(cloud_name: impl Into<String>, upload_preset: impl Into<String>) -> Self {
        Self {
            cloud_name: cloud_name.into(),
            upload_preset: upload_preset.into(),
            kind: MediaKind::Video,
            sources: vec![UploadSource::Local, UploadSource::Camera],
        }
    }
}

/// How one showing of the dialog ended.
///
/// Closing the surface without a completed upload is `Cancelled`, not an
/// error; provider failures are [`DialogError`].
#[derive(Debug, Clone, PartialEq)]
pub enum DialogOutcome {
    /// The upload finished; the receipt is emitted exactly once.
    Completed(UploadReceipt),
    /// The user closed the dialog without uploading.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DialogError {
    /// The provider's UI reported a failure, with whatever detail it gave.
    #[error("upload dialog failed: {0}")]
    Provider(String),
    /// A dialog from this trigger is already showing.
    #[error("upload dialog is already open")]
    AlreadyOpen,
}

/// A modal upload surface.
///
/// Implementations are injected at composition time. They must tolerate
/// being dropped without ever having been opened.
#[async_trait]
pub trait UploadDialog: Send + Sync {
    /// Show the dialog and wait until the user completes or abandons it.
    async fn open(&self, request: &DialogRequest) -> Result<DialogOutcome, DialogError>;
}

/// Owns one dialog provider and serializes access to it.
///
/// At most one dialog per trigger is showing at any time; a second `open()`
/// while one is up fails with [`DialogError::AlreadyOpen`] without touching
/// the provider.
pub struct UploadTrigger {
    dialog: Box<dyn UploadDialog>,
    request: DialogRequest,
    showing: AtomicBool,
}

impl UploadTrigger {
    #[must_use]
    pub fn new(dialog: Box<dyn UploadDialog>, request: DialogRequest) -> Self {
        Self {
            dialog,
            request,
            showing: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn request(&self) -> &DialogRequest {
        &self.request
    }

    /// Show the dialog once and return how it ended.
    pub async fn open(&self) -> Result<DialogOutcome, DialogError> {
        if self
            .showing
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Acquire)
            .is_err()
        {
            return Err(DialogError::AlreadyOpen);
        }

        // Released on every exit, cancellation of the open future included.
        let _guard = ShowingGuard(&self.showing);
        self.dialog.open(&self.request).await
    }
}

struct ShowingGuard<'a>(&'a AtomicBool);

impl Drop for ShowingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for UploadTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadTrigger")
            .field("request", &self.request)
            .field("showing", &self.showing)
            .finish_non_exhaustive()
    }
}

/// What a [`SimulatedDialog`] does the next time it is opened.
#[derive(Debug, Clone)]
pub enum ScriptedShowing {
    /// Complete the upload with this receipt.
    Complete(UploadReceipt),
    /// Close without uploading.
    Cancel,
    /// Fail with this provider detail.
    Fail(String),
}

/// Scripted in-process dialog provider.
///
/// Stands in for the real third-party widget in tests and the demo binary:
/// each `open()` consumes the next scripted showing. An exhausted script
/// cancels, matching a user who closes an unexpected dialog.
#[derive(Debug, Default)]
pub struct SimulatedDialog {
    script: Mutex<VecDeque<ScriptedShowing>>,
}

impl SimulatedDialog {
    #[must_use]
    pub fn new(script: impl IntoIterator<Item = ScriptedShowing>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
        }
    }

    /// Provider that completes one upload with the given receipt.
    #[must_use]
    pub fn completing(receipt: UploadReceipt) -> Self {
        Self::new([ScriptedShowing::Complete(receipt)])
    }
}

#[async_trait]
impl UploadDialog for SimulatedDialog {
    async fn open(&self, _request: &DialogRequest) -> Result<DialogOutcome, DialogError> {
        match self.script.lock().await.pop_front() {
            Some(ScriptedShowing::Complete(receipt)) => Ok(DialogOutcome::Completed(receipt)),
            Some(ScriptedShowing::Cancel) | None => Ok(DialogOutcome::Cancelled),
            Some(ScriptedShowing::Fail(detail)) => Err(DialogError::Provider(detail)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use vitrine_types::AssetId;

    fn receipt(id: &str) -> UploadReceipt {
        UploadReceipt::new(
            AssetId::new(id).unwrap(),
            serde_json::json!({ "public_id": id }),
        )
    }

    /// Dialog that stays open until told to close, for overlap tests.
    struct HeldDialog {
        release: Mutex<Option<tokio::sync::oneshot::Receiver<()>>>,
    }

    #[async_trait]
    impl UploadDialog for HeldDialog {
        async fn open(&self, _request: &DialogRequest) -> Result<DialogOutcome, DialogError> {
            let rx = self.release.lock().await.take();
            if let Some(rx) = rx {
                let _ = rx.await;
            }
            Ok(DialogOutcome::Cancelled)
        }
    }

    #[tokio::test]
    async fn scripted_outcomes_play_in_order() {
        let dialog = SimulatedDialog::new([
            ScriptedShowing::Complete(receipt("first")),
            ScriptedShowing::Cancel,
            ScriptedShowing::Fail("Service Unavailable".to_string()),
        ]);
        let trigger = UploadTrigger::new(Box::new(dialog), DialogRequest::image("demo", "unsigned"));

        match trigger.open().await.unwrap() {
            DialogOutcome::Completed(r) => assert_eq!(r.asset_id.as_str(), "first"),
            DialogOutcome::Cancelled => panic!("expected completion"),
        }
        assert_eq!(trigger.open().await.unwrap(), DialogOutcome::Cancelled);
        assert_eq!(
            trigger.open().await.unwrap_err(),
            DialogError::Provider("Service Unavailable".to_string())
        );
        // Script exhausted: further showings cancel.
        assert_eq!(trigger.open().await.unwrap(), DialogOutcome::Cancelled);
    }

    #[tokio::test]
    async fn second_open_is_rejected_while_showing() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let dialog = HeldDialog {
            release: Mutex::new(Some(rx)),
        };
        let trigger = Arc::new(UploadTrigger::new(
            Box::new(dialog),
            DialogRequest::image("demo", "unsigned"),
        ));

        let held = tokio::spawn({
            let trigger = Arc::clone(&trigger);
            async move { trigger.open().await }
        });

        // Give the first open time to take the flag.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(trigger.open().await.unwrap_err(), DialogError::AlreadyOpen);

        tx.send(()).unwrap();
        assert_eq!(held.await.unwrap().unwrap(), DialogOutcome::Cancelled);

        // Closed again: the trigger accepts a new showing.
        assert_eq!(trigger.open().await.unwrap(), DialogOutcome::Cancelled);
    }

    #[tokio::test]
    async fn aborted_open_releases_the_trigger() {
        let (_tx, rx) = tokio::sync::oneshot::channel();
        let dialog = HeldDialog {
            release: Mutex::new(Some(rx)),
        };
        let trigger = Arc::new(UploadTrigger::new(
            Box::new(dialog),
            DialogRequest::image("demo", "unsigned"),
        ));

        let held = tokio::spawn({
            let trigger = Arc::clone(&trigger);
            async move { trigger.open().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        held.abort();
        let _ = held.await;

        // The abort dropped the open future mid-showing; the trigger must
        // accept a new one.
        assert_eq!(trigger.open().await.unwrap(), DialogOutcome::Cancelled);
    }

    #[test]
    fn trigger_drops_cleanly_without_opening() {
        let trigger = UploadTrigger::new(
            Box::new(SimulatedDialog::default()),
            DialogRequest::video("demo", "ugc-video"),
        );
        drop(trigger);
    }

    #[test]
    fn request_profiles_match_their_flows() {
        let image = DialogRequest::image("demo", "unsigned");
        assert_eq!(image.kind, MediaKind::Image);
        assert_eq!(image.sources, vec![UploadSource::Local]);

        let video = DialogRequest::video("demo", "ugc-video");
        assert_eq!(video.kind, MediaKind::Video);
        assert_eq!(
            video.sources,
            vec![UploadSource::Local, UploadSource::Camera]
        );
        assert!(!DialogRequest::MULTIPLE);
        assert_eq!(DialogRequest::MAX_FILES, 1);
    }
}
