//! Core engine for Vitrine - workflow state machine and session records.
//!
//! Everything between "the user pressed upload" and "the records changed"
//! lives here: the poll schedule, the poll phase graph, the background task
//! that drives one dialog-and-moderation round, and the controller that
//! folds the round's events back into host-facing state. Hosts drive the
//! controller from their own loop and render from its accessors; nothing in
//! this crate blocks.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{AbortHandle, Abortable};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::Instant;

// Re-export from crates for public API
pub use vitrine_providers::delivery::delivery_url;
pub use vitrine_providers::dialog::{
    DialogError, DialogOutcome, DialogRequest, ScriptedShowing, SimulatedDialog, UploadDialog,
    UploadSource, UploadTrigger,
};
pub use vitrine_providers::moderation::{ModerationClient, ModerationEndpointError};
pub use vitrine_providers::{self, CloudConfig, CloudConfigError, DEFAULT_DELIVERY_BASE_URL};
pub use vitrine_transform::{Recipe, RenderIntent, Transformation, recipe};
pub use vitrine_types::{
    AssetId, MediaKind, ModerationVerdict, NonEmptyText, Post, PostId, Profile, ProfilePicture,
    Review, ReviewId, UploadReceipt, WorkflowError,
};

mod config;
pub use config::{ConfigError, VitrineConfig};

mod store;
pub use store::{SessionSnapshot, SubmitError, UserStore, default_session_path};

// ============================================================================
// Poll Schedule
// ============================================================================

/// Wall-clock budget for one moderation poll, measured from poll start.
pub const DEFAULT_POLL_DEADLINE: Duration = Duration::from_secs(60);

/// Fixed delay between consecutive status requests.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Timing policy for one moderation poll.
///
/// The deadline is checked before every status request, the first included.
/// Elapsed time exactly at the deadline still polls; only strictly-later
/// checks give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    deadline: Duration,
    interval: Duration,
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            deadline: DEFAULT_POLL_DEADLINE,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl PollSchedule {
    #[must_use]
    pub const fn new(deadline: Duration, interval: Duration) -> Self {
        Self { deadline, interval }
    }

    #[must_use]
    pub const fn deadline(&self) -> Duration {
        self.deadline
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// True once `elapsed` has passed the deadline.
    #[must_use]
    pub fn expired(&self, elapsed: Duration) -> bool {
        elapsed > self.deadline
    }
}

// ============================================================================
// Poll Phase
// ============================================================================

/// Lifecycle of the moderation poll as hosts observe it.
///
/// ```text
///               upload completes
///     Idle ──────────────────────> Polling
///       ^                             │
///       │ new upload / cancel         │ verdict, deadline, or transport failure
///       │                             v
///       └───────── Approved / Rejected / TimedOut / Errored
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollPhase {
    /// No moderation poll underway.
    #[default]
    Idle,
    /// Status requests are being issued for an accepted upload.
    Polling,
    /// The backend approved the upload.
    Approved,
    /// The backend rejected the upload.
    Rejected,
    /// The deadline passed without a verdict.
    TimedOut,
    /// A status request failed at the transport level.
    Errored,
}

impl PollPhase {
    /// True for phases that ended a poll. `Idle` is the rest state, not an
    /// ending.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Approved | Self::Rejected | Self::TimedOut | Self::Errored
        )
    }

    /// Stable lowercase name for log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Polling => "polling",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::TimedOut => "timed_out",
            Self::Errored => "errored",
        }
    }
}

/// Named edges of the poll phase graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollEdge {
    /// `Idle` to `Polling` when the dialog hands over an accepted upload.
    StartPolling,
    /// `Polling` to a terminal phase on a verdict, the deadline, or a
    /// transport failure.
    Resolve,
    /// `Polling` back to `Idle` when the round is torn down early.
    Abandon,
    /// Any rest or terminal phase back to `Idle` as a new round begins.
    Reset,
}

/// The legal phase graph, in one place. `None` means the hop is not an edge.
#[must_use]
pub fn transition_edge(from: PollPhase, to: PollPhase) -> Option<PollEdge> {
    use PollPhase::{Approved, Errored, Idle, Polling, Rejected, TimedOut};
    match (from, to) {
        (Idle, Polling) => Some(PollEdge::StartPolling),
        (Polling, Approved | Rejected | TimedOut | Errored) => Some(PollEdge::Resolve),
        (Polling, Idle) => Some(PollEdge::Abandon),
        (Idle | Approved | Rejected | TimedOut | Errored, Idle) => Some(PollEdge::Reset),
        _ => None,
    }
}

// ============================================================================
// Workflow Events
// ============================================================================

/// Identity of one upload round. Stamped on every event the round's task
/// emits, so events from a torn-down round cannot touch state that has
/// moved on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionEpoch(u64);

impl SessionEpoch {
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

/// An upload that cleared moderation, ready to apply to the records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovedUpload {
    pub asset_id: AssetId,
    /// Set when the backend flagged the source image as low quality; render
    /// paths respond with an enhancement chain.
    pub poor_quality: bool,
}

/// One message from a round's background task to its controller.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowEvent {
    pub epoch: SessionEpoch,
    pub signal: WorkflowSignal,
}

/// What happened in a round.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowSignal {
    /// The dialog finished an upload; the moderation poll is starting.
    UploadAccepted { asset_id: AssetId },
    /// The dialog was dismissed without an upload.
    UploadCancelled,
    /// The dialog provider itself failed.
    UploadFailed { detail: Option<String> },
    /// Moderation approved the upload.
    Approved(ApprovedUpload),
    /// Moderation rejected the upload, with the backend's user-facing
    /// reason.
    Rejected { reason: String },
    /// The poll deadline passed without a verdict.
    TimedOut,
    /// A status request failed at the transport level.
    PollFailed { reason: String },
}

// ============================================================================
// Workflow Session
// ============================================================================

/// A round emits at most two signals; the capacity only needs to absorb
/// them without the task ever blocking on send.
const SESSION_CHANNEL_CAPACITY: usize = 8;

/// Handle to one spawned round: the channel it reports on and the abort
/// handle that kills it.
///
/// Dropping the session aborts the task. Signals it never got to send die
/// with the channel.
#[derive(Debug)]
struct WorkflowSession {
    epoch: SessionEpoch,
    events: mpsc::Receiver<WorkflowEvent>,
    abort_handle: AbortHandle,
}

impl Drop for WorkflowSession {
    fn drop(&mut self) {
        self.abort_handle.abort();
    }
}

// ============================================================================
// Workflow Controller
// ============================================================================

/// Outcome of asking the controller to begin a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStart {
    /// A round was spawned.
    Started,
    /// A round is already underway; the request was dropped.
    Busy,
}

/// Drives upload rounds and folds their events into host-facing state.
///
/// One controller per upload surface, mirroring one widget per page. It
/// owns the dialog trigger and the moderation client, and exposes the
/// loading flag, error slot, and approved-upload slot the host renders
/// from. Hosts pump [`WorkflowController::process_events`] from their own
/// loop.
#[derive(Debug)]
pub struct WorkflowController {
    trigger: Arc<UploadTrigger>,
    client: ModerationClient,
    schedule: PollSchedule,
    phase: PollPhase,
    loading: bool,
    error: Option<WorkflowError>,
    approved: Option<ApprovedUpload>,
    next_epoch: u64,
    active: Option<WorkflowSession>,
}

impl WorkflowController {
    /// Controller with the stock 60s deadline and 1s interval.
    #[must_use]
    pub fn new(trigger: UploadTrigger, client: ModerationClient) -> Self {
        Self::with_schedule(trigger, client, PollSchedule::default())
    }

    #[must_use]
    pub fn with_schedule(
        trigger: UploadTrigger,
        client: ModerationClient,
        schedule: PollSchedule,
    ) -> Self {
        Self {
            trigger: Arc::new(trigger),
            client,
            schedule,
            phase: PollPhase::Idle,
            loading: false,
            error: None,
            approved: None,
            next_epoch: 0,
            active: None,
        }
    }

    /// Phase of the current or most recently resolved poll.
    #[must_use]
    pub fn phase(&self) -> PollPhase {
        self.phase
    }

    /// True from upload acceptance until the round resolves.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// True while a round is underway, from `begin_upload` to resolution.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.active.is_some()
    }

    /// The failure of the last resolved round, if it failed.
    #[must_use]
    pub fn error(&self) -> Option<&WorkflowError> {
        self.error.as_ref()
    }

    /// User-facing message for the last failure.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    #[must_use]
    pub fn schedule(&self) -> PollSchedule {
        self.schedule
    }

    /// Take the approved upload from the last resolved round. It is
    /// returned once; the host decides which record it lands in.
    pub fn take_approved(&mut self) -> Option<ApprovedUpload> {
        self.approved.take()
    }

    /// Start a round: open the dialog and, if an upload completes, poll
    /// moderation to a resolution. A request while a round is underway is
    /// dropped, mirroring a modal dialog already being on screen.
    ///
    /// The previous round's error stays visible until this round's upload
    /// is accepted; its approved upload, if never taken, is discarded.
    pub fn begin_upload(&mut self) -> UploadStart {
        if self.active.is_some() {
            tracing::debug!("Upload round already underway; request dropped");
            return UploadStart::Busy;
        }

        self.next_epoch += 1;
        let epoch = SessionEpoch(self.next_epoch);
        let (events_tx, events_rx) = mpsc::channel(SESSION_CHANNEL_CAPACITY);
        let (abort_handle, abort_registration) = AbortHandle::new_pair();

        let trigger = Arc::clone(&self.trigger);
        let client = self.client.clone();
        let schedule = self.schedule;
        let round = run_round(trigger, client, schedule, epoch, events_tx);
        tokio::spawn(async move {
            let _ = Abortable::new(round, abort_registration).await;
        });

        self.active = Some(WorkflowSession {
            epoch,
            events: events_rx,
            abort_handle,
        });
        self.approved = None;
        self.set_phase(PollPhase::Idle);
        tracing::info!(epoch = epoch.value(), "Upload round started");
        UploadStart::Started
    }

    /// Abort the active round, if any, and return the poll to rest. State
    /// from already-resolved rounds is untouched.
    pub fn cancel_upload(&mut self) {
        if self.active.take().is_some() {
            tracing::info!("Upload round cancelled by the host");
            self.loading = false;
            if self.phase == PollPhase::Polling {
                self.set_phase(PollPhase::Idle);
            }
        }
    }

    /// Drain and apply every event the active round has reported so far.
    /// Never blocks.
    pub fn process_events(&mut self) {
        loop {
            let Some(session) = self.active.as_mut() else {
                return;
            };
            match session.events.try_recv() {
                Ok(event) => self.apply_event(event),
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => {
                    // The task ended without resolving. Tear the round down
                    // without inventing an outcome.
                    tracing::warn!(
                        epoch = session.epoch.value(),
                        "Upload round task ended without reporting; tearing down"
                    );
                    self.active = None;
                    self.loading = false;
                    if self.phase == PollPhase::Polling {
                        self.set_phase(PollPhase::Idle);
                    }
                    return;
                }
            }
        }
    }

    fn apply_event(&mut self, event: WorkflowEvent) {
        let Some(session) = self.active.as_ref() else {
            tracing::debug!(
                epoch = event.epoch.value(),
                "Event for a torn-down round; dropped"
            );
            return;
        };
        if event.epoch != session.epoch {
            tracing::debug!(
                event_epoch = event.epoch.value(),
                active_epoch = session.epoch.value(),
                "Event from a stale round; dropped"
            );
            return;
        }

        match event.signal {
            WorkflowSignal::UploadAccepted { asset_id } => {
                tracing::info!(asset_id = %asset_id, "Upload accepted; polling moderation");
                self.loading = true;
                self.error = None;
                self.set_phase(PollPhase::Polling);
            }
            WorkflowSignal::UploadCancelled => {
                tracing::info!("Upload dialog dismissed without an upload");
                self.active = None;
                self.loading = false;
                self.error = Some(WorkflowError::Cancelled);
            }
            WorkflowSignal::UploadFailed { detail } => {
                let error = WorkflowError::dialog(detail);
                tracing::warn!(error = %error, "Upload dialog failed");
                self.active = None;
                self.loading = false;
                self.error = Some(error);
            }
            WorkflowSignal::Approved(upload) => {
                tracing::info!(
                    asset_id = %upload.asset_id,
                    poor_quality = upload.poor_quality,
                    "Moderation approved the upload"
                );
                self.active = None;
                self.loading = false;
                self.error = None;
                self.approved = Some(upload);
                self.set_phase(PollPhase::Approved);
            }
            WorkflowSignal::Rejected { reason } => {
                tracing::info!(reason = %reason, "Moderation rejected the upload");
                self.active = None;
                self.loading = false;
                self.error = Some(WorkflowError::Rejected { reason });
                self.set_phase(PollPhase::Rejected);
            }
            WorkflowSignal::TimedOut => {
                tracing::warn!("Moderation poll deadline passed without a verdict");
                self.active = None;
                self.loading = false;
                self.error = Some(WorkflowError::TimedOut);
                self.set_phase(PollPhase::TimedOut);
            }
            WorkflowSignal::PollFailed { reason } => {
                tracing::warn!(reason = %reason, "Moderation status request failed");
                self.active = None;
                self.loading = false;
                self.error = Some(WorkflowError::Network { reason });
                self.set_phase(PollPhase::Errored);
            }
        }
    }

    fn set_phase(&mut self, to: PollPhase) {
        match transition_edge(self.phase, to) {
            Some(edge) => {
                tracing::debug!(
                    from = self.phase.as_str(),
                    to = to.as_str(),
                    edge = ?edge,
                    "Poll phase transition"
                );
            }
            None => {
                // Signals are ordered per round, so this indicates a task
                // bug; record it and keep the host's view consistent.
                tracing::warn!(
                    from = self.phase.as_str(),
                    to = to.as_str(),
                    "Unexpected poll phase transition"
                );
            }
        }
        self.phase = to;
    }
}

// ============================================================================
// Round Task
// ============================================================================

/// Drive one round end to end: open the dialog, then poll moderation until
/// it resolves. Every exit sends exactly one resolving signal. Send
/// failures mean the controller already tore the round down; they are
/// ignored.
async fn run_round(
    trigger: Arc<UploadTrigger>,
    client: ModerationClient,
    schedule: PollSchedule,
    epoch: SessionEpoch,
    events: mpsc::Sender<WorkflowEvent>,
) {
    let receipt = match trigger.open().await {
        Ok(DialogOutcome::Completed(receipt)) => receipt,
        Ok(DialogOutcome::Cancelled) => {
            emit(&events, epoch, WorkflowSignal::UploadCancelled).await;
            return;
        }
        Err(DialogError::AlreadyOpen) => {
            tracing::debug!(epoch = epoch.value(), "Dialog already open; round dropped");
            return;
        }
        Err(DialogError::Provider(detail)) => {
            emit(
                &events,
                epoch,
                WorkflowSignal::UploadFailed {
                    detail: Some(detail),
                },
            )
            .await;
            return;
        }
    };

    emit(
        &events,
        epoch,
        WorkflowSignal::UploadAccepted {
            asset_id: receipt.asset_id.clone(),
        },
    )
    .await;

    let resolution = poll_moderation(&client, &receipt, schedule).await;
    emit(&events, epoch, resolution).await;
}

async fn emit(events: &mpsc::Sender<WorkflowEvent>, epoch: SessionEpoch, signal: WorkflowSignal) {
    let _ = events.send(WorkflowEvent { epoch, signal }).await;
}

/// Poll the moderation endpoint until it resolves.
///
/// The deadline is measured from entry and checked before every request,
/// the first included; the first request goes out immediately, later ones
/// after the schedule's interval. Requests never overlap.
pub async fn poll_moderation(
    client: &ModerationClient,
    receipt: &UploadReceipt,
    schedule: PollSchedule,
) -> WorkflowSignal {
    let started = Instant::now();
    loop {
        if schedule.expired(started.elapsed()) {
            return WorkflowSignal::TimedOut;
        }
        match client.check(receipt).await {
            ModerationVerdict::Approved {
                asset_id,
                poor_quality,
            } => {
                return WorkflowSignal::Approved(ApprovedUpload {
                    asset_id,
                    poor_quality,
                });
            }
            ModerationVerdict::Rejected { reason } => {
                return WorkflowSignal::Rejected { reason };
            }
            ModerationVerdict::NetworkError { reason } => {
                return WorkflowSignal::PollFailed { reason };
            }
            ModerationVerdict::Pending => {
                tokio::time::sleep(schedule.interval).await;
            }
        }
    }
}

// ============================================================================
// Configuration Assembly
// ============================================================================

/// Resolve the delivery configuration, falling back to the stock demo
/// environment for anything the config file leaves out.
pub fn cloud_config_from_settings(
    settings: Option<&VitrineConfig>,
) -> Result<CloudConfig, CloudConfigError> {
    let cloud = settings.and_then(|config| config.cloud.as_ref());
    let cloud_name = resolve(
        cloud.and_then(|section| section.cloud_name.as_deref()),
        config::DEFAULT_CLOUD_NAME,
    );
    let default_image = resolve(
        cloud.and_then(|section| section.default_image.as_deref()),
        config::DEFAULT_PROFILE_IMAGE,
    );
    match cloud.and_then(|section| section.base_url.as_deref()) {
        Some(base_url) => CloudConfig::with_base_url(
            cloud_name,
            &default_image,
            &config::expand_env_vars(base_url),
        ),
        None => CloudConfig::new(cloud_name, &default_image),
    }
}

/// Resolve the moderation client from settings.
pub fn moderation_client_from_settings(
    settings: Option<&VitrineConfig>,
) -> Result<ModerationClient, ModerationEndpointError> {
    let endpoint = resolve(
        settings
            .and_then(|config| config.moderation.as_ref())
            .and_then(|section| section.endpoint.as_deref()),
        config::DEFAULT_MODERATION_ENDPOINT,
    );
    ModerationClient::new(&endpoint)
}

/// Resolve the poll timing. Absent fields keep the stock 60s deadline and
/// 1s interval; zero values are invalid and keep the defaults too.
#[must_use]
pub fn poll_schedule_from_settings(settings: Option<&VitrineConfig>) -> PollSchedule {
    let moderation = settings.and_then(|config| config.moderation.as_ref());
    let deadline = match moderation.and_then(|section| section.timeout_secs) {
        Some(0) => {
            tracing::warn!("moderation.timeout_secs must be positive; using the default");
            DEFAULT_POLL_DEADLINE
        }
        Some(secs) => Duration::from_secs(secs),
        None => DEFAULT_POLL_DEADLINE,
    };
    let interval = match moderation.and_then(|section| section.interval_ms) {
        Some(0) => {
            tracing::warn!("moderation.interval_ms must be positive; using the default");
            DEFAULT_POLL_INTERVAL
        }
        Some(ms) => Duration::from_millis(ms),
        None => DEFAULT_POLL_INTERVAL,
    };
    PollSchedule::new(deadline, interval)
}

/// Dialog request for the moderated image widget shared by the profile and
/// posts surfaces.
#[must_use]
pub fn image_request_from_settings(settings: Option<&VitrineConfig>) -> DialogRequest {
    let cloud = settings.and_then(|config| config.cloud.as_ref());
    let cloud_name = resolve(
        cloud.and_then(|section| section.cloud_name.as_deref()),
        config::DEFAULT_CLOUD_NAME,
    );
    let preset = resolve(
        cloud.and_then(|section| section.upload_preset.as_deref()),
        config::DEFAULT_UPLOAD_PRESET,
    );
    DialogRequest::image(cloud_name, preset)
}

/// Dialog request for the review video widget, which runs against its own
/// environment and preset and skips moderation.
#[must_use]
pub fn video_request_from_settings(settings: Option<&VitrineConfig>) -> DialogRequest {
    let cloud = settings.and_then(|config| config.cloud.as_ref());
    let cloud_name = resolve(
        cloud.and_then(|section| section.video_cloud_name.as_deref()),
        config::DEFAULT_VIDEO_CLOUD_NAME,
    );
    let preset = resolve(
        cloud.and_then(|section| section.video_preset.as_deref()),
        config::DEFAULT_VIDEO_PRESET,
    );
    DialogRequest::video(cloud_name, preset)
}

/// Expand `${ENV_VAR}` references and fall back when the configured value
/// is absent or blank after expansion.
fn resolve(value: Option<&str>, fallback: &str) -> String {
    value
        .map(config::expand_env_vars)
        .filter(|expanded| !expanded.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(id: &str) -> AssetId {
        AssetId::new(id).expect("valid asset id")
    }

    fn receipt(id: &str) -> UploadReceipt {
        UploadReceipt::new(asset(id), serde_json::json!({ "public_id": id }))
    }

    /// Controller against a port nothing listens on; dialog-stage tests
    /// never reach the network, and poll-stage tests resolve as transport
    /// failures.
    fn test_controller(dialog: SimulatedDialog) -> WorkflowController {
        let trigger = UploadTrigger::new(Box::new(dialog), DialogRequest::image("cloud", "preset"));
        let client = ModerationClient::new("http://127.0.0.1:9/api/moderate").expect("endpoint");
        WorkflowController::with_schedule(
            trigger,
            client,
            PollSchedule::new(Duration::from_secs(2), Duration::from_millis(10)),
        )
    }

    /// Pump the controller until the active round resolves.
    async fn settle(controller: &mut WorkflowController) {
        for _ in 0..2000 {
            controller.process_events();
            if !controller.is_busy() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("controller never settled");
    }

    /// Install a round by hand so tests can feed events directly.
    fn install_session(
        controller: &mut WorkflowController,
        epoch: u64,
    ) -> mpsc::Sender<WorkflowEvent> {
        let (events_tx, events_rx) = mpsc::channel(SESSION_CHANNEL_CAPACITY);
        let (abort_handle, _abort_registration) = AbortHandle::new_pair();
        controller.active = Some(WorkflowSession {
            epoch: SessionEpoch(epoch),
            events: events_rx,
            abort_handle,
        });
        events_tx
    }

    fn send(events: &mpsc::Sender<WorkflowEvent>, epoch: u64, signal: WorkflowSignal) {
        events
            .try_send(WorkflowEvent {
                epoch: SessionEpoch(epoch),
                signal,
            })
            .expect("channel has capacity");
    }

    // Poll schedule

    #[test]
    fn default_schedule_matches_stock_policy() {
        let schedule = PollSchedule::default();
        assert_eq!(schedule.deadline(), Duration::from_secs(60));
        assert_eq!(schedule.interval(), Duration::from_millis(1000));
    }

    #[test]
    fn deadline_expires_strictly_after_the_budget() {
        let schedule = PollSchedule::default();
        assert!(!schedule.expired(Duration::from_millis(59_999)));
        assert!(!schedule.expired(Duration::from_millis(60_000)));
        assert!(schedule.expired(Duration::from_millis(60_001)));
    }

    #[test]
    fn zero_elapsed_is_never_expired() {
        let schedule = PollSchedule::new(Duration::ZERO, Duration::from_millis(1));
        assert!(!schedule.expired(Duration::ZERO));
        assert!(schedule.expired(Duration::from_nanos(1)));
    }

    // Poll phase graph

    #[test]
    fn terminal_phases_are_exactly_the_four_endings() {
        assert!(!PollPhase::Idle.is_terminal());
        assert!(!PollPhase::Polling.is_terminal());
        assert!(PollPhase::Approved.is_terminal());
        assert!(PollPhase::Rejected.is_terminal());
        assert!(PollPhase::TimedOut.is_terminal());
        assert!(PollPhase::Errored.is_terminal());
    }

    #[test]
    fn transition_graph_truth_table() {
        use PollPhase::{Approved, Errored, Idle, Polling, Rejected, TimedOut};
        let phases = [Idle, Polling, Approved, Rejected, TimedOut, Errored];
        let legal = [
            (Idle, Polling, PollEdge::StartPolling),
            (Polling, Approved, PollEdge::Resolve),
            (Polling, Rejected, PollEdge::Resolve),
            (Polling, TimedOut, PollEdge::Resolve),
            (Polling, Errored, PollEdge::Resolve),
            (Polling, Idle, PollEdge::Abandon),
            (Idle, Idle, PollEdge::Reset),
            (Approved, Idle, PollEdge::Reset),
            (Rejected, Idle, PollEdge::Reset),
            (TimedOut, Idle, PollEdge::Reset),
            (Errored, Idle, PollEdge::Reset),
        ];
        for from in phases {
            for to in phases {
                let expected = legal
                    .iter()
                    .find(|(f, t, _)| *f == from && *t == to)
                    .map(|(_, _, edge)| *edge);
                assert_eq!(
                    transition_edge(from, to),
                    expected,
                    "{from:?} -> {to:?} disagrees with the table"
                );
            }
        }
    }

    // Controller event application

    #[tokio::test]
    async fn begin_while_busy_is_dropped() {
        let mut controller = test_controller(SimulatedDialog::completing(receipt("users/me")));
        assert_eq!(controller.begin_upload(), UploadStart::Started);
        assert_eq!(controller.begin_upload(), UploadStart::Busy);
    }

    #[tokio::test]
    async fn dialog_cancel_reports_the_cancel_message() {
        let mut controller = test_controller(SimulatedDialog::new([ScriptedShowing::Cancel]));
        assert_eq!(controller.begin_upload(), UploadStart::Started);
        settle(&mut controller).await;

        assert_eq!(
            controller.error_message().as_deref(),
            Some("Upload cancelled or failed. Please try again.")
        );
        assert!(!controller.is_loading());
        assert_eq!(controller.phase(), PollPhase::Idle);
        assert!(controller.take_approved().is_none());
    }

    #[tokio::test]
    async fn dialog_failure_formats_the_detail() {
        let mut controller = test_controller(SimulatedDialog::new([ScriptedShowing::Fail(
            "Service Unavailable".to_string(),
        )]));
        controller.begin_upload();
        settle(&mut controller).await;

        assert_eq!(
            controller.error_message().as_deref(),
            Some("Upload failed: Service Unavailable")
        );
        assert_eq!(controller.phase(), PollPhase::Idle);
    }

    #[tokio::test]
    async fn dialog_failure_without_detail_uses_the_fallback() {
        let mut controller =
            test_controller(SimulatedDialog::new([ScriptedShowing::Fail(String::new())]));
        controller.begin_upload();
        settle(&mut controller).await;

        assert_eq!(
            controller.error_message().as_deref(),
            Some("Upload failed: Unknown error")
        );
    }

    #[tokio::test]
    async fn transport_failure_is_terminal_with_the_generic_message() {
        // Nothing listens on the endpoint, so the first status request
        // resolves the round as a transport failure.
        let mut controller = test_controller(SimulatedDialog::completing(receipt("users/me")));
        controller.begin_upload();
        settle(&mut controller).await;

        assert_eq!(controller.phase(), PollPhase::Errored);
        assert_eq!(
            controller.error_message().as_deref(),
            Some("An error occurred while processing your image.")
        );
        assert!(!controller.is_loading());
    }

    #[tokio::test]
    async fn accepted_upload_clears_the_previous_error() {
        let mut controller = test_controller(SimulatedDialog::new([
            ScriptedShowing::Cancel,
            ScriptedShowing::Complete(receipt("users/me")),
        ]));

        controller.begin_upload();
        settle(&mut controller).await;
        assert_eq!(controller.error(), Some(&WorkflowError::Cancelled));

        // The second round's acceptance replaces the stale cancel message;
        // the round then resolves as a transport failure.
        controller.begin_upload();
        settle(&mut controller).await;
        assert!(matches!(
            controller.error(),
            Some(WorkflowError::Network { .. })
        ));
    }

    #[tokio::test]
    async fn approval_fills_the_slot_exactly_once() {
        let mut controller = test_controller(SimulatedDialog::default());
        let events = install_session(&mut controller, 1);

        send(
            &events,
            1,
            WorkflowSignal::UploadAccepted {
                asset_id: asset("users/me"),
            },
        );
        controller.process_events();
        assert!(controller.is_loading());
        assert_eq!(controller.phase(), PollPhase::Polling);

        send(
            &events,
            1,
            WorkflowSignal::Approved(ApprovedUpload {
                asset_id: asset("users/me"),
                poor_quality: true,
            }),
        );
        controller.process_events();

        assert!(!controller.is_busy());
        assert!(!controller.is_loading());
        assert!(controller.error().is_none());
        assert_eq!(controller.phase(), PollPhase::Approved);
        assert_eq!(
            controller.take_approved(),
            Some(ApprovedUpload {
                asset_id: asset("users/me"),
                poor_quality: true,
            })
        );
        assert!(controller.take_approved().is_none());
    }

    #[tokio::test]
    async fn rejection_keeps_the_backend_reason() {
        let mut controller = test_controller(SimulatedDialog::default());
        let events = install_session(&mut controller, 1);

        send(
            &events,
            1,
            WorkflowSignal::UploadAccepted {
                asset_id: asset("users/me"),
            },
        );
        send(
            &events,
            1,
            WorkflowSignal::Rejected {
                reason: "Image rejected for inappropriate content.".to_string(),
            },
        );
        controller.process_events();

        assert_eq!(controller.phase(), PollPhase::Rejected);
        assert_eq!(
            controller.error_message().as_deref(),
            Some("Image rejected for inappropriate content.")
        );
    }

    #[tokio::test]
    async fn timeout_signal_reports_the_timeout_message() {
        let mut controller = test_controller(SimulatedDialog::default());
        let events = install_session(&mut controller, 1);

        send(
            &events,
            1,
            WorkflowSignal::UploadAccepted {
                asset_id: asset("users/me"),
            },
        );
        send(&events, 1, WorkflowSignal::TimedOut);
        controller.process_events();

        assert_eq!(controller.phase(), PollPhase::TimedOut);
        assert_eq!(
            controller.error_message().as_deref(),
            Some("Moderation check timed out. Please try again.")
        );
    }

    #[tokio::test]
    async fn stale_epoch_events_are_dropped() {
        let mut controller = test_controller(SimulatedDialog::default());
        let events = install_session(&mut controller, 7);

        send(
            &events,
            3,
            WorkflowSignal::UploadAccepted {
                asset_id: asset("stale"),
            },
        );
        controller.process_events();
        assert!(!controller.is_loading());
        assert_eq!(controller.phase(), PollPhase::Idle);

        send(
            &events,
            7,
            WorkflowSignal::UploadAccepted {
                asset_id: asset("live"),
            },
        );
        controller.process_events();
        assert!(controller.is_loading());
        assert_eq!(controller.phase(), PollPhase::Polling);
    }

    #[tokio::test]
    async fn cancel_mid_poll_returns_to_idle_and_ignores_late_events() {
        let mut controller = test_controller(SimulatedDialog::default());
        let events = install_session(&mut controller, 1);

        send(
            &events,
            1,
            WorkflowSignal::UploadAccepted {
                asset_id: asset("users/me"),
            },
        );
        controller.process_events();
        assert_eq!(controller.phase(), PollPhase::Polling);

        controller.cancel_upload();
        assert!(!controller.is_busy());
        assert!(!controller.is_loading());
        assert_eq!(controller.phase(), PollPhase::Idle);

        // A resolution that raced the cancel must not resurrect the round.
        send(
            &events,
            1,
            WorkflowSignal::Approved(ApprovedUpload {
                asset_id: asset("users/me"),
                poor_quality: false,
            }),
        );
        controller.process_events();
        assert!(controller.take_approved().is_none());
        assert_eq!(controller.phase(), PollPhase::Idle);
    }

    #[tokio::test]
    async fn task_death_without_a_resolution_tears_down_silently() {
        let mut controller = test_controller(SimulatedDialog::default());
        let events = install_session(&mut controller, 1);

        send(
            &events,
            1,
            WorkflowSignal::UploadAccepted {
                asset_id: asset("users/me"),
            },
        );
        controller.process_events();
        assert!(controller.is_loading());

        drop(events);
        controller.process_events();

        assert!(!controller.is_busy());
        assert!(!controller.is_loading());
        assert!(controller.error().is_none());
        assert_eq!(controller.phase(), PollPhase::Idle);
    }

    #[tokio::test]
    async fn new_round_resets_a_terminal_phase() {
        let mut controller = test_controller(SimulatedDialog::default());
        let events = install_session(&mut controller, 1);

        send(
            &events,
            1,
            WorkflowSignal::UploadAccepted {
                asset_id: asset("users/me"),
            },
        );
        send(
            &events,
            1,
            WorkflowSignal::Rejected {
                reason: "no".to_string(),
            },
        );
        controller.process_events();
        assert_eq!(controller.phase(), PollPhase::Rejected);

        // The scripted dialog is exhausted, so the new round resolves as a
        // cancel; the phase leaves the terminal state immediately.
        controller.begin_upload();
        assert_eq!(controller.phase(), PollPhase::Idle);
        settle(&mut controller).await;
        assert_eq!(controller.error(), Some(&WorkflowError::Cancelled));
    }
}
