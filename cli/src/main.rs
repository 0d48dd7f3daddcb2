//! Vitrine CLI - binary entry point and demo session driver.
//!
//! # Architecture
//!
//! The CLI bridges [`vitrine_engine`] (workflow state) and the terminal:
//! it assembles the delivery and moderation stack from the config file,
//! replays scripted upload rounds through a [`WorkflowController`], and
//! prints the delivery URLs the finished session resolves to.
//!
//! ```text
//! main() -> VitrineConfig::load() -> WorkflowController + UserStore
//!                                          |
//!                                          v
//!               moderated rounds -> reviews -> print_session() -> save
//! ```
//!
//! # Event loop
//!
//! Moderated rounds pump the controller on a fixed 50ms cadence:
//!
//! 1. Wait for the tick
//! 2. Drain workflow events (non-blocking via `process_events`)
//! 3. Hand an approved upload to the records, or report the round's error

use anyhow::Result;
use std::{
    env,
    fs::{self, OpenOptions},
    path::PathBuf,
    sync::Mutex,
    time::Duration,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use vitrine_engine::{
    ApprovedUpload, AssetId, CloudConfig, DialogError, DialogOutcome, RenderIntent,
    ScriptedShowing, SimulatedDialog, UploadReceipt, UploadStart, UploadTrigger, UserStore,
    VitrineConfig, WorkflowController, WorkflowError, cloud_config_from_settings,
    default_session_path, delivery_url, image_request_from_settings,
    moderation_client_from_settings, poll_schedule_from_settings, recipe,
    video_request_from_settings,
};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::try_new("warn").expect("warn filter is valid"));

    let (log_file, init_warnings) = open_vitrine_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // If we can't open a log file, prefer "no logs" over interleaving them
    // with the demo's stdout report.
    tracing_subscriber::registry().with(env_filter).init();
}

fn open_vitrine_log_file() -> (Option<(PathBuf, std::fs::File)>, Vec<String>) {
    let candidates = vitrine_log_file_candidates();
    let mut warnings = Vec::new();

    for candidate in candidates {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn vitrine_log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.vitrine/logs/vitrine.log
    if let Some(config_path) = VitrineConfig::path()
        && let Some(config_dir) = config_path.parent()
    {
        candidates.push(config_dir.join("logs").join("vitrine.log"));
    }

    // Fallback: ./.vitrine/logs/vitrine.log (useful in constrained environments)
    candidates.push(PathBuf::from(".vitrine").join("logs").join("vitrine.log"));

    candidates
}

/// How the scripted upload dialogs resolve for this run.
///
/// Moderation itself is not scripted; a completed upload still polls the
/// configured endpoint for a real verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DemoOutcome {
    Complete,
    Cancel,
    Fail,
}

impl DemoOutcome {
    fn from_config(config: Option<&VitrineConfig>) -> Option<Self> {
        let raw = config
            .and_then(|cfg| cfg.demo.as_ref())
            .and_then(|demo| demo.outcome.as_ref())?;
        match raw.trim().to_ascii_lowercase().as_str() {
            "complete" | "completed" => Some(DemoOutcome::Complete),
            "cancel" | "cancelled" => Some(DemoOutcome::Cancel),
            "fail" | "failed" => Some(DemoOutcome::Fail),
            other => {
                tracing::warn!("Unknown demo outcome in config: {}", other);
                None
            }
        }
    }

    fn from_env() -> Option<Self> {
        match env::var("VITRINE_DEMO") {
            Ok(value) => match value.to_ascii_lowercase().as_str() {
                "complete" | "completed" => Some(DemoOutcome::Complete),
                "cancel" | "cancelled" => Some(DemoOutcome::Cancel),
                "fail" | "failed" => Some(DemoOutcome::Fail),
                _ => None,
            },
            Err(_) => None,
        }
    }

    fn showing(self, receipt: UploadReceipt) -> ScriptedShowing {
        match self {
            DemoOutcome::Complete => ScriptedShowing::Complete(receipt),
            DemoOutcome::Cancel => ScriptedShowing::Cancel,
            DemoOutcome::Fail => {
                ScriptedShowing::Fail("Upload provider unavailable".to_string())
            }
        }
    }
}

/// Asset ids the scripted rounds report when the config file names none.
const DEFAULT_PROFILE_UPLOAD: &str = "demo/profile-upload";
const DEFAULT_POST_UPLOAD: &str = "demo/post-upload";
const DEFAULT_REVIEW_VIDEO: &str = "demo/review-video";

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = VitrineConfig::load().ok().flatten();
    let outcome = DemoOutcome::from_config(config.as_ref())
        .or_else(DemoOutcome::from_env)
        .unwrap_or(DemoOutcome::Complete);

    let cloud = cloud_config_from_settings(config.as_ref())?;
    let client = moderation_client_from_settings(config.as_ref())?;
    let schedule = poll_schedule_from_settings(config.as_ref());
    let video_request = video_request_from_settings(config.as_ref());
    let video_cloud = CloudConfig::new(
        video_request.cloud_name.clone(),
        cloud.default_image().as_str(),
    )?;

    let demo = config.as_ref().and_then(|cfg| cfg.demo.as_ref());
    let profile_receipt = demo_receipt(
        demo.and_then(|section| section.profile_image.as_deref())
            .unwrap_or(DEFAULT_PROFILE_UPLOAD),
    )?;
    let post_receipt = demo_receipt(
        demo.and_then(|section| section.post_image.as_deref())
            .unwrap_or(DEFAULT_POST_UPLOAD),
    )?;
    let video_receipt = demo_receipt(
        demo.and_then(|section| section.review_video.as_deref())
            .unwrap_or(DEFAULT_REVIEW_VIDEO),
    )?;

    let mut store = UserStore::new();
    let session_path = default_session_path();
    if store.load_if_exists(&session_path) {
        println!("Restored session from {}", session_path.display());
    }
    if store.profile().name.is_empty() {
        store.set_name("Riley Meadows");
        store.set_location("Asheville, NC");
    }

    println!("Moderation endpoint: {}", client.endpoint());

    // Both moderated surfaces share one controller, the way both pages
    // share one widget configuration.
    let trigger = UploadTrigger::new(
        Box::new(SimulatedDialog::new([
            outcome.showing(profile_receipt),
            outcome.showing(post_receipt),
        ])),
        image_request_from_settings(config.as_ref()),
    );
    let mut controller = WorkflowController::with_schedule(trigger, client, schedule);

    println!("Uploading a profile picture...");
    if let Some(upload) = run_moderated_round(&mut controller).await {
        println!("  Approved as {}.", upload.asset_id);
        store.set_profile_picture(upload.asset_id, upload.poor_quality);
    }

    println!("Attaching an image to a post...");
    let attachment = run_moderated_round(&mut controller).await;
    if let Some(upload) = &attachment {
        println!("  Approved as {}.", upload.asset_id);
    }
    if let Err(error) = store.submit_post(
        "Settling into the new studio this week.",
        attachment.map(|upload| upload.asset_id),
    ) {
        eprintln!("Failed to publish the post: {error}");
    }

    if let Err(error) = store.submit_review(
        "Great color reproduction, and the stand is sturdier than it looks.",
        None,
    ) {
        eprintln!("Failed to publish the review: {error}");
    }

    println!("Recording a video review...");
    let video_trigger = UploadTrigger::new(
        Box::new(SimulatedDialog::new([outcome.showing(video_receipt)])),
        video_request,
    );
    match video_trigger.open().await {
        Ok(DialogOutcome::Completed(receipt)) => {
            println!("  Published without a moderation pass, as {}.", receipt.asset_id);
            if let Err(error) = store.submit_review("", Some(receipt.asset_id)) {
                eprintln!("Failed to publish the video review: {error}");
            }
        }
        Ok(DialogOutcome::Cancelled) => println!("  {}", WorkflowError::Cancelled),
        Err(DialogError::Provider(detail)) => {
            println!("  {}", WorkflowError::dialog(Some(detail)));
        }
        // A freshly built trigger has no dialog on screen.
        Err(DialogError::AlreadyOpen) => {}
    }

    print_session(&store, &cloud, &video_cloud);

    if let Err(e) = store.save(&session_path) {
        eprintln!("Failed to save session: {e}");
    }

    Ok(())
}

/// Cadence for pumping workflow events while a round is underway.
const POLL_TICK: Duration = Duration::from_millis(50);

/// Drive one moderated upload round to its resolution. Returns the
/// approved upload, if there is one, for the caller to place; failed
/// rounds report their user-facing message on stdout.
async fn run_moderated_round(controller: &mut WorkflowController) -> Option<ApprovedUpload> {
    if controller.begin_upload() == UploadStart::Busy {
        return None;
    }

    let mut ticks = tokio::time::interval(POLL_TICK);
    ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticks.tick().await;
        controller.process_events();

        if let Some(upload) = controller.take_approved() {
            return Some(upload);
        }
        if !controller.is_busy() {
            if let Some(message) = controller.error_message() {
                println!("  {message}");
            }
            return None;
        }
    }
}

/// Receipt the scripted dialog reports for one demo round.
fn demo_receipt(asset: &str) -> Result<UploadReceipt> {
    let asset_id = AssetId::new(asset)?;
    let info = serde_json::json!({ "public_id": asset_id.as_str() });
    Ok(UploadReceipt::new(asset_id, info))
}

fn print_session(store: &UserStore, cloud: &CloudConfig, video_cloud: &CloudConfig) {
    let profile = store.profile();

    println!();
    println!("Profile");
    if !profile.name.is_empty() {
        println!("  name:     {}", profile.name);
    }
    if !profile.location.is_empty() {
        println!("  location: {}", profile.location);
    }
    if let Some(birthday) = profile.birthday {
        println!("  birthday: {birthday}");
    }
    println!(
        "  portrait: {}",
        delivery_url(cloud, &store.portrait_recipe(cloud.default_image()))
    );
    println!(
        "  badge:    {}",
        delivery_url(cloud, &store.badge_recipe(cloud.default_image()))
    );

    println!();
    println!("Posts");
    for post in store.posts() {
        println!("  - {}", post.body.as_str());
        if let Some(attachment) = &post.attachment {
            let framed = recipe(attachment.clone(), RenderIntent::PostAttachment);
            println!("    image: {}", delivery_url(cloud, &framed));
        }
    }

    println!();
    println!("Reviews");
    for review in store.reviews() {
        if review.body.trim().is_empty() {
            println!("  - {} (video only)", review.posted_on);
        } else {
            println!("  - {} {}", review.posted_on, review.body);
        }
        if let Some(video) = &review.video {
            let playable = recipe(video.clone(), RenderIntent::ReviewVideo);
            println!("    video: {}", delivery_url(video_cloud, &playable));
        }
    }
}
