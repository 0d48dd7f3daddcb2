//! Declarative transformation recipes for Vitrine.
//!
//! A [`Recipe`] describes how an asset should be rendered: crop, corner
//! rounding, effects, format and quality selection. Nothing here touches the
//! network or executes pixels - recipes are resolved into delivery URLs by
//! the media service, and this crate only builds the description.
//!
//! Construction is referentially transparent: the same inputs always build
//! the same recipe and the same serialized form, so recipes are directly
//! comparable in tests.

mod intent;
pub use intent::{RenderIntent, recipe};

use serde::{Deserialize, Serialize};
use vitrine_types::{AssetId, MediaKind};

// ============================================================================
// Steps
// ============================================================================

/// How a crop chooses its focal region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gravity {
    /// Center on a detected face, falling back to automatic salience when
    /// no face is found.
    FaceWithAutoFallback,
    /// Automatic salience only.
    Auto,
}

impl Gravity {
    const fn qualifier_value(self) -> &'static str {
        match self {
            Gravity::FaceWithAutoFallback => "face:auto",
            Gravity::Auto => "auto",
        }
    }
}

/// Resize modes the application uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resize {
    /// Crop to exactly the given box, keeping the focal region.
    Fill {
        width: u32,
        height: u32,
        gravity: Gravity,
    },
    /// Scale to fit inside the box and pad the remainder with a named
    /// background color.
    Pad {
        width: u32,
        height: u32,
        background: String,
    },
}

/// Corner rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundCorners {
    /// Fixed radius in pixels.
    Radius(u32),
    /// Maximum rounding: a circle or ellipse.
    Max,
}

/// Effects applied service-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// AI cleanup of lighting and color.
    Enhance,
    /// AI restoration of degraded sources.
    GenerativeRestore,
    /// AI upscaling of low-resolution sources.
    Upscale,
    /// Solid outline drawn around the visible shape, in a named color.
    Outline { color: String },
}

/// One transformation component. Serializes to one `/`-separated segment of
/// the delivery URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Step {
    Resize(Resize),
    RoundCorners(RoundCorners),
    Effect(Effect),
    /// Automatic delivery format selection (`f_auto`).
    AutoFormat,
    /// Automatic quality selection (`q_auto`).
    AutoQuality,
}

// ============================================================================
// Transformation
// ============================================================================

/// Ordered list of transformation steps.
///
/// Steps keep build order. Within one step, qualifiers serialize in
/// alphabetical key order - the canonical form the media service's own SDKs
/// emit - so equal transformations always produce byte-equal URL components.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transformation {
    steps: Vec<Step>,
}

impl Transformation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn resize(mut self, resize: Resize) -> Self {
        self.steps.push(Step::Resize(resize));
        self
    }

    #[must_use]
    pub fn round_corners(mut self, corners: RoundCorners) -> Self {
        self.steps.push(Step::RoundCorners(corners));
        self
    }

    #[must_use]
    pub fn effect(mut self, effect: Effect) -> Self {
        self.steps.push(Step::Effect(effect));
        self
    }

    #[must_use]
    pub fn auto_format(mut self) -> Self {
        self.steps.push(Step::AutoFormat);
        self
    }

    #[must_use]
    pub fn auto_quality(mut self) -> Self {
        self.steps.push(Step::AutoQuality);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Serialize to the transformation path component of a delivery URL.
    ///
    /// Empty transformations serialize to an empty string; the URL resolver
    /// omits the component entirely in that case.
    #[must_use]
    pub fn to_url_component(&self) -> String {
        self.steps
            .iter()
            .map(step_component)
            .collect::<Vec<_>>()
            .join("/")
    }
}

fn step_component(step: &Step) -> String {
    let mut qualifiers = step_qualifiers(step);
    // Alphabetical key order is the canonical serialized form.
    qualifiers.sort_by(|a, b| a.0.cmp(b.0));
    qualifiers
        .iter()
        .map(|(key, value)| format!("{key}_{value}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn step_qualifiers(step: &Step) -> Vec<(&'static str, String)> {
    match step {
        Step::Resize(Resize::Fill {
            width,
            height,
            gravity,
        }) => vec![
            ("c", "fill".to_string()),
            ("g", gravity.qualifier_value().to_string()),
            ("h", height.to_string()),
            ("w", width.to_string()),
        ],
        Step::Resize(Resize::Pad {
            width,
            height,
            background,
        }) => vec![
            ("b", background.clone()),
            ("c", "pad".to_string()),
            ("h", height.to_string()),
            ("w", width.to_string()),
        ],
        Step::RoundCorners(RoundCorners::Radius(radius)) => vec![("r", radius.to_string())],
        Step::RoundCorners(RoundCorners::Max) => vec![("r", "max".to_string())],
        Step::Effect(Effect::Enhance) => vec![("e", "enhance".to_string())],
        Step::Effect(Effect::GenerativeRestore) => vec![("e", "gen_restore".to_string())],
        Step::Effect(Effect::Upscale) => vec![("e", "upscale".to_string())],
        Step::Effect(Effect::Outline { color }) => {
            vec![("co", color.clone()), ("e", "outline".to_string())]
        }
        Step::AutoFormat => vec![("f", "auto".to_string())],
        Step::AutoQuality => vec![("q", "auto".to_string())],
    }
}

// ============================================================================
// Recipe
// ============================================================================

/// A deliverable rendering: which asset, what media kind, which
/// transformation.
///
/// Pure data with structural equality, so callers can assert that two
/// construction paths agree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub asset_id: AssetId,
    pub kind: MediaKind,
    pub transformation: Transformation,
}

impl Recipe {
    #[must_use]
    pub fn new(asset_id: AssetId, kind: MediaKind, transformation: Transformation) -> Self {
        Self {
            asset_id,
            kind,
            transformation,
        }
    }
}
