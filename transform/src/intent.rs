//! Named rendering intents.
//!
//! Each surface that renders an asset does so through one of these intents,
//! so the recipe for a given purpose is built in exactly one place instead
//! of being repeated per page.

use vitrine_types::{AssetId, MediaKind};

use crate::{Effect, Gravity, Recipe, Resize, RoundCorners, Transformation};

/// What the caller is rendering an asset for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderIntent {
    /// 300x300 face-centered profile portrait.
    Profile { poor_quality: bool },
    /// 75x75 circular profile badge shown beside each post.
    ProfileBadge { poor_quality: bool },
    /// 300x300 stand-in shown before any picture is uploaded.
    ProfileFallback,
    /// 300x200 padded post attachment with lightly rounded corners.
    PostAttachment,
    /// Unmodified video handed to the review player.
    ReviewVideo,
}

/// Build the recipe for rendering `asset_id` with the given intent.
///
/// Pure: identical inputs always return an identical recipe.
#[must_use]
pub fn recipe(asset_id: AssetId, intent: RenderIntent) -> Recipe {
    match intent {
        RenderIntent::Profile { poor_quality } => {
            let mut transformation = Transformation::new()
                .resize(Resize::Fill {
                    width: 300,
                    height: 300,
                    gravity: Gravity::FaceWithAutoFallback,
                })
                .auto_format()
                .auto_quality();
            if poor_quality {
                transformation = enhancement_chain(transformation);
            }
            Recipe::new(asset_id, MediaKind::Image, transformation)
        }
        RenderIntent::ProfileBadge { poor_quality } => {
            // The badge repairs the source before cropping, unlike the
            // portrait which repairs after.
            let mut transformation = Transformation::new();
            if poor_quality {
                transformation = enhancement_chain(transformation);
            }
            let transformation = transformation
                .resize(Resize::Fill {
                    width: 75,
                    height: 75,
                    gravity: Gravity::FaceWithAutoFallback,
                })
                .round_corners(RoundCorners::Max)
                .effect(Effect::Outline {
                    color: "pink".to_string(),
                })
                .auto_format()
                .auto_quality();
            Recipe::new(asset_id, MediaKind::Image, transformation)
        }
        RenderIntent::ProfileFallback => {
            let transformation = Transformation::new()
                .resize(Resize::Fill {
                    width: 300,
                    height: 300,
                    gravity: Gravity::Auto,
                })
                .auto_format()
                .auto_quality();
            Recipe::new(asset_id, MediaKind::Image, transformation)
        }
        RenderIntent::PostAttachment => {
            let transformation = Transformation::new()
                .resize(Resize::Pad {
                    width: 300,
                    height: 200,
                    background: "gray".to_string(),
                })
                .round_corners(RoundCorners::Radius(5))
                .auto_format()
                .auto_quality();
            Recipe::new(asset_id, MediaKind::Image, transformation)
        }
        RenderIntent::ReviewVideo => {
            Recipe::new(asset_id, MediaKind::Video, Transformation::new())
        }
    }
}

/// Enhance, restore, then upscale - always chained in that order.
fn enhancement_chain(transformation: Transformation) -> Transformation {
    transformation
        .effect(Effect::Enhance)
        .effect(Effect::GenerativeRestore)
        .effect(Effect::Upscale)
}
