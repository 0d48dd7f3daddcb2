//! Delivery URL resolution.
//!
//! Recipes stay declarative until this boundary, where one is combined with
//! a [`CloudConfig`] into the public URL the rendering layer hands to an
//! `<img>` tag or a video player:
//!
//! `{base}/{cloud_name}/{image|video}/upload/{transformation}/{public_id}`
//!
//! The transformation component is omitted for empty transformations, so
//! untransformed assets resolve to their canonical URLs.

use vitrine_transform::Recipe;

use crate::CloudConfig;

/// Resolve a recipe into its public delivery URL.
///
/// Pure string assembly; nothing is fetched. Identical inputs always
/// resolve to identical URLs.
#[must_use]
pub fn delivery_url(config: &CloudConfig, recipe: &Recipe) -> String {
    let base = config.base_url().as_str().trim_end_matches('/');
    let mut url = String::with_capacity(base.len() + 96);
    url.push_str(base);
    url.push('/');
    url.push_str(config.cloud_name());
    url.push('/');
    url.push_str(recipe.kind.as_str());
    url.push_str("/upload/");
    let transformation = recipe.transformation.to_url_component();
    if !transformation.is_empty() {
        url.push_str(&transformation);
        url.push('/');
    }
    url.push_str(recipe.asset_id.as_str());
    url
}
