//! Assets that remember which source file they were imported from.
//!
//! The host owns the actual asset objects; this crate only needs to read and
//! update their source path and stored import options, so a single
//! [`SourceTrackedAsset`] capability covers meshes, skeletal meshes and
//! animations alike.

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Extension of the source files this importer handles
pub const SOURCE_EXTENSION: &str = "blend";

/// Kind of asset the downstream importer produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    StaticMesh,
    SkeletalMesh,
    Animation,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::StaticMesh => "static_mesh",
            AssetKind::SkeletalMesh => "skeletal_mesh",
            AssetKind::Animation => "animation",
        }
    }
}

/// An imported asset with source-tracking metadata
pub trait SourceTrackedAsset {
    fn name(&self) -> &str;

    fn kind(&self) -> AssetKind;

    /// The original source path recorded at import time, if any
    fn first_source_path(&self) -> Option<Utf8PathBuf>;

    fn set_source_path(&mut self, path: &Utf8Path);

    /// Store the serialized [`ImportOptions`](crate::models::ImportOptions) on the asset
    fn persist_import_options(&mut self, options: &str);

    /// Previously stored import options, if any
    fn load_import_options(&self) -> Option<String>;
}

/// True if `path` has a `.blend` extension (any case)
pub fn is_blend_source(path: &Utf8Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(SOURCE_EXTENSION))
}

/// Source paths to reimport `asset` from, or `None` if it did not come from a `.blend` file
pub fn can_reimport(asset: &dyn SourceTrackedAsset) -> Option<Vec<Utf8PathBuf>> {
    let source = asset.first_source_path()?;
    is_blend_source(&source).then(|| vec![source])
}

/// Point `asset` at a new source file.
///
/// Returns false (and changes nothing) unless exactly one path is given.
pub fn set_reimport_paths(asset: &mut dyn SourceTrackedAsset, paths: &[Utf8PathBuf]) -> bool {
    match paths {
        [path] => {
            asset.set_source_path(path);
            true
        }
        _ => {
            tracing::warn!(
                "Expected exactly one reimport path for '{}', got {}",
                asset.name(),
                paths.len()
            );
            false
        }
    }
}

/// Distinct `.blend` sources behind a selection of assets, in selection order.
///
/// An empty set means there is nothing to offer an "Open in Blender" action for.
pub fn collect_blend_sources<'a, I>(assets: I) -> IndexSet<Utf8PathBuf>
where
    I: IntoIterator<Item = &'a dyn SourceTrackedAsset>,
{
    assets
        .into_iter()
        .filter_map(|asset| asset.first_source_path())
        .filter(|path| is_blend_source(path))
        .collect()
}
