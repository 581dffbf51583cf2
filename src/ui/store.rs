// Asset store for the command-line front-end
//
// Stands in for the editor's content browser: imported assets are YAML
// records in `assets.yaml`, and their imported data is the interchange file
// copied into the content directory.

use crate::services::{
    AssetKind, ImportedObjects, InterchangeImporter, InterchangeRequest, SourceTrackedAsset,
};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;

/// File name of the asset index inside the content directory
pub const ASSET_INDEX_FILE: &str = "assets.yaml";

/// One imported asset and its source-tracking metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Kind")]
    pub kind: AssetKind,

    #[serde(rename = "Source File", default)]
    pub source_path: Option<String>,

    #[serde(rename = "Import Options", default)]
    pub import_options: Option<String>,
}

impl AssetRecord {
    pub fn new(name: impl Into<String>, kind: AssetKind) -> Self {
        Self {
            name: name.into(),
            kind,
            source_path: None,
            import_options: None,
        }
    }

    /// Snapshot of any source-tracked asset
    pub fn from_asset(asset: &dyn SourceTrackedAsset) -> Self {
        Self {
            name: asset.name().to_string(),
            kind: asset.kind(),
            source_path: asset.first_source_path().map(String::from),
            import_options: asset.load_import_options(),
        }
    }
}

impl SourceTrackedAsset for AssetRecord {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> AssetKind {
        self.kind
    }

    fn first_source_path(&self) -> Option<Utf8PathBuf> {
        self.source_path
            .as_deref()
            .filter(|path| !path.is_empty())
            .map(Utf8PathBuf::from)
    }

    fn set_source_path(&mut self, path: &Utf8Path) {
        self.source_path = Some(path.to_string());
    }

    fn persist_import_options(&mut self, options: &str) {
        self.import_options = Some(options.to_string());
    }

    fn load_import_options(&self) -> Option<String> {
        self.import_options.clone()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AssetIndex {
    #[serde(rename = "Assets", default)]
    assets: IndexMap<String, AssetRecord>,
}

/// YAML-backed collection of [`AssetRecord`]s keyed by name
#[derive(Debug)]
pub struct AssetStore {
    content_dir: Utf8PathBuf,
    index_path: Utf8PathBuf,
    assets: IndexMap<String, AssetRecord>,
}

impl AssetStore {
    /// Open (or start) the store in `content_dir`
    pub fn open<P: AsRef<Utf8Path>>(content_dir: P) -> Result<Self> {
        let content_dir = content_dir.as_ref().to_path_buf();
        if !content_dir.exists() {
            fs::create_dir_all(&content_dir)
                .with_context(|| format!("Failed to create content directory: {}", content_dir))?;
        }

        let index_path = content_dir.join(ASSET_INDEX_FILE);
        let assets = if index_path.exists() {
            let contents = fs::read_to_string(&index_path)
                .with_context(|| format!("Failed to read asset index: {}", index_path))?;
            let index: AssetIndex = serde_yaml_ng::from_str(&contents)
                .with_context(|| format!("Failed to parse asset index: {}", index_path))?;
            index.assets
        } else {
            IndexMap::new()
        };

        tracing::debug!("Opened asset store {} ({} assets)", content_dir, assets.len());

        Ok(Self {
            content_dir,
            index_path,
            assets,
        })
    }

    pub fn save(&self) -> Result<()> {
        let index = AssetIndex {
            assets: self.assets.clone(),
        };
        let yaml = serde_yaml_ng::to_string(&index).context("Failed to serialize asset index")?;
        fs::write(&self.index_path, yaml)
            .with_context(|| format!("Failed to write asset index: {}", self.index_path))?;
        Ok(())
    }

    pub fn content_dir(&self) -> &Utf8Path {
        &self.content_dir
    }

    pub fn get(&self, name: &str) -> Option<&AssetRecord> {
        self.assets.get(name)
    }

    /// The stored asset with this name, as the importer sees it
    pub fn existing(&self, name: &str) -> Option<&dyn SourceTrackedAsset> {
        self.assets
            .get(name)
            .map(|record| record as &dyn SourceTrackedAsset)
    }

    pub fn records(&self) -> impl Iterator<Item = &AssetRecord> {
        self.assets.values()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Insert or replace the record with the same name
    pub fn upsert(&mut self, record: AssetRecord) {
        self.assets.insert(record.name.clone(), record);
    }

    /// Record every asset an import produced
    pub fn record_imported(&mut self, objects: &ImportedObjects) {
        for asset in objects.iter() {
            self.upsert(AssetRecord::from_asset(asset));
        }
    }
}

/// Interchange importer that copies the exported file into the content directory
pub struct CopyImporter {
    content_dir: Utf8PathBuf,
    kind: AssetKind,
}

impl CopyImporter {
    pub fn new(content_dir: impl Into<Utf8PathBuf>, kind: AssetKind) -> Self {
        Self {
            content_dir: content_dir.into(),
            kind,
        }
    }

    /// Where the imported file lands, or `None` if the asset name is not a plain file name
    pub fn destination(&self, request: &InterchangeRequest) -> Option<Utf8PathBuf> {
        if !is_plain_asset_name(&request.asset_name) {
            return None;
        }
        let extension = request.interchange_file.extension().unwrap_or("fbx");
        Some(
            self.content_dir
                .join(format!("{}.{}", request.asset_name, extension)),
        )
    }
}

/// Names must stay inside the content directory
fn is_plain_asset_name(name: &str) -> bool {
    !name.trim().is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', ':', '\0'])
}

impl InterchangeImporter for CopyImporter {
    fn import_interchange(&mut self, request: &InterchangeRequest) -> Option<ImportedObjects> {
        let Some(destination) = self.destination(request) else {
            tracing::error!(
                "Asset name \"{}\" is not a valid file name",
                request.asset_name
            );
            return None;
        };
        if let Err(e) = fs::copy(&request.interchange_file, &destination) {
            tracing::error!(
                "Failed to copy {} to {}: {}",
                request.interchange_file,
                destination,
                e
            );
            return None;
        }

        tracing::info!("Imported {} as {}", request.interchange_file, destination);
        Some(ImportedObjects::new(Box::new(AssetRecord::new(
            request.asset_name.clone(),
            self.kind,
        ))))
    }
}
