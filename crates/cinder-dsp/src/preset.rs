//! JSON presets.
//!
//! A preset file is a sparse [`CinderParams`] object; an optional `_meta`
//! block carries category and description. Factory presets are compiled in.

use std::path::{Path, PathBuf};

use crate::controls::CinderParams;
use crate::error::{Error, Result};

/// Environment variable naming an extra preset directory.
pub const PRESET_DIR_ENV: &str = "CINDER_PRESET_DIR";

const FACTORY_PRESETS: &[(&str, &str)] = &[
    (
        "init",
        r#"{
            "_meta": {"category": "Basic", "description": "Default settings"}
        }"#,
    ),
    (
        "cathedral_shimmer",
        r#"{
            "decay": 12.0, "shimmer": 0.7, "size": 0.9, "mix": 0.45,
            "_meta": {"category": "Shimmer", "description": "Long bright octave halo"}
        }"#,
    ),
    (
        "burnt_tape",
        r#"{
            "decay": 4.0, "shimmer": 0.2, "degrade": 0.55, "fold": 0.3, "dirt": 0.6,
            "pre": 0.35, "duck": 0.4, "mix": 0.5,
            "_meta": {"category": "Destroyed", "description": "Crushed, folded and ducked room"}
        }"#,
    ),
    (
        "frozen_halo",
        r#"{
            "decay": 30.0, "shimmer": 0.5, "size": 0.8, "mix": 0.6, "burn": 0.3, "drive": 0.2,
            "_meta": {"category": "Shimmer", "description": "Infinite octave pad"}
        }"#,
    ),
];

/// A loaded preset with name and parsed params.
#[derive(Debug, Clone)]
pub struct Preset {
    pub name: String,
    pub category: String,
    pub description: String,
    pub params: CinderParams,
}

impl Preset {
    pub fn from_json(name: &str, json: &str) -> Result<Self> {
        let params = CinderParams::from_json(json)?;
        let (category, description) = extract_meta(&params);
        Ok(Self {
            name: name.to_string(),
            category,
            description,
            params,
        })
    }

    /// Load a single preset file; the file stem becomes the name.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown");
        Self::from_json(name, &json)
    }
}

/// The compiled-in presets, sorted by category then name.
pub fn factory_presets() -> Vec<Preset> {
    let mut presets = Vec::new();
    for (name, json) in FACTORY_PRESETS {
        match Preset::from_json(name, json) {
            Ok(p) => presets.push(p),
            Err(e) => log::warn!("factory preset {name}: {e}"),
        }
    }
    sort(&mut presets);
    presets
}

pub fn find_factory(name: &str) -> Option<Preset> {
    factory_presets().into_iter().find(|p| p.name == name)
}

/// The directory named by [`PRESET_DIR_ENV`], if it exists.
pub fn find_preset_dir() -> Option<PathBuf> {
    let dir = PathBuf::from(std::env::var_os(PRESET_DIR_ENV)?);
    dir.is_dir().then_some(dir)
}

/// Load every `*.json` preset in `dir`. Unreadable or malformed files are
/// skipped with a warning.
pub fn load_presets(dir: &Path) -> Vec<Preset> {
    let mut presets = Vec::new();
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            log::warn!("cannot read preset dir {}: {e}", dir.display());
            return presets;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        match Preset::load(&path) {
            Ok(p) => presets.push(p),
            Err(e) => log::warn!("skipping preset {}: {e}", path.display()),
        }
    }

    sort(&mut presets);
    log::debug!("loaded {} presets from {}", presets.len(), dir.display());
    presets
}

fn sort(presets: &mut [Preset]) {
    presets.sort_by(|a, b| a.category.cmp(&b.category).then(a.name.cmp(&b.name)));
}

fn extract_meta(params: &CinderParams) -> (String, String) {
    let meta = params.meta.as_ref();
    let field = |key: &str| {
        meta.and_then(|m| m.get(key))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    };
    (
        field("category").unwrap_or_else(|| "Uncategorized".to_string()),
        field("description").unwrap_or_default(),
    )
}
