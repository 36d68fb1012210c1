//! Structured, serde-based document types for a persisted composition (§6 "Project
//! file").
//!
//! Persistence itself (reading/writing bytes, embedding blobs) is out-of-core — the
//! host owns that. What the core provides is a stable, round-trippable *shape*: these
//! types plus the stable type-name registry in [`crate::registry`].

use crate::format::AudioFormat;
use crate::settings::{AudioSegmentSettings, TrackSettings};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque, stable identifier for a provider, resolved against [`SourceTable`] at load
/// time. Segments reference providers by id rather than embedding them directly, which
/// sidesteps the cyclic segment↔provider↔composition ownership graph (§9 Design Notes,
/// "Cyclic ownership").
#[derive(Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub struct ProviderId(pub String);

/// Where a provider's bytes actually live.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceRef {
    ExternalPath { path: String },
    EmbeddedBlob { blob_id: String },
}

/// Maps provider ids to where their bytes live. Resolved into live [`Provider`]
/// instances by the host after deserialization (out-of-core, per §6).
///
/// [`Provider`]: ../audio_engine/trait.Provider.html
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SourceTable {
    pub sources: HashMap<ProviderId, SourceRef>,
}

/// A persisted modifier or analyzer entry: its stable type-name plus opaque,
/// forward-compatible parameters.
///
/// Using `serde_json::Value` for `params` (rather than a typed enum covering only the
/// built-in kinds) means a project saved with a host-defined modifier the loading host
/// doesn't recognize round-trips its parameters unchanged instead of being rejected.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EffectEntry {
    pub type_name: String,
    pub params: serde_json::Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SegmentDocument {
    pub provider_id: ProviderId,
    pub source_start_time: f64,
    pub source_duration: f64,
    pub timeline_start_time: f64,
    pub settings: AudioSegmentSettings,
    pub owns_provider: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrackDocument {
    pub name: String,
    pub settings: TrackSettings,
    pub segments: Vec<SegmentDocument>,
    pub analyzers: Vec<EffectEntry>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProjectDocument {
    pub format: AudioFormat,
    pub tracks: Vec<TrackDocument>,
    pub master_volume: f64,
    pub sources: SourceTable,
    /// Free-form metadata the host attaches (title, tags, creation time, ...).
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ProjectDocument {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}
