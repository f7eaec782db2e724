//! The server's data model as mirrored by the client.
//!
//! Only the parts the client interprets are typed. Everything else is kept in
//! `other` maps so that decoding and re-encoding an entry is lossless.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::id::PackageId;

/// Root of the mirrored document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default)]
    pub package_data: BTreeMap<PackageId, PackageDataEntry>,
    /// Server info, notifications, ui settings...
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl Document {
    /// Path of the package map inside the document.
    pub const PACKAGE_DATA: &'static str = "packageData";
}

pub type ActionRequestId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDataEntry {
    pub state_info: StateInfo,
    #[serde(default)]
    pub requested_actions: BTreeMap<ActionRequestId, ActionRequestEntry>,
    #[serde(default, alias = "currentDependencies")]
    pub dependencies: BTreeMap<PackageId, Value>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Where a package is in its lifecycle. Exactly one tag per entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tag")]
pub enum StateInfo {
    #[serde(rename_all = "camelCase")]
    Installing { installing_info: InstallingInfo },
    #[serde(rename_all = "camelCase")]
    Installed { manifest: Manifest },
    #[serde(rename_all = "camelCase")]
    Updating {
        installing_info: InstallingInfo,
        /// The version that keeps running until the update completes.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        manifest: Option<Manifest>,
    },
    #[serde(rename_all = "camelCase")]
    Restoring {
        installing_info: InstallingInfo,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        manifest: Option<Manifest>,
    },
    #[serde(rename_all = "camelCase")]
    Removing { manifest: Manifest },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallingInfo {
    pub new_manifest: Manifest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<FullProgress>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Metadata describing one version of a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub id: PackageId,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullProgress {
    #[serde(default)]
    pub overall: Option<Progress>,
    #[serde(default)]
    pub phases: Vec<NamedProgress>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedProgress {
    pub name: String,
    #[serde(default)]
    pub progress: Option<Progress>,
}

/// `true` when complete, `false` when not started, otherwise a counter.
/// A missing progress (`null`) means "not started" as well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Progress {
    Flag(bool),
    Counted { done: u64, total: Option<u64> },
}
impl Progress {
    pub fn is_complete(&self) -> bool {
        match self {
            Progress::Flag(done) => *done,
            Progress::Counted { done, total } => total.is_some_and(|total| *done >= total),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequestEntry {
    pub active: bool,
    pub request: ActionRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    pub package_id: PackageId,
    pub action_id: String,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}
