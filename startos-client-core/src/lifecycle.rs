//! Package lifecycle rules.
//!
//! Everything here is a pure function of a [`PackageDataEntry`] (or of two
//! consecutive observations of one). The client never moves a package from one
//! state to another; it only observes the server doing so through patches.
//!
//! ```text
//! (absent) -> Installing -> Installed -> Removing -> (absent)
//!                           Installed -> Updating -> Installed
//!                           Installed -> Restoring -> Installed
//! ```

use std::{collections::BTreeMap, fmt::Display};

use serde::{Deserialize, Serialize};

use crate::model::{ActionRequestEntry, ActionRequestId, Manifest, PackageDataEntry, StateInfo};

/// The action that has to run before a package is usable after configuration
/// changes.
pub const CONFIG_ACTION_ID: &str = "config";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PackageState {
    Installing,
    Installed,
    Updating,
    Restoring,
    Removing,
}
impl Display for PackageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PackageState::Installing => "installing",
            PackageState::Installed => "installed",
            PackageState::Updating => "updating",
            PackageState::Restoring => "restoring",
            PackageState::Removing => "removing",
        };
        write!(f, "{}", s)
    }
}

impl StateInfo {
    pub fn state(&self) -> PackageState {
        match self {
            StateInfo::Installing { .. } => PackageState::Installing,
            StateInfo::Installed { .. } => PackageState::Installed,
            StateInfo::Updating { .. } => PackageState::Updating,
            StateInfo::Restoring { .. } => PackageState::Restoring,
            StateInfo::Removing { .. } => PackageState::Removing,
        }
    }
}

pub fn package_state(pkg: &PackageDataEntry) -> PackageState {
    pkg.state_info.state()
}

pub fn is_installed(pkg: &PackageDataEntry) -> bool {
    matches!(pkg.state_info, StateInfo::Installed { .. })
}

pub fn is_installing(pkg: &PackageDataEntry) -> bool {
    matches!(pkg.state_info, StateInfo::Installing { .. })
}

pub fn is_updating(pkg: &PackageDataEntry) -> bool {
    matches!(pkg.state_info, StateInfo::Updating { .. })
}

pub fn is_restoring(pkg: &PackageDataEntry) -> bool {
    matches!(pkg.state_info, StateInfo::Restoring { .. })
}

pub fn is_removing(pkg: &PackageDataEntry) -> bool {
    matches!(pkg.state_info, StateInfo::Removing { .. })
}

/// The manifest that describes the entry: the current one while installed or
/// removing, the staged one while a new version is being put in place.
pub fn get_manifest(pkg: &PackageDataEntry) -> &Manifest {
    match &pkg.state_info {
        StateInfo::Installed { manifest } | StateInfo::Removing { manifest } => manifest,
        StateInfo::Installing { installing_info }
        | StateInfo::Updating {
            installing_info, ..
        }
        | StateInfo::Restoring {
            installing_info, ..
        } => &installing_info.new_manifest,
    }
}

/// The manifest of the version that is actually running, if any.
pub fn running_manifest(pkg: &PackageDataEntry) -> Option<&Manifest> {
    match &pkg.state_info {
        StateInfo::Installed { manifest } | StateInfo::Removing { manifest } => Some(manifest),
        StateInfo::Updating { manifest, .. } | StateInfo::Restoring { manifest, .. } => {
            manifest.as_ref()
        }
        StateInfo::Installing { .. } => None,
    }
}

/// Whether an active configuration request targets `pkg_id`.
pub fn needs_config(
    pkg_id: &str,
    requested_actions: &BTreeMap<ActionRequestId, ActionRequestEntry>,
) -> bool {
    requested_actions.values().any(|r| {
        r.active && r.request.package_id == *pkg_id && r.request.action_id == CONFIG_ACTION_ID
    })
}

/// Classification of the change between two observations of one package.
/// `None` stands for "no entry in the document".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    InstallRequested,
    Installed,
    UpdateStarted,
    Updated,
    RestoreStarted,
    Restored,
    RemovalStarted,
    Removed,
    Unexpected {
        from: Option<PackageState>,
        to: Option<PackageState>,
    },
}
impl Transition {
    pub fn between(from: Option<PackageState>, to: Option<PackageState>) -> Transition {
        use PackageState::*;
        match (from, to) {
            (a, b) if a == b => Transition::Unchanged,
            (None, Some(Installing)) => Transition::InstallRequested,
            (Some(Installing), Some(Installed)) => Transition::Installed,
            (Some(Installed), Some(Updating)) => Transition::UpdateStarted,
            (Some(Updating), Some(Installed)) => Transition::Updated,
            (Some(Installed), Some(Restoring)) => Transition::RestoreStarted,
            (Some(Restoring), Some(Installed)) => Transition::Restored,
            (Some(Installed), Some(Removing)) => Transition::RemovalStarted,
            (Some(Removing), None) => Transition::Removed,
            (from, to) => Transition::Unexpected { from, to },
        }
    }

    pub fn is_expected(&self) -> bool {
        !matches!(self, Transition::Unexpected { .. })
    }
}
