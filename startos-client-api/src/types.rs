//! Request and response records of the server API.
//!
//! Fields the client does not interpret are kept as [`Value`]s, or collected
//! in an `other` map where a record is mostly typed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use startos_client_core::{id::PackageId, model::FullProgress};

/// Acceptance of a command. Says nothing about the resulting state, which
/// arrives through the patch stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accepted;

/// Opaque handle returned by uploads, passed on to a later command.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadId(pub String);

impl std::fmt::Display for UploadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// state

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EchoReq {
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerState {
    Initializing,
    Running,
    Error,
}

// auth

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginReq {
    pub password: String,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default)]
    pub ephemeral: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub logged_in: String,
    pub last_active: String,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sessions {
    pub current: String,
    pub sessions: BTreeMap<String, Session>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillSessionsReq {
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordReq {
    pub old_password: String,
    pub new_password: String,
}

// diagnostic

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticError {
    pub code: i32,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

// logs

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogsReq {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    #[serde(default)]
    pub before: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowLogsReq {
    /// Number of past entries to send before following
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsRes {
    pub entries: Vec<LogEntry>,
    #[serde(default)]
    pub start_cursor: Option<String>,
    #[serde(default)]
    pub end_cursor: Option<String>,
}

// server

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemTime {
    pub now: String,
    /// Seconds
    pub uptime: u64,
}

/// Metrics are displayed, not interpreted.
pub type Metrics = Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateServerReq {
    pub registry: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateServerRes {
    Updating,
    NoUpdates,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetTorReq {
    pub wipe_state: bool,
    pub reason: String,
}

// marketplace

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOsUpdateReq {
    pub server_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsUpdate {
    pub version: String,
    #[serde(default)]
    pub headline: String,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

// notifications

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetNotificationsReq {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: u64,
    #[serde(default)]
    pub package_id: Option<PackageId>,
    pub created_at: String,
    pub level: String,
    pub title: String,
    pub message: String,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteNotificationReq {
    pub id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteAllNotificationsReq {
    pub before: u64,
}

// wifi

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WifiInfo {
    /// Known networks and their priority
    #[serde(default)]
    pub ssids: BTreeMap<String, i64>,
    #[serde(default)]
    pub connected: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub ethernet: bool,
    #[serde(default)]
    pub available_wifi: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetWifiCountryReq {
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddWifiReq {
    pub ssid: String,
    pub password: String,
    pub priority: i64,
    pub connect: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsidReq {
    pub ssid: String,
}

// ssh

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SshKey {
    pub created_at: String,
    pub alg: String,
    pub hostname: String,
    pub fingerprint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddSshKeyReq {
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteSshKeyReq {
    pub fingerprint: String,
}

// backup

pub type BackupTargets = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupTargetReq {
    pub hostname: String,
    pub path: String,
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateBackupTargetReq {
    pub id: String,
    #[serde(flatten)]
    pub target: BackupTargetReq,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveBackupTargetReq {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetBackupInfoReq {
    pub target_id: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBackupReq {
    pub target_id: String,
    pub package_ids: Vec<PackageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_password: Option<String>,
    pub password: String,
}

// package

/// Requests that only name a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageReq {
    pub id: PackageId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageLogsReq {
    pub id: PackageId,
    #[serde(flatten)]
    pub logs: LogsReq,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowPackageLogsReq {
    pub id: PackageId,
    #[serde(flatten)]
    pub logs: FollowLogsReq,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallPackageReq {
    pub id: PackageId,
    pub marketplace_url: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageConfig {
    #[serde(default)]
    pub config: Option<Value>,
    pub spec: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetPackageConfigReq {
    pub id: PackageId,
    pub config: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestorePackagesReq {
    pub ids: Vec<PackageId>,
    pub target_id: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutePackageActionReq {
    pub id: PackageId,
    pub action_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DryConfigureDependencyReq {
    pub dependency_id: PackageId,
    pub dependent_id: PackageId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideloadPackageReq {
    pub manifest: Value,
    /// Data url of the package icon
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideloadPackageRes {
    /// Pass to [`ApiService::upload_package`](crate::ApiService::upload_package)
    pub upload: UploadId,
    /// Pass to [`ApiService::follow_install_progress`](crate::ApiService::follow_install_progress)
    pub progress: String,
}

/// Progress of server initialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitProgress {
    pub progress: FullProgress,
    /// Subscription id for following the progress
    #[serde(default)]
    pub guid: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_encoding() {
        let req = InstallPackageReq {
            id: "bitcoind".parse().unwrap(),
            marketplace_url: "https://registry.start9.com".to_owned(),
            version: "25.0.0".to_owned(),
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "id": "bitcoind",
                "marketplaceUrl": "https://registry.start9.com",
                "version": "25.0.0"
            })
        );

        let req = PackageLogsReq {
            id: "bitcoind".parse().unwrap(),
            logs: LogsReq {
                limit: Some(10),
                ..Default::default()
            },
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({ "id": "bitcoind", "before": false, "limit": 10 })
        );
    }

    #[test]
    fn test_response_decoding() {
        let res: SideloadPackageRes =
            serde_json::from_value(json!({ "upload": "abc", "progress": "def" })).unwrap();
        assert_eq!(res.upload, UploadId("abc".to_owned()));

        let state: ServerState = serde_json::from_value(json!("running")).unwrap();
        assert_eq!(state, ServerState::Running);

        let res: UpdateServerRes = serde_json::from_value(json!("no-updates")).unwrap();
        assert_eq!(res, UpdateServerRes::NoUpdates);
    }
}
