use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde_json::Value;
use startos_client_core::{model::FullProgress, patch::DbPath};

use crate::{error::ApiResult, types::*};

/// A push subscription. Dropping it unsubscribes.
pub type ApiStream<T> = BoxStream<'static, ApiResult<T>>;

/// Every operation the server offers.
///
/// Reads return a point-in-time value. Commands return [`Accepted`] once the
/// server has taken the request; their effect has to be observed in the
/// database. Calls are independent of each other and may run concurrently.
#[async_trait]
pub trait ApiService: Send + Sync {
    // static files and uploads

    /// Fetch a static file such as an icon or license, as text.
    async fn get_static(&self, url: &str) -> ApiResult<String>;
    async fn upload_package(&self, guid: &UploadId, body: Vec<u8>) -> ApiResult<Accepted>;
    async fn upload_file(&self, body: Vec<u8>) -> ApiResult<UploadId>;

    // state

    async fn echo(&self, req: EchoReq) -> ApiResult<String>;
    async fn get_state(&self) -> ApiResult<ServerState>;

    // db

    /// Write a value in the client-owned part of the database.
    async fn set_db_value(&self, path: &DbPath, value: Value) -> ApiResult<Accepted>;

    // auth

    async fn login(&self, req: LoginReq) -> ApiResult<Accepted>;
    async fn logout(&self) -> ApiResult<Accepted>;
    async fn get_sessions(&self) -> ApiResult<Sessions>;
    async fn kill_sessions(&self, req: KillSessionsReq) -> ApiResult<Accepted>;
    async fn reset_password(&self, req: ResetPasswordReq) -> ApiResult<Accepted>;

    // diagnostic

    async fn diagnostic_get_error(&self) -> ApiResult<DiagnosticError>;
    async fn diagnostic_restart(&self) -> ApiResult<Accepted>;
    async fn diagnostic_forget_drive(&self) -> ApiResult<Accepted>;
    async fn diagnostic_repair_disk(&self) -> ApiResult<Accepted>;
    async fn diagnostic_get_logs(&self, req: LogsReq) -> ApiResult<LogsRes>;

    // init

    async fn init_get_progress(&self) -> ApiResult<InitProgress>;
    async fn init_follow_logs(&self, req: FollowLogsReq) -> ApiResult<ApiStream<LogEntry>>;

    // server

    async fn get_system_time(&self) -> ApiResult<SystemTime>;
    async fn get_server_logs(&self, req: LogsReq) -> ApiResult<LogsRes>;
    async fn get_kernel_logs(&self, req: LogsReq) -> ApiResult<LogsRes>;
    async fn get_tor_logs(&self, req: LogsReq) -> ApiResult<LogsRes>;
    async fn follow_server_logs(&self, req: FollowLogsReq) -> ApiResult<ApiStream<LogEntry>>;
    async fn follow_kernel_logs(&self, req: FollowLogsReq) -> ApiResult<ApiStream<LogEntry>>;
    async fn follow_tor_logs(&self, req: FollowLogsReq) -> ApiResult<ApiStream<LogEntry>>;
    async fn get_server_metrics(&self) -> ApiResult<Metrics>;
    async fn get_package_metrics(&self, req: PackageReq) -> ApiResult<Metrics>;
    async fn update_server(&self, req: UpdateServerReq) -> ApiResult<UpdateServerRes>;
    async fn restart_server(&self) -> ApiResult<Accepted>;
    async fn shutdown_server(&self) -> ApiResult<Accepted>;
    async fn repair_disk(&self) -> ApiResult<Accepted>;
    async fn reset_tor(&self, req: ResetTorReq) -> ApiResult<Accepted>;

    // marketplace

    /// Forward a request to a marketplace at `url` through the server.
    async fn marketplace_proxy(&self, path: &str, params: Value, url: &str) -> ApiResult<Value>;
    async fn check_os_update(&self, req: CheckOsUpdateReq, url: &str) -> ApiResult<OsUpdate>;

    // notifications

    async fn get_notifications(&self, req: GetNotificationsReq) -> ApiResult<Vec<Notification>>;
    async fn delete_notification(&self, req: DeleteNotificationReq) -> ApiResult<Accepted>;
    async fn delete_all_notifications(&self, req: DeleteAllNotificationsReq)
        -> ApiResult<Accepted>;

    // wifi

    /// Scan for networks. Fails with [`Timeout`](crate::ApiError::Timeout)
    /// when the scan takes longer than `timeout`.
    async fn get_wifi(&self, timeout: Duration) -> ApiResult<WifiInfo>;
    async fn set_wifi_country(&self, req: SetWifiCountryReq) -> ApiResult<Accepted>;
    async fn add_wifi(&self, req: AddWifiReq) -> ApiResult<Accepted>;
    async fn connect_wifi(&self, req: SsidReq) -> ApiResult<Accepted>;
    async fn delete_wifi(&self, req: SsidReq) -> ApiResult<Accepted>;

    // ssh

    async fn get_ssh_keys(&self) -> ApiResult<Vec<SshKey>>;
    async fn add_ssh_key(&self, req: AddSshKeyReq) -> ApiResult<SshKey>;
    async fn delete_ssh_key(&self, req: DeleteSshKeyReq) -> ApiResult<Accepted>;

    // backup

    async fn get_backup_targets(&self) -> ApiResult<BackupTargets>;
    async fn add_backup_target(&self, req: BackupTargetReq) -> ApiResult<BackupTargets>;
    async fn update_backup_target(&self, req: UpdateBackupTargetReq) -> ApiResult<BackupTargets>;
    async fn remove_backup_target(&self, req: RemoveBackupTargetReq) -> ApiResult<Accepted>;
    async fn get_backup_info(&self, req: GetBackupInfoReq) -> ApiResult<Value>;
    async fn create_backup(&self, req: CreateBackupReq) -> ApiResult<Accepted>;

    // package

    async fn get_package_properties(&self, req: PackageReq) -> ApiResult<Value>;
    async fn get_package_logs(&self, req: PackageLogsReq) -> ApiResult<LogsRes>;
    async fn follow_package_logs(&self, req: FollowPackageLogsReq)
        -> ApiResult<ApiStream<LogEntry>>;
    async fn install_package(&self, req: InstallPackageReq) -> ApiResult<Accepted>;
    async fn get_package_config(&self, req: PackageReq) -> ApiResult<PackageConfig>;
    /// Returns the breakages the change would cause to dependents.
    async fn dry_set_package_config(&self, req: SetPackageConfigReq) -> ApiResult<Value>;
    async fn set_package_config(&self, req: SetPackageConfigReq) -> ApiResult<Accepted>;
    async fn restore_packages(&self, req: RestorePackagesReq) -> ApiResult<Accepted>;
    async fn execute_package_action(&self, req: ExecutePackageActionReq) -> ApiResult<Value>;
    async fn start_package(&self, req: PackageReq) -> ApiResult<Accepted>;
    async fn restart_package(&self, req: PackageReq) -> ApiResult<Accepted>;
    async fn stop_package(&self, req: PackageReq) -> ApiResult<Accepted>;
    async fn uninstall_package(&self, req: PackageReq) -> ApiResult<Accepted>;
    async fn dry_configure_dependency(&self, req: DryConfigureDependencyReq) -> ApiResult<Value>;
    async fn sideload_package(&self, req: SideloadPackageReq) -> ApiResult<SideloadPackageRes>;
    async fn follow_install_progress(&self, guid: &str) -> ApiResult<ApiStream<FullProgress>>;
}
