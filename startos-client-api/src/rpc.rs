//! [`ApiService`] over JSON-RPC: plain calls over HTTP, subscriptions over a
//! websocket, uploads and static files over REST.

use std::{
    sync::{Arc, RwLock},
    time::Duration,
};

use async_trait::async_trait;
use futures_util::StreamExt as _;
use jsonrpsee::{
    core::client::{ClientT, SubscriptionClientT},
    http_client::{HeaderMap, HeaderValue, HttpClient},
    ws_client::{WsClient, WsClientBuilder},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Map, Value};
use startos_client_core::{
    model::FullProgress,
    patch::{DbPath, SequenceId, Snapshot},
};
use startos_client_db::{PatchSource, PatchSubscription, SyncError};
use tracing::{debug, debug_span, info, warn, Instrument as _};

use crate::{
    config::ApiConfig,
    error::{ApiError, ApiResult},
    service::{ApiService, ApiStream},
    session::{SessionEvent, SessionEvents},
    types::*,
    validate,
};

const SESSION_COOKIE: &str = "session";

pub struct RpcApiService {
    config: ApiConfig,
    http: reqwest::Client,
    /// Rebuilt whenever the session changes, since the cookie is a default
    /// header of the client.
    rpc: RwLock<Arc<HttpClient>>,
    session: RwLock<Option<String>>,
    events: SessionEvents,
}

impl RpcApiService {
    pub fn new(config: ApiConfig) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        let rpc = http_client(&config, config.session.as_deref())?;
        Ok(RpcApiService {
            http,
            rpc: RwLock::new(Arc::new(rpc)),
            session: RwLock::new(config.session.clone()),
            events: SessionEvents::default(),
            config,
        })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// The current session token, to be stored for later invocations.
    pub fn session(&self) -> Option<String> {
        self.session.read().expect("session lock poisoned").clone()
    }

    pub fn events(&self) -> &SessionEvents {
        &self.events
    }

    fn set_session(&self, session: Option<String>) -> ApiResult<()> {
        let rpc = http_client(&self.config, session.as_deref())?;
        *self.rpc.write().expect("client lock poisoned") = Arc::new(rpc);
        *self.session.write().expect("session lock poisoned") = session;
        Ok(())
    }

    fn rpc_client(&self) -> Arc<HttpClient> {
        self.rpc.read().expect("client lock poisoned").clone()
    }

    async fn ws_client(&self) -> ApiResult<WsClient> {
        let session = self.session();
        Ok(WsClientBuilder::default()
            .set_headers(headers(session.as_deref())?)
            .request_timeout(self.config.request_timeout)
            .build(&self.config.ws_url)
            .await?)
    }

    fn with_cookie(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.session() {
            Some(session) => request.header("cookie", format!("{}={}", SESSION_COOKIE, session)),
            None => request,
        }
    }

    /// Report failures that concern the session. The result is passed through.
    async fn observe<T>(&self, method: &str, result: ApiResult<T>) -> ApiResult<T> {
        match &result {
            Err(e) if e.is_unauthorized() => {
                warn!(method, "Session is not authorized");
                self.events
                    .publish(SessionEvent::Unauthorized {
                        method: method.to_owned(),
                    })
                    .await;
            }
            Err(e) => debug!(method, error = %e, "Call failed"),
            Ok(_) => {}
        }
        result
    }

    async fn call<R: DeserializeOwned>(
        &self,
        method: &str,
        params: impl Serialize + Send,
    ) -> ApiResult<R> {
        let params = to_params(params)?;
        let client = self.rpc_client();
        let result = client
            .request::<R, _>(method, params)
            .instrument(debug_span!("rpc call", method))
            .await
            .map_err(ApiError::from);
        self.observe(method, result).await
    }

    async fn command(&self, method: &str, params: impl Serialize + Send) -> ApiResult<Accepted> {
        let _: Value = self.call(method, params).await?;
        Ok(Accepted)
    }

    /// Open a subscription on its own websocket. The connection lives as long
    /// as the returned stream.
    async fn follow<T: DeserializeOwned + Send + 'static>(
        &self,
        method: &'static str,
        unsubscribe: &'static str,
        params: impl Serialize + Send,
    ) -> ApiResult<ApiStream<T>> {
        let params = to_params(params)?;
        let result = async {
            let client = self.ws_client().await?;
            let subscription = client.subscribe::<T, _>(method, params, unsubscribe).await?;
            Ok::<_, ApiError>((client, subscription))
        }
        .instrument(debug_span!("rpc subscribe", method))
        .await;
        let (client, subscription) = self.observe(method, result).await?;
        Ok(subscription
            .map(move |item| {
                let _connection = &client;
                item.map_err(ApiError::from)
            })
            .boxed())
    }

    async fn post_login(&self, req: &LoginReq) -> ApiResult<Option<String>> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 0,
            "method": "auth.login",
            "params": req,
        });
        let response = self
            .http
            .post(&self.config.rpc_url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let session = response
            .headers()
            .get_all("set-cookie")
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(session_cookie);
        let reply: LoginReply = response.json().await?;
        if let Some(error) = reply.error {
            return Err(ApiError::from_code(error.code, error.message));
        }
        Ok(session)
    }
}

#[derive(Deserialize)]
struct LoginReply {
    #[serde(default)]
    error: Option<RemoteError>,
}

#[derive(Deserialize)]
struct RemoteError {
    code: i32,
    message: String,
}

fn headers(session: Option<&str>) -> ApiResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    if let Some(session) = session {
        let value = HeaderValue::from_str(&format!("{}={}", SESSION_COOKIE, session))
            .map_err(|e| ApiError::validation(format!("invalid session token: {}", e)))?;
        headers.insert("cookie", value);
    }
    Ok(headers)
}

fn http_client(config: &ApiConfig, session: Option<&str>) -> ApiResult<HttpClient> {
    Ok(HttpClient::builder()
        .set_headers(headers(session)?)
        .request_timeout(config.request_timeout)
        .build(&config.rpc_url)?)
}

/// Requests go out as named parameters; `()` means none.
fn to_params(params: impl Serialize) -> ApiResult<Map<String, Value>> {
    match serde_json::to_value(params)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(ApiError::validation(format!(
            "parameters must be an object, got {}",
            other
        ))),
    }
}

/// The token of a `set-cookie` header, if it sets the session.
fn session_cookie(header: &str) -> Option<String> {
    let pair = header.split(';').next()?.trim();
    let (name, value) = pair.split_once('=')?;
    if name.trim() != SESSION_COOKIE || value.is_empty() {
        return None;
    }
    Some(value.to_owned())
}

fn sync_error(e: ApiError) -> SyncError {
    match e {
        ApiError::Unauthorized(_) => SyncError::Unauthorized,
        e => SyncError::Transport(e.to_string()),
    }
}

#[async_trait]
impl ApiService for RpcApiService {
    async fn get_static(&self, url: &str) -> ApiResult<String> {
        validate::non_empty("url", url)?;
        let result = async {
            let response = self
                .with_cookie(self.http.get(self.config.url(url)))
                .send()
                .await?
                .error_for_status()?;
            Ok::<_, ApiError>(response.text().await?)
        }
        .await;
        self.observe(url, result).await
    }

    async fn upload_package(&self, guid: &UploadId, body: Vec<u8>) -> ApiResult<Accepted> {
        validate::non_empty("upload id", &guid.0)?;
        validate::upload_body(&body)?;
        let path = format!("/rest/rpc/{}", guid);
        let result = async {
            self.with_cookie(self.http.post(self.config.url(&path)))
                .body(body)
                .send()
                .await?
                .error_for_status()?;
            Ok::<_, ApiError>(Accepted)
        }
        .instrument(debug_span!("upload", guid = %guid))
        .await;
        self.observe(&path, result).await
    }

    async fn upload_file(&self, body: Vec<u8>) -> ApiResult<UploadId> {
        validate::upload_body(&body)?;
        let result = async {
            let response = self
                .with_cookie(self.http.post(self.config.url("/rest/upload")))
                .body(body)
                .send()
                .await?
                .error_for_status()?;
            Ok::<_, ApiError>(response.json::<UploadId>().await?)
        }
        .await;
        self.observe("/rest/upload", result).await
    }

    async fn echo(&self, req: EchoReq) -> ApiResult<String> {
        self.call("echo", req).await
    }

    async fn get_state(&self) -> ApiResult<ServerState> {
        self.call("state", ()).await
    }

    async fn set_db_value(&self, path: &DbPath, value: Value) -> ApiResult<Accepted> {
        if path.is_root() {
            return Err(ApiError::validation("cannot replace the whole database"));
        }
        self.command("db.put", json!({ "pointer": path.to_pointer(), "value": value }))
            .await
    }

    async fn login(&self, req: LoginReq) -> ApiResult<Accepted> {
        validate::password(&req.password)?;
        let result = self
            .post_login(&req)
            .instrument(debug_span!("rpc call", method = "auth.login"))
            .await;
        if let Some(session) = self.observe("auth.login", result).await? {
            self.set_session(Some(session))?;
        }
        info!("Logged in");
        self.events.publish(SessionEvent::LoggedIn).await;
        Ok(Accepted)
    }

    async fn logout(&self) -> ApiResult<Accepted> {
        self.command("auth.logout", ()).await?;
        self.set_session(None)?;
        info!("Logged out");
        self.events.publish(SessionEvent::LoggedOut).await;
        Ok(Accepted)
    }

    async fn get_sessions(&self) -> ApiResult<Sessions> {
        self.call("auth.session.list", ()).await
    }

    async fn kill_sessions(&self, req: KillSessionsReq) -> ApiResult<Accepted> {
        validate::non_empty_list("session ids", &req.ids)?;
        self.command("auth.session.kill", req).await
    }

    async fn reset_password(&self, req: ResetPasswordReq) -> ApiResult<Accepted> {
        validate::password(&req.old_password)?;
        validate::password(&req.new_password)?;
        self.command("auth.reset-password", req).await
    }

    async fn diagnostic_get_error(&self) -> ApiResult<DiagnosticError> {
        self.call("diagnostic.error", ()).await
    }

    async fn diagnostic_restart(&self) -> ApiResult<Accepted> {
        self.command("diagnostic.restart", ()).await
    }

    async fn diagnostic_forget_drive(&self) -> ApiResult<Accepted> {
        self.command("diagnostic.disk.forget", ()).await
    }

    async fn diagnostic_repair_disk(&self) -> ApiResult<Accepted> {
        self.command("diagnostic.disk.repair", ()).await
    }

    async fn diagnostic_get_logs(&self, req: LogsReq) -> ApiResult<LogsRes> {
        self.call("diagnostic.logs", req).await
    }

    async fn init_get_progress(&self) -> ApiResult<InitProgress> {
        self.call("init.subscribe", ()).await
    }

    async fn init_follow_logs(&self, req: FollowLogsReq) -> ApiResult<ApiStream<LogEntry>> {
        self.follow("init.logs.follow", "init.logs.unfollow", req)
            .await
    }

    async fn get_system_time(&self) -> ApiResult<SystemTime> {
        self.call("server.time", ()).await
    }

    async fn get_server_logs(&self, req: LogsReq) -> ApiResult<LogsRes> {
        self.call("server.logs", req).await
    }

    async fn get_kernel_logs(&self, req: LogsReq) -> ApiResult<LogsRes> {
        self.call("server.kernel-logs", req).await
    }

    async fn get_tor_logs(&self, req: LogsReq) -> ApiResult<LogsRes> {
        self.call("net.tor.logs", req).await
    }

    async fn follow_server_logs(&self, req: FollowLogsReq) -> ApiResult<ApiStream<LogEntry>> {
        self.follow("server.logs.follow", "server.logs.unfollow", req)
            .await
    }

    async fn follow_kernel_logs(&self, req: FollowLogsReq) -> ApiResult<ApiStream<LogEntry>> {
        self.follow(
            "server.kernel-logs.follow",
            "server.kernel-logs.unfollow",
            req,
        )
        .await
    }

    async fn follow_tor_logs(&self, req: FollowLogsReq) -> ApiResult<ApiStream<LogEntry>> {
        self.follow("net.tor.logs.follow", "net.tor.logs.unfollow", req)
            .await
    }

    async fn get_server_metrics(&self) -> ApiResult<Metrics> {
        self.call("server.metrics", ()).await
    }

    async fn get_package_metrics(&self, req: PackageReq) -> ApiResult<Metrics> {
        self.call("package.metrics", req).await
    }

    async fn update_server(&self, req: UpdateServerReq) -> ApiResult<UpdateServerRes> {
        validate::non_empty("registry", &req.registry)?;
        self.call("server.update", req).await
    }

    async fn restart_server(&self) -> ApiResult<Accepted> {
        self.command("server.restart", ()).await
    }

    async fn shutdown_server(&self) -> ApiResult<Accepted> {
        self.command("server.shutdown", ()).await
    }

    async fn repair_disk(&self) -> ApiResult<Accepted> {
        self.command("disk.repair", ()).await
    }

    async fn reset_tor(&self, req: ResetTorReq) -> ApiResult<Accepted> {
        self.command("net.tor.reset", req).await
    }

    async fn marketplace_proxy(&self, path: &str, params: Value, url: &str) -> ApiResult<Value> {
        validate::non_empty("marketplace url", url)?;
        let url = format!("{}{}", url.trim_end_matches('/'), path);
        self.call("marketplace.get", json!({ "url": url, "params": params }))
            .await
    }

    async fn check_os_update(&self, req: CheckOsUpdateReq, url: &str) -> ApiResult<OsUpdate> {
        validate::non_empty("server id", &req.server_id)?;
        let params = serde_json::to_value(req)?;
        let update = self.marketplace_proxy("/eos/v0/latest", params, url).await?;
        Ok(serde_json::from_value(update)?)
    }

    async fn get_notifications(&self, req: GetNotificationsReq) -> ApiResult<Vec<Notification>> {
        self.call("notification.list", req).await
    }

    async fn delete_notification(&self, req: DeleteNotificationReq) -> ApiResult<Accepted> {
        self.command("notification.delete", req).await
    }

    async fn delete_all_notifications(
        &self,
        req: DeleteAllNotificationsReq,
    ) -> ApiResult<Accepted> {
        self.command("notification.delete-before", req).await
    }

    async fn get_wifi(&self, timeout: Duration) -> ApiResult<WifiInfo> {
        validate::scan_timeout(timeout, self.config.wifi_scan_timeout_max)?;
        match tokio::time::timeout(timeout, self.call::<WifiInfo>("wifi.get", ())).await {
            Ok(result) => result,
            Err(_) => {
                debug!(?timeout, "Wifi scan timed out");
                Err(ApiError::Timeout)
            }
        }
    }

    async fn set_wifi_country(&self, req: SetWifiCountryReq) -> ApiResult<Accepted> {
        validate::non_empty("country", &req.country)?;
        self.command("wifi.country.set", req).await
    }

    async fn add_wifi(&self, req: AddWifiReq) -> ApiResult<Accepted> {
        validate::non_empty("ssid", &req.ssid)?;
        self.command("wifi.add", req).await
    }

    async fn connect_wifi(&self, req: SsidReq) -> ApiResult<Accepted> {
        validate::non_empty("ssid", &req.ssid)?;
        self.command("wifi.connect", req).await
    }

    async fn delete_wifi(&self, req: SsidReq) -> ApiResult<Accepted> {
        validate::non_empty("ssid", &req.ssid)?;
        self.command("wifi.delete", req).await
    }

    async fn get_ssh_keys(&self) -> ApiResult<Vec<SshKey>> {
        self.call("ssh.list", ()).await
    }

    async fn add_ssh_key(&self, req: AddSshKeyReq) -> ApiResult<SshKey> {
        validate::non_empty("key", &req.key)?;
        self.call("ssh.add", req).await
    }

    async fn delete_ssh_key(&self, req: DeleteSshKeyReq) -> ApiResult<Accepted> {
        validate::non_empty("fingerprint", &req.fingerprint)?;
        self.command("ssh.delete", req).await
    }

    async fn get_backup_targets(&self) -> ApiResult<BackupTargets> {
        self.call("backup.target.list", ()).await
    }

    async fn add_backup_target(&self, req: BackupTargetReq) -> ApiResult<BackupTargets> {
        validate::non_empty("hostname", &req.hostname)?;
        validate::non_empty("path", &req.path)?;
        self.call("backup.target.cifs.add", req).await
    }

    async fn update_backup_target(&self, req: UpdateBackupTargetReq) -> ApiResult<BackupTargets> {
        validate::non_empty("target id", &req.id)?;
        validate::non_empty("hostname", &req.target.hostname)?;
        validate::non_empty("path", &req.target.path)?;
        self.call("backup.target.cifs.update", req).await
    }

    async fn remove_backup_target(&self, req: RemoveBackupTargetReq) -> ApiResult<Accepted> {
        validate::non_empty("target id", &req.id)?;
        self.command("backup.target.cifs.remove", req).await
    }

    async fn get_backup_info(&self, req: GetBackupInfoReq) -> ApiResult<Value> {
        validate::non_empty("target id", &req.target_id)?;
        validate::password(&req.password)?;
        self.call("backup.target.info", req).await
    }

    async fn create_backup(&self, req: CreateBackupReq) -> ApiResult<Accepted> {
        validate::non_empty("target id", &req.target_id)?;
        validate::password(&req.password)?;
        self.command("backup.create", req).await
    }

    async fn get_package_properties(&self, req: PackageReq) -> ApiResult<Value> {
        self.call("package.properties", req).await
    }

    async fn get_package_logs(&self, req: PackageLogsReq) -> ApiResult<LogsRes> {
        self.call("package.logs", req).await
    }

    async fn follow_package_logs(
        &self,
        req: FollowPackageLogsReq,
    ) -> ApiResult<ApiStream<LogEntry>> {
        self.follow("package.logs.follow", "package.logs.unfollow", req)
            .await
    }

    async fn install_package(&self, req: InstallPackageReq) -> ApiResult<Accepted> {
        validate::non_empty("marketplace url", &req.marketplace_url)?;
        validate::non_empty("version", &req.version)?;
        self.command("package.install", req).await
    }

    async fn get_package_config(&self, req: PackageReq) -> ApiResult<PackageConfig> {
        self.call("package.config.get", req).await
    }

    async fn dry_set_package_config(&self, req: SetPackageConfigReq) -> ApiResult<Value> {
        self.call("package.config.set.dry", req).await
    }

    async fn set_package_config(&self, req: SetPackageConfigReq) -> ApiResult<Accepted> {
        self.command("package.config.set", req).await
    }

    async fn restore_packages(&self, req: RestorePackagesReq) -> ApiResult<Accepted> {
        validate::non_empty_list("package ids", &req.ids)?;
        validate::non_empty("target id", &req.target_id)?;
        validate::password(&req.password)?;
        self.command("package.backup.restore", req).await
    }

    async fn execute_package_action(&self, req: ExecutePackageActionReq) -> ApiResult<Value> {
        validate::non_empty("action id", &req.action_id)?;
        self.call("package.action", req).await
    }

    async fn start_package(&self, req: PackageReq) -> ApiResult<Accepted> {
        self.command("package.start", req).await
    }

    async fn restart_package(&self, req: PackageReq) -> ApiResult<Accepted> {
        self.command("package.restart", req).await
    }

    async fn stop_package(&self, req: PackageReq) -> ApiResult<Accepted> {
        self.command("package.stop", req).await
    }

    async fn uninstall_package(&self, req: PackageReq) -> ApiResult<Accepted> {
        self.command("package.uninstall", req).await
    }

    async fn dry_configure_dependency(&self, req: DryConfigureDependencyReq) -> ApiResult<Value> {
        self.call("package.dependency.configure.dry", req).await
    }

    async fn sideload_package(&self, req: SideloadPackageReq) -> ApiResult<SideloadPackageRes> {
        validate::non_empty("icon", &req.icon)?;
        self.call("package.sideload", req).await
    }

    async fn follow_install_progress(&self, guid: &str) -> ApiResult<ApiStream<FullProgress>> {
        validate::non_empty("progress id", guid)?;
        self.follow(
            "package.install.progress.follow",
            "package.install.progress.unfollow",
            json!({ "guid": guid }),
        )
        .await
    }
}

#[async_trait]
impl PatchSource for RpcApiService {
    async fn subscribe(
        &self,
        from_cursor: Option<SequenceId>,
    ) -> Result<PatchSubscription, SyncError> {
        let result = async {
            let client = self.ws_client().await?;
            let subscription = client
                .subscribe::<Value, _>(
                    "db.subscribe",
                    to_params(json!({ "fromCursor": from_cursor }))?,
                    "db.unsubscribe",
                )
                .await?;
            Ok::<_, ApiError>((client, subscription))
        }
        .instrument(debug_span!("rpc subscribe", method = "db.subscribe"))
        .await;
        let (client, mut subscription) = self
            .observe("db.subscribe", result)
            .await
            .map_err(sync_error)?;

        let first = subscription
            .next()
            .await
            .ok_or(SyncError::StreamClosed)?
            .map_err(|e| SyncError::InvalidSnapshot(e.to_string()))?;
        let snapshot: Snapshot =
            serde_json::from_value(first).map_err(|e| SyncError::InvalidSnapshot(e.to_string()))?;
        debug!(sequence = snapshot.sequence_id, "Received snapshot");

        let patches = subscription
            .map(move |item| {
                let _connection = &client;
                item.map_err(|e| SyncError::Transport(e.to_string()))
            })
            .boxed();
        Ok(PatchSubscription { snapshot, patches })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use startos_client_core::id::PackageId;

    /// Nothing listens on the discard port, so any request that does go out
    /// fails with a network error.
    fn unreachable_service() -> RpcApiService {
        let mut config = ApiConfig::new("http://127.0.0.1:9").unwrap();
        config.request_timeout = Duration::from_secs(2);
        RpcApiService::new(config).unwrap()
    }

    fn bitcoind() -> PackageId {
        "bitcoind".parse().unwrap()
    }

    #[tokio::test]
    async fn test_validation_happens_before_sending() {
        let api = unreachable_service();

        let e = api.get_wifi(Duration::ZERO).await.unwrap_err();
        assert!(matches!(e, ApiError::Validation(_)), "{:?}", e);
        let e = api.get_wifi(Duration::from_secs(61)).await.unwrap_err();
        assert!(matches!(e, ApiError::Validation(_)), "{:?}", e);

        let e = api
            .install_package(InstallPackageReq {
                id: bitcoind(),
                marketplace_url: "https://registry.start9.com".to_owned(),
                version: "".to_owned(),
            })
            .await
            .unwrap_err();
        assert!(matches!(e, ApiError::Validation(_)), "{:?}", e);

        let e = api.upload_file(vec![]).await.unwrap_err();
        assert!(matches!(e, ApiError::Validation(_)), "{:?}", e);

        let e = api
            .login(LoginReq {
                password: "".to_owned(),
                metadata: Value::Null,
                ephemeral: false,
            })
            .await
            .unwrap_err();
        assert!(matches!(e, ApiError::Validation(_)), "{:?}", e);

        let e = api
            .set_db_value(&DbPath::root(), json!({}))
            .await
            .unwrap_err();
        assert!(matches!(e, ApiError::Validation(_)), "{:?}", e);

        let e = api
            .add_wifi(AddWifiReq {
                ssid: " ".to_owned(),
                password: "hunter2".to_owned(),
                priority: 0,
                connect: true,
            })
            .await
            .unwrap_err();
        assert!(matches!(e, ApiError::Validation(_)), "{:?}", e);
    }

    #[tokio::test]
    async fn test_network_failure() {
        let api = unreachable_service();
        let e = api.get_state().await.unwrap_err();
        assert!(
            matches!(e, ApiError::Network(_) | ApiError::Timeout),
            "{:?}",
            e
        );
        assert!(!e.is_unauthorized());
    }

    #[test]
    fn test_session_cookie() {
        assert_eq!(
            session_cookie("session=abc123; Path=/; HttpOnly"),
            Some("abc123".to_owned())
        );
        assert_eq!(session_cookie("session=abc123"), Some("abc123".to_owned()));
        assert_eq!(session_cookie("other=abc123; Path=/"), None);
        assert_eq!(session_cookie("session=; Max-Age=0"), None);
    }

    #[test]
    fn test_params() {
        assert_eq!(to_params(()).unwrap(), Map::new());
        let params = to_params(PackageReq { id: bitcoind() }).unwrap();
        assert_eq!(params.get("id"), Some(&json!("bitcoind")));
        assert!(to_params(json!([1, 2])).is_err());
    }

    #[tokio::test]
    async fn test_session_header() {
        let service = RpcApiService::new(
            ApiConfig::new("http://127.0.0.1:9")
                .unwrap()
                .with_session(Some("abc".to_owned())),
        )
        .unwrap();
        assert_eq!(service.session(), Some("abc".to_owned()));
        assert!(headers(Some("bad\nvalue")).is_err());
        assert_eq!(
            headers(Some("abc")).unwrap().get("cookie").unwrap(),
            "session=abc"
        );
        service.set_session(None).unwrap();
        assert_eq!(service.session(), None);
    }

    #[test]
    fn test_sync_errors() {
        assert_eq!(
            sync_error(ApiError::Unauthorized("expired".to_owned())),
            SyncError::Unauthorized
        );
        assert!(matches!(
            sync_error(ApiError::Timeout),
            SyncError::Transport(_)
        ));
    }
}
