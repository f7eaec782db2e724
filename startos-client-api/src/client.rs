use std::sync::Arc;

use serde_json::Value;
use startos_client_core::patch::DbPath;
use startos_client_db::{PatchSource, Store, SyncConfig, SyncHandle};
use tracing::debug;

use crate::{
    error::ApiResult,
    service::ApiService,
    types::Accepted,
};

/// A connected client: the API, plus a replica of the server database that is
/// kept current in the background.
pub struct Client<A> {
    api: Arc<A>,
    store: Arc<Store>,
    sync: SyncHandle,
}

impl<A> Client<A>
where
    A: ApiService + PatchSource + 'static,
{
    /// Start synchronizing the database. Must be called within a tokio
    /// runtime.
    pub fn connect(api: Arc<A>, config: SyncConfig) -> Self {
        let store = Arc::new(Store::new());
        let sync = startos_client_db::spawn(store.clone(), api.clone(), config);
        Client { api, store, sync }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn sync(&self) -> &SyncHandle {
        &self.sync
    }

    /// Write a client-owned value. Readers of
    /// [`get_optimistic`](Store::get_optimistic) see it right away; the
    /// confirmed document only changes when the server's patch arrives.
    pub async fn set_value(&self, path: DbPath, value: Value) -> ApiResult<Accepted> {
        self.store.set_optimistic(path.clone(), value.clone());
        let result = self.api.set_db_value(&path, value).await;
        if let Err(e) = &result {
            debug!(%path, error = %e, "Write refused, dropping optimistic value");
            self.store.clear_optimistic(&path);
        }
        result
    }

    pub fn shutdown(self) {
        self.sync.shutdown();
    }
}
