//! Typed access to the package entries of the store.

use std::collections::BTreeMap;

use futures_util::{Stream, StreamExt as _};
use startos_client_core::{
    id::PackageId,
    lifecycle::{package_state, PackageState, Transition},
    model::{Document, PackageDataEntry},
    patch::DbPath,
};
use tracing::{debug, warn};

use crate::store::Store;

pub type Packages = BTreeMap<PackageId, PackageDataEntry>;

pub fn packages_path() -> DbPath {
    DbPath::root().join(Document::PACKAGE_DATA)
}

pub fn package_path(id: &PackageId) -> DbPath {
    packages_path().join(id.as_str())
}

impl Store {
    pub fn get_package(&self, id: &PackageId) -> Result<Option<PackageDataEntry>, serde_json::Error> {
        self.get_as(&package_path(id))
    }

    pub fn get_all_packages(&self) -> Result<Packages, serde_json::Error> {
        Ok(self.get_as(&packages_path())?.unwrap_or_default())
    }

    /// Follow one package entry. `None` while the package is not installed
    /// at all.
    ///
    /// Lifecycle transitions that the server is not expected to make are
    /// logged, but still passed on.
    pub fn watch_package(
        &self,
        id: &PackageId,
    ) -> impl Stream<Item = Result<Option<PackageDataEntry>, serde_json::Error>> {
        let id = id.clone();
        let mut previous: Option<Option<PackageState>> = None;
        self.watch(&package_path(&id))
            .typed::<PackageDataEntry>()
            .inspect(move |entry| {
                let Ok(entry) = entry else { return };
                let state = entry.as_ref().map(package_state);
                if let Some(from) = previous {
                    match Transition::between(from, state) {
                        Transition::Unchanged => {}
                        t if t.is_expected() => debug!(package = %id, transition = ?t, "package changed state"),
                        t => warn!(package = %id, transition = ?t, "unexpected package state transition"),
                    }
                }
                previous = Some(state);
            })
    }

    pub fn watch_all_packages(&self) -> impl Stream<Item = Result<Packages, serde_json::Error>> {
        self.watch(&packages_path())
            .typed::<Packages>()
            .map(|packages| packages.map(Option::unwrap_or_default))
    }
}
