//! The local replica of the server document.

use std::{fmt::Display, str::FromStr, sync::RwLock};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use startos_client_core::patch::{
    DbPath, MalformedPatch, Patch, PatchOperation, PathSegment, SequenceId, Snapshot,
};
use tracing::trace;

use crate::watch::{Watch, WatchTree};

/// In-memory mirror of the server document.
///
/// Only the [`Synchronizer`](crate::Synchronizer) changes the document. Any
/// number of readers and watchers may use the store concurrently; a patch is
/// applied and all affected watchers are notified under one write lock, so
/// nobody observes a half-applied patch.
pub struct Store {
    state: RwLock<StoreState>,
}

struct StoreState {
    document: Value,
    /// Sequence id of the last applied snapshot or patch
    sequence: Option<SequenceId>,
    /// Optimistic values written by this client and not yet confirmed, oldest
    /// first
    overlay: Vec<(DbPath, Value)>,
    watchers: WatchTree,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Store {
            state: RwLock::new(StoreState {
                document: Value::Null,
                sequence: None,
                overlay: Vec::new(),
                watchers: WatchTree::default(),
            }),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StoreState> {
        self.state.read().expect("store lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StoreState> {
        self.state.write().expect("store lock poisoned")
    }

    /// Sequence id the document corresponds to; `None` before the first snapshot.
    pub fn sequence(&self) -> Option<SequenceId> {
        self.read().sequence
    }

    /// The confirmed value at `path`.
    pub fn get(&self, path: &DbPath) -> Option<Value> {
        path.get(&self.read().document).cloned()
    }

    /// The confirmed value at `path`, decoded.
    pub fn get_as<T: DeserializeOwned>(&self, path: &DbPath) -> Result<Option<T>, serde_json::Error> {
        self.get(path).map(serde_json::from_value).transpose()
    }

    /// Run `f` against the confirmed document without copying it.
    pub fn peek<R>(&self, f: impl FnOnce(&Value) -> R) -> R {
        f(&self.read().document)
    }

    /// Subscribe to the value at `path`. See [`Watch`].
    pub fn watch(&self, path: &DbPath) -> Watch {
        let mut state = self.write();
        let current = path.get(&state.document).cloned();
        state.watchers.register(path, current)
    }

    pub fn watcher_count(&self) -> usize {
        self.read().watchers.count()
    }

    /// Record a value written by this client before the server confirms it.
    ///
    /// The overlay is only visible through [`Store::get_optimistic`]. It is
    /// discarded as soon as a confirmed patch touches an overlapping path.
    pub fn set_optimistic(&self, path: DbPath, value: Value) {
        let mut state = self.write();
        state.overlay.retain(|(written, _)| !path.is_prefix_of(written));
        state.overlay.push((path, value));
    }

    /// Forget an optimistic value, e.g. because the write was refused.
    pub fn clear_optimistic(&self, path: &DbPath) {
        self.write().overlay.retain(|(written, _)| written != path);
    }

    /// The value at `path` with unconfirmed local writes laid over it.
    pub fn get_optimistic(&self, path: &DbPath) -> Option<Value> {
        let state = self.read();
        let mut value = path.get(&state.document).cloned();
        // Later writes win
        for (written, written_value) in state.overlay.iter() {
            if written.is_prefix_of(path) {
                let rest = DbPath(path.segments()[written.segments().len()..].to_vec());
                value = rest.get(written_value).cloned();
            } else if path.is_prefix_of(written) {
                let rest = &written.segments()[path.segments().len()..];
                let target = value.get_or_insert_with(|| Value::Object(Map::new()));
                set_in(target, rest, written_value.clone());
            }
        }
        value
    }

    /// Apply one patch. Callers guarantee that it is the next in sequence.
    pub(crate) fn apply(&self, patch: &Patch) -> Result<(), MalformedPatch> {
        let mut state = self.write();
        debug_assert_eq!(
            state.sequence.and_then(|s| s.checked_add(1)),
            Some(patch.sequence_id),
            "patches must be applied in sequence"
        );
        apply_operation(&mut state.document, patch)?;
        state.sequence = Some(patch.sequence_id);
        state.overlay.retain(|(written, _)| !written.overlaps(&patch.path));
        let StoreState {
            document, watchers, ..
        } = &mut *state;
        watchers.notify(document, &patch.path);
        trace!(sequence_id = patch.sequence_id, path = %patch.path, "applied patch");
        Ok(())
    }

    /// Replace the whole document with a snapshot and re-notify all watchers.
    pub(crate) fn replace(&self, snapshot: Snapshot) {
        let mut state = self.write();
        state.document = snapshot.full_document;
        state.sequence = Some(snapshot.sequence_id);
        state.overlay.clear();
        let StoreState {
            document, watchers, ..
        } = &mut *state;
        watchers.notify_all(document);
    }
}

fn malformed(patch: &Patch, reason: impl Display) -> MalformedPatch {
    MalformedPatch {
        sequence_id: Some(patch.sequence_id),
        reason: format!("{} at {}", reason, patch.path),
    }
}

fn pointer<P>(patch: &Patch) -> Result<P, MalformedPatch>
where
    P: FromStr,
    P::Err: Display,
{
    patch
        .path
        .to_pointer()
        .parse()
        .map_err(|e| malformed(patch, e))
}

/// Translate the patch into a JSON Patch operation and apply it. Nothing is
/// changed when this fails.
fn apply_operation(document: &mut Value, patch: &Patch) -> Result<(), MalformedPatch> {
    if patch.path.is_root() {
        return match &patch.operation {
            PatchOperation::Set { value } => {
                *document = value.clone();
                Ok(())
            }
            PatchOperation::Delete => Err(malformed(patch, "cannot delete the document root")),
        };
    }
    if let Some((PathSegment::Key(last), parent)) = patch.path.segments().split_last() {
        // JSON Pointer's `-` names the end of an array, not an element
        if last == "-" && DbPath(parent.to_vec()).get(document).is_some_and(Value::is_array) {
            return Err(malformed(patch, "`-` is not an array index"));
        }
    }
    let operation = match &patch.operation {
        // `add` would insert into arrays, so existing locations are replaced
        PatchOperation::Set { value } if patch.path.get(document).is_some() => {
            json_patch::PatchOperation::Replace(json_patch::ReplaceOperation {
                path: pointer(patch)?,
                value: value.clone(),
            })
        }
        PatchOperation::Set { value } => json_patch::PatchOperation::Add(json_patch::AddOperation {
            path: pointer(patch)?,
            value: value.clone(),
        }),
        PatchOperation::Delete => {
            json_patch::PatchOperation::Remove(json_patch::RemoveOperation {
                path: pointer(patch)?,
            })
        }
    };
    json_patch::patch(document, &[operation]).map_err(|e| malformed(patch, e))
}

/// Best-effort write into a detached value, creating objects along the way.
fn set_in(target: &mut Value, path: &[PathSegment], value: Value) {
    let Some((first, rest)) = path.split_first() else {
        *target = value;
        return;
    };
    if !target.is_object() && !target.is_array() {
        *target = Value::Object(Map::new());
    }
    let child = match target {
        Value::Array(items) => match first {
            PathSegment::Index(i) if *i < items.len() => &mut items[*i],
            _ => return,
        },
        Value::Object(map) => map
            .entry(first.token())
            .or_insert_with(|| Value::Object(Map::new())),
        _ => return,
    };
    set_in(child, rest, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{FutureExt as _, StreamExt as _};
    use serde_json::json;

    fn path(s: &str) -> DbPath {
        DbPath::parse_dotted(s)
    }

    fn loaded(sequence_id: SequenceId, document: Value) -> Store {
        let store = Store::new();
        store.replace(Snapshot {
            sequence_id,
            full_document: document,
        });
        store
    }

    fn drain(w: &mut Watch) -> Vec<Option<Value>> {
        let mut r = Vec::new();
        while let Some(Some(v)) = w.next().now_or_never() {
            r.push(v);
        }
        r
    }

    #[test]
    fn test_empty_store() {
        let store = Store::new();
        assert_eq!(store.sequence(), None);
        assert_eq!(store.get(&DbPath::root()), Some(Value::Null));
        assert_eq!(store.get(&path("packageData")), None);
    }

    #[test]
    fn test_apply_set_and_delete() {
        let store = loaded(1, json!({ "packageData": {} }));
        store
            .apply(&Patch::set(2, path("packageData.foo"), json!({ "v": 1 })))
            .unwrap();
        assert_eq!(store.get(&path("packageData.foo.v")), Some(json!(1)));
        store
            .apply(&Patch::set(3, path("packageData.foo.v"), json!(2)))
            .unwrap();
        assert_eq!(store.get(&path("packageData.foo.v")), Some(json!(2)));
        store
            .apply(&Patch::delete(4, path("packageData.foo")))
            .unwrap();
        assert_eq!(store.get(&path("packageData")), Some(json!({})));
        assert_eq!(store.sequence(), Some(4));
    }

    #[test]
    fn test_set_replaces_array_items() {
        let store = loaded(1, json!({ "list": [1, 2, 3] }));
        store.apply(&Patch::set(2, path("list.1"), json!(20))).unwrap();
        assert_eq!(store.get(&path("list")), Some(json!([1, 20, 3])));
        store.apply(&Patch::set(3, path("list.3"), json!(4))).unwrap();
        assert_eq!(store.get(&path("list")), Some(json!([1, 20, 3, 4])));
    }

    #[test]
    fn test_set_root() {
        let store = loaded(1, json!({ "a": 1 }));
        store
            .apply(&Patch::set(2, DbPath::root(), json!({ "b": 2 })))
            .unwrap();
        assert_eq!(store.get(&DbPath::root()), Some(json!({ "b": 2 })));
    }

    #[test]
    fn test_unappliable_patch_changes_nothing() {
        let store = loaded(1, json!({ "a": 1 }));
        let mut w = store.watch(&DbPath::root());
        drain(&mut w);
        for patch in [
            Patch::set(2, path("missing.parent"), json!(1)),
            Patch::delete(2, path("missing")),
            Patch::set(2, path("a.below_a_number"), json!(1)),
            Patch::delete(2, DbPath::root()),
        ] {
            let e = store.apply(&patch).unwrap_err();
            assert_eq!(e.sequence_id, Some(2));
        }
        assert_eq!(store.get(&DbPath::root()), Some(json!({ "a": 1 })));
        assert_eq!(store.sequence(), Some(1));
        assert_eq!(drain(&mut w), vec![]);
    }

    #[test]
    fn test_watch_follows_patches() {
        let store = loaded(1, json!({ "packageData": {} }));
        let mut w = store.watch(&path("packageData.foo"));
        assert_eq!(drain(&mut w), vec![None]);
        store
            .apply(&Patch::set(2, path("packageData.foo"), json!({ "v": 1 })))
            .unwrap();
        store
            .apply(&Patch::set(3, path("packageData.foo.v"), json!(2)))
            .unwrap();
        store
            .apply(&Patch::set(4, path("packageData.bar"), json!({})))
            .unwrap();
        assert_eq!(
            drain(&mut w),
            vec![Some(json!({ "v": 1 })), Some(json!({ "v": 2 }))]
        );
    }

    #[test]
    fn test_replace_renotifies_watchers() {
        let store = loaded(1, json!({ "a": 1, "b": 1 }));
        let mut wa = store.watch(&path("a"));
        let mut wb = store.watch(&path("b"));
        drain(&mut wa);
        drain(&mut wb);
        store.replace(Snapshot {
            sequence_id: 10,
            full_document: json!({ "a": 2, "b": 1 }),
        });
        assert_eq!(drain(&mut wa), vec![Some(json!(2))]);
        assert_eq!(drain(&mut wb), vec![]);
        assert_eq!(store.sequence(), Some(10));
    }

    #[test]
    fn test_optimistic_overlay() {
        let store = loaded(1, json!({ "ui": { "name": "old", "theme": "dark" } }));
        store.set_optimistic(path("ui.name"), json!("new"));
        assert_eq!(store.get(&path("ui.name")), Some(json!("old")));
        assert_eq!(store.get_optimistic(&path("ui.name")), Some(json!("new")));
        assert_eq!(
            store.get_optimistic(&path("ui")),
            Some(json!({ "name": "new", "theme": "dark" }))
        );
        assert_eq!(store.get_optimistic(&path("ui.theme")), Some(json!("dark")));

        // A confirmed patch on an overlapping path wins
        store
            .apply(&Patch::set(2, path("ui"), json!({ "name": "server" })))
            .unwrap();
        assert_eq!(
            store.get_optimistic(&path("ui.name")),
            Some(json!("server"))
        );
    }

    #[test]
    fn test_optimistic_overlay_survives_unrelated_patches() {
        let store = loaded(1, json!({ "ui": { "name": "old" }, "other": 0 }));
        store.set_optimistic(path("ui.name"), json!("new"));
        store.apply(&Patch::set(2, path("other"), json!(1))).unwrap();
        assert_eq!(store.get_optimistic(&path("ui.name")), Some(json!("new")));
        store.clear_optimistic(&path("ui.name"));
        assert_eq!(store.get_optimistic(&path("ui.name")), Some(json!("old")));
    }

    #[test]
    fn test_optimistic_writes_apply_in_write_order() {
        let store = loaded(1, json!({ "ui": { "name": "old" } }));
        store.set_optimistic(path("ui.name"), json!("A"));
        store.set_optimistic(path("ui"), json!({ "name": "B" }));
        assert_eq!(store.get_optimistic(&path("ui.name")), Some(json!("B")));

        store.set_optimistic(path("ui.name"), json!("C"));
        assert_eq!(
            store.get_optimistic(&path("ui")),
            Some(json!({ "name": "C" }))
        );
        store.clear_optimistic(&path("ui.name"));
        assert_eq!(store.get_optimistic(&path("ui.name")), Some(json!("B")));
    }

    #[test]
    fn test_array_end_token_is_malformed() {
        let store = loaded(1, json!({ "list": [1], "map": {} }));
        let e = store
            .apply(&Patch::set(2, DbPath::root().join("list").join("-"), json!(2)))
            .unwrap_err();
        assert_eq!(e.sequence_id, Some(2));
        assert_eq!(store.get(&path("list")), Some(json!([1])));
        assert_eq!(store.sequence(), Some(1));

        // Only arrays give `-` a meaning
        store
            .apply(&Patch::set(2, DbPath::root().join("map").join("-"), json!(2)))
            .unwrap();
        assert_eq!(store.get(&path("map")), Some(json!({ "-": 2 })));
    }

    #[test]
    fn test_optimistic_write_below_missing_value() {
        let store = loaded(1, json!({}));
        store.set_optimistic(path("ui.name"), json!("new"));
        assert_eq!(
            store.get_optimistic(&path("ui")),
            Some(json!({ "name": "new" }))
        );
    }
}
