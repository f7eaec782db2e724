//! Path-scoped subscriptions to the [`Store`](crate::Store).
//!
//! Watchers are kept in a tree keyed by path token, so a change at some path
//! only visits the watchers on the way down to it and the ones below it.

use std::{
    collections::BTreeMap,
    pin::Pin,
    task::{Context, Poll},
};

use futures_util::{Stream, StreamExt as _};
use serde::de::DeserializeOwned;
use serde_json::Value;
use startos_client_core::patch::DbPath;
use tokio::sync::mpsc;

/// Stream of the values at one path of the store.
///
/// Yields the current value immediately, then the new value after every
/// applied change that affects the path. Consecutive identical values are
/// suppressed. `None` means that nothing exists at the path.
///
/// Every distinct value is delivered, so a transition is never skipped. The
/// queue is unbounded: a `Watch` that is not polled holds every value emitted
/// since it was last polled. Drop watches that are no longer read.
///
/// Dropping the `Watch` unregisters it.
pub struct Watch {
    path: DbPath,
    rx: mpsc::UnboundedReceiver<Option<Value>>,
}

impl Watch {
    pub fn path(&self) -> &DbPath {
        &self.path
    }

    /// Decode each emitted value into `T`.
    pub fn typed<T: DeserializeOwned>(
        self,
    ) -> impl Stream<Item = Result<Option<T>, serde_json::Error>> {
        self.map(|value| value.map(serde_json::from_value).transpose())
    }
}

impl Stream for Watch {
    type Item = Option<Value>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

struct Watcher {
    tx: mpsc::UnboundedSender<Option<Value>>,
    last: Option<Value>,
}

#[derive(Default)]
struct WatchNode {
    watchers: Vec<Watcher>,
    children: BTreeMap<String, WatchNode>,
}

#[derive(Default)]
pub(crate) struct WatchTree {
    root: WatchNode,
}

fn lookup(document: &Value, tokens: &[String]) -> Option<Value> {
    let path: DbPath = tokens.iter().cloned().collect();
    path.get(document).cloned()
}

impl WatchNode {
    fn emit(&mut self, document: &Value, tokens: &[String]) {
        if self.watchers.is_empty() {
            return;
        }
        let value = lookup(document, tokens);
        self.watchers.retain_mut(|w| {
            if w.last == value {
                return !w.tx.is_closed();
            }
            w.last = value.clone();
            w.tx.send(value.clone()).is_ok()
        });
    }

    fn emit_below(&mut self, document: &Value, tokens: &mut Vec<String>) {
        for (token, child) in self.children.iter_mut() {
            tokens.push(token.clone());
            child.emit(document, tokens);
            child.emit_below(document, tokens);
            tokens.pop();
        }
    }

    fn notify_along(&mut self, document: &Value, tokens: &mut Vec<String>, rest: &[String]) {
        self.emit(document, tokens);
        match rest.split_first() {
            None => self.emit_below(document, tokens),
            Some((first, rest)) => {
                if let Some(child) = self.children.get_mut(first) {
                    tokens.push(first.clone());
                    child.notify_along(document, tokens, rest);
                    tokens.pop();
                }
            }
        }
    }

    /// Drop closed watchers in this subtree; returns whether the node is now empty.
    fn prune(&mut self) -> bool {
        self.watchers.retain(|w| !w.tx.is_closed());
        self.children.retain(|_, child| !child.prune());
        self.watchers.is_empty() && self.children.is_empty()
    }

    fn prune_along(&mut self, tokens: &[String]) -> bool {
        let Some((first, rest)) = tokens.split_first() else {
            return self.prune();
        };
        if let Some(child) = self.children.get_mut(first) {
            if child.prune_along(rest) {
                self.children.remove(first);
            }
        }
        self.watchers.retain(|w| !w.tx.is_closed());
        self.watchers.is_empty() && self.children.is_empty()
    }

    fn count(&self) -> usize {
        self.watchers.len() + self.children.values().map(WatchNode::count).sum::<usize>()
    }
}

impl WatchTree {
    pub(crate) fn register(&mut self, path: &DbPath, current: Option<Value>) -> Watch {
        let (tx, rx) = mpsc::unbounded_channel();
        // Cannot fail: we hold the receiver
        let _ = tx.send(current.clone());
        let mut node = &mut self.root;
        for token in path.tokens() {
            node = node.children.entry(token).or_default();
        }
        node.watchers.push(Watcher { tx, last: current });
        Watch {
            path: path.clone(),
            rx,
        }
    }

    /// Notify the watchers at `changed`, above it and below it.
    pub(crate) fn notify(&mut self, document: &Value, changed: &DbPath) {
        let changed_tokens = changed.tokens();
        let mut tokens = Vec::with_capacity(changed_tokens.len());
        self.root.notify_along(document, &mut tokens, &changed_tokens);
        self.root.prune_along(&changed_tokens);
    }

    /// Notify every watcher, e.g. after the whole document was replaced.
    pub(crate) fn notify_all(&mut self, document: &Value) {
        let mut tokens = Vec::new();
        self.root.emit(document, &tokens);
        self.root.emit_below(document, &mut tokens);
        self.root.prune();
    }

    pub(crate) fn count(&self) -> usize {
        self.root.count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{FutureExt as _, StreamExt as _};
    use serde_json::json;

    fn path(s: &str) -> DbPath {
        DbPath::parse_dotted(s)
    }

    /// Values emitted so far, without waiting
    fn drain(w: &mut Watch) -> Vec<Option<Value>> {
        let mut r = Vec::new();
        while let Some(Some(v)) = w.next().now_or_never() {
            r.push(v);
        }
        r
    }

    #[test]
    fn test_register_emits_current_value() {
        let mut tree = WatchTree::default();
        let doc = json!({ "a": { "b": 1 } });
        let mut w = tree.register(&path("a.b"), lookup(&doc, &path("a.b").tokens()));
        assert_eq!(drain(&mut w), vec![Some(json!(1))]);
    }

    #[test]
    fn test_notify_reaches_ancestors_and_descendants() {
        let mut tree = WatchTree::default();
        let mut doc = json!({ "a": { "b": { "c": 1 } }, "x": 0 });
        let mut above = tree.register(&path("a"), lookup(&doc, &path("a").tokens()));
        let mut exact = tree.register(&path("a.b"), lookup(&doc, &path("a.b").tokens()));
        let mut below = tree.register(&path("a.b.c"), lookup(&doc, &path("a.b.c").tokens()));
        let mut other = tree.register(&path("x"), lookup(&doc, &path("x").tokens()));
        drain(&mut above);
        drain(&mut exact);
        drain(&mut below);
        drain(&mut other);

        doc["a"]["b"] = json!({ "c": 2 });
        tree.notify(&doc, &path("a.b"));
        assert_eq!(drain(&mut above), vec![Some(json!({ "b": { "c": 2 } }))]);
        assert_eq!(drain(&mut exact), vec![Some(json!({ "c": 2 }))]);
        assert_eq!(drain(&mut below), vec![Some(json!(2))]);
        assert_eq!(drain(&mut other), vec![]);
    }

    #[test]
    fn test_identical_values_are_suppressed() {
        let mut tree = WatchTree::default();
        let mut doc = json!({ "a": 1, "b": 1 });
        let mut w = tree.register(&path("a"), Some(json!(1)));
        drain(&mut w);

        // A change next to the watched path
        doc["b"] = json!(2);
        tree.notify(&doc, &DbPath::root());
        assert_eq!(drain(&mut w), vec![]);

        doc["a"] = json!(3);
        tree.notify(&doc, &path("a"));
        tree.notify(&doc, &path("a"));
        assert_eq!(drain(&mut w), vec![Some(json!(3))]);
    }

    #[test]
    fn test_unpolled_watch_keeps_every_change() {
        let mut tree = WatchTree::default();
        let mut doc = json!({ "a": 0 });
        let mut w = tree.register(&path("a"), Some(json!(0)));
        for i in 1..=100 {
            doc["a"] = json!(i);
            tree.notify(&doc, &path("a"));
        }
        let values = drain(&mut w);
        assert_eq!(values.len(), 101);
        assert_eq!(values.first(), Some(&Some(json!(0))));
        assert_eq!(values.last(), Some(&Some(json!(100))));

        drop(w);
        doc["a"] = json!(101);
        tree.notify(&doc, &path("a"));
        assert_eq!(tree.count(), 0);
    }

    #[test]
    fn test_removed_value_is_none() {
        let mut tree = WatchTree::default();
        let mut doc = json!({ "packageData": { "foo": { "v": 1 } } });
        let mut w = tree.register(&path("packageData.foo.v"), Some(json!(1)));
        drain(&mut w);
        doc["packageData"].as_object_mut().unwrap().remove("foo");
        tree.notify(&doc, &path("packageData.foo"));
        assert_eq!(drain(&mut w), vec![None]);
    }

    #[test]
    fn test_dropped_watchers_are_pruned() {
        let mut tree = WatchTree::default();
        let doc = json!({ "a": { "b": 1 } });
        let w1 = tree.register(&path("a.b"), Some(json!(1)));
        let mut w2 = tree.register(&path("a"), Some(json!({ "b": 1 })));
        assert_eq!(tree.count(), 2);
        drop(w1);
        tree.notify(&doc, &path("a.b"));
        assert_eq!(tree.count(), 1);
        assert_eq!(drain(&mut w2), vec![Some(json!({ "b": 1 }))]);
    }

    #[test]
    fn test_notify_all() {
        let mut tree = WatchTree::default();
        let mut w1 = tree.register(&path("a"), None);
        let mut w2 = tree.register(&path("b"), None);
        drain(&mut w1);
        drain(&mut w2);
        tree.notify_all(&json!({ "a": 1 }));
        assert_eq!(drain(&mut w1), vec![Some(json!(1))]);
        assert_eq!(drain(&mut w2), vec![]);
    }
}
