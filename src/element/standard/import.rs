//! Import element: a fixed set of named slots, each fed by one publisher
//! connection and served to many subscribers through its own distributor.
//! Slots persist across restarts through a [`StateKeeper`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::distributor::{Callback, Distributor, SubscriberId};
use crate::element::{BoxFuture, Element, ElementError, Request};
use crate::tag::Tag;
use crate::util::state::StateKeeper;

const SLOTS_KEY: &str = "imports";

struct Slot {
    distributor: Distributor,
}

struct Inner {
    slots: HashMap<String, Slot>,
}

/// Named publish points whose set survives process restarts: slot names are
/// persisted through `state`, but live distributor state is naturally
/// rebuilt from scratch on restart (a fresh publisher must reconnect).
pub struct ImportElement {
    prefix: String,
    state: Arc<dyn StateKeeper>,
    inner: Mutex<Inner>,
}

impl ImportElement {
    pub fn new(prefix: impl Into<String>, state: Arc<dyn StateKeeper>) -> Self {
        Self {
            prefix: prefix.into(),
            state,
            inner: Mutex::new(Inner { slots: HashMap::new() }),
        }
    }

    async fn persist_slot_names(&self) {
        let names = {
            let inner = self.inner.lock();
            inner.slots.keys().cloned().collect::<Vec<_>>()
        };
        match serde_json::to_string(&names) {
            Ok(encoded) => self.state.set(SLOTS_KEY, &encoded).await,
            Err(err) => tracing::error!(%err, "failed to encode import slot names"),
        }
    }

    /// Create (or re-create) a named slot. Idempotent.
    pub async fn add_slot(&self, name: impl Into<String>) {
        let name = name.into();
        {
            let mut inner = self.inner.lock();
            inner
                .slots
                .entry(name)
                .or_insert_with(|| Slot { distributor: Distributor::new(None, true) });
        }
        self.persist_slot_names().await;
    }

    pub async fn remove_slot(&self, name: &str) {
        {
            let mut inner = self.inner.lock();
            if let Some(mut slot) = inner.slots.remove(name) {
                slot.distributor.close_all(true);
            }
        }
        self.persist_slot_names().await;
    }

    /// Restore previously-persisted slot names, without any live data (a
    /// restart always starts each slot empty until its publisher reconnects).
    pub async fn restore_slots(&self) {
        let Some(saved) = self.state.get(SLOTS_KEY).await else { return };
        let names: Vec<String> = match serde_json::from_str(&saved) {
            Ok(names) => names,
            Err(err) => {
                tracing::error!(%err, "failed to decode persisted import slot names");
                return;
            }
        };
        let mut inner = self.inner.lock();
        for name in names {
            inner.slots.entry(name).or_insert_with(|| Slot { distributor: Distributor::new(None, true) });
        }
    }

    /// A publisher connection calls this once per tag it produces for
    /// `slot_name`.
    pub fn publish(&self, slot_name: &str, tag: Tag) {
        let mut inner = self.inner.lock();
        if let Some(slot) = inner.slots.get_mut(slot_name) {
            slot.distributor.distribute_tag(tag);
        }
    }

    fn slot_name_for(&self, path: &str) -> Option<String> {
        path.strip_prefix(&self.prefix).map(|s| s.trim_start_matches('/').to_string())
    }
}

impl Element for ImportElement {
    fn initialize(&self) -> BoxFuture<'_, Result<(), ElementError>> {
        Box::pin(async move {
            self.restore_slots().await;
            Ok(())
        })
    }

    fn add_request(&self, req: Request) -> BoxFuture<'_, Result<u64, ElementError>> {
        Box::pin(async move {
            let Some(slot_name) = self.slot_name_for(&req.media_path) else {
                return Err(ElementError::NotFound(req.media_path.clone()));
            };
            let mut inner = self.inner.lock();
            let slot = inner
                .slots
                .get_mut(&slot_name)
                .ok_or_else(|| ElementError::NotFound(req.media_path.clone()))?;

            let mut sink = req.sink;
            let cb: Callback = Box::new(move |tag| sink(tag));
            let id = slot.distributor.add_callback(req.capabilities, cb);
            Ok(id.raw())
        })
    }

    fn remove_request(&self, id: u64) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let mut inner = self.inner.lock();
            for slot in inner.slots.values_mut() {
                slot.distributor.close_callback(SubscriberId::from_raw(id), false);
            }
        })
    }

    fn has_media(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move { !self.inner.lock().slots.is_empty() })
    }

    fn list_media(&self) -> BoxFuture<'_, Vec<String>> {
        Box::pin(async move {
            self.inner
                .lock()
                .slots
                .keys()
                .map(|n| format!("{}/{}", self.prefix.trim_end_matches('/'), n))
                .collect()
        })
    }

    fn describe_media(&self, path: &str) -> BoxFuture<'_, Option<String>> {
        Box::pin(async move {
            let name = self.slot_name_for(path)?;
            self.inner.lock().slots.contains_key(&name).then(|| format!("imported slot {name:?}"))
        })
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let mut inner = self.inner.lock();
            for slot in inner.slots.values_mut() {
                slot.distributor.close_all(true);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::state::InMemoryStateKeeper;

    #[tokio::test]
    async fn persists_slot_names_under_the_imports_key_as_json() {
        let state = Arc::new(InMemoryStateKeeper::new());
        let element = ImportElement::new("/import/", state.clone());
        element.add_slot("a,b").await;
        element.add_slot("c").await;

        let raw = state.get(SLOTS_KEY).await.unwrap();
        let mut names: Vec<String> = serde_json::from_str(&raw).unwrap();
        names.sort();
        assert_eq!(names, vec!["a,b".to_string(), "c".to_string()]);
    }

    #[tokio::test]
    async fn restore_recovers_slot_names_containing_commas() {
        let state = Arc::new(InMemoryStateKeeper::new());
        state.set(SLOTS_KEY, r#"["first,slot","second"]"#).await;

        let element = ImportElement::new("/import/", state);
        element.restore_slots().await;

        let mut media = element.list_media().await;
        media.sort();
        assert_eq!(media, vec!["/import/first,slot".to_string(), "/import/second".to_string()]);
    }
}
