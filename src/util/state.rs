//! Minimal persistent key/value boundary used by elements that need to
//! survive a process restart (currently just import slot names).

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::element::BoxFuture;

/// A tiny async key/value store. Implementations may back this with a file,
/// a database row, or (for tests and single-process deployments) memory.
///
/// Uses manually boxed futures rather than `async fn` in a trait so it stays
/// object-safe, matching the rest of the element graph's trait boundaries.
pub trait StateKeeper: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Option<String>>;
    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> BoxFuture<'a, ()>;
}

/// Default [`StateKeeper`] for deployments with no external store: state is
/// lost on restart, which is fine for ephemeral/test servers.
#[derive(Default)]
pub struct InMemoryStateKeeper {
    map: RwLock<HashMap<String, String>>,
}

impl InMemoryStateKeeper {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateKeeper for InMemoryStateKeeper {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Option<String>> {
        Box::pin(async move { self.map.read().await.get(key).cloned() })
    }

    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.map.write().await.insert(key.to_string(), value.to_string());
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_a_value() {
        let keeper = InMemoryStateKeeper::new();
        assert_eq!(keeper.get("k").await, None);
        keeper.set("k", "v").await;
        assert_eq!(keeper.get("k").await.as_deref(), Some("v"));
    }
}
