//! The element graph: a tree of [`Element`]s resolved by media path, each
//! serving [`Request`]s by producing or forwarding tags.

pub mod error;
pub mod request;
pub mod standard;

pub use error::ElementError;
pub use request::{AuthFields, Controller, Request, Sink};

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::tag::FlavourMask;

/// A future boxed for dyn-dispatch across `Element` implementations, since
/// `async fn` in a trait is not object-safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One node in the element graph: something that can serve, list, and
/// describe media under a path it owns.
pub trait Element: Send + Sync {
    /// Called once after construction, before any request is served.
    fn initialize(&self) -> BoxFuture<'_, Result<(), ElementError>>;

    /// Begin serving `req`. Returns a subscriber id the caller later passes
    /// to `remove_request`.
    fn add_request(&self, req: Request) -> BoxFuture<'_, Result<u64, ElementError>>;

    /// Stop serving a previously added request.
    fn remove_request(&self, id: u64) -> BoxFuture<'_, ()>;

    /// Whether this element currently has any media to serve at all.
    fn has_media(&self) -> BoxFuture<'_, bool>;

    /// Enumerate media paths this element (and its children) can serve.
    fn list_media(&self) -> BoxFuture<'_, Vec<String>>;

    /// Human-readable description of one media path, for DESCRIBE-style
    /// introspection.
    fn describe_media(&self, path: &str) -> BoxFuture<'_, Option<String>>;

    /// Tear the element down; in-flight requests are force-closed.
    fn close(&self) -> BoxFuture<'_, ()>;
}

/// Outcome of an authorization check, delivered to the completion callback
/// `Authorizer::authorize` is given.
pub type AuthCompletion = Box<dyn FnOnce(Result<(), ElementError>) + Send>;

/// Boundary trait deciding whether a [`Request`] may be served. Implementations
/// may call out to an external service asynchronously and invoke `completion`
/// once a decision is reached; they are not required to call it synchronously.
pub trait Authorizer: Send + Sync {
    fn initialize(&self) -> BoxFuture<'_, Result<(), ElementError>>;

    fn authorize(&self, req: &Request, completion: AuthCompletion);

    /// Cancel a previously issued authorization (e.g. recurring re-auth
    /// revoking access mid-stream).
    fn cancel(&self, completion: AuthCompletion);
}

/// Drive `authorizer.authorize` to completion as an async call, for callers
/// that prefer to `.await` rather than provide a completion callback.
pub async fn async_authorize(authorizer: &dyn Authorizer, req: &Request) -> Result<(), ElementError> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    authorizer.authorize(req, Box::new(move |result| {
        let _ = tx.send(result);
    }));
    rx.await.unwrap_or(Err(ElementError::Closing))
}

/// Re-authorizes `req` against `authorizer` every `period`, invoking
/// `on_revoked` the first time a re-auth comes back denied. Spawned as its
/// own task; drop the returned handle to stop re-checking.
pub fn spawn_recurring_reauth(
    authorizer: Arc<dyn Authorizer>,
    req: Arc<Request>,
    period: std::time::Duration,
    on_revoked: impl FnOnce() + Send + 'static,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await; // first tick fires immediately; the initial auth already happened
        loop {
            ticker.tick().await;
            if async_authorize(authorizer.as_ref(), &req).await.is_err() {
                on_revoked();
                return;
            }
        }
    })
}

/// Resolves a media path to a registered [`Element`].
///
/// Resolution order: exact alias match, then exact name match, then
/// longest-prefix path match, then a delegate mapper fallback.
#[derive(Default)]
pub struct ElementMapper {
    aliases: RwLock<HashMap<String, String>>,
    elements: RwLock<HashMap<String, Arc<dyn Element>>>,
    delegate: Option<Arc<ElementMapper>>,
}

impl ElementMapper {
    pub fn new() -> Self {
        Self {
            aliases: RwLock::new(HashMap::new()),
            elements: RwLock::new(HashMap::new()),
            delegate: None,
        }
    }

    pub fn with_delegate(delegate: Arc<ElementMapper>) -> Self {
        Self {
            aliases: RwLock::new(HashMap::new()),
            elements: RwLock::new(HashMap::new()),
            delegate: Some(delegate),
        }
    }

    pub async fn register(&self, name: impl Into<String>, element: Arc<dyn Element>) {
        self.elements.write().await.insert(name.into(), element);
    }

    pub async fn alias(&self, alias: impl Into<String>, target: impl Into<String>) {
        self.aliases.write().await.insert(alias.into(), target.into());
    }

    pub async fn unregister(&self, name: &str) -> Option<Arc<dyn Element>> {
        self.elements.write().await.remove(name)
    }

    /// Resolve `path` to the element that should serve it.
    pub async fn resolve(&self, path: &str) -> Result<Arc<dyn Element>, ElementError> {
        if let Some(target) = self.aliases.read().await.get(path) {
            if let Some(el) = self.elements.read().await.get(target) {
                return Ok(el.clone());
            }
        }

        {
            let elements = self.elements.read().await;
            if let Some(el) = elements.get(path) {
                return Ok(el.clone());
            }

            let mut best: Option<(&String, &Arc<dyn Element>)> = None;
            for (name, el) in elements.iter() {
                if path.starts_with(name.as_str()) {
                    match best {
                        Some((best_name, _)) if best_name.len() >= name.len() => {}
                        _ => best = Some((name, el)),
                    }
                }
            }
            if let Some((_, el)) = best {
                return Ok(el.clone());
            }
        }

        if let Some(delegate) = &self.delegate {
            return Box::pin(delegate.resolve(path)).await;
        }

        Err(ElementError::NotFound(path.to_string()))
    }

    /// Serve `req` by resolving its media path and delegating to the
    /// resolved element's `add_request`.
    pub async fn serve(&self, req: Request) -> Result<(Arc<dyn Element>, u64), ElementError> {
        let element = self.resolve(&req.media_path).await?;
        let id = element.add_request(req).await?;
        Ok((element, id))
    }
}

/// Helper used by `add_request` implementations to reject requests whose
/// capability mask cannot match anything this element could ever produce.
pub fn requires_nonempty_mask(mask: FlavourMask) -> Result<(), ElementError> {
    if mask.is_empty() {
        return Err(ElementError::Forbidden("empty capability mask".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct StubElement {
        next_id: AtomicU64,
    }

    impl Element for StubElement {
        fn initialize(&self) -> BoxFuture<'_, Result<(), ElementError>> {
            Box::pin(async { Ok(()) })
        }

        fn add_request(&self, _req: Request) -> BoxFuture<'_, Result<u64, ElementError>> {
            Box::pin(async { Ok(self.next_id.fetch_add(1, Ordering::Relaxed)) })
        }

        fn remove_request(&self, _id: u64) -> BoxFuture<'_, ()> {
            Box::pin(async {})
        }

        fn has_media(&self) -> BoxFuture<'_, bool> {
            Box::pin(async { true })
        }

        fn list_media(&self) -> BoxFuture<'_, Vec<String>> {
            Box::pin(async { vec!["live/cam1".to_string()] })
        }

        fn describe_media(&self, _path: &str) -> BoxFuture<'_, Option<String>> {
            Box::pin(async { Some("camera 1".to_string()) })
        }

        fn close(&self) -> BoxFuture<'_, ()> {
            Box::pin(async {})
        }
    }

    #[tokio::test]
    async fn resolves_by_longest_prefix() {
        let mapper = ElementMapper::new();
        mapper.register("live/", Arc::new(StubElement { next_id: AtomicU64::new(0) })).await;
        mapper
            .register("live/cam1", Arc::new(StubElement { next_id: AtomicU64::new(0) }))
            .await;

        let resolved = mapper.resolve("live/cam1/extra").await;
        assert!(resolved.is_ok());
    }

    #[tokio::test]
    async fn alias_redirects_to_target() {
        let mapper = ElementMapper::new();
        mapper.register("live/cam1", Arc::new(StubElement { next_id: AtomicU64::new(0) })).await;
        mapper.alias("default", "live/cam1").await;

        assert!(mapper.resolve("default").await.is_ok());
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let mapper = ElementMapper::new();
        let err = mapper.resolve("nope").await.unwrap_err();
        assert!(matches!(err, ElementError::NotFound(_)));
    }

    #[tokio::test]
    async fn serve_adds_request_through_resolved_element() {
        let mapper = ElementMapper::new();
        mapper.register("live/cam1", Arc::new(StubElement { next_id: AtomicU64::new(0) })).await;
        let req = Request::new("live/cam1", FlavourMask::ALL);
        let (_element, id) = mapper.serve(req).await.unwrap();
        assert_eq!(id, 0);
    }

    struct RevokingAuthorizer {
        allow: std::sync::atomic::AtomicBool,
    }

    impl Authorizer for RevokingAuthorizer {
        fn initialize(&self) -> BoxFuture<'_, Result<(), ElementError>> {
            Box::pin(async { Ok(()) })
        }

        fn authorize(&self, _req: &Request, completion: AuthCompletion) {
            let result = if self.allow.load(Ordering::Relaxed) {
                Ok(())
            } else {
                Err(ElementError::Forbidden("revoked".to_string()))
            };
            completion(result);
        }

        fn cancel(&self, completion: AuthCompletion) {
            completion(Ok(()));
        }
    }

    #[tokio::test]
    async fn recurring_reauth_fires_on_revocation() {
        let authorizer = Arc::new(RevokingAuthorizer { allow: std::sync::atomic::AtomicBool::new(true) });
        let req = Arc::new(Request::new("live/cam1", FlavourMask::ALL));
        let (tx, rx) = tokio::sync::oneshot::channel();

        let handle = spawn_recurring_reauth(authorizer.clone(), req, std::time::Duration::from_millis(5), move || {
            let _ = tx.send(());
        });

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        authorizer.allow.store(false, Ordering::Relaxed);

        tokio::time::timeout(std::time::Duration::from_millis(200), rx).await.unwrap().unwrap();
        handle.await.unwrap();
    }
}
