//! Request-scoped key/value storage for async services
//!
//! Every inbound request (HTTP call, GraphQL operation, queue message) runs
//! inside its own scope. Code anywhere down the call chain can read values
//! seeded for that request without threading them through every signature:
//!
//! ```text
//! HTTP middleware ──run(seed)──► resolver ──► ForwardingClient
//!                                               │ get(RAW_CREDENTIAL)
//!                                               ▼
//!                                     Authorization: Bearer <token>
//! ```
//!
//! Scopes are stored in tokio task-local storage, so they follow a future
//! across `.await` points and worker threads but never leak into unrelated
//! tasks. A task created with plain `tokio::spawn` starts with no scope;
//! use [`RequestContext::spawn`] or [`RequestContext::bind`] to carry the
//! current one along.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::{Arc, PoisonError, RwLock};

use futures::future::Either;
use tokio::task::JoinHandle;
use uuid::Uuid;

type Slot = Arc<dyn Any + Send + Sync>;

tokio::task_local! {
    static SCOPE: Arc<Scope>;
}

/// Typed key into the request scope
///
/// Keys are compared by name; a lookup with a mismatched type yields `None`.
pub struct ContextKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ContextKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for ContextKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ContextKey<T> {}

impl<T> fmt::Debug for ContextKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContextKey").field(&self.name).finish()
    }
}

/// Initial values for a new scope
#[derive(Default)]
pub struct Seed {
    values: HashMap<&'static str, Slot>,
}

impl Seed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<T>(mut self, key: &ContextKey<T>, value: T) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        self.insert(key, value);
        self
    }

    pub fn insert<T>(&mut self, key: &ContextKey<T>, value: T)
    where
        T: Clone + Send + Sync + 'static,
    {
        self.values.insert(key.name, Arc::new(value));
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.values.keys()).finish()
    }
}

struct Scope {
    id: Uuid,
    values: RwLock<HashMap<&'static str, Slot>>,
}

impl Scope {
    fn new(seed: Seed) -> Self {
        Self {
            id: Uuid::new_v4(),
            values: RwLock::new(seed.values),
        }
    }

    fn get<T>(&self, key: &ContextKey<T>) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        // A panic while holding the lock cannot leave the map half-written.
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        values
            .get(key.name)
            .and_then(|slot| slot.downcast_ref::<T>())
            .cloned()
    }

    fn set<T>(&self, key: &ContextKey<T>, value: T)
    where
        T: Clone + Send + Sync + 'static,
    {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.name, Arc::new(value));
    }
}

/// Entry point for the request scope
pub struct RequestContext;

impl RequestContext {
    /// Run `fut` inside a fresh scope seeded with `seed`
    ///
    /// A nested `run` shadows the outer scope until `fut` completes.
    pub async fn run<F>(seed: Seed, fut: F) -> F::Output
    where
        F: Future,
    {
        let scope = Arc::new(Scope::new(seed));
        tracing::trace!(scope_id = %scope.id, "opening request scope");
        SCOPE.scope(scope, fut).await
    }

    /// Read a value from the current scope
    ///
    /// `None` outside any scope or when the key was never set.
    pub fn get<T>(key: &ContextKey<T>) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        SCOPE.try_with(|scope| scope.get(key)).ok().flatten()
    }

    /// Write a value into the current scope
    ///
    /// Returns `false` (and drops the value) when no scope is active.
    pub fn set<T>(key: &ContextKey<T>, value: T) -> bool
    where
        T: Clone + Send + Sync + 'static,
    {
        SCOPE.try_with(|scope| scope.set(key, value)).is_ok()
    }

    pub fn is_active() -> bool {
        SCOPE.try_with(|_| ()).is_ok()
    }

    /// Identifier of the current scope, unique per `run`
    pub fn scope_id() -> Option<Uuid> {
        SCOPE.try_with(|scope| scope.id).ok()
    }

    /// Attach the current scope to a future that will be polled elsewhere
    ///
    /// Without an active scope the future is returned unchanged.
    pub fn bind<F>(fut: F) -> impl Future<Output = F::Output>
    where
        F: Future,
    {
        match SCOPE.try_with(Arc::clone) {
            Ok(scope) => Either::Left(SCOPE.scope(scope, fut)),
            Err(_) => Either::Right(fut),
        }
    }

    /// Spawn a task that shares the current scope
    pub fn spawn<F>(fut: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        tokio::spawn(Self::bind(fut))
    }
}
