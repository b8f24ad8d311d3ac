use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use tokio::sync::OnceCell;

use crate::ability::Ability;
use crate::factory::AbilityFactory;
use crate::identity::{Credential, Identity};
use crate::transport::TransportKind;

struct Inner {
    transport: TransportKind,
    /// Keys lowercased
    headers: HashMap<String, String>,
    credential: Option<Credential>,
    identity: OnceLock<Arc<Identity>>,
    ability: OnceCell<Arc<Ability>>,
}

/// Transport-neutral view of one inbound request
///
/// Cheap to clone; all clones share the resolved identity and the memoized
/// ability, so every check within a request sees the same values.
#[derive(Clone)]
pub struct RequestHandle(Arc<Inner>);

impl RequestHandle {
    pub fn new<I, K, V>(transport: TransportKind, headers: I, credential: Option<Credential>) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let headers = headers
            .into_iter()
            .map(|(name, value)| (name.as_ref().to_ascii_lowercase(), value.into()))
            .collect();

        Self(Arc::new(Inner {
            transport,
            headers,
            credential,
            identity: OnceLock::new(),
            ability: OnceCell::new(),
        }))
    }

    pub fn transport(&self) -> TransportKind {
        self.0.transport
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.0
            .headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.0.credential.as_ref()
    }

    pub fn identity(&self) -> Option<Arc<Identity>> {
        self.0.identity.get().cloned()
    }

    /// Attach the resolved identity; the first one attached wins
    pub fn attach_identity(&self, identity: Identity) -> Arc<Identity> {
        Arc::clone(self.0.identity.get_or_init(|| Arc::new(identity)))
    }

    pub fn ability(&self) -> Option<Arc<Ability>> {
        self.0.ability.get().cloned()
    }

    /// Attach a precomputed ability; the first one attached wins
    pub fn attach_ability(&self, ability: Ability) -> Arc<Ability> {
        let _ = self.0.ability.set(Arc::new(ability));
        self.ability().unwrap_or_else(|| Arc::new(Ability::empty()))
    }

    /// Memoized ability for this request
    ///
    /// Concurrent callers wait for a single factory invocation. A factory
    /// error is returned to every waiter and nothing is cached.
    pub async fn ability_or_init(
        &self,
        factory: &dyn AbilityFactory,
        identity: &Identity,
    ) -> anyhow::Result<Arc<Ability>> {
        self.0
            .ability
            .get_or_try_init(|| async { factory.create_ability(identity).await.map(Arc::new) })
            .await
            .cloned()
    }

    /// True when both handles describe the same request
    pub fn same_request(&self, other: &RequestHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut header_names: Vec<&str> = self.0.headers.keys().map(String::as_str).collect();
        header_names.sort_unstable();

        f.debug_struct("RequestHandle")
            .field("transport", &self.0.transport)
            .field("headers", &header_names)
            .field("has_credential", &self.0.credential.is_some())
            .field("identity", &self.0.identity.get())
            .field("has_ability", &self.0.ability.initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingFactory(AtomicUsize);

    #[async_trait]
    impl AbilityFactory for CountingFactory {
        async fn create_ability(&self, _identity: &Identity) -> anyhow::Result<Ability> {
            self.0.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(Ability::unrestricted())
        }
    }

    struct FailingFactory;

    #[async_trait]
    impl AbilityFactory for FailingFactory {
        async fn create_ability(&self, _identity: &Identity) -> anyhow::Result<Ability> {
            anyhow::bail!("rule store unavailable")
        }
    }

    fn handle() -> RequestHandle {
        RequestHandle::new(
            TransportKind::Http,
            [("Authorization", "Bearer abc"), ("X-Request-Id", "r1")],
            Credential::new("abc"),
        )
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let handle = handle();
        assert_eq!(handle.header("authorization"), Some("Bearer abc"));
        assert_eq!(handle.header("x-request-id"), Some("r1"));
        assert_eq!(handle.header("missing"), None);
    }

    #[test]
    fn test_first_identity_wins() {
        let handle = handle();
        handle.attach_identity(Identity::new("u1", ["Editor"]));
        let second = handle.attach_identity(Identity::new("u2", ["Super"]));
        assert_eq!(second.subject_id(), "u1");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_ability_computed_once_under_concurrency() {
        let factory = Arc::new(CountingFactory(AtomicUsize::new(0)));
        let handle = handle();
        let identity = Identity::new("u1", ["Editor"]);

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let factory = Arc::clone(&factory);
            let handle = handle.clone();
            let identity = identity.clone();
            tasks.push(tokio::spawn(async move {
                handle
                    .ability_or_init(factory.as_ref(), &identity)
                    .await
                    .unwrap()
            }));
        }
        for task in tasks {
            assert!(task.await.unwrap().is_unrestricted());
        }

        assert_eq!(factory.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_factory_error_is_not_cached() {
        let handle = handle();
        let identity = Identity::new("u1", ["Editor"]);

        assert!(handle.ability_or_init(&FailingFactory, &identity).await.is_err());
        assert!(handle.ability().is_none());
    }

    #[test]
    fn test_debug_hides_credential() {
        let rendered = format!("{:?}", handle());
        assert!(!rendered.contains("Bearer abc"));
        assert!(rendered.contains("authorization"));
    }
}
