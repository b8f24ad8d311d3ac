//! Declarative route metadata
//!
//! Routes are described once, next to where they are registered:
//!
//! ```rust,ignore
//! static WIDGETS: Lazy<Arc<PolicySet>> =
//!     Lazy::new(|| Arc::new(PolicySet::new().policy(PolicyHandler::can(Action::Read, "Widget"))));
//!
//! let update = RouteMetadata::for_class(WIDGETS.clone())
//!     .policy(PolicyHandler::can(Action::Update, "Widget"));
//! ```

use std::fmt;
use std::sync::Arc;

use crate::ability::{Action, Ability};

type Check = dyn Fn(&Ability) -> bool + Send + Sync;

/// Named predicate over an [`Ability`]
#[derive(Clone)]
pub struct PolicyHandler {
    name: String,
    check: Arc<Check>,
}

impl PolicyHandler {
    pub fn new(name: impl Into<String>, check: impl Fn(&Ability) -> bool + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    /// `ability.can(action, subject)` on the subject type
    pub fn can(action: Action, subject: &str) -> Self {
        let subject = subject.to_string();
        Self::new(format!("can({action}, {subject})"), move |ability| {
            ability.can(action, subject.as_str())
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn evaluate(&self, ability: &Ability) -> bool {
        (self.check)(ability)
    }
}

impl fmt::Debug for PolicyHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PolicyHandler").field(&self.name).finish()
    }
}

/// Markers attached at one granularity (route class or single route)
#[derive(Debug, Clone, Default)]
pub struct PolicySet {
    allow_anonymous: bool,
    policies: Vec<PolicyHandler>,
}

impl PolicySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_anonymous(mut self) -> Self {
        self.allow_anonymous = true;
        self
    }

    pub fn policy(mut self, policy: PolicyHandler) -> Self {
        self.policies.push(policy);
        self
    }

    pub fn is_anonymous(&self) -> bool {
        self.allow_anonymous
    }

    pub fn policies(&self) -> &[PolicyHandler] {
        &self.policies
    }
}

/// Route-class markers shared by a group of routes plus the route's own markers
#[derive(Debug, Clone, Default)]
pub struct RouteMetadata {
    class: Arc<PolicySet>,
    method: PolicySet,
}

impl RouteMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_class(class: Arc<PolicySet>) -> Self {
        Self {
            class,
            method: PolicySet::default(),
        }
    }

    pub fn allow_anonymous(mut self) -> Self {
        self.method.allow_anonymous = true;
        self
    }

    pub fn policy(mut self, policy: PolicyHandler) -> Self {
        self.method.policies.push(policy);
        self
    }

    /// Anonymous if either level says so
    pub fn is_anonymous(&self) -> bool {
        self.class.is_anonymous() || self.method.is_anonymous()
    }

    /// Class-level policies, then method-level ones
    pub fn policies(&self) -> impl Iterator<Item = &PolicyHandler> {
        self.class.policies().iter().chain(self.method.policies())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policies_are_class_then_method() {
        let class = Arc::new(PolicySet::new().policy(PolicyHandler::can(Action::Read, "Widget")));
        let route = RouteMetadata::for_class(class).policy(PolicyHandler::can(Action::Update, "Widget"));

        let names: Vec<&str> = route.policies().map(PolicyHandler::name).collect();
        assert_eq!(names, vec!["can(read, Widget)", "can(update, Widget)"]);
    }

    #[test]
    fn test_anonymous_at_either_level() {
        assert!(!RouteMetadata::new().is_anonymous());
        assert!(RouteMetadata::new().allow_anonymous().is_anonymous());
        assert!(RouteMetadata::for_class(Arc::new(PolicySet::new().allow_anonymous())).is_anonymous());
    }

    #[test]
    fn test_custom_policy() {
        let ability = Ability::builder().can(Action::Read, "Widget").build();
        let reads_and_not_deletes = PolicyHandler::new("reader", |ability| {
            ability.can(Action::Read, "Widget") && ability.cannot(Action::Delete, "Widget")
        });
        assert!(reads_and_not_deletes.evaluate(&ability));
    }
}
