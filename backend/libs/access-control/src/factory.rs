use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::ability::{Ability, AbilityBuilder, Rule};
use crate::identity::Identity;

/// Placeholder in rule conditions replaced by the identity's subject id
pub const SUBJECT_ID_PLACEHOLDER: &str = "${subject_id}";

/// Maps an identity to its permission set
///
/// One implementation is registered per service at startup. Implementations
/// must be deterministic; the guards compute an ability at most once per
/// request. An `Err` is an infrastructure failure (HTTP 500), never a denial.
#[async_trait]
pub trait AbilityFactory: Send + Sync {
    async fn create_ability(&self, identity: &Identity) -> anyhow::Result<Ability>;
}

/// Reference factory built from role to rule-template mappings
///
/// Identities holding the superuser role get [`Ability::unrestricted`].
/// Otherwise the rules are the `authenticated` templates followed by each
/// held role's templates, in the identity's role order.
#[derive(Debug, Clone, Default)]
pub struct RoleAbilityFactory {
    authenticated: Vec<Rule>,
    roles: HashMap<String, Vec<Rule>>,
}

impl RoleAbilityFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules granted to every authenticated identity
    pub fn authenticated(mut self, rules: impl FnOnce(AbilityBuilder) -> AbilityBuilder) -> Self {
        self.authenticated
            .extend(rules(AbilityBuilder::default()).into_rules());
        self
    }

    pub fn role(
        mut self,
        role: impl Into<String>,
        rules: impl FnOnce(AbilityBuilder) -> AbilityBuilder,
    ) -> Self {
        self.roles
            .entry(role.into())
            .or_default()
            .extend(rules(AbilityBuilder::default()).into_rules());
        self
    }

    pub fn build_for(&self, identity: &Identity) -> Ability {
        if identity.is_superuser() {
            return Ability::unrestricted();
        }

        let templates = self.authenticated.iter().chain(
            identity
                .roles()
                .iter()
                .filter_map(|role| self.roles.get(role))
                .flatten(),
        );

        Ability::from_rules(
            templates
                .map(|rule| bind_subject(rule, identity.subject_id()))
                .collect(),
        )
    }
}

#[async_trait]
impl AbilityFactory for RoleAbilityFactory {
    async fn create_ability(&self, identity: &Identity) -> anyhow::Result<Ability> {
        Ok(self.build_for(identity))
    }
}

fn bind_subject(template: &Rule, subject_id: &str) -> Rule {
    let mut rule = template.clone();
    if let Some(conditions) = rule.conditions.as_mut() {
        for value in conditions.values_mut() {
            if let Value::String(text) = value {
                if text.contains(SUBJECT_ID_PLACEHOLDER) {
                    *text = text.replace(SUBJECT_ID_PLACEHOLDER, subject_id);
                }
            }
        }
    }
    rule
}
