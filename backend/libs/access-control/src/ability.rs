//! Permission rules for one identity
//!
//! An [`Ability`] is an ordered list of grant and deny rules. A check scans
//! the rules from last to first and the first rule that matches decides, so
//! a later, narrower `cannot` overrides an earlier, broader `can`:
//!
//! ```rust,ignore
//! let ability = Ability::builder()
//!     .can(Action::Read, "Widget")
//!     .cannot_where(Action::Read, "Widget", json!({ "archived": true }))
//!     .build();
//!
//! assert!(ability.can(Action::Read, Subject::instance("Widget", &json!({ "archived": false }))));
//! assert!(ability.cannot(Action::Read, Subject::instance("Widget", &json!({ "archived": true }))));
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Subject type matching every subject
pub const ALL_SUBJECTS: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Any action
    Manage,
    Create,
    Read,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Manage => "manage",
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }

    fn covers(self, requested: Action) -> bool {
        self == Action::Manage || self == requested
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manage" => Ok(Action::Manage),
            "create" => Ok(Action::Create),
            "read" => Ok(Action::Read),
            "update" => Ok(Action::Update),
            "delete" => Ok(Action::Delete),
            other => Err(format!("unknown action: {other}")),
        }
    }
}

/// What a check is about: a subject type, or a concrete record of that type
#[derive(Debug, Clone, Copy)]
pub enum Subject<'a> {
    Type(&'a str),
    Instance { kind: &'a str, fields: &'a Value },
}

impl<'a> Subject<'a> {
    pub fn instance(kind: &'a str, fields: &'a Value) -> Self {
        Subject::Instance { kind, fields }
    }

    pub fn kind(&self) -> &'a str {
        match *self {
            Subject::Type(kind) | Subject::Instance { kind, .. } => kind,
        }
    }
}

impl<'a> From<&'a str> for Subject<'a> {
    fn from(kind: &'a str) -> Self {
        Subject::Type(kind)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub action: Action,
    pub subject: String,
    /// Field equality constraints on the subject instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Map<String, Value>>,
    /// `true` for a deny (`cannot`) rule
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub inverted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Rule {
    fn applies_to(&self, action: Action, subject: &Subject<'_>) -> bool {
        if !self.action.covers(action) {
            return false;
        }
        if self.subject != ALL_SUBJECTS && self.subject != subject.kind() {
            return false;
        }

        match (&self.conditions, subject) {
            (None, _) => true,
            // Type-level check: a conditional grant may apply to some record,
            // a conditional deny cannot rule out every record.
            (Some(_), Subject::Type(_)) => !self.inverted,
            (Some(conditions), Subject::Instance { fields, .. }) => conditions
                .iter()
                .all(|(field, expected)| fields.get(field) == Some(expected)),
        }
    }
}

/// Queryable permission set for one identity
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ability {
    rules: Vec<Rule>,
    unrestricted: bool,
}

impl Ability {
    /// "manage all": every check passes without scanning rules
    pub fn unrestricted() -> Self {
        Self {
            rules: vec![Rule {
                action: Action::Manage,
                subject: ALL_SUBJECTS.to_string(),
                conditions: None,
                inverted: false,
                reason: None,
            }],
            unrestricted: true,
        }
    }

    /// No rules: every check fails
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builder() -> AbilityBuilder {
        AbilityBuilder::default()
    }

    pub fn from_rules(rules: Vec<Rule>) -> Self {
        Self {
            rules,
            unrestricted: false,
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        self.unrestricted
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// The rule that decides `action` on `subject`, scanning last to first
    pub fn relevant_rule<'s>(&self, action: Action, subject: impl Into<Subject<'s>>) -> Option<&Rule> {
        let subject = subject.into();
        self.rules
            .iter()
            .rev()
            .find(|rule| rule.applies_to(action, &subject))
    }

    pub fn can<'s>(&self, action: Action, subject: impl Into<Subject<'s>>) -> bool {
        if self.unrestricted {
            return true;
        }
        self.relevant_rule(action, subject)
            .is_some_and(|rule| !rule.inverted)
    }

    pub fn cannot<'s>(&self, action: Action, subject: impl Into<Subject<'s>>) -> bool {
        !self.can(action, subject)
    }
}

/// Builds an [`Ability`] in declaration order
#[derive(Debug, Clone, Default)]
pub struct AbilityBuilder {
    rules: Vec<Rule>,
}

impl AbilityBuilder {
    pub fn can(self, action: Action, subject: &str) -> Self {
        self.push(action, subject, None, false)
    }

    /// Grant restricted to instances whose fields equal `conditions` (a JSON object)
    pub fn can_where(self, action: Action, subject: &str, conditions: Value) -> Self {
        self.push(action, subject, as_conditions(conditions), false)
    }

    pub fn cannot(self, action: Action, subject: &str) -> Self {
        self.push(action, subject, None, true)
    }

    pub fn cannot_where(self, action: Action, subject: &str, conditions: Value) -> Self {
        self.push(action, subject, as_conditions(conditions), true)
    }

    /// Attach a reason to the most recent rule
    pub fn because(mut self, reason: impl Into<String>) -> Self {
        if let Some(rule) = self.rules.last_mut() {
            rule.reason = Some(reason.into());
        }
        self
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn into_rules(self) -> Vec<Rule> {
        self.rules
    }

    pub fn build(self) -> Ability {
        Ability::from_rules(self.rules)
    }

    fn push(mut self, action: Action, subject: &str, conditions: Option<Map<String, Value>>, inverted: bool) -> Self {
        self.rules.push(Rule {
            action,
            subject: subject.to_string(),
            conditions,
            inverted,
            reason: None,
        });
        self
    }
}

fn as_conditions(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) if !map.is_empty() => Some(map),
        _ => None,
    }
}
