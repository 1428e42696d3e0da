//! IAM roles and policy statements
//!
//! Statements are built with deferred resources so ARNs of roles and task
//! definitions created in the same document can be referenced before they
//! exist. [`PolicyStatement::render`] produces the IAM JSON form.

use serde_json::Value;

use crate::deferred::{Deferred, Resolve, Token};
use crate::Result;

/// IAM policy language version emitted in rendered documents
pub const POLICY_VERSION: &str = "2012-10-17";

/// Resource wildcard matching every resource
pub const WILDCARD_RESOURCE: &str = "*";

/// Reference to an IAM role
#[derive(Clone, Debug, PartialEq)]
pub struct Role {
    arn: Deferred<String>,
}

impl Role {
    /// Reference an existing role by ARN
    pub fn from_arn(arn: impl Into<String>) -> Self {
        Self {
            arn: Deferred::literal(arn.into()),
        }
    }

    /// Reference a role created in the same document
    pub fn owned(logical_id: impl Into<String>) -> Self {
        Self {
            arn: Deferred::reference(Token::new(logical_id, "Arn")),
        }
    }

    /// The role ARN
    pub fn arn(&self) -> &Deferred<String> {
        &self.arn
    }
}

/// Resource scope of a policy statement
#[derive(Clone, Debug, PartialEq)]
pub enum PolicyResource {
    /// A single, possibly deferred, ARN
    Arn(Deferred<String>),
    /// Every resource (`*`)
    Any,
    /// A deferred list of ARNs, flattened into the statement on render
    Arns(Deferred<Vec<String>>),
}

impl PolicyResource {
    fn render_into(&self, resolver: &dyn Resolve, out: &mut Vec<String>) -> Result<()> {
        match self {
            Self::Arn(arn) => out.push(arn.resolve(resolver)?),
            Self::Any => out.push(WILDCARD_RESOURCE.to_string()),
            Self::Arns(arns) => out.extend(arns.resolve(resolver)?),
        }
        Ok(())
    }
}

/// An `Allow` rule pairing actions with resources
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PolicyStatement {
    actions: Vec<String>,
    resources: Vec<PolicyResource>,
}

impl PolicyStatement {
    /// Start an `Allow` statement with no actions or resources
    pub fn allow() -> Self {
        Self::default()
    }

    /// Add actions, keeping insertion order and dropping duplicates
    pub fn with_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for action in actions {
            self.add_action(action);
        }
        self
    }

    /// Add one resource scope
    pub fn with_resource(mut self, resource: PolicyResource) -> Self {
        self.resources.push(resource);
        self
    }

    /// Add an action unless it is already present
    pub fn add_action(&mut self, action: impl Into<String>) {
        let action = action.into();
        if !self.actions.contains(&action) {
            self.actions.push(action);
        }
    }

    /// Scope the statement to every resource
    pub fn add_all_resources(&mut self) {
        self.resources.push(PolicyResource::Any);
    }

    /// Actions in insertion order
    pub fn actions(&self) -> &[String] {
        &self.actions
    }

    /// Resource scopes in insertion order
    pub fn resources(&self) -> &[PolicyResource] {
        &self.resources
    }

    /// Render to IAM JSON, resolving deferred resources.
    ///
    /// Single actions/resources are emitted as strings, several as arrays.
    pub fn render(&self, resolver: &dyn Resolve) -> Result<Value> {
        let mut resources = Vec::new();
        for resource in &self.resources {
            resource.render_into(resolver, &mut resources)?;
        }

        Ok(serde_json::json!({
            "Effect": "Allow",
            "Action": one_or_many(&self.actions),
            "Resource": one_or_many(&resources),
        }))
    }
}

fn one_or_many(values: &[String]) -> Value {
    match values {
        [single] => Value::String(single.clone()),
        many => Value::Array(many.iter().cloned().map(Value::String).collect()),
    }
}

/// Render statements as a complete IAM policy document
pub fn render_policy_document(
    statements: &[PolicyStatement],
    resolver: &dyn Resolve,
) -> Result<Value> {
    let rendered = statements
        .iter()
        .map(|statement| statement.render(resolver))
        .collect::<Result<Vec<_>>>()?;

    Ok(serde_json::json!({
        "Version": POLICY_VERSION,
        "Statement": rendered,
    }))
}
