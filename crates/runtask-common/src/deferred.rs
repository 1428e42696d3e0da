//! Deferred values
//!
//! A [`Deferred`] is either a literal known at build time or a lazy producer
//! whose concrete value only exists once the renderer has a [`Resolve`]
//! implementation at hand (e.g., the ARN of a role that is created in the same
//! document). Builders compose deferred values with [`Deferred::map`] and
//! [`Deferred::collect`]; only renderers call [`Deferred::resolve`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Reference to an attribute of another resource in the same document
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token {
    logical_id: String,
    attribute: String,
}

impl Token {
    /// Create a token for `logical_id.attribute`
    pub fn new(logical_id: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            logical_id: logical_id.into(),
            attribute: attribute.into(),
        }
    }

    /// Logical id of the referenced resource
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// Referenced attribute (e.g., "Arn", "GroupId")
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Lookup key used by [`ResolutionContext`]: `LogicalId.Attribute`
    pub fn key(&self) -> String {
        format!("{}.{}", self.logical_id, self.attribute)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${{{}.{}}}", self.logical_id, self.attribute)
    }
}

/// Resolves tokens to concrete values at render time
pub trait Resolve {
    /// Return the concrete value of `token`
    fn resolve_token(&self, token: &Token) -> Result<String>;
}

type Producer<T> = Arc<dyn Fn(&dyn Resolve) -> Result<T> + Send + Sync>;

/// A value that is either known now or produced later by a resolver
pub enum Deferred<T> {
    /// Value known at build time
    Literal(T),
    /// Value produced at render time
    Lazy {
        /// Human-readable description, also used for equality
        label: String,
        /// Producer invoked by [`Deferred::resolve`]
        produce: Producer<T>,
    },
}

impl<T> Deferred<T> {
    /// Wrap a value known at build time
    pub fn literal(value: T) -> Self {
        Self::Literal(value)
    }

    /// Create a value produced at render time
    pub fn lazy<F>(label: impl Into<String>, produce: F) -> Self
    where
        F: Fn(&dyn Resolve) -> Result<T> + Send + Sync + 'static,
    {
        Self::Lazy {
            label: label.into(),
            produce: Arc::new(produce),
        }
    }

    /// Whether the concrete value is already known
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Literal(_))
    }

    /// The value, if it is already known
    pub fn as_literal(&self) -> Option<&T> {
        match self {
            Self::Literal(value) => Some(value),
            Self::Lazy { .. } => None,
        }
    }

    /// Description of a lazy value
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Literal(_) => None,
            Self::Lazy { label, .. } => Some(label),
        }
    }
}

impl<T: Clone + 'static> Deferred<T> {
    /// Produce the concrete value. Only renderers call this.
    pub fn resolve(&self, resolver: &dyn Resolve) -> Result<T> {
        match self {
            Self::Literal(value) => Ok(value.clone()),
            Self::Lazy { produce, .. } => produce(resolver),
        }
    }

    /// Project a not-yet-known value.
    ///
    /// Literals are mapped immediately; lazy values keep their label and apply
    /// `f` after resolution.
    pub fn map<U, F>(self, f: F) -> Deferred<U>
    where
        F: Fn(T) -> U + Send + Sync + 'static,
        U: 'static,
    {
        match self {
            Self::Literal(value) => Deferred::Literal(f(value)),
            Self::Lazy { label, produce } => Deferred::Lazy {
                label,
                produce: Arc::new(move |resolver: &dyn Resolve| produce(resolver).map(&f)),
            },
        }
    }

    /// Combine a list of deferred values into one deferred list.
    ///
    /// The result is a literal when every element is a literal.
    pub fn collect(items: Vec<Deferred<T>>) -> Deferred<Vec<T>>
    where
        T: Send + Sync,
    {
        if items.iter().all(Deferred::is_resolved) {
            return Deferred::Literal(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        Self::Literal(value) => Some(value),
                        Self::Lazy { .. } => None,
                    })
                    .collect(),
            );
        }

        let label = items
            .iter()
            .map(|item| item.label().unwrap_or("<literal>"))
            .collect::<Vec<_>>()
            .join(",");
        Deferred::lazy(format!("[{}]", label), move |resolver| {
            items.iter().map(|item| item.resolve(resolver)).collect()
        })
    }
}

impl Deferred<String> {
    /// A string that resolves to the value of `token`
    pub fn reference(token: Token) -> Self {
        let label = token.to_string();
        Self::lazy(label, move |resolver| resolver.resolve_token(&token))
    }
}

impl<T> From<T> for Deferred<T> {
    fn from(value: T) -> Self {
        Self::Literal(value)
    }
}

impl<T: Clone> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Literal(value) => Self::Literal(value.clone()),
            Self::Lazy { label, produce } => Self::Lazy {
                label: label.clone(),
                produce: Arc::clone(produce),
            },
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Lazy { label, .. } => f.debug_tuple("Lazy").field(label).finish(),
        }
    }
}

/// Lazy values compare by label.
impl<T: PartialEq> PartialEq for Deferred<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Literal(a), Self::Literal(b)) => a == b,
            (Self::Lazy { label: a, .. }, Self::Lazy { label: b, .. }) => a == b,
            _ => false,
        }
    }
}

/// Map-backed resolver keyed by `LogicalId.Attribute`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolutionContext {
    values: BTreeMap<String, String>,
}

impl ResolutionContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value for `LogicalId.Attribute`
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Add a value for `LogicalId.Attribute`
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Number of known values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no values are known
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Resolve for ResolutionContext {
    fn resolve_token(&self, token: &Token) -> Result<String> {
        self.values
            .get(&token.key())
            .cloned()
            .ok_or_else(|| Error::unresolved(token.to_string()))
    }
}
