//! Literal-or-path field projection
//!
//! Override fields can be given either as a literal (`cpu: 256`) or as a
//! reference path into the execution input (`cpuPath: "$.cpu"`). The literal
//! is emitted under `Cpu`, the path under `Cpu.$`. Every field pair in the
//! override model goes through [`project`].

use std::fmt;

use serde::Serialize;

use runtask_common::{Error, Result};

/// Prefix every reference path must start with
pub const REFERENCE_PATH_PREFIX: &str = "$.";

/// Suffix appended to a field name for its reference path form
pub const PATH_FIELD_SUFFIX: &str = "Path";

/// A validated reference path (`$.` prefixed)
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ReferencePath(String);

impl ReferencePath {
    /// Validate `path` as a reference path
    pub fn parse(path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        if !path.starts_with(REFERENCE_PATH_PREFIX) {
            return Err(Error::validation(format!(
                "path must start with '{}'",
                REFERENCE_PATH_PREFIX
            )));
        }
        Ok(Self(path))
    }

    /// The path string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReferencePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a field pair must be supplied
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Requiredness {
    /// Exactly one of literal and path
    Required,
    /// At most one of literal and path
    Optional,
}

/// Result of projecting one field pair.
///
/// At most one side is set.
#[derive(Clone, Debug, PartialEq)]
pub struct Projection<T> {
    /// Literal value, emitted under the destination key
    pub value: Option<T>,
    /// Reference path, emitted under the destination key plus `.$`
    pub path: Option<ReferencePath>,
}

impl<T> Projection<T> {
    /// Neither side set
    pub fn absent() -> Self {
        Self {
            value: None,
            path: None,
        }
    }

    /// Whether neither side is set
    pub fn is_absent(&self) -> bool {
        self.value.is_none() && self.path.is_none()
    }
}

/// Validate and project the pair `key` / `keyPath`.
///
/// Errors:
/// - required, neither or both set: "exactly one of 'key' or 'keyPath' required"
/// - optional, both set: "only one of 'key' or 'keyPath' allowed"
/// - path without the `$.` prefix: "path must start with '$.'"
pub fn project<T: Clone>(
    key: &str,
    value: Option<&T>,
    path: Option<&str>,
    requiredness: Requiredness,
) -> Result<Projection<T>> {
    match (requiredness, value.is_some(), path.is_some()) {
        (Requiredness::Required, true, true) | (Requiredness::Required, false, false) => {
            return Err(Error::validation(format!(
                "exactly one of '{0}' or '{0}{1}' required",
                key, PATH_FIELD_SUFFIX
            )));
        }
        (Requiredness::Optional, true, true) => {
            return Err(Error::validation(format!(
                "only one of '{0}' or '{0}{1}' allowed",
                key, PATH_FIELD_SUFFIX
            )));
        }
        _ => {}
    }

    Ok(Projection {
        value: value.cloned(),
        path: path.map(ReferencePath::parse).transpose()?,
    })
}
