//! Deployment scope and ARN formatting

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default AWS partition
pub const DEFAULT_PARTITION: &str = "aws";

/// Deployment scope the described resources live in
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Stack {
    /// AWS account id (e.g., "123456789012")
    pub account: String,
    /// AWS region (e.g., "us-east-1")
    pub region: String,
    /// AWS partition (default: "aws")
    #[serde(default = "default_partition")]
    pub partition: String,
}

fn default_partition() -> String {
    DEFAULT_PARTITION.to_string()
}

/// Components of a `resource/name` ARN inside the stack's account and region
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArnComponents<'a> {
    /// Service namespace (e.g., "events")
    pub service: &'a str,
    /// Resource type (e.g., "rule")
    pub resource: &'a str,
    /// Resource name (e.g., "MyRule")
    pub resource_name: &'a str,
}

impl<'a> ArnComponents<'a> {
    /// Components for `service`/`resource`/`name`
    pub fn new(service: &'a str, resource: &'a str, resource_name: &'a str) -> Self {
        Self {
            service,
            resource,
            resource_name,
        }
    }
}

impl Stack {
    /// Create a stack in the default partition
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            region: region.into(),
            partition: default_partition(),
        }
    }

    /// Use a non-default partition (e.g., "aws-cn", "aws-us-gov")
    pub fn with_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = partition.into();
        self
    }

    /// Format an ARN scoped to this stack's partition, region and account
    pub fn format_arn(&self, components: &ArnComponents<'_>) -> String {
        format!(
            "arn:{}:{}:{}:{}:{}/{}",
            self.partition,
            components.service,
            self.region,
            self.account,
            components.resource,
            components.resource_name
        )
    }
}
