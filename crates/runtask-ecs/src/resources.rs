//! ECS resource references
//!
//! Clusters and task definitions are referenced either by ARN (imported) or
//! by logical id (created in the same document), in which case their ARNs are
//! deferred tokens.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use runtask_common::iam::Role;
use runtask_common::network::Vpc;
use runtask_common::{Deferred, Token};

/// Networking mode of a task definition
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    /// Each task gets its own elastic network interface
    AwsVpc,
    /// Docker bridge network
    Bridge,
    /// Host network
    Host,
    /// No networking
    None,
}

impl fmt::Display for NetworkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwsVpc => write!(f, "awsvpc"),
            Self::Bridge => write!(f, "bridge"),
            Self::Host => write!(f, "host"),
            Self::None => write!(f, "none"),
        }
    }
}

/// Launch types a task definition can run on
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Compatibility {
    /// EC2 container instances only
    Ec2,
    /// Fargate only
    Fargate,
    /// Both EC2 and Fargate
    Ec2AndFargate,
}

impl Compatibility {
    /// Whether tasks can be placed on EC2 container instances
    pub fn is_ec2_compatible(self) -> bool {
        matches!(self, Self::Ec2 | Self::Ec2AndFargate)
    }

    /// Whether tasks can be placed on Fargate
    pub fn is_fargate_compatible(self) -> bool {
        matches!(self, Self::Fargate | Self::Ec2AndFargate)
    }
}

/// A container of a task definition
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerDefinition {
    /// Container name, unique within the task definition
    pub name: String,
    /// Whether the task stops when this container stops
    #[serde(default = "default_essential")]
    pub essential: bool,
}

fn default_essential() -> bool {
    true
}

impl ContainerDefinition {
    /// Essential container
    pub fn essential(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            essential: true,
        }
    }

    /// Non-essential (sidecar) container
    pub fn sidecar(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            essential: false,
        }
    }
}

/// Reference to an ECS task definition
#[derive(Clone, Debug, PartialEq)]
pub struct TaskDefinition {
    arn: Deferred<String>,
    compatibility: Compatibility,
    network_mode: NetworkMode,
    task_role: Role,
    execution_role: Option<Role>,
    containers: Vec<ContainerDefinition>,
}

impl TaskDefinition {
    /// Describe a task definition with the given ARN.
    ///
    /// The network mode defaults to `awsvpc` for Fargate-compatible
    /// definitions and `bridge` otherwise.
    pub fn new(arn: Deferred<String>, compatibility: Compatibility, task_role: Role) -> Self {
        let network_mode = if compatibility.is_fargate_compatible() {
            NetworkMode::AwsVpc
        } else {
            NetworkMode::Bridge
        };
        Self {
            arn,
            compatibility,
            network_mode,
            task_role,
            execution_role: None,
            containers: Vec::new(),
        }
    }

    /// Task definition created in the same document
    pub fn owned(logical_id: &str, compatibility: Compatibility, task_role: Role) -> Self {
        Self::new(
            Deferred::reference(Token::new(logical_id, "TaskDefinitionArn")),
            compatibility,
            task_role,
        )
    }

    /// Override the network mode
    pub fn with_network_mode(mut self, network_mode: NetworkMode) -> Self {
        self.network_mode = network_mode;
        self
    }

    /// Set the role the ECS agent uses to pull images and ship logs
    pub fn with_execution_role(mut self, role: Role) -> Self {
        self.execution_role = Some(role);
        self
    }

    /// Add a container
    pub fn with_container(mut self, container: ContainerDefinition) -> Self {
        self.containers.push(container);
        self
    }

    /// Task definition ARN
    pub fn arn(&self) -> &Deferred<String> {
        &self.arn
    }

    /// Supported launch types
    pub fn compatibility(&self) -> Compatibility {
        self.compatibility
    }

    /// Network mode
    pub fn network_mode(&self) -> NetworkMode {
        self.network_mode
    }

    /// Role assumed by the task's containers
    pub fn task_role(&self) -> &Role {
        &self.task_role
    }

    /// Role used by the ECS agent, if any
    pub fn execution_role(&self) -> Option<&Role> {
        self.execution_role.as_ref()
    }

    /// First essential container
    pub fn default_container(&self) -> Option<&ContainerDefinition> {
        self.containers.iter().find(|c| c.essential)
    }

    /// Container with the given name
    pub fn find_container(&self, name: &str) -> Option<&ContainerDefinition> {
        self.containers.iter().find(|c| c.name == name)
    }
}

/// Reference to an ECS cluster
#[derive(Clone, Debug, PartialEq)]
pub struct Cluster {
    arn: Deferred<String>,
    vpc: Option<Vpc>,
}

impl Cluster {
    /// Reference an existing cluster by ARN
    pub fn from_arn(arn: impl Into<String>) -> Self {
        Self {
            arn: Deferred::literal(arn.into()),
            vpc: None,
        }
    }

    /// Cluster created in the same document
    pub fn owned(logical_id: &str) -> Self {
        Self {
            arn: Deferred::reference(Token::new(logical_id, "Arn")),
            vpc: None,
        }
    }

    /// Attach the VPC tasks of this cluster are placed into
    pub fn with_vpc(mut self, vpc: Vpc) -> Self {
        self.vpc = Some(vpc);
        self
    }

    /// Cluster ARN
    pub fn arn(&self) -> &Deferred<String> {
        &self.arn
    }

    /// Cluster VPC, if known
    pub fn vpc(&self) -> Option<&Vpc> {
        self.vpc.as_ref()
    }
}
