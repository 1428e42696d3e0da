//! Task file model
//!
//! A task file describes one RunTask step in YAML:
//!
//! ```yaml
//! id: RunWeb
//! synchronous: true
//! cluster:
//!   arn: arn:aws:ecs:us-east-1:123456789012:cluster/main
//!   vpc:
//!     vpcId: vpc-0a1b
//!     subnets:
//!       - subnetId: subnet-1
//!         type: private
//!         group: App
//! taskDefinition:
//!   logicalId: WebTask
//!   compatibility: fargate
//!   taskRole:
//!     logicalId: WebTaskRole
//!   containers:
//!     - name: web
//! containerOverrides:
//!   - containerName: web
//!     cpuPath: $.cpu
//! ```
//!
//! Resources created in the same document are referenced by `logicalId`; their
//! ARNs and ids are resolved from a values file at render time. Every reference
//! takes exactly one of its id key (`arn`, `vpcId`, `subnetId`, `groupId`) and
//! `logicalId`.

use std::collections::BTreeMap;
use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use runtask_common::iam::Role;
use runtask_common::network::{SecurityGroup, Subnet, SubnetSelection, SubnetType, Vpc};
use runtask_common::{Deferred, Stack, Token};
use runtask_ecs::{
    AwsVpcPlacement, Cluster, Compatibility, ContainerDefinition, ContainerOverride, LaunchTarget,
    NetworkMode, RunTaskProps, TaskDefinition,
};

use crate::{Error, Result};

/// Id used when the task file does not name the step
pub const DEFAULT_TASK_ID: &str = "RunTask";

const LOGICAL_ID_KEY: &str = "logicalId";

/// Root of a task file
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TaskFile {
    /// Step id, also the prefix of resources created for the task
    #[serde(default = "default_task_id")]
    pub id: String,
    /// Wait for the task to stop (`.sync` integration)
    #[serde(default)]
    pub synchronous: bool,
    /// Account, region and partition (overridable from the command line)
    #[serde(default)]
    pub stack: Option<Stack>,
    /// Cluster to run on
    pub cluster: ClusterSpec,
    /// Task definition to run
    pub task_definition: TaskDefinitionSpec,
    /// Launch target (default: Fargate)
    #[serde(default)]
    pub launch: LaunchTarget,
    /// `awsvpc` placement
    #[serde(default)]
    pub placement: Option<PlacementSpec>,
    /// Per-container overrides
    #[serde(default)]
    pub container_overrides: Option<Vec<ContainerOverride>>,
    /// Extra parameters merged over the generated ones
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
}

fn default_task_id() -> String {
    DEFAULT_TASK_ID.to_string()
}

/// A resolved id/logicalId pair
#[derive(Clone, Debug, PartialEq, Eq)]
enum Reference {
    Existing(String),
    Owned(String),
}

/// Require exactly one of `id_key` and `logicalId` on the reference at `field`
fn reference(
    field: &str,
    id_key: &str,
    id: &Option<String>,
    logical_id: &Option<String>,
) -> Result<Reference> {
    match (id, logical_id) {
        (Some(id), None) => Ok(Reference::Existing(id.clone())),
        (None, Some(logical_id)) => Ok(Reference::Owned(logical_id.clone())),
        _ => Err(runtask_common::Error::validation_for_field(
            field,
            format!("exactly one of '{}' or '{}' required", id_key, LOGICAL_ID_KEY),
        )
        .into()),
    }
}

/// IAM role reference
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RoleSpec {
    /// Existing role
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
    /// Role created in the same document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_id: Option<String>,
}

impl RoleSpec {
    fn to_role(&self, field: &str) -> Result<Role> {
        Ok(match reference(field, "arn", &self.arn, &self.logical_id)? {
            Reference::Existing(arn) => Role::from_arn(arn),
            Reference::Owned(id) => Role::owned(id),
        })
    }
}

/// Cluster reference
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ClusterSpec {
    /// Existing cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
    /// Cluster created in the same document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_id: Option<String>,
    /// VPC of the cluster, required for `awsvpc` tasks
    #[serde(default)]
    pub vpc: Option<VpcSpec>,
}

/// VPC layout
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VpcSpec {
    /// Existing VPC
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,
    /// VPC created in the same document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_id: Option<String>,
    /// Subnets in VPC order
    #[serde(default)]
    pub subnets: Vec<SubnetSpec>,
}

/// One subnet of a VPC
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SubnetSpec {
    /// Existing subnet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
    /// Subnet created in the same document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_id: Option<String>,
    /// Subnet kind
    #[serde(rename = "type")]
    pub subnet_type: SubnetType,
    /// Subnet group name
    pub group: String,
}

/// Task definition reference
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TaskDefinitionSpec {
    /// Existing task definition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
    /// Task definition created in the same document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_id: Option<String>,
    /// Launch types the task definition supports
    pub compatibility: Compatibility,
    /// Network mode (default: awsvpc for Fargate-compatible definitions, bridge otherwise)
    #[serde(default)]
    pub network_mode: Option<NetworkMode>,
    /// Role assumed by the containers
    pub task_role: RoleSpec,
    /// Role used by the ECS agent
    #[serde(default)]
    pub execution_role: Option<RoleSpec>,
    /// Containers of the task definition
    pub containers: Vec<ContainerDefinition>,
}

/// Security group reference
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SecurityGroupSpec {
    /// Existing group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    /// Group created in the same document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_id: Option<String>,
}

/// Subnet selection: `{type: private}` or `{group: App}`
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SubnetSelectionSpec {
    /// Every subnet of this kind
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub subnet_type: Option<SubnetType>,
    /// Every subnet of this group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl SubnetSelectionSpec {
    fn to_selection(&self) -> Result<SubnetSelection> {
        match (self.subnet_type, &self.group) {
            (Some(kind), None) => Ok(SubnetSelection::Type(kind)),
            (None, Some(group)) => Ok(SubnetSelection::Group(group.clone())),
            _ => Err(runtask_common::Error::validation_for_field(
                "placement.subnets",
                "exactly one of 'type' or 'group' required",
            )
            .into()),
        }
    }
}

/// `awsvpc` placement
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PlacementSpec {
    /// Give the task a public IP (Fargate only)
    #[serde(default)]
    pub assign_public_ip: Option<bool>,
    /// Subnets to place into
    #[serde(default)]
    pub subnets: Option<SubnetSelectionSpec>,
    /// Security group to attach
    #[serde(default)]
    pub security_group: Option<SecurityGroupSpec>,
}

impl TaskFile {
    /// Read and parse a task file
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::parse(&data)
    }

    /// Parse a task file from YAML
    pub fn parse(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Convert to construct props
    pub fn into_props(self) -> Result<RunTaskProps> {
        let vpc = self.cluster.vpc.as_ref().map(VpcSpec::to_vpc).transpose()?;
        let vpc_id = vpc.as_ref().map(|(id, _)| id.clone());

        let mut cluster = match reference(
            "cluster",
            "arn",
            &self.cluster.arn,
            &self.cluster.logical_id,
        )? {
            Reference::Existing(arn) => Cluster::from_arn(arn),
            Reference::Owned(id) => Cluster::owned(&id),
        };
        if let Some((_, vpc)) = vpc {
            cluster = cluster.with_vpc(vpc);
        }

        let placement = match &self.placement {
            Some(spec) => spec.to_placement(vpc_id)?,
            None => AwsVpcPlacement::default(),
        };

        let mut props = RunTaskProps::new(cluster, self.task_definition.to_task_definition()?)
            .with_launch_target(self.launch)
            .with_placement(placement)
            .with_synchronous(self.synchronous);
        props.container_overrides = self.container_overrides;
        props.parameters = self.parameters;

        Ok(props)
    }
}

impl VpcSpec {
    fn to_vpc(&self) -> Result<(Deferred<String>, Vpc)> {
        let vpc_id = match reference("cluster.vpc", "vpcId", &self.vpc_id, &self.logical_id)? {
            Reference::Existing(id) => Deferred::literal(id),
            Reference::Owned(id) => Deferred::reference(Token::new(id, "VpcId")),
        };

        let subnets = self
            .subnets
            .iter()
            .enumerate()
            .map(|(index, subnet)| {
                let field = format!("cluster.vpc.subnets[{}]", index);
                let kind = subnet.subnet_type;
                let group = subnet.group.clone();
                Ok(
                    match reference(&field, "subnetId", &subnet.subnet_id, &subnet.logical_id)? {
                        Reference::Existing(id) => Subnet::imported(id, kind, group),
                        Reference::Owned(id) => Subnet::owned(id, kind, group),
                    },
                )
            })
            .collect::<Result<Vec<_>>>()?;

        Ok((vpc_id.clone(), Vpc::new(vpc_id, subnets)))
    }
}

impl TaskDefinitionSpec {
    fn to_task_definition(&self) -> Result<TaskDefinition> {
        let task_role = self.task_role.to_role("taskDefinition.taskRole")?;
        let mut td = match reference("taskDefinition", "arn", &self.arn, &self.logical_id)? {
            Reference::Existing(arn) => {
                TaskDefinition::new(Deferred::literal(arn), self.compatibility, task_role)
            }
            Reference::Owned(id) => TaskDefinition::owned(&id, self.compatibility, task_role),
        };
        if let Some(mode) = self.network_mode {
            td = td.with_network_mode(mode);
        }
        if let Some(role) = &self.execution_role {
            td = td.with_execution_role(role.to_role("taskDefinition.executionRole")?);
        }
        for container in &self.containers {
            td = td.with_container(container.clone());
        }
        Ok(td)
    }
}

impl PlacementSpec {
    fn to_placement(&self, vpc_id: Option<Deferred<String>>) -> Result<AwsVpcPlacement> {
        let security_group = match &self.security_group {
            Some(spec) => {
                let group = reference(
                    "placement.securityGroup",
                    "groupId",
                    &spec.group_id,
                    &spec.logical_id,
                )?;
                let vpc_id = vpc_id
                    .ok_or_else(|| Error::config("placement.securityGroup requires cluster.vpc"))?;
                Some(match group {
                    Reference::Existing(id) => SecurityGroup::imported(id, vpc_id),
                    Reference::Owned(id) => SecurityGroup::create(id, vpc_id),
                })
            }
            None => None,
        };

        Ok(AwsVpcPlacement {
            assign_public_ip: self.assign_public_ip,
            subnets: self
                .subnets
                .as_ref()
                .map(SubnetSelectionSpec::to_selection)
                .transpose()?,
            security_group,
        })
    }
}
