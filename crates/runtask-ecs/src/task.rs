//! The RunTask construct
//!
//! [`RunTask::new`] validates the caller's props and composes the task
//! description in one pass: overrides, launch target checks, network
//! configuration and the access policy. Nothing is resolved until
//! [`RunTask::render`] is handed a resolver.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use runtask_common::iam::{render_policy_document, PolicyStatement};
use runtask_common::network::Connections;
use runtask_common::{Deferred, Error, Resolve, Result, Stack};

use crate::launch::LaunchTarget;
use crate::network::{configure_awsvpc, AwsVpcPlacement, NetworkConfiguration};
use crate::overrides::{render_overrides, ContainerOverride, TaskOverrides};
use crate::policy::{derive_policy_statements, resource_arn, TaskExecutionContext};
use crate::resources::{Cluster, TaskDefinition};

/// Parameter keys produced by the builder itself
pub const CORE_PARAMETER_KEYS: &[&str] = &[
    "Cluster",
    "TaskDefinition",
    "NetworkConfiguration",
    "Overrides",
    "LaunchType",
    "PlatformVersion",
    "PlacementConstraints",
    "PlacementStrategy",
];

/// Inputs of a RunTask description
#[derive(Clone, Debug)]
pub struct RunTaskProps {
    /// Cluster to run on
    pub cluster: Cluster,
    /// Task definition to run
    pub task_definition: TaskDefinition,
    /// Fargate or EC2
    pub launch_target: LaunchTarget,
    /// `awsvpc` placement settings
    pub placement: AwsVpcPlacement,
    /// Per-container overrides
    pub container_overrides: Option<Vec<ContainerOverride>>,
    /// Wait for the task to stop (`.sync` integration)
    pub synchronous: bool,
    /// Extra parameters merged over the generated ones
    pub parameters: BTreeMap<String, Value>,
}

impl RunTaskProps {
    /// Fire-and-forget Fargate run with default placement
    pub fn new(cluster: Cluster, task_definition: TaskDefinition) -> Self {
        Self {
            cluster,
            task_definition,
            launch_target: LaunchTarget::default(),
            placement: AwsVpcPlacement::default(),
            container_overrides: None,
            synchronous: false,
            parameters: BTreeMap::new(),
        }
    }

    /// Set the launch target
    pub fn with_launch_target(mut self, launch_target: LaunchTarget) -> Self {
        self.launch_target = launch_target;
        self
    }

    /// Set the `awsvpc` placement
    pub fn with_placement(mut self, placement: AwsVpcPlacement) -> Self {
        self.placement = placement;
        self
    }

    /// Set the container overrides
    pub fn with_container_overrides(mut self, overrides: Vec<ContainerOverride>) -> Self {
        self.container_overrides = Some(overrides);
        self
    }

    /// Set the execution mode
    pub fn with_synchronous(mut self, synchronous: bool) -> Self {
        self.synchronous = synchronous;
        self
    }

    /// Add an extra parameter
    pub fn with_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }
}

/// The `Parameters` object of the task state, before resolution
#[derive(Clone, Debug, PartialEq)]
pub struct RunTaskParameters {
    /// Cluster ARN
    pub cluster: Deferred<String>,
    /// Task definition ARN
    pub task_definition: Deferred<String>,
    /// Present when the task uses `awsvpc` networking
    pub network_configuration: Option<NetworkConfiguration>,
    /// Present when at least one container override was given
    pub overrides: Option<TaskOverrides>,
    /// Launch type and placement
    pub launch_target: LaunchTarget,
    /// Caller-supplied extra parameters
    pub extensions: BTreeMap<String, Value>,
}

impl RunTaskParameters {
    /// Resolve into the JSON `Parameters` object.
    ///
    /// Extension entries are written last and replace generated keys.
    pub fn render(&self, resolver: &dyn Resolve) -> Result<Value> {
        let mut parameters = Map::new();
        parameters.insert("Cluster".to_string(), Value::String(self.cluster.resolve(resolver)?));
        parameters.insert(
            "TaskDefinition".to_string(),
            Value::String(self.task_definition.resolve(resolver)?),
        );
        if let Some(network) = &self.network_configuration {
            parameters.insert("NetworkConfiguration".to_string(), network.render(resolver)?);
        }
        if let Some(overrides) = &self.overrides {
            parameters.insert("Overrides".to_string(), serde_json::to_value(overrides)?);
        }
        self.launch_target.render_into(&mut parameters);

        for (key, value) in &self.extensions {
            parameters.insert(key.clone(), value.clone());
        }

        Ok(Value::Object(parameters))
    }
}

/// Build-time description handed to the template renderer
#[derive(Clone, Debug, PartialEq)]
pub struct RunTaskDescription {
    /// Integration resource ARN encoding the execution mode
    pub resource_arn: String,
    /// Statements the state machine role needs
    pub policy_statements: Vec<PolicyStatement>,
    /// Unresolved task parameters
    pub parameters: RunTaskParameters,
}

/// Fully resolved task state
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RenderedTask {
    /// Integration resource ARN
    #[serde(rename = "Resource")]
    pub resource: String,
    /// Task parameters
    #[serde(rename = "Parameters")]
    pub parameters: Value,
    /// Policy document for the state machine role
    #[serde(rename = "PolicyDocument")]
    pub policy_document: Value,
}

impl RunTaskDescription {
    /// Resolve every deferred value
    pub fn render(&self, resolver: &dyn Resolve) -> Result<RenderedTask> {
        Ok(RenderedTask {
            resource: self.resource_arn.clone(),
            parameters: self.parameters.render(resolver)?,
            policy_document: render_policy_document(&self.policy_statements, resolver)?,
        })
    }
}

/// A validated ECS RunTask step
#[derive(Clone, Debug)]
pub struct RunTask {
    id: String,
    description: RunTaskDescription,
    connections: Connections,
}

impl RunTask {
    /// Validate `props` and build the description.
    ///
    /// `id` scopes resources created on the task's behalf (the default
    /// security group is `<id>SecurityGroup`).
    pub fn new(id: impl Into<String>, stack: &Stack, props: RunTaskProps) -> Result<Self> {
        let id = id.into();
        let RunTaskProps {
            cluster,
            task_definition,
            launch_target,
            placement,
            container_overrides,
            synchronous,
            parameters,
        } = props;

        let overrides = render_overrides(container_overrides.as_deref())?;
        check_container_names(
            container_overrides.as_deref().unwrap_or_default(),
            &task_definition,
        )?;

        launch_target.validate(&task_definition, &placement)?;

        let mut connections = Connections::new();
        let network_configuration = if launch_target.uses_awsvpc(&task_definition) {
            let vpc = cluster.vpc().ok_or_else(|| {
                Error::validation_for_field(
                    "cluster",
                    "cluster has no VPC to place awsvpc tasks into",
                )
            })?;
            Some(configure_awsvpc(&id, vpc, placement, &mut connections)?)
        } else {
            None
        };

        let ctx = TaskExecutionContext::new(&task_definition, &cluster);
        let policy_statements = derive_policy_statements(&ctx, synchronous, stack);

        for key in parameters.keys() {
            if CORE_PARAMETER_KEYS.contains(&key.as_str()) {
                warn!(task = %id, key = %key, "extra parameter replaces a generated parameter");
            }
        }

        debug!(
            task = %id,
            launch_type = launch_target.launch_type(),
            synchronous,
            awsvpc = network_configuration.is_some(),
            overrides = overrides.as_ref().map_or(0, |o| o.container_overrides.len()),
            statements = policy_statements.len(),
            "built RunTask description"
        );

        Ok(Self {
            description: RunTaskDescription {
                resource_arn: resource_arn(synchronous),
                policy_statements,
                parameters: RunTaskParameters {
                    cluster: cluster.arn().clone(),
                    task_definition: task_definition.arn().clone(),
                    network_configuration,
                    overrides,
                    launch_target,
                    extensions: parameters,
                },
            },
            id,
            connections,
        })
    }

    /// Construct id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The unresolved description
    pub fn description(&self) -> &RunTaskDescription {
        &self.description
    }

    /// Security groups attached to the task
    pub fn connections(&self) -> &Connections {
        &self.connections
    }

    /// Security groups attached to the task, for adding ingress rules
    pub fn connections_mut(&mut self) -> &mut Connections {
        &mut self.connections
    }

    /// Resolve the description
    pub fn render(&self, resolver: &dyn Resolve) -> Result<RenderedTask> {
        self.description.render(resolver)
    }
}

/// Literal container names must exist in the task definition. Path-selected
/// names are only known at execution time.
fn check_container_names(
    overrides: &[ContainerOverride],
    task_definition: &TaskDefinition,
) -> Result<()> {
    for (index, unit) in overrides.iter().enumerate() {
        if let Some(name) = &unit.container_name {
            if task_definition.find_container(name).is_none() {
                return Err(Error::validation_for_field(
                    format!("containerOverrides[{}].containerName", index),
                    format!(
                        "Overrides mention container with name '{}', \
                         but no such container in task definition",
                        name
                    ),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{Compatibility, ContainerDefinition};
    use runtask_common::iam::Role;
    use runtask_common::network::{Subnet, SubnetType, Vpc};
    use runtask_common::ResolutionContext;
    use serde_json::json;

    fn stack() -> Stack {
        Stack::new("123456789012", "us-east-1")
    }

    fn cluster() -> Cluster {
        Cluster::from_arn("arn:aws:ecs:us-east-1:123456789012:cluster/main").with_vpc(Vpc::new(
            Deferred::literal("vpc-1".to_string()),
            vec![Subnet::imported("subnet-a", SubnetType::Private, "App")],
        ))
    }

    fn task_definition() -> TaskDefinition {
        TaskDefinition::new(
            Deferred::literal(
                "arn:aws:ecs:us-east-1:123456789012:task-definition/web:1".to_string(),
            ),
            Compatibility::Fargate,
            Role::from_arn("arn:aws:iam::123456789012:role/task"),
        )
        .with_container(ContainerDefinition::essential("web"))
    }

    fn resolver() -> ResolutionContext {
        ResolutionContext::new().with("RunSecurityGroup.GroupId", "sg-1")
    }

    #[test]
    fn extension_parameters_replace_generated_ones() {
        let props = RunTaskProps::new(cluster(), task_definition())
            .with_parameter("LaunchType", json!("FARGATE_SPOT"))
            .with_parameter("Tags", json!([{ "Key": "team", "Value": "data" }]));
        let task = RunTask::new("Run", &stack(), props).unwrap();

        let rendered = task.render(&resolver()).unwrap();
        assert_eq!(rendered.parameters["LaunchType"], "FARGATE_SPOT");
        assert_eq!(rendered.parameters["Tags"][0]["Key"], "team");
    }

    #[test]
    fn unknown_literal_container_is_rejected() {
        let props = RunTaskProps::new(cluster(), task_definition())
            .with_container_overrides(vec![ContainerOverride::named("worker")]);
        let err = RunTask::new("Run", &stack(), props).unwrap_err();

        assert_eq!(err.field(), Some("containerOverrides[0].containerName"));
        assert_eq!(
            err.to_string(),
            "validation error: Overrides mention container with name 'worker', \
             but no such container in task definition"
        );
    }

    #[test]
    fn path_selected_container_is_not_cross_checked() {
        let props = RunTaskProps::new(cluster(), task_definition()).with_container_overrides(vec![
            ContainerOverride {
                container_name_path: Some("$.container".to_string()),
                ..Default::default()
            },
        ]);
        assert!(RunTask::new("Run", &stack(), props).is_ok());
    }

    #[test]
    fn awsvpc_without_cluster_vpc_fails() {
        let cluster = Cluster::from_arn("arn:aws:ecs:us-east-1:123456789012:cluster/main");
        let props = RunTaskProps::new(cluster, task_definition());
        let err = RunTask::new("Run", &stack(), props).unwrap_err();
        assert_eq!(err.field(), Some("cluster"));
    }

    #[test]
    fn override_errors_win_over_launch_errors() {
        let ec2_only = TaskDefinition::owned("Td", Compatibility::Ec2, Role::owned("TaskRole"));
        let props = RunTaskProps::new(cluster(), ec2_only)
            .with_container_overrides(vec![ContainerOverride::default()]);
        let err = RunTask::new("Run", &stack(), props).unwrap_err();
        assert_eq!(err.field(), Some("containerOverrides[0]"));
    }

    #[test]
    fn connections_can_be_extended_after_build() {
        use runtask_common::network::Peer;

        let props = RunTaskProps::new(cluster(), task_definition());
        let mut task = RunTask::new("Run", &stack(), props).unwrap();
        task.connections_mut()
            .allow_from(Peer::Ipv4("10.0.0.0/16".to_string()), 8080, "health checks");

        let groups = task.connections().security_groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].ingress_rules().len(), 1);
        assert_eq!(task.id(), "Run");
    }
}
