//! Launch targets
//!
//! A task runs either on Fargate or on EC2 container instances. The target
//! decides which compatibility the task definition needs, whether `awsvpc`
//! networking is configured and which launch parameters are emitted.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use runtask_common::{Error, Result};

use crate::network::AwsVpcPlacement;
use crate::resources::{NetworkMode, TaskDefinition};

/// Constraint on which container instances a task may be placed on
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PlacementConstraint {
    /// Every task on a different instance
    DistinctInstance,
    /// Only instances matching a cluster query language expression
    MemberOf {
        /// Cluster query language expression (e.g., "attribute:ecs.instance-type =~ t2.*")
        expression: String,
    },
}

impl PlacementConstraint {
    fn render(&self) -> Value {
        match self {
            Self::DistinctInstance => json!({ "Type": "distinctInstance" }),
            Self::MemberOf { expression } => json!({
                "Type": "memberOf",
                "Expression": expression,
            }),
        }
    }
}

/// Instance resource used by the binpack strategy
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BinPackResource {
    /// Pack on CPU units
    Cpu,
    /// Pack on memory
    Memory,
}

impl BinPackResource {
    fn as_str(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Memory => "memory",
        }
    }
}

/// How tasks are spread over eligible container instances
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PlacementStrategy {
    /// Spread evenly over the values of an instance attribute
    Spread {
        /// Attribute to spread over (e.g., "instanceId", "attribute:ecs.availability-zone")
        field: String,
    },
    /// Place on the instance with the least remaining resource
    Binpack {
        /// Resource to pack on
        resource: BinPackResource,
    },
    /// Random placement
    Random,
}

impl PlacementStrategy {
    fn render(&self) -> Value {
        match self {
            Self::Spread { field } => json!({ "Type": "spread", "Field": field }),
            Self::Binpack { resource } => json!({ "Type": "binpack", "Field": resource.as_str() }),
            Self::Random => json!({ "Type": "random" }),
        }
    }
}

/// Where the task runs
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LaunchTarget {
    /// Serverless capacity
    Fargate {
        /// Platform version (default: LATEST, chosen by ECS)
        #[serde(default, rename = "platformVersion", skip_serializing_if = "Option::is_none")]
        platform_version: Option<String>,
    },
    /// EC2 container instances of the cluster
    Ec2 {
        /// Placement constraints, in evaluation order
        #[serde(
            default,
            rename = "placementConstraints",
            skip_serializing_if = "Vec::is_empty"
        )]
        placement_constraints: Vec<PlacementConstraint>,
        /// Placement strategies, in evaluation order
        #[serde(
            default,
            rename = "placementStrategies",
            skip_serializing_if = "Vec::is_empty"
        )]
        placement_strategies: Vec<PlacementStrategy>,
    },
}

impl Default for LaunchTarget {
    fn default() -> Self {
        Self::fargate()
    }
}

impl LaunchTarget {
    /// Fargate with the default platform version
    pub fn fargate() -> Self {
        Self::Fargate {
            platform_version: None,
        }
    }

    /// EC2 without placement constraints or strategies
    pub fn ec2() -> Self {
        Self::Ec2 {
            placement_constraints: Vec::new(),
            placement_strategies: Vec::new(),
        }
    }

    /// Value of the `LaunchType` parameter
    pub fn launch_type(&self) -> &'static str {
        match self {
            Self::Fargate { .. } => "FARGATE",
            Self::Ec2 { .. } => "EC2",
        }
    }

    /// Whether tasks of `task_definition` get `awsvpc` network configuration
    pub fn uses_awsvpc(&self, task_definition: &TaskDefinition) -> bool {
        match self {
            Self::Fargate { .. } => true,
            Self::Ec2 { .. } => task_definition.network_mode() == NetworkMode::AwsVpc,
        }
    }

    /// Check that `task_definition` and `placement` can run on this target
    pub fn validate(
        &self,
        task_definition: &TaskDefinition,
        placement: &AwsVpcPlacement,
    ) -> Result<()> {
        if task_definition.default_container().is_none() {
            return Err(Error::validation_for_field(
                "taskDefinition",
                "A TaskDefinition must have at least one essential container",
            ));
        }

        match self {
            Self::Fargate { .. } => {
                if !task_definition.compatibility().is_fargate_compatible() {
                    return Err(Error::validation_for_field(
                        "taskDefinition",
                        "Supplied TaskDefinition is not configured for compatibility with Fargate",
                    ));
                }
                if task_definition.network_mode() != NetworkMode::AwsVpc {
                    return Err(Error::validation_for_field(
                        "taskDefinition",
                        format!(
                            "Fargate tasks require the awsvpc network mode, got '{}'",
                            task_definition.network_mode()
                        ),
                    ));
                }
            }
            Self::Ec2 { .. } => {
                if !task_definition.compatibility().is_ec2_compatible() {
                    return Err(Error::validation_for_field(
                        "taskDefinition",
                        "Supplied TaskDefinition is not configured for compatibility with EC2",
                    ));
                }
                if placement.assign_public_ip == Some(true) {
                    return Err(Error::validation_for_field(
                        "assignPublicIp",
                        "assignPublicIp is only supported for Fargate tasks",
                    ));
                }
                if !self.uses_awsvpc(task_definition) && placement.has_vpc_settings() {
                    return Err(Error::validation(
                        "vpcPlacement and securityGroup can only be used in AwsVpc networking mode",
                    ));
                }
            }
        }

        Ok(())
    }

    /// Add the launch parameters to `parameters`.
    ///
    /// Empty constraint and strategy lists are omitted.
    pub fn render_into(&self, parameters: &mut Map<String, Value>) {
        parameters.insert("LaunchType".to_string(), json!(self.launch_type()));

        match self {
            Self::Fargate { platform_version } => {
                if let Some(version) = platform_version {
                    parameters.insert("PlatformVersion".to_string(), json!(version));
                }
            }
            Self::Ec2 {
                placement_constraints,
                placement_strategies,
            } => {
                if !placement_constraints.is_empty() {
                    let constraints = placement_constraints
                        .iter()
                        .map(PlacementConstraint::render)
                        .collect();
                    parameters
                        .insert("PlacementConstraints".to_string(), Value::Array(constraints));
                }
                if !placement_strategies.is_empty() {
                    let strategies = placement_strategies
                        .iter()
                        .map(PlacementStrategy::render)
                        .collect();
                    parameters.insert("PlacementStrategy".to_string(), Value::Array(strategies));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{Compatibility, ContainerDefinition};
    use runtask_common::iam::Role;
    use runtask_common::network::{SecurityGroup, SubnetSelection, SubnetType};
    use runtask_common::Deferred;

    fn task_definition(compatibility: Compatibility) -> TaskDefinition {
        TaskDefinition::owned("Td", compatibility, Role::owned("TaskRole"))
            .with_container(ContainerDefinition::essential("web"))
    }

    fn message(err: Error) -> String {
        match err {
            Error::Validation { message, .. } => message,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn fargate_rejects_ec2_only_definition() {
        let err = LaunchTarget::fargate()
            .validate(&task_definition(Compatibility::Ec2), &AwsVpcPlacement::default())
            .unwrap_err();
        assert_eq!(
            message(err),
            "Supplied TaskDefinition is not configured for compatibility with Fargate"
        );
    }

    #[test]
    fn ec2_rejects_fargate_only_definition() {
        let err = LaunchTarget::ec2()
            .validate(&task_definition(Compatibility::Fargate), &AwsVpcPlacement::default())
            .unwrap_err();
        assert_eq!(
            message(err),
            "Supplied TaskDefinition is not configured for compatibility with EC2"
        );
    }

    #[test]
    fn dual_compatibility_runs_anywhere() {
        let td = task_definition(Compatibility::Ec2AndFargate);
        assert!(LaunchTarget::fargate().validate(&td, &AwsVpcPlacement::default()).is_ok());
        assert!(LaunchTarget::ec2().validate(&td, &AwsVpcPlacement::default()).is_ok());
    }

    #[test]
    fn definition_without_essential_container_fails() {
        let td = TaskDefinition::owned("Td", Compatibility::Fargate, Role::owned("TaskRole"))
            .with_container(ContainerDefinition::sidecar("log-router"));
        let err = LaunchTarget::fargate()
            .validate(&td, &AwsVpcPlacement::default())
            .unwrap_err();
        assert_eq!(
            message(err),
            "A TaskDefinition must have at least one essential container"
        );
    }

    #[test]
    fn fargate_rejects_bridge_mode() {
        let td =
            task_definition(Compatibility::Ec2AndFargate).with_network_mode(NetworkMode::Bridge);
        let err = LaunchTarget::fargate()
            .validate(&td, &AwsVpcPlacement::default())
            .unwrap_err();
        assert!(message(err).contains("'bridge'"));
    }

    #[test]
    fn ec2_bridge_mode_rejects_vpc_settings() {
        let td = task_definition(Compatibility::Ec2);
        let with_group = AwsVpcPlacement {
            security_group: Some(SecurityGroup::imported(
                "sg-1",
                Deferred::literal("vpc-1".to_string()),
            )),
            ..Default::default()
        };
        let with_subnets = AwsVpcPlacement {
            subnets: Some(SubnetSelection::Type(SubnetType::Private)),
            ..Default::default()
        };

        for placement in [with_group, with_subnets] {
            let err = LaunchTarget::ec2().validate(&td, &placement).unwrap_err();
            assert_eq!(
                message(err),
                "vpcPlacement and securityGroup can only be used in AwsVpc networking mode"
            );
        }
    }

    #[test]
    fn ec2_awsvpc_mode_accepts_vpc_settings() {
        let td = task_definition(Compatibility::Ec2).with_network_mode(NetworkMode::AwsVpc);
        let placement = AwsVpcPlacement {
            subnets: Some(SubnetSelection::Group("App".to_string())),
            ..Default::default()
        };
        assert!(LaunchTarget::ec2().validate(&td, &placement).is_ok());
        assert!(LaunchTarget::ec2().uses_awsvpc(&td));
    }

    #[test]
    fn ec2_accepts_explicit_private_ip() {
        let td = task_definition(Compatibility::Ec2).with_network_mode(NetworkMode::AwsVpc);
        let placement = AwsVpcPlacement {
            assign_public_ip: Some(false),
            ..Default::default()
        };
        assert!(LaunchTarget::ec2().validate(&td, &placement).is_ok());
    }

    #[test]
    fn ec2_rejects_public_ip() {
        let td = task_definition(Compatibility::Ec2).with_network_mode(NetworkMode::AwsVpc);
        let placement = AwsVpcPlacement {
            assign_public_ip: Some(true),
            ..Default::default()
        };
        let err = LaunchTarget::ec2().validate(&td, &placement).unwrap_err();
        assert_eq!(err.field(), Some("assignPublicIp"));
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    #[test]
    fn fargate_renders_launch_type_and_platform() {
        let mut params = Map::new();
        LaunchTarget::Fargate {
            platform_version: Some("1.4.0".to_string()),
        }
        .render_into(&mut params);

        assert_eq!(
            Value::Object(params),
            json!({ "LaunchType": "FARGATE", "PlatformVersion": "1.4.0" })
        );
    }

    #[test]
    fn ec2_omits_empty_placement_lists() {
        let mut params = Map::new();
        LaunchTarget::ec2().render_into(&mut params);
        assert_eq!(Value::Object(params), json!({ "LaunchType": "EC2" }));
    }

    #[test]
    fn ec2_renders_constraints_and_strategies() {
        let target = LaunchTarget::Ec2 {
            placement_constraints: vec![
                PlacementConstraint::DistinctInstance,
                PlacementConstraint::MemberOf {
                    expression: "attribute:ecs.instance-type =~ t3.*".to_string(),
                },
            ],
            placement_strategies: vec![
                PlacementStrategy::Spread {
                    field: "instanceId".to_string(),
                },
                PlacementStrategy::Binpack {
                    resource: BinPackResource::Memory,
                },
                PlacementStrategy::Random,
            ],
        };
        let mut params = Map::new();
        target.render_into(&mut params);

        assert_eq!(
            params["PlacementConstraints"],
            json!([
                { "Type": "distinctInstance" },
                { "Type": "memberOf", "Expression": "attribute:ecs.instance-type =~ t3.*" },
            ])
        );
        assert_eq!(
            params["PlacementStrategy"],
            json!([
                { "Type": "spread", "Field": "instanceId" },
                { "Type": "binpack", "Field": "memory" },
                { "Type": "random" },
            ])
        );
    }

    #[test]
    fn launch_target_parses_from_yaml() {
        let yaml = r#"
type: ec2
placementConstraints:
  - type: memberOf
    expression: "attribute:ecs.os-type == linux"
placementStrategies:
  - type: binpack
    resource: cpu
"#;
        let target: LaunchTarget = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(target.launch_type(), "EC2");

        let fargate: LaunchTarget = serde_yaml::from_str("type: fargate").unwrap();
        assert_eq!(fargate, LaunchTarget::fargate());
    }
}
