//! `awsvpc` network configuration
//!
//! Resolves placement defaults (subnets from the public IP flag, a fresh
//! security group when none is given), registers the group with the
//! construct's [`Connections`] and renders the `NetworkConfiguration` block.

use serde_json::{json, Value};
use tracing::debug;

use runtask_common::network::{Connections, SecurityGroup, SubnetResolver, SubnetSelection};
use runtask_common::{Deferred, Resolve, Result};

/// Placement settings for `awsvpc` tasks
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AwsVpcPlacement {
    /// Give the task's network interface a public IP (default: false)
    pub assign_public_ip: Option<bool>,
    /// Subnets to place into (default: derived from `assign_public_ip`)
    pub subnets: Option<SubnetSelection>,
    /// Security group to attach (default: a new, empty group)
    pub security_group: Option<SecurityGroup>,
}

impl AwsVpcPlacement {
    /// Whether any VPC-only setting was supplied
    pub fn has_vpc_settings(&self) -> bool {
        self.subnets.is_some() || self.security_group.is_some()
    }
}

/// Resolved `awsvpc` network configuration
#[derive(Clone, Debug, PartialEq)]
pub struct NetworkConfiguration {
    /// Whether the interface gets a public IP
    pub assign_public_ip: bool,
    /// Subnet ids, in VPC order
    pub subnets: Vec<Deferred<String>>,
    /// Single-element list holding the security group id
    pub security_groups: Deferred<Vec<String>>,
}

impl NetworkConfiguration {
    /// Render the `NetworkConfiguration` parameter value
    pub fn render(&self, resolver: &dyn Resolve) -> Result<Value> {
        let subnets = self
            .subnets
            .iter()
            .map(|subnet| subnet.resolve(resolver))
            .collect::<Result<Vec<_>>>()?;

        Ok(json!({
            "AwsvpcConfiguration": {
                "AssignPublicIp": if self.assign_public_ip { "ENABLED" } else { "DISABLED" },
                "Subnets": subnets,
                "SecurityGroups": self.security_groups.resolve(resolver)?,
            }
        }))
    }
}

/// Build the network configuration for a task placed in `vpc`.
///
/// The security group (given or created as `<scope_id>SecurityGroup`) is
/// added to `connections` once the subnets have been selected, so a failed
/// selection leaves `connections` untouched. Subnet selection errors are
/// returned unchanged.
pub fn configure_awsvpc(
    scope_id: &str,
    vpc: &dyn SubnetResolver,
    placement: AwsVpcPlacement,
    connections: &mut Connections,
) -> Result<NetworkConfiguration> {
    let assign_public_ip = placement.assign_public_ip.unwrap_or(false);
    let selection = placement
        .subnets
        .unwrap_or_else(|| SubnetSelection::for_public_ip(assign_public_ip));

    let subnets = vpc
        .select_subnets(&selection)?
        .into_iter()
        .map(|subnet| subnet.subnet_id)
        .collect::<Vec<_>>();

    let security_group = placement.security_group.unwrap_or_else(|| {
        SecurityGroup::create(format!("{}SecurityGroup", scope_id), vpc.vpc_id())
    });
    let security_groups = security_group.group_id().clone().map(|id| vec![id]);
    connections.add_security_group(security_group);

    debug!(
        scope = scope_id,
        assign_public_ip,
        subnets = subnets.len(),
        ?selection,
        "configured awsvpc networking"
    );

    Ok(NetworkConfiguration {
        assign_public_ip,
        subnets,
        security_groups,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use runtask_common::network::{Subnet, SubnetType, Vpc};
    use runtask_common::{Error, ResolutionContext};

    fn vpc() -> Vpc {
        Vpc::new(
            Deferred::literal("vpc-1".to_string()),
            vec![
                Subnet::imported("subnet-pub-a", SubnetType::Public, "Ingress"),
                Subnet::imported("subnet-pub-b", SubnetType::Public, "Ingress"),
                Subnet::owned("AppSubnetA", SubnetType::Private, "App"),
            ],
        )
    }

    fn resolver() -> ResolutionContext {
        ResolutionContext::new()
            .with("AppSubnetA.SubnetId", "subnet-app-a")
            .with("RunSecurityGroup.GroupId", "sg-created")
    }

    #[test]
    fn defaults_to_private_subnets_and_new_group() {
        let mut connections = Connections::new();
        let config =
            configure_awsvpc("Run", &vpc(), AwsVpcPlacement::default(), &mut connections).unwrap();

        assert!(!config.assign_public_ip);
        assert_eq!(
            config.render(&resolver()).unwrap(),
            json!({
                "AwsvpcConfiguration": {
                    "AssignPublicIp": "DISABLED",
                    "Subnets": ["subnet-app-a"],
                    "SecurityGroups": ["sg-created"],
                }
            })
        );
        assert_eq!(connections.security_groups().len(), 1);
    }

    #[test]
    fn public_ip_selects_public_subnets() {
        let mut connections = Connections::new();
        let placement = AwsVpcPlacement {
            assign_public_ip: Some(true),
            ..Default::default()
        };
        let config = configure_awsvpc("Run", &vpc(), placement, &mut connections).unwrap();

        let rendered = config.render(&resolver()).unwrap();
        assert_eq!(rendered["AwsvpcConfiguration"]["AssignPublicIp"], "ENABLED");
        assert_eq!(
            rendered["AwsvpcConfiguration"]["Subnets"],
            json!(["subnet-pub-a", "subnet-pub-b"])
        );
    }

    #[test]
    fn explicit_selection_wins_over_public_ip_default() {
        let mut connections = Connections::new();
        let placement = AwsVpcPlacement {
            assign_public_ip: Some(true),
            subnets: Some(SubnetSelection::Group("App".to_string())),
            ..Default::default()
        };
        let config = configure_awsvpc("Run", &vpc(), placement, &mut connections).unwrap();
        assert_eq!(config.subnets.len(), 1);
        assert!(config.assign_public_ip);
    }

    #[test]
    fn supplied_group_is_registered_not_created() {
        let mut connections = Connections::new();
        let group = SecurityGroup::imported("sg-existing", Deferred::literal("vpc-1".to_string()));
        let placement = AwsVpcPlacement {
            security_group: Some(group.clone()),
            ..Default::default()
        };
        let config = configure_awsvpc("Run", &vpc(), placement, &mut connections).unwrap();

        assert_eq!(connections.security_groups(), [group]);
        assert_eq!(
            config.security_groups,
            Deferred::Literal(vec!["sg-existing".to_string()])
        );
    }

    #[test]
    fn security_group_list_stays_deferred() {
        let mut connections = Connections::new();
        let config =
            configure_awsvpc("Run", &vpc(), AwsVpcPlacement::default(), &mut connections).unwrap();
        assert!(!config.security_groups.is_resolved());
        assert_eq!(
            config.security_groups.label(),
            Some("${RunSecurityGroup.GroupId}")
        );
    }

    #[test]
    fn missing_subnets_propagate_and_register_nothing() {
        let mut connections = Connections::new();
        let placement = AwsVpcPlacement {
            subnets: Some(SubnetSelection::Type(SubnetType::Isolated)),
            ..Default::default()
        };
        let err = configure_awsvpc("Run", &vpc(), placement, &mut connections).unwrap_err();

        assert_eq!(err, Error::subnet("there are no 'Isolated' subnets in this VPC"));
        assert!(connections.security_groups().is_empty());
    }

    #[test]
    fn unresolved_group_fails_render() {
        let mut connections = Connections::new();
        let config =
            configure_awsvpc("Other", &vpc(), AwsVpcPlacement::default(), &mut connections)
                .unwrap();
        let err = config.render(&resolver()).unwrap_err();
        assert!(matches!(err, Error::Unresolved { .. }));
    }
}
