//! VPC, subnet selection and security groups
//!
//! Only the parts of the network model needed to place a task: a VPC that can
//! resolve a [`SubnetSelection`] into subnets, security groups whose ids are
//! deferred, and a [`Connections`] tracker that owns the groups attached to a
//! construct so callers can open ports after the fact.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::deferred::{Deferred, Token};
use crate::{Error, Result};

/// Kind of subnet
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SubnetType {
    /// Routes to an internet gateway
    Public,
    /// Routes out through a NAT gateway
    Private,
    /// No route out of the VPC
    Isolated,
}

impl fmt::Display for SubnetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => write!(f, "Public"),
            Self::Private => write!(f, "Private"),
            Self::Isolated => write!(f, "Isolated"),
        }
    }
}

/// Which subnets of a VPC to place into
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubnetSelection {
    /// Every subnet of the given type
    Type(SubnetType),
    /// Every subnet in the named subnet group
    Group(String),
}

impl SubnetSelection {
    /// Default selection for a task: public subnets when it gets a public IP,
    /// private subnets otherwise
    pub fn for_public_ip(assign_public_ip: bool) -> Self {
        if assign_public_ip {
            Self::Type(SubnetType::Public)
        } else {
            Self::Type(SubnetType::Private)
        }
    }
}

/// A subnet of a VPC
#[derive(Clone, Debug, PartialEq)]
pub struct Subnet {
    /// Subnet id (deferred when the subnet is created in the same document)
    pub subnet_id: Deferred<String>,
    /// Subnet kind
    pub subnet_type: SubnetType,
    /// Subnet group name
    pub group_name: String,
}

impl Subnet {
    /// Reference an existing subnet
    pub fn imported(
        subnet_id: impl Into<String>,
        subnet_type: SubnetType,
        group_name: impl Into<String>,
    ) -> Self {
        Self {
            subnet_id: Deferred::literal(subnet_id.into()),
            subnet_type,
            group_name: group_name.into(),
        }
    }

    /// Reference a subnet created in the same document
    pub fn owned(
        logical_id: impl Into<String>,
        subnet_type: SubnetType,
        group_name: impl Into<String>,
    ) -> Self {
        Self {
            subnet_id: Deferred::reference(Token::new(logical_id, "SubnetId")),
            subnet_type,
            group_name: group_name.into(),
        }
    }
}

/// Resolves subnet selections against a network
pub trait SubnetResolver {
    /// Id of the VPC the subnets belong to
    fn vpc_id(&self) -> Deferred<String>;

    /// Subnets matching `selection`, in VPC order
    fn select_subnets(&self, selection: &SubnetSelection) -> Result<Vec<Subnet>>;
}

/// A VPC with a known subnet layout
#[derive(Clone, Debug, PartialEq)]
pub struct Vpc {
    vpc_id: Deferred<String>,
    subnets: Vec<Subnet>,
}

impl Vpc {
    /// Create a VPC from its id and subnets
    pub fn new(vpc_id: Deferred<String>, subnets: Vec<Subnet>) -> Self {
        Self { vpc_id, subnets }
    }

    /// All subnets of the VPC
    pub fn subnets(&self) -> &[Subnet] {
        &self.subnets
    }
}

impl SubnetResolver for Vpc {
    fn vpc_id(&self) -> Deferred<String> {
        self.vpc_id.clone()
    }

    fn select_subnets(&self, selection: &SubnetSelection) -> Result<Vec<Subnet>> {
        let selected: Vec<Subnet> = self
            .subnets
            .iter()
            .filter(|subnet| match selection {
                SubnetSelection::Type(kind) => subnet.subnet_type == *kind,
                SubnetSelection::Group(name) => subnet.group_name == *name,
            })
            .cloned()
            .collect();

        if selected.is_empty() {
            return Err(match selection {
                SubnetSelection::Type(kind) => {
                    Error::subnet(format!("there are no '{}' subnets in this VPC", kind))
                }
                SubnetSelection::Group(name) => {
                    Error::subnet(format!("there is no subnet group named '{}' in this VPC", name))
                }
            });
        }

        debug!(?selection, subnets = selected.len(), "selected subnets");
        Ok(selected)
    }
}

/// Source of inbound traffic
#[derive(Clone, Debug, PartialEq)]
pub enum Peer {
    /// An IPv4 CIDR block
    Ipv4(String),
    /// Members of another security group
    SecurityGroup(Deferred<String>),
}

/// Inbound TCP rule of a security group
#[derive(Clone, Debug, PartialEq)]
pub struct IngressRule {
    /// Traffic source
    pub peer: Peer,
    /// Allowed TCP port
    pub port: u16,
    /// Free-form description
    pub description: String,
}

/// A security group, either created by a construct or imported
#[derive(Clone, Debug, PartialEq)]
pub struct SecurityGroup {
    group_id: Deferred<String>,
    vpc_id: Deferred<String>,
    allow_all_outbound: bool,
    ingress_rules: Vec<IngressRule>,
}

impl SecurityGroup {
    /// Create a new group in `vpc_id` with all outbound traffic allowed and no
    /// ingress rules. Its id is a `GroupId` token on `logical_id`.
    pub fn create(logical_id: impl Into<String>, vpc_id: Deferred<String>) -> Self {
        Self {
            group_id: Deferred::reference(Token::new(logical_id, "GroupId")),
            vpc_id,
            allow_all_outbound: true,
            ingress_rules: Vec::new(),
        }
    }

    /// Reference an existing group by id
    pub fn imported(group_id: impl Into<String>, vpc_id: Deferred<String>) -> Self {
        Self {
            group_id: Deferred::literal(group_id.into()),
            vpc_id,
            allow_all_outbound: true,
            ingress_rules: Vec::new(),
        }
    }

    /// The group id
    pub fn group_id(&self) -> &Deferred<String> {
        &self.group_id
    }

    /// The VPC the group belongs to
    pub fn vpc_id(&self) -> &Deferred<String> {
        &self.vpc_id
    }

    /// Whether all outbound traffic is allowed
    pub fn allow_all_outbound(&self) -> bool {
        self.allow_all_outbound
    }

    /// Inbound rules added so far
    pub fn ingress_rules(&self) -> &[IngressRule] {
        &self.ingress_rules
    }

    /// Add an inbound rule
    pub fn add_ingress_rule(&mut self, peer: Peer, port: u16, description: impl Into<String>) {
        self.ingress_rules.push(IngressRule {
            peer,
            port,
            description: description.into(),
        });
    }
}

/// Security groups attached to a construct
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Connections {
    security_groups: Vec<SecurityGroup>,
}

impl Connections {
    /// Empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a security group
    pub fn add_security_group(&mut self, group: SecurityGroup) {
        self.security_groups.push(group);
    }

    /// Attached groups
    pub fn security_groups(&self) -> &[SecurityGroup] {
        &self.security_groups
    }

    /// Allow inbound TCP traffic from `peer` on `port` to every attached group
    pub fn allow_from(&mut self, peer: Peer, port: u16, description: &str) {
        for group in &mut self.security_groups {
            group.add_ingress_rule(peer.clone(), port, description);
        }
    }
}
