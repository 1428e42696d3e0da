//! ECS RunTask descriptions for Step Functions
//!
//! Turns typed task props into the `Parameters` object of an `ecs:runTask`
//! task state and the IAM statements its state machine role needs:
//!
//! - [`field`]: literal-or-path field projection
//! - [`overrides`]: container override rendering
//! - [`network`]: `awsvpc` network configuration
//! - [`policy`]: access policy derivation
//! - [`launch`]: Fargate and EC2 launch targets
//! - [`task`]: the [`RunTask`] construct tying them together

pub mod field;
pub mod launch;
pub mod network;
pub mod overrides;
pub mod policy;
pub mod resources;
pub mod task;

pub use launch::{BinPackResource, LaunchTarget, PlacementConstraint, PlacementStrategy};
pub use network::{configure_awsvpc, AwsVpcPlacement, NetworkConfiguration};
pub use overrides::{render_overrides, ContainerOverride, TaskEnvironmentVariable, TaskOverrides};
pub use policy::{derive_policy_statements, resource_arn, TaskExecutionContext};
pub use resources::{Cluster, Compatibility, ContainerDefinition, NetworkMode, TaskDefinition};
pub use task::{RenderedTask, RunTask, RunTaskDescription, RunTaskParameters, RunTaskProps};
