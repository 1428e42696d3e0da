//! Access policy derivation
//!
//! The state machine role needs to start and stop the task, pass the task's
//! roles to ECS and, for synchronous runs, manage the managed events rule that
//! reports task state changes back to Step Functions.

use runtask_common::iam::{PolicyResource, PolicyStatement, Role};
use runtask_common::{ArnComponents, Deferred, Stack};

use crate::resources::{Cluster, TaskDefinition};

/// Integration resource ARN for `ecs:runTask`
pub const RUN_TASK_RESOURCE_ARN: &str = "arn:aws:states:::ecs:runTask";

/// Suffix selecting the run-and-wait integration pattern
pub const SYNC_SUFFIX: &str = ".sync";

/// Name of the events rule Step Functions manages for synchronous ECS tasks
pub const ECS_TASK_EVENTS_RULE: &str = "StepFunctionsGetEventsForECSTaskRule";

/// Resources the derived statements refer to
#[derive(Clone, Debug, PartialEq)]
pub struct TaskExecutionContext {
    /// ARN of the task definition being run
    pub task_definition_arn: Deferred<String>,
    /// ARN of the target cluster
    pub cluster_arn: Deferred<String>,
    /// Task role first, then the execution role if there is one
    pub roles: Vec<Role>,
}

impl TaskExecutionContext {
    /// Collect the execution context of `task_definition` running on `cluster`
    pub fn new(task_definition: &TaskDefinition, cluster: &Cluster) -> Self {
        let mut roles = vec![task_definition.task_role().clone()];
        if let Some(execution_role) = task_definition.execution_role() {
            roles.push(execution_role.clone());
        }

        Self {
            task_definition_arn: task_definition.arn().clone(),
            cluster_arn: cluster.arn().clone(),
            roles,
        }
    }

    /// Role ARNs as one deferred list
    pub fn role_arns(&self) -> Deferred<Vec<String>> {
        Deferred::collect(self.roles.iter().map(|role| role.arn().clone()).collect())
    }
}

/// Integration resource ARN for the given execution mode
pub fn resource_arn(synchronous: bool) -> String {
    if synchronous {
        format!("{}{}", RUN_TASK_RESOURCE_ARN, SYNC_SUFFIX)
    } else {
        RUN_TASK_RESOURCE_ARN.to_string()
    }
}

/// Derive the statements the state machine role needs to run the task.
///
/// Three statements for fire-and-forget runs, four when `synchronous`.
pub fn derive_policy_statements(
    ctx: &TaskExecutionContext,
    synchronous: bool,
    stack: &Stack,
) -> Vec<PolicyStatement> {
    let mut stop_and_describe =
        PolicyStatement::allow().with_actions(["ecs:StopTask", "ecs:DescribeTasks"]);
    stop_and_describe.add_all_resources();

    let mut statements = vec![
        PolicyStatement::allow()
            .with_actions(["ecs:RunTask"])
            .with_resource(PolicyResource::Arn(ctx.task_definition_arn.clone())),
        stop_and_describe,
        PolicyStatement::allow()
            .with_actions(["iam:PassRole"])
            .with_resource(PolicyResource::Arns(ctx.role_arns())),
    ];

    if synchronous {
        let rule = ArnComponents::new("events", "rule", ECS_TASK_EVENTS_RULE);
        let rule_arn = stack.format_arn(&rule);
        statements.push(
            PolicyStatement::allow()
                .with_actions(["events:PutTargets", "events:PutRule", "events:DescribeRule"])
                .with_resource(PolicyResource::Arn(Deferred::literal(rule_arn))),
        );
    }

    statements
}
