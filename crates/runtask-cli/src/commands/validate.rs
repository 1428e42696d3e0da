//! Validate command

use std::fmt::Write;
use std::path::PathBuf;

use clap::Args;

use runtask_common::iam::PolicyResource;
use runtask_ecs::RunTask;

use super::{build_task, StackArgs};
use crate::Result;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Task file to validate
    #[arg(short = 'f', long = "file")]
    pub file: PathBuf,

    #[command(flatten)]
    pub stack: StackArgs,
}

pub fn run(args: ValidateArgs) -> Result<()> {
    let task = build_task(&args.file, &args.stack)?;
    print!("{}", summary(&task));
    println!("{} valid", args.file.display());
    Ok(())
}

/// Human-readable summary of an unresolved task
pub fn summary(task: &RunTask) -> String {
    let description = task.description();
    let parameters = &description.parameters;
    let mut out = String::new();

    let _ = writeln!(out, "task:       {}", task.id());
    let _ = writeln!(out, "resource:   {}", description.resource_arn);
    let _ = writeln!(out, "launch:     {}", parameters.launch_target.launch_type());
    let _ = writeln!(
        out,
        "network:    {}",
        if parameters.network_configuration.is_some() { "awsvpc" } else { "none" }
    );
    let _ = writeln!(
        out,
        "overrides:  {}",
        parameters
            .overrides
            .as_ref()
            .map_or(0, |o| o.container_overrides.len())
    );
    let _ = writeln!(out, "statements:");
    for statement in &description.policy_statements {
        let resources = statement
            .resources()
            .iter()
            .map(describe_resource)
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(out, "  - {} on {}", statement.actions().join(", "), resources);
    }
    if !parameters.extensions.is_empty() {
        let keys = parameters.extensions.keys().cloned().collect::<Vec<_>>();
        let _ = writeln!(out, "extra:      {}", keys.join(", "));
    }

    out
}

fn describe_resource(resource: &PolicyResource) -> String {
    match resource {
        PolicyResource::Any => "*".to_string(),
        PolicyResource::Arn(arn) => match arn.as_literal() {
            Some(arn) => arn.clone(),
            None => arn.label().unwrap_or_default().to_string(),
        },
        PolicyResource::Arns(arns) => match arns.as_literal() {
            Some(arns) => arns.join(", "),
            None => arns.label().unwrap_or_default().to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runtask_common::iam::Role;
    use runtask_common::network::{Subnet, SubnetType, Vpc};
    use runtask_common::{Deferred, Stack};
    use runtask_ecs::{Cluster, Compatibility, ContainerDefinition, RunTaskProps, TaskDefinition};

    #[test]
    fn summary_lists_statements_with_labels() {
        let cluster = Cluster::owned("Cluster").with_vpc(Vpc::new(
            Deferred::literal("vpc-1".to_string()),
            vec![Subnet::imported("subnet-1", SubnetType::Private, "App")],
        ));
        let td = TaskDefinition::owned("Td", Compatibility::Fargate, Role::owned("TaskRole"))
            .with_container(ContainerDefinition::essential("app"));
        let task = RunTask::new(
            "Run",
            &Stack::new("1", "us-east-1"),
            RunTaskProps::new(cluster, td).with_synchronous(true),
        )
        .unwrap();

        let text = summary(&task);
        assert!(text.contains("resource:   arn:aws:states:::ecs:runTask.sync"));
        assert!(text.contains("network:    awsvpc"));
        assert!(text.contains("  - ecs:RunTask on ${Td.TaskDefinitionArn}"));
        assert!(text.contains("  - iam:PassRole on [${TaskRole.Arn}]"));
        assert!(text.contains("rule/StepFunctionsGetEventsForECSTaskRule"));
    }
}
