//! CLI commands

use std::path::Path;

use clap::Args;
use tracing::debug;

use runtask_common::Stack;
use runtask_ecs::RunTask;

use crate::config::TaskFile;
use crate::{Error, Result};

pub mod render;
pub mod schema;
pub mod validate;

/// Account, region and partition flags.
///
/// Flags (or their environment variables) take precedence over the task
/// file's `stack` section.
#[derive(Args, Debug, Clone, Default)]
pub struct StackArgs {
    /// AWS account id
    #[arg(long, env = "RUNTASK_ACCOUNT")]
    pub account: Option<String>,

    /// AWS region
    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,

    /// AWS partition
    #[arg(long, env = "RUNTASK_PARTITION")]
    pub partition: Option<String>,
}

impl StackArgs {
    /// Merge the flags over the task file's stack
    pub fn resolve(&self, from_file: Option<Stack>) -> Result<Stack> {
        let account = self
            .account
            .clone()
            .or_else(|| from_file.as_ref().map(|s| s.account.clone()))
            .ok_or_else(|| Error::config("no account: pass --account or set stack.account"))?;
        let region = self
            .region
            .clone()
            .or_else(|| from_file.as_ref().map(|s| s.region.clone()))
            .ok_or_else(|| Error::config("no region: pass --region or set stack.region"))?;

        let mut stack = Stack::new(account, region);
        if let Some(partition) = self
            .partition
            .clone()
            .or_else(|| from_file.map(|s| s.partition))
        {
            stack = stack.with_partition(partition);
        }
        Ok(stack)
    }
}

/// Load `path` and build its RunTask
pub fn build_task(path: &Path, stack_args: &StackArgs) -> Result<RunTask> {
    let file = TaskFile::load(path)?;
    let stack = stack_args.resolve(file.stack.clone())?;
    let id = file.id.clone();

    debug!(file = %path.display(), task = %id, region = %stack.region, "building task");

    let props = file.into_props()?;
    Ok(RunTask::new(id, &stack, props)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_win_over_file_stack() {
        let args = StackArgs {
            region: Some("eu-west-1".to_string()),
            ..Default::default()
        };
        let stack = args
            .resolve(Some(Stack::new("111111111111", "us-east-1").with_partition("aws-us-gov")))
            .unwrap();
        assert_eq!(stack.account, "111111111111");
        assert_eq!(stack.region, "eu-west-1");
        assert_eq!(stack.partition, "aws-us-gov");
    }

    #[test]
    fn missing_account_is_reported() {
        let args = StackArgs {
            region: Some("eu-west-1".to_string()),
            ..Default::default()
        };
        let err = args.resolve(None).unwrap_err();
        assert!(err.to_string().contains("--account"));
    }

    #[test]
    fn partition_defaults_to_aws() {
        let args = StackArgs {
            account: Some("1".to_string()),
            region: Some("us-west-2".to_string()),
            partition: None,
        };
        assert_eq!(args.resolve(None).unwrap().partition, "aws");
    }
}
