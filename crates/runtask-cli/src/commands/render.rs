//! Render command

use std::path::{Path, PathBuf};

use clap::Args;
use tracing::info;

use runtask_common::ResolutionContext;

use super::{build_task, StackArgs};
use crate::{Error, Result};

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Task file to render
    #[arg(short = 'f', long = "file")]
    pub file: PathBuf,

    /// YAML map of `LogicalId.Attribute` to concrete values
    #[arg(long)]
    pub values: Option<PathBuf>,

    #[command(flatten)]
    pub stack: StackArgs,
}

pub fn run(args: RenderArgs) -> Result<()> {
    println!("{}", render(&args)?);
    Ok(())
}

/// Build and resolve the task file, returning pretty-printed JSON
pub fn render(args: &RenderArgs) -> Result<String> {
    let task = build_task(&args.file, &args.stack)?;
    let values = match &args.values {
        Some(path) => load_values(path)?,
        None => ResolutionContext::new(),
    };

    let rendered = task.render(&values)?;
    info!(task = task.id(), resource = %rendered.resource, "rendered task state");

    Ok(serde_json::to_string_pretty(&rendered)?)
}

fn load_values(path: &Path) -> Result<ResolutionContext> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| Error::config(format!("failed to read {}: {}", path.display(), e)))?;
    Ok(serde_yaml::from_str(&data)?)
}
