//! Schema command

use schemars::schema_for;

use crate::config::TaskFile;
use crate::Result;

pub fn run() -> Result<()> {
    println!("{}", task_file_schema()?);
    Ok(())
}

/// JSON schema of [`TaskFile`], pretty-printed
pub fn task_file_schema() -> Result<String> {
    Ok(serde_json::to_string_pretty(&schema_for!(TaskFile))?)
}
