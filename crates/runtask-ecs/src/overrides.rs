//! Container override rendering
//!
//! Projects the user-facing override model (`containerName` or
//! `containerNamePath`, `cpu` or `cpuPath`, ...) into the `Overrides` block of
//! the RunTask parameters:
//!
//! ```json
//! { "ContainerOverrides": [ { "Name": "web", "Cpu": 256 } ] }
//! ```
//!
//! Unit order and environment variable order are preserved. The first invalid
//! field aborts the whole render.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use runtask_common::Result;

use crate::field::{project, Projection, ReferencePath, Requiredness};

/// Per-container override supplied by the caller
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ContainerOverride {
    /// Name of the container to override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    /// Reference path selecting the container name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name_path: Option<String>,

    /// Command replacing the container's default command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    /// Reference path selecting the command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_path: Option<String>,

    /// CPU units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<u32>,
    /// Reference path selecting the CPU units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_path: Option<String>,

    /// Hard memory limit in MiB
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<u32>,
    /// Reference path selecting the hard memory limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limit_path: Option<String>,

    /// Soft memory limit in MiB
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_reservation: Option<u32>,
    /// Reference path selecting the soft memory limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_reservation_path: Option<String>,

    /// Environment variables added to the container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Vec<TaskEnvironmentVariable>>,
}

impl ContainerOverride {
    /// Override for the container with the given literal name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            container_name: Some(name.into()),
            ..Default::default()
        }
    }
}

/// Environment variable override
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TaskEnvironmentVariable {
    /// Variable name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Reference path selecting the variable name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_path: Option<String>,
    /// Variable value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Reference path selecting the variable value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_path: Option<String>,
}

impl TaskEnvironmentVariable {
    /// Literal name/value pair
    pub fn literal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            value: Some(value.into()),
            ..Default::default()
        }
    }
}

/// `Overrides` block of the RunTask parameters
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct TaskOverrides {
    /// Rendered units, in input order
    #[serde(rename = "ContainerOverrides")]
    pub container_overrides: Vec<RenderedContainerOverride>,
}

/// One rendered container override
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct RenderedContainerOverride {
    #[serde(rename = "Name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "Name.$", skip_serializing_if = "Option::is_none")]
    pub name_path: Option<ReferencePath>,

    #[serde(rename = "Command", skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    #[serde(rename = "Command.$", skip_serializing_if = "Option::is_none")]
    pub command_path: Option<ReferencePath>,

    #[serde(rename = "Cpu", skip_serializing_if = "Option::is_none")]
    pub cpu: Option<u32>,
    #[serde(rename = "Cpu.$", skip_serializing_if = "Option::is_none")]
    pub cpu_path: Option<ReferencePath>,

    #[serde(rename = "Memory", skip_serializing_if = "Option::is_none")]
    pub memory: Option<u32>,
    #[serde(rename = "Memory.$", skip_serializing_if = "Option::is_none")]
    pub memory_path: Option<ReferencePath>,

    #[serde(rename = "MemoryReservation", skip_serializing_if = "Option::is_none")]
    pub memory_reservation: Option<u32>,
    #[serde(rename = "MemoryReservation.$", skip_serializing_if = "Option::is_none")]
    pub memory_reservation_path: Option<ReferencePath>,

    #[serde(rename = "Environment", skip_serializing_if = "Option::is_none")]
    pub environment: Option<Vec<RenderedEnvironmentVariable>>,
}

/// One rendered environment variable
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct RenderedEnvironmentVariable {
    #[serde(rename = "Name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "Name.$", skip_serializing_if = "Option::is_none")]
    pub name_path: Option<ReferencePath>,
    #[serde(rename = "Value", skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(rename = "Value.$", skip_serializing_if = "Option::is_none")]
    pub value_path: Option<ReferencePath>,
}

/// Render container overrides.
///
/// Returns `None` for both a missing and an empty list so no `Overrides` key
/// is emitted unless at least one unit was requested.
pub fn render_overrides(overrides: Option<&[ContainerOverride]>) -> Result<Option<TaskOverrides>> {
    let overrides = match overrides {
        Some(list) if !list.is_empty() => list,
        _ => return Ok(None),
    };

    let container_overrides = overrides
        .iter()
        .enumerate()
        .map(|(index, unit)| {
            render_unit(unit)
                .map_err(|e| e.within(format!("containerOverrides[{}]", index)))
        })
        .collect::<Result<Vec<_>>>()?;

    debug!(units = container_overrides.len(), "rendered container overrides");

    Ok(Some(TaskOverrides {
        container_overrides,
    }))
}

fn render_unit(unit: &ContainerOverride) -> Result<RenderedContainerOverride> {
    let name = project(
        "containerName",
        unit.container_name.as_ref(),
        unit.container_name_path.as_deref(),
        Requiredness::Required,
    )?;
    let command = project(
        "command",
        unit.command.as_ref(),
        unit.command_path.as_deref(),
        Requiredness::Optional,
    )?;
    let cpu = project(
        "cpu",
        unit.cpu.as_ref(),
        unit.cpu_path.as_deref(),
        Requiredness::Optional,
    )?;
    let memory = project(
        "memoryLimit",
        unit.memory_limit.as_ref(),
        unit.memory_limit_path.as_deref(),
        Requiredness::Optional,
    )?;
    let memory_reservation = project(
        "memoryReservation",
        unit.memory_reservation.as_ref(),
        unit.memory_reservation_path.as_deref(),
        Requiredness::Optional,
    )?;

    let environment = unit
        .environment
        .as_ref()
        .map(|vars| {
            vars.iter()
                .enumerate()
                .map(|(index, var)| {
                    render_variable(var).map_err(|e| e.within(format!("environment[{}]", index)))
                })
                .collect::<Result<Vec<_>>>()
        })
        .transpose()?;

    let (name, name_path) = split(name);
    let (command, command_path) = split(command);
    let (cpu, cpu_path) = split(cpu);
    let (memory, memory_path) = split(memory);
    let (memory_reservation, memory_reservation_path) = split(memory_reservation);

    Ok(RenderedContainerOverride {
        name,
        name_path,
        command,
        command_path,
        cpu,
        cpu_path,
        memory,
        memory_path,
        memory_reservation,
        memory_reservation_path,
        environment,
    })
}

fn render_variable(var: &TaskEnvironmentVariable) -> Result<RenderedEnvironmentVariable> {
    let (name, name_path) = split(project(
        "name",
        var.name.as_ref(),
        var.name_path.as_deref(),
        Requiredness::Required,
    )?);
    let (value, value_path) = split(project(
        "value",
        var.value.as_ref(),
        var.value_path.as_deref(),
        Requiredness::Required,
    )?);

    Ok(RenderedEnvironmentVariable {
        name,
        name_path,
        value,
        value_path,
    })
}

fn split<T>(projection: Projection<T>) -> (Option<T>, Option<ReferencePath>) {
    (projection.value, projection.path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use runtask_common::Error;
    use serde_json::json;

    fn render(units: &[ContainerOverride]) -> Result<Option<TaskOverrides>> {
        render_overrides(Some(units))
    }

    fn rendered_json(overrides: &[ContainerOverride]) -> serde_json::Value {
        let rendered = render(overrides)
            .expect("overrides should render")
            .expect("overrides should be present");
        serde_json::to_value(rendered).expect("overrides should serialize")
    }

    #[test]
    fn absent_overrides_render_nothing() {
        assert_eq!(render_overrides(None).unwrap(), None);
    }

    #[test]
    fn empty_overrides_render_nothing() {
        assert_eq!(render(&[]).unwrap(), None);
    }

    #[test]
    fn literal_name_and_cpu() {
        let unit = ContainerOverride {
            cpu: Some(256),
            ..ContainerOverride::named("web")
        };

        assert_eq!(
            rendered_json(&[unit]),
            json!({"ContainerOverrides": [{"Name": "web", "Cpu": 256}]})
        );
    }

    #[test]
    fn paths_render_with_dollar_suffix() {
        let unit = ContainerOverride {
            container_name_path: Some("$.name".to_string()),
            command_path: Some("$.cmd".to_string()),
            memory_limit_path: Some("$.mem".to_string()),
            memory_reservation: Some(128),
            ..Default::default()
        };

        assert_eq!(
            rendered_json(&[unit]),
            json!({"ContainerOverrides": [{
                "Name.$": "$.name",
                "Command.$": "$.cmd",
                "Memory.$": "$.mem",
                "MemoryReservation": 128,
            }]})
        );
    }

    #[test]
    fn environment_preserves_order_and_mixes_forms() {
        let unit = ContainerOverride {
            environment: Some(vec![
                TaskEnvironmentVariable::literal("B", "2"),
                TaskEnvironmentVariable {
                    name: Some("A".to_string()),
                    value_path: Some("$.a".to_string()),
                    ..Default::default()
                },
            ]),
            ..ContainerOverride::named("web")
        };

        assert_eq!(
            rendered_json(&[unit])["ContainerOverrides"][0]["Environment"],
            json!([
                {"Name": "B", "Value": "2"},
                {"Name": "A", "Value.$": "$.a"},
            ])
        );
    }

    #[test]
    fn missing_environment_omits_key() {
        let json = rendered_json(&[ContainerOverride::named("web")]);
        assert!(json["ContainerOverrides"][0].get("Environment").is_none());
    }

    #[test]
    fn empty_environment_is_kept() {
        let unit = ContainerOverride {
            environment: Some(vec![]),
            ..ContainerOverride::named("web")
        };
        assert_eq!(
            rendered_json(&[unit])["ContainerOverrides"][0]["Environment"],
            json!([])
        );
    }

    #[test]
    fn unit_order_is_preserved() {
        let units: Vec<_> = ["c", "a", "b"]
            .into_iter()
            .map(ContainerOverride::named)
            .collect();
        let names: Vec<_> = rendered_json(&units)["ContainerOverrides"]
            .as_array()
            .unwrap()
            .iter()
            .map(|u| u["Name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn duplicate_units_are_kept() {
        let units = vec![ContainerOverride::named("web"), ContainerOverride::named("web")];
        let rendered = render(&units).unwrap().unwrap();
        assert_eq!(rendered.container_overrides.len(), 2);
    }

    #[test]
    fn both_command_forms_fail() {
        let unit = ContainerOverride {
            container_name_path: Some("$.name".to_string()),
            command: Some(vec!["a".to_string()]),
            command_path: Some("$.cmd".to_string()),
            ..Default::default()
        };

        let err = render(&[unit]).unwrap_err();
        assert_eq!(
            err,
            Error::validation_for_field(
                "containerOverrides[0]",
                "only one of 'command' or 'commandPath' allowed"
            )
        );
    }

    #[test]
    fn missing_name_fails() {
        let unit = ContainerOverride {
            cpu: Some(512),
            ..Default::default()
        };
        let err = render(&[unit]).unwrap_err();
        assert!(err
            .to_string()
            .contains("exactly one of 'containerName' or 'containerNamePath' required"));
    }

    #[test]
    fn error_in_later_unit_aborts_and_names_index() {
        let units = vec![
            ContainerOverride::named("ok"),
            ContainerOverride {
                cpu_path: Some("cpu".to_string()),
                ..ContainerOverride::named("bad")
            },
        ];
        let err = render(&units).unwrap_err();
        assert_eq!(err.field(), Some("containerOverrides[1]"));
        assert!(err.to_string().contains("path must start with '$.'"));
    }

    #[test]
    fn invalid_environment_variable_names_its_index() {
        let unit = ContainerOverride {
            environment: Some(vec![
                TaskEnvironmentVariable::literal("A", "1"),
                TaskEnvironmentVariable {
                    name: Some("B".to_string()),
                    ..Default::default()
                },
            ]),
            ..ContainerOverride::named("web")
        };
        let err = render(&[unit]).unwrap_err();
        assert_eq!(err.field(), Some("containerOverrides[0].environment[1]"));
        assert!(err
            .to_string()
            .contains("exactly one of 'value' or 'valuePath' required"));
    }

    #[test]
    fn deserializes_camel_case_input() {
        let yaml = r#"
containerName: web
command: ["run", "--fast"]
memoryLimitPath: $.memory
environment:
  - name: MODE
    valuePath: $.mode
"#;
        let parsed: ContainerOverride = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(parsed.container_name.as_deref(), Some("web"));
        assert_eq!(parsed.memory_limit_path.as_deref(), Some("$.memory"));
        assert_eq!(parsed.environment.map(|e| e.len()), Some(1));
    }

    #[test]
    fn unknown_input_fields_are_rejected() {
        let yaml = "containerName: web\ncpus: 2\n";
        assert!(serde_yaml::from_str::<ContainerOverride>(yaml).is_err());
    }
}
