use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::resolver::{tokenize, Segment};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Command {
    pub id: Uuid,                 // Assigned once by the registry
    pub name: String,             // Display name, unique per registry
    pub command: String,          // Executable path or name
    pub args: Vec<String>,        // May contain {placeholders}
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    #[serde(default)]
    pub environment_variables: Vec<EnvironmentVariable>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub use_count: u32,
    #[serde(default)]
    pub parameters: Vec<CommandParameter>,
    #[serde(default)]
    pub mise_enabled: bool,       // Launch through the version-manager shim
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnvironmentVariable {
    pub key: String,
    pub value: String,
}

impl EnvironmentVariable {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into() }
    }

    /// A pair only counts when both sides are filled in.
    pub fn is_set(&self) -> bool {
        !self.key.is_empty() && !self.value.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandParameter {
    pub name: String,
    pub placeholder: String,
    pub parameter_type: ParameterType,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    #[default]
    Text,
    File,
    Directory,
    Select,
}

impl std::str::FromStr for ParameterType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(ParameterType::Text),
            "file" => Ok(ParameterType::File),
            "directory" | "dir" => Ok(ParameterType::Directory),
            "select" => Ok(ParameterType::Select),
            other => Err(format!("unknown parameter type '{}'", other)),
        }
    }
}

impl CommandParameter {
    pub fn new(name: impl Into<String>, parameter_type: ParameterType) -> Self {
        let name = name.into();
        Self {
            placeholder: name.clone(),
            name,
            parameter_type,
            required: false,
            default_value: None,
            options: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = Some(options);
        self
    }

    /// Options that constrain the value, if this is a select with any declared.
    pub fn select_options(&self) -> Option<&[String]> {
        match (&self.parameter_type, &self.options) {
            (ParameterType::Select, Some(options)) if !options.is_empty() => Some(options),
            _ => None,
        }
    }

    pub fn accepts(&self, value: &str) -> bool {
        self.select_options()
            .map_or(true, |options| options.iter().any(|o| o == value))
    }
}

impl Command {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            description: None,
            working_directory: None,
            environment_variables: Vec::new(),
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
            last_used_at: None,
            use_count: 0,
            parameters: Vec::new(),
            mise_enabled: false,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_working_directory(mut self, dir: impl Into<String>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn with_parameters(mut self, parameters: Vec<CommandParameter>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_mise(mut self, enabled: bool) -> Self {
        self.mise_enabled = enabled;
        self
    }

    /// Sets `key`, replacing an earlier value for the same key.
    pub fn set_environment_variable(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.environment_variables.iter_mut().find(|e| e.key == key) {
            Some(existing) => existing.value = value,
            None => self.environment_variables.push(EnvironmentVariable { key, value }),
        }
    }

    /// Pairs handed to the child process: set pairs only, later keys win.
    pub fn effective_environment(&self) -> Vec<(String, String)> {
        let mut merged: Vec<(String, String)> = Vec::new();
        for var in self.environment_variables.iter().filter(|v| v.is_set()) {
            match merged.iter_mut().find(|(k, _)| *k == var.key) {
                Some(slot) => slot.1 = var.value.clone(),
                None => merged.push((var.key.clone(), var.value.clone())),
            }
        }
        merged
    }

    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }

    pub fn remove_tag(&mut self, tag: &str) {
        self.tags.retain(|t| t != tag);
    }

    pub fn full_command(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn get_parameter(&self, name: &str) -> Option<&CommandParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Distinct placeholder names in the executable and args, first appearance first.
    pub fn detect_placeholders(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for text in std::iter::once(&self.command).chain(self.args.iter()) {
            for segment in tokenize(text) {
                if let Segment::Placeholder { name, .. } = segment {
                    if !names.iter().any(|n| n == name) {
                        names.push(name.to_string());
                    }
                }
            }
        }
        names
    }
}

/// Checks the shape rules every stored command must satisfy.
pub fn validate(command: &Command) -> Result<(), ValidationError> {
    if command.name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if command.command.trim().is_empty() {
        return Err(ValidationError::EmptyCommand);
    }

    let mut seen = HashSet::new();
    for parameter in &command.parameters {
        if parameter.name.trim().is_empty() {
            return Err(ValidationError::EmptyParameterName);
        }
        if !seen.insert(parameter.name.as_str()) {
            return Err(ValidationError::DuplicateParameterName(parameter.name.clone()));
        }
        if let Some(default) = &parameter.default_value {
            if !parameter.accepts(default) {
                return Err(ValidationError::InvalidSelectDefault {
                    parameter: parameter.name.clone(),
                    value: default.clone(),
                });
            }
        }
    }

    Ok(())
}

/// Fields for a new registry entry. Identity and timestamps are assigned by the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NewCommand {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub description: Option<String>,
    pub working_directory: Option<String>,
    pub environment_variables: Vec<EnvironmentVariable>,
    pub tags: Vec<String>,
    pub parameters: Vec<CommandParameter>,
    pub mise_enabled: bool,
}

impl NewCommand {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            ..Self::default()
        }
    }

    pub(crate) fn into_command(self) -> Command {
        let mut cmd = Command::new(self.name, self.command)
            .with_args(self.args)
            .with_parameters(self.parameters)
            .with_mise(self.mise_enabled);
        cmd.description = self.description;
        cmd.working_directory = self.working_directory;
        for var in self.environment_variables {
            cmd.set_environment_variable(var.key, var.value);
        }
        for tag in self.tags {
            cmd.add_tag(tag);
        }
        cmd
    }
}

/// Partial update. `None` leaves a field untouched; an empty `description`
/// or `working_directory` clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CommandUpdate {
    pub name: Option<String>,
    pub command: Option<String>,
    pub args: Option<Vec<String>>,
    pub description: Option<String>,
    pub working_directory: Option<String>,
    pub environment_variables: Option<Vec<EnvironmentVariable>>,
    pub tags: Option<Vec<String>>,
    pub parameters: Option<Vec<CommandParameter>>,
    pub mise_enabled: Option<bool>,
}

impl CommandUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub(crate) fn apply_to(self, cmd: &mut Command) {
        if let Some(name) = self.name {
            cmd.name = name;
        }
        if let Some(command) = self.command {
            cmd.command = command;
        }
        if let Some(args) = self.args {
            cmd.args = args;
        }
        if let Some(description) = self.description {
            cmd.description = Some(description).filter(|d| !d.is_empty());
        }
        if let Some(dir) = self.working_directory {
            cmd.working_directory = Some(dir).filter(|d| !d.is_empty());
        }
        if let Some(vars) = self.environment_variables {
            cmd.environment_variables.clear();
            for var in vars {
                cmd.set_environment_variable(var.key, var.value);
            }
        }
        if let Some(tags) = self.tags {
            cmd.tags.clear();
            for tag in tags {
                cmd.add_tag(tag);
            }
        }
        if let Some(parameters) = self.parameters {
            cmd.parameters = parameters;
        }
        if let Some(enabled) = self.mise_enabled {
            cmd.mise_enabled = enabled;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_command() {
        let cmd = Command::new("List Files", "ls");
        assert_eq!(cmd.name, "List Files");
        assert_eq!(cmd.command, "ls");
        assert_eq!(cmd.use_count, 0);
        assert!(cmd.last_used_at.is_none());
        assert_eq!(cmd.created_at, cmd.updated_at);
        assert!(!cmd.mise_enabled);
    }

    #[test]
    fn test_full_command() {
        let cmd = Command::new("List All", "ls").with_args(["-la", "/tmp"]);
        assert_eq!(cmd.full_command(), "ls -la /tmp");
    }

    #[test]
    fn test_tags_dedup() {
        let mut cmd = Command::new("Test", "echo");
        cmd.add_tag("development");
        cmd.add_tag("testing");
        cmd.add_tag("development");
        assert_eq!(cmd.tags.len(), 2);

        cmd.remove_tag("testing");
        assert_eq!(cmd.tags, vec!["development"]);
    }

    #[test]
    fn test_environment_last_write_wins() {
        let mut cmd = Command::new("Env", "env");
        cmd.set_environment_variable("A", "1");
        cmd.set_environment_variable("B", "2");
        cmd.set_environment_variable("A", "3");
        assert_eq!(cmd.environment_variables.len(), 2);

        // Raw duplicates (e.g. hand-edited registry) are folded the same way.
        cmd.environment_variables.push(EnvironmentVariable::new("B", "4"));
        cmd.environment_variables.push(EnvironmentVariable::new("", "orphan"));
        cmd.environment_variables.push(EnvironmentVariable::new("EMPTY", ""));
        assert_eq!(
            cmd.effective_environment(),
            vec![("A".to_string(), "3".to_string()), ("B".to_string(), "4".to_string())]
        );
    }

    #[test]
    fn test_detect_placeholders() {
        let cmd = Command::new("Deploy", "{tool}")
            .with_args(["deploy", "--env=${env}", "{target}", "{env}"]);
        assert_eq!(cmd.detect_placeholders(), vec!["tool", "env", "target"]);

        let json = Command::new("Post", "curl").with_args(["-d", r#"{"env":"{env}"}"#]);
        assert_eq!(json.detect_placeholders(), vec!["env"]);
    }

    #[test]
    fn test_validate_rules() {
        assert_eq!(validate(&Command::new("  ", "ls")), Err(ValidationError::EmptyName));
        assert_eq!(validate(&Command::new("ok", " \t")), Err(ValidationError::EmptyCommand));

        let dup = Command::new("dup", "echo").with_parameters(vec![
            CommandParameter::new("x", ParameterType::Text),
            CommandParameter::new("x", ParameterType::File),
        ]);
        assert_eq!(
            validate(&dup),
            Err(ValidationError::DuplicateParameterName("x".to_string()))
        );

        let bad_default = Command::new("sel", "echo").with_parameters(vec![
            CommandParameter::new("env", ParameterType::Select)
                .with_options(vec!["a".to_string(), "b".to_string()])
                .with_default("c"),
        ]);
        assert!(matches!(
            validate(&bad_default),
            Err(ValidationError::InvalidSelectDefault { .. })
        ));

        let unnamed = Command::new("p", "echo")
            .with_parameters(vec![CommandParameter::new("", ParameterType::Text)]);
        assert_eq!(validate(&unnamed), Err(ValidationError::EmptyParameterName));
    }

    #[test]
    fn test_select_without_options_accepts_anything() {
        let param = CommandParameter::new("any", ParameterType::Select).with_default("x");
        assert!(param.accepts("whatever"));
        let cmd = Command::new("s", "echo").with_parameters(vec![param]);
        assert_eq!(validate(&cmd), Ok(()));
    }

    #[test]
    fn test_update_merges_only_supplied_fields() {
        let mut cmd = Command::new("Original", "echo")
            .with_args(["hi"])
            .with_description("keep me");
        CommandUpdate {
            name: Some("Renamed".to_string()),
            working_directory: Some("/tmp".to_string()),
            ..CommandUpdate::default()
        }
        .apply_to(&mut cmd);

        assert_eq!(cmd.name, "Renamed");
        assert_eq!(cmd.args, vec!["hi"]);
        assert_eq!(cmd.description.as_deref(), Some("keep me"));
        assert_eq!(cmd.working_directory.as_deref(), Some("/tmp"));

        CommandUpdate {
            description: Some(String::new()),
            ..CommandUpdate::default()
        }
        .apply_to(&mut cmd);
        assert!(cmd.description.is_none());
    }

    #[test]
    fn test_serialized_shape_omits_absent_optionals() {
        let cmd = Command::new("Shape", "true");
        let value = serde_json::to_value(&cmd).unwrap();
        let obj = value.as_object().unwrap();
        assert!(!obj.contains_key("last_used_at"));
        assert!(!obj.contains_key("description"));
        assert_eq!(obj["use_count"], 0);
        assert_eq!(obj["mise_enabled"], false);

        let param = serde_json::to_value(CommandParameter::new("f", ParameterType::Directory)).unwrap();
        assert_eq!(param["parameter_type"], "directory");
    }

    #[test]
    fn test_parameter_type_from_str() {
        assert_eq!("Select".parse::<ParameterType>(), Ok(ParameterType::Select));
        assert_eq!("dir".parse::<ParameterType>(), Ok(ParameterType::Directory));
        assert!("number".parse::<ParameterType>().is_err());
    }
}
