//! Placeholder expansion for command templates.
//!
//! Arguments are split into literal and placeholder segments before anything
//! is substituted. A placeholder is `{name}` or `${name}`: an opening brace,
//! one or more characters other than `{` and `}`, and a closing brace. An
//! inner `{` restarts the placeholder, so `{"k":"{v}"}` and `{{v}}` still
//! expose `{v}`. Substituted
//! values are never re-scanned, and placeholders that name no declared
//! parameter are kept verbatim so shell snippets such as `${HOME}` or
//! `awk '{print $1}'` survive untouched.

use std::collections::HashMap;

use crate::command::{Command, CommandParameter};
use crate::error::{ArgusError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Literal(&'a str),
    /// `raw` is the full token as written, including `$`/braces.
    Placeholder { name: &'a str, raw: &'a str },
}

impl<'a> Segment<'a> {
    pub fn as_written(&self) -> &'a str {
        match self {
            Segment::Literal(text) => text,
            Segment::Placeholder { raw, .. } => raw,
        }
    }
}

pub fn tokenize(text: &str) -> Vec<Segment<'_>> {
    let bytes = text.as_bytes();
    let mut segments = Vec::new();
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let start = i;
        let brace = match bytes[i] {
            b'$' if bytes.get(i + 1) == Some(&b'{') => i + 1,
            b'{' => i,
            _ => {
                i += 1;
                continue;
            }
        };

        let body = &text[brace + 1..];
        match body.find(|c| c == '{' || c == '}') {
            Some(len) if len > 0 && body.as_bytes()[len] == b'}' => {
                let end = brace + 1 + len + 1;
                if literal_start < start {
                    segments.push(Segment::Literal(&text[literal_start..start]));
                }
                segments.push(Segment::Placeholder {
                    name: &text[brace + 1..end - 1],
                    raw: &text[start..end],
                });
                i = end;
                literal_start = end;
            }
            Some(len) if body.as_bytes()[len] == b'{' => {
                // Restart at the inner brace, taking a `$` right before it along.
                let inner = brace + 1 + len;
                i = if bytes[inner - 1] == b'$' { inner - 1 } else { inner };
            }
            _ => i += 1,
        }
    }

    if literal_start < bytes.len() {
        segments.push(Segment::Literal(&text[literal_start..]));
    }
    segments
}

/// Replaces known placeholders in `text`; unknown ones are written back as-is.
pub fn substitute(text: &str, values: &HashMap<&str, String>) -> String {
    let mut out = String::with_capacity(text.len());
    for segment in tokenize(text) {
        match segment {
            Segment::Literal(lit) => out.push_str(lit),
            Segment::Placeholder { name, raw } => match values.get(name) {
                Some(value) => out.push_str(value),
                None => out.push_str(raw),
            },
        }
    }
    out
}

/// Picks the value for every declared parameter.
///
/// Supplied non-empty value, then the default, then an error for required
/// parameters, then the empty string. Select parameters with options must
/// land on one of them; an optional select left empty stays empty.
pub fn resolve_values<'p>(
    parameters: &'p [CommandParameter],
    supplied: &HashMap<String, String>,
) -> Result<HashMap<&'p str, String>> {
    let mut values = HashMap::with_capacity(parameters.len());

    for parameter in parameters {
        let value = match supplied.get(&parameter.name).filter(|v| !v.is_empty()) {
            Some(v) => v.clone(),
            None => match &parameter.default_value {
                Some(default) => default.clone(),
                None if parameter.required => {
                    return Err(ArgusError::MissingRequiredParameter(parameter.name.clone()))
                }
                None => String::new(),
            },
        };

        if !value.is_empty() && !parameter.accepts(&value) {
            return Err(ArgusError::InvalidSelectValue {
                parameter: parameter.name.clone(),
                value,
            });
        }

        values.insert(parameter.name.as_str(), value);
    }

    Ok(values)
}

pub fn resolve_args(
    args: &[String],
    parameters: &[CommandParameter],
    supplied: &HashMap<String, String>,
) -> Result<Vec<String>> {
    let values = resolve_values(parameters, supplied)?;
    Ok(args.iter().map(|arg| substitute(arg, &values)).collect())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    pub program: String,
    pub args: Vec<String>,
}

/// Resolves both the executable and the argument list of `command`.
pub fn resolve(command: &Command, supplied: &HashMap<String, String>) -> Result<ResolvedCommand> {
    let values = resolve_values(&command.parameters, supplied)?;
    Ok(ResolvedCommand {
        program: substitute(&command.command, &values),
        args: command.args.iter().map(|arg| substitute(arg, &values)).collect(),
    })
}

/// Parameters the user still has to be asked for.
pub fn required_prompts<'c>(
    command: &'c Command,
    supplied: &HashMap<String, String>,
) -> Vec<&'c CommandParameter> {
    command
        .parameters
        .iter()
        .filter(|p| p.required && p.default_value.is_none())
        .filter(|p| supplied.get(&p.name).map_or(true, |v| v.is_empty()))
        .collect()
}
