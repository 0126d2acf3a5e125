use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use colored::*;
use std::collections::HashMap;
use std::io::{self, Write};
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use command_argus::fuzzy_matcher::CommandMatcher;
use command_argus::i18n::I18n;
use command_argus::resolver::required_prompts;
use command_argus::{
    Command, CommandParameter, CommandService, CommandUpdate, Config, EnvironmentVariable,
    LaunchSettings, NewCommand, ParameterType, ProcessExecutor, StoreManager, SystemLauncher,
};

#[derive(Parser)]
#[command(name = "argus", version)]
#[command(about = "Save frequently-run commands with parameters and run them")]
struct Cli {
    /// More log output (-v debug, -vv trace); ARGUS_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List saved commands
    #[command(alias = "ls")]
    List {
        /// Only commands carrying any of these tags
        #[arg(long = "tag", short = 't')]
        tags: Vec<String>,
    },
    /// Show one saved command in full
    Show {
        /// Id, exact name, or a unique part of the name
        target: String,
    },
    /// Save a new command; arguments go after `--`
    Add {
        name: String,
        /// Executable path or name
        #[arg(long = "cmd", short = 'c')]
        command: String,
        /// Arguments, may contain {placeholders}
        #[arg(last = true)]
        args: Vec<String>,
        #[arg(long, short)]
        description: Option<String>,
        /// Working directory for launches
        #[arg(long)]
        cwd: Option<String>,
        #[arg(long = "env", short = 'e', value_name = "KEY=VALUE")]
        env: Vec<String>,
        #[arg(long = "tag", short = 't')]
        tags: Vec<String>,
        /// e.g. "name=target,type=select,required,default=prod,options=prod|staging"
        #[arg(long = "param", short = 'p', value_name = "DEF")]
        params: Vec<String>,
        /// Launch through the mise shim
        #[arg(long)]
        mise: bool,
    },
    /// Change fields of a saved command; list options replace the whole list
    Edit {
        target: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long = "cmd", short = 'c')]
        command: Option<String>,
        #[arg(last = true)]
        args: Vec<String>,
        /// Empty string clears it
        #[arg(long, short)]
        description: Option<String>,
        /// Empty string clears it
        #[arg(long)]
        cwd: Option<String>,
        #[arg(long = "env", short = 'e', value_name = "KEY=VALUE")]
        env: Vec<String>,
        #[arg(long = "tag", short = 't')]
        tags: Vec<String>,
        #[arg(long = "param", short = 'p', value_name = "DEF")]
        params: Vec<String>,
        #[arg(long)]
        mise: Option<bool>,
    },
    /// Delete a saved command
    #[command(alias = "delete")]
    Rm {
        target: String,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Search saved commands by name
    Search {
        query: String,
        /// Rank by fuzzy match instead of plain substring
        #[arg(long, short)]
        fuzzy: bool,
    },
    /// Run a saved command
    Run {
        target: String,
        /// Values for parameters
        #[arg(long = "param", short = 'p', value_name = "NAME=VALUE")]
        params: Vec<String>,
        /// Hand the line to the shell
        #[arg(long, conflicts_with = "direct")]
        shell: bool,
        /// Invoke the executable directly even if the config defaults to the shell
        #[arg(long)]
        direct: bool,
        /// Print output after the process exits instead of streaming it
        #[arg(long)]
        buffered: bool,
    },
    /// Print registry and config file locations
    Path,
}

fn init_logging(verbose: u8, config: &Config) {
    let filter = EnvFilter::try_from_env("ARGUS_LOG").unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new(&config.logging.filter),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::new()?;
    init_logging(cli.verbose, &config);
    let i18n = I18n::new(&config.get_effective_language());

    let echo = !matches!(cli.command, Commands::Run { buffered: true, .. });
    let store = StoreManager::open(config.store_path()).context(i18n.t("error_open_registry"))?;
    let executor = ProcessExecutor::new(SystemLauncher { echo }, LaunchSettings::from(&config.execution));
    let service = CommandService::new(store, executor);

    match cli.command {
        Commands::List { tags } => {
            let commands = if tags.is_empty() {
                service.list_commands()?
            } else {
                service.search_commands_by_tags(&tags)?
            };
            print_list(&commands, &i18n);
        }
        Commands::Show { target } => {
            let command = find_command(&service, &target, &i18n)?;
            print_details(&command, &i18n);
        }
        Commands::Add { name, command, args, description, cwd, env, tags, params, mise } => {
            let request = NewCommand {
                name,
                command,
                args,
                description,
                working_directory: cwd,
                environment_variables: parse_env(&env)?,
                tags,
                parameters: parse_params(&params)?,
                mise_enabled: mise,
            };
            let created = service.create_command(request)?;
            println!("{}", i18n.t_format("created", &[&created.name, &created.id.to_string()]).green());
        }
        Commands::Edit { target, name, command, args, description, cwd, env, tags, params, mise } => {
            let existing = find_command(&service, &target, &i18n)?;
            let changes = CommandUpdate {
                name,
                command,
                args: non_empty(args),
                description,
                working_directory: cwd,
                environment_variables: non_empty(parse_env(&env)?),
                tags: non_empty(tags),
                parameters: non_empty(parse_params(&params)?),
                mise_enabled: mise,
            };
            if changes.is_empty() {
                println!("{}", i18n.t("nothing_to_update").yellow());
                return Ok(());
            }
            let updated = service.update_command(existing.id, changes)?;
            println!("{}", i18n.t_format("updated", &[&updated.name]).green());
        }
        Commands::Rm { target, yes } => {
            let command = find_command(&service, &target, &i18n)?;
            if !yes && !confirm_delete(&command, &i18n)? {
                println!("{}", i18n.t("delete_aborted").yellow());
                return Ok(());
            }
            service.delete_command(command.id)?;
            println!("{}", i18n.t_format("deleted", &[&command.name]).green());
        }
        Commands::Search { query, fuzzy } => {
            if fuzzy {
                let commands = service.list_commands()?;
                let ranked = CommandMatcher::new().rank(&query, &commands);
                if ranked.is_empty() {
                    println!("{}", i18n.t("no_matches").yellow());
                }
                for hit in ranked {
                    println!(
                        "{}  {}  {}",
                        short_id(&hit.command.id).dimmed(),
                        CommandMatcher::highlight(&hit.command.name, &hit.indices),
                        hit.command.full_command().dimmed()
                    );
                }
            } else {
                let found = service.search_commands_by_name(&query)?;
                if found.is_empty() {
                    println!("{}", i18n.t("no_matches").yellow());
                } else {
                    print_list(&found, &i18n);
                }
            }
        }
        Commands::Run { target, params, shell, direct, buffered } => {
            let command = find_command(&service, &target, &i18n)?;
            let mut values = parse_pairs(&params)?;
            prompt_missing(&command, &mut values, &i18n)?;

            let use_shell = shell || (!direct && config.execution.default_use_shell);
            let start_time = Instant::now();
            let result = service.execute_command_with_parameters(command.id, &values, use_shell)?;
            let elapsed = start_time.elapsed();

            if buffered {
                if !result.stdout.is_empty() {
                    println!("{}", i18n.t("stdout").cyan().bold());
                    println!("{}", result.stdout);
                }
                if !result.stderr.is_empty() {
                    println!("{}", i18n.t("stderr").red().bold());
                    println!("{}", result.stderr.red());
                }
            }

            let summary = i18n.t_format("command_completed", &[&result.exit_code.to_string()]);
            if result.success {
                eprintln!("{}", summary.green().bold());
            } else {
                eprintln!("{}", summary.red().bold());
            }
            eprintln!("{}: {}ms", i18n.t("execution_time").yellow(), elapsed.as_millis().to_string().green());

            if !result.success {
                std::process::exit(if (1..=255).contains(&result.exit_code) { result.exit_code } else { 1 });
            }
        }
        Commands::Path => {
            println!("{}", i18n.t_format("registry_path", &[&service.store().path().display().to_string()]));
            println!("{}", i18n.t_format("config_path", &[&Config::get_config_path().display().to_string()]));
        }
    }

    Ok(())
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

fn short_id(id: &Uuid) -> String {
    id.to_string().chars().take(8).collect()
}

/// Id, then exact name, then a unique case-insensitive name fragment.
fn find_command<L>(service: &CommandService<L>, target: &str, i18n: &I18n) -> Result<Command>
where
    L: command_argus::ProcessLauncher,
{
    if let Ok(id) = Uuid::parse_str(target) {
        return Ok(service.get_command(id)?);
    }
    if let Some(command) = service.store().find_by_name(target)? {
        return Ok(command);
    }

    let mut matches = service.search_commands_by_name(target)?;
    if matches.is_empty() {
        let by_id: Vec<Command> = service
            .list_commands()?
            .into_iter()
            .filter(|c| c.id.to_string().starts_with(target))
            .collect();
        matches = by_id;
    }

    match matches.len() {
        0 => bail!(i18n.t_format("not_found_target", &[target])),
        1 => Ok(matches.remove(0)),
        _ => {
            let names: Vec<&str> = matches.iter().map(|c| c.name.as_str()).collect();
            bail!(i18n.t_format("ambiguous_target", &[target, &names.join(", ")]))
        }
    }
}

fn parse_pairs(items: &[String]) -> Result<HashMap<String, String>> {
    items
        .iter()
        .map(|item| {
            item.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.to_string()))
                .ok_or_else(|| anyhow!("expected NAME=VALUE, got '{}'", item))
        })
        .collect()
}

fn parse_env(items: &[String]) -> Result<Vec<EnvironmentVariable>> {
    items
        .iter()
        .map(|item| {
            item.split_once('=')
                .map(|(k, v)| EnvironmentVariable::new(k.trim(), v))
                .ok_or_else(|| anyhow!("expected KEY=VALUE, got '{}'", item))
        })
        .collect()
}

fn parse_params(defs: &[String]) -> Result<Vec<CommandParameter>> {
    defs.iter().map(|def| parse_param_def(def)).collect()
}

/// `name=target,type=select,required,default=prod,options=prod|staging,label=Target`.
/// A bare first word is taken as the name.
fn parse_param_def(def: &str) -> Result<CommandParameter> {
    let mut param = CommandParameter::new("", ParameterType::Text);
    let mut label = None;

    for (i, part) in def.split(',').map(str::trim).filter(|p| !p.is_empty()).enumerate() {
        let (key, value) = match part.split_once('=') {
            Some((k, v)) => (k.trim(), Some(v.trim())),
            None => (part, None),
        };
        match (key, value) {
            ("name", Some(v)) => param.name = v.to_string(),
            ("type", Some(v)) => param.parameter_type = v.parse::<ParameterType>().map_err(|e| anyhow!(e))?,
            ("required", None) => param.required = true,
            ("required", Some(v)) => param.required = v.parse().with_context(|| format!("required={}", v))?,
            ("default", Some(v)) => param.default_value = Some(v.to_string()),
            ("options", Some(v)) => {
                param.options = Some(v.split('|').map(|o| o.trim().to_string()).collect())
            }
            ("label", Some(v)) => label = Some(v.to_string()),
            (name, None) if i == 0 => param.name = name.to_string(),
            _ => bail!("unrecognized parameter field '{}' in '{}'", part, def),
        }
    }

    if param.name.is_empty() {
        bail!("parameter definition '{}' has no name", def);
    }
    param.placeholder = label.unwrap_or_else(|| param.name.clone());
    Ok(param)
}

fn prompt_missing(command: &Command, values: &mut HashMap<String, String>, i18n: &I18n) -> Result<()> {
    let missing: Vec<CommandParameter> = required_prompts(command, values).into_iter().cloned().collect();

    for parameter in missing {
        if let Some(options) = parameter.select_options() {
            println!("{}", i18n.t_format("prompt_options", &[&options.join(", ")]).dimmed());
        }
        print!("{}", i18n.t_format("prompt_parameter", &[&parameter.placeholder]).yellow());
        io::stdout().flush().ok();

        let mut input = String::new();
        io::stdin().read_line(&mut input).context(i18n.t("error_read_input"))?;
        values.insert(parameter.name.clone(), input.trim_end_matches(['\r', '\n']).to_string());
    }
    Ok(())
}

fn confirm_delete(command: &Command, i18n: &I18n) -> Result<bool> {
    print!("{}", i18n.t_format("confirm_delete_prompt", &[&command.name]).yellow());
    io::stdout().flush().ok();
    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return Ok(false);
    }
    Ok(input.trim().eq_ignore_ascii_case("yes"))
}

fn print_list(commands: &[Command], i18n: &I18n) {
    if commands.is_empty() {
        println!("{}", i18n.t("no_commands"));
        return;
    }

    println!("{}", i18n.t_format("saved_commands", &[&commands.len().to_string()]).bold());
    for command in commands {
        let last = command
            .last_used_at
            .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| i18n.t("never_used"));
        let tags = if command.tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", command.tags.join(", "))
        };
        println!(
            "  {}  {}{}  {}  {}",
            short_id(&command.id).dimmed(),
            command.name.bold(),
            tags.cyan(),
            command.full_command(),
            i18n.t_format("usage_summary", &[&command.use_count.to_string(), &last]).dimmed()
        );
    }
}

fn print_details(command: &Command, i18n: &I18n) {
    let local = |t: chrono::DateTime<chrono::Utc>| {
        t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S").to_string()
    };

    println!("{}  {}", command.name.bold().cyan(), command.id.to_string().dimmed());
    println!("  {}: {}", i18n.t("field_command").yellow(), command.full_command());
    if let Some(description) = &command.description {
        println!("  {}: {}", i18n.t("field_description").yellow(), description);
    }
    if let Some(dir) = &command.working_directory {
        println!("  {}: {}", i18n.t("field_cwd").yellow(), dir);
    }
    if !command.environment_variables.is_empty() {
        println!("  {}:", i18n.t("field_env").yellow());
        for var in &command.environment_variables {
            println!("    {}={}", var.key, var.value);
        }
    }
    if !command.tags.is_empty() {
        println!("  {}: {}", i18n.t("field_tags").yellow(), command.tags.join(", "));
    }
    if !command.parameters.is_empty() {
        println!("  {}:", i18n.t("field_params").yellow());
        for p in &command.parameters {
            let mut notes = vec![format!("{:?}", p.parameter_type).to_lowercase()];
            if p.required {
                notes.push(i18n.t("required"));
            }
            if let Some(default) = &p.default_value {
                notes.push(format!("{}={}", i18n.t("default"), default));
            }
            if let Some(options) = &p.options {
                notes.push(options.join("|"));
            }
            println!("    {{{}}} {} ({})", p.name, p.placeholder.dimmed(), notes.join(", "));
        }
    }
    if command.mise_enabled {
        println!("  {}: {}", i18n.t("field_mise").yellow(), "yes".green());
    }
    println!("  {}: {}", i18n.t("field_created").yellow(), local(command.created_at));
    println!("  {}: {}", i18n.t("field_updated").yellow(), local(command.updated_at));
    println!(
        "  {}: {}",
        i18n.t("field_last_used").yellow(),
        command.last_used_at.map(local).unwrap_or_else(|| i18n.t("never_used"))
    );
    println!("  {}: {}", i18n.t("field_use_count").yellow(), command.use_count);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_def_full_form() {
        let p = parse_param_def("name=env,type=select,required,default=prod,options=prod|staging,label=Target env")
            .unwrap();
        assert_eq!(p.name, "env");
        assert_eq!(p.parameter_type, ParameterType::Select);
        assert!(p.required);
        assert_eq!(p.default_value.as_deref(), Some("prod"));
        assert_eq!(p.options, Some(vec!["prod".to_string(), "staging".to_string()]));
        assert_eq!(p.placeholder, "Target env");
    }

    #[test]
    fn param_def_bare_name() {
        let p = parse_param_def("target,required").unwrap();
        assert_eq!(p.name, "target");
        assert_eq!(p.placeholder, "target");
        assert!(p.required);
        assert_eq!(p.parameter_type, ParameterType::Text);
    }

    #[test]
    fn param_def_rejects_garbage() {
        assert!(parse_param_def("type=file").is_err());
        assert!(parse_param_def("x,color=blue").is_err());
        assert!(parse_param_def("x,type=number").is_err());
    }

    #[test]
    fn pairs_keep_equals_in_values() {
        let pairs = parse_pairs(&["q=a=b".to_string()]).unwrap();
        assert_eq!(pairs["q"], "a=b");
        assert!(parse_pairs(&["novalue".to_string()]).is_err());
    }

    #[test]
    fn cli_parses_add_with_trailing_args() {
        let cli = Cli::try_parse_from([
            "argus", "add", "Deploy", "-c", "deploy.sh", "-p", "target,required", "--", "--to", "{target}",
        ])
        .unwrap();
        match cli.command {
            Commands::Add { name, command, args, params, .. } => {
                assert_eq!(name, "Deploy");
                assert_eq!(command, "deploy.sh");
                assert_eq!(args, vec!["--to", "{target}"]);
                assert_eq!(params, vec!["target,required"]);
            }
            _ => panic!("expected add"),
        }
    }
}
