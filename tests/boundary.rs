use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use command_argus::{
    ArgusError, CommandParameter, CommandService, CommandUpdate, LaunchPlan, LaunchSettings,
    NewCommand, ParameterType, ProcessExecutor, ProcessLauncher, ProcessOutput, Result,
    StoreManager, SystemLauncher,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

/// Records every plan and answers with a scripted outcome.
struct FakeLauncher {
    plans: Mutex<Vec<LaunchPlan>>,
    exit_code: Option<i32>,
    fail_spawn: bool,
}

impl FakeLauncher {
    fn exiting(code: i32) -> Arc<Self> {
        Arc::new(Self { plans: Mutex::new(Vec::new()), exit_code: Some(code), fail_spawn: false })
    }

    fn unspawnable() -> Arc<Self> {
        Arc::new(Self { plans: Mutex::new(Vec::new()), exit_code: None, fail_spawn: true })
    }

    fn plans(&self) -> Vec<LaunchPlan> {
        self.plans.lock().unwrap().clone()
    }
}

impl ProcessLauncher for FakeLauncher {
    fn launch(&self, plan: &LaunchPlan) -> Result<ProcessOutput> {
        self.plans.lock().unwrap().push(plan.clone());
        if self.fail_spawn {
            return Err(ArgusError::Spawn {
                program: plan.program.clone(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }
        Ok(ProcessOutput {
            stdout: format!("ran {}", plan.args.join(" ")).into_bytes(),
            stderr: Vec::new(),
            exit_code: self.exit_code,
        })
    }
}

fn settings() -> LaunchSettings {
    LaunchSettings {
        shell: vec!["sh".to_string(), "-c".to_string()],
        shim: vec!["mise".to_string(), "exec".to_string(), "--".to_string()],
        extra_path_dirs: Vec::new(),
    }
}

fn service_with(launcher: Arc<FakeLauncher>) -> (CommandService<Arc<FakeLauncher>>, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = StoreManager::open(dir.path().join("commands.json")).unwrap();
    (CommandService::new(store, ProcessExecutor::new(launcher, settings())), dir)
}

fn deploy_request() -> NewCommand {
    let mut request = NewCommand::new("Deploy", "deploy.sh");
    request.args = vec!["deploy".to_string(), "{target}".to_string()];
    request.parameters = vec![CommandParameter::new("target", ParameterType::Text).required()];
    request
}

fn values(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

#[test]
fn execute_resolves_parameters_and_counts_use() {
    let launcher = FakeLauncher::exiting(0);
    let (service, _dir) = service_with(Arc::clone(&launcher));
    let id = service.create_command(deploy_request()).unwrap().id;

    let result = service
        .execute_command_with_parameters(id, &values(&[("target", "prod")]), false)
        .unwrap();

    assert!(result.success);
    assert_eq!(result.stdout, "ran deploy prod");
    let plans = launcher.plans();
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].program, "deploy.sh");
    assert_eq!(plans[0].args, vec!["deploy", "prod"]);

    let stored = service.get_command(id).unwrap();
    assert_eq!(stored.use_count, 1);
    assert!(stored.last_used_at.is_some());
}

#[test]
fn non_zero_exit_is_a_result_and_still_counts() {
    let launcher = FakeLauncher::exiting(3);
    let (service, _dir) = service_with(launcher);
    let id = service.create_command(NewCommand::new("Fails", "false")).unwrap().id;

    let result = service.execute_command(id, false).unwrap();
    assert_eq!(result.exit_code, 3);
    assert!(!result.success);
    assert_eq!(service.get_command(id).unwrap().use_count, 1);
}

#[test]
fn spawn_failure_is_an_error_and_not_counted() {
    let launcher = FakeLauncher::unspawnable();
    let (service, _dir) = service_with(launcher);
    let id = service.create_command(NewCommand::new("Ghost", "nope")).unwrap().id;

    let err = service.execute_command(id, false).unwrap_err();
    assert!(matches!(err, ArgusError::Spawn { .. }));
    assert_eq!(service.get_command(id).unwrap().use_count, 0);
}

#[test]
fn missing_parameter_fails_before_any_launch() {
    let launcher = FakeLauncher::exiting(0);
    let (service, _dir) = service_with(Arc::clone(&launcher));
    let id = service.create_command(deploy_request()).unwrap().id;

    let err = service.execute_command(id, false).unwrap_err();
    assert!(matches!(err, ArgusError::MissingRequiredParameter(ref name) if name == "target"));
    assert!(launcher.plans().is_empty());
    assert_eq!(service.get_command(id).unwrap().use_count, 0);
}

#[test]
fn out_of_domain_select_value_never_launches() {
    let launcher = FakeLauncher::exiting(0);
    let (service, _dir) = service_with(Arc::clone(&launcher));
    let mut request = NewCommand::new("Pick", "echo");
    request.args = vec!["{choice}".to_string()];
    request.parameters = vec![CommandParameter::new("choice", ParameterType::Select)
        .with_options(vec!["a".to_string(), "b".to_string()])];
    let id = service.create_command(request).unwrap().id;

    let err = service
        .execute_command_with_parameters(id, &values(&[("choice", "c")]), false)
        .unwrap_err();
    assert!(matches!(err, ArgusError::InvalidSelectValue { .. }));
    assert!(launcher.plans().is_empty());
}

#[test]
fn shell_and_mise_flags_shape_the_launch() {
    let launcher = FakeLauncher::exiting(0);
    let (service, _dir) = service_with(Arc::clone(&launcher));
    let mut request = NewCommand::new("Node version", "node");
    request.args = vec!["--version".to_string()];
    request.mise_enabled = true;
    request.environment_variables = vec![
        command_argus::EnvironmentVariable::new("NODE_ENV", "test"),
        command_argus::EnvironmentVariable::new("", "ignored"),
    ];
    let id = service.create_command(request).unwrap().id;

    service.execute_command(id, false).unwrap();
    service.execute_command(id, true).unwrap();

    let plans = launcher.plans();
    assert_eq!(plans[0].program, "mise");
    assert_eq!(plans[0].args, vec!["exec", "--", "node", "--version"]);
    assert_eq!(plans[1].args, vec!["exec", "--", "sh", "-c", "node --version"]);
    assert_eq!(plans[0].env, vec![("NODE_ENV".to_string(), "test".to_string())]);
    assert_eq!(service.get_command(id).unwrap().use_count, 2);
}

#[test]
fn crud_roundtrip_through_the_boundary() {
    let (service, _dir) = service_with(FakeLauncher::exiting(0));
    let created = service.create_command(NewCommand::new("Original", "echo")).unwrap();

    service
        .update_command(created.id, CommandUpdate { name: Some("A".to_string()), ..Default::default() })
        .unwrap();
    let updated = service
        .update_command(
            created.id,
            CommandUpdate { description: Some("B".to_string()), ..Default::default() },
        )
        .unwrap();
    assert_eq!(updated.name, "A");
    assert_eq!(updated.description.as_deref(), Some("B"));

    assert_eq!(service.search_commands_by_name("a").unwrap(), vec![updated.clone()]);

    service.delete_command(created.id).unwrap();
    assert!(matches!(service.get_command(created.id), Err(ArgusError::NotFound(_))));
    assert!(service.list_commands().unwrap().is_empty());
    assert!(matches!(
        service.execute_command(created.id, false),
        Err(ArgusError::NotFound(_))
    ));
}

#[test]
fn spawned_executions_run_alongside_registry_work() {
    let launcher = FakeLauncher::exiting(0);
    let (service, _dir) = service_with(Arc::clone(&launcher));
    let service = Arc::new(service);
    let id = service.create_command(deploy_request()).unwrap().id;

    let handles: Vec<_> = ["dev", "prod"]
        .iter()
        .map(|target| service.spawn_execute(id, values(&[("target", *target)]), false))
        .collect();
    service.create_command(NewCommand::new("Unrelated", "ls")).unwrap();

    for handle in handles {
        assert!(handle.join().unwrap().unwrap().success);
    }
    assert_eq!(service.get_command(id).unwrap().use_count, 2);
    assert_eq!(service.list_commands().unwrap().len(), 2);
}

#[cfg(unix)]
#[test]
fn real_false_and_missing_binary() {
    let dir = TempDir::new().unwrap();
    let store = StoreManager::open(dir.path().join("commands.json")).unwrap();
    let service = CommandService::new(store, ProcessExecutor::new(SystemLauncher::default(), settings()));

    let falsy = service.create_command(NewCommand::new("False", "false")).unwrap().id;
    let result = service.execute_command(falsy, false).unwrap();
    assert_eq!(result.exit_code, 1);
    assert!(!result.success);

    let ghost = service
        .create_command(NewCommand::new("Ghost", "argus-definitely-missing-7d2e"))
        .unwrap()
        .id;
    assert!(matches!(service.execute_command(ghost, false), Err(ArgusError::Spawn { .. })));
    assert_eq!(service.get_command(ghost).unwrap().use_count, 0);
    assert_eq!(service.get_command(falsy).unwrap().use_count, 1);
}
