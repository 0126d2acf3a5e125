use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command as ProcessCommand, Stdio};
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

use crate::command::Command;
use crate::config::ExecutionConfig;
use crate::error::{ArgusError, Result};
use crate::resolver::ResolvedCommand;

/// How the resolved command reaches the operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchStrategy {
    /// Executable invoked with the argument vector as-is.
    Direct,
    /// Whole line handed to the platform interpreter.
    Shell,
    /// Version-manager shim in front of a direct or shell launch.
    VersionManagerShim { through_shell: bool },
}

impl LaunchStrategy {
    pub fn from_flags(use_shell: bool, mise_enabled: bool) -> Self {
        match (mise_enabled, use_shell) {
            (true, through_shell) => LaunchStrategy::VersionManagerShim { through_shell },
            (false, true) => LaunchStrategy::Shell,
            (false, false) => LaunchStrategy::Direct,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub program: String,
    pub args: Vec<String>,
    pub working_directory: Option<String>,
    pub environment: Vec<(String, String)>,
    pub strategy: LaunchStrategy,
}

impl ExecutionRequest {
    pub fn for_command(command: &Command, resolved: ResolvedCommand, use_shell: bool) -> Self {
        Self {
            program: resolved.program,
            args: resolved.args,
            working_directory: command.working_directory.clone(),
            environment: command.effective_environment(),
            strategy: LaunchStrategy::from_flags(use_shell, command.mise_enabled),
        }
    }
}

/// Exactly what gets handed to the OS process primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub success: bool,
}

impl ExecutionResult {
    fn from_output(output: ProcessOutput) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.exit_code.unwrap_or(-1),
            success: output.exit_code == Some(0),
        }
    }
}

/// Starts a planned process and waits for it.
///
/// Implementations return [`ArgusError::Spawn`] when no process could be
/// started. A non-zero exit is a normal output.
pub trait ProcessLauncher: Send + Sync {
    fn launch(&self, plan: &LaunchPlan) -> Result<ProcessOutput>;
}

impl<L: ProcessLauncher + ?Sized> ProcessLauncher for std::sync::Arc<L> {
    fn launch(&self, plan: &LaunchPlan) -> Result<ProcessOutput> {
        (**self).launch(plan)
    }
}

/// Spawns real child processes and buffers their output.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher {
    /// Mirror output to this process's terminal while capturing it.
    pub echo: bool,
}

#[derive(Clone, Copy)]
enum Echo {
    Stdout,
    Stderr,
}

/// Collects everything `reader` yields, mirroring it to `echo` while that works.
/// A failing echo is dropped; only read errors fail the drain.
fn drain<R: Read, W: Write>(mut reader: R, mut echo: Option<W>) -> io::Result<Vec<u8>> {
    let mut buffer = [0u8; 4096];
    let mut collected = Vec::new();
    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        let chunk = &buffer[..bytes_read];
        collected.extend_from_slice(chunk);

        let echoed = match echo.as_mut() {
            Some(sink) => sink.write_all(chunk).and_then(|_| sink.flush()),
            None => Ok(()),
        };
        if let Err(e) = echoed {
            debug!(error = %e, "echo stopped, still capturing");
            echo = None;
        }
    }
    Ok(collected)
}

fn spawn_reader<R>(reader: R, echo: Option<Echo>) -> JoinHandle<io::Result<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || match echo {
        Some(Echo::Stdout) => drain(reader, Some(io::stdout())),
        Some(Echo::Stderr) => drain(reader, Some(io::stderr())),
        None => drain(reader, None::<io::Sink>),
    })
}

fn join_reader(handle: JoinHandle<io::Result<Vec<u8>>>, stream: &str) -> Result<Vec<u8>> {
    let bytes = handle
        .join()
        .map_err(|_| io::Error::other(format!("{} reader thread panicked", stream)))??;
    Ok(bytes)
}

impl ProcessLauncher for SystemLauncher {
    fn launch(&self, plan: &LaunchPlan) -> Result<ProcessOutput> {
        let mut process = ProcessCommand::new(&plan.program);
        process
            .args(&plan.args)
            .stdin(if self.echo { Stdio::inherit() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(dir) = &plan.current_dir {
            process.current_dir(dir);
        }
        for (key, value) in &plan.env {
            process.env(key, value);
        }

        let mut child = process.spawn().map_err(|source| ArgusError::Spawn {
            program: plan.program.clone(),
            source,
        })?;

        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(out), Some(err)) => (out, err),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(io::Error::other("child output pipes were not captured").into());
            }
        };

        let stdout_handle = spawn_reader(stdout, self.echo.then_some(Echo::Stdout));
        let stderr_handle = spawn_reader(stderr, self.echo.then_some(Echo::Stderr));

        let status = child.wait()?;

        Ok(ProcessOutput {
            stdout: join_reader(stdout_handle, "stdout")?,
            stderr: join_reader(stderr_handle, "stderr")?,
            exit_code: status.code(),
        })
    }
}

/// Platform-dependent pieces of a launch, taken from [`ExecutionConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSettings {
    pub shell: Vec<String>,
    pub shim: Vec<String>,
    pub extra_path_dirs: Vec<PathBuf>,
}

impl LaunchSettings {
    pub fn platform_shell() -> Vec<String> {
        if cfg!(target_os = "windows") {
            vec!["cmd".to_string(), "/C".to_string()]
        } else {
            vec!["sh".to_string(), "-c".to_string()]
        }
    }
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self::from(&ExecutionConfig::default())
    }
}

impl From<&ExecutionConfig> for LaunchSettings {
    fn from(config: &ExecutionConfig) -> Self {
        let shell = config
            .shell
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(Self::platform_shell);

        let mut shim = vec![config.shim_program.clone()];
        shim.extend(config.shim_args.iter().cloned());

        Self {
            shell,
            shim,
            extra_path_dirs: config.extra_path_dirs.clone(),
        }
    }
}

/// Appends `extra` entries missing from `current`, keeping the original order first.
fn augmented_path(current: Option<OsString>, extra: &[PathBuf]) -> Option<String> {
    let mut entries: Vec<PathBuf> = current
        .as_deref()
        .map(|p| std::env::split_paths(p).collect())
        .unwrap_or_default();
    let before = entries.len();
    for dir in extra {
        if !entries.contains(dir) {
            entries.push(dir.clone());
        }
    }
    if entries.len() == before {
        return None;
    }
    std::env::join_paths(entries)
        .ok()
        .map(|joined| joined.to_string_lossy().into_owned())
}

pub struct ProcessExecutor<L = SystemLauncher> {
    launcher: L,
    settings: LaunchSettings,
}

impl ProcessExecutor<SystemLauncher> {
    pub fn system(settings: LaunchSettings) -> Self {
        Self::new(SystemLauncher::default(), settings)
    }
}

impl<L: ProcessLauncher> ProcessExecutor<L> {
    pub fn new(launcher: L, settings: LaunchSettings) -> Self {
        Self { launcher, settings }
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Builds the OS-level invocation without running anything.
    pub fn plan(&self, request: &ExecutionRequest) -> Result<LaunchPlan> {
        let current_dir = match &request.working_directory {
            Some(dir) if !dir.trim().is_empty() => {
                let path = Path::new(dir);
                if !path.is_dir() {
                    return Err(ArgusError::InvalidPath(dir.clone()));
                }
                Some(path.to_path_buf())
            }
            _ => None,
        };

        let shell_line = || {
            let mut words = vec![request.program.clone()];
            words.extend(request.args.iter().cloned());
            words.join(" ")
        };

        let mut argv: Vec<String> = match request.strategy {
            LaunchStrategy::Direct => {
                let mut argv = vec![request.program.clone()];
                argv.extend(request.args.iter().cloned());
                argv
            }
            LaunchStrategy::Shell => {
                let mut argv = self.settings.shell.clone();
                argv.push(shell_line());
                argv
            }
            LaunchStrategy::VersionManagerShim { through_shell } => {
                let mut argv = self.settings.shim.clone();
                if through_shell {
                    argv.extend(self.settings.shell.iter().cloned());
                    argv.push(shell_line());
                } else {
                    argv.push(request.program.clone());
                    argv.extend(request.args.iter().cloned());
                }
                argv
            }
        };

        let program = argv.remove(0);

        let mut env = Vec::with_capacity(request.environment.len() + 1);
        if let Some(path) = augmented_path(std::env::var_os("PATH"), &self.settings.extra_path_dirs) {
            env.push(("PATH".to_string(), path));
        }
        env.extend(request.environment.iter().cloned());

        Ok(LaunchPlan {
            program,
            args: argv,
            current_dir,
            env,
        })
    }

    /// Runs one request to completion. No retries, no timeout.
    pub fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        let plan = self.plan(request)?;
        debug!(program = %plan.program, args = ?plan.args, cwd = ?plan.current_dir, "launching");

        let output = self.launcher.launch(&plan)?;
        let result = ExecutionResult::from_output(output);
        info!(program = %plan.program, exit_code = result.exit_code, "process finished");
        Ok(result)
    }
}
