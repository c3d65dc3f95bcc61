//! CLI process substrate implementation.
//!
//! Spawns one model CLI process per call. The prompt is passed as the
//! trailing positional argument; stdout is the response, stderr is kept for
//! diagnostics. Each call moves through `Running -> Exited | TimedOut |
//! Aborted`, and an interrupted process is terminated with SIGTERM followed by
//! SIGKILL after a grace delay.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::domain::errors::{RsaError, RsaResult};
use crate::domain::models::{CallRequest, ChunkSink};
use crate::domain::ports::Substrate;
use crate::services::stream_buffer::Utf8Decoder;

/// CLI process substrate configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliProcessConfig {
    /// Path to the model CLI binary
    pub binary_path: String,
    /// Arguments placed before everything else (e.g. a script path)
    pub base_args: Vec<String>,
    /// Whether to pass `--print` for non-interactive output
    pub print_mode: bool,
    /// Additional CLI flags, placed just before the prompt
    pub extra_flags: Vec<String>,
    /// Delay between SIGTERM and SIGKILL
    pub kill_grace_ms: u64,
    /// Working directory for the process
    pub working_dir: Option<String>,
}

impl Default for CliProcessConfig {
    fn default() -> Self {
        Self {
            binary_path: "pi".to_string(),
            base_args: vec![],
            print_mode: true,
            extra_flags: vec![],
            kill_grace_ms: 3000,
            working_dir: None,
        }
    }
}

/// Where a single call ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallState {
    Running,
    Exited,
    TimedOut,
    Aborted,
}

/// CLI process substrate.
pub struct CliProcessSubstrate {
    config: CliProcessConfig,
}

impl CliProcessSubstrate {
    pub fn new(config: CliProcessConfig) -> Self {
        Self { config }
    }

    /// Build CLI arguments for a request.
    fn build_args(&self, request: &CallRequest) -> Vec<String> {
        let mut args = self.config.base_args.clone();

        if self.config.print_mode {
            args.push("--print".to_string());
        }

        args.push("--provider".to_string());
        args.push(request.model.provider.clone());
        args.push("--model".to_string());
        args.push(request.model.id.clone());
        args.push("--thinking".to_string());
        args.push(request.model.thinking_level.as_str().to_string());

        args.extend(self.config.extra_flags.iter().cloned());

        // The prompt itself
        args.push(request.prompt.clone());
        args
    }

    fn grace(&self) -> Duration {
        Duration::from_millis(self.config.kill_grace_ms)
    }

    /// SIGTERM, wait out the grace delay, then SIGKILL. Returns once reaped.
    async fn terminate(&self, child: &mut Child, pid: Option<u32>) -> std::io::Result<ExitStatus> {
        send_terminate(child, pid);

        if let Ok(status) = tokio::time::timeout(self.grace(), child.wait()).await {
            return status;
        }

        tracing::warn!(?pid, grace_ms = self.config.kill_grace_ms, "process ignored SIGTERM, killing");
        send_kill(child, pid);
        child.wait().await
    }
}

#[async_trait]
impl Substrate for CliProcessSubstrate {
    fn name(&self) -> &'static str {
        "process"
    }

    async fn invoke(
        &self,
        request: CallRequest,
        cancel: CancellationToken,
        on_chunk: Option<ChunkSink>,
    ) -> RsaResult<String> {
        if cancel.is_cancelled() {
            return Err(RsaError::Aborted);
        }

        let mut cmd = Command::new(&self.config.binary_path);
        cmd.args(self.build_args(&request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group so escalation reaches anything the CLI spawned.
        #[cfg(unix)]
        cmd.process_group(0);

        if let Some(ref dir) = self.config.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| {
            RsaError::Call(format!("Failed to spawn {}: {}", self.config.binary_path, e))
        })?;
        let pid = child.id();

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RsaError::Call("Failed to capture stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| RsaError::Call("Failed to capture stderr".to_string()))?;

        let mut stdout_task = tokio::spawn(read_stream(stdout, on_chunk));
        let mut stderr_task = tokio::spawn(read_stream(stderr, None));

        let mut state = CallState::Running;
        tracing::debug!(?pid, ?state, timeout_ms = request.timeout_ms(), "model process started");

        let deadline = async {
            match request.timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };

        let exited = {
            let wait = child.wait();
            tokio::select! {
                status = wait => Some(status),
                () = deadline => {
                    state = CallState::TimedOut;
                    None
                }
                () = cancel.cancelled() => {
                    state = CallState::Aborted;
                    None
                }
            }
        };

        let status = match exited {
            Some(status) => {
                state = CallState::Exited;
                status
            }
            None => self.terminate(&mut child, pid).await,
        };
        tracing::debug!(?pid, ?state, "model process terminated");

        let drain = self.grace();
        let stdout = collect(&mut stdout_task, drain).await;
        let stderr = collect(&mut stderr_task, drain).await;

        match state {
            CallState::TimedOut => {
                return Err(RsaError::Timeout {
                    timeout_ms: request.timeout_ms(),
                })
            }
            CallState::Aborted => return Err(RsaError::Aborted),
            CallState::Running | CallState::Exited => {}
        }

        let status = status
            .map_err(|e| RsaError::Call(format!("Failed to wait for process: {}", e)))?;
        let stdout = String::from_utf8_lossy(&stdout).into_owned();
        let stderr = String::from_utf8_lossy(&stderr);

        if !status.success() {
            let error_msg = if stderr.trim().is_empty() {
                format!("Process exited with code: {:?}", status.code())
            } else {
                stderr.trim().to_string()
            };
            return Err(RsaError::Call(error_msg));
        }

        if stdout.trim().is_empty() {
            let error_msg = if stderr.trim().is_empty() {
                "Process produced no output".to_string()
            } else {
                format!("Process produced no output: {}", stderr.trim())
            };
            return Err(RsaError::Call(error_msg));
        }

        Ok(stdout)
    }
}

/// Read a stream to the end, forwarding each chunk as it arrives.
async fn read_stream<R>(mut reader: R, on_chunk: Option<ChunkSink>) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let mut collected = Vec::new();
    let mut buf = [0u8; 4096];
    let mut decoder = Utf8Decoder::default();
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if let Some(ref sink) = on_chunk {
                    let text = decoder.decode(&buf[..n]);
                    if !text.is_empty() {
                        sink(&text);
                    }
                }
                collected.extend_from_slice(&buf[..n]);
            }
        }
    }
    collected
}

/// Wait for a reader task, giving up if a leftover descendant keeps the pipe open.
async fn collect(task: &mut JoinHandle<Vec<u8>>, limit: Duration) -> Vec<u8> {
    match tokio::time::timeout(limit, &mut *task).await {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(_)) => Vec::new(),
        Err(_) => {
            task.abort();
            Vec::new()
        }
    }
}

#[cfg(unix)]
fn signal_group(pid: Option<u32>, signal: nix::sys::signal::Signal) -> bool {
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    pid.and_then(|pid| i32::try_from(pid).ok())
        .is_some_and(|pid| killpg(Pid::from_raw(pid), signal).is_ok())
}

#[cfg(unix)]
fn send_terminate(_child: &mut Child, pid: Option<u32>) {
    signal_group(pid, nix::sys::signal::Signal::SIGTERM);
}

#[cfg(not(unix))]
fn send_terminate(child: &mut Child, _pid: Option<u32>) {
    let _ = child.start_kill();
}

fn send_kill(child: &mut Child, pid: Option<u32>) {
    #[cfg(unix)]
    signal_group(pid, nix::sys::signal::Signal::SIGKILL);
    #[cfg(not(unix))]
    let _ = pid;
    let _ = child.start_kill();
}
