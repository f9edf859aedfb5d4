//! Process execution seam
//!
//! Every subprocess kiln starts (cargo, rustc, syft) goes through the
//! [`Executor`] trait so the orchestration can be exercised without a
//! toolchain. [`TokioExecutor`] is the real implementation.

use crate::error::{KilnError, KilnResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::debug;

/// Lines of output kept in failure messages
const BUILD_ERROR_TAIL_LINES: usize = 50;

/// A single subprocess invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Execution {
    /// Program to run
    pub command: String,

    /// Arguments, in order
    pub args: Vec<String>,

    /// Working directory (inherited when unset)
    pub dir: Option<PathBuf>,

    /// Variables added to the inherited environment of this child only
    pub env: BTreeMap<String, String>,
}

impl Execution {
    pub fn new<I, S>(command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            dir: None,
            env: BTreeMap::new(),
        }
    }

    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Command line as shown in logs and error messages
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }
}

/// Output of a captured execution
#[derive(Debug, Clone, Default)]
pub struct CapturedOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    /// Stdout followed by stderr, for tools that report on either
    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

/// Output of a streamed execution
#[derive(Debug, Clone, Default)]
pub struct StreamedOutput {
    pub success: bool,
    pub code: Option<i32>,

    /// Every line seen on stdout and stderr, in arrival order
    pub lines: Vec<String>,
}

impl StreamedOutput {
    /// Last lines of output, for failure messages
    pub fn error_detail(&self) -> String {
        output_tail(&self.lines)
    }

    /// Exit description used in failure messages
    pub fn exit_description(&self) -> String {
        match self.code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Abstract process execution
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run to completion, capturing stdout and stderr separately
    async fn output(&self, execution: &Execution) -> KilnResult<CapturedOutput>;

    /// Run to completion, calling `on_line` for each line of stdout or stderr
    async fn stream(
        &self,
        execution: &Execution,
        on_line: &(dyn Fn(String) + Send + Sync),
    ) -> KilnResult<StreamedOutput>;
}

/// Executor backed by `tokio::process`
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioExecutor;

impl TokioExecutor {
    pub fn new() -> Self {
        Self
    }

    fn command(execution: &Execution) -> Command {
        let mut cmd = Command::new(&execution.command);
        cmd.args(&execution.args)
            .envs(&execution.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &execution.dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

#[async_trait]
impl Executor for TokioExecutor {
    async fn output(&self, execution: &Execution) -> KilnResult<CapturedOutput> {
        debug!("Executing: {}", execution.display());

        let output = Self::command(execution)
            .output()
            .await
            .map_err(|e| KilnError::command_failed(execution.display(), e))?;

        Ok(CapturedOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    async fn stream(
        &self,
        execution: &Execution,
        on_line: &(dyn Fn(String) + Send + Sync),
    ) -> KilnResult<StreamedOutput> {
        debug!("Executing: {}", execution.display());

        let mut child = Self::command(execution)
            .spawn()
            .map_err(|e| KilnError::command_failed(execution.display(), e))?;

        let lines = match read_child_lines(&mut child, on_line).await {
            Ok(lines) => lines,
            Err(e) => {
                // the pipes are gone, do not leave the child blocked on them
                let _ = child.start_kill();
                return Err(KilnError::command_failed(execution.display(), e));
            }
        };

        let status = child
            .wait()
            .await
            .map_err(|e| KilnError::command_failed(execution.display(), e))?;

        Ok(StreamedOutput {
            success: status.success(),
            code: status.code(),
            lines,
        })
    }
}

/// Last `BUILD_ERROR_TAIL_LINES` lines, joined
pub(crate) fn output_tail(lines: &[String]) -> String {
    let start = lines.len().saturating_sub(BUILD_ERROR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Newline-delimited reader over one child pipe.
///
/// Lines are decoded lossily, so bytes that are not UTF-8 become
/// `U+FFFD` instead of ending the stream. Partial reads stay in `buf`
/// when a `select!` branch loses, and the next call resumes them.
struct PipeLines<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> PipeLines<R> {
    fn new(pipe: R) -> Self {
        Self {
            reader: BufReader::new(pipe),
            buf: Vec::new(),
        }
    }

    /// `None` once the pipe is closed and nothing is left over
    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        let read = self.reader.read_until(b'\n', &mut self.buf).await?;
        if read == 0 && self.buf.is_empty() {
            return Ok(None);
        }

        let mut bytes = self.buf.as_slice();
        if let Some(rest) = bytes.strip_suffix(b"\n") {
            bytes = rest.strip_suffix(b"\r").unwrap_or(rest);
        }
        let line = String::from_utf8_lossy(bytes).into_owned();
        self.buf.clear();
        Ok(Some(line))
    }
}

/// Record one line, returning whether the pipe is still open
fn take_line(
    line: std::io::Result<Option<String>>,
    lines: &mut Vec<String>,
    on_line: &(dyn Fn(String) + Send + Sync),
) -> std::io::Result<bool> {
    match line? {
        Some(line) => {
            on_line(line.clone());
            lines.push(line);
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Drain stdout and stderr of `child` until both are closed
async fn read_child_lines(
    child: &mut Child,
    on_line: &(dyn Fn(String) + Send + Sync),
) -> std::io::Result<Vec<String>> {
    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        return Err(std::io::Error::other("stdout and stderr were not piped"));
    };

    let mut stdout = PipeLines::new(stdout);
    let mut stderr = PipeLines::new(stderr);
    let (mut stdout_open, mut stderr_open) = (true, true);
    let mut lines = Vec::new();

    while stdout_open || stderr_open {
        tokio::select! {
            line = stdout.next_line(), if stdout_open => {
                stdout_open = take_line(line, &mut lines, on_line)?;
            }
            line = stderr.next_line(), if stderr_open => {
                stderr_open = take_line(line, &mut lines, on_line)?;
            }
        }
    }

    Ok(lines)
}
