//! External program handler.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::error::HandlerFailure;
use super::handler::{FunctionHandler, Output};
use super::render::render;
use crate::domains::discovery::{ModuleContext, OutputFormat};

/// Runs a program per call.
///
/// Each argv element is rendered with the call arguments, the argument
/// object is written to stdin as JSON, and stdout is the result. The child
/// runs in the module directory with the module environment and is killed
/// when the call is dropped.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    argv: Vec<String>,
    module: Arc<ModuleContext>,
    output: OutputFormat,
}

impl CommandHandler {
    pub fn new(argv: Vec<String>, module: Arc<ModuleContext>, output: OutputFormat) -> Self {
        Self { argv, module, output }
    }

    fn program_path(&self, program: &str) -> PathBuf {
        if program.starts_with("./") || program.starts_with("../") {
            self.module.dir.join(program)
        } else {
            PathBuf::from(program)
        }
    }
}

#[async_trait]
impl FunctionHandler for CommandHandler {
    fn kind(&self) -> &'static str {
        "command"
    }

    async fn call(&self, arguments: Map<String, Value>) -> Result<Output, HandlerFailure> {
        let argv = self
            .argv
            .iter()
            .map(|arg| render(arg, &arguments))
            .collect::<Result<Vec<_>, _>>()?;
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| HandlerFailure::failed("command is empty"))?;

        debug!(program = %program, args = ?args, "Spawning command");

        let mut child = Command::new(self.program_path(program))
            .args(args)
            .current_dir(&self.module.dir)
            .envs(&self.module.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| HandlerFailure::spawn(program.as_str(), e))?;

        let payload = serde_json::to_vec(&Value::Object(arguments))
            .map_err(|e| HandlerFailure::failed(format!("failed to encode arguments: {e}")))?;
        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                // The program may exit without reading its input.
                match stdin.write_all(&payload).await {
                    Err(e) if e.kind() != ErrorKind::BrokenPipe => return Err(e),
                    _ => {}
                }
            }
            Ok(())
        };

        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output
            .map_err(|e| HandlerFailure::failed(format!("failed to wait for '{program}': {e}")))?;
        fed.map_err(|e| HandlerFailure::failed(format!("failed to write arguments: {e}")))?;

        if !output.status.success() {
            return Err(HandlerFailure::ExitStatus {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Output::decode(String::from_utf8_lossy(&output.stdout).into_owned(), self.output)
    }
}
