//! Session worker process management
//!
//! The worker is any program that speaks the line protocol on stdin/stdout.
//! [`WorkerProcess::spawn`] starts it and hands back a [`WorkerLink`], the
//! transport-neutral end the channel drives. Tests build a link from a
//! `MockWorker` instead.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};

use snack_core::prelude::*;

/// Capacity of the outbound line queue and the inbound event queue
pub(crate) const LINK_CAPACITY: usize = 256;

/// Something the worker did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    /// One protocol line from the worker
    Line(String),
    /// Diagnostic output, not part of the protocol
    Stderr(String),
    /// The worker is gone
    Exited { code: Option<i32> },
}

/// Outbound half of a worker connection. Dropping it terminates the worker.
#[derive(Debug)]
pub struct WorkerSender {
    line_tx: mpsc::Sender<String>,
    kill_tx: Option<oneshot::Sender<()>>,
    pid: Option<u32>,
}

impl WorkerSender {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Write one line to the worker.
    pub async fn send_line(&self, line: String) -> Result<()> {
        self.line_tx
            .send(line)
            .await
            .map_err(|_| Error::channel_send("worker stdin closed"))
    }

    /// Ask the worker to terminate. Later calls are no-ops.
    pub fn terminate(&mut self) {
        if let Some(tx) = self.kill_tx.take() {
            debug!("Terminating session worker {:?}", self.pid);
            let _ = tx.send(());
        }
    }
}

impl Drop for WorkerSender {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Channel-side end of a worker connection
#[derive(Debug)]
pub struct WorkerLink {
    sender: WorkerSender,
    event_rx: mpsc::Receiver<WorkerEvent>,
}

impl WorkerLink {
    pub fn new(
        line_tx: mpsc::Sender<String>,
        event_rx: mpsc::Receiver<WorkerEvent>,
        kill_tx: oneshot::Sender<()>,
    ) -> Self {
        Self {
            sender: WorkerSender {
                line_tx,
                kill_tx: Some(kill_tx),
                pid: None,
            },
            event_rx,
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.sender.pid()
    }

    pub async fn send_line(&self, line: String) -> Result<()> {
        self.sender.send_line(line).await
    }

    /// Next event from the worker; `None` once every source has closed.
    pub async fn recv(&mut self) -> Option<WorkerEvent> {
        self.event_rx.recv().await
    }

    pub fn terminate(&mut self) {
        self.sender.terminate();
    }

    pub fn into_parts(self) -> (WorkerSender, mpsc::Receiver<WorkerEvent>) {
        (self.sender, self.event_rx)
    }
}

/// How to launch the worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

/// Spawns worker child processes
pub struct WorkerProcess;

impl WorkerProcess {
    /// Start the worker and wire its stdio into a [`WorkerLink`].
    pub fn spawn(command: &WorkerCommand) -> Result<WorkerLink> {
        info!(
            "Spawning session worker: {} {}",
            command.program,
            command.args.join(" ")
        );

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::WorkerNotFound {
                    command: command.program.clone(),
                }
            } else {
                Error::WorkerSpawn {
                    reason: e.to_string(),
                }
            }
        })?;

        let pid = child.id();
        info!("Session worker started with PID: {:?}", pid);

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(Error::WorkerSpawn {
                reason: "worker stdio was not captured".to_string(),
            });
        };

        let (line_tx, line_rx) = mpsc::channel::<String>(LINK_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel::<WorkerEvent>(LINK_CAPACITY);
        let (kill_tx, kill_rx) = oneshot::channel::<()>();

        tokio::spawn(stdin_writer(stdin, line_rx));
        tokio::spawn(stdout_reader(stdout, event_tx.clone()));
        tokio::spawn(stderr_reader(stderr, event_tx.clone()));
        tokio::spawn(wait_for_exit(child, kill_rx, event_tx));

        let mut link = WorkerLink::new(line_tx, event_rx, kill_tx);
        link.sender.pid = pid;
        Ok(link)
    }
}

/// Owns `child`; emits exactly one `Exited`, either on natural exit or
/// after a requested kill.
async fn wait_for_exit(
    mut child: Child,
    kill_rx: oneshot::Receiver<()>,
    event_tx: mpsc::Sender<WorkerEvent>,
) {
    let code = tokio::select! {
        result = child.wait() => match result {
            Ok(status) => {
                info!("Session worker exited with status: {:?}", status);
                status.code()
            }
            Err(e) => {
                error!("Error waiting for session worker: {}", e);
                None
            }
        },
        _ = kill_rx => {
            info!("Kill requested, stopping session worker");
            if let Err(e) = child.kill().await {
                error!("Failed to kill session worker: {}", e);
            }
            match child.wait().await {
                Ok(status) => status.code(),
                Err(e) => {
                    error!("Error waiting after kill: {}", e);
                    None
                }
            }
        }
    };

    debug!("Sending WorkerEvent::Exited {{ code: {:?} }}", code);
    let _ = event_tx.send(WorkerEvent::Exited { code }).await;
}

async fn stdout_reader(stdout: tokio::process::ChildStdout, tx: mpsc::Sender<WorkerEvent>) {
    let mut reader = BufReader::new(stdout).lines();

    while let Ok(Some(line)) = reader.next_line().await {
        trace!("worker stdout: {}", line);
        if line.trim().is_empty() {
            continue;
        }
        if tx.send(WorkerEvent::Line(line)).await.is_err() {
            debug!("worker stdout channel closed");
            break;
        }
    }

    debug!("worker stdout reader finished");
}

async fn stderr_reader(stderr: tokio::process::ChildStderr, tx: mpsc::Sender<WorkerEvent>) {
    let mut reader = BufReader::new(stderr).lines();

    while let Ok(Some(line)) = reader.next_line().await {
        trace!("worker stderr: {}", line);
        if tx.send(WorkerEvent::Stderr(line)).await.is_err() {
            break;
        }
    }

    debug!("worker stderr reader finished");
}

async fn stdin_writer(mut stdin: tokio::process::ChildStdin, mut rx: mpsc::Receiver<String>) {
    while let Some(line) = rx.recv().await {
        trace!("to worker: {}", line);

        if let Err(e) = stdin.write_all(line.as_bytes()).await {
            error!("Failed to write to worker stdin: {}", e);
            break;
        }
        if let Err(e) = stdin.write_all(b"\n").await {
            error!("Failed to write newline: {}", e);
            break;
        }
        if let Err(e) = stdin.flush().await {
            error!("Failed to flush worker stdin: {}", e);
            break;
        }
    }

    debug!("worker stdin writer finished");
}
