//! Headless mode runner - session event loop without an editor
//!
//! Spawns the session worker for a project directory, drives the
//! controller, applies stdin commands, and emits JSON events to stdout.

use std::path::{Path, PathBuf};

use tokio::sync::{broadcast, mpsc};

use snack_app::{
    load_project, ControllerEvent, LoadedProject, SessionController, Settings, TabCoordinator,
};
use snack_core::prelude::*;
use snack_session::{SessionChannel, WorkerCommand, WorkerProcess};

use super::command::{self, Flow, HeadlessCommand};
use super::HeadlessEvent;

const COMMAND_CAPACITY: usize = 64;

/// Everything the headless runner needs
#[derive(Debug, Clone)]
pub struct HeadlessOptions {
    pub project_path: PathBuf,
    pub settings: Settings,
    /// Publish once the session has started
    pub save_on_start: bool,
}

/// Run in headless mode - output JSON events, read JSON commands
pub async fn run_headless(options: HeadlessOptions) -> Result<()> {
    let HeadlessOptions {
        project_path,
        settings,
        save_on_start,
    } = options;

    info!("═══════════════════════════════════════════════════════");
    info!("snack-sync starting in HEADLESS mode");
    info!("Project: {}", project_path.display());
    info!("═══════════════════════════════════════════════════════");

    let LoadedProject { project, assets } =
        load_project(&project_path, &settings.session).inspect_err(report_fatal)?;
    info!(
        "Loaded {} files and {} assets",
        project.files.len(),
        assets.len()
    );

    let worker = WorkerCommand::new(settings.worker.command.clone())
        .args(settings.worker.args.clone())
        .working_dir(project_path.clone());
    let link = WorkerProcess::spawn(&worker).inspect_err(report_fatal)?;

    let tabs = TabCoordinator::new();
    let mut controller =
        SessionController::new(SessionChannel::new(link), project, &settings).with_tab(tabs.join());
    let events = controller.subscribe();
    controller.open().context("Failed to open session")?;

    for asset in assets {
        if let Err(e) = controller.upload_asset(&asset.path, &asset.bytes) {
            warn!("Skipping asset {}: {}", asset.path, e);
            HeadlessEvent::from(ControllerEvent::AssetUploadFailed {
                path: asset.path,
                message: e.to_string(),
            })
            .emit();
        }
    }

    // Spawn headless-specific stdin reader
    let (command_tx, mut command_rx) = mpsc::channel(COMMAND_CAPACITY);
    std::thread::spawn(move || {
        spawn_stdin_reader_blocking(command_tx);
    });

    let result = drive(
        &mut controller,
        events,
        &mut command_rx,
        &project_path,
        save_on_start,
        |event| event.emit(),
    )
    .await;

    controller.shutdown();
    info!("snack-sync headless mode exiting");
    result
}

fn report_fatal(e: &Error) {
    error!("{}", e);
    HeadlessEvent::error(e).emit();
}

enum Next {
    Stepped(bool),
    Command(Option<HeadlessCommand>),
    Interrupted,
}

/// Main headless event loop.
///
/// Ends on `quit`, Ctrl-C, or worker exit. A worker that exits with anything
/// but 0 is reported as an error.
async fn drive<E>(
    controller: &mut SessionController,
    mut events: broadcast::Receiver<ControllerEvent>,
    commands: &mut mpsc::Receiver<HeadlessCommand>,
    project_path: &Path,
    save_on_start: bool,
    mut emit: E,
) -> Result<()>
where
    E: FnMut(HeadlessEvent),
{
    let mut stdin_open = true;
    let mut pending_save = save_on_start;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let next = tokio::select! {
            stepped = controller.step() => Next::Stepped(stepped),
            command = commands.recv(), if stdin_open => Next::Command(command),
            _ = &mut ctrl_c => Next::Interrupted,
        };

        let mut quit = false;
        match next {
            Next::Stepped(true) => {}
            Next::Stepped(false) => {
                info!("Message channel closed");
                quit = true;
            }
            Next::Command(Some(command)) => {
                let name = command.name();
                match command::apply(controller, command, project_path).await {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Quit) => {
                        info!("Quit requested");
                        quit = true;
                    }
                    Err(e) => {
                        warn!("Command {} failed: {}", name, e);
                        emit(HeadlessEvent::command_failed(name, e.to_string()));
                    }
                }
            }
            Next::Command(None) => {
                info!("Stdin closed; running until quit or worker exit");
                stdin_open = false;
            }
            Next::Interrupted => {
                info!("Interrupted");
                quit = true;
            }
        }

        loop {
            match events.try_recv() {
                Ok(event) => {
                    if pending_save && event == ControllerEvent::SessionStarted {
                        pending_save = false;
                        controller.save();
                    }
                    emit(event.into());
                }
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!("Dropped {} controller events", skipped);
                }
                Err(_) => break,
            }
        }

        if let Some(code) = controller.worker_exit() {
            info!("Worker exited with {:?}", code);
            return match code {
                Some(0) => Ok(()),
                code => Err(Error::WorkerExit { code }),
            };
        }
        if quit {
            return Ok(());
        }
    }
}

/// Read commands from stdin until EOF or `quit` (blocking, own thread)
fn spawn_stdin_reader_blocking(command_tx: mpsc::Sender<HeadlessCommand>) {
    use std::io::BufRead;

    let stdin = std::io::stdin();
    let reader = stdin.lock();

    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to read stdin: {}", e);
                break;
            }
        };

        match HeadlessCommand::parse(&line) {
            Ok(Some(command)) => {
                let quit = command == HeadlessCommand::Quit;
                if command_tx.blocking_send(command).is_err() || quit {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Unknown stdin command: {}", line.trim());
                HeadlessEvent::command_failed("parse", e.to_string()).emit();
            }
        }
    }

    info!("Stdin reader exiting");
}
