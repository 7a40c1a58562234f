//! Engine thread: owns the [`Controller`], runs its timers and dispatches
//! its API work to short-lived worker threads.
//!
//! Commands and completions arrive on crossbeam channels and are handled one
//! at a time, so the controller needs no locking. The loop sleeps until the
//! controller's next deadline.

#![allow(missing_docs)]

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, after, bounded, never, select, unbounded};

use crate::api::ApplicationApi;
use crate::core::errors::{DeskError, Result};
use crate::engine::alerts::NotificationId;
use crate::engine::controller::{Controller, ControllerSettings};
use crate::engine::host::Collaborators;
use crate::engine::jobs::{FetchJob, FetchOutcome};
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::model::section::Section;
use crate::model::users::Session;

// ──────────────────── commands ────────────────────

#[derive(Debug)]
enum EngineCommand {
    SignIn(Session),
    Refresh(Section),
    ShowSection(Section),
    Initialize(Sender<Result<()>>),
    Teardown,
    Activate(String),
    OpenNewApplication,
    SetVisibility(bool),
    NotificationClicked(NotificationId),
    Shutdown,
}

// ──────────────────── handle ────────────────────

/// Host-side handle to a running engine. Every method is non-blocking
/// except [`EngineHandle::initialize_and_start_polling`] and
/// [`EngineHandle::shutdown`].
pub struct EngineHandle {
    tx: Sender<EngineCommand>,
    join: Option<thread::JoinHandle<()>>,
}

impl EngineHandle {
    fn send(&self, command: EngineCommand) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|_| DeskError::ChannelClosed { component: "engine" })
    }

    pub fn sign_in(&self, session: Session) -> Result<()> {
        self.send(EngineCommand::SignIn(session))
    }

    /// Debounced manual refresh of `section`.
    pub fn refresh(&self, section: Section) -> Result<()> {
        self.send(EngineCommand::Refresh(section))
    }

    pub fn show_section(&self, section: Section) -> Result<()> {
        self.send(EngineCommand::ShowSection(section))
    }

    /// Start polling for the signed-in user. Waits for the engine to accept.
    pub fn initialize_and_start_polling(&self) -> Result<()> {
        let (reply_tx, reply_rx) = bounded(1);
        self.send(EngineCommand::Initialize(reply_tx))?;
        reply_rx
            .recv()
            .map_err(|_| DeskError::ChannelClosed { component: "engine" })?
    }

    pub fn teardown(&self) -> Result<()> {
        self.send(EngineCommand::Teardown)
    }

    pub fn on_application_number_activated(&self, app_number: &str) -> Result<()> {
        self.send(EngineCommand::Activate(app_number.to_string()))
    }

    pub fn open_new_application(&self) -> Result<()> {
        self.send(EngineCommand::OpenNewApplication)
    }

    pub fn set_visibility(&self, visible: bool) -> Result<()> {
        self.send(EngineCommand::SetVisibility(visible))
    }

    pub fn notification_clicked(&self, id: NotificationId) -> Result<()> {
        self.send(EngineCommand::NotificationClicked(id))
    }

    /// Tear down, stop the engine thread and wait for it.
    pub fn shutdown(mut self) -> Result<()> {
        let _ = self.tx.send(EngineCommand::Shutdown);
        self.join_thread()
    }

    fn join_thread(&mut self) -> Result<()> {
        match self.join.take() {
            Some(join) => join.join().map_err(|_| DeskError::Runtime {
                details: "engine thread panicked".to_string(),
            }),
            None => Ok(()),
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        if self.join.is_some() {
            let _ = self.tx.send(EngineCommand::Shutdown);
            let _ = self.join_thread();
        }
    }
}

// ──────────────────── engine ────────────────────

pub struct Engine;

impl Engine {
    /// Start the engine thread.
    pub fn spawn(
        settings: ControllerSettings,
        host: Collaborators,
        api: Arc<dyn ApplicationApi>,
        log: ActivityLoggerHandle,
    ) -> Result<EngineHandle> {
        let (tx, rx) = unbounded::<EngineCommand>();
        let controller = Controller::new(settings, host, log.clone());

        let join = thread::Builder::new()
            .name("ldk-engine".to_string())
            .spawn(move || engine_thread_main(controller, &rx, &api, &log))
            .map_err(|e| DeskError::Runtime {
                details: format!("failed to spawn engine thread: {e}"),
            })?;

        Ok(EngineHandle {
            tx,
            join: Some(join),
        })
    }
}

fn engine_thread_main(
    mut controller: Controller,
    commands: &Receiver<EngineCommand>,
    api: &Arc<dyn ApplicationApi>,
    log: &ActivityLoggerHandle,
) {
    let (done_tx, done_rx) = unbounded::<FetchOutcome>();
    let started = Instant::now();

    loop {
        for job in controller.drain_jobs() {
            dispatch(job, api, &done_tx, &mut controller);
        }

        let timer = controller
            .next_deadline()
            .map_or_else(never, |deadline| {
                after(deadline.saturating_duration_since(Instant::now()))
            });

        select! {
            recv(commands) -> msg => match msg {
                Ok(EngineCommand::Shutdown) | Err(_) => break,
                Ok(command) => handle_command(&mut controller, command, log),
            },
            recv(done_rx) -> msg => {
                if let Ok(outcome) = msg {
                    controller.apply(Instant::now(), outcome);
                }
            },
            recv(timer) -> _ => controller.on_tick(Instant::now()),
        }
    }

    controller.teardown();
    log.send(ActivityEvent::SessionStopped {
        reason: "shutdown".to_string(),
        uptime_secs: started.elapsed().as_secs(),
    });
}

fn handle_command(controller: &mut Controller, command: EngineCommand, log: &ActivityLoggerHandle) {
    let now = Instant::now();
    match command {
        EngineCommand::SignIn(session) => controller.set_session(session),
        EngineCommand::Refresh(section) => controller.refresh(now, section),
        EngineCommand::ShowSection(section) => controller.show_section(section),
        EngineCommand::Initialize(reply) => {
            let result = controller.initialize_and_start_polling(now);
            if let Err(err) = &result {
                log.send(ActivityEvent::Error {
                    code: err.code().to_string(),
                    message: err.to_string(),
                });
            }
            let _ = reply.send(result);
        }
        EngineCommand::Teardown => controller.teardown(),
        EngineCommand::Activate(app_number) => {
            controller.on_application_number_activated(&app_number);
        }
        EngineCommand::OpenNewApplication => controller.open_new_application(),
        EngineCommand::SetVisibility(visible) => controller.set_visibility(now, visible),
        EngineCommand::NotificationClicked(id) => controller.notification_clicked(now, id),
        EngineCommand::Shutdown => {}
    }
}

/// Run `job` on a worker thread. If no thread can be spawned the job runs
/// inline so its section never stays stuck in the loading state.
fn dispatch(
    job: FetchJob,
    api: &Arc<dyn ApplicationApi>,
    done: &Sender<FetchOutcome>,
    controller: &mut Controller,
) {
    let worker_api = Arc::clone(api);
    let worker_done = done.clone();
    let worker_job = job.clone();
    let spawned = thread::Builder::new()
        .name("ldk-fetch".to_string())
        .spawn(move || {
            let outcome = worker_job.execute(worker_api.as_ref());
            let _ = worker_done.send(outcome);
        });
    if let Err(e) = spawned {
        eprintln!("[LDK-ENGINE] failed to spawn fetch worker, running inline: {e}");
        let outcome = job.execute(api.as_ref());
        controller.apply(Instant::now(), outcome);
    }
}
