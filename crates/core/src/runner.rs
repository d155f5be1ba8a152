use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::{Result, RunError};
use crate::gate::RunGate;
use crate::input::InputController;
use crate::logger;
use crate::platform::Platform;
use crate::progress::{ExitReason, ProgressEvent, ProgressSender};
use crate::types::{RunMode, RunState, Target};

/// One automation routine. `tick` is called in a loop until the run stops;
/// returning `Some(d)` idles for `d` before the next call.
pub trait Recipe {
    fn tick(&mut self, input: &InputController, progress: &ProgressSender) -> Result<Option<Duration>>;
}

/// Builds the recipe on the worker thread, so recipes need not be `Send`.
pub type RecipeFactory =
    Box<dyn FnOnce(RunMode, &InputController, &ProgressSender) -> Result<Box<dyn Recipe>> + Send>;

pub struct ScriptRunner {
    state: RunState,
    mode: Option<RunMode>,
    gate: Arc<RunGate>,
    worker: Option<JoinHandle<()>>,
    done_rx: Option<mpsc::Receiver<()>>,
    pause_timeout: Duration,
    stop_timeout: Duration,
}

impl ScriptRunner {
    pub fn new(pause_timeout: Duration, stop_timeout: Duration) -> Self {
        logger::register_prefix("runner", logger::COLOR_GREEN);
        Self {
            state: RunState::Idle,
            mode: None,
            gate: Arc::new(RunGate::new()),
            worker: None,
            done_rx: None,
            pause_timeout,
            stop_timeout,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn mode(&self) -> Option<RunMode> {
        self.mode
    }

    /// An InputController bound to this runner's gate.
    pub fn input_controller(&self, platform: Arc<dyn Platform>, target: Target) -> InputController {
        InputController::new(platform, target, Arc::clone(&self.gate))
    }

    /// True while the controller holds the gate or a primitive is running.
    pub fn is_held(&self) -> bool {
        self.gate.is_held()
    }

    fn invalid(&self, op: &'static str) -> RunError {
        RunError::InvalidTransition { op, state: self.state }
    }

    fn worker_finished(&self) -> bool {
        self.worker.as_ref().map_or(true, |w| w.is_finished())
    }

    /// Spawn the worker loop. Valid once, from `Idle`.
    pub fn start(
        &mut self,
        mode: RunMode,
        input: InputController,
        progress: ProgressSender,
        recipe: RecipeFactory,
    ) -> Result<()> {
        if self.state != RunState::Idle {
            return Err(self.invalid("start"));
        }
        assert!(
            Arc::ptr_eq(input.gate(), &self.gate),
            "InputController belongs to a different runner"
        );

        let (done_tx, done_rx) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name(format!("worker-{:?}", mode).to_lowercase())
            .spawn(move || {
                // dropped on any exit, including a panic
                let _done = done_tx;
                worker_loop(mode, input, progress, recipe);
            })
            .map_err(|e| RunError::Platform(format!("cannot spawn worker: {}", e)))?;

        logger::info_p("runner", &format!("started {}", mode.label()));
        self.worker = Some(handle);
        self.done_rx = Some(done_rx);
        self.mode = Some(mode);
        self.state = RunState::Running;
        Ok(())
    }

    /// Suspend the worker before its next primitive. Fails without changing
    /// state if a primitive is still running after the pause timeout.
    pub fn pause(&mut self) -> Result<()> {
        if self.state != RunState::Running {
            return Err(self.invalid("pause"));
        }
        if self.worker_finished() {
            return Err(RunError::WorkerGone);
        }
        if !self.gate.close(self.pause_timeout) {
            let idle_for = self.gate.idle_for();
            logger::warn_p("runner", &format!("pause timed out, worker idle for {:?}", idle_for));
            return Err(RunError::PauseTimeout { idle_for });
        }
        self.state = RunState::Paused;
        logger::info_p("runner", "paused");
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        if self.state != RunState::Paused {
            return Err(self.invalid("resume"));
        }
        self.gate.open();
        self.state = RunState::Running;
        logger::info_p("runner", "resumed");
        Ok(())
    }

    /// Cancel the run and wait (bounded) for the worker to exit on its own.
    /// On timeout the state is unchanged and the call may be retried.
    pub fn stop(&mut self) -> Result<()> {
        if !matches!(self.state, RunState::Running | RunState::Paused) {
            return Err(self.invalid("stop"));
        }
        self.gate.cancel();

        if let Some(done_rx) = &self.done_rx {
            match done_rx.recv_timeout(self.stop_timeout) {
                Err(RecvTimeoutError::Timeout) => {
                    logger::warn_p("runner", "worker did not stop in time");
                    return Err(RunError::StopTimeout { waited: self.stop_timeout });
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
            }
        }
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                logger::error_p("runner", "worker panicked");
            }
        }
        self.done_rx = None;
        self.state = RunState::Stopped;
        logger::info_p("runner", "stopped");
        Ok(())
    }
}

impl Drop for ScriptRunner {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.gate.cancel();
        }
    }
}

fn worker_loop(mode: RunMode, input: InputController, progress: ProgressSender, recipe: RecipeFactory) {
    let run = panic::catch_unwind(AssertUnwindSafe(|| match recipe(mode, &input, &progress) {
        Ok(mut recipe) => run_recipe(recipe.as_mut(), &input, &progress),
        // stopped while the recipe was still setting up
        Err(_) if input.is_cancelled() => ExitReason::Cancelled,
        Err(e) => {
            logger::error_p("runner", &format!("cannot load {} recipe: {}", mode.label(), e));
            ExitReason::Failed(e.to_string())
        }
    }));
    let reason = run.unwrap_or_else(|payload| {
        let msg = panic_message(payload.as_ref());
        logger::error_p("runner", &format!("worker panicked: {}", msg));
        ExitReason::Failed(format!("worker panicked: {}", msg))
    });
    logger::info_p("runner", &format!("worker exited: {:?}", reason));
    progress.emit(ProgressEvent::WorkerExited { reason });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn run_recipe(recipe: &mut dyn Recipe, input: &InputController, progress: &ProgressSender) -> ExitReason {
    loop {
        if input.checkpoint().is_err() {
            return ExitReason::Cancelled;
        }
        match recipe.tick(input, progress) {
            Ok(Some(cooldown)) => {
                if input.idle(cooldown).is_err() {
                    return ExitReason::Cancelled;
                }
            }
            Ok(None) => {}
            // a primitive interrupted by stop surfaces as an error; not a failure
            Err(_) if input.is_cancelled() => return ExitReason::Cancelled,
            Err(e) => {
                logger::error_p("runner", &format!("recipe failed: {}", e));
                return ExitReason::Failed(e.to_string());
            }
        }
    }
}
