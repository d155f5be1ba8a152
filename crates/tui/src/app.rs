use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use nguctl_core::logger::{self, LogRecord};
use nguctl_core::lua_rt::LuaRecipe;
use nguctl_core::platform::Platform;
use nguctl_core::progress::{self, ExitReason, ProgressReceiver, ProgressView};
use nguctl_core::runner::ScriptRunner;
use nguctl_core::settings::Settings;
use nguctl_core::stats::StatsStore;
use nguctl_core::types::{RunMode, RunState, Target};
use nguctl_core::{window, RunError};

use crate::confirm::ConfirmDialog;

/// One line under the run panel telling the operator what went wrong.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub text: String,
    pub is_error: bool,
}

pub struct App {
    platform: Arc<dyn Platform>,
    pub settings: Settings,
    settings_path: PathBuf,
    pub runner: ScriptRunner,
    pub target: Option<Target>,
    pub mode: RunMode,
    pub view: ProgressView,
    progress_rx: Option<ProgressReceiver>,
    pub stats: StatsStore,
    run_clock: Duration,
    started_at: Option<Instant>,
    pub notice: Option<Notice>,
    pub confirm: Option<ConfirmDialog>,
    pub log_visible: bool,
    pub log_messages: Vec<LogRecord>,
    pub log_scroll: usize, // scroll offset from bottom (0 = latest)
    log_rx: mpsc::Receiver<LogRecord>,
    pub should_quit: bool,
}

impl App {
    pub fn new(
        platform: Arc<dyn Platform>,
        settings: Settings,
        settings_path: PathBuf,
        stats: StatsStore,
        log_rx: mpsc::Receiver<LogRecord>,
    ) -> Self {
        let runner = ScriptRunner::new(settings.pause_timeout(), settings.stop_timeout());
        Self {
            platform,
            mode: settings.last_mode,
            settings,
            settings_path,
            runner,
            target: None,
            view: ProgressView::default(),
            progress_rx: None,
            stats,
            run_clock: Duration::ZERO,
            started_at: None,
            notice: None,
            confirm: None,
            log_visible: true,
            log_messages: Vec::new(),
            log_scroll: 0,
            log_rx,
            should_quit: false,
        }
    }

    fn info(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice { text: text.into(), is_error: false });
    }

    fn fail(&mut self, text: impl Into<String>) {
        let text = text.into();
        logger::warn(&text);
        self.notice = Some(Notice { text, is_error: true });
    }

    /// A run is active while the worker may still touch the game.
    pub fn run_active(&self) -> bool {
        matches!(self.runner.state(), RunState::Running | RunState::Paused)
    }

    /// Locate and calibrate the game window. Run stays disabled until this
    /// succeeds.
    pub fn discover(&mut self) {
        if self.run_active() {
            self.fail("stop the run before searching for the window again");
            return;
        }
        match window::discover(self.platform.as_ref(), &self.settings) {
            Ok(target) => {
                self.target = Some(target);
                self.info(format!("Game detected at: {}", target.origin));
            }
            Err(e) => {
                self.target = None;
                let hint = match e {
                    RunError::WindowNotFound { .. } => "is the game open?",
                    RunError::SignatureNotFound => "is the game fully visible?",
                    _ => "",
                };
                self.fail(format!("{} {} (w to retry)", e, hint));
            }
        }
    }

    pub fn drain_logs(&mut self) {
        while let Ok(rec) = self.log_rx.try_recv() {
            self.log_messages.push(rec);
        }
    }

    /// Fold worker events into the view and lifetime stats. Reaps the worker
    /// once it has exited on its own.
    pub fn drain_progress(&mut self) {
        let events = match &self.progress_rx {
            Some(rx) => rx.drain(),
            None => return,
        };
        for event in events {
            self.stats.stats.record(&event);
            self.view.apply(&event);
        }
        if self.view.exit.is_some() && self.run_active() {
            self.stop_clock();
            if let Err(e) = self.runner.stop() {
                self.fail(format!("cannot reap worker: {}", e));
                return;
            }
            if let Some(ExitReason::Failed(msg)) = &self.view.exit {
                let msg = format!("run failed: {}", msg);
                self.fail(msg);
            }
        }
    }

    fn stop_clock(&mut self) {
        if let Some(since) = self.started_at.take() {
            self.run_clock = since.elapsed();
        }
    }

    /// Wall time since the run started, pauses included. Frozen once the
    /// run ends.
    pub fn elapsed(&self) -> Duration {
        self.started_at.map_or(self.run_clock, |s| s.elapsed())
    }

    /// Space: run, pause or resume depending on the state.
    pub fn toggle_run(&mut self) {
        match self.runner.state() {
            RunState::Idle | RunState::Stopped => self.start_run(),
            RunState::Running => match self.runner.pause() {
                Ok(()) => {
                    self.info("paused");
                }
                Err(e) => self.fail(format!("{} (space to retry)", e)),
            },
            RunState::Paused => match self.runner.resume() {
                Ok(()) => {
                    self.info("resumed");
                }
                Err(e) => self.fail(e.to_string()),
            },
        }
    }

    fn start_run(&mut self) {
        let Some(target) = self.target else {
            self.fail("no game window (w to retry)");
            return;
        };
        if self.runner.state() == RunState::Stopped {
            self.runner = ScriptRunner::new(self.settings.pause_timeout(), self.settings.stop_timeout());
        }

        let (tx, rx) = progress::channel();
        let input = self.runner.input_controller(Arc::clone(&self.platform), target);
        let recipe = LuaRecipe::factory(self.settings.recipes_dir.clone(), self.settings.options_for(self.mode));
        match self.runner.start(self.mode, input, tx, recipe) {
            Ok(()) => {
                self.view = ProgressView::default();
                self.progress_rx = Some(rx);
                self.run_clock = Duration::ZERO;
                self.started_at = Some(Instant::now());
                self.info(format!("running {}", self.mode.label()));
            }
            Err(e) => self.fail(e.to_string()),
        }
    }

    pub fn stop(&mut self) {
        if !self.run_active() {
            return;
        }
        match self.runner.stop() {
            Ok(()) => {
                self.stop_clock();
                // pick up the exit event and any late counters
                self.drain_progress();
                self.info("stopped");
            }
            Err(e) => self.fail(format!("{} (s to retry)", e)),
        }
    }

    pub fn cycle_mode(&mut self) {
        if self.run_active() {
            self.fail("cannot change mode during a run");
            return;
        }
        self.mode = self.mode.next();
        self.settings.last_mode = self.mode;
        self.info(format!("mode: {}", self.mode.label()));
    }

    /// Bring the game to the front. While a run is active only the worker
    /// may touch the window.
    pub fn activate(&mut self) {
        if self.run_active() {
            self.fail("the window is in use by the run");
            return;
        }
        let Some(target) = self.target else {
            self.fail("no game window (w to retry)");
            return;
        };
        if let Err(e) = self.platform.activate(target.window) {
            self.fail(e.to_string());
        }
    }

    pub fn scroll_log_up(&mut self, n: usize) {
        self.log_scroll = self.log_scroll.saturating_add(n);
    }

    pub fn scroll_log_down(&mut self, n: usize) {
        self.log_scroll = self.log_scroll.saturating_sub(n);
    }

    pub fn toggle_log(&mut self) {
        self.log_visible = !self.log_visible;
    }

    pub fn request_quit(&mut self) {
        self.confirm = Some(ConfirmDialog::new("Quit", "Are you sure you want to quit?"));
    }

    /// Answer to the quit dialog. Yes stops the run and persists stats.
    pub fn confirm_quit(&mut self, yes: bool) {
        self.confirm = None;
        if !yes {
            return;
        }
        if self.run_active() {
            self.stop();
            if self.run_active() {
                // worker is stuck in a primitive; let the operator decide again
                return;
            }
        }
        if let Err(e) = self.stats.save() {
            logger::error(&format!("cannot save stats: {:#}", e));
        }
        if let Err(e) = self.settings.save(&self.settings_path) {
            logger::error(&format!("cannot save settings: {:#}", e));
        }
        self.should_quit = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nguctl_core::platform::stub::{StubPlatform, STUB_GAME_ORIGIN};
    use nguctl_core::stats::Stats;
    use std::path::Path;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("nguctl-tui-{}-{}.json", name, std::process::id()))
    }

    fn app(name: &str) -> App {
        let mut settings = Settings::default();
        settings.recipes_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../recipes");
        let platform = Arc::new(StubPlatform::with_game(&settings));
        let (_tx, rx) = mpsc::channel();
        let stats = StatsStore::load(&temp_path(&format!("{}-stats", name)));
        App::new(platform, settings, temp_path(&format!("{}-settings", name)), stats, rx)
    }

    #[test]
    fn run_needs_a_window() {
        let mut app = app("nowin");
        app.toggle_run();
        assert_eq!(app.runner.state(), RunState::Idle);
        assert!(app.notice.as_ref().unwrap().is_error);
    }

    #[test]
    fn discover_sets_origin() {
        let mut app = app("discover");
        app.discover();
        assert_eq!(app.target.unwrap().origin, STUB_GAME_ORIGIN);
        assert!(!app.notice.as_ref().unwrap().is_error);
    }

    #[test]
    fn space_cycles_run_pause_resume() {
        let mut app = app("space");
        app.discover();
        app.toggle_run();
        assert_eq!(app.runner.state(), RunState::Running);
        app.toggle_run();
        assert_eq!(app.runner.state(), RunState::Paused);
        app.toggle_run();
        assert_eq!(app.runner.state(), RunState::Running);

        app.cycle_mode();
        assert_eq!(app.mode, RunMode::Questing);

        app.stop();
        assert_eq!(app.runner.state(), RunState::Stopped);
        assert!(app.view.exit.is_some());

        // a fresh runner for the next run
        app.cycle_mode();
        assert_eq!(app.mode, RunMode::ItopodSniping);
        app.toggle_run();
        assert_eq!(app.runner.state(), RunState::Running);
        app.stop();
    }

    #[test]
    fn elapsed_counts_paused_time() {
        let mut app = app("elapsed");
        app.discover();
        app.toggle_run();
        app.toggle_run();
        assert_eq!(app.runner.state(), RunState::Paused);
        std::thread::sleep(Duration::from_millis(150));
        assert!(app.elapsed() >= Duration::from_millis(150));

        app.stop();
        let frozen = app.elapsed();
        assert!(frozen >= Duration::from_millis(150));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(app.elapsed(), frozen);
    }

    #[test]
    fn quit_persists_stats() {
        let mut app = app("quit");
        app.stats.stats.itopod_snipes = 7;
        app.request_quit();
        app.confirm_quit(false);
        assert!(!app.should_quit);

        app.request_quit();
        app.confirm_quit(true);
        assert!(app.should_quit);
        let saved = StatsStore::load(app.stats.path());
        assert_eq!(saved.stats, Stats { itopod_snipes: 7, itopod_time_saved: "0".into() });
        std::fs::remove_file(app.stats.path()).ok();
        std::fs::remove_file(&app.settings_path).ok();
    }
}
