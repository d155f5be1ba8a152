//! End-to-end run-control scenarios against the stub desktop.
//!
//!     cargo run -p nguctl-test --bin test-scenarios
//!     cargo run -p nguctl-test --bin test-scenarios -- pause

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use libtest_mimic::{Arguments, Failed, Trial};

use nguctl_core::input::InputController;
use nguctl_core::lua_rt::LuaRecipe;
use nguctl_core::platform::stub::{StubPlatform, STUB_GAME_ORIGIN};
use nguctl_core::progress::{self, ExitReason, ProgressEvent, ProgressReceiver, ProgressSender, ProgressView};
use nguctl_core::runner::{Recipe, RecipeFactory, ScriptRunner};
use nguctl_core::settings::Settings;
use nguctl_core::stats::StatsStore;
use nguctl_core::types::{Color, RunMode, RunState, Target};
use nguctl_core::{window, RunError};

const WAIT: Duration = Duration::from_secs(5);

/// Recipe driven by a closure, one call per tick.
struct Steps<F>(F);

impl<F> Recipe for Steps<F>
where
    F: FnMut(&InputController, &ProgressSender) -> nguctl_core::Result<Option<Duration>>,
{
    fn tick(&mut self, input: &InputController, progress: &ProgressSender) -> nguctl_core::Result<Option<Duration>> {
        (self.0)(input, progress)
    }
}

fn steps<F>(f: F) -> RecipeFactory
where
    F: FnMut(&InputController, &ProgressSender) -> nguctl_core::Result<Option<Duration>> + Send + 'static,
{
    Box::new(move |_: RunMode, _: &InputController, _: &ProgressSender| {
        Ok(Box::new(Steps(f)) as Box<dyn Recipe>)
    })
}

struct Rig {
    stub: Arc<StubPlatform>,
    runner: ScriptRunner,
    target: Target,
    settings: Settings,
}

fn rig(pause_timeout: Duration) -> Result<Rig, Failed> {
    let mut settings = Settings::default();
    settings.recipes_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../recipes");
    let stub = Arc::new(StubPlatform::with_game(&settings));
    let target = window::discover(stub.as_ref(), &settings)?;
    let runner = ScriptRunner::new(pause_timeout, WAIT);
    Ok(Rig { stub, runner, target, settings })
}

impl Rig {
    fn start(&mut self, mode: RunMode, recipe: RecipeFactory) -> Result<ProgressReceiver, Failed> {
        let (tx, rx) = progress::channel();
        let input = self.runner.input_controller(self.stub.clone(), self.target);
        self.runner.start(mode, input, tx, recipe)?;
        Ok(rx)
    }
}

/// Wait until `cond` holds for the folded view.
fn wait_for(rx: &ProgressReceiver, view: &mut ProgressView, cond: impl Fn(&ProgressView) -> bool) -> Result<(), Failed> {
    let deadline = Instant::now() + WAIT;
    while !cond(view) {
        if Instant::now() > deadline {
            return Err(format!("timed out waiting, view: {:?}", view).into());
        }
        if let Some(ev) = rx.recv_timeout(Duration::from_millis(50)) {
            view.apply(&ev);
        }
    }
    Ok(())
}

fn check(cond: bool, what: &str) -> Result<(), Failed> {
    if cond {
        Ok(())
    } else {
        Err(what.into())
    }
}

fn discovery_finds_game() -> Result<(), Failed> {
    let rig = rig(WAIT)?;
    check(rig.target.origin == STUB_GAME_ORIGIN, "origin")?;

    let empty = StubPlatform::new(800, 600);
    empty.add_window("Play NGU IDLE");
    match window::discover(&empty, &rig.settings) {
        Err(RunError::SignatureNotFound) => Ok(()),
        other => Err(format!("expected SignatureNotFound, got {:?}", other).into()),
    }
}

fn questing_progress_reaches_full() -> Result<(), Failed> {
    let mut rig = rig(WAIT)?;
    let mut fractions = vec![0.1, 0.5, 1.0].into_iter();
    let rx = rig.start(
        RunMode::Questing,
        steps(move |input, progress| {
            input.read_pixel(0, 0)?;
            match fractions.next() {
                Some(f) => progress.progress(f),
                None => progress.label("done"),
            }
            Ok(Some(Duration::from_millis(10)))
        }),
    )?;

    let mut view = ProgressView::default();
    wait_for(&rx, &mut view, |v| v.label == "done")?;
    check(view.fraction == 1.0, "fraction is 1.0")?;
    rig.runner.stop()?;
    check(rig.runner.state() == RunState::Stopped, "stopped")
}

fn pause_holds_primitives() -> Result<(), Failed> {
    let mut rig = rig(WAIT)?;
    rig.stub.set_op_delay(Duration::from_millis(5));
    let _rx = rig.start(
        RunMode::ItopodSniping,
        steps(|input, _| {
            input.click(1, 1)?;
            Ok(None)
        }),
    )?;
    thread::sleep(Duration::from_millis(50));

    rig.runner.pause()?;
    let frozen = rig.stub.ops();
    thread::sleep(Duration::from_millis(200));
    check(rig.stub.ops() == frozen, "no primitive ran while paused")?;

    rig.runner.resume()?;
    thread::sleep(Duration::from_millis(100));
    check(rig.stub.ops() > frozen, "primitives resumed")?;
    check(rig.stub.max_in_flight() == 1, "one primitive at a time")?;
    rig.runner.stop()?;
    Ok(())
}

fn pause_times_out_on_slow_primitive() -> Result<(), Failed> {
    let mut rig = rig(Duration::from_millis(100))?;
    let _rx = rig.start(
        RunMode::ItopodSniping,
        steps(|input, _| {
            input.click(1, 1)?;
            Ok(None)
        }),
    )?;
    thread::sleep(Duration::from_millis(50));
    rig.stub.set_op_delay(Duration::from_millis(700));
    thread::sleep(Duration::from_millis(50));

    match rig.runner.pause() {
        Err(RunError::PauseTimeout { .. }) => {}
        other => return Err(format!("expected PauseTimeout, got {:?}", other).into()),
    }
    check(rig.runner.state() == RunState::Running, "still running")?;
    rig.runner.stop()?;
    Ok(())
}

fn stop_interrupts_long_idle() -> Result<(), Failed> {
    let mut rig = rig(WAIT)?;
    let rx = rig.start(RunMode::Questing, steps(|_, _| Ok(Some(Duration::from_secs(600)))))?;
    thread::sleep(Duration::from_millis(50));

    let started = Instant::now();
    rig.runner.stop()?;
    check(started.elapsed() < Duration::from_secs(2), "stop is prompt")?;

    let events = rx.drain();
    check(
        events.last() == Some(&ProgressEvent::WorkerExited { reason: ExitReason::Cancelled }),
        "last event is a cancelled exit",
    )
}

fn failed_recipe_reports_and_blocks_pause() -> Result<(), Failed> {
    let mut rig = rig(WAIT)?;
    let rx = rig.start(RunMode::Questing, steps(|_, _| Err(RunError::Recipe("boom".into()))))?;

    let mut view = ProgressView::default();
    wait_for(&rx, &mut view, |v| v.exit.is_some())?;
    check(matches!(&view.exit, Some(ExitReason::Failed(m)) if m.contains("boom")), "failure reason")?;
    thread::sleep(Duration::from_millis(50));
    match rig.runner.pause() {
        Err(RunError::WorkerGone) => {}
        other => return Err(format!("expected WorkerGone, got {:?}", other).into()),
    }
    rig.runner.stop()?;
    Ok(())
}

fn itopod_recipe_snipes_and_counts() -> Result<(), Failed> {
    let mut rig = rig(WAIT)?;
    // enemy HP bar as seen by recipes/itopod.lua
    let hp = rig.target.origin.offset(705, 410);
    rig.stub.paint(hp.x, hp.y, "#D93030".parse::<Color>()?);

    let options = rig.settings.options_for(RunMode::ItopodSniping);
    let rx = rig.start(RunMode::ItopodSniping, LuaRecipe::factory(rig.settings.recipes_dir.clone(), options))?;

    let stats_path: PathBuf = std::env::temp_dir().join(format!("nguctl-scenario-{}.json", std::process::id()));
    let mut store = StatsStore::load(&stats_path);
    let mut view = ProgressView::default();
    let deadline = Instant::now() + WAIT;
    while view.milestones < 3 {
        check(Instant::now() < deadline, "three snipes in time")?;
        if let Some(ev) = rx.recv_timeout(Duration::from_millis(50)) {
            store.stats.record(&ev);
            view.apply(&ev);
        }
    }
    rig.runner.stop()?;
    for ev in rx.drain() {
        store.stats.record(&ev);
        view.apply(&ev);
    }

    check(view.counter("kills") == Some(store.stats.itopod_snipes), "kills match snipes")?;
    check(!rig.stub.activated().is_empty(), "window activated")?;
    store.save()?;
    let reloaded = StatsStore::load(&stats_path);
    std::fs::remove_file(&stats_path).ok();
    check(reloaded.stats == store.stats, "stats survive a reload")?;
    check(
        matches!(view.exit, Some(ExitReason::Cancelled)),
        "lua run ends cancelled",
    )?;
    check(store.stats.itopod_snipes >= 3, "at least three snipes")
}

fn main() {
    let args = Arguments::from_args();
    let tests = vec![
        Trial::test("discovery_finds_game", discovery_finds_game),
        Trial::test("questing_progress_reaches_full", questing_progress_reaches_full),
        Trial::test("pause_holds_primitives", pause_holds_primitives),
        Trial::test("pause_times_out_on_slow_primitive", pause_times_out_on_slow_primitive),
        Trial::test("stop_interrupts_long_idle", stop_interrupts_long_idle),
        Trial::test("failed_recipe_reports_and_blocks_pause", failed_recipe_reports_and_blocks_pause),
        Trial::test("itopod_recipe_snipes_and_counts", itopod_recipe_snipes_and_counts),
    ];
    libtest_mimic::run(&args, tests).exit();
}
