use std::path::{Path, PathBuf};
use std::time::Duration;

use mlua::prelude::*;

use crate::error::{Result, RunError};
use crate::input::InputController;
use crate::logger;
use crate::progress::{Milestone, ProgressSender};
use crate::runner::{Recipe, RecipeFactory};
use crate::settings::OptionValue;
use crate::sleep;
use crate::types::{Color, RunMode};

/// `win` userdata handed to `start(win, opts)`.
struct LuaWindow {
    input: InputController,
}

fn parse_color(hex: &str) -> LuaResult<Color> {
    hex.parse::<Color>().map_err(LuaError::RuntimeError)
}

impl LuaUserData for LuaWindow {
    fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("pixel", |_, this, (x, y): (i32, i32)| {
            let color = this.input.read_pixel(x, y).map_err(LuaError::external)?;
            Ok(color.to_string())
        });

        methods.add_method("check", |_, this, (x, y, hex, tol): (i32, i32, String, Option<u8>)| {
            let expected = parse_color(&hex)?;
            this.input
                .check_pixel_color(x, y, expected, tol.unwrap_or(0))
                .map_err(LuaError::external)
        });

        methods.add_method(
            "search",
            |_, this, (hex, x1, y1, x2, y2): (String, i32, i32, i32, i32)| {
                let color = parse_color(&hex)?;
                if x2 <= x1 || y2 <= y1 {
                    return Err(LuaError::RuntimeError(format!(
                        "empty search region ({}, {}, {}, {})",
                        x1, y1, x2, y2
                    )));
                }
                let found = this
                    .input
                    .pixel_search(color, x1, y1, x2, y2)
                    .map_err(LuaError::external)?;
                Ok(match found {
                    Some(p) => (Some(p.x), Some(p.y)),
                    None => (None, None),
                })
            },
        );

        methods.add_method("click", |_, this, (x, y): (i32, i32)| {
            this.input.click(x, y).map_err(LuaError::external)
        });

        methods.add_method("activate", |_, this, ()| {
            this.input.activate().map_err(LuaError::external)
        });
    }
}

/// A recipe script running in its own Lua VM.
pub struct LuaRecipe {
    lua: Lua,
    recipe_key: LuaRegistryKey,
    name: String,
}

fn lua_err(e: LuaError) -> RunError {
    RunError::Recipe(e.to_string())
}

impl LuaRecipe {
    /// Factory that loads `<dir>/<script for mode>` on the worker thread.
    pub fn factory(dir: PathBuf, options: Vec<(&'static str, OptionValue)>) -> RecipeFactory {
        Box::new(move |mode: RunMode, input: &InputController, progress: &ProgressSender| {
            let recipe = LuaRecipe::load(&dir, mode, &options, input, progress)?;
            Ok(Box::new(recipe) as Box<dyn Recipe>)
        })
    }

    pub fn load(
        dir: &Path,
        mode: RunMode,
        options: &[(&'static str, OptionValue)],
        input: &InputController,
        progress: &ProgressSender,
    ) -> Result<Self> {
        let path = dir.join(mode.script_name());
        let code = std::fs::read_to_string(&path)
            .map_err(|e| RunError::Recipe(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_source(&code, &path.to_string_lossy(), options, input, progress)
    }

    /// Evaluate `code`, which must return a table with a `tick` function,
    /// then call its `start(win, opts)` if present.
    pub fn from_source(
        code: &str,
        name: &str,
        options: &[(&'static str, OptionValue)],
        input: &InputController,
        progress: &ProgressSender,
    ) -> Result<Self> {
        let tag = Path::new(name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let lua = Lua::new();
        register_globals(&lua, &tag, input, progress).map_err(lua_err)?;

        // require() resolves next to the script
        if let Some(dir) = Path::new(name).parent().filter(|d| !d.as_os_str().is_empty()) {
            let dir_str = dir.to_string_lossy();
            let pkg: LuaTable = lua.globals().get("package").map_err(lua_err)?;
            pkg.set("path", format!("{}/?.lua;{}/?/init.lua", dir_str, dir_str))
                .map_err(lua_err)?;
        }

        let table: LuaTable = lua.load(code).set_name(name).eval().map_err(lua_err)?;
        table
            .get::<LuaFunction>("tick")
            .map_err(|_| RunError::Recipe(format!("{} has no tick()", name)))?;

        if let Ok(description) = table.get::<String>("description") {
            logger::info_p("runner", &format!("loaded {}: {}", tag, description));
        }

        if let Ok(start_fn) = table.get::<LuaFunction>("start") {
            let win = lua
                .create_userdata(LuaWindow { input: input.clone() })
                .map_err(lua_err)?;
            let opts = lua.create_table().map_err(lua_err)?;
            for (key, value) in options {
                opts.set(*key, option_to_lua(&lua, value).map_err(lua_err)?)
                    .map_err(lua_err)?;
            }
            start_fn.call::<()>((win, opts)).map_err(lua_err)?;
        }

        let recipe_key = lua.create_registry_value(table).map_err(lua_err)?;
        Ok(Self { lua, recipe_key, name: name.to_string() })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Recipe for LuaRecipe {
    /// `tick()` may return a cooldown in milliseconds; anything else means none.
    fn tick(&mut self, _input: &InputController, _progress: &ProgressSender) -> Result<Option<Duration>> {
        let table: LuaTable = self.lua.registry_value(&self.recipe_key).map_err(lua_err)?;
        let tick_fn: LuaFunction = table.get("tick").map_err(lua_err)?;
        let result: LuaValue = tick_fn.call(()).map_err(lua_err)?;
        match result {
            LuaValue::Integer(ms) if ms > 0 => Ok(Some(Duration::from_millis(ms as u64))),
            LuaValue::Number(ms) if ms.is_finite() && ms > 0.0 => Ok(Some(Duration::from_millis(ms as u64))),
            _ => Ok(None),
        }
    }
}

fn option_to_lua(lua: &Lua, value: &OptionValue) -> LuaResult<LuaValue> {
    Ok(match value {
        OptionValue::Bool(b) => LuaValue::Boolean(*b),
        OptionValue::Int(n) => LuaValue::Integer(*n),
        OptionValue::Text(s) => LuaValue::String(lua.create_string(s)?),
        OptionValue::Slots(slots) => LuaValue::Table(lua.create_sequence_from(slots.iter().copied())?),
    })
}

/// Register the F.* global table into a Lua state.
fn register_globals(lua: &Lua, tag: &str, input: &InputController, progress: &ProgressSender) -> LuaResult<()> {
    let f_table = lua.create_table()?;

    // F.sleep(seconds): jittered and cut short by stop
    let sleeper = input.clone();
    let sleep_fn = lua.create_function(move |_, secs: f64| {
        if !secs.is_finite() || secs > 3600.0 {
            return Err(LuaError::RuntimeError(format!("bad sleep duration {}", secs)));
        }
        sleeper.idle(sleep::jitter(secs)).map_err(LuaError::external)
    })?;
    f_table.set("sleep", sleep_fn)?;

    // F.log(msg), prefixed with the script name
    let tag = tag.to_string();
    if !tag.is_empty() {
        logger::register_prefix(&tag, logger::COLOR_BLUE);
    }
    let log_tag = tag.clone();
    let log_fn = lua.create_function(move |_, msg: String| {
        if log_tag.is_empty() {
            logger::info(&msg);
        } else {
            logger::info_p(&log_tag, &msg);
        }
        Ok(())
    })?;
    f_table.set("log", log_fn)?;

    let tx = progress.clone();
    f_table.set(
        "progress",
        lua.create_function(move |_, fraction: f64| {
            tx.progress(fraction);
            Ok(())
        })?,
    )?;

    let tx = progress.clone();
    f_table.set(
        "task",
        lua.create_function(move |_, text: String| {
            tx.label(&text);
            Ok(())
        })?,
    )?;

    let tx = progress.clone();
    f_table.set(
        "counter",
        lua.create_function(move |_, (name, value): (String, f64)| {
            tx.counter(&name, value.max(0.0) as u64);
            Ok(())
        })?,
    )?;

    let tx = progress.clone();
    f_table.set(
        "rate",
        lua.create_function(move |_, (name, value): (String, f64)| {
            tx.rate(&name, value);
            Ok(())
        })?,
    )?;

    let tx = progress.clone();
    let milestone_tag = tag;
    f_table.set(
        "milestone",
        lua.create_function(move |_, kind: String| {
            match kind.parse::<Milestone>() {
                Ok(kind) => tx.milestone(kind),
                Err(e) => logger::warn_p(&milestone_tag, &format!("ignored: {}", e)),
            }
            Ok(())
        })?,
    )?;

    lua.globals().set("F", f_table)?;
    Ok(())
}
