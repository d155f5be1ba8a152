use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::logger;
use crate::types::{Color, Rect, RunMode};

/// Value of one recipe option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Text(String),
    Slots(Vec<u32>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Bool,
    Int,
    Text,
    /// Inventory slot numbers, 1-based over the 12x5 grid.
    Slots,
}

impl OptionValue {
    pub fn kind(&self) -> OptionKind {
        match self {
            OptionValue::Bool(_) => OptionKind::Bool,
            OptionValue::Int(_) => OptionKind::Int,
            OptionValue::Text(_) => OptionKind::Text,
            OptionValue::Slots(_) => OptionKind::Slots,
        }
    }
}

pub const INVENTORY_SLOTS: u32 = 60;

const BOTH: &[RunMode] = &[RunMode::Questing, RunMode::ItopodSniping];
const QUESTING: &[RunMode] = &[RunMode::Questing];

pub struct OptionSpec {
    pub name: &'static str,
    pub kind: OptionKind,
    pub modes: &'static [RunMode],
    pub default: fn() -> OptionValue,
}

/// Every option a recipe can read. Persistence goes through this table only.
pub static OPTION_SCHEMA: &[OptionSpec] = &[
    // minutes when questing, seconds when sniping
    OptionSpec { name: "duration", kind: OptionKind::Int, modes: BOTH, default: || OptionValue::Int(0) },
    OptionSpec { name: "force_zone", kind: OptionKind::Bool, modes: QUESTING, default: || OptionValue::Bool(false) },
    OptionSpec { name: "force_zone_name", kind: OptionKind::Text, modes: QUESTING, default: || OptionValue::Text(String::new()) },
    OptionSpec { name: "major_quests", kind: OptionKind::Bool, modes: QUESTING, default: || OptionValue::Bool(true) },
    OptionSpec { name: "subcontract", kind: OptionKind::Bool, modes: QUESTING, default: || OptionValue::Bool(false) },
    OptionSpec { name: "swap_gear", kind: OptionKind::Bool, modes: BOTH, default: || OptionValue::Bool(false) },
    OptionSpec { name: "gear_source", kind: OptionKind::Text, modes: BOTH, default: || OptionValue::Text("equipment".into()) },
    OptionSpec { name: "boost_inventory", kind: OptionKind::Bool, modes: BOTH, default: || OptionValue::Bool(false) },
    OptionSpec { name: "boost_slots", kind: OptionKind::Slots, modes: BOTH, default: || OptionValue::Slots(Vec::new()) },
    OptionSpec { name: "merge_inventory", kind: OptionKind::Bool, modes: BOTH, default: || OptionValue::Bool(false) },
    OptionSpec { name: "merge_slots", kind: OptionKind::Slots, modes: BOTH, default: || OptionValue::Slots(Vec::new()) },
];

pub fn option_spec(name: &str) -> Option<&'static OptionSpec> {
    OPTION_SCHEMA.iter().find(|s| s.name == name)
}

fn check_option(name: &str, value: &OptionValue) -> Result<()> {
    let Some(spec) = option_spec(name) else {
        bail!("unknown option '{}'", name);
    };
    if value.kind() != spec.kind {
        bail!("option '{}' expects {:?}, got {:?}", name, spec.kind, value.kind());
    }
    match value {
        OptionValue::Slots(slots) => {
            if let Some(bad) = slots.iter().find(|s| **s == 0 || **s > INVENTORY_SLOTS) {
                bail!("option '{}': slot {} outside 1..={}", name, bad, INVENTORY_SLOTS);
            }
        }
        OptionValue::Text(text) if name == "gear_source" => {
            if text != "equipment" && text != "cube" {
                bail!("option 'gear_source' must be 'equipment' or 'cube'");
            }
        }
        _ => {}
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Case-insensitive substring of the game window's title.
    pub window_title: String,
    /// Color of the game's top-left corner pixel.
    pub signature_color: Color,
    pub search_region: Rect,
    pub pause_timeout_ms: u64,
    pub stop_timeout_ms: u64,
    pub recipes_dir: PathBuf,
    pub last_mode: RunMode,
    options: BTreeMap<String, OptionValue>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            window_title: "play ngu idle".into(),
            signature_color: Color::rgb(0x00, 0x04, 0x08),
            search_region: Rect::new(0, 0, 400, 600),
            pause_timeout_ms: 1000,
            stop_timeout_ms: 2000,
            recipes_dir: PathBuf::from("recipes"),
            last_mode: RunMode::Questing,
            options: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Never fails: an absent file gives defaults, and bad entries are
    /// logged and replaced.
    pub fn load(path: &Path) -> Self {
        let mut settings: Settings = match std::fs::read_to_string(path) {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                logger::warn(&format!("ignoring unreadable {}: {}", path.display(), e));
                Settings::default()
            }),
            Err(_) => Settings::default(),
        };

        let r = settings.search_region;
        if r.x2 <= r.x1 || r.y2 <= r.y1 {
            logger::warn(&format!("invalid search_region {:?}, using default", r));
            settings.search_region = Settings::default().search_region;
        }
        settings.options.retain(|name, value| match check_option(name, value) {
            Ok(()) => true,
            Err(e) => {
                logger::warn(&format!("dropping setting: {}", e));
                false
            }
        });
        settings
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    pub fn pause_timeout(&self) -> Duration {
        Duration::from_millis(self.pause_timeout_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    /// Stored value, or the schema default. `None` for unknown names.
    pub fn option(&self, name: &str) -> Option<OptionValue> {
        let spec = option_spec(name)?;
        Some(self.options.get(name).cloned().unwrap_or_else(spec.default))
    }

    pub fn set_option(&mut self, name: &str, value: OptionValue) -> Result<()> {
        check_option(name, &value)?;
        self.options.insert(name.to_string(), value);
        Ok(())
    }

    /// All options that apply to `mode`, in schema order.
    pub fn options_for(&self, mode: RunMode) -> Vec<(&'static str, OptionValue)> {
        OPTION_SCHEMA
            .iter()
            .filter(|spec| spec.modes.contains(&mode))
            .map(|spec| {
                let value = self.options.get(spec.name).cloned().unwrap_or_else(spec.default);
                (spec.name, value)
            })
            .collect()
    }
}
