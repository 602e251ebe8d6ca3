//! Read-merge-write of the daemon's `settings.toml`.
//!
//! The file is shared with the daemon and with manual edits. Reads go through `toml` into typed
//! values. Writes re-read it first and edit only the managed keys of `fas`, `dnd` and `cpu` in a
//! `toml_edit` document, so comments, formatting and every other key survive byte for byte.
//! There is no lock and no atomic rename, so a concurrent writer between the re-read and the
//! overwrite loses its change.

use std::path::Path;

use serde::{Deserialize, Serialize};
use toml::{Table, Value};
use toml_edit::{DocumentMut, Item, Table as EditTable, Value as EditValue};
use tracing::{debug, info, warn};

use crate::app::daemon::{DaemonClient, DaemonTransport, LogLevel, ProfileMode};
use crate::app::error::{AppError, ErrorKind};
use crate::app::paths::shell_quote;
use crate::app::shell::{CommandExecutor, ExecOptions};

pub const DEFAULT_TARGET_FPS: u32 = 60;
pub const DEFAULT_GOVERNOR: &str = "schedutil";
pub const DEFAULT_GAME_GOVERNOR: &str = "performance";

const SECTION_FAS: &str = "fas";
const SECTION_DND: &str = "dnd";
const SECTION_CPU: &str = "cpu";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FasSettings {
    pub enabled: bool,
    pub default_mode: ProfileMode,
    pub target_fps: u32,
}

impl Default for FasSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            default_mode: ProfileMode::Performance,
            target_fps: DEFAULT_TARGET_FPS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DndSettings {
    pub default_enable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CpuSettings {
    pub default_governor: String,
    pub game_governor: String,
}

impl Default for CpuSettings {
    fn default() -> Self {
        Self {
            default_governor: DEFAULT_GOVERNOR.to_string(),
            game_governor: DEFAULT_GAME_GOVERNOR.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SettingsValues {
    pub fas: FasSettings,
    pub dnd: DndSettings,
    pub cpu: CpuSettings,
}

/// Typed values plus the parsed table they came from.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SettingsDocument {
    pub values: SettingsValues,
    pub raw: Table,
}

/// A frame-rate value as the caller supplied it, before coercion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FpsInput {
    Number(i64),
    Float(f64),
    Text(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SettingsPatch {
    pub fas_enabled: Option<bool>,
    pub fas_mode: Option<ProfileMode>,
    pub target_fps: Option<FpsInput>,
    pub dnd_default_enable: Option<bool>,
    pub default_governor: Option<String>,
    pub game_governor: Option<String>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        *self == SettingsPatch::default()
    }
}

/// Leading integer of `text`: optional sign, then digits. Anything after the digits is ignored.
fn leading_integer(text: &str) -> Option<i64> {
    let trimmed = text.trim_start();
    let (negative, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let end = rest
        .find(|ch: char| !ch.is_ascii_digit())
        .unwrap_or(rest.len());
    let value = rest[..end].parse::<i64>().ok()?;
    Some(if negative { -value } else { value })
}

/// Integers keep their value, floats are truncated and strings contribute their leading integer
/// (`"90fps"` is 90). Anything else, or a non-positive result, becomes 60.
pub fn coerce_target_fps(input: Option<&FpsInput>) -> u32 {
    let parsed = match input {
        Some(FpsInput::Number(value)) => Some(*value),
        Some(FpsInput::Float(value)) if value.is_finite() => Some(value.trunc() as i64),
        Some(FpsInput::Text(text)) => leading_integer(text),
        _ => None,
    };
    parsed
        .filter(|value| *value > 0)
        .and_then(|value| u32::try_from(value).ok())
        .unwrap_or(DEFAULT_TARGET_FPS)
}

impl SettingsValues {
    pub fn with_patch(&self, patch: &SettingsPatch) -> SettingsValues {
        let mut next = self.clone();
        if let Some(enabled) = patch.fas_enabled {
            next.fas.enabled = enabled;
        }
        if let Some(mode) = patch.fas_mode {
            next.fas.default_mode = mode;
        }
        if let Some(fps) = &patch.target_fps {
            next.fas.target_fps = coerce_target_fps(Some(fps));
        }
        if let Some(enabled) = patch.dnd_default_enable {
            next.dnd.default_enable = enabled;
        }
        if let Some(gov) = &patch.default_governor {
            next.cpu.default_governor = gov.trim().to_string();
        }
        if let Some(gov) = &patch.game_governor {
            next.cpu.game_governor = gov.trim().to_string();
        }
        next
    }
}

/// Section value first, then a quoted top-level `"section.key"` entry.
fn lookup<'a>(table: &'a Table, section: &str, key: &str) -> Option<&'a Value> {
    table
        .get(section)
        .and_then(Value::as_table)
        .and_then(|inner| inner.get(key))
        .or_else(|| table.get(&format!("{section}.{key}")))
}

fn fps_input_from_value(value: &Value) -> Option<FpsInput> {
    match value {
        Value::Integer(number) => Some(FpsInput::Number(*number)),
        Value::Float(number) => Some(FpsInput::Float(*number)),
        Value::String(text) => Some(FpsInput::Text(text.clone())),
        _ => None,
    }
}

fn string_or(table: &Table, section: &str, key: &str, fallback: &str) -> String {
    lookup(table, section, key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

pub fn values_from_table(table: &Table) -> SettingsValues {
    let defaults = SettingsValues::default();

    SettingsValues {
        fas: FasSettings {
            enabled: lookup(table, SECTION_FAS, "enabled")
                .and_then(Value::as_bool)
                .unwrap_or(defaults.fas.enabled),
            default_mode: lookup(table, SECTION_FAS, "default_mode")
                .and_then(Value::as_str)
                .and_then(|mode| mode.parse::<ProfileMode>().ok())
                .unwrap_or(defaults.fas.default_mode),
            target_fps: coerce_target_fps(
                lookup(table, SECTION_FAS, "target_fps")
                    .and_then(fps_input_from_value)
                    .as_ref(),
            ),
        },
        dnd: DndSettings {
            default_enable: lookup(table, SECTION_DND, "default_enable")
                .and_then(Value::as_bool)
                .unwrap_or(defaults.dnd.default_enable),
        },
        cpu: CpuSettings {
            default_governor: string_or(
                table,
                SECTION_CPU,
                "default_governor",
                &defaults.cpu.default_governor,
            ),
            game_governor: string_or(
                table,
                SECTION_CPU,
                "game_governor",
                &defaults.cpu.game_governor,
            ),
        },
    }
}

/// Parse failures degrade to an empty document so callers always get defaults.
pub fn document_from_text(text: &str, trace_id: &str) -> SettingsDocument {
    let raw = match toml::from_str::<Table>(text) {
        Ok(table) => table,
        Err(err) => {
            warn!(trace_id = %trace_id, error = %err, "settings.toml is not valid TOML, using defaults");
            Table::new()
        }
    };
    SettingsDocument {
        values: values_from_table(&raw),
        raw,
    }
}

/// Managed keys per section, in the order they are written when missing.
fn managed_entries(values: &SettingsValues) -> [(&'static str, Vec<(&'static str, EditValue)>); 3] {
    [
        (
            SECTION_FAS,
            vec![
                ("enabled", EditValue::from(values.fas.enabled)),
                ("default_mode", EditValue::from(values.fas.default_mode.as_str())),
                ("target_fps", EditValue::from(i64::from(values.fas.target_fps))),
            ],
        ),
        (
            SECTION_DND,
            vec![("default_enable", EditValue::from(values.dnd.default_enable))],
        ),
        (
            SECTION_CPU,
            vec![
                ("default_governor", EditValue::from(values.cpu.default_governor.as_str())),
                ("game_governor", EditValue::from(values.cpu.game_governor.as_str())),
            ],
        ),
    ]
}

fn same_scalar(current: &EditValue, next: &EditValue) -> bool {
    match (current, next) {
        (EditValue::Boolean(a), EditValue::Boolean(b)) => a.value() == b.value(),
        (EditValue::Integer(a), EditValue::Integer(b)) => a.value() == b.value(),
        (EditValue::String(a), EditValue::String(b)) => a.value() == b.value(),
        _ => false,
    }
}

/// Unchanged values keep their exact text; changed ones keep the surrounding whitespace and
/// trailing comment.
fn replace_value(slot: &mut EditValue, next: EditValue) {
    if same_scalar(slot, &next) {
        return;
    }
    let decor = slot.decor().clone();
    *slot = next;
    *slot.decor_mut() = decor;
}

fn merge_section(document: &mut DocumentMut, section: &str, entries: Vec<(&'static str, EditValue)>) {
    let item = document
        .entry(section)
        .or_insert(Item::Table(EditTable::new()));

    if let Some(inline) = item.as_inline_table_mut() {
        for (key, next) in entries {
            match inline.get_mut(key) {
                Some(slot) => replace_value(slot, next),
                None => {
                    inline.insert(key, next);
                }
            }
        }
        return;
    }

    if !item.is_table() {
        *item = Item::Table(EditTable::new());
    }
    if let Some(table) = item.as_table_mut() {
        for (key, next) in entries {
            match table.get_mut(key).and_then(Item::as_value_mut) {
                Some(slot) => replace_value(slot, next),
                None => {
                    table.insert(key, Item::Value(next));
                }
            }
        }
    }
}

/// Writes the managed keys into `document`. Every other key, section and comment is untouched.
pub fn merge_into_document(document: &mut DocumentMut, values: &SettingsValues) {
    for (section, entries) in managed_entries(values) {
        merge_section(document, section, entries);
    }
}

/// Unparsable text starts an empty document, as on the read path.
fn editable_document(text: &str, trace_id: &str) -> DocumentMut {
    text.parse::<DocumentMut>().unwrap_or_else(|err| {
        warn!(trace_id = %trace_id, error = %err, "settings.toml is not valid TOML, rewriting it");
        DocumentMut::new()
    })
}

fn read_settings_text<E: CommandExecutor>(
    executor: &E,
    path: &Path,
    trace_id: &str,
) -> Result<String, AppError> {
    let command = format!("cat {}", shell_quote(&path.to_string_lossy()));
    executor.execute(&command, &ExecOptions::default(), trace_id)
}

/// Never fails: unreadable or malformed files yield defaults.
pub fn load_settings<E: CommandExecutor>(
    executor: &E,
    path: &Path,
    trace_id: &str,
) -> SettingsDocument {
    match read_settings_text(executor, path, trace_id) {
        Ok(text) => document_from_text(&text, trace_id),
        Err(err) => {
            warn!(trace_id = %trace_id, path = %path.display(), error = %err, "failed to read settings");
            SettingsDocument::default()
        }
    }
}

/// Applies `patch` over `current`, merges the result into a fresh read of the file and
/// overwrites it. Returns the values that were written.
pub fn save_settings<E: CommandExecutor>(
    executor: &E,
    path: &Path,
    patch: &SettingsPatch,
    current: &SettingsValues,
    trace_id: &str,
) -> Result<SettingsValues, AppError> {
    let mut document = match read_settings_text(executor, path, trace_id) {
        Ok(text) => editable_document(&text, trace_id),
        // A missing file is not a reason to give up; anything slower or stranger is.
        Err(err) if err.kind == ErrorKind::NonZeroExit => {
            debug!(trace_id = %trace_id, error = %err, "settings file unreadable, starting empty");
            DocumentMut::new()
        }
        Err(err) => return Err(err),
    };

    let values = current.with_patch(patch);
    merge_into_document(&mut document, &values);
    let rendered = document.to_string();

    let command = format!(
        "printf '%s\\n' {} > {}",
        shell_quote(rendered.trim_end()),
        shell_quote(&path.to_string_lossy())
    );
    executor.execute(&command, &ExecOptions::default(), trace_id)?;
    info!(trace_id = %trace_id, path = %path.display(), "settings saved");
    Ok(values)
}

/// Values the daemon reports at runtime. `None` means the query failed or was not answered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LiveSettings {
    pub target_fps: Option<u32>,
    pub log_level: Option<LogLevel>,
    pub supported_refresh_rates: Option<Vec<u32>>,
}

/// What the settings screen shows: file values with the daemon's live values on top.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SettingsView {
    pub values: SettingsValues,
    pub debug_mode: bool,
    pub supported_refresh_rates: Vec<u32>,
}

/// Each query stands alone; one failing does not skip the others.
pub fn fetch_live_settings<T: DaemonTransport>(
    daemon: &DaemonClient<T>,
    trace_id: &str,
) -> LiveSettings {
    let target_fps = daemon
        .current_fps(trace_id)
        .map_err(|err| warn!(trace_id = %trace_id, error = %err, "GET_FPS failed"))
        .ok();
    let log_level = daemon
        .status(trace_id)
        .map_err(|err| warn!(trace_id = %trace_id, error = %err, "STATUS failed"))
        .ok()
        .and_then(|status| status.log_level);
    let supported_refresh_rates = daemon
        .supported_rates(trace_id)
        .map_err(|err| warn!(trace_id = %trace_id, error = %err, "GET_SUPPORTED_RATES failed"))
        .ok();

    LiveSettings {
        target_fps,
        log_level,
        supported_refresh_rates,
    }
}

/// The daemon wins whenever it reported a value.
pub fn overlay_live(values: &SettingsValues, live: &LiveSettings) -> SettingsView {
    let mut values = values.clone();
    if let Some(fps) = live.target_fps.filter(|fps| *fps > 0) {
        values.fas.target_fps = fps;
    }
    SettingsView {
        values,
        debug_mode: live.log_level == Some(LogLevel::Debug),
        supported_refresh_rates: live.supported_refresh_rates.clone().unwrap_or_default(),
    }
}
