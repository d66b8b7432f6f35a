//! Structured options to command line.

use std::collections::{BTreeMap, HashMap, HashSet};

use super::error::CommandError;
use super::escape::Platform;
use super::table::{CommandTable, FlagTemplate, INDEX, SETTING};

/// Value assigned to a structured option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    /// Null or false: the option is left out.
    Absent,
    /// Emit the flag with no value.
    Flag,
    /// A single value; an empty string behaves like [`OptionValue::Flag`].
    Value(String),
    /// Repeatable flag, or positional values for a multi-placeholder template.
    List(Vec<String>),
    /// Per-stream values keyed by stream index.
    Indexed(BTreeMap<usize, String>),
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::Value(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::Value(value)
    }
}

impl From<bool> for OptionValue {
    fn from(enabled: bool) -> Self {
        if enabled {
            Self::Flag
        } else {
            Self::Absent
        }
    }
}

impl From<u32> for OptionValue {
    fn from(value: u32) -> Self {
        Self::Value(value.to_string())
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        Self::Value(value.to_string())
    }
}

impl<T: Into<OptionValue>> From<Option<T>> for OptionValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Absent)
    }
}

impl From<Vec<String>> for OptionValue {
    fn from(values: Vec<String>) -> Self {
        Self::List(values)
    }
}

impl From<BTreeMap<usize, String>> for OptionValue {
    fn from(values: BTreeMap<usize, String>) -> Self {
        Self::Indexed(values)
    }
}

/// One flag occurrence on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandArg {
    pub flag: String,
    pub value: Option<String>,
}

/// Ordered list of flags and their values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandLine {
    args: Vec<CommandArg>,
}

impl CommandLine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a flag; `None` renders the flag alone.
    pub fn push(&mut self, flag: impl Into<String>, value: Option<&str>) -> &mut Self {
        self.args.push(CommandArg {
            flag: flag.into(),
            value: value.map(str::to_string),
        });
        self
    }

    pub fn extend(&mut self, other: &CommandLine) -> &mut Self {
        self.args.extend(other.args.iter().cloned());
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandArg> {
        self.args.iter()
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn contains(&self, flag: &str) -> bool {
        self.args.iter().any(|a| a.flag == flag)
    }

    /// Value of the first occurrence of `flag`.
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .find(|a| a.flag == flag)
            .and_then(|a| a.value.as_deref())
    }

    /// Argv form, unescaped.
    pub fn to_args(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.args.len() * 2);
        for arg in &self.args {
            out.push(arg.flag.clone());
            if let Some(ref value) = arg.value {
                out.push(value.clone());
            }
        }
        out
    }

    /// Escaped, space separated form for the given shell.
    pub fn to_shell_string(&self, platform: Platform) -> String {
        self.to_args()
            .iter()
            .map(|a| platform.escape(a))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Builds a [`CommandLine`] from structured options plus raw overrides.
///
/// Precedence, highest first: `removed` flags are suppressed outright, then
/// `additional` commands replace the same flag computed from options.
#[derive(Debug, Clone)]
pub struct CommandAssembler<'t> {
    table: &'t CommandTable,
    options: Vec<(String, OptionValue)>,
    additional: Vec<(String, Option<String>)>,
    removed: HashSet<String>,
}

impl<'t> CommandAssembler<'t> {
    pub fn new(table: &'t CommandTable) -> Self {
        Self {
            table,
            options: Vec::new(),
            additional: Vec::new(),
            removed: HashSet::new(),
        }
    }

    /// Sets a structured option, keeping its first insertion position.
    pub fn set(&mut self, option: impl Into<String>, value: impl Into<OptionValue>) -> &mut Self {
        let option = option.into();
        let value = value.into();
        match self.options.iter_mut().find(|(name, _)| *name == option) {
            Some(slot) => slot.1 = value,
            None => self.options.push((option, value)),
        }
        self
    }

    /// Adds a raw command that overrides the same flag from options.
    pub fn add_command(&mut self, flag: impl Into<String>, value: Option<&str>) -> &mut Self {
        let flag = flag.into();
        let value = value.map(str::to_string);
        match self.additional.iter_mut().find(|(name, _)| *name == flag) {
            Some(slot) => slot.1 = value,
            None => self.additional.push((flag, value)),
        }
        self
    }

    /// Suppresses a flag regardless of where it comes from.
    pub fn remove_command(&mut self, flag: impl Into<String>) -> &mut Self {
        self.removed.insert(flag.into());
        self
    }

    /// Renders the options into a command line.
    pub fn assemble(&self) -> Result<CommandLine, CommandError> {
        let mut computed = Vec::new();
        for (option, value) in &self.options {
            let template = self
                .table
                .get(option)
                .ok_or_else(|| CommandError::UnknownOption {
                    option: option.clone(),
                })?;
            expand(option, template, value, &mut computed)?;
        }

        let overridden: HashSet<&str> = self
            .additional
            .iter()
            .map(|(f, _)| CommandTable::flag_key(f))
            .collect();
        let removed: HashSet<&str> = self
            .removed
            .iter()
            .map(|f| CommandTable::flag_key(f))
            .collect();
        let merged = computed
            .into_iter()
            .filter(|arg| !overridden.contains(CommandTable::flag_key(&arg.flag)))
            .chain(self.additional.iter().map(|(flag, value)| CommandArg {
                flag: flag.clone(),
                value: value.clone(),
            }))
            .filter(|arg| !removed.contains(CommandTable::flag_key(&arg.flag)));

        Ok(aggregate_filters(merged))
    }
}

fn expand(
    option: &str,
    template: &FlagTemplate,
    value: &OptionValue,
    out: &mut Vec<CommandArg>,
) -> Result<(), CommandError> {
    let single = |setting: &str| -> Result<CommandArg, CommandError> {
        if template.is_indexed() {
            return Err(CommandError::invalid_value(
                option,
                "per-stream option needs indexed values",
            ));
        }
        let value = match template.value {
            Some(ref v) if !setting.is_empty() => Some(v.replace(SETTING, setting)),
            _ => None,
        };
        Ok(CommandArg {
            flag: template.flag.clone(),
            value,
        })
    };

    match value {
        OptionValue::Absent => {}
        OptionValue::Flag => out.push(single("")?),
        OptionValue::Value(setting) => {
            let slots = template.setting_slots();
            if slots > 1 {
                return Err(CommandError::invalid_value(
                    option,
                    format!("expected {} values, got 1", slots),
                ));
            }
            out.push(single(setting)?);
        }
        OptionValue::List(items) => match template.setting_slots() {
            0 => {
                return Err(CommandError::invalid_value(option, "switch takes no values"));
            }
            1 => {
                for item in items {
                    out.push(single(item)?);
                }
            }
            slots => {
                if items.len() != slots {
                    return Err(CommandError::invalid_value(
                        option,
                        format!("expected {} values, got {}", slots, items.len()),
                    ));
                }
                let mut rendered = template.value.clone().unwrap_or_default();
                for item in items {
                    rendered = rendered.replacen(SETTING, item, 1);
                }
                out.push(CommandArg {
                    flag: template.flag.clone(),
                    value: Some(rendered),
                });
            }
        },
        OptionValue::Indexed(streams) => {
            if !template.is_indexed() {
                return Err(CommandError::invalid_value(
                    option,
                    "option does not take per-stream values",
                ));
            }
            for (index, setting) in streams {
                let index = index.to_string();
                out.push(CommandArg {
                    flag: template.flag.replace(INDEX, &index),
                    value: template
                        .value
                        .as_ref()
                        .map(|v| v.replace(INDEX, &index).replace(SETTING, setting)),
                });
            }
        }
    }
    Ok(())
}

/// Joins every value given to the same filter flag into one occurrence.
fn aggregate_filters(args: impl Iterator<Item = CommandArg>) -> CommandLine {
    let mut line = CommandLine::new();
    let mut positions: HashMap<&'static str, usize> = HashMap::new();

    for arg in args {
        if let Some(group) = CommandTable::filter_group(&arg.flag) {
            if let Some(value) = arg.value {
                if let Some(&pos) = positions.get(group) {
                    let existing = &mut line.args[pos];
                    match existing.value {
                        Some(ref mut chain) => {
                            chain.push(',');
                            chain.push_str(&value);
                        }
                        None => existing.value = Some(value),
                    }
                } else {
                    positions.insert(group, line.args.len());
                    line.args.push(CommandArg {
                        flag: arg.flag,
                        value: Some(value),
                    });
                }
                continue;
            }
        }
        line.args.push(arg);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valueless_raw_command() {
        let table = CommandTable::default();
        let mut assembler = CommandAssembler::new(&table);
        assembler.add_command("-an", None);

        let line = assembler.assemble().unwrap();
        assert_eq!(line.to_shell_string(Platform::Posix), "-an");
        assert_eq!(line.to_args(), vec!["-an"]);
    }

    #[test]
    fn test_override_wins_and_is_emitted_once() {
        let table = CommandTable::default();
        let mut assembler = CommandAssembler::new(&table);
        assembler
            .set("video_codec", "libx264")
            .add_command("-codec:v", Some("copy"));

        let line = assembler.assemble().unwrap();
        assert_eq!(line.to_args(), vec!["-codec:v", "copy"]);
    }

    #[test]
    fn test_switch_from_options_and_override_emitted_once() {
        let table = CommandTable::default();
        let mut assembler = CommandAssembler::new(&table);
        assembler.set("disable_audio", true).add_command("-an", None);

        let line = assembler.assemble().unwrap();
        assert_eq!(line.to_args(), vec!["-an"]);
    }

    #[test]
    fn test_removed_flag_is_suppressed() {
        let table = CommandTable::default();
        let mut assembler = CommandAssembler::new(&table);
        assembler
            .set("audio_codec", "aac")
            .add_command("-sn", None)
            .remove_command("-codec:a")
            .remove_command("-sn");

        assert!(assembler.assemble().unwrap().is_empty());
    }

    #[test]
    fn test_absent_values_are_omitted() {
        let table = CommandTable::default();
        let mut assembler = CommandAssembler::new(&table);
        assembler
            .set("video_bitrate", OptionValue::Absent)
            .set("disable_audio", false)
            .set("audio_bitrate", Option::<String>::None);

        assert!(assembler.assemble().unwrap().is_empty());
    }

    #[test]
    fn test_empty_string_emits_flag_only() {
        let table = CommandTable::default();
        let mut assembler = CommandAssembler::new(&table);
        assembler.set("video_codec", "");

        assert_eq!(assembler.assemble().unwrap().to_args(), vec!["-codec:v"]);
    }

    #[test]
    fn test_filters_are_aggregated() {
        let table = CommandTable::default();
        let mut assembler = CommandAssembler::new(&table);
        assembler
            .set(
                "video_filter",
                vec!["scale=640:-2".to_string(), "fps=25".to_string()],
            )
            .set("video_codec", "libx264")
            .set("video_rotate", 1u32)
            .set("audio_volume", "0.5")
            .set("audio_filter", "aresample=44100");

        let line = assembler.assemble().unwrap();
        assert_eq!(
            line.to_args(),
            vec![
                "-vf",
                "scale=640:-2,fps=25,transpose=1",
                "-codec:v",
                "libx264",
                "-af",
                "volume=0.5,aresample=44100",
            ]
        );
    }

    #[test]
    fn test_repeatable_flag_expands() {
        let table = CommandTable::default();
        let mut assembler = CommandAssembler::new(&table);
        assembler.set(
            "metadata",
            vec!["title=My Song".to_string(), "artist=Someone".to_string()],
        );

        let line = assembler.assemble().unwrap();
        assert_eq!(
            line.to_shell_string(Platform::Posix),
            "-metadata 'title=My Song' -metadata artist=Someone"
        );
    }

    #[test]
    fn test_positional_placeholders() {
        let table = CommandTable::default();
        let mut assembler = CommandAssembler::new(&table);
        assembler.set("video_dimensions", vec!["640".to_string(), "480".to_string()]);
        assert_eq!(assembler.assemble().unwrap().to_args(), vec!["-s", "640x480"]);

        assembler.set("video_dimensions", vec!["640".to_string()]);
        assert!(matches!(
            assembler.assemble(),
            Err(CommandError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_single_value_for_two_slot_template_is_rejected() {
        let table = CommandTable::default();
        let mut assembler = CommandAssembler::new(&table);
        assembler.set("video_dimensions", "640x480");
        assert_eq!(
            assembler.assemble(),
            Err(CommandError::invalid_value(
                "video_dimensions",
                "expected 2 values, got 1"
            ))
        );
    }

    #[test]
    fn test_filter_aliases_are_joined_into_one_occurrence() {
        let mut table = CommandTable::default();
        table.register("video_filter_long", "-filter:v <setting>");
        let mut assembler = CommandAssembler::new(&table);
        assembler
            .set("video_filter", "scale=640:-2")
            .set("video_filter_long", "fps=25")
            .add_command("-filter:a", Some("volume=2"))
            .add_command("-af", Some("aresample=44100"));

        assert_eq!(
            assembler.assemble().unwrap().to_args(),
            vec!["-vf", "scale=640:-2,fps=25", "-filter:a", "volume=2,aresample=44100"]
        );
    }

    #[test]
    fn test_indexed_values() {
        let table = CommandTable::default();
        let mut assembler = CommandAssembler::new(&table);
        let streams: BTreeMap<usize, String> =
            [(0, "aac".to_string()), (1, "libmp3lame".to_string())].into();
        assembler.set("audio_codec_stream", streams);

        assert_eq!(
            assembler.assemble().unwrap().to_args(),
            vec!["-codec:a:0", "aac", "-codec:a:1", "libmp3lame"]
        );
    }

    #[test]
    fn test_indexed_option_rejects_plain_value() {
        let table = CommandTable::default();
        let mut assembler = CommandAssembler::new(&table);
        assembler.set("audio_codec_stream", "aac");
        assert!(assembler.assemble().is_err());
    }

    #[test]
    fn test_unknown_option_is_fatal() {
        let table = CommandTable::default();
        let mut assembler = CommandAssembler::new(&table);
        assembler.set("teleport", "now");

        assert_eq!(
            assembler.assemble().unwrap_err(),
            CommandError::UnknownOption {
                option: "teleport".to_string()
            }
        );
    }

    #[test]
    fn test_set_keeps_position_and_replaces_value() {
        let table = CommandTable::default();
        let mut assembler = CommandAssembler::new(&table);
        assembler
            .set("video_codec", "libx264")
            .set("audio_codec", "aac")
            .set("video_codec", "libx265");

        assert_eq!(
            assembler.assemble().unwrap().to_args(),
            vec!["-codec:v", "libx265", "-codec:a", "aac"]
        );
    }

    #[test]
    fn test_command_line_lookup() {
        let mut line = CommandLine::new();
        line.push("-progress", Some("/tmp/p.txt")).push("-y", None);
        assert!(line.contains("-y"));
        assert_eq!(line.value_of("-progress"), Some("/tmp/p.txt"));
        assert_eq!(line.value_of("-y"), None);
        assert_eq!(line.len(), 2);
    }
}
