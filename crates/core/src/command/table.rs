//! Option name to flag template mapping.

use std::collections::HashMap;

/// Placeholder substituted with the option's value.
pub(crate) const SETTING: &str = "<setting>";
/// Placeholder substituted with a stream index.
pub(crate) const INDEX: &str = "<index>";

/// Templates for the options ffwrap knows how to render.
///
/// A template is a flag optionally followed by a value template, e.g.
/// `-codec:a:<index> <setting>`. Templates without a value (`-an`) are
/// switches.
const DEFAULT_TEMPLATES: &[(&str, &str)] = &[
    // Global and input
    ("overwrite", "-y"),
    ("log_level", "-loglevel <setting>"),
    ("threads", "-threads <setting>"),
    ("strictness", "-strict <setting>"),
    ("input_format", "-f <setting>"),
    ("start_time", "-ss <setting>"),
    ("duration", "-t <setting>"),
    ("end_time", "-to <setting>"),
    ("progress_file", "-progress <setting>"),
    // Output
    ("format", "-f <setting>"),
    ("map", "-map <setting>"),
    ("metadata", "-metadata <setting>"),
    ("stream_metadata", "-metadata:s:<index> <setting>"),
    ("filter_complex", "-filter_complex <setting>"),
    // Video
    ("video_codec", "-codec:v <setting>"),
    ("video_codec_stream", "-codec:v:<index> <setting>"),
    ("video_bitrate", "-b:v <setting>"),
    ("video_frame_rate", "-r <setting>"),
    ("video_dimensions", "-s <setting>x<setting>"),
    ("video_aspect_ratio", "-aspect <setting>"),
    ("video_max_frames", "-frames:v <setting>"),
    ("video_quality", "-q:v <setting>"),
    ("video_pixel_format", "-pix_fmt <setting>"),
    ("video_filter", "-vf <setting>"),
    ("video_rotate", "-vf transpose=<setting>"),
    ("disable_video", "-vn"),
    // Audio
    ("audio_codec", "-codec:a <setting>"),
    ("audio_codec_stream", "-codec:a:<index> <setting>"),
    ("audio_bitrate", "-b:a <setting>"),
    ("audio_sample_frequency", "-ar <setting>"),
    ("audio_channels", "-ac <setting>"),
    ("audio_quality", "-q:a <setting>"),
    ("audio_volume", "-af volume=<setting>"),
    ("audio_filter", "-af <setting>"),
    ("disable_audio", "-an"),
    // Subtitles
    ("subtitle_codec", "-codec:s <setting>"),
    ("disable_subtitle", "-sn"),
];

/// Flags whose values ffmpeg only accepts once per output, with the spelling
/// they are grouped under. Repeated assignments are joined into one comma
/// separated chain.
const FILTER_FLAGS: &[(&str, &str)] = &[
    ("-vf", "-vf"),
    ("-filter:v", "-vf"),
    ("-af", "-af"),
    ("-filter:a", "-af"),
    ("-filter_complex", "-filter_complex"),
];

/// A parsed flag template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FlagTemplate {
    pub flag: String,
    pub value: Option<String>,
}

impl FlagTemplate {
    fn parse(template: &str) -> Self {
        match template.split_once(' ') {
            Some((flag, value)) => Self {
                flag: flag.to_string(),
                value: Some(value.to_string()),
            },
            None => Self {
                flag: template.to_string(),
                value: None,
            },
        }
    }

    /// Number of `<setting>` placeholders in the value template.
    pub fn setting_slots(&self) -> usize {
        self.value
            .as_deref()
            .map(|v| v.matches(SETTING).count())
            .unwrap_or(0)
    }

    /// Whether the template is expanded per stream index.
    pub fn is_indexed(&self) -> bool {
        self.flag.contains(INDEX) || self.value.as_deref().is_some_and(|v| v.contains(INDEX))
    }
}

/// Lookup table from option names to flag templates.
#[derive(Debug, Clone)]
pub struct CommandTable {
    templates: HashMap<String, FlagTemplate>,
}

impl Default for CommandTable {
    fn default() -> Self {
        let mut table = Self::empty();
        for (option, template) in DEFAULT_TEMPLATES {
            table.register(*option, *template);
        }
        table
    }
}

impl CommandTable {
    /// A table with no mappings.
    pub fn empty() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    /// Registers (or replaces) the template for an option.
    pub fn register(&mut self, option: impl Into<String>, template: impl AsRef<str>) -> &mut Self {
        self.templates
            .insert(option.into(), FlagTemplate::parse(template.as_ref()));
        self
    }

    /// Whether the option has a mapping.
    pub fn contains(&self, option: &str) -> bool {
        self.templates.contains_key(option)
    }

    pub(crate) fn get(&self, option: &str) -> Option<&FlagTemplate> {
        self.templates.get(option)
    }

    /// Whether values assigned to this flag are aggregated into one chain.
    pub fn is_filter_flag(flag: &str) -> bool {
        Self::filter_group(flag).is_some()
    }

    /// The flag every alias of a filter flag is grouped under.
    pub fn filter_group(flag: &str) -> Option<&'static str> {
        FILTER_FLAGS
            .iter()
            .find(|(alias, _)| *alias == flag)
            .map(|(_, group)| *group)
    }

    /// Key under which flags override or suppress each other.
    pub(crate) fn flag_key(flag: &str) -> &str {
        Self::filter_group(flag).unwrap_or(flag)
    }
}
