//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILPAGER_CONFIG` (environment variable)
//! 2. `~/.config/mailpager/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailpager\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;

use ratatui::style::{Color, Modifier, Style};
use serde::{Deserialize, Serialize};

use crate::error::{PagerError, Result};
use crate::pager::classify::{Classifier, DEFAULT_QUOTE_REGEX, DEFAULT_SMILEYS};
use crate::pager::highlight::ColorRule;
use crate::pager::scanner::DEFAULT_CACHE_SIZE;
use crate::pager::{PagerOptions, PagerSettings};
use crate::theme::Theme;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Pager behavior.
    pub pager: PagerConfig,
    /// Theme and highlight rules.
    pub colors: ColorsConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Pager behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PagerConfig {
    /// 0 = window width, >0 = fixed columns, <0 = window width minus n.
    pub wrap: i32,
    /// Break long lines at word boundaries.
    pub smart_wrap: bool,
    /// Show `+` at the start of wrapped rows.
    pub markers: bool,
    /// Render ANSI color sequences found in the text.
    pub allow_ansi: bool,
    /// Show `~` on rows past the end of the message.
    pub tilde: bool,
    /// Rows kept on screen when paging.
    pub pager_context: usize,
    /// Rows shown above a search hit.
    pub search_context: usize,
    /// Searches continue from the other end of the message.
    pub wrap_search: bool,
    /// Stay on the last page instead of moving on.
    pub pager_stop: bool,
    /// Lines kept above quoted text when skipping to it.
    pub skip_quoted_offset: usize,
    /// Color only the matched part of header lines.
    pub header_color_partial: bool,
    /// Drop blanks at the start of wrapped rows.
    pub skip_leading_whitespace: bool,
    /// Pattern recognising quoted lines.
    pub quote_regex: String,
    /// Pattern for smileys that look like quote markers (empty disables).
    pub smileys: String,
    /// Scanned lines kept in memory.
    pub line_cache_size: usize,
}

/// Colors: base theme, style overrides, quote palette and highlight rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorsConfig {
    /// Base theme: "dark" or "plain".
    pub theme: String,
    /// Overrides of individual theme styles.
    pub styles: StylesConfig,
    /// Quote palette cycled by depth (empty keeps the theme's).
    pub quoted: Vec<StyleSpec>,
    /// Header lines, first matching rule wins.
    pub header: Vec<RuleSpec>,
    /// Body text highlights.
    pub body: Vec<RuleSpec>,
    /// Attachment line highlights.
    pub attachment: Vec<RuleSpec>,
}

/// Optional overrides for the named theme styles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StylesConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normal: Option<StyleSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_default: Option<StyleSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<StyleSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<StyleSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<StyleSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<StyleSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markers: Option<StyleSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tilde: Option<StyleSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bold: Option<StyleSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub underline: Option<StyleSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<StyleSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StyleSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<StyleSpec>,
}

/// A style written as color names and attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bg: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attrs: Vec<String>,
}

/// A highlight rule: a regex and the style of its matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSpec {
    pub regex: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bg: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attrs: Vec<String>,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for PagerConfig {
    fn default() -> Self {
        Self {
            wrap: 0,
            smart_wrap: true,
            markers: true,
            allow_ansi: false,
            tilde: false,
            pager_context: 0,
            search_context: 0,
            wrap_search: true,
            pager_stop: false,
            skip_quoted_offset: 0,
            header_color_partial: false,
            skip_leading_whitespace: true,
            quote_regex: DEFAULT_QUOTE_REGEX.to_string(),
            smileys: DEFAULT_SMILEYS.to_string(),
            line_cache_size: DEFAULT_CACHE_SIZE,
        }
    }
}

impl Default for ColorsConfig {
    fn default() -> Self {
        Self {
            theme: "dark".to_string(),
            styles: StylesConfig::default(),
            quoted: Vec::new(),
            header: vec![
                RuleSpec::new("^subject:", Some("yellow"), &["bold"]),
                RuleSpec::new("^(from|to|cc|reply-to):", Some("cyan"), &[]),
                RuleSpec::new("^date:", Some("brightblack"), &[]),
            ],
            body: vec![
                RuleSpec::new(r"(https?|ftp)://[^ \t\r\n<>]+", Some("brightblue"), &["underline"]),
                RuleSpec::new(
                    r"[-a-z0-9_.+]+@[-a-z0-9_]+(\.[-a-z0-9_]+)+",
                    Some("magenta"),
                    &[],
                ),
            ],
            attachment: vec![RuleSpec::new(r"\[-- .* --\]", Some("green"), &["bold"])],
        }
    }
}

impl RuleSpec {
    fn new(regex: &str, fg: Option<&str>, attrs: &[&str]) -> Self {
        Self {
            regex: regex.to_string(),
            fg: fg.map(str::to_string),
            bg: None,
            attrs: attrs.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn style(&self) -> Result<Style> {
        build_style(self.fg.as_deref(), self.bg.as_deref(), &self.attrs)
    }

    pub fn compile(&self) -> Result<ColorRule> {
        ColorRule::new(&self.regex, self.style()?)
    }
}

impl StyleSpec {
    pub fn style(&self) -> Result<Style> {
        build_style(self.fg.as_deref(), self.bg.as_deref(), &self.attrs)
    }
}

// ── Colors ──────────────────────────────────────────────────────

/// Parse a color name: `red`, `brightblue`, `color123`, `#rrggbb` or `default`.
pub fn parse_color(name: &str) -> Result<Color> {
    let lower = name.trim().to_ascii_lowercase();
    let color = match lower.as_str() {
        "default" | "reset" => Color::Reset,
        "black" => Color::Black,
        "red" => Color::Red,
        "green" => Color::Green,
        "yellow" => Color::Yellow,
        "blue" => Color::Blue,
        "magenta" => Color::Magenta,
        "cyan" => Color::Cyan,
        "white" | "gray" | "grey" => Color::Gray,
        "brightblack" | "darkgray" | "darkgrey" => Color::DarkGray,
        "brightred" => Color::LightRed,
        "brightgreen" => Color::LightGreen,
        "brightyellow" => Color::LightYellow,
        "brightblue" => Color::LightBlue,
        "brightmagenta" => Color::LightMagenta,
        "brightcyan" => Color::LightCyan,
        "brightwhite" => Color::White,
        other => {
            if let Some(index) = other.strip_prefix("color") {
                let index: u8 = index
                    .parse()
                    .map_err(|_| PagerError::InvalidColor(name.to_string()))?;
                Color::Indexed(index)
            } else if let Some(hex) = other.strip_prefix('#') {
                parse_hex(hex).ok_or_else(|| PagerError::InvalidColor(name.to_string()))?
            } else {
                return Err(PagerError::InvalidColor(name.to_string()));
            }
        }
    };
    Ok(color)
}

fn parse_hex(hex: &str) -> Option<Color> {
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(Color::Rgb(channel(0)?, channel(2)?, channel(4)?))
}

fn parse_modifier(name: &str) -> Result<Modifier> {
    let modifier = match name.trim().to_ascii_lowercase().as_str() {
        "none" => Modifier::empty(),
        "bold" => Modifier::BOLD,
        "underline" | "underlined" => Modifier::UNDERLINED,
        "reverse" | "reversed" => Modifier::REVERSED,
        "blink" => Modifier::SLOW_BLINK,
        "italic" => Modifier::ITALIC,
        "dim" => Modifier::DIM,
        _ => return Err(PagerError::InvalidColor(name.to_string())),
    };
    Ok(modifier)
}

fn build_style(fg: Option<&str>, bg: Option<&str>, attrs: &[String]) -> Result<Style> {
    let mut style = Style::default();
    if let Some(fg) = fg {
        style = style.fg(parse_color(fg)?);
    }
    if let Some(bg) = bg {
        style = style.bg(parse_color(bg)?);
    }
    for attr in attrs {
        style = style.add_modifier(parse_modifier(attr)?);
    }
    Ok(style)
}

// ── Compilation ─────────────────────────────────────────────────

impl Config {
    /// Build the runtime pager settings.
    ///
    /// Fails on the first malformed pattern or unknown color name.
    pub fn compile(&self) -> Result<PagerSettings> {
        let pager = &self.pager;
        let options = PagerOptions {
            wrap: pager.wrap,
            smart_wrap: pager.smart_wrap,
            markers: pager.markers,
            allow_ansi: pager.allow_ansi,
            tilde: pager.tilde,
            pager_context: pager.pager_context,
            search_context: pager.search_context,
            wrap_search: pager.wrap_search,
            pager_stop: pager.pager_stop,
            skip_quoted_offset: pager.skip_quoted_offset,
            skip_leading_whitespace: pager.skip_leading_whitespace,
            line_cache_size: pager.line_cache_size,
        };

        let smileys = (!pager.smileys.is_empty()).then_some(pager.smileys.as_str());
        let compile_rules =
            |rules: &[RuleSpec]| rules.iter().map(RuleSpec::compile).collect::<Result<Vec<_>>>();
        let classifier = Classifier::new(&pager.quote_regex, smileys)?
            .with_header_rules(compile_rules(&self.colors.header)?)
            .with_body_rules(compile_rules(&self.colors.body)?)
            .with_attachment_rules(compile_rules(&self.colors.attachment)?)
            .with_header_color_partial(pager.header_color_partial);

        Ok(PagerSettings {
            options,
            theme: self.colors.theme()?,
            classifier,
        })
    }
}

impl ColorsConfig {
    /// The base theme with the configured overrides applied.
    pub fn theme(&self) -> Result<Theme> {
        let mut theme = match self.theme.as_str() {
            "plain" => Theme::plain(),
            "dark" => Theme::dark(),
            other => {
                tracing::warn!(theme = other, "Unknown theme, using dark");
                Theme::dark()
            }
        };

        let s = &self.styles;
        let overrides: [(&Option<StyleSpec>, &mut Style); 11] = [
            (&s.normal, &mut theme.normal),
            (&s.header_default, &mut theme.header_default),
            (&s.header, &mut theme.header),
            (&s.signature, &mut theme.signature),
            (&s.attachment, &mut theme.attachment),
            (&s.search, &mut theme.search),
            (&s.markers, &mut theme.markers),
            (&s.tilde, &mut theme.tilde),
            (&s.message, &mut theme.message),
            (&s.error, &mut theme.error),
            (&s.status, &mut theme.status),
        ];
        for (spec, slot) in overrides {
            if let Some(spec) = spec {
                *slot = spec.style()?;
            }
        }
        if let Some(bold) = &s.bold {
            theme.bold = Some(bold.style()?);
        }
        if let Some(underline) = &s.underline {
            theme.underline = Some(underline.style()?);
        }
        if !self.quoted.is_empty() {
            theme.quoted = self
                .quoted
                .iter()
                .map(StyleSpec::style)
                .collect::<Result<Vec<_>>>()?;
        }
        Ok(theme)
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILPAGER_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("mailpager").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailpager")
}

/// Name of the log file inside [`cache_dir`].
pub const LOG_FILE_NAME: &str = "mailpager.log";

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join(LOG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "warn");
        assert_eq!(cfg.pager.wrap, 0);
        assert!(cfg.pager.smart_wrap);
        assert!(cfg.pager.markers);
        assert!(!cfg.pager.allow_ansi);
        assert_eq!(cfg.pager.quote_regex, DEFAULT_QUOTE_REGEX);
        assert_eq!(cfg.pager.line_cache_size, 256);
        assert_eq!(cfg.colors.theme, "dark");
    }

    #[test]
    fn test_default_config_compiles() {
        let settings = Config::default().compile().expect("compile defaults");
        assert_eq!(settings.classifier.quote_prefix(b"> > hi\n"), Some(&b"> >"[..]));
        assert_eq!(settings.classifier.quote_prefix(b">:-) hi\n"), None);
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.pager.smileys, cfg.pager.smileys);
        assert_eq!(parsed.colors.header, cfg.colors.header);
        assert_eq!(parsed.colors.body, cfg.colors.body);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r##"
[pager]
wrap = -4
tilde = true

[colors.styles]
signature = { fg = "#808080", attrs = ["italic"] }

[[colors.body]]
regex = "TODO"
fg = "red"
"##;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(cfg.pager.wrap, -4);
        assert!(cfg.pager.tilde);
        // Other fields use defaults
        assert!(cfg.pager.smart_wrap);
        assert_eq!(cfg.colors.body.len(), 1);
        assert_eq!(cfg.colors.header.len(), 3);

        let settings = cfg.compile().expect("compile");
        assert_eq!(settings.options.wrap, -4);
        assert_eq!(
            settings.theme.signature,
            Style::default()
                .fg(Color::Rgb(0x80, 0x80, 0x80))
                .add_modifier(Modifier::ITALIC)
        );
    }

    #[test]
    fn test_parse_color_names() {
        assert_eq!(parse_color("red").expect("red"), Color::Red);
        assert_eq!(parse_color("BrightBlue").expect("bright"), Color::LightBlue);
        assert_eq!(parse_color("color123").expect("indexed"), Color::Indexed(123));
        assert_eq!(parse_color("#ff8000").expect("hex"), Color::Rgb(255, 128, 0));
        assert_eq!(parse_color("default").expect("default"), Color::Reset);
    }

    #[test]
    fn test_parse_color_rejects_unknown() {
        assert!(matches!(parse_color("mauve"), Err(PagerError::InvalidColor(_))));
        assert!(matches!(parse_color("color300"), Err(PagerError::InvalidColor(_))));
        assert!(matches!(parse_color("#12345"), Err(PagerError::InvalidColor(_))));
    }

    #[test]
    fn test_compile_reports_bad_regex() {
        let mut cfg = Config::default();
        cfg.colors.body.push(RuleSpec::new("(open", Some("red"), &[]));
        let err = cfg.compile().unwrap_err();
        assert!(matches!(err, PagerError::PatternCompile { ref pattern, .. } if pattern == "(open"));
    }

    #[test]
    fn test_compile_reports_bad_attribute() {
        let mut cfg = Config::default();
        cfg.colors.quoted = vec![StyleSpec {
            fg: Some("red".to_string()),
            bg: None,
            attrs: vec!["sparkly".to_string()],
        }];
        assert!(matches!(cfg.compile(), Err(PagerError::InvalidColor(_))));
    }

    #[test]
    fn test_quoted_palette_override() {
        let mut cfg = Config::default();
        cfg.colors.quoted = vec![
            StyleSpec {
                fg: Some("blue".to_string()),
                ..StyleSpec::default()
            },
            StyleSpec {
                fg: Some("green".to_string()),
                ..StyleSpec::default()
            },
        ];
        let theme = cfg.colors.theme().expect("theme");
        assert_eq!(theme.palette_size(), 2);
        assert_eq!(theme.quote_style(1).fg, Some(Color::Green));
    }

    #[test]
    fn test_empty_smileys_disables_exclusion() {
        let mut cfg = Config::default();
        cfg.pager.smileys = String::new();
        let settings = cfg.compile().expect("compile");
        assert!(settings.classifier.quote_prefix(b">:)\n").is_some());
    }

    #[test]
    fn test_log_file_in_cache_dir() {
        let mut cfg = Config::default();
        cfg.general.cache_dir = Some(PathBuf::from("/tmp/mp"));
        assert_eq!(log_file_path(&cfg), PathBuf::from("/tmp/mp/mailpager.log"));
    }
}
