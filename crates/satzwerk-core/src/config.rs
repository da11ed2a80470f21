// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration, loaded from YAML.
//
// Every layout threshold is a ratio of a locally measured height (fragment
// height for lines, dominant line height for paragraphs) so that decisions
// hold across scan resolutions.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, SatzwerkError};
use crate::types::Alignment;

// -- Line classification defaults ---------------------------------------------

/// Max distance between a fragment's vertical centre and a line's centre, as a
/// fraction of the line's reference height.
pub const DEFAULT_BAND_TOLERANCE_RATIO: f32 = 0.5;
/// Horizontal gaps narrower than this fraction of line height glue fragments
/// into one run.
pub const DEFAULT_WORD_GAP_RATIO: f32 = 0.15;
/// Fragments shorter than this fraction of the page's median fragment height
/// are treated as outliers (superscripts, footnote markers).
pub const DEFAULT_OUTLIER_HEIGHT_RATIO: f32 = 0.6;
/// Fragments below this confidence are kept but flagged.
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.40;

// -- Paragraph classification defaults ----------------------------------------

/// A vertical gap above this multiple of the dominant line height starts a
/// new block.
pub const DEFAULT_BREAK_GAP_RATIO: f32 = 1.5;
/// Left-edge shift (in dominant line heights) that counts as a first-line
/// indent.
pub const DEFAULT_INDENT_TOLERANCE_RATIO: f32 = 0.8;
/// A line ending before this fraction of the column width is "short".
pub const DEFAULT_SHORT_LINE_RATIO: f32 = 0.85;
/// Edge spread (in dominant line heights) still considered aligned.
pub const DEFAULT_ALIGNMENT_TOLERANCE_RATIO: f32 = 0.6;
/// Width of one indent level, in dominant line heights.
pub const DEFAULT_INDENT_STEP_RATIO: f32 = 2.0;
/// Mean line width, as a fraction of the column, needed for justification.
pub const DEFAULT_FULL_WIDTH_RATIO: f32 = 0.9;
/// Fewer lines than this cannot evidence justification.
pub const DEFAULT_MIN_JUSTIFIED_LINES: usize = 3;

// -- Heading defaults ---------------------------------------------------------

/// Share of upper-case letters above which a short block is a heading.
pub const DEFAULT_CAPS_RATIO: f32 = 0.7;
/// Blocks longer than this are never headings.
pub const DEFAULT_HEADING_MAX_LINES: usize = 2;

// -- Retry defaults -----------------------------------------------------------

pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;
pub const DEFAULT_BASE_DELAY_MS: u64 = 250;
pub const DEFAULT_MAX_DELAY_MS: u64 = 10_000;

// -- Output defaults ----------------------------------------------------------

/// Body font of word-processor output.
pub const DEFAULT_FONT_NAME: &str = "Times New Roman";

/// Complete configuration for one conversion run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub input: InputConfig,
    pub output: OutputConfig,
    pub parallel: ParallelConfig,
    pub retry: RetryConfig,
    pub layout: LayoutConfig,
    pub log_level: LogLevel,
}

impl PipelineConfig {
    /// Load and validate a YAML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&text)?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Parse and validate YAML text. Missing keys take their defaults.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = if text.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(text)?
        };
        config.validate()?;
        debug!(?config, "configuration parsed");
        Ok(config)
    }

    /// Check every section; the first violation wins.
    pub fn validate(&self) -> Result<()> {
        self.parallel.validate()?;
        self.retry.validate()?;
        self.layout.validate()?;
        self.output.validate()
    }
}

/// Where page inputs are discovered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Directory holding the numbered page inputs.
    pub dir: PathBuf,
    /// Whitespace-separated file extensions, e.g. `"tsv png jpg"`.
    pub pattern: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("input"),
            pattern: "tsv".into(),
        }
    }
}

impl InputConfig {
    /// Lower-cased extensions accepted by `pattern`, without dots or globs.
    pub fn extensions(&self) -> Vec<String> {
        self.pattern
            .split_whitespace()
            .map(|p| p.trim_start_matches("*.").trim_start_matches('.').to_ascii_lowercase())
            .filter(|p| !p.is_empty())
            .collect()
    }
}

/// Output document format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Pdf,
    /// OpenDocument text, for word processors.
    Odt,
    Txt,
    Tsv,
    Json,
}

impl OutputFormat {
    /// Conventional file extension, without a dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Odt => "odt",
            Self::Txt => "txt",
            Self::Tsv => "tsv",
            Self::Json => "json",
        }
    }
}

/// Standard paper sizes for paginated output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperSize {
    A4,
    A5,
    Letter,
    Legal,
}

impl PaperSize {
    /// Dimensions in millimetres (width, height).
    pub fn dimensions_mm(&self) -> (u32, u32) {
        match self {
            Self::A4 => (210, 297),
            Self::A5 => (148, 210),
            Self::Letter => (216, 279),
            Self::Legal => (216, 356),
        }
    }
}

/// How the assembled document is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub file: PathBuf,
    pub format: OutputFormat,
    /// Optional JSON failure report written next to the document.
    pub report_file: Option<PathBuf>,
    /// Body font family for ODT output. PDF uses the built-in Helvetica.
    pub font_name: String,
    pub font_size_pt: f32,
    pub heading_font_size_pt: f32,
    /// ODT alignment of body paragraphs detected as left-aligned or
    /// justified. Centred and right-aligned blocks keep their own.
    pub text_align: Alignment,
    pub margin_mm: f32,
    pub paper_size: PaperSize,
    /// Start every source page on a new output page.
    pub page_break: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("output/document.pdf"),
            format: OutputFormat::Pdf,
            report_file: None,
            font_name: DEFAULT_FONT_NAME.into(),
            font_size_pt: 11.0,
            heading_font_size_pt: 15.0,
            text_align: Alignment::Justified,
            margin_mm: 20.0,
            paper_size: PaperSize::A4,
            page_break: true,
        }
    }
}

impl OutputConfig {
    fn validate(&self) -> Result<()> {
        if self.font_size_pt <= 0.0 || self.heading_font_size_pt <= 0.0 {
            return Err(SatzwerkError::Config("font sizes must be positive".into()));
        }
        if self.font_name.trim().is_empty() {
            return Err(SatzwerkError::Config("output.font_name must not be empty".into()));
        }
        let (w, h) = self.paper_size.dimensions_mm();
        if self.margin_mm < 0.0 || self.margin_mm * 2.0 >= w.min(h) as f32 {
            return Err(SatzwerkError::Config(format!(
                "margin {}mm does not fit on {:?}",
                self.margin_mm, self.paper_size
            )));
        }
        Ok(())
    }
}

/// Size of the page worker pool: `auto` or a fixed count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WorkerCountRepr", into = "WorkerCountRepr")]
pub enum WorkerCount {
    /// One less than the available CPUs, at least one.
    Auto,
    Fixed(usize),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WorkerCountRepr {
    Count(usize),
    Keyword(String),
}

impl TryFrom<WorkerCountRepr> for WorkerCount {
    type Error = String;

    fn try_from(repr: WorkerCountRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            WorkerCountRepr::Count(n) => Ok(Self::Fixed(n)),
            WorkerCountRepr::Keyword(k) if k.eq_ignore_ascii_case("auto") => Ok(Self::Auto),
            WorkerCountRepr::Keyword(k) => k
                .trim()
                .parse()
                .map(Self::Fixed)
                .map_err(|_| format!("workers must be `auto` or a number, got `{k}`")),
        }
    }
}

impl From<WorkerCount> for WorkerCountRepr {
    fn from(count: WorkerCount) -> Self {
        match count {
            WorkerCount::Auto => Self::Keyword("auto".into()),
            WorkerCount::Fixed(n) => Self::Count(n),
        }
    }
}

/// Worker pool settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelConfig {
    /// When off, pages run one at a time regardless of `workers`.
    pub enabled: bool,
    pub workers: WorkerCount,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            workers: WorkerCount::Auto,
        }
    }
}

impl ParallelConfig {
    /// Number of pages processed concurrently.
    pub fn worker_count(&self) -> usize {
        if !self.enabled {
            return 1;
        }
        match self.workers {
            WorkerCount::Fixed(n) => n.max(1),
            WorkerCount::Auto => std::thread::available_parallelism()
                .map(|n| n.get().saturating_sub(1))
                .unwrap_or(1)
                .max(1),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.workers == WorkerCount::Fixed(0) {
            return Err(SatzwerkError::Config("parallel.workers must be at least 1".into()));
        }
        Ok(())
    }
}

/// Retry budget for transient recognition failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per page, including the first.
    pub max_attempts: u32,
    /// Backoff before the second attempt, before jitter; doubles per attempt
    /// after that.
    pub base_delay_ms: u64,
    /// Ceiling for any single backoff.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl RetryConfig {
    fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(SatzwerkError::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(SatzwerkError::Config(
                "retry.max_delay_ms must not be below retry.base_delay_ms".into(),
            ));
        }
        Ok(())
    }
}

/// Thresholds for both layout classifiers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub lines: LineThresholds,
    pub paragraphs: ParagraphThresholds,
    pub headings: HeadingThresholds,
}

impl LayoutConfig {
    /// Check all three threshold groups.
    pub fn validate(&self) -> Result<()> {
        self.lines.validate()?;
        self.paragraphs.validate()?;
        self.headings.validate()
    }
}

/// Fragment-to-line grouping. See the `DEFAULT_*` constants for meanings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineThresholds {
    pub band_tolerance_ratio: f32,
    pub word_gap_ratio: f32,
    pub outlier_height_ratio: f32,
    pub min_confidence: f32,
}

impl Default for LineThresholds {
    fn default() -> Self {
        Self {
            band_tolerance_ratio: DEFAULT_BAND_TOLERANCE_RATIO,
            word_gap_ratio: DEFAULT_WORD_GAP_RATIO,
            outlier_height_ratio: DEFAULT_OUTLIER_HEIGHT_RATIO,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }
}

impl LineThresholds {
    pub fn validate(&self) -> Result<()> {
        positive("layout.lines.band_tolerance_ratio", self.band_tolerance_ratio)?;
        non_negative("layout.lines.word_gap_ratio", self.word_gap_ratio)?;
        unit_interval("layout.lines.outlier_height_ratio", self.outlier_height_ratio)?;
        unit_interval("layout.lines.min_confidence", self.min_confidence)
    }
}

/// Line-to-block grouping, as multiples of the dominant line height or
/// fractions of the column width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParagraphThresholds {
    pub break_gap_ratio: f32,
    pub indent_tolerance_ratio: f32,
    pub short_line_ratio: f32,
    pub alignment_tolerance_ratio: f32,
    pub indent_step_ratio: f32,
    pub full_width_ratio: f32,
    /// Fewer lines than this never count as justified.
    pub min_justified_lines: usize,
}

impl Default for ParagraphThresholds {
    fn default() -> Self {
        Self {
            break_gap_ratio: DEFAULT_BREAK_GAP_RATIO,
            indent_tolerance_ratio: DEFAULT_INDENT_TOLERANCE_RATIO,
            short_line_ratio: DEFAULT_SHORT_LINE_RATIO,
            alignment_tolerance_ratio: DEFAULT_ALIGNMENT_TOLERANCE_RATIO,
            indent_step_ratio: DEFAULT_INDENT_STEP_RATIO,
            full_width_ratio: DEFAULT_FULL_WIDTH_RATIO,
            min_justified_lines: DEFAULT_MIN_JUSTIFIED_LINES,
        }
    }
}

impl ParagraphThresholds {
    pub fn validate(&self) -> Result<()> {
        positive("layout.paragraphs.break_gap_ratio", self.break_gap_ratio)?;
        positive("layout.paragraphs.indent_tolerance_ratio", self.indent_tolerance_ratio)?;
        unit_interval("layout.paragraphs.short_line_ratio", self.short_line_ratio)?;
        positive(
            "layout.paragraphs.alignment_tolerance_ratio",
            self.alignment_tolerance_ratio,
        )?;
        positive("layout.paragraphs.indent_step_ratio", self.indent_step_ratio)?;
        unit_interval("layout.paragraphs.full_width_ratio", self.full_width_ratio)?;
        if self.min_justified_lines < 3 {
            return Err(SatzwerkError::Config(
                "layout.paragraphs.min_justified_lines must be at least 3".into(),
            ));
        }
        Ok(())
    }
}

/// When a block is promoted to a heading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadingThresholds {
    /// Minimum share of upper-case letters.
    pub caps_ratio: f32,
    /// Longest block still eligible.
    pub max_lines: usize,
}

impl Default for HeadingThresholds {
    fn default() -> Self {
        Self {
            caps_ratio: DEFAULT_CAPS_RATIO,
            max_lines: DEFAULT_HEADING_MAX_LINES,
        }
    }
}

impl HeadingThresholds {
    pub fn validate(&self) -> Result<()> {
        unit_interval("layout.headings.caps_ratio", self.caps_ratio)
    }
}

/// Default log level when `RUST_LOG` is unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Directive for `EnvFilter`.
    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

fn positive(name: &str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SatzwerkError::Config(format!("{name} must be positive, got {value}")))
    }
}

fn non_negative(name: &str, value: f32) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SatzwerkError::Config(format!("{name} must not be negative, got {value}")))
    }
}

fn unit_interval(name: &str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SatzwerkError::Config(format!("{name} must be within 0..=1, got {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_thresholds_are_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn default_constants_have_expected_values() {
        assert_eq!(DEFAULT_BREAK_GAP_RATIO, 1.5);
        assert_eq!(DEFAULT_MIN_JUSTIFIED_LINES, 3);
        assert_eq!(DEFAULT_CAPS_RATIO, 0.7);
        assert!(DEFAULT_WORD_GAP_RATIO < DEFAULT_BAND_TOLERANCE_RATIO);
        assert!(DEFAULT_OUTLIER_HEIGHT_RATIO < 1.0);
    }

    #[test]
    fn empty_yaml_yields_defaults() {
        let config = PipelineConfig::from_yaml("").expect("parse");
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let yaml = r#"
input:
  dir: scans
  pattern: "*.tsv *.png"
output:
  format: txt
parallel:
  workers: 3
layout:
  paragraphs:
    break_gap_ratio: 2.0
log_level: debug
"#;
        let config = PipelineConfig::from_yaml(yaml).expect("parse");
        assert_eq!(config.input.dir, PathBuf::from("scans"));
        assert_eq!(config.input.extensions(), vec!["tsv", "png"]);
        assert_eq!(config.output.format, OutputFormat::Txt);
        assert_eq!(config.parallel.worker_count(), 3);
        assert_eq!(config.layout.paragraphs.break_gap_ratio, 2.0);
        assert_eq!(
            config.layout.paragraphs.indent_tolerance_ratio,
            DEFAULT_INDENT_TOLERANCE_RATIO
        );
        assert_eq!(config.log_level, LogLevel::Debug);
    }

    #[test]
    fn workers_accept_auto_keyword() {
        let config = PipelineConfig::from_yaml("parallel:\n  workers: auto\n").expect("parse");
        assert_eq!(config.parallel.workers, WorkerCount::Auto);
        assert!(config.parallel.worker_count() >= 1);
    }

    #[test]
    fn disabled_pool_means_one_worker() {
        let parallel = ParallelConfig {
            enabled: false,
            workers: WorkerCount::Fixed(8),
        };
        assert_eq!(parallel.worker_count(), 1);
    }

    #[test]
    fn zero_workers_rejected() {
        let err = PipelineConfig::from_yaml("parallel:\n  workers: 0\n");
        assert!(matches!(err, Err(SatzwerkError::Config(_))));
    }

    #[test]
    fn bad_worker_keyword_rejected() {
        assert!(PipelineConfig::from_yaml("parallel:\n  workers: many\n").is_err());
    }

    #[test]
    fn zero_attempts_rejected() {
        assert!(PipelineConfig::from_yaml("retry:\n  max_attempts: 0\n").is_err());
    }

    #[test]
    fn justification_needs_three_lines_minimum() {
        let thresholds = ParagraphThresholds {
            min_justified_lines: 2,
            ..Default::default()
        };
        assert!(thresholds.validate().is_err());
    }

    #[test]
    fn out_of_range_confidence_rejected() {
        let lines = LineThresholds {
            min_confidence: 1.5,
            ..Default::default()
        };
        assert!(lines.validate().is_err());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "retry:\n  max_attempts: 2\n").expect("write");
        let config = PipelineConfig::load(&path).expect("load");
        assert_eq!(config.retry.max_attempts, 2);
    }

    #[test]
    fn odt_options_parse_from_yaml() {
        let yaml = "output:\n  format: odt\n  font_name: Liberation Serif\n  text_align: left\n";
        let config = PipelineConfig::from_yaml(yaml).expect("parse");
        assert_eq!(config.output.format, OutputFormat::Odt);
        assert_eq!(config.output.format.extension(), "odt");
        assert_eq!(config.output.font_name, "Liberation Serif");
        assert_eq!(config.output.text_align, Alignment::Left);
        assert!(PipelineConfig::from_yaml("output:\n  font_name: \"  \"\n").is_err());
    }

    #[test]
    fn example_file_matches_defaults() {
        let yaml = include_str!("../../../config.example.yaml");
        let config = PipelineConfig::from_yaml(yaml).expect("parse");
        assert_eq!(config, PipelineConfig::default());
    }
}
