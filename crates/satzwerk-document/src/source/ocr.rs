// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fragment source backed by the `ocrs` engine, a pure-Rust OCR engine whose
// neural network models run on `rten`.
//
// # Feature Gate
//
// This module is only available when the `ocr` feature is enabled:
//
// ```toml
// satzwerk-document = { path = "crates/satzwerk-document", features = ["ocr"] }
// ```
//
// # Model Setup
//
// The engine needs two model files, `text-detection.rten` and
// `text-recognition.rten`.  Running `ocrs-cli` once downloads them to
// `$XDG_CACHE_HOME/ocrs` (typically `~/.cache/ocrs`), which is where
// [`OcrConfig::default`] looks.
//
// `ocrs` and `rten` must be built in release mode; debug builds are 10-100x
// slower.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use ocrs::{ImageSource, OcrEngine, OcrEngineParams, TextItem};
use rten::Model;
use satzwerk_core::{Fragment, PageSize, Rect, SatzwerkError};
use satzwerk_pipeline::{FragmentSource, PageScan, SourceError};
use tracing::{debug, info, instrument};

use super::classify_io;
use crate::discovery::PageInput;

/// `ocrs` reports no per-word confidence.
const OCRS_CONFIDENCE: f32 = 1.0;

const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

/// `$XDG_CACHE_HOME/ocrs`, falling back to `~/.cache/ocrs`.
fn default_model_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        PathBuf::from(xdg).join("ocrs")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".cache").join("ocrs")
    } else {
        PathBuf::from("ocrs-models")
    }
}

/// Locations of the two model files.
#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// Text detection network (`text-detection.rten`).
    pub detection_model_path: PathBuf,
    /// Line recognition network (`text-recognition.rten`).
    pub recognition_model_path: PathBuf,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self::from_dir(default_model_dir())
    }
}

impl OcrConfig {
    /// Expects `dir` to contain `text-detection.rten` and
    /// `text-recognition.rten`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            detection_model_path: dir.join(DETECTION_MODEL_FILENAME),
            recognition_model_path: dir.join(RECOGNITION_MODEL_FILENAME),
        }
    }

    /// Verify that both model files exist.
    pub fn validate(&self) -> Result<(), SatzwerkError> {
        for path in [&self.detection_model_path, &self.recognition_model_path] {
            if !path.exists() {
                return Err(SatzwerkError::OcrError(format!(
                    "model not found at {}; run `ocrs-cli` once to download models",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

/// Recognises page images on demand, one word per fragment.
pub struct OcrFragmentSource {
    engine: OcrEngine,
    pages: BTreeMap<u32, PathBuf>,
}

impl OcrFragmentSource {
    /// Load the models and register the page images.
    ///
    /// Model loading is the expensive step; the source is then reused for
    /// every page.
    #[instrument(skip_all, fields(
        detection = %config.detection_model_path.display(),
        recognition = %config.recognition_model_path.display(),
    ))]
    pub fn new(
        config: OcrConfig,
        inputs: impl IntoIterator<Item = PageInput>,
    ) -> Result<Self, SatzwerkError> {
        config.validate()?;

        info!("Loading OCR models");
        let load = |path: &Path| {
            Model::load_file(path).map_err(|err| {
                SatzwerkError::OcrError(format!("failed to load model {}: {err}", path.display()))
            })
        };
        let detection_model = load(&config.detection_model_path)?;
        let recognition_model = load(&config.recognition_model_path)?;

        let engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .map_err(|err| SatzwerkError::OcrError(format!("failed to initialise OCR engine: {err}")))?;

        info!("OCR engine ready");
        Ok(Self {
            engine,
            pages: inputs
                .into_iter()
                .map(|input| (input.page_index, input.path))
                .collect(),
        })
    }

    /// Detect and recognise every word on `image`.
    #[instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    pub fn recognize(&self, image: &DynamicImage, page_index: u32) -> Result<PageScan, SourceError> {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();

        let source = ImageSource::from_bytes(rgb.as_raw(), (width, height)).map_err(|err| {
            SourceError::Corrupt(format!("unusable image ({width}x{height}): {err}"))
        })?;
        let input = self
            .engine
            .prepare_input(source)
            .map_err(|err| SourceError::Unavailable(format!("OCR preprocessing failed: {err}")))?;

        let word_rects = self
            .engine
            .detect_words(&input)
            .map_err(|err| SourceError::Unavailable(format!("word detection failed: {err}")))?;
        let line_rects = self.engine.find_text_lines(&input, &word_rects);
        let lines = self
            .engine
            .recognize_text(&input, &line_rects)
            .map_err(|err| SourceError::Unavailable(format!("line recognition failed: {err}")))?;

        let mut fragments = Vec::new();
        for word in lines.iter().flatten().flat_map(|line| line.words()) {
            let text = word.to_string();
            if text.trim().is_empty() {
                continue;
            }
            let r = word.bounding_rect();
            // Degenerate boxes carry no geometry to classify.
            let Ok(bbox) = Rect::new(
                r.left() as f32,
                r.top() as f32,
                r.width() as f32,
                r.height() as f32,
            ) else {
                continue;
            };
            fragments.push(Fragment::new(text.trim(), bbox, OCRS_CONFIDENCE, page_index));
        }

        debug!(words = fragments.len(), "OCR recognition complete");
        Ok(PageScan {
            size: PageSize::new(width as f32, height as f32),
            fragments,
        })
    }
}

impl FragmentSource for OcrFragmentSource {
    fn get_fragments(&self, page_index: u32) -> Result<PageScan, SourceError> {
        let path = self
            .pages
            .get(&page_index)
            .ok_or_else(|| SourceError::Corrupt(format!("no input image for page {page_index}")))?;
        let image = image::open(path).map_err(|err| match err {
            image::ImageError::IoError(io) => classify_io(&path.display().to_string(), &io),
            other => SourceError::Corrupt(format!("{}: {other}", path.display())),
        })?;
        self.recognize(&image, page_index)
    }
}
