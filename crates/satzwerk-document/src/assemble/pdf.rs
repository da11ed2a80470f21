// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF output through `printpdf` 0.8.
//
// printpdf 0.8 uses a data-oriented API: documents are built by constructing
// `PdfPage` structs containing `Vec<Op>` operation lists, then serialised via
// `PdfDocument::save()`.  Blocks flow top to bottom with word wrap; glyph
// widths are estimated, as the built-in fonts carry no metrics here.

use printpdf::{
    BuiltinFont, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Point, Pt, TextItem,
};
use satzwerk_core::config::OutputConfig;
use satzwerk_core::{Alignment, Block, BlockRole, DocumentModel, Result, SatzwerkError};
use tracing::{debug, info, instrument};

use super::DocumentAssembler;

/// Baseline-to-baseline distance as a multiple of the font size.
const LINE_SPACING: f32 = 1.3;
/// Average Helvetica glyph width as a fraction of the font size.
const AVG_GLYPH_EM: f32 = 0.5;
/// Extra space after each block, in lines of its own font size.
const BLOCK_SPACING: f32 = 0.5;
/// Horizontal shift per indent level.
const INDENT_STEP_MM: f32 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Style {
    font: BuiltinFont,
    size_pt: f32,
}

/// Lays the document out on fixed-size paper.
#[derive(Debug, Clone)]
pub struct PdfAssembler {
    output: OutputConfig,
    title: String,
}

impl PdfAssembler {
    /// Paper, margins and font sizes come from `output`.
    pub fn new(output: OutputConfig) -> Self {
        Self {
            output,
            title: "Satzwerk Document".into(),
        }
    }

    /// Set a title for the PDF metadata.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    fn style(&self, role: BlockRole) -> Style {
        match role {
            BlockRole::Heading => Style {
                font: BuiltinFont::HelveticaBold,
                size_pt: self.output.heading_font_size_pt,
            },
            BlockRole::Placeholder => Style {
                font: BuiltinFont::HelveticaOblique,
                size_pt: self.output.font_size_pt,
            },
            BlockRole::Paragraph => Style {
                font: BuiltinFont::Helvetica,
                size_pt: self.output.font_size_pt,
            },
        }
    }

    /// Lay out every page of `model` as PDF pages.
    ///
    /// Fails when the margins leave no room for a line of the largest font.
    pub(crate) fn layout(&self, model: &DocumentModel) -> Result<Vec<PdfPage>> {
        let mut flow = Flow::new(&self.output);
        let tallest_pt = self.output.font_size_pt.max(self.output.heading_font_size_pt);
        let fits = flow.usable_width_pt > tallest_pt
            && flow.usable_height_pt() > tallest_pt * LINE_SPACING;
        if !fits {
            return Err(SatzwerkError::PdfError(format!(
                "{}mm margins leave no room for {tallest_pt}pt text on {:?} paper",
                self.output.margin_mm, self.output.paper_size
            )));
        }
        for page in model.pages() {
            if self.output.page_break {
                flow.break_page_if_used();
            }
            for block in &page.blocks {
                self.place_block(&mut flow, block);
            }
        }
        Ok(flow.finish())
    }

    fn place_block(&self, flow: &mut Flow, block: &Block) {
        let style = self.style(block.role);
        let indent_pt = Mm(INDENT_STEP_MM * block.indent_level as f32)
            .into_pt()
            .0
            .min(flow.usable_width_pt / 2.0);
        let width_pt = flow.usable_width_pt - indent_pt;
        let glyph_pt = AVG_GLYPH_EM * style.size_pt;
        let max_chars = ((width_pt / glyph_pt) as usize).max(1);

        for line in wrap_text(&block.text(), max_chars) {
            let text_width_pt = line.chars().count() as f32 * glyph_pt;
            let offset_pt = match block.alignment {
                Alignment::Center => ((width_pt - text_width_pt) / 2.0).max(0.0),
                Alignment::Right => (width_pt - text_width_pt).max(0.0),
                Alignment::Left | Alignment::Justified => 0.0,
            };
            flow.write_line(line, indent_pt + offset_pt, style);
        }
        flow.skip(BLOCK_SPACING * style.size_pt * LINE_SPACING);
    }
}

impl DocumentAssembler for PdfAssembler {
    #[instrument(skip_all, fields(pages = model.page_count()))]
    fn assemble(&self, model: &DocumentModel) -> Result<Vec<u8>> {
        info!(paper = ?self.output.paper_size, title = %self.title, "Creating PDF");
        let pages = self.layout(model)?;

        let mut doc = PdfDocument::new(&self.title);
        doc.with_pages(pages);
        debug!(pdf_pages = doc.pages.len(), "layout complete");

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = doc.save(&PdfSaveOptions::default(), &mut warnings);
        if !warnings.is_empty() {
            debug!(count = warnings.len(), "printpdf reported warnings");
        }
        Ok(output)
    }

    fn extension(&self) -> &'static str {
        "pdf"
    }
}

/// Running text cursor over a sequence of output pages.
struct Flow {
    page_w: Mm,
    page_h: Mm,
    margin_pt: f32,
    usable_width_pt: f32,
    /// Distance of the next line's top from the page bottom.
    cursor_pt: f32,
    ops: Vec<Op>,
    pages: Vec<PdfPage>,
}

impl Flow {
    fn new(output: &OutputConfig) -> Self {
        let (w_mm, h_mm) = output.paper_size.dimensions_mm();
        let (page_w, page_h) = (Mm(w_mm as f32), Mm(h_mm as f32));
        let margin_pt = Mm(output.margin_mm).into_pt().0;
        Self {
            page_w,
            page_h,
            margin_pt,
            usable_width_pt: page_w.into_pt().0 - 2.0 * margin_pt,
            cursor_pt: page_h.into_pt().0 - margin_pt,
            ops: Vec::new(),
            pages: Vec::new(),
        }
    }

    fn usable_height_pt(&self) -> f32 {
        self.page_h.into_pt().0 - 2.0 * self.margin_pt
    }

    fn break_page(&mut self) {
        let ops = std::mem::take(&mut self.ops);
        self.pages.push(PdfPage::new(self.page_w, self.page_h, ops));
        self.cursor_pt = self.page_h.into_pt().0 - self.margin_pt;
    }

    fn break_page_if_used(&mut self) {
        if !self.ops.is_empty() {
            self.break_page();
        }
    }

    fn write_line(&mut self, text: String, x_offset_pt: f32, style: Style) {
        let advance = style.size_pt * LINE_SPACING;
        if self.cursor_pt - advance < self.margin_pt {
            self.break_page_if_used();
        }
        let baseline = self.cursor_pt - style.size_pt;

        self.ops.push(Op::StartTextSection);
        self.ops.push(Op::SetTextCursor {
            pos: Point {
                x: Pt(self.margin_pt + x_offset_pt),
                y: Pt(baseline),
            },
        });
        self.ops.push(Op::SetFontSizeBuiltinFont {
            size: Pt(style.size_pt),
            font: style.font,
        });
        self.ops.push(Op::WriteTextBuiltinFont {
            items: vec![TextItem::Text(text)],
            font: style.font,
        });
        self.ops.push(Op::EndTextSection);

        self.cursor_pt -= advance;
    }

    fn skip(&mut self, space_pt: f32) {
        self.cursor_pt -= space_pt;
    }

    fn finish(mut self) -> Vec<PdfPage> {
        // An empty document still gets one blank page.
        if !self.ops.is_empty() || self.pages.is_empty() {
            self.break_page();
        }
        self.pages
    }
}

// -- Text wrapping helper -----------------------------------------------------

/// Word-wrap `text` so that no line exceeds `max_width` characters.
///
/// Widths are counted in chars, not bytes, so Cyrillic and other multi-byte
/// text wraps at the same column as ASCII.  Words longer than `max_width` are
/// force-broken.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    let max_width = max_width.max(1);
    let mut result = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if word_len > max_width {
            if !current.is_empty() {
                result.push(std::mem::take(&mut current));
            }
            let chars: Vec<char> = word.chars().collect();
            let mut chunks = chars.chunks(max_width).peekable();
            while let Some(chunk) = chunks.next() {
                if chunks.peek().is_some() {
                    result.push(chunk.iter().collect());
                } else {
                    current = chunk.iter().collect();
                    current_len = chunk.len();
                }
            }
        } else if current.is_empty() {
            current.push_str(word);
            current_len = word_len;
        } else if current_len + 1 + word_len <= max_width {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
        } else {
            result.push(std::mem::replace(&mut current, word.to_string()));
            current_len = word_len;
        }
    }

    if !current.is_empty() {
        result.push(current);
    }
    result
}
