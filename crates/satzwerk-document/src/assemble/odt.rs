// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OpenDocument text output: a zip package of XML parts.
//
// The `mimetype` entry comes first and is stored uncompressed, so readers can
// sniff the format at a fixed offset.  Named styles (`TextBody`, `Title`,
// `Placeholder`) live in `styles.xml`; each distinct alignment, indent and
// page-break combination gets an automatic paragraph style in `content.xml`.

use std::borrow::Cow;
use std::io::{Cursor, Write};

use quick_xml::escape::escape;
use satzwerk_core::config::OutputConfig;
use satzwerk_core::{Alignment, Block, BlockRole, DocumentModel, Result, SatzwerkError};
use tracing::{debug, info, instrument};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::DocumentAssembler;

const MIMETYPE: &str = "application/vnd.oasis.opendocument.text";
const ODF_VERSION: &str = "1.2";
/// Left margin added per indent level.
const INDENT_STEP_CM: f32 = 0.5;
const TITLE_SPACE_BELOW_CM: f32 = 0.3;

const NAMESPACES: &str = concat!(
    r#"xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" "#,
    r#"xmlns:style="urn:oasis:names:tc:opendocument:xmlns:style:1.0" "#,
    r#"xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0" "#,
    r#"xmlns:fo="urn:oasis:names:tc:opendocument:xmlns:xsl-fo-compatible:1.0" "#,
    r#"xmlns:svg="urn:oasis:names:tc:opendocument:xmlns:svg-compatible:1.0" "#,
    r#"xmlns:meta="urn:oasis:names:tc:opendocument:xmlns:meta:1.0" "#,
    r#"xmlns:dc="http://purl.org/dc/elements/1.1/""#,
);

/// `fo:text-align` value for an alignment.
fn text_align(alignment: Alignment) -> &'static str {
    match alignment {
        Alignment::Left => "start",
        Alignment::Right => "end",
        Alignment::Center => "center",
        Alignment::Justified => "justify",
    }
}

/// One automatic paragraph style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ParagraphStyle {
    parent: &'static str,
    align: &'static str,
    indent_level: u32,
    break_before: bool,
}

/// Automatic styles in order of first use; style `n` is named `P{n + 1}`.
#[derive(Default)]
struct StyleTable {
    styles: Vec<ParagraphStyle>,
}

impl StyleTable {
    fn name_for(&mut self, style: ParagraphStyle) -> String {
        let position = match self.styles.iter().position(|s| *s == style) {
            Some(position) => position,
            None => {
                self.styles.push(style);
                self.styles.len() - 1
            }
        };
        format!("P{}", position + 1)
    }

    fn to_xml(&self) -> String {
        let mut xml = String::new();
        for (i, style) in self.styles.iter().enumerate() {
            let mut props = format!(r#"fo:text-align="{}""#, style.align);
            if style.indent_level > 0 {
                let margin = INDENT_STEP_CM * style.indent_level as f32;
                props.push_str(&format!(r#" fo:margin-left="{margin:.2}cm""#));
            }
            if style.break_before {
                props.push_str(r#" fo:break-before="page""#);
            }
            xml.push_str(&format!(
                r#"<style:style style:name="P{}" style:family="paragraph" style:parent-style-name="{}"><style:paragraph-properties {props}/></style:style>"#,
                i + 1,
                style.parent,
            ));
        }
        xml
    }
}

/// Writes `.odt` packages for word processors.
#[derive(Debug, Clone)]
pub struct OdtAssembler {
    output: OutputConfig,
    title: String,
}

impl OdtAssembler {
    /// Fonts, body alignment, paper and margins come from `output`.
    pub fn new(output: OutputConfig) -> Self {
        Self {
            output,
            title: "Satzwerk Document".into(),
        }
    }

    /// Set the `dc:title` of the document metadata.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    fn paragraph_style(&self, block: &Block, break_before: bool) -> ParagraphStyle {
        let (parent, alignment) = match block.role {
            BlockRole::Heading => ("Title", block.alignment),
            BlockRole::Placeholder => ("Placeholder", block.alignment),
            BlockRole::Paragraph => match block.alignment {
                Alignment::Left | Alignment::Justified => ("TextBody", self.output.text_align),
                other => ("TextBody", other),
            },
        };
        ParagraphStyle {
            parent,
            align: text_align(alignment),
            indent_level: block.indent_level,
            break_before,
        }
    }

    /// The `content.xml` part.
    pub(crate) fn content_xml(&self, model: &DocumentModel) -> String {
        let mut table = StyleTable::default();
        let mut body = String::new();

        for (position, page) in model.pages().enumerate() {
            let mut break_before = self.output.page_break && position > 0;
            if page.blocks.is_empty() && self.output.page_break {
                let style = ParagraphStyle {
                    parent: "TextBody",
                    align: text_align(self.output.text_align),
                    indent_level: 0,
                    break_before,
                };
                body.push_str(&format!(r#"<text:p text:style-name="{}"/>"#, table.name_for(style)));
                continue;
            }
            for block in &page.blocks {
                let name = table.name_for(self.paragraph_style(block, break_before));
                break_before = false;
                body.push_str(&format!(
                    r#"<text:p text:style-name="{name}">{}</text:p>"#,
                    paragraph_text(&block.text())
                ));
            }
        }

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><office:document-content {NAMESPACES} office:version="{ODF_VERSION}"><office:automatic-styles>{}</office:automatic-styles><office:body><office:text>{body}</office:text></office:body></office:document-content>"#,
            table.to_xml()
        )
    }

    /// The `styles.xml` part.
    pub(crate) fn styles_xml(&self) -> String {
        let font = escape(self.output.font_name.as_str());
        let quoted = format!("'{}'", self.output.font_name);
        let family = escape(quoted.as_str());
        let (width_mm, height_mm) = self.output.paper_size.dimensions_mm();
        let margin = self.output.margin_mm;
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?>"#,
                r#"<office:document-styles {ns} office:version="{version}">"#,
                r#"<office:font-face-decls><style:font-face style:name="{font}" svg:font-family="{family}"/></office:font-face-decls>"#,
                r#"<office:styles>"#,
                r#"<style:style style:name="TextBody" style:family="paragraph">"#,
                r#"<style:paragraph-properties fo:text-align="{align}"/>"#,
                r#"<style:text-properties style:font-name="{font}" fo:font-size="{size}pt"/>"#,
                r#"</style:style>"#,
                r#"<style:style style:name="Title" style:family="paragraph" style:parent-style-name="TextBody">"#,
                r#"<style:paragraph-properties fo:text-align="center" fo:margin-bottom="{title_space}cm"/>"#,
                r#"<style:text-properties fo:font-size="{heading}pt" fo:font-weight="bold"/>"#,
                r#"</style:style>"#,
                r#"<style:style style:name="Placeholder" style:family="paragraph" style:parent-style-name="TextBody">"#,
                r#"<style:text-properties fo:font-style="italic"/>"#,
                r#"</style:style>"#,
                r#"</office:styles>"#,
                r#"<office:automatic-styles><style:page-layout style:name="pm1">"#,
                r#"<style:page-layout-properties fo:page-width="{width}mm" fo:page-height="{height}mm" "#,
                r#"fo:margin-top="{margin}mm" fo:margin-bottom="{margin}mm" fo:margin-left="{margin}mm" fo:margin-right="{margin}mm"/>"#,
                r#"</style:page-layout></office:automatic-styles>"#,
                r#"<office:master-styles><style:master-page style:name="Standard" style:page-layout-name="pm1"/></office:master-styles>"#,
                r#"</office:document-styles>"#,
            ),
            ns = NAMESPACES,
            version = ODF_VERSION,
            font = font,
            family = family,
            align = text_align(self.output.text_align),
            size = self.output.font_size_pt,
            title_space = TITLE_SPACE_BELOW_CM,
            heading = self.output.heading_font_size_pt,
            width = width_mm,
            height = height_mm,
            margin = margin,
        )
    }

    fn meta_xml(&self) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><office:document-meta {NAMESPACES} office:version="{ODF_VERSION}"><office:meta><meta:generator>Satzwerk/{}</meta:generator><dc:title>{}</dc:title></office:meta></office:document-meta>"#,
            env!("CARGO_PKG_VERSION"),
            escape(self.title.as_str()),
        )
    }
}

/// Escape block text, turning tabs into `<text:tab/>`.
fn paragraph_text(text: &str) -> String {
    text.split('\t')
        .map(|piece| escape(piece))
        .collect::<Vec<Cow<'_, str>>>()
        .join("<text:tab/>")
}

fn manifest_xml() -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<manifest:manifest xmlns:manifest="urn:oasis:names:tc:opendocument:xmlns:manifest:1.0" manifest:version="{version}">"#,
            r#"<manifest:file-entry manifest:full-path="/" manifest:version="{version}" manifest:media-type="{mimetype}"/>"#,
            r#"<manifest:file-entry manifest:full-path="content.xml" manifest:media-type="text/xml"/>"#,
            r#"<manifest:file-entry manifest:full-path="styles.xml" manifest:media-type="text/xml"/>"#,
            r#"<manifest:file-entry manifest:full-path="meta.xml" manifest:media-type="text/xml"/>"#,
            r#"</manifest:manifest>"#,
        ),
        version = ODF_VERSION,
        mimetype = MIMETYPE,
    )
}

/// Zip the parts behind an uncompressed `mimetype` entry.
fn package(parts: &[(&str, String)]) -> zip::result::ZipResult<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    zip.start_file("mimetype", stored)?;
    zip.write_all(MIMETYPE.as_bytes())?;

    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, xml) in parts {
        zip.start_file(*name, deflated)?;
        zip.write_all(xml.as_bytes())?;
    }
    Ok(zip.finish()?.into_inner())
}

impl DocumentAssembler for OdtAssembler {
    #[instrument(skip_all, fields(pages = model.page_count()))]
    fn assemble(&self, model: &DocumentModel) -> Result<Vec<u8>> {
        info!(font = %self.output.font_name, title = %self.title, "Creating ODT");
        let content = self.content_xml(model);
        debug!(content_bytes = content.len(), "content part built");
        package(&[
            ("META-INF/manifest.xml", manifest_xml()),
            ("content.xml", content),
            ("styles.xml", self.styles_xml()),
            ("meta.xml", self.meta_xml()),
        ])
        .map_err(|err| SatzwerkError::OdtError(err.to_string()))
    }

    fn extension(&self) -> &'static str {
        "odt"
    }
}
