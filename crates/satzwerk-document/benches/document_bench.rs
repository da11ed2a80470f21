// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the satzwerk-document crate: TSV parsing and
// document assembly over a synthetic multi-page model.

use std::fmt::Write;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use satzwerk_core::config::OutputConfig;
use satzwerk_core::{
    Alignment, Block, BlockRole, DocumentModel, Line, Page, PageResult, PageSize, Rect, Run,
};
use satzwerk_document::{DocumentAssembler, PdfAssembler, TextAssembler, parse_tsv};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A Tesseract TSV page with 40 lines of 10 words.
fn synthetic_tsv() -> String {
    let mut tsv = String::from(
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n",
    );
    tsv.push_str("1\t1\t0\t0\t0\t0\t0\t0\t2480\t3508\t-1\t\n");
    for line in 0..40 {
        for word in 0..10 {
            let _ = writeln!(
                tsv,
                "5\t1\t1\t1\t{line}\t{word}\t{}\t{}\t140\t40\t91.5\tword{word}",
                200 + word * 160,
                300 + line * 70,
            );
        }
    }
    tsv
}

/// 50 pages of three ten-line paragraphs.
fn synthetic_model() -> DocumentModel {
    let mut model = DocumentModel::new();
    for index in 0..50u32 {
        let blocks = (0..3)
            .map(|b| {
                let lines = (0..10)
                    .map(|l| {
                        let top = 100.0 + (b * 12 + l) as f32 * 30.0;
                        let bbox = Rect::new(100.0, top, 800.0, 20.0).expect("rect");
                        Line {
                            runs: vec![Run {
                                text: "the quick brown fox jumps over the lazy dog".into(),
                                bbox,
                                confidence: 0.95,
                                low_confidence: false,
                            }],
                            bbox,
                            baseline_y: top + 16.0,
                        }
                    })
                    .collect();
                Block {
                    lines,
                    indent_level: 0,
                    alignment: Alignment::Justified,
                    role: BlockRole::Paragraph,
                }
            })
            .collect();
        model.merge(PageResult::Ok(Page::recognized(
            index,
            PageSize::new(1000.0, 1400.0),
            blocks,
        )));
    }
    model
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_parse_tsv(c: &mut Criterion) {
    let tsv = synthetic_tsv();
    c.bench_function("parse_tsv (400 words)", |b| {
        b.iter(|| black_box(parse_tsv(black_box(&tsv), 0)));
    });
}

fn bench_assembly(c: &mut Criterion) {
    let model = synthetic_model();
    let pdf = PdfAssembler::new(OutputConfig::default());

    c.bench_function("assemble_text (50 pages)", |b| {
        b.iter(|| black_box(TextAssembler.render(black_box(&model))));
    });
    c.bench_function("assemble_pdf (50 pages)", |b| {
        b.iter(|| black_box(pdf.assemble(black_box(&model))));
    });
}

criterion_group!(benches, bench_parse_tsv, bench_assembly);
criterion_main!(benches);
