//! Synthetic pages shared by the integration tests.

#![allow(dead_code)]

use tabulon_core::utils::Bbox;
use tabulon_core::{Glyph, PageInput, PixelBuffer, Span, TextLine};

/// A span with one glyph per non-space character, spread evenly.
pub fn span(id: usize, x0: f64, y0: f64, x1: f64, y1: f64, text: &str) -> Span {
    let n = text.chars().filter(|c| !c.is_whitespace()).count().max(1);
    let w = (x1 - x0) / n as f64;
    let glyphs = (0..n)
        .map(|i| Glyph {
            bbox: Bbox::new(x0 + w * i as f64, y0, x0 + w * (i + 1) as f64, y1),
        })
        .collect();
    Span::new(id, Bbox::new(x0, y0, x1, y1), text).with_glyphs(glyphs)
}

pub fn line(id: &str, x0: f64, y0: f64, x1: f64, y1: f64) -> TextLine {
    TextLine {
        id: id.to_string(),
        bbox: Bbox::new(x0, y0, x1, y1),
    }
}

/// Paints one-pixel rules at `xs` spanning `ys` and at `ys` spanning `xs`.
pub fn rules(pixels: &mut PixelBuffer, xs: &[i64], ys: &[i64]) {
    let (x0, x1) = (xs[0], xs[xs.len() - 1]);
    let (y0, y1) = (ys[0], ys[ys.len() - 1]);
    for &x in xs {
        pixels.paint_rect(x, y0, x, y1, [0, 0, 0]);
    }
    for &y in ys {
        pixels.paint_rect(x0, y, x1, y, [0, 0, 0]);
    }
}

/// A 500x400 page holding a ruled 2x2 grid over (100,100)-(400,300).
pub fn ruled_page() -> PageInput {
    let mut page = PageInput::new(0, 500, 400);
    let mut pixels = PixelBuffer::blank(500, 400).unwrap();
    rules(&mut pixels, &[100, 250, 400], &[100, 200, 300]);
    page.pixels = Some(pixels);
    page.background_boxes = vec![Bbox::new(100.0, 100.0, 400.0, 300.0)];
    page.spans = vec![
        span(0, 120.0, 120.0, 160.0, 140.0, "A"),
        span(1, 270.0, 120.0, 310.0, 140.0, "B"),
        span(2, 120.0, 220.0, 160.0, 240.0, "C"),
        span(3, 270.0, 220.0, 310.0, 240.0, "D"),
    ];
    page
}

/// A page with an unruled 2x2 arrangement of spans and nothing else.
pub fn unruled_page(index: usize) -> PageInput {
    let mut page = PageInput::new(index, 600, 800);
    page.spans = vec![
        span(0, 0.0, 0.0, 50.0, 20.0, "A"),
        span(1, 200.0, 0.0, 250.0, 20.0, "B"),
        span(2, 0.0, 60.0, 50.0, 80.0, "C"),
        span(3, 200.0, 60.0, 250.0, 80.0, "D"),
    ];
    page
}
