use std::env;

use tabulon_core::utils::Bbox;
use tabulon_core::{Glyph, PageInput, PixelBuffer, Span};

/// Document lengths benchmarked, from `TABULON_BENCH_PAGES` (comma separated).
pub fn page_counts() -> Vec<usize> {
    let counts: Vec<usize> = env::var("TABULON_BENCH_PAGES")
        .unwrap_or_default()
        .split(',')
        .filter_map(|n| n.trim().parse().ok())
        .collect();
    if counts.is_empty() { vec![1, 8] } else { counts }
}

fn span(id: usize, x0: f64, y0: f64, text: &str) -> Span {
    let w = 8.0;
    let glyphs: Vec<Glyph> = (0..text.len())
        .map(|i| Glyph {
            bbox: Bbox::new(x0 + w * i as f64, y0, x0 + w * (i + 1) as f64, y0 + 12.0),
        })
        .collect();
    let x1 = x0 + w * text.len() as f64;
    Span::new(id, Bbox::new(x0, y0, x1, y0 + 12.0), text).with_glyphs(glyphs)
}

/// A 1240x1754 page with three ruled 4x5 grids and one unruled 3x3 block.
///
/// Cell text is offset by a jitter derived from the page index, so pages of
/// one document differ without any random state.
pub fn synthetic_page(index: usize) -> PageInput {
    let mut page = PageInput::new(index, 1240, 1754);
    let mut pixels = PixelBuffer::blank(1240, 1754).unwrap();
    let mut id = 0;

    for t in 0..3 {
        let (x0, y0) = (100i64, 100 + t * 500);
        let xs: Vec<i64> = (0..=4).map(|k| x0 + k * 200).collect();
        let ys: Vec<i64> = (0..=5).map(|k| y0 + k * 60).collect();
        for &x in &xs {
            pixels.paint_rect(x, ys[0], x, ys[5], [0, 0, 0]);
        }
        for &y in &ys {
            pixels.paint_rect(xs[0], y, xs[4], y, [0, 0, 0]);
        }
        page.background_boxes.push(Bbox::new(
            xs[0] as f64,
            ys[0] as f64,
            xs[4] as f64,
            ys[5] as f64,
        ));
        for r in 0..5 {
            for c in 0..4 {
                let jitter = ((index * 7 + r * 5 + c * 3) % 11) as f64;
                let x = xs[c] as f64 + 20.0 + jitter * 4.0;
                let y = ys[r] as f64 + 20.0 + jitter;
                page.spans.push(span(id, x, y, "cell"));
                id += 1;
            }
        }
    }

    for r in 0..3 {
        for c in 0..3 {
            let x = 100.0 + c as f64 * 300.0;
            let y = 1500.0 + r as f64 * 50.0;
            page.spans.push(span(id, x, y, "value"));
            id += 1;
        }
    }

    page.pixels = Some(pixels);
    page
}
