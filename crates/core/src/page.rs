//! Page inputs consumed by the table engine.
//!
//! A page arrives pre-rendered: an RGBA raster plus the geometric primitives
//! produced upstream (text spans with glyph boxes, background glyph regions,
//! caption object boxes and document text lines).

use std::sync::Arc;

use memmap2::Mmap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TableError};
use crate::utils::{Bbox, HasBbox, bbox_of};

/// Luma weights applied to 8-bit RGB before normalising to 0..1.
const LUMA_R: f64 = 0.2989;
const LUMA_G: f64 = 0.587;
const LUMA_B: f64 = 0.114;

/// Pixel bytes, either owned or a shared read-only file mapping.
#[derive(Clone, Debug)]
enum PixelBytes {
    Owned(Vec<u8>),
    Shared(Arc<Mmap>),
}

impl PixelBytes {
    fn as_slice(&self) -> &[u8] {
        match self {
            Self::Owned(data) => data,
            Self::Shared(map) => map,
        }
    }

    /// Owned bytes, copying a mapping on first write.
    fn to_mut(&mut self) -> &mut [u8] {
        if let Self::Shared(map) = self {
            *self = Self::Owned(map.to_vec());
        }
        let Self::Owned(data) = self else {
            return &mut [];
        };
        data
    }
}

/// Row-major RGBA raster of one page.
#[derive(Clone, Debug)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: PixelBytes,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        check_size(width, height, data.len())?;
        Ok(Self {
            width,
            height,
            data: PixelBytes::Owned(data),
        })
    }

    /// Wraps a mapped raw RGBA file without copying it.
    pub fn from_mmap(width: u32, height: u32, map: Mmap) -> Result<Self> {
        check_size(width, height, map.len())?;
        Ok(Self {
            width,
            height,
            data: PixelBytes::Shared(Arc::new(map)),
        })
    }

    /// An all-white opaque page.
    pub fn blank(width: u32, height: u32) -> Result<Self> {
        Self::new(width, height, vec![255; width as usize * height as usize * 4])
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_slice()
    }

    #[inline]
    fn offset(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * 4)
    }

    /// Normalised luma at `(x, y)`. Reads outside the page are blank paper.
    #[inline]
    pub fn luma(&self, x: i64, y: i64) -> f64 {
        match self.offset(x, y) {
            Some(i) => {
                let px = &self.data.as_slice()[i..i + 3];
                (LUMA_R * px[0] as f64 + LUMA_G * px[1] as f64 + LUMA_B * px[2] as f64) / 255.0
            }
            None => 1.0,
        }
    }

    #[inline]
    pub fn is_ink(&self, x: i64, y: i64, threshold: f64) -> bool {
        self.luma(x, y) < threshold
    }

    /// Paints the inclusive rectangle `[x0, x1] x [y0, y1]` with an opaque colour,
    /// clipped to the page.
    pub fn paint_rect(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, rgb: [u8; 3]) {
        let x0 = x0.max(0);
        let y0 = y0.max(0);
        let x1 = x1.min(self.width as i64 - 1);
        let y1 = y1.min(self.height as i64 - 1);
        if x1 < x0 || y1 < y0 {
            return;
        }
        let stride = self.width as usize * 4;
        let data = self.data.to_mut();
        for y in y0..=y1 {
            for x in x0..=x1 {
                let i = y as usize * stride + x as usize * 4;
                data[i..i + 4].copy_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
            }
        }
    }
}

fn check_size(width: u32, height: u32, got: usize) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(TableError::EmptyPage { width, height });
    }
    let expected = width as usize * height as usize * 4;
    if got != expected {
        return Err(TableError::BufferSize {
            width,
            height,
            expected,
            got,
        });
    }
    Ok(())
}

/// One rendered glyph of a span.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Glyph {
    pub bbox: Bbox,
}

impl HasBbox for Glyph {
    fn bbox(&self) -> Bbox {
        self.bbox
    }
}

/// A leaf text fragment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub id: usize,
    pub bbox: Bbox,
    #[serde(default)]
    pub glyphs: Vec<Glyph>,
    pub text: String,
    /// Set on fragments produced by [`Span::split_at_spaces`].
    #[serde(default)]
    pub split_from: Option<usize>,
}

impl HasBbox for Span {
    fn bbox(&self) -> Bbox {
        self.bbox
    }
}

impl Span {
    pub fn new(id: usize, bbox: Bbox, text: impl Into<String>) -> Self {
        Self {
            id,
            bbox,
            glyphs: Vec::new(),
            text: text.into(),
            split_from: None,
        }
    }

    pub fn with_glyphs(mut self, glyphs: Vec<Glyph>) -> Self {
        self.glyphs = glyphs;
        self
    }

    /// Whitespace-only text with no ink of its own.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Splits the span into one fragment per whitespace-separated word.
    ///
    /// Glyphs are distributed over the words one per non-space character when
    /// the counts agree; otherwise the widest gaps between consecutive glyphs
    /// become the cut points. Returns an empty list when the span cannot be
    /// split (a single word, or fewer glyphs than words). Fragment ids are
    /// taken from `next_id`.
    pub fn split_at_spaces(&self, next_id: &mut usize) -> Vec<Span> {
        let words: Vec<&str> = self.text.split_whitespace().collect();
        if words.len() < 2 || self.glyphs.len() < words.len() {
            return Vec::new();
        }
        let mut glyphs = self.glyphs.clone();
        glyphs.sort_by(|a, b| a.bbox.min_x.total_cmp(&b.bbox.min_x));

        let char_count: usize = words.iter().map(|w| w.chars().count()).sum();
        let groups: Vec<&[Glyph]> = if char_count == glyphs.len() {
            let mut out = Vec::with_capacity(words.len());
            let mut start = 0;
            for w in &words {
                let n = w.chars().count();
                out.push(&glyphs[start..start + n]);
                start += n;
            }
            out
        } else {
            let mut gaps: Vec<(usize, f64)> = glyphs
                .windows(2)
                .enumerate()
                .map(|(i, w)| (i, w[1].bbox.min_x - w[0].bbox.max_x))
                .collect();
            gaps.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
            let mut cuts: Vec<usize> = gaps.iter().take(words.len() - 1).map(|g| g.0 + 1).collect();
            cuts.sort_unstable();
            let mut out = Vec::with_capacity(words.len());
            let mut start = 0;
            for cut in cuts {
                out.push(&glyphs[start..cut]);
                start = cut;
            }
            out.push(&glyphs[start..]);
            out
        };

        let root = self.split_from.unwrap_or(self.id);
        words
            .iter()
            .zip(groups)
            .map(|(word, group)| {
                let g = bbox_of(group);
                let id = *next_id;
                *next_id += 1;
                Span {
                    id,
                    bbox: Bbox::new(g.min_x, self.bbox.min_y, g.max_x, self.bbox.max_y),
                    glyphs: group.to_vec(),
                    text: (*word).to_string(),
                    split_from: Some(root),
                }
            })
            .collect()
    }
}

/// A document text line, used to anchor tables in reading order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    pub id: String,
    pub bbox: Bbox,
}

/// Everything the engine needs to analyse one page.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PageInput {
    pub index: usize,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub spans: Vec<Span>,
    #[serde(default)]
    pub background_boxes: Vec<Bbox>,
    /// Object boxes of figure captions; background boxes inside them are figures.
    #[serde(default)]
    pub caption_boxes: Vec<Bbox>,
    #[serde(default)]
    pub lines: Vec<TextLine>,
    #[serde(skip)]
    pub pixels: Option<PixelBuffer>,
}

impl PageInput {
    pub fn new(index: usize, width: u32, height: u32) -> Self {
        Self {
            index,
            width,
            height,
            ..Default::default()
        }
    }

    /// Width of the widest span on the page.
    pub fn widest_span(&self) -> f64 {
        self.spans
            .iter()
            .map(|s| s.bbox.width())
            .fold(0.0, f64::max)
    }

    /// Spans with strictly positive extent.
    pub fn valid_spans(&self) -> Vec<Span> {
        self.spans.iter().filter(|s| s.bbox.is_valid()).cloned().collect()
    }

    /// Background boxes with strictly positive extent.
    pub fn valid_boxes(&self) -> Vec<Bbox> {
        self.background_boxes.iter().copied().filter(Bbox::is_valid).collect()
    }
}
