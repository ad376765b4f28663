//! Bordered table detection from ruling lines in the page raster.
//!
//! The candidate region is projected onto both axes as counts of dark pixels
//! per pixel row and column. Spikes in those projections are ruling lines;
//! consecutive lines bound the cells of a raw grid, and neighbouring cells
//! whose shared border carries no rule are merged.

use tracing::{debug, trace};

use super::candidates::{Candidate, classify};
use super::finder::PageContext;
use super::text::assign_spans;
use super::types::{Cell, Row, Table, TableSource};
use crate::error::{Result, TableError};
use crate::page::{PageInput, PixelBuffer};
use crate::params::TableParams;
use crate::utils::Bbox;

/// Dark-pixel counts of a region, per pixel row and per pixel column.
///
/// Both vectors are indexed by offset from the region origin and cover the
/// region inclusively.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InkAccumulator {
    pub rows: Vec<u32>,
    pub cols: Vec<u32>,
}

impl InkAccumulator {
    pub fn fill(
        pixels: &PixelBuffer,
        x0: i64,
        y0: i64,
        x1: i64,
        y1: i64,
        luma_threshold: f64,
    ) -> Self {
        let w = (x1 - x0 + 1).max(0) as usize;
        let h = (y1 - y0 + 1).max(0) as usize;
        let mut rows = vec![0u32; h];
        let mut cols = vec![0u32; w];
        for y in y0..=y1 {
            for x in x0..=x1 {
                if pixels.is_ink(x, y, luma_threshold) {
                    rows[(y - y0) as usize] += 1;
                    cols[(x - x0) as usize] += 1;
                }
            }
        }
        Self { rows, cols }
    }
}

/// Finds ruling lines in one projection.
///
/// The first and last positions (`tkn` from either end) always count as lines.
/// In between, a position is a line when the ink summed over the `tkn`
/// positions ending at it exceeds `threshold`; after a hit the scan skips
/// `3 * tkn` positions. A hit no farther than `min_dist` from the previous
/// line is discarded. Returns offsets in ascending order.
pub fn detect_lines(accum: &[u32], tkn: usize, threshold: f64, min_dist: f64) -> Vec<usize> {
    let max_d = accum.len().saturating_sub(1);
    let mut lines = vec![tkn];
    let mut last = tkn;
    let mut p = 3 * tkn + 1;
    while p + 3 * tkn + 1 <= max_d {
        let ink: u32 = (0..tkn).map(|k| accum[p - k]).sum();
        if ink as f64 > threshold && (p - last) as f64 > min_dist {
            lines.push(p);
            p += 3 * tkn;
            last = p;
        }
        p += 1;
    }
    let end = max_d.saturating_sub(tkn);
    if end > last && (end - last) as f64 > min_dist {
        lines.push(end);
    }
    lines
}

/// Vertical and horizontal line thresholds for a table of the given size.
///
/// Pages smaller than the reference raster scale both thresholds down;
/// a table that is small relative to the page uses half the unscaled value
/// on the affected axis instead.
pub(crate) fn line_thresholds(
    params: &TableParams,
    page_w: f64,
    page_h: f64,
    table_w: f64,
    table_h: f64,
) -> (f64, f64) {
    let vthr = params.vline_threshold;
    let hthr = params.hline_threshold;
    // The page test compares against the portrait reference raster.
    if page_w < params.reference_height && page_h < params.reference_width {
        let mut v = (vthr * page_h / params.reference_height).round();
        let mut h = (hthr * page_w / params.reference_width).round();
        if table_w / page_w < params.small_table_width_ratio {
            h = (hthr / 2.0).round();
        }
        if table_h / page_h < params.small_table_height_ratio {
            v = (vthr / 2.0).round();
        }
        (v, h)
    } else {
        (vthr, hthr)
    }
}

/// One cell of the raw grid in page pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridCell {
    pub min_x: i64,
    pub min_y: i64,
    pub max_x: i64,
    pub max_y: i64,
    /// Absorbed by the cell to its left.
    pub merged_right: bool,
    /// Absorbed by the cell above.
    pub merged_down: bool,
}

impl GridCell {
    pub fn bbox(&self) -> Bbox {
        Bbox::new(self.min_x as f64, self.min_y as f64, self.max_x as f64, self.max_y as f64)
    }

    pub fn survives(&self) -> bool {
        !self.merged_right && !self.merged_down
    }
}

/// Cells spanned by consecutive ruling lines, before and after merging.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawGrid {
    /// Vertical line positions, ascending.
    pub xs: Vec<i64>,
    /// Horizontal line positions, ascending.
    pub ys: Vec<i64>,
    pub cells: Vec<Vec<GridCell>>,
}

impl RawGrid {
    pub fn new(xs: Vec<i64>, ys: Vec<i64>) -> Self {
        let cells = ys
            .windows(2)
            .map(|yy| {
                xs.windows(2)
                    .map(|xx| GridCell {
                        min_x: xx[0],
                        min_y: yy[0],
                        max_x: xx[1],
                        max_y: yy[1],
                        merged_right: false,
                        merged_down: false,
                    })
                    .collect()
            })
            .collect();
        Self { xs, ys, cells }
    }

    pub fn rows(&self) -> usize {
        self.ys.len().saturating_sub(1)
    }

    pub fn columns(&self) -> usize {
        self.xs.len().saturating_sub(1)
    }

    /// Merges horizontally adjacent cells whose shared vertical border has no
    /// rule. Returns the number of cells newly absorbed.
    pub fn merge_right(&mut self, pixels: &PixelBuffer, params: &TableParams) -> usize {
        let (rows, cols) = (self.rows(), self.columns());
        let mut merged = 0;
        for r in 0..rows {
            for c in 0..cols {
                if self.cells[r][c].merged_right {
                    continue;
                }
                for q in c..cols.saturating_sub(1) {
                    if self.cells[r][q + 1].merged_right {
                        continue;
                    }
                    let ruled = vertical_rule(
                        pixels,
                        self.xs[q + 1],
                        self.ys[r],
                        self.ys[r + 1],
                        params,
                    );
                    if ruled {
                        break;
                    }
                    self.cells[r][c].max_x = self.cells[r][q + 1].max_x;
                    self.cells[r][q + 1].merged_right = true;
                    merged += 1;
                }
            }
        }
        merged
    }

    /// Merges vertically adjacent cells whose shared horizontal border has no
    /// rule. Returns the number of cells newly absorbed.
    pub fn merge_down(&mut self, pixels: &PixelBuffer, params: &TableParams) -> usize {
        let (rows, cols) = (self.rows(), self.columns());
        let mut merged = 0;
        for c in 0..cols {
            for r in 0..rows {
                if self.cells[r][c].merged_down {
                    continue;
                }
                for q in r..rows.saturating_sub(1) {
                    if self.cells[q + 1][c].merged_down {
                        continue;
                    }
                    let span = self.cells[q][c];
                    let ruled =
                        horizontal_rule(pixels, self.ys[q + 1], span.min_x, span.max_x, params);
                    if ruled {
                        break;
                    }
                    self.cells[r][c].max_y = self.cells[q + 1][c].max_y;
                    self.cells[q + 1][c].merged_down = true;
                    merged += 1;
                }
            }
        }
        merged
    }

    /// Runs both merge passes; returns the total number of absorbed cells.
    pub fn merge(&mut self, pixels: &PixelBuffer, params: &TableParams) -> usize {
        self.merge_right(pixels, params) + self.merge_down(pixels, params)
    }

    pub fn row_span(&self, r: usize, c: usize) -> usize {
        1 + self.cells[r + 1..]
            .iter()
            .take_while(|row| row[c].merged_down)
            .count()
    }

    pub fn col_span(&self, r: usize, c: usize) -> usize {
        1 + self.cells[r][c + 1..]
            .iter()
            .take_while(|cell| cell.merged_right)
            .count()
    }
}

/// Any pixel column in the band around `x` holding more than the limit of
/// dark pixels over `[y0, y1)`.
fn vertical_rule(pixels: &PixelBuffer, x: i64, y0: i64, y1: i64, params: &TableParams) -> bool {
    let band = params.merge_band;
    (x - band..=x + band).any(|xx| {
        (y0..y1)
            .filter(|&y| pixels.is_ink(xx, y, params.ink_luma_threshold))
            .count()
            > params.row_merge_ink
    })
}

/// Any pixel row in the band around `y` holding more than the limit of dark
/// pixels over `[x0, x1)`.
fn horizontal_rule(pixels: &PixelBuffer, y: i64, x0: i64, x1: i64, params: &TableParams) -> bool {
    let band = params.merge_band;
    (y - band..=y + band).any(|yy| {
        (x0..x1)
            .filter(|&x| pixels.is_ink(x, yy, params.ink_luma_threshold))
            .count()
            > params.col_merge_ink
    })
}

/// Detects a ruled grid inside `region` and assembles it into a table.
///
/// Returns `Ok(None)` when the region holds too few spans, is narrower than
/// the widest span on the page, or shows fewer than three lines on either
/// axis. Fails when the page has no pixel buffer or no spans at all.
pub fn detect_bordered(
    region: &Bbox,
    page: &PageInput,
    params: &TableParams,
    ctx: &mut PageContext,
) -> Result<Option<Table>> {
    let pixels = page
        .pixels
        .as_ref()
        .ok_or(TableError::MissingPixels { page: page.index })?;
    if page.spans.is_empty() {
        return Err(TableError::NoSpans {
            detector: "bordered",
        });
    }
    let verdict = classify(region, &page.spans, page.widest_span(), params);
    if verdict != Candidate::Table {
        debug!(
            reason = verdict.reason(),
            x0 = region.min_x,
            y0 = region.min_y,
            "bordered candidate rejected"
        );
        return Ok(None);
    }

    let Some(mut grid) = raw_grid(region, pixels, page, params) else {
        return Ok(None);
    };
    let merged = grid.merge(pixels, params);
    trace!(
        rows = grid.rows(),
        cols = grid.columns(),
        merged,
        "raw grid"
    );

    let mut table = Table::new(ctx.next_table_id(), page.index, TableSource::Bordered, *region);
    table.columns = grid.columns();
    let left = *grid.xs.first().unwrap_or(&0) as f64;
    let right = *grid.xs.last().unwrap_or(&0) as f64;
    for r in 0..grid.rows() {
        let mut row = Row::new(r);
        row.boundary_box = Bbox::new(left, grid.ys[r] as f64, right, grid.ys[r + 1] as f64);
        for c in 0..grid.columns() {
            let gc = grid.cells[r][c];
            if !gc.survives() {
                continue;
            }
            let mut cell = Cell::new(row.cells.len());
            cell.boundary_box = gc.bbox();
            cell.row_span = grid.row_span(r, c);
            cell.col_span = grid.col_span(r, c);
            row.cells.push(cell);
        }
        table.rows.push(row);
    }

    assign_spans(&mut table, &page.spans, &mut ctx.next_span);
    for row in &mut table.rows {
        for cell in &row.cells {
            row.span_box.update_box(&cell.span_box);
        }
        table.span_box.update_box(&row.span_box);
    }
    Ok(Some(table))
}

/// Line detection over `region`; `None` when either axis has fewer than three lines.
fn raw_grid(
    region: &Bbox,
    pixels: &PixelBuffer,
    page: &PageInput,
    params: &TableParams,
) -> Option<RawGrid> {
    let x0 = (region.min_x.round() as i64).max(0);
    let y0 = (region.min_y.round() as i64).max(0);
    let x1 = (region.max_x.round() as i64).min(pixels.width() as i64 - 1);
    let y1 = (region.max_y.round() as i64).min(pixels.height() as i64 - 1);
    if x1 <= x0 || y1 <= y0 {
        debug!(reason = "empty region", "bordered candidate rejected");
        return None;
    }

    let page_w = page.width as f64;
    let page_h = page.height as f64;
    let (vthr, hthr) = line_thresholds(params, page_w, page_h, region.width(), region.height());
    let (dist_x, dist_y) = params.scaled_line_dist(page_w, page_h);
    let accum = InkAccumulator::fill(pixels, x0, y0, x1, y1, params.ink_luma_threshold);

    // Horizontal rules are collapsed with the width-scaled distance, vertical
    // rules with the height-scaled one.
    let horizontal = detect_lines(&accum.rows, params.line_thickness, hthr, dist_x);
    let vertical = detect_lines(&accum.cols, params.line_thickness, vthr, dist_y);
    trace!(?horizontal, ?vertical, vthr, hthr, "ruling lines");
    if horizontal.len() < 3 || vertical.len() < 3 {
        debug!(
            reason = "too few ruling lines",
            horizontal = horizontal.len(),
            vertical = vertical.len(),
            "bordered candidate rejected"
        );
        return None;
    }

    let xs = vertical.into_iter().map(|o| x0 + o as i64).collect();
    let ys = horizontal.into_iter().map(|o| y0 + o as i64).collect();
    Some(RawGrid::new(xs, ys))
}
