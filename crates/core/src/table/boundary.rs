//! Table reconstruction from span clusters.
//!
//! Works without ruling lines: spans are read in order and grouped into rows
//! by vertical gaps and into cells by horizontal gaps scaled to the text
//! height. Each row is then rescanned at line level (sub-rows), each sub-row
//! cell once more for inner columns, and contiguous boundary boxes are
//! allocated top-down from the table box.

use std::mem;

use itertools::Itertools;
use tracing::{debug, trace};

use super::finder::PageContext;
use super::types::{Cell, Row, Table, TableSource};
use crate::cluster::Cluster;
use crate::page::Span;
use crate::params::TableParams;
use crate::utils::{Bbox, HasBbox, bbox_of};

/// Summary statistics of text heights.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HeightStats {
    pub max: f64,
    pub mean: f64,
    pub rms: f64,
    /// Mean weighted by the slope of a sigmoid centred between the smallest
    /// and largest height, which discounts outliers at either end.
    pub weighted_mean: f64,
}

fn sigmoid(t: f64) -> f64 {
    1.0 / (1.0 + (-t).exp())
}

impl HeightStats {
    pub fn of<T: HasBbox>(items: &[T]) -> Self {
        Self::from_heights(items.iter().map(|i| i.bbox().height()).collect())
    }

    fn of_indices(spans: &[Span], idx: &[usize]) -> Self {
        Self::from_heights(idx.iter().map(|&i| spans[i].bbox.height()).collect())
    }

    /// All zeros for an empty input.
    pub fn from_heights(heights: Vec<f64>) -> Self {
        if heights.is_empty() {
            return Self::default();
        }
        let n = heights.len() as f64;
        let max = heights.iter().copied().fold(f64::MIN, f64::max);
        let min = heights.iter().copied().fold(f64::MAX, f64::min);
        let mean = heights.iter().sum::<f64>() / n;
        let rms = (heights.iter().map(|h| h * h).sum::<f64>() / n).sqrt();
        let mid = (max + min) / 2.0;

        let (weight_sum, weighted) = heights.iter().fold((0.0, 0.0), |(ws, wm), &h| {
            let s = sigmoid(h - mid);
            let w = s * (1.0 - s);
            (ws + w, wm + w * h)
        });
        let weighted_mean = if weight_sum > 0.0 {
            weighted / weight_sum
        } else {
            mean
        };
        Self {
            max,
            mean,
            rms,
            weighted_mean,
        }
    }
}

fn below(upper: &Bbox, b: &Bbox) -> bool {
    b.min_y >= upper.max_y
}

/// `b` starts to the right of `col` with at least `threshold` of clearance.
fn far_right(col: &Bbox, b: &Bbox, threshold: f64) -> bool {
    b.min_x >= col.max_x && b.min_x - col.max_x >= threshold
}

/// First cell sharing some horizontal extent with `b`.
fn in_line(cells: &[Cell], b: &Bbox) -> Option<usize> {
    cells
        .iter()
        .position(|c| b.min_x < c.span_box.max_x && b.max_x > c.span_box.min_x)
}

/// Left-to-right cell builder for one row or sub-row.
struct LineScan {
    cells: Vec<Cell>,
    cur: Cell,
}

impl LineScan {
    fn start(i: usize, b: &Bbox) -> Self {
        let mut cur = Cell::new(0);
        cur.push_span(i, b);
        Self {
            cells: Vec::new(),
            cur,
        }
    }

    fn close(&mut self) {
        if !self.cur.is_empty() {
            let done = mem::replace(&mut self.cur, Cell::new(0));
            self.cells.push(done);
        }
    }

    /// Places a span on the current line: into a new cell after a wide gap,
    /// into an earlier cell it lines up with, or onto the open cell.
    fn place(&mut self, i: usize, b: &Bbox, threshold: f64) {
        let aligned = in_line(&self.cells, b);
        if far_right(&self.cur.span_box, b, threshold) {
            match aligned {
                Some(k) => self.cells[k].push_span(i, b),
                None => {
                    self.close();
                    self.cur.push_span(i, b);
                }
            }
        } else if let Some(k) = aligned {
            self.close();
            self.cells[k].push_span(i, b);
        } else {
            self.cur.push_span(i, b);
        }
    }

    fn finish(mut self) -> Vec<Cell> {
        self.close();
        self.cells
    }
}

/// Groups spans into major rows.
///
/// A span opens a new row when it lies below the row so far, starts left of
/// the row's first cell's right edge, ends before the open cell begins, and
/// every later span also lies below the row.
fn scan_rows(spans: &[Span], order: &[usize], threshold: f64) -> Vec<Row> {
    let mut rows = Vec::new();
    let Some((&first, rest)) = order.split_first() else {
        return rows;
    };
    let mut row = Row::new(0);
    row.push_span(first, &spans[first].bbox);
    let mut line = LineScan::start(first, &spans[first].bbox);

    for (pos, &i) in rest.iter().enumerate() {
        let b = spans[i].bbox;
        let (reference, lead) = match line.cells.first() {
            None => (line.cur.span_box, line.cur.span_box),
            Some(c) => (row.span_box, c.span_box),
        };
        let breaks = below(&reference, &b)
            && b.min_x < lead.max_x
            && line.cur.span_box.min_x >= b.max_x
            && rest[pos + 1..]
                .iter()
                .all(|&j| below(&reference, &spans[j].bbox));
        if breaks {
            row.cells = mem::replace(&mut line, LineScan::start(i, &b)).finish();
            let next = Row::new(rows.len() + 1);
            rows.push(mem::replace(&mut row, next));
            row.push_span(i, &b);
            continue;
        }
        line.place(i, &b, threshold);
        row.push_span(i, &b);
    }
    row.cells = line.finish();
    rows.push(row);
    rows
}

/// Splits a major row into line-level sub-rows.
///
/// A sub-row ends when a span falls back to an earlier column of the row
/// while lying below the open cell. The scan stops at a span that lines up
/// with none of the row's cells.
fn scan_sub_rows(spans: &[Span], row: &Row, threshold: f64) -> Vec<Row> {
    let mut subs = Vec::new();
    let Some((&first, rest)) = row.spans.split_first() else {
        return subs;
    };
    let mut sub = Row::new(0);
    sub.push_span(first, &spans[first].bbox);
    let mut line = LineScan::start(first, &spans[first].bbox);
    let mut column = 0;

    for &i in rest {
        let b = spans[i].bbox;
        let Some(which) = in_line(&row.cells, &b) else {
            trace!(span = spans[i].id, "span outside every column; sub-row scan stopped");
            break;
        };
        if which < column && below(&line.cur.span_box, &b) {
            sub.cells = mem::replace(&mut line, LineScan::start(i, &b)).finish();
            let next = Row::new(subs.len() + 1);
            subs.push(mem::replace(&mut sub, next));
            sub.push_span(i, &b);
            column = which;
            continue;
        }
        column = which;
        line.place(i, &b, threshold);
        sub.push_span(i, &b);
    }
    sub.cells = line.finish();
    subs.push(sub);
    subs
}

fn absorb(into: &mut Cell, from: &Cell, spans: &[Span]) {
    for &s in &from.spans {
        into.push_span(s, &spans[s].bbox);
    }
}

/// Closes `cur`: a column opened by a gap stands alone, anything else folds
/// into the previous column.
fn fold(cols: &mut Vec<Cell>, cur: Cell, split: bool, spans: &[Span]) {
    match cols.last_mut() {
        Some(last) if !split => absorb(last, &cur, spans),
        _ => cols.push(cur),
    }
}

/// Column structure inside one cell.
fn inner_columns(spans: &[Span], cell: &Cell) -> Vec<Cell> {
    let Some((&first, rest)) = cell.spans.split_first() else {
        return Vec::new();
    };
    let threshold = HeightStats::of_indices(spans, &cell.spans).weighted_mean;
    let mut cols: Vec<Cell> = Vec::new();
    let mut cur = Cell::new(0);
    cur.push_span(first, &spans[first].bbox);
    let mut split = false;

    for &i in rest {
        let b = spans[i].bbox;
        if below(&cur.span_box, &b) {
            let mut next = Cell::new(0);
            next.push_span(i, &b);
            fold(&mut cols, mem::replace(&mut cur, next), split, spans);
            split = false;
            continue;
        }
        if far_right(&cur.span_box, &b, threshold) {
            cols.push(mem::replace(&mut cur, Cell::new(0)));
            split = true;
        }
        cur.push_span(i, &b);
    }
    fold(&mut cols, cur, split, spans);
    cols
}

/// Why a reconstructed table is not a table, if it is not.
fn rejection(rows: &[Row], clusters: usize) -> Option<&'static str> {
    if rows.is_empty() {
        return Some("no rows");
    }
    if rows.len() == 1 && rows[0].sub_rows.len() == 1 {
        return Some("single line");
    }
    if clusters <= 1 {
        return Some("single cluster");
    }
    if rows.iter().map(|r| r.cells.len()).max().unwrap_or(0) <= 1 {
        return Some("single column");
    }
    if rows
        .iter()
        .tuple_windows()
        .any(|(a, b)| b.span_box.min_y < a.span_box.max_y)
    {
        return Some("rows overlap");
    }
    if rows.iter().any(|r| {
        r.cells
            .iter()
            .tuple_windows()
            .any(|(a, b)| b.span_box.overlap(&a.span_box))
    }) {
        return Some("cells overlap");
    }
    None
}

/// Stacks rows inside `outer`, cutting midway between neighbours' text.
fn split_rows(rows: &mut [Row], outer: &Bbox) {
    let cuts: Vec<f64> = rows
        .iter()
        .tuple_windows()
        .map(|(a, b)| (a.span_box.max_y + b.span_box.min_y) / 2.0)
        .collect();
    let n = rows.len();
    for (k, row) in rows.iter_mut().enumerate() {
        let top = if k == 0 { outer.min_y } else { cuts[k - 1] };
        let bottom = if k + 1 == n { outer.max_y } else { cuts[k] };
        row.boundary_box = Bbox::new(outer.min_x, top, outer.max_x, bottom);
    }
}

/// Lays cells side by side inside `outer`, each ending where the next one's
/// text begins.
fn split_cells(cells: &mut [Cell], outer: &Bbox) {
    let cuts: Vec<f64> = cells.iter().skip(1).map(|c| c.span_box.min_x).collect();
    let n = cells.len();
    for (k, cell) in cells.iter_mut().enumerate() {
        let left = if k == 0 { outer.min_x } else { cuts[k - 1] };
        let right = if k + 1 == n { outer.max_x } else { cuts[k] };
        cell.boundary_box = Bbox::new(left, outer.min_y, right, outer.max_y);
    }
}

/// Reference columns whose centre falls within `[left, right]`.
fn columns_touched(left: f64, right: f64, refs: &[Bbox]) -> usize {
    refs.iter()
        .take_while(|r| r.min_x <= right)
        .filter(|r| {
            let mid = (r.min_x + r.max_x) / 2.0;
            mid >= left && mid <= right
        })
        .count()
}

/// Allocates cells of a later sub-row against the first sub-row's columns:
/// a cell stretches to its neighbour unless that would reach across more
/// than one reference column, in which case it keeps to its own text.
fn refine_sub_row(sub: &mut Row, refs: &[Bbox]) {
    let outer = sub.boundary_box;
    let n = sub.cells.len();
    let Some(first) = sub.cells.first() else {
        return;
    };
    let mut left = if columns_touched(outer.min_x, first.span_box.max_x, refs) > 1 {
        first.span_box.min_x
    } else {
        outer.min_x
    };
    for k in 0..n {
        let own = sub.cells[k].span_box;
        let next_left = if k + 1 < n {
            sub.cells[k + 1].span_box.min_x
        } else {
            outer.max_x
        };
        let right = if columns_touched(left, next_left, refs) > 1 {
            own.max_x
        } else {
            next_left
        };
        sub.cells[k].boundary_box = Bbox::new(left, outer.min_y, right, outer.max_y);
        left = next_left;
    }
}

fn allocate_sub_rows(row: &mut Row) {
    let outer = row.boundary_box;
    split_rows(&mut row.sub_rows, &outer);
    let Some((first, rest)) = row.sub_rows.split_first_mut() else {
        return;
    };
    let first_box = first.boundary_box;
    split_cells(&mut first.cells, &first_box);
    let refs: Vec<Bbox> = first.cells.iter().map(|c| c.span_box).collect();
    for sub in rest {
        refine_sub_row(sub, &refs);
    }
    for cell in row.sub_rows.iter_mut().flat_map(|s| s.cells.iter_mut()) {
        let outer = cell.boundary_box;
        split_cells(&mut cell.inner_cols, &outer);
    }
}

/// Sub-rows a first-line cell covers: its own plus every following sub-row
/// with nothing horizontally under it.
fn row_span(cell: &Bbox, subs: &[Row]) -> usize {
    subs.iter()
        .skip(1)
        .position(|sub| {
            sub.cells
                .iter()
                .any(|c| c.span_box.max_x >= cell.min_x && c.span_box.min_x <= cell.max_x)
        })
        .map_or(subs.len().max(1), |p| p + 1)
}

/// Reference columns lying wholly inside `bound`, at least one.
fn columns_covered(bound: &Bbox, refs: &[Bbox]) -> usize {
    refs.iter()
        .take_while(|r| r.min_x <= bound.max_x)
        .filter(|r| r.min_x >= bound.min_x && r.max_x <= bound.max_x)
        .count()
        .max(1)
}

/// Column spans of one sub-row. Cells claim the reference columns they cover
/// until the sub-row accounts for every column; the rest span one.
fn col_spans(sub: &Row, refs: &[Bbox]) -> Vec<usize> {
    if sub.cells.len() == refs.len() {
        return vec![1; sub.cells.len()];
    }
    let mut missing = refs.len() as i64 - sub.cells.len() as i64;
    let mut filled = false;
    sub.cells
        .iter()
        .map(|c| {
            if filled {
                return 1;
            }
            let v = columns_covered(&c.boundary_box, refs);
            missing -= v as i64 - 1;
            filled = missing == 0;
            v
        })
        .collect()
}

fn cell_text(spans: &[Span], idx: &[usize]) -> String {
    idx.iter()
        .map(|&i| spans[i].text.trim())
        .filter(|t| !t.is_empty())
        .join(" ")
}

fn fill_text(cells: &mut [Cell], spans: &[Span]) {
    for cell in cells {
        cell.text = cell_text(spans, &cell.spans);
        for (k, inner) in cell.inner_cols.iter_mut().enumerate() {
            inner.id = k;
            inner.text = cell_text(spans, &inner.spans);
        }
    }
}

/// Reconstructs a table inside `region` from its spans and clusters.
///
/// Returns `None` for fewer than `min_spans` spans, a single cluster, or a
/// structure that fails the validity checks.
pub fn detect_with_clusters(
    ctx: &mut PageContext,
    region: &Bbox,
    spans: &[&Span],
    clusters: &[&Cluster],
    source: TableSource,
    params: &TableParams,
) -> Option<Table> {
    let reject = |reason: &'static str| {
        debug!(
            reason,
            ?source,
            x0 = region.min_x,
            y0 = region.min_y,
            x1 = region.max_x,
            y1 = region.max_y,
            "cluster candidate rejected"
        );
        None
    };
    if spans.len() < params.min_spans {
        return reject("too few spans");
    }
    if clusters.len() <= 1 {
        return reject("single cluster");
    }

    let cluster_box = bbox_of(clusters);
    let arena: Vec<Span> = spans
        .iter()
        .filter(|s| cluster_box.center_contains(&s.bbox))
        .map(|&s| s.clone())
        .collect();
    if arena.is_empty() {
        return reject("no spans inside clusters");
    }

    let order: Vec<usize> = (0..arena.len()).collect();
    let threshold = HeightStats::of(&arena).weighted_mean;
    let mut rows = scan_rows(&arena, &order, threshold);
    for row in &mut rows {
        let t = HeightStats::of_indices(&arena, &row.spans).weighted_mean;
        row.sub_rows = scan_sub_rows(&arena, row, t);
    }

    rows.retain(|r| cluster_box.contains(&r.span_box));
    for row in &mut rows {
        row.cells.retain(|c| cluster_box.contains(&c.span_box));
    }
    if let Some(reason) = rejection(&rows, clusters.len()) {
        return reject(reason);
    }

    for cell in rows
        .iter_mut()
        .flat_map(|r| r.sub_rows.iter_mut())
        .flat_map(|s| s.cells.iter_mut())
    {
        cell.inner_cols = inner_columns(&arena, cell);
    }

    split_rows(&mut rows, region);
    for row in &mut rows {
        split_cells(&mut row.cells, &row.boundary_box);
        allocate_sub_rows(row);
    }

    let refs: Vec<Bbox> = rows
        .iter()
        .filter_map(|r| r.sub_rows.first())
        .fold(None::<&Row>, |best, s| match best {
            Some(b) if b.cells.len() >= s.cells.len() => Some(b),
            _ => Some(s),
        })
        .map(|s| s.cells.iter().map(|c| c.span_box).collect())
        .unwrap_or_default();

    for (r, row) in rows.iter_mut().enumerate() {
        row.id = r;
        let spans_of_first: Vec<usize> = match row.sub_rows.first() {
            Some(first) => first
                .cells
                .iter()
                .map(|c| row_span(&c.span_box, &row.sub_rows))
                .collect(),
            None => Vec::new(),
        };
        for (k, sub) in row.sub_rows.iter_mut().enumerate() {
            sub.id = k;
            let cols = col_spans(sub, &refs);
            for (j, cell) in sub.cells.iter_mut().enumerate() {
                cell.id = j;
                cell.col_span = cols[j];
                cell.row_span = if k == 0 { spans_of_first[j] } else { 1 };
            }
            fill_text(&mut sub.cells, &arena);
        }
        for (j, cell) in row.cells.iter_mut().enumerate() {
            cell.id = j;
        }
        fill_text(&mut row.cells, &arena);
    }

    let mut table = Table::new(ctx.next_table_id(), ctx.page, source, *region);
    table.cluster_box = cluster_box;
    table.span_box = bbox_of(&arena);
    table.clusters = clusters.iter().map(|c| c.id).collect();
    table.columns = refs.len();
    table.rows = rows;
    table.spans = arena;
    trace!(
        id = %table.id,
        rows = table.row_count(),
        cols = table.columns,
        "cluster table accepted"
    );
    Some(table)
}
