//! Text assignment for bordered tables.
//!
//! Spans inside the table box are handed to the surviving grid cells in
//! row-major order. A span lying wholly inside a cell is taken directly; a
//! span straddling cell borders is judged by its glyphs and, when it is made
//! of several words, split at its spaces so each word can find its own cell.

use rustc_hash::FxHashMap;

use super::types::{Cell, Table};
use crate::page::Span;
use crate::utils::Bbox;

/// Joins cell text the way the span sequence reads on the page.
struct CellText<'p> {
    text: String,
    prev: Option<Span>,
    by_id: &'p FxHashMap<usize, &'p Span>,
}

impl<'p> CellText<'p> {
    fn new(by_id: &'p FxHashMap<usize, &'p Span>) -> Self {
        Self {
            text: String::new(),
            prev: None,
            by_id,
        }
    }

    fn blank_neighbour(&self, id: Option<usize>) -> bool {
        id.and_then(|id| self.by_id.get(&id))
            .is_some_and(|s| !s.text.is_empty() && s.is_blank())
    }

    fn push(&mut self, span: &Span) {
        match &self.prev {
            None => self.text.push_str(&span.text),
            Some(prev) if span.bbox.min_y >= prev.bbox.max_y => {
                // Wrapped onto a new line inside the cell.
                if self.text.ends_with('-') {
                    self.text.pop();
                } else {
                    self.text.push(' ');
                }
                self.text.push_str(&span.text);
            }
            Some(prev) => {
                let siblings = prev.split_from.is_some() && prev.split_from == span.split_from;
                let spaced = self.blank_neighbour(prev.id.checked_add(1))
                    || self.blank_neighbour(span.id.checked_sub(1))
                    || siblings;
                if !self.text.ends_with(' ') && spaced {
                    self.text.push(' ');
                }
                self.text.push_str(&span.text);
            }
        }
        self.prev = Some(span.clone());
    }
}

enum Fit {
    Inside,
    /// Every glyph touching the cell lies inside it.
    Glyphs,
    /// Glyphs on both sides of the border; the span centre lies in the cell.
    Centre,
    Outside,
}

fn fit(cell: &Bbox, span: &Span) -> Fit {
    if cell.contains(&span.bbox) {
        return Fit::Inside;
    }
    let inside = span.glyphs.iter().filter(|g| cell.contains(&g.bbox)).count();
    let touching = span
        .glyphs
        .iter()
        .filter(|g| g.bbox.corners_within(cell))
        .count();
    if inside > 0 && inside == touching {
        Fit::Glyphs
    } else if touching > 0 && cell.center_contains(&span.bbox) {
        Fit::Centre
    } else {
        Fit::Outside
    }
}

/// Fills the cells of a bordered `table` from `page_spans`.
///
/// Assigned spans are moved into `table.spans`; fragments created by
/// splitting take fresh ids from `next_span_id`.
pub(crate) fn assign_spans(table: &mut Table, page_spans: &[Span], next_span_id: &mut usize) {
    let by_id: FxHashMap<usize, &Span> = page_spans.iter().map(|s| (s.id, s)).collect();
    let mut pending: Vec<Span> = page_spans
        .iter()
        .filter(|s| table.table_box.contains(&s.bbox) || (s.bbox.is_unbounded() && s.is_blank()))
        .cloned()
        .collect();

    for row in &mut table.rows {
        for cell in &mut row.cells {
            let cell_box = cell.boundary_box;
            let mut text = CellText::new(&by_id);
            let mut k = 0;
            while k < pending.len() {
                let span = &pending[k];
                if span.bbox.is_unbounded() {
                    if !text.text.is_empty() && span.is_blank() {
                        text.text.push_str(&span.text);
                        pending.remove(k);
                    } else {
                        k += 1;
                    }
                    continue;
                }
                match fit(&cell_box, span) {
                    Fit::Outside => k += 1,
                    Fit::Glyphs if span.text.trim().contains(char::is_whitespace) => {
                        let parts = span.split_at_spaces(next_span_id);
                        if parts.len() > 1 {
                            pending.splice(k..=k, parts);
                        } else {
                            let span = pending.remove(k);
                            take(&mut table.spans, cell, &mut text, span);
                        }
                    }
                    Fit::Inside | Fit::Glyphs | Fit::Centre => {
                        let span = pending.remove(k);
                        take(&mut table.spans, cell, &mut text, span);
                    }
                }
            }
            cell.text = text.text.trim().to_string();
        }
    }
}

fn take(arena: &mut Vec<Span>, cell: &mut Cell, text: &mut CellText<'_>, span: Span) {
    text.push(&span);
    cell.push_span(arena.len(), &span.bbox);
    arena.push(span);
}
