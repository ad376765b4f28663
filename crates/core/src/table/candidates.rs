//! Candidate regions for the box-driven detectors.

use tracing::trace;

use crate::page::Span;
use crate::params::TableParams;
use crate::utils::Bbox;

/// What a background box looks like before any detector runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Candidate {
    Table,
    /// Too few spans to be a table but wide enough to be a figure.
    Figure,
    Reject(&'static str),
}

impl Candidate {
    pub fn reason(&self) -> &'static str {
        match self {
            Candidate::Table => "table",
            Candidate::Figure => "figure",
            Candidate::Reject(reason) => reason,
        }
    }
}

/// Classifies `region` by the spans it contains and its width relative to
/// the widest span on the page.
pub fn classify(region: &Bbox, spans: &[Span], widest: f64, params: &TableParams) -> Candidate {
    let inside = spans.iter().filter(|s| region.contains(&s.bbox)).count();
    let wide_enough = region.width() >= widest;
    match (inside >= params.min_spans, wide_enough) {
        (true, true) => Candidate::Table,
        (false, true) => Candidate::Figure,
        (true, false) => Candidate::Reject("narrower than the widest span"),
        (false, false) => Candidate::Reject("too few spans"),
    }
}

/// Grows background boxes into table candidates.
///
/// Walking from the last box to the first, each box not yet consumed absorbs
/// every other unconsumed box it contains, that has a corner inside it, or
/// that lies within `h_threshold` / `v_threshold` along a shared row or
/// column. The grown box is emitted and everything it touched is consumed.
pub fn consolidate(boxes: &[Bbox], h_threshold: f64, v_threshold: f64) -> Vec<Bbox> {
    let n = boxes.len();
    let mut consumed = vec![false; n];
    let mut out = Vec::new();
    for i in (0..n).rev() {
        if consumed[i] {
            continue;
        }
        let mut grown = boxes[i];
        for j in (0..n).rev() {
            if i == j || consumed[j] {
                continue;
            }
            let other = &boxes[j];
            if grown.contains(other)
                || grown.corners_within(other)
                || Bbox::nearby(&grown, other, h_threshold, v_threshold)
            {
                grown = grown.union(other);
                consumed[j] = true;
            }
        }
        consumed[i] = true;
        out.push(grown);
    }
    trace!(input = n, output = out.len(), "background boxes consolidated");
    out
}

/// Drops boxes lying inside a caption's object box; those are figures.
pub fn veto_captioned(boxes: Vec<Bbox>, captions: &[Bbox]) -> Vec<Bbox> {
    boxes
        .into_iter()
        .filter(|b| !captions.iter().any(|c| c.contains(b)))
        .collect()
}

/// Consolidated, caption-free candidate boxes for a page.
pub fn candidate_boxes(
    boxes: &[Bbox],
    captions: &[Bbox],
    page_w: f64,
    page_h: f64,
    params: &TableParams,
) -> Vec<Bbox> {
    let (h, v) = params.scaled_line_dist(page_w, page_h);
    veto_captioned(consolidate(boxes, h, v), captions)
}
