//! Page and document level table finding.
//!
//! `analyze_page` runs the three detectors in order (bordered grids inside
//! background boxes, cluster structure inside the same boxes, then aligned
//! clusters elsewhere on the page), reconciles their results and anchors the
//! survivors to the page's text lines.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use super::boundary::{HeightStats, detect_with_clusters};
use super::boundaryless::detect_boundaryless;
use super::candidates::{Candidate, candidate_boxes, classify};
use super::grid::detect_bordered;
use super::reconcile::reconcile;
use super::types::{Table, TableId, TableSource};
use crate::cluster::ClusterSet;
use crate::error::{Result, TableError};
use crate::page::{PageInput, TextLine};
use crate::params::TableParams;
use crate::utils::{Bbox, items_in_box};

/// Per-page id allocation shared by the detectors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageContext {
    pub page: usize,
    next_table: usize,
    /// Next free span id, for fragments created by splitting.
    pub next_span: usize,
}

impl PageContext {
    pub fn new(page: usize, next_span: usize) -> Self {
        Self {
            page,
            next_table: 0,
            next_span,
        }
    }

    /// Context whose fresh span ids follow every id already on the page.
    pub fn for_page(page: &PageInput) -> Self {
        let next_span = page
            .spans
            .iter()
            .map(|s| s.id.saturating_add(1))
            .max()
            .unwrap_or(0);
        Self::new(page.index, next_span)
    }

    pub fn next_table_id(&mut self) -> TableId {
        let id = TableId(self.next_table);
        self.next_table += 1;
        id
    }
}

/// Everything recovered from one page.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PageTables {
    pub page: usize,
    pub tables: Vec<Table>,
    /// Background boxes classified as figures.
    pub figures: Vec<Bbox>,
}

impl PageTables {
    fn empty(page: usize) -> Self {
        Self {
            page,
            ..Default::default()
        }
    }
}

/// Finds the tables of one page.
pub fn analyze_page(page: &PageInput, params: &TableParams) -> Result<PageTables> {
    params.validate()?;
    if page.width == 0 || page.height == 0 {
        return Err(TableError::EmptyPage {
            width: page.width,
            height: page.height,
        });
    }
    let mut out = PageTables::empty(page.index);
    let spans = page.valid_spans();
    if spans.is_empty() {
        debug!(page = page.index, "page has no text");
        return Ok(out);
    }

    let mut ctx = PageContext::for_page(page);
    let (page_w, page_h) = (page.width as f64, page.height as f64);
    let candidates = candidate_boxes(
        &page.valid_boxes(),
        &page.caption_boxes,
        page_w,
        page_h,
        params,
    );
    let eps = HeightStats::of(&spans).weighted_mean;
    let clusters = ClusterSet::build(&spans, eps, params.dbscan_min_pts);
    trace!(
        page = page.index,
        candidates = candidates.len(),
        clusters = clusters.len(),
        eps,
        "page prepared"
    );

    let widest = page.widest_span();
    let mut bordered = Vec::new();
    if page.pixels.is_none() && !candidates.is_empty() {
        warn!(page = page.index, "no pixel buffer; ruled grids are not searched");
    }
    for region in &candidates {
        match classify(region, &page.spans, widest, params) {
            Candidate::Figure => out.figures.push(*region),
            Candidate::Table if page.pixels.is_some() => {
                if let Some(table) = detect_bordered(region, page, params, &mut ctx)? {
                    bordered.push(table);
                }
            }
            _ => {}
        }
    }

    let boundary: Vec<Table> = candidates
        .iter()
        .filter_map(|region| {
            let inside = items_in_box(region, &spans);
            let members = clusters.inside(region);
            detect_with_clusters(&mut ctx, region, &inside, &members, TableSource::Boundary, params)
        })
        .collect();

    let claimed: Vec<Bbox> = bordered
        .iter()
        .chain(&boundary)
        .map(|t| t.table_box)
        .collect();
    let boundaryless = detect_boundaryless(&mut ctx, &spans, &clusters, &claimed, params);

    info!(
        page = page.index,
        bordered = bordered.len(),
        boundary = boundary.len(),
        boundaryless = boundaryless.len(),
        figures = out.figures.len(),
        "tables detected"
    );
    out.tables = reconcile(bordered, boundary, boundaryless, params);
    for (k, table) in out.tables.iter_mut().enumerate() {
        table.id = TableId(k);
    }
    assign_lines(&mut out.tables, &page.lines);
    Ok(out)
}

/// Finds the tables of every page, one page per rayon task.
///
/// Table ids are renumbered in page order so they are unique across the
/// document.
pub fn analyze_document(pages: &[PageInput], params: &TableParams) -> Result<Vec<PageTables>> {
    let mut results = pages
        .par_iter()
        .map(|page| analyze_page(page, params))
        .collect::<Result<Vec<_>>>()?;
    let mut next = 0;
    for table in results.iter_mut().flat_map(|p| p.tables.iter_mut()) {
        table.id = TableId(next);
        next += 1;
    }
    Ok(results)
}

/// Attaches each text line to the first table whose box contains or overlaps it.
pub fn assign_lines(tables: &mut [Table], lines: &[TextLine]) {
    for (k, line) in lines.iter().enumerate() {
        let owner = tables
            .iter_mut()
            .find(|t| t.table_box.contains(&line.bbox) || t.table_box.overlap(&line.bbox));
        if let Some(table) = owner {
            table.lines.push(line.id.clone());
            table.first_line.get_or_insert(k);
        }
    }
}

/// Tables of all pages in reading order: pages in order, and within a page
/// by first matched line, tables without lines last.
pub fn document_order(pages: &[PageTables]) -> Vec<&Table> {
    pages
        .iter()
        .flat_map(|p| {
            let mut tables: Vec<&Table> = p.tables.iter().collect();
            tables.sort_by_key(|t| t.first_line.map_or((1, 0), |l| (0, l)));
            tables
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::Span;

    fn line(id: &str, x0: f64, y0: f64, x1: f64, y1: f64) -> TextLine {
        TextLine {
            id: id.to_string(),
            bbox: Bbox::new(x0, y0, x1, y1),
        }
    }

    fn table(id: usize, b: Bbox) -> Table {
        Table::new(TableId(id), 0, TableSource::Boundary, b)
    }

    #[test]
    fn context_allocates_ids() {
        let mut page = PageInput::new(2, 100, 100);
        page.spans = vec![
            Span::new(4, Bbox::new(0.0, 0.0, 1.0, 1.0), "a"),
            Span::new(9, Bbox::new(0.0, 0.0, 1.0, 1.0), "b"),
        ];
        let mut ctx = PageContext::for_page(&page);
        assert_eq!(ctx.next_span, 10);
        assert_eq!(ctx.next_table_id(), TableId(0));
        assert_eq!(ctx.next_table_id(), TableId(1));
    }

    #[test]
    fn context_ids_saturate_at_max() {
        let mut page = PageInput::new(0, 100, 100);
        page.spans = vec![Span::new(usize::MAX, Bbox::new(0.0, 0.0, 1.0, 1.0), "a")];
        assert_eq!(PageContext::for_page(&page).next_span, usize::MAX);
    }

    #[test]
    fn first_table_claims_line() {
        let mut tables = vec![
            table(0, Bbox::new(0.0, 0.0, 100.0, 100.0)),
            table(1, Bbox::new(50.0, 0.0, 200.0, 100.0)),
        ];
        let lines = vec![
            line("line0", 0.0, 200.0, 10.0, 210.0),
            line("line1", 60.0, 10.0, 90.0, 20.0),
            line("line2", 150.0, 10.0, 190.0, 20.0),
        ];
        assign_lines(&mut tables, &lines);
        assert_eq!(tables[0].lines, vec!["line1"]);
        assert_eq!(tables[0].first_line, Some(1));
        assert_eq!(tables[1].lines, vec!["line2"]);
    }

    #[test]
    fn order_follows_first_line() {
        let mut a = table(0, Bbox::EMPTY);
        a.first_line = Some(7);
        let b = table(1, Bbox::EMPTY);
        let mut c = table(2, Bbox::EMPTY);
        c.first_line = Some(3);
        let d = table(3, Bbox::EMPTY);
        let pages = vec![
            PageTables {
                page: 0,
                tables: vec![a, b, c],
                figures: Vec::new(),
            },
            PageTables {
                page: 1,
                tables: vec![d],
                figures: Vec::new(),
            },
        ];
        let ids: Vec<usize> = document_order(&pages).iter().map(|t| t.id.0).collect();
        assert_eq!(ids, vec![2, 0, 1, 3]);
    }

    #[test]
    fn empty_page_is_an_error() {
        let page = PageInput::new(0, 0, 100);
        assert!(matches!(
            analyze_page(&page, &TableParams::default()),
            Err(TableError::EmptyPage { .. })
        ));
    }

    #[test]
    fn textless_page_has_no_tables() {
        let page = PageInput::new(0, 100, 100);
        let out = analyze_page(&page, &TableParams::default()).unwrap();
        assert!(out.tables.is_empty());
    }
}
