//! End-to-end table recovery on synthetic pages.

mod common;

use common::{line, ruled_page, span, unruled_page};
use tabulon_core::table::finder::PageContext;
use tabulon_core::table::grid::detect_bordered;
use tabulon_core::table::{TableId, TableSource};
use tabulon_core::utils::Bbox;
use tabulon_core::{PageInput, TableError, TableParams, analyze_page};

#[test]
fn ruled_grid_is_recovered() {
    let mut page = ruled_page();
    page.lines = vec![line("line0", 120.0, 120.0, 310.0, 140.0)];
    let out = analyze_page(&page, &TableParams::default()).unwrap();

    assert_eq!(out.tables.len(), 1);
    let table = &out.tables[0];
    assert_eq!(table.source, TableSource::Bordered);
    assert_eq!(table.table_box, Bbox::new(100.0, 100.0, 400.0, 300.0));
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.column_count(), 2);
    insta::assert_snapshot!(table.cell_texts().join("|"), @"A|B|C|D");

    let grid = table.text_grid();
    assert!(grid.iter().flatten().all(|c| c.row_span == 1 && c.col_span == 1));
    assert_eq!(table.record().id, "table0");
    assert_eq!(table.record().lines, vec!["line0"]);
}

#[test]
fn ruled_cells_have_grid_boundaries() {
    let page = ruled_page();
    let mut ctx = PageContext::for_page(&page);
    let table = detect_bordered(
        &Bbox::new(100.0, 100.0, 400.0, 300.0),
        &page,
        &TableParams::default(),
        &mut ctx,
    )
    .unwrap()
    .unwrap();
    let first = &table.rows[0].cells[0];
    assert_eq!(first.boundary_box, Bbox::new(101.0, 101.0, 250.0, 200.0));
    let last = &table.rows[1].cells[1];
    assert_eq!(last.boundary_box, Bbox::new(250.0, 200.0, 399.0, 299.0));
}

#[test]
fn unruled_grid_is_recovered() {
    let out = analyze_page(&unruled_page(0), &TableParams::default()).unwrap();
    assert_eq!(out.tables.len(), 1);
    let table = &out.tables[0];
    assert_eq!(table.source, TableSource::Boundaryless);
    assert_eq!(table.table_box, Bbox::new(0.0, 0.0, 250.0, 80.0));
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.column_count(), 2);
    assert_eq!(table.cell_texts(), vec!["A", "B", "C", "D"]);
}

#[test]
fn three_spans_are_not_a_table() {
    let mut page = PageInput::new(0, 600, 800);
    page.spans = vec![
        span(0, 0.0, 0.0, 50.0, 20.0, "A"),
        span(1, 200.0, 0.0, 250.0, 20.0, "B"),
        span(2, 0.0, 60.0, 50.0, 80.0, "C"),
    ];
    let out = analyze_page(&page, &TableParams::default()).unwrap();
    assert!(out.tables.is_empty());
}

#[test]
fn ruled_box_with_three_spans_is_rejected() {
    let mut page = ruled_page();
    page.spans.pop();
    let mut ctx = PageContext::for_page(&page);
    let out = detect_bordered(
        &Bbox::new(100.0, 100.0, 400.0, 300.0),
        &page,
        &TableParams::default(),
        &mut ctx,
    )
    .unwrap();
    assert!(out.is_none());
}

#[test]
fn one_cluster_is_not_a_table() {
    let mut page = PageInput::new(0, 600, 800);
    page.background_boxes = vec![Bbox::new(0.0, 0.0, 100.0, 50.0)];
    page.spans = vec![
        span(0, 10.0, 10.0, 30.0, 20.0, "a"),
        span(1, 35.0, 10.0, 55.0, 20.0, "b"),
        span(2, 10.0, 25.0, 30.0, 35.0, "c"),
        span(3, 35.0, 25.0, 55.0, 35.0, "d"),
    ];
    let out = analyze_page(&page, &TableParams::default()).unwrap();
    assert!(out.tables.is_empty());
}

#[test]
fn sparse_wide_box_is_a_figure() {
    let mut page = unruled_page(0);
    page.spans.push(span(4, 10.0, 500.0, 60.0, 520.0, "Figure"));
    page.background_boxes = vec![Bbox::new(0.0, 400.0, 300.0, 600.0)];
    let out = analyze_page(&page, &TableParams::default()).unwrap();
    assert_eq!(out.figures, vec![Bbox::new(0.0, 400.0, 300.0, 600.0)]);
    assert_eq!(out.tables.len(), 1);
}

#[test]
fn bordered_detection_needs_pixels() {
    let mut page = ruled_page();
    page.pixels = None;
    let mut ctx = PageContext::new(0, 4);
    let err = detect_bordered(
        &Bbox::new(100.0, 100.0, 400.0, 300.0),
        &page,
        &TableParams::default(),
        &mut ctx,
    )
    .unwrap_err();
    assert!(matches!(err, TableError::MissingPixels { page: 0 }));
}

#[test]
fn bordered_detection_needs_spans() {
    let mut page = ruled_page();
    page.spans.clear();
    let mut ctx = PageContext::new(0, 0);
    let err = detect_bordered(
        &Bbox::new(100.0, 100.0, 400.0, 300.0),
        &page,
        &TableParams::default(),
        &mut ctx,
    )
    .unwrap_err();
    assert!(matches!(err, TableError::NoSpans { .. }));
    assert_eq!(ctx.next_table_id(), TableId(0));
}

#[test]
fn invalid_geometry_is_ignored() {
    let mut page = unruled_page(0);
    page.spans.push(span(4, 300.0, 10.0, 300.0, 20.0, "zero"));
    page.background_boxes = vec![Bbox::new(10.0, 10.0, 5.0, 5.0)];
    let out = analyze_page(&page, &TableParams::default()).unwrap();
    assert_eq!(out.tables.len(), 1);
    assert!(out.figures.is_empty());
}

#[test]
fn captioned_box_is_not_searched() {
    let mut page = ruled_page();
    page.caption_boxes = vec![Bbox::new(90.0, 90.0, 410.0, 310.0)];
    let out = analyze_page(&page, &TableParams::default()).unwrap();

    assert!(out.figures.is_empty());
    assert_eq!(out.tables.len(), 1);
    let table = &out.tables[0];
    assert_eq!(table.source, TableSource::Boundaryless);
    assert_eq!(table.table_box, Bbox::new(120.0, 120.0, 310.0, 240.0));
}

#[test]
fn tall_cell_spans_two_lines() {
    let mut page = PageInput::new(0, 600, 800);
    page.spans = vec![
        span(0, 0.0, 0.0, 40.0, 10.0, "L1"),
        span(1, 200.0, 0.0, 240.0, 10.0, "M1"),
        span(2, 0.0, 20.0, 40.0, 30.0, "L2"),
        span(3, 400.0, 0.0, 440.0, 10.0, "R"),
        span(4, 0.0, 60.0, 40.0, 70.0, "L3"),
        span(5, 200.0, 60.0, 240.0, 70.0, "M3"),
        span(6, 400.0, 60.0, 440.0, 70.0, "R3"),
    ];
    let out = analyze_page(&page, &TableParams::default()).unwrap();

    assert_eq!(out.tables.len(), 1);
    let table = &out.tables[0];
    assert_eq!(table.source, TableSource::Boundaryless);
    assert_eq!(table.table_box, Bbox::new(0.0, 0.0, 440.0, 70.0));
    assert_eq!(table.row_count(), 3);
    let grid = table.text_grid();
    let tall = grid.iter().flatten().find(|c| c.text == "M1").unwrap();
    assert_eq!(tall.row_span, 2);
}
