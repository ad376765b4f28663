//! Multi-page analysis and reading order.

mod common;

use common::{line, unruled_page};
use tabulon_core::table::{TableId, document_order};
use tabulon_core::{TableParams, analyze_document};

#[test]
fn ids_are_unique_across_pages() {
    let pages = vec![unruled_page(0), unruled_page(1), unruled_page(2)];
    let out = analyze_document(&pages, &TableParams::default()).unwrap();
    assert_eq!(out.len(), 3);
    let ids: Vec<TableId> = out.iter().flat_map(|p| p.tables.iter().map(|t| t.id)).collect();
    assert_eq!(ids, vec![TableId(0), TableId(1), TableId(2)]);
    assert_eq!(out[2].page, 2);
    assert_eq!(out[2].tables[0].page, 2);
}

#[test]
fn document_order_follows_lines() {
    let mut first = unruled_page(0);
    first.lines = vec![
        line("line0", 0.0, -40.0, 100.0, -30.0),
        line("line1", 0.0, 0.0, 250.0, 20.0),
    ];
    let second = unruled_page(1);
    let out = analyze_document(&[first, second], &TableParams::default()).unwrap();

    let ordered = document_order(&out);
    assert_eq!(ordered.len(), 2);
    assert_eq!(ordered[0].lines, vec!["line1"]);
    assert_eq!(ordered[0].first_line, Some(1));
    assert_eq!(ordered[1].page, 1);
    assert!(ordered[1].lines.is_empty());
}

#[test]
fn invalid_params_fail_the_document() {
    let params = TableParams {
        line_thickness: 0,
        ..TableParams::default()
    };
    assert!(analyze_document(&[unruled_page(0)], &params).is_err());
}
