//! Table structure recovery.
//!
//! Three detectors cooperate on each page:
//! - `grid`: ruled tables found from ink projections of the page raster
//! - `boundary`: tables rebuilt from span clusters inside a background box
//! - `boundaryless`: tables rebuilt from clusters aligned across the page
//!
//! `reconcile` arbitrates between them and `finder` drives a page or a whole
//! document through the pipeline.

pub mod boundary;
pub mod boundaryless;
pub mod candidates;
pub mod finder;
pub mod grid;
pub mod reconcile;
mod text;
mod types;

pub use types::{Cell, Row, Table, TableId, TableRecord, TableSource, TextCell};

pub use finder::{
    PageContext, PageTables, analyze_document, analyze_page, assign_lines, document_order,
};
