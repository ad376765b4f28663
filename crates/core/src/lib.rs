//! tabulon - table structure recovery from rendered document pages.
//!
//! Given the text spans of a page, its background boxes and optionally its
//! raster, tabulon finds tables three ways: ruled grids detected in the
//! pixels, structure rebuilt from density clusters of spans inside a
//! background box, and clusters aligned across the page with no box at all.

pub mod cluster;
pub mod error;
pub mod page;
pub mod params;
pub mod table;
pub mod utils;

pub use error::{Result, TableError};
pub use page::{Glyph, PageInput, PixelBuffer, Span, TextLine};
pub use params::TableParams;
pub use table::{PageTables, Table, analyze_document, analyze_page};
