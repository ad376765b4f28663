//! Table structure types.
//!
//! A [`Table`] owns its rows outright. Rows produced by the cluster-boundary
//! detectors carry line-level sub-rows; rows produced by the bordered detector
//! are already line-level and leave `sub_rows` empty. Cells refer to spans by
//! index into [`Table::spans`], so fragments created while assigning text live
//! in the table that created them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::page::Span;
use crate::utils::{Bbox, HasBbox};

/// Page-local table identifier, rendered as `table{n}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableId(pub usize);

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table{}", self.0)
    }
}

/// Which detector produced a table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableSource {
    /// Ruling lines found in the pixel buffer.
    Bordered,
    /// Clusters inside a background box.
    Boundary,
    /// Clusters aligned across the page with no background box.
    Boundaryless,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub id: usize,
    pub span_box: Bbox,
    pub boundary_box: Bbox,
    /// Indices into the owning table's `spans`.
    pub spans: Vec<usize>,
    pub text: String,
    pub row_span: usize,
    pub col_span: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inner_cols: Vec<Cell>,
}

impl Cell {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            span_box: Bbox::EMPTY,
            boundary_box: Bbox::EMPTY,
            spans: Vec::new(),
            text: String::new(),
            row_span: 1,
            col_span: 1,
            inner_cols: Vec::new(),
        }
    }

    pub(crate) fn push_span(&mut self, index: usize, bbox: &Bbox) {
        self.spans.push(index);
        self.span_box.update_box(bbox);
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

impl HasBbox for Cell {
    fn bbox(&self) -> Bbox {
        self.span_box
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: usize,
    pub span_box: Bbox,
    pub boundary_box: Bbox,
    pub cells: Vec<Cell>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_rows: Vec<Row>,
    /// Indices into the owning table's `spans`, in scan order.
    #[serde(skip)]
    pub(crate) spans: Vec<usize>,
}

impl Row {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            span_box: Bbox::EMPTY,
            boundary_box: Bbox::EMPTY,
            ..Default::default()
        }
    }

    pub(crate) fn push_span(&mut self, index: usize, bbox: &Bbox) {
        self.spans.push(index);
        self.span_box.update_box(bbox);
    }
}

/// One rendered cell: the form an HTML writer consumes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextCell {
    pub text: String,
    pub row_span: usize,
    pub col_span: usize,
}

/// Persisted form of a table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRecord {
    pub id: String,
    pub lines: Vec<String>,
}

/// A recovered table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub id: TableId,
    pub page: usize,
    pub source: TableSource,
    pub table_box: Bbox,
    /// Union of the member clusters' boxes; empty for bordered tables.
    pub cluster_box: Bbox,
    pub span_box: Bbox,
    pub rows: Vec<Row>,
    pub spans: Vec<Span>,
    /// Ids of the page clusters the table was built from.
    pub clusters: Vec<usize>,
    /// Ids of the document text lines matched to the table.
    pub lines: Vec<String>,
    /// Number of grid columns.
    pub columns: usize,
    /// Index of the first matched line in page reading order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_line: Option<usize>,
}

impl Table {
    pub fn new(id: TableId, page: usize, source: TableSource, table_box: Bbox) -> Self {
        Self {
            id,
            page,
            source,
            table_box,
            cluster_box: Bbox::EMPTY,
            span_box: Bbox::EMPTY,
            rows: Vec::new(),
            spans: Vec::new(),
            clusters: Vec::new(),
            lines: Vec::new(),
            columns: 0,
            first_line: None,
        }
    }

    /// Number of line-level rows.
    pub fn row_count(&self) -> usize {
        self.rows.iter().map(|r| r.sub_rows.len().max(1)).sum()
    }

    pub fn column_count(&self) -> usize {
        self.columns
    }

    /// Line-level rows in order: sub-rows where present, otherwise the row.
    pub fn line_rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter().flat_map(|r| {
            if r.sub_rows.is_empty() {
                std::slice::from_ref(r).iter()
            } else {
                r.sub_rows.iter()
            }
        })
    }

    /// Renders the table as rows of `(text, row_span, col_span)` cells.
    pub fn text_grid(&self) -> Vec<Vec<TextCell>> {
        self.line_rows()
            .map(|row| {
                row.cells
                    .iter()
                    .map(|c| TextCell {
                        text: c.text.clone(),
                        row_span: c.row_span,
                        col_span: c.col_span,
                    })
                    .collect()
            })
            .collect()
    }

    pub fn record(&self) -> TableRecord {
        TableRecord {
            id: self.id.to_string(),
            lines: self.lines.clone(),
        }
    }

    /// Text of the cells in row-major order.
    pub fn cell_texts(&self) -> Vec<&str> {
        self.line_rows()
            .flat_map(|r| r.cells.iter().map(|c| c.text.as_str()))
            .collect()
    }
}

impl HasBbox for Table {
    fn bbox(&self) -> Bbox {
        self.table_box
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(text: &str) -> Cell {
        Cell {
            text: text.to_string(),
            ..Cell::new(0)
        }
    }

    #[test]
    fn line_rows_flatten_sub_rows() {
        let mut t = Table::new(
            TableId(3),
            0,
            TableSource::Boundary,
            Bbox::new(0.0, 0.0, 10.0, 10.0),
        );
        let mut major = Row::new(0);
        let mut a = Row::new(0);
        a.cells = vec![cell("a"), cell("b")];
        let mut b = Row::new(1);
        b.cells = vec![cell("c")];
        major.sub_rows = vec![a, b];
        let mut flat = Row::new(1);
        flat.cells = vec![cell("d")];
        t.rows = vec![major, flat];

        assert_eq!(t.row_count(), 3);
        assert_eq!(t.cell_texts(), vec!["a", "b", "c", "d"]);
        assert_eq!(t.text_grid()[1][0].text, "c");
    }

    #[test]
    fn record_uses_display_id() {
        let mut t = Table::new(TableId(7), 0, TableSource::Bordered, Bbox::EMPTY);
        t.lines = vec!["line4".to_string()];
        let rec = t.record();
        assert_eq!(rec.id, "table7");
        assert_eq!(serde_json::to_string(&rec).unwrap(), r#"{"id":"table7","lines":["line4"]}"#);
    }
}
