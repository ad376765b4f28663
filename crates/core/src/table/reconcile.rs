//! Chooses between detector results that describe the same region.

use rustc_hash::FxHashSet;
use tracing::debug;

use super::types::Table;
use crate::params::TableParams;

/// Whether `candidate` recovers enough more structure than `ruled` to replace it.
fn richer(candidate: &Table, ruled: &Table, ratio: f64) -> bool {
    candidate.row_count() as f64 >= ratio * ruled.row_count() as f64
        && candidate.column_count() as f64 >= ratio * ruled.column_count() as f64
}

/// Merges the outputs of the three detectors for one page.
///
/// A bordered table and a cluster table over exactly the same box compete:
/// the cluster table wins only with markedly more rows and columns, and the
/// loser is dropped. Boundaryless tables overlapping anything kept are
/// dropped. Output order is bordered, boundary, boundaryless.
pub fn reconcile(
    bordered: Vec<Table>,
    boundary: Vec<Table>,
    boundaryless: Vec<Table>,
    params: &TableParams,
) -> Vec<Table> {
    let mut losers: FxHashSet<usize> = FxHashSet::default();
    let mut out: Vec<Table> = Vec::with_capacity(bordered.len() + boundary.len());

    for ruled in bordered {
        let rival = boundary
            .iter()
            .position(|t| t.table_box == ruled.table_box);
        match rival {
            Some(k) if richer(&boundary[k], &ruled, params.richer_structure_ratio) => {
                debug!(
                    dropped = %ruled.id,
                    kept = %boundary[k].id,
                    "cluster structure replaces ruled grid"
                );
            }
            Some(k) => {
                losers.insert(k);
                out.push(ruled);
            }
            None => out.push(ruled),
        }
    }
    out.extend(
        boundary
            .into_iter()
            .enumerate()
            .filter(|(k, _)| !losers.contains(k))
            .map(|(_, t)| t),
    );

    let kept = out.len();
    for t in boundaryless {
        if out[..kept].iter().any(|o| o.table_box.overlap(&t.table_box)) {
            debug!(dropped = %t.id, "boundaryless table overlaps a detected table");
            continue;
        }
        out.push(t);
    }
    out
}
