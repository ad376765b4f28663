//! Tables with neither ruling lines nor a background box.
//!
//! Clusters that share a band of the page form a cluster line; consecutive
//! lines with small vertical gaps form a region, and each region is handed to
//! the cluster-boundary detector.

use ordered_float::OrderedFloat;
use smallvec::SmallVec;
use tracing::debug;

use super::boundary::detect_with_clusters;
use super::finder::PageContext;
use super::types::{Table, TableSource};
use crate::cluster::{Cluster, ClusterSet};
use crate::page::Span;
use crate::params::TableParams;
use crate::utils::{Bbox, items_in_box};

type ClusterLine = SmallVec<[usize; 8]>;

/// Whether `other` starts within `tol` of `seed`'s band, or the reverse.
fn same_band(seed: &Bbox, other: &Bbox, tol: f64) -> bool {
    let starts_in = |a: &Bbox, b: &Bbox| b.min_y <= a.max_y + tol && b.min_y >= a.min_y - tol;
    starts_in(seed, other) || starts_in(other, seed)
}

/// Groups clusters into lines of two or more, top to bottom.
fn cluster_lines(clusters: &[Cluster], tol: f64) -> Vec<ClusterLine> {
    let mut order: Vec<usize> = (0..clusters.len())
        .filter(|&i| !clusters[i].bbox.is_unbounded())
        .collect();
    order.sort_by_key(|&i| OrderedFloat(clusters[i].bbox.min_y));

    let mut assigned = vec![false; clusters.len()];
    let mut lines = Vec::new();
    for &seed in &order {
        if assigned[seed] {
            continue;
        }
        let seed_box = clusters[seed].bbox;
        let line: ClusterLine = order
            .iter()
            .copied()
            .filter(|&o| !assigned[o] && same_band(&seed_box, &clusters[o].bbox, tol))
            .collect();
        for &o in &line {
            assigned[o] = true;
        }
        if line.len() > 1 {
            lines.push(line);
        }
    }
    lines
}

/// Regions of aligned cluster lines not already covered by `claimed`.
pub fn boundaryless_regions(
    clusters: &[Cluster],
    claimed: &[Bbox],
    params: &TableParams,
) -> Vec<Bbox> {
    let line_box = |line: &ClusterLine| {
        line.iter()
            .fold(Bbox::EMPTY, |acc, &i| acc.union(&clusters[i].bbox))
    };

    let mut groups: Vec<Bbox> = Vec::new();
    for line in cluster_lines(clusters, params.cluster_line_tolerance) {
        let b = line_box(&line);
        match groups.last_mut() {
            Some(group) if b.min_y - group.max_y <= params.cluster_line_gap => group.update_box(&b),
            _ => groups.push(b),
        }
    }
    groups.retain(|g| {
        let covered = claimed.iter().any(|c| c.contains(g));
        if covered {
            debug!(y0 = g.min_y, y1 = g.max_y, "aligned region already claimed");
        }
        !covered
    });
    groups
}

/// Runs the cluster-boundary detector over every unclaimed aligned region.
pub fn detect_boundaryless(
    ctx: &mut PageContext,
    spans: &[Span],
    clusters: &ClusterSet,
    claimed: &[Bbox],
    params: &TableParams,
) -> Vec<Table> {
    boundaryless_regions(&clusters.clusters, claimed, params)
        .iter()
        .filter_map(|region| {
            let inside = items_in_box(region, spans);
            let members = clusters.inside(region);
            detect_with_clusters(ctx, region, &inside, &members, TableSource::Boundaryless, params)
        })
        .collect()
}
