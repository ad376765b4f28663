//! Density-based grouping of boxed items.
//!
//! DBSCAN over edge-to-edge box distances: an item's neighbourhood is every
//! item (itself included) closer than `eps`, and an item with at least
//! `min_pts` neighbours seeds or extends a cluster. Items that never join a
//! cluster are kept as singleton clusters after the dense ones, so every input
//! item ends up in exactly one cluster.

use std::collections::VecDeque;

use rstar::{AABB, RTree, RTreeObject};
use serde::{Deserialize, Serialize};

use crate::utils::{Bbox, DistanceCache, HasBbox};

/// A group of nearby items. `members` index the slice that was clustered.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: usize,
    pub members: Vec<usize>,
    pub bbox: Bbox,
}

impl HasBbox for Cluster {
    fn bbox(&self) -> Bbox {
        self.bbox
    }
}

/// Index node for the neighbourhood queries.
struct ClusterNode {
    id: usize,
    bbox: Bbox,
}

impl RTreeObject for ClusterNode {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bbox.min_x, self.bbox.min_y],
            [self.bbox.max_x, self.bbox.max_y],
        )
    }
}

struct Neighbourhood<'a, T> {
    items: &'a [T],
    tree: RTree<ClusterNode>,
    eps: f64,
    cache: DistanceCache,
}

impl<'a, T: HasBbox> Neighbourhood<'a, T> {
    fn new(items: &'a [T], eps: f64) -> Self {
        let nodes = items
            .iter()
            .enumerate()
            .filter(|(_, item)| !item.bbox().is_unbounded())
            .map(|(id, item)| ClusterNode {
                id,
                bbox: item.bbox(),
            })
            .collect();
        Self {
            items,
            tree: RTree::bulk_load(nodes),
            eps,
            cache: DistanceCache::new(),
        }
    }

    /// Indices within `eps` of item `i`, ascending.
    fn query(&mut self, i: usize) -> Vec<usize> {
        let b = self.items[i].bbox();
        if b.is_unbounded() {
            return Vec::new();
        }
        let env = AABB::from_corners(
            [b.min_x - self.eps, b.min_y - self.eps],
            [b.max_x + self.eps, b.max_y + self.eps],
        );
        let mut out: Vec<usize> = Vec::new();
        for node in self.tree.locate_in_envelope_intersecting(&env) {
            if self.cache.distance(i, node.id, &b, &node.bbox) < self.eps {
                out.push(node.id);
            }
        }
        out.sort_unstable();
        out
    }
}

/// Clusters `items` with neighbourhood radius `eps` and density `min_pts`.
///
/// Output is deterministic: dense clusters are numbered in order of their
/// lowest-index seed, members are sorted ascending, and noise singletons
/// follow in index order.
pub fn cluster<T: HasBbox>(items: &[T], eps: f64, min_pts: usize) -> Vec<Cluster> {
    let n = items.len();
    let mut hood = Neighbourhood::new(items, eps);
    let mut label: Vec<Option<usize>> = vec![None; n];
    let mut visited = vec![false; n];
    let mut groups: Vec<Vec<usize>> = Vec::new();

    for i in 0..n {
        if visited[i] {
            continue;
        }
        visited[i] = true;
        let seeds = hood.query(i);
        if seeds.len() < min_pts {
            continue;
        }
        let c = groups.len();
        groups.push(vec![i]);
        label[i] = Some(c);

        let mut queue: VecDeque<usize> = seeds.into_iter().filter(|&j| j != i).collect();
        while let Some(j) = queue.pop_front() {
            if !visited[j] {
                visited[j] = true;
                let more = hood.query(j);
                if more.len() >= min_pts {
                    queue.extend(more.into_iter().filter(|&k| label[k].is_none()));
                }
            }
            if label[j].is_none() {
                label[j] = Some(c);
                groups[c].push(j);
            }
        }
    }

    for (i, l) in label.iter().enumerate() {
        if l.is_none() {
            groups.push(vec![i]);
        }
    }

    groups
        .into_iter()
        .enumerate()
        .map(|(id, mut members)| {
            members.sort_unstable();
            let mut bbox = Bbox::EMPTY;
            for &m in &members {
                bbox.update_box(&items[m].bbox());
            }
            Cluster { id, members, bbox }
        })
        .collect()
}

/// The clusters of one page together with the radius they were built with.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ClusterSet {
    pub eps: f64,
    pub clusters: Vec<Cluster>,
}

impl ClusterSet {
    pub fn build<T: HasBbox>(items: &[T], eps: f64, min_pts: usize) -> Self {
        Self {
            eps,
            clusters: cluster(items, eps, min_pts),
        }
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Cluster> {
        self.clusters.iter()
    }

    /// Clusters whose box lies fully inside `region`.
    pub fn inside(&self, region: &Bbox) -> Vec<&Cluster> {
        self.clusters
            .iter()
            .filter(|c| region.contains(&c.bbox))
            .collect()
    }
}
