//! Density-based (DBSCAN) clustering of segment colors.
//!
//! Member colors are points in RGB space under the L1 metric. A color is
//! a core point when at least `min_points` colors (itself included) lie
//! strictly closer than `eps`. Clusters grow outward from core points;
//! everything unreachable is noise.
//!
//! Neighborhood queries go through an [`rstar::RTree`]: the cube of
//! half-width `eps` around a color contains its whole L1 ball, so an
//! envelope query followed by an exact distance filter is complete.

use rstar::primitives::GeomWithData;
use rstar::{AABB, RTree};
use serde::{Deserialize, Serialize};

use crate::types::Rgb;

/// DBSCAN parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterParams {
    /// Neighborhood radius: colors whose channel-wise absolute
    /// differences sum to less than `eps` are neighbors.
    pub eps: u32,
    /// Minimum neighborhood size (including the point itself) for a
    /// color to seed or extend a cluster.
    pub min_points: usize,
}

impl ClusterParams {
    pub const DEFAULT_EPS: u32 = 24;
    pub const DEFAULT_MIN_POINTS: usize = 4;
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            eps: Self::DEFAULT_EPS,
            min_points: Self::DEFAULT_MIN_POINTS,
        }
    }
}

type ColorPoint = GeomWithData<[i32; 3], usize>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Unvisited,
    Noise,
    Cluster(usize),
}

const fn l1(a: [i32; 3], b: [i32; 3]) -> u32 {
    a[0].abs_diff(b[0]) + a[1].abs_diff(b[1]) + a[2].abs_diff(b[2])
}

fn neighbors(tree: &RTree<ColorPoint>, center: [i32; 3], eps: u32) -> Vec<usize> {
    #[allow(clippy::cast_possible_wrap)]
    let r = eps.min(1024) as i32;
    let envelope = AABB::from_corners(
        [center[0] - r, center[1] - r, center[2] - r],
        [center[0] + r, center[1] + r, center[2] + r],
    );
    tree.locate_in_envelope(&envelope)
        .filter(|p| l1(*p.geom(), center) < eps)
        .map(|p| p.data)
        .collect()
}

/// Partition `colors` into clusters. Returns one member-index list per
/// cluster, in discovery order. Noise points belong to no cluster.
#[must_use]
pub fn dbscan(colors: &[Rgb], params: ClusterParams) -> Vec<Vec<usize>> {
    let points: Vec<[i32; 3]> = colors
        .iter()
        .map(|c| [i32::from(c.r), i32::from(c.g), i32::from(c.b)])
        .collect();
    let tree = RTree::bulk_load(
        points
            .iter()
            .enumerate()
            .map(|(i, &p)| ColorPoint::new(p, i))
            .collect(),
    );

    let mut labels = vec![Label::Unvisited; points.len()];
    let mut clusters: Vec<Vec<usize>> = Vec::new();

    for p in 0..points.len() {
        if labels[p] != Label::Unvisited {
            continue;
        }
        let seeds = neighbors(&tree, points[p], params.eps);
        if seeds.len() < params.min_points {
            labels[p] = Label::Noise;
            continue;
        }

        let id = clusters.len();
        let mut members = vec![p];
        labels[p] = Label::Cluster(id);

        let mut queue = seeds;
        while let Some(q) = queue.pop() {
            match labels[q] {
                Label::Cluster(_) => continue,
                // Border point: joins the cluster but does not expand it.
                Label::Noise => {
                    labels[q] = Label::Cluster(id);
                    members.push(q);
                }
                Label::Unvisited => {
                    labels[q] = Label::Cluster(id);
                    members.push(q);
                    let reach = neighbors(&tree, points[q], params.eps);
                    if reach.len() >= params.min_points {
                        queue.extend(reach);
                    }
                }
            }
        }
        members.sort_unstable();
        clusters.push(members);
    }

    clusters
}

/// Index of the largest cluster. Ties go to the first discovered.
#[must_use]
pub fn largest(clusters: &[Vec<usize>]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, cluster) in clusters.iter().enumerate() {
        if best.is_none_or(|b| cluster.len() > clusters[b].len()) {
            best = Some(i);
        }
    }
    best
}
