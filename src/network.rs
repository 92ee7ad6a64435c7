use std::collections::VecDeque;

use kdtree::KdTree;
use kdtree::distance::squared_euclidean;
use log::{debug, warn};

use crate::config::{NetworkConfig, NetworkType};
use crate::error::AnalysisError;

// ---------------------------------------------------------------------------
// SpatialNetwork – undirected proximity graph over one domain
// ---------------------------------------------------------------------------

/// Undirected proximity graph; node `i` is point `i` of the domain.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialNetwork {
    /// Sorted, deduplicated neighbour lists without self loops.
    pub adjacency: Vec<Vec<usize>>,
}

impl SpatialNetwork {
    /// Build the network for `points` according to `config`.
    pub fn build(points: &[[f64; 2]], config: &NetworkConfig) -> Result<Self, AnalysisError> {
        let max_distance = config.max_distance();
        if config.min_edge_distance > max_distance {
            return Err(AnalysisError::InvalidParameter(format!(
                "min_edge_distance {} exceeds max_edge_distance {}",
                config.min_edge_distance, max_distance
            )));
        }

        let mut adjacency = vec![Vec::new(); points.len()];
        if points.is_empty() {
            return Ok(SpatialNetwork { adjacency });
        }

        let mut tree: KdTree<f64, usize, [f64; 2]> = KdTree::new(2);
        for (i, p) in points.iter().enumerate() {
            tree.add(*p, i)?;
        }

        if config.network_type == NetworkType::Distance && config.max_edge_distance.is_none() {
            warn!("distance network without max_edge_distance is fully connected");
        }

        let keep = |sq: f64| {
            let d = sq.sqrt();
            d >= config.min_edge_distance && d <= max_distance
        };

        for (i, p) in points.iter().enumerate() {
            let candidates = match config.network_type {
                NetworkType::Knn => {
                    let k = config.number_of_nearest_neighbours;
                    // +1: the query point finds itself
                    tree.nearest(p, k + 1, &squared_euclidean)?
                        .into_iter()
                        .filter(|&(_, &j)| j != i)
                        .take(k)
                        .collect::<Vec<_>>()
                }
                NetworkType::Distance => {
                    let radius = max_distance * max_distance;
                    tree.within(p, radius, &squared_euclidean)?
                        .into_iter()
                        .filter(|&(_, &j)| j != i)
                        .collect::<Vec<_>>()
                }
            };

            for (sq, &j) in candidates {
                if keep(sq) {
                    adjacency[i].push(j);
                    adjacency[j].push(i);
                }
            }
        }

        for neighbours in &mut adjacency {
            neighbours.sort_unstable();
            neighbours.dedup();
        }

        let n_edges: usize = adjacency.iter().map(Vec::len).sum::<usize>() / 2;
        debug!("network: {} nodes, {} edges", points.len(), n_edges);
        Ok(SpatialNetwork { adjacency })
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.adjacency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    /// Nodes reachable from `node` in at most `k` hops, `node` included.
    /// Returned in ascending order.
    pub fn k_hop_neighbourhood(&self, node: usize, k: usize) -> Vec<usize> {
        let mut depth = vec![usize::MAX; self.adjacency.len()];
        let mut queue = VecDeque::new();
        let mut reached = vec![node];
        depth[node] = 0;
        queue.push_back(node);

        while let Some(u) = queue.pop_front() {
            if depth[u] == k {
                continue;
            }
            for &v in &self.adjacency[u] {
                if depth[v] == usize::MAX {
                    depth[v] = depth[u] + 1;
                    reached.push(v);
                    queue.push_back(v);
                }
            }
        }
        reached.sort_unstable();
        reached
    }
}
