/// Average-linkage (UPGMA) agglomerative clustering over Euclidean
/// distances, reduced to the dendrogram's leaf order.
///
/// Each merge places the subtree with the lower cluster id on the left;
/// leaves have ids `0..n` and the merge at step `s` gets id `n + s`.
pub fn average_linkage_order(vectors: &[Vec<f64>]) -> Vec<usize> {
    let n = vectors.len();
    if n < 2 {
        return (0..n).collect();
    }

    struct Node {
        id: usize,
        size: usize,
        leaves: Vec<usize>,
    }

    let mut nodes: Vec<Node> = (0..n)
        .map(|i| Node {
            id: i,
            size: 1,
            leaves: vec![i],
        })
        .collect();

    // dist[a][b] between active nodes, indexed by position in `nodes`
    let mut dist: Vec<Vec<f64>> = vectors
        .iter()
        .map(|a| {
            vectors
                .iter()
                .map(|b| a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f64>().sqrt())
                .collect()
        })
        .collect();

    let mut next_id = n;
    while nodes.len() > 1 {
        let mut best = (0, 1, f64::INFINITY);
        for a in 0..nodes.len() {
            for b in (a + 1)..nodes.len() {
                if dist[a][b] < best.2 {
                    best = (a, b, dist[a][b]);
                }
            }
        }
        let (a, b, _) = best;

        // Lance-Williams update for average linkage.
        let (sa, sb) = (nodes[a].size as f64, nodes[b].size as f64);
        let merged_row: Vec<f64> = (0..nodes.len())
            .map(|k| (sa * dist[a][k] + sb * dist[b][k]) / (sa + sb))
            .collect();

        // b > a: remove b first so `a` stays valid.
        let right = nodes.remove(b);
        dist.remove(b);
        for row in &mut dist {
            row.remove(b);
        }
        let left = std::mem::replace(
            &mut nodes[a],
            Node {
                id: 0,
                size: 0,
                leaves: Vec::new(),
            },
        );
        let (first, second) = if left.id < right.id { (left, right) } else { (right, left) };
        let mut leaves = first.leaves;
        leaves.extend(second.leaves);
        nodes[a] = Node {
            id: next_id,
            size: first.size + second.size,
            leaves,
        };
        next_id += 1;

        let merged_row: Vec<f64> = merged_row
            .into_iter()
            .enumerate()
            .filter(|&(k, _)| k != b)
            .map(|(_, d)| d)
            .collect();
        for (k, &d) in merged_row.iter().enumerate() {
            dist[a][k] = d;
            dist[k][a] = d;
        }
        dist[a][a] = 0.0;
    }

    nodes.remove(0).leaves
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trivial_inputs() {
        assert!(average_linkage_order(&[]).is_empty());
        assert_eq!(average_linkage_order(&[vec![1.0]]), vec![0]);
    }

    #[test]
    fn tight_pairs_end_up_adjacent() {
        let v = vec![vec![0.0], vec![10.0], vec![0.1], vec![10.3]];
        assert_eq!(average_linkage_order(&v), vec![0, 2, 1, 3]);
    }

    #[test]
    fn order_is_a_permutation() {
        let v: Vec<Vec<f64>> = (0..9)
            .map(|i| vec![((i * 7) % 5) as f64, (i % 3) as f64])
            .collect();
        let mut order = average_linkage_order(&v);
        order.sort_unstable();
        assert_eq!(order, (0..9).collect::<Vec<_>>());
    }
}
