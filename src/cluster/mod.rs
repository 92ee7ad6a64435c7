/// Clustering primitives: k-means variants for neighbourhood assignment and
/// the elbow diagnostic, and hierarchical ordering for heatmap columns.
pub mod hierarchy;
pub mod kmeans;
