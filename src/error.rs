use thiserror::Error;

// ---------------------------------------------------------------------------
// Loading errors
// ---------------------------------------------------------------------------

/// Errors raised while turning a cell table into a [`Domain`](crate::data::model::Domain).
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("{file} missing columns: [{}]", .missing.join(", "))]
    MissingColumns { file: String, missing: Vec<String> },

    #[error("{file}, row {row}: '{value}' in column '{column}' is not a number")]
    InvalidCoordinate {
        file: String,
        row: usize,
        column: String,
        value: String,
    },
}

// ---------------------------------------------------------------------------
// Analysis errors
// ---------------------------------------------------------------------------

/// Errors raised by the network / clustering / plotting stages.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("cannot form {n_clusters} clusters from {n_points} observations")]
    NotEnoughPoints { n_points: usize, n_clusters: usize },

    #[error("domain '{domain}' has no label column '{label}'")]
    UnknownLabel { domain: String, label: String },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("spatial index error: {0:?}")]
    KdTree(kdtree::ErrorKind),
}

impl From<kdtree::ErrorKind> for AnalysisError {
    fn from(e: kdtree::ErrorKind) -> Self {
        AnalysisError::KdTree(e)
    }
}
