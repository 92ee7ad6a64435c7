use std::collections::BTreeSet;

use anyhow::{Result, bail};

// ---------------------------------------------------------------------------
// LabelColumn – one categorical label set
// ---------------------------------------------------------------------------

/// A categorical label for every point of a domain, keyed by point index.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelColumn {
    pub name: String,
    pub values: Vec<String>,
}

// ---------------------------------------------------------------------------
// Domain – one sample
// ---------------------------------------------------------------------------

/// A spatial dataset: cell centres plus parallel label columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Domain {
    pub name: String,
    /// Cell centres in image convention (y already negated).
    pub points: Vec<[f64; 2]>,
    /// Label columns in insertion order.
    pub labels: Vec<LabelColumn>,
}

impl Domain {
    pub fn new(name: impl Into<String>) -> Self {
        Domain {
            name: name.into(),
            points: Vec::new(),
            labels: Vec::new(),
        }
    }

    /// Append a point set. Labels added later must cover every point.
    pub fn add_points(&mut self, points: impl IntoIterator<Item = [f64; 2]>) {
        self.points.extend(points);
    }

    /// Attach a label column, replacing any column with the same name.
    pub fn add_labels(&mut self, name: &str, values: Vec<String>) -> Result<()> {
        if values.len() != self.points.len() {
            bail!(
                "domain '{}': label '{name}' has {} values but there are {} points",
                self.name,
                values.len(),
                self.points.len()
            );
        }
        match self.labels.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.values = values,
            None => self.labels.push(LabelColumn {
                name: name.to_string(),
                values,
            }),
        }
        Ok(())
    }

    /// Values of the named label column.
    pub fn label(&self, name: &str) -> Option<&[String]> {
        self.labels
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// Sorted distinct values of a label column (empty if absent).
    pub fn unique_labels(&self, name: &str) -> BTreeSet<String> {
        self.label(name)
            .map(|vals| vals.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the domain holds no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_point_domain() -> Domain {
        let mut d = Domain::new("s1.csv");
        d.add_points([[0.0, 0.0], [1.0, -1.0]]);
        d
    }

    #[test]
    fn add_labels_replaces_same_name() {
        let mut d = two_point_domain();
        d.add_labels("Phenotype", vec!["A".into(), "B".into()]).unwrap();
        d.add_labels("Phenotype", vec!["C".into(), "C".into()]).unwrap();
        assert_eq!(d.labels.len(), 1);
        assert_eq!(d.label("Phenotype").unwrap(), &["C".to_string(), "C".to_string()]);
    }

    #[test]
    fn add_labels_rejects_wrong_length() {
        let mut d = two_point_domain();
        assert!(d.add_labels("ROI", vec!["r".into()]).is_err());
    }

    #[test]
    fn unique_labels_sorted() {
        let mut d = two_point_domain();
        d.add_labels("Phenotype", vec!["b".into(), "a".into()]).unwrap();
        let u: Vec<_> = d.unique_labels("Phenotype").into_iter().collect();
        assert_eq!(u, vec!["a", "b"]);
        assert!(d.unique_labels("missing").is_empty());
    }
}
