use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};

use super::model::Domain;
use crate::error::LoadError;

pub const X_COLUMN: &str = "Cell X Position";
pub const Y_COLUMN: &str = "Cell Y Position";
pub const PHENOTYPE_COLUMN: &str = "Phenotype";
pub const PARENT_COLUMN: &str = "Parent";

/// Columns every input table must carry, in the order they are reported.
pub const REQUIRED_COLUMNS: [&str; 4] = [X_COLUMN, Y_COLUMN, PHENOTYPE_COLUMN, PARENT_COLUMN];

/// Label names given to the `Phenotype` and `Parent` columns.
pub const PHENOTYPE_LABEL: &str = "Phenotype";
pub const ROI_LABEL: &str = "ROI";

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load one domain per `.csv` file in `dir`, in file-name order.
pub fn create_domains(dir: &Path) -> Result<Vec<Domain>> {
    let csvs = list_csvs(dir)?;
    info!("Found {} CSV file(s) in {}", csvs.len(), dir.display());

    csvs.iter()
        .map(|path| -> Result<Domain> {
            let domain = load_domain_csv(path)?;
            info!("Loaded {} ({} cells)", domain.name, domain.len());
            Ok(domain)
        })
        .collect()
}

/// Regular files in `dir` with a `.csv` extension (any case), sorted by name.
pub fn list_csvs(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("reading input directory {}", dir.display()))?;

    let mut csvs = Vec::new();
    for entry in entries {
        let entry = entry.context("reading directory entry")?;
        let path = entry.path();
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if is_csv && path.is_file() {
            csvs.push(path);
        }
    }
    csvs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(csvs)
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// Build a [`Domain`] from a cell table.
///
/// The point set is (`Cell X Position`, -`Cell Y Position`), flipping the
/// vertical axis into image convention. `Phenotype` becomes the `Phenotype`
/// label and `Parent` the `ROI` label. Other columns are ignored.
pub fn load_domain_csv(path: &Path) -> Result<Domain> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening CSV {}", path.display()))?;
    let headers: Vec<String> = reader
        .headers()
        .with_context(|| format!("reading CSV headers of {file_name}"))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| !headers.iter().any(|h| h == *c))
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(LoadError::MissingColumns {
            file: file_name,
            missing,
        }
        .into());
    }

    // All four are present after the check above.
    let idx = |name: &str| headers.iter().position(|h| h == name).unwrap_or_default();
    let (x_idx, y_idx) = (idx(X_COLUMN), idx(Y_COLUMN));
    let (pheno_idx, parent_idx) = (idx(PHENOTYPE_COLUMN), idx(PARENT_COLUMN));

    let mut points = Vec::new();
    let mut phenotypes = Vec::new();
    let mut rois = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("{file_name}: CSV row {row_no}"))?;

        let x = parse_coordinate(&record, x_idx, &file_name, row_no, X_COLUMN)?;
        let y = parse_coordinate(&record, y_idx, &file_name, row_no, Y_COLUMN)?;
        points.push([x, -y]);

        phenotypes.push(record.get(pheno_idx).unwrap_or("").to_string());
        rois.push(record.get(parent_idx).unwrap_or("").to_string());
    }
    debug!("{file_name}: {} rows parsed", points.len());

    let mut domain = Domain::new(file_name);
    domain.add_points(points);
    domain.add_labels(PHENOTYPE_LABEL, phenotypes)?;
    domain.add_labels(ROI_LABEL, rois)?;
    Ok(domain)
}

fn parse_coordinate(
    record: &csv::StringRecord,
    idx: usize,
    file: &str,
    row: usize,
    column: &str,
) -> Result<f64> {
    let raw = record.get(idx).unwrap_or("");
    raw.trim().parse::<f64>().map_err(|_| {
        LoadError::InvalidCoordinate {
            file: file.to_string(),
            row,
            column: column.to_string(),
            value: raw.to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const HEADER: &str = "Cell X Position,Cell Y Position,Phenotype,Parent,Area";

    fn write(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn missing_columns_named_with_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "bad.csv", "Cell X Position,Phenotype\n1.0,CD8\n");

        let err = load_domain_csv(&dir.path().join("bad.csv")).unwrap_err();
        match err.downcast_ref::<LoadError>() {
            Some(LoadError::MissingColumns { file, missing }) => {
                assert_eq!(file, "bad.csv");
                assert_eq!(missing, &vec!["Cell Y Position".to_string(), "Parent".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let msg = err.to_string();
        assert!(msg.contains("bad.csv"));
        assert!(msg.contains("Cell Y Position"));
        assert!(msg.contains("Parent"));
    }

    #[test]
    fn y_axis_is_negated() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "a.csv",
            &format!("{HEADER}\n1.5,2.0,CD8,ROI_1,10\n-3.0,-4.25,FAP,ROI_2,11\n"),
        );

        let d = load_domain_csv(&dir.path().join("a.csv")).unwrap();
        assert_eq!(d.name, "a.csv");
        assert_eq!(d.points, vec![[1.5, -2.0], [-3.0, 4.25]]);
        assert_eq!(d.label(PHENOTYPE_LABEL).unwrap(), &["CD8".to_string(), "FAP".to_string()]);
        assert_eq!(d.label(ROI_LABEL).unwrap(), &["ROI_1".to_string(), "ROI_2".to_string()]);
        assert!(d.label("Area").is_none());
    }

    #[test]
    fn non_numeric_coordinate_fails() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.csv", &format!("{HEADER}\nabc,2.0,CD8,R,1\n"));

        let err = load_domain_csv(&dir.path().join("a.csv")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LoadError>(),
            Some(LoadError::InvalidCoordinate { row: 0, .. })
        ));
    }

    #[test]
    fn one_domain_per_csv_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        let body = format!("{HEADER}\n0,0,CD8,R,1\n");
        write(dir.path(), "b.CSV", &body);
        write(dir.path(), "a.csv", &body);
        write(dir.path(), "c.csv", &body);
        write(dir.path(), "notes.txt", "ignored");
        fs::create_dir(dir.path().join("d.csv")).unwrap();

        let domains = create_domains(dir.path()).unwrap();
        let names: Vec<_> = domains.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["a.csv", "b.CSV", "c.csv"]);
    }

    #[test]
    fn missing_input_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(create_domains(&dir.path().join("nope")).is_err());
    }
}
