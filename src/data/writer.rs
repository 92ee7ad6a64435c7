use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{Array, ArrayRef, Float64Array, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use log::info;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::model::Domain;

pub const DOMAINS_DIR: &str = "domains";
pub const CSVS_DIR: &str = "csvs";

/// Schema metadata key holding the domain name.
const NAME_KEY: &str = "domain_name";
const ID_FIELD: &str = "object_id";

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Write every domain as `domains/<name>.parquet` and `csvs/<name>.csv`
/// under `save_path`, creating both directories if needed.
///
/// `<name>` is the full domain name, extension included, so inputs that differ
/// only in extension case keep separate outputs.
pub fn save_domains(domains: &[Domain], save_path: &Path) -> Result<()> {
    let domain_dir = save_path.join(DOMAINS_DIR);
    let csv_dir = save_path.join(CSVS_DIR);
    for dir in [&domain_dir, &csv_dir] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
    }

    let mut seen = HashSet::new();
    for domain in domains {
        if !seen.insert(domain.name.as_str()) {
            bail!("two domains are named '{}'; their outputs would collide", domain.name);
        }
        let (parquet_path, csv_path) = artifact_paths(domain, save_path);
        save_domain_parquet(domain, &parquet_path)?;
        domain_to_csv(domain, &csv_path)?;
    }
    info!(
        "Saved {} domain(s) to {} and {}",
        domains.len(),
        domain_dir.display(),
        csv_dir.display()
    );
    Ok(())
}

/// Output paths written for `domain` by [`save_domains`].
pub fn artifact_paths(domain: &Domain, save_path: &Path) -> (PathBuf, PathBuf) {
    (
        save_path.join(DOMAINS_DIR).join(format!("{}.parquet", domain.name)),
        save_path.join(CSVS_DIR).join(format!("{}.csv", domain.name)),
    )
}

// ---------------------------------------------------------------------------
// Parquet (native format)
// ---------------------------------------------------------------------------

/// Columns: `object_id`, `x`, `y`, then one Utf8 column per label.
/// The domain name lives in the Arrow schema metadata.
pub fn save_domain_parquet(domain: &Domain, path: &Path) -> Result<()> {
    let mut fields = vec![
        Field::new(ID_FIELD, DataType::UInt64, false),
        Field::new("x", DataType::Float64, false),
        Field::new("y", DataType::Float64, false),
    ];
    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(UInt64Array::from_iter_values(0..domain.len() as u64)),
        Arc::new(Float64Array::from_iter_values(domain.points.iter().map(|p| p[0]))),
        Arc::new(Float64Array::from_iter_values(domain.points.iter().map(|p| p[1]))),
    ];
    for label in &domain.labels {
        fields.push(Field::new(&label.name, DataType::Utf8, false));
        columns.push(Arc::new(StringArray::from_iter_values(label.values.iter())));
    }

    let metadata = HashMap::from([(NAME_KEY.to_string(), domain.name.clone())]);
    let schema = Arc::new(Schema::new_with_metadata(fields, metadata));
    let batch = RecordBatch::try_new(schema.clone(), columns)
        .with_context(|| format!("building record batch for {}", domain.name))?;

    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet record batch")?;
    writer.close().context("finalising parquet file")?;
    Ok(())
}

/// Read a domain written by [`save_domain_parquet`].
pub fn load_domain_parquet(path: &Path) -> Result<Domain> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;

    let schema = builder.schema().clone();
    let name = match schema.metadata().get(NAME_KEY) {
        Some(n) => n.clone(),
        None => bail!("{}: no '{NAME_KEY}' in schema metadata", path.display()),
    };
    let label_names: Vec<String> = schema
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .filter(|n| n != ID_FIELD && n != "x" && n != "y")
        .collect();

    let mut points = Vec::new();
    let mut labels: Vec<Vec<String>> = vec![Vec::new(); label_names.len()];

    let reader = builder.build().context("building parquet reader")?;
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let xs = f64_column(&batch, "x")?;
        let ys = f64_column(&batch, "y")?;
        points.extend(xs.values().iter().zip(ys.values().iter()).map(|(&x, &y)| [x, y]));

        for (values, label) in labels.iter_mut().zip(&label_names) {
            let col = batch
                .column_by_name(label)
                .with_context(|| format!("missing label column '{label}'"))?
                .as_any()
                .downcast_ref::<StringArray>()
                .with_context(|| format!("label column '{label}' is not Utf8"))?;
            values.extend((0..col.len()).map(|i| col.value(i).to_string()));
        }
    }

    let mut domain = Domain::new(name);
    domain.add_points(points);
    for (label, values) in label_names.iter().zip(labels) {
        domain.add_labels(label, values)?;
    }
    Ok(domain)
}

fn f64_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Float64Array> {
    batch
        .column_by_name(name)
        .with_context(|| format!("parquet file missing '{name}' column"))?
        .as_any()
        .downcast_ref::<Float64Array>()
        .with_context(|| format!("column '{name}' is not Float64"))
}

// ---------------------------------------------------------------------------
// CSV export
// ---------------------------------------------------------------------------

/// Flat export: `Object ID,x,y,<labels...>`.
pub fn domain_to_csv(domain: &Domain, path: &Path) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;

    let mut header = vec!["Object ID".to_string(), "x".to_string(), "y".to_string()];
    header.extend(domain.labels.iter().map(|l| l.name.clone()));
    writer.write_record(&header)?;

    for (i, p) in domain.points.iter().enumerate() {
        let mut row = vec![i.to_string(), p[0].to_string(), p[1].to_string()];
        row.extend(domain.labels.iter().map(|l| l.values[i].clone()));
        writer.write_record(&row)?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}
