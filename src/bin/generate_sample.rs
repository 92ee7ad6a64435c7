use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use spatial_neighbourhoods::data::loader::{PARENT_COLUMN, PHENOTYPE_COLUMN, X_COLUMN, Y_COLUMN};

/// Write synthetic per-sample cell tables for trying out the pipeline.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Directory to write `sample_<n>.csv` files into
    out_dir: PathBuf,

    #[arg(long, default_value_t = 3)]
    samples: usize,

    #[arg(long, default_value_t = 2000)]
    cells: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// Tissue niches: a centre and the phenotypes that dominate around it.
const NICHES: [((f64, f64), &[(&str, f64)]); 4] = [
    ((250.0, 250.0), &[("panCK", 0.7), ("panCK_Other", 0.2), ("CD8", 0.1)]),
    ((750.0, 250.0), &[("FAP", 0.4), ("FAP_PDPN", 0.3), ("PDGFRa", 0.2), ("aSMA", 0.1)]),
    ((250.0, 750.0), &[("CD8", 0.6), ("CD8_Other", 0.3), ("Other", 0.1)]),
    ((750.0, 750.0), &[("FAP_aSMA", 0.3), ("PDPN_aSMA", 0.3), ("Other", 0.2), ("unclassified detections", 0.2)]),
];

const SIDE: f64 = 1000.0;

fn pick<'a>(weights: &[(&'a str, f64)], rng: &mut SmallRng) -> &'a str {
    let total: f64 = weights.iter().map(|&(_, w)| w).sum();
    let mut target = rng.gen::<f64>() * total;
    for &(name, w) in weights {
        if target < w {
            return name;
        }
        target -= w;
    }
    weights[weights.len() - 1].0
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let mut rng = SmallRng::seed_from_u64(args.seed);

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating {}", args.out_dir.display()))?;

    for s in 0..args.samples {
        let path = args.out_dir.join(format!("sample_{s}.csv"));
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("creating {}", path.display()))?;
        writer.write_record(["Object ID", PARENT_COLUMN, X_COLUMN, Y_COLUMN, PHENOTYPE_COLUMN, "Cell Area"])?;

        for id in 0..args.cells {
            let x = rng.gen::<f64>() * SIDE;
            let y = rng.gen::<f64>() * SIDE;

            // nearest niche decides the phenotype mixture
            let (niche, (_, weights)) = NICHES
                .iter()
                .enumerate()
                .min_by(|(_, ((ax, ay), _)), (_, ((bx, by), _))| {
                    let da = (x - ax).powi(2) + (y - ay).powi(2);
                    let db = (x - bx).powi(2) + (y - by).powi(2);
                    da.total_cmp(&db)
                })
                .context("no niches defined")?;
            let phenotype = pick(weights, &mut rng);
            let area = 20.0 + rng.gen::<f64>() * 60.0;

            writer.write_record([
                id.to_string(),
                format!("Annotation_{niche}"),
                format!("{x:.2}"),
                format!("{y:.2}"),
                phenotype.to_string(),
                format!("{area:.1}"),
            ])?;
        }
        writer.flush()?;
        println!("Wrote {} cells to {}", args.cells, path.display());
    }
    Ok(())
}
