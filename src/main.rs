use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use spatial_neighbourhoods::config::AnalysisConfig;

/// Run spatial neighbourhood analysis over a directory of cell tables.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Directory containing CSV files
    #[arg(long)]
    inputs: PathBuf,

    /// Output directory
    #[arg(long)]
    output: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    spatial_neighbourhoods::run(&args.inputs, &args.output, &AnalysisConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_flags_required() {
        assert!(Args::try_parse_from(["prog", "--inputs", "in"]).is_err());
        assert!(Args::try_parse_from(["prog", "--output", "out"]).is_err());

        let args = Args::try_parse_from(["prog", "--inputs", "in", "--output", "out"]).unwrap();
        assert_eq!(args.inputs, PathBuf::from("in"));
        assert_eq!(args.output, PathBuf::from("out"));
    }
}
