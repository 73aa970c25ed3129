//! CODARFE command-line interface.
//!
//! Fits a model from a count table and a metadata table, or predicts the
//! target of new samples with a saved model.

use clap::{Parser, Subcommand};
use codarfe::data::{CountTable, Target};
use codarfe::error::Result;
use codarfe::pipeline::{fit, FitConfig, FittedModel};
use std::path::{Path, PathBuf};

/// Compositional-data-aware recursive feature elimination
#[derive(Parser)]
#[command(name = "codarfe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Select predictive taxa and train a model
    Fit {
        /// Count table (samples × taxa), CSV or TSV with sample ids first
        #[arg(short = 'c', long)]
        counts: PathBuf,

        /// Metadata table holding the target, CSV or TSV with sample ids first
        #[arg(short, long)]
        metadata: PathBuf,

        /// Name of the target column in the metadata
        #[arg(short, long)]
        target: String,

        /// Fit configuration YAML (defaults apply to missing keys)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output path for the fitted model (JSON)
        #[arg(long)]
        model: PathBuf,

        /// Optional path for a plain-text results report
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Predict the target of new samples with a saved model
    Predict {
        /// Fitted model written by `codarfe fit`
        #[arg(long)]
        model: PathBuf,

        /// Count table of the new samples
        #[arg(short = 'c', long)]
        counts: PathBuf,

        /// Output CSV (sample_id,Prediction)
        #[arg(short, long)]
        output: PathBuf,

        /// Skip the relative abundance transform (data already proportions)
        #[arg(long)]
        no_relative_abundance: bool,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Fit {
            counts,
            metadata,
            target,
            config,
            model,
            report,
        } => cmd_fit(&counts, &metadata, &target, config.as_deref(), &model, report.as_deref()),

        Commands::Predict {
            model,
            counts,
            output,
            no_relative_abundance,
        } => cmd_predict(&model, &counts, &output, !no_relative_abundance),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn delimiter_for(path: &Path) -> u8 {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => b',',
        _ => b'\t',
    }
}

fn cmd_fit(
    counts_path: &Path,
    metadata_path: &Path,
    target_column: &str,
    config_path: Option<&Path>,
    model_path: &Path,
    report_path: Option<&Path>,
) -> Result<()> {
    let config = match config_path {
        Some(path) => FitConfig::from_yaml(&std::fs::read_to_string(path)?)?,
        None => FitConfig::default(),
    };

    let counts = CountTable::from_delimited(counts_path, delimiter_for(counts_path))?;
    let target = Target::from_delimited(metadata_path, delimiter_for(metadata_path), target_column)?;
    eprintln!(
        "Loaded {} samples x {} taxa",
        counts.n_samples(),
        counts.n_taxa()
    );

    let model = fit(&counts, &target, &config)?;
    let results = model.results();
    eprintln!("Results:");
    eprintln!("  R² adj      -> {}", results.r2_adj);
    eprintln!("  F-statistic -> {}", results.f_pvalue);
    eprintln!("  BIC         -> {}", results.bic);
    eprintln!("  MSE-CV      -> {}", results.rmse_cv);
    eprintln!(
        "  {} selected taxa ({:.2}% of {})",
        model.selected_taxa().len(),
        model.selected_taxa().len() as f64 / model.n_input_taxa() as f64 * 100.0,
        model.n_input_taxa()
    );
    for warning in model.warnings() {
        eprintln!("Warning: {}", warning);
    }

    model.save(model_path)?;
    if let Some(path) = report_path {
        model.write_report(path)?;
        eprintln!("Report written to {:?}", path);
    }
    Ok(())
}

fn cmd_predict(
    model_path: &Path,
    counts_path: &Path,
    output_path: &Path,
    apply_relative_abundance: bool,
) -> Result<()> {
    let model = FittedModel::load(model_path)?;
    let counts = CountTable::from_delimited(counts_path, delimiter_for(counts_path))?;

    let prediction = model.predict(&counts, apply_relative_abundance)?;
    if prediction.is_refused() {
        eprintln!(
            "No prediction made: {} of {} selected taxa are missing from the new samples",
            prediction.n_not_found,
            model.selected_taxa().len()
        );
        std::process::exit(2);
    }

    prediction.write_csv(output_path)?;
    eprintln!(
        "Predicted {} samples ({} selected taxa imputed as zero) -> {:?}",
        prediction.sample_ids.len(),
        prediction.n_not_found,
        output_path
    );
    Ok(())
}
