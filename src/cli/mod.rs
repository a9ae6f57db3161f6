//! Command-line parsing for the joint fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::units::Unit;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "jf", version, about = "Joint least-squares fitting of 1-D models with shared parameters")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the joint fit described by a job file.
    Fit(FitArgs),
    /// Fit two Gaussians sharing their amplitude to synthetic noisy data.
    Demo(DemoArgs),
    /// Convert between redshift and radial velocity.
    Convert(ConvertArgs),
    /// Plot the fitted grids of a previously exported result JSON.
    Plot(PlotArgs),
    /// Show a cosmology (Planck18 by default), optionally a modified copy.
    Cosmology(CosmologyArgs),
}

/// Output options shared by `fit` and `demo`.
#[derive(Debug, Args, Clone)]
pub struct OutputArgs {
    /// Render an ASCII plot per model (enabled by default).
    #[arg(long, default_value_t = true)]
    pub plot: bool,

    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 72)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 16)]
    pub height: usize,

    /// Export the fitted result (parameters + grids) to JSON.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export per-point residuals to CSV.
    #[arg(long = "export-residuals")]
    pub export_residuals: Option<PathBuf>,

    /// Also fit every model on its own dataset and print both.
    #[arg(long)]
    pub independent: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Job file (JSON) describing models, shared parameters and datasets.
    #[arg(long, value_name = "JSON")]
    pub job: PathBuf,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Parser, Clone)]
pub struct DemoArgs {
    /// Points per dataset.
    #[arg(short = 'n', long, default_value_t = 20)]
    pub points: usize,

    /// Gaussian noise standard deviation.
    #[arg(long, default_value_t = 0.2)]
    pub noise: f64,

    /// Random seed for the noise.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Initial value of the shared amplitude.
    #[arg(long, default_value_t = 9.8)]
    pub initval: f64,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Parser, Clone)]
pub struct ConvertArgs {
    /// Value to convert.
    #[arg(allow_negative_numbers = true)]
    pub value: f64,

    #[arg(long, value_enum)]
    pub from: Unit,

    #[arg(long, value_enum)]
    pub to: Unit,
}

#[derive(Debug, Parser)]
pub struct PlotArgs {
    /// Result JSON file produced by `jf fit --export`.
    #[arg(long, value_name = "JSON")]
    pub result: PathBuf,

    /// Plot width (columns).
    #[arg(long, default_value_t = 72)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 16)]
    pub height: usize,
}

#[derive(Debug, Parser)]
pub struct CosmologyArgs {
    /// Cosmology file (YAML, or JSON with a `.json` extension).
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Override a parameter, e.g. `--set Om0=0.35`. Repeatable.
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_parameter)]
    pub set: Vec<(String, f64)>,

    /// Add or replace a metadata entry. Repeatable.
    #[arg(long = "meta", value_name = "KEY=VALUE", value_parser = parse_meta)]
    pub meta: Vec<(String, String)>,

    /// Name of the modified copy.
    #[arg(long)]
    pub name: Option<String>,

    /// Write the (modified) cosmology here instead of printing YAML.
    #[arg(long, value_name = "PATH")]
    pub write: Option<PathBuf>,
}

fn parse_meta(s: &str) -> Result<(String, String), String> {
    let (key, value) = s.split_once('=').ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    Ok((key.trim().to_string(), value.trim().to_string()))
}

fn parse_parameter(s: &str) -> Result<(String, f64), String> {
    let (key, value) = parse_meta(s)?;
    let value = value.parse::<f64>().map_err(|e| format!("invalid value for {key}: {e}"))?;
    Ok((key, value))
}
