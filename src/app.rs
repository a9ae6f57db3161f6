//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - loads a job (or builds the demo job)
//! - runs the joint fit
//! - prints reports/plots and writes optional exports

use std::path::Path;

use clap::Parser;

use crate::cli::{Command, ConvertArgs, CosmologyArgs, DemoArgs, FitArgs, OutputArgs, PlotArgs};
use crate::cosmology::{Cosmology, CosmologyChanges};
use crate::domain::FitConfig;
use crate::error::AppError;
use crate::units::{convert, doppler_redshift};

pub mod pipeline;

/// Entry point for the `jf` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Demo(args) => handle_demo(args),
        Command::Convert(args) => handle_convert(args),
        Command::Plot(args) => handle_plot(args),
        Command::Cosmology(args) => handle_cosmology(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args.output);
    let run = pipeline::run_job_file(&args.job, &config)?;
    present(&run, &config)
}

fn handle_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args.output);
    let settings = pipeline::DemoSettings {
        points: args.points,
        noise: args.noise,
        seed: args.seed,
        initval: args.initval,
    };
    let job = pipeline::demo_job(&settings);
    let run = pipeline::run_job(&job, Path::new("."), &config)?;
    present(&run, &config)
}

/// Print the summary and plot, then write the requested exports.
fn present(run: &pipeline::RunOutput, config: &FitConfig) -> Result<(), AppError> {
    println!(
        "{}",
        crate::report::format_joint_summary(&run.models, &run.shared, &run.datasets, &run.report)
    );

    if let Some(fits) = &run.independent {
        println!("{}", crate::report::format_independent(fits));
    }

    if config.plot {
        let plot = crate::plot::render_joint_plot(&run.models, &run.datasets, config.plot_width, config.plot_height);
        println!("{plot}");
    }

    if let Some(path) = &config.export_result {
        let result = crate::io::build_result(&run.models, &run.shared, &run.datasets, &run.report);
        crate::io::write_result_json(path, &result)?;
    }
    if let Some(path) = &config.export_residuals {
        crate::io::write_residuals_csv(path, &run.residuals)?;
    }

    Ok(())
}

fn handle_convert(args: ConvertArgs) -> Result<(), AppError> {
    let value = convert(args.value, args.from, args.to, &[doppler_redshift()])?;
    println!("{}", format!("{value} {}", args.to.symbol()).trim_end());
    Ok(())
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let result = crate::io::read_result_json(&args.result)?;
    let plot = crate::plot::render_result_file(&result, args.width, args.height);
    println!("{plot}");
    Ok(())
}

fn handle_cosmology(args: CosmologyArgs) -> Result<(), AppError> {
    let base: Box<dyn Cosmology> = match &args.file {
        Some(path) => crate::cosmology::read_cosmology(path)?,
        None => Box::new(crate::cosmology::planck18()),
    };
    let cosmo = base.clone_with(&cosmology_changes(&args))?;
    log::info!("{} equivalent to input: {}", cosmo.class_name(), cosmo.is_equivalent(base.as_ref()));

    println!("{}", describe_cosmology(cosmo.as_ref()));
    match &args.write {
        Some(path) => crate::cosmology::write_cosmology(path, cosmo.as_ref()),
        None => {
            print!("{}", crate::cosmology::to_yaml(cosmo.as_ref())?);
            Ok(())
        }
    }
}

pub fn cosmology_changes(args: &CosmologyArgs) -> CosmologyChanges {
    CosmologyChanges {
        name: args.name.clone(),
        meta: args.meta.iter().cloned().collect(),
        parameters: args.set.iter().cloned().collect(),
    }
}

/// One-paragraph summary: class, name, flatness and parameters.
pub fn describe_cosmology(cosmo: &dyn Cosmology) -> String {
    let mut out = format!("{} ({})\n", cosmo.name().unwrap_or("unnamed"), cosmo.class_name());
    out.push_str(&format!("Flat: {}\n", if cosmo.is_flat() { "yes" } else { "no" }));
    for (name, value) in cosmo.parameters() {
        out.push_str(&format!("  {name:<5} {value}\n"));
    }
    out
}

pub fn fit_config_from_args(args: &OutputArgs) -> FitConfig {
    FitConfig {
        plot: args.plot && !args.no_plot,
        plot_width: args.width,
        plot_height: args.height,
        export_result: args.export.clone(),
        export_residuals: args.export_residuals.clone(),
        independent: args.independent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;

    #[test]
    fn no_plot_wins_over_default_plot() {
        let cli = Cli::try_parse_from(["jf", "demo", "--no-plot", "--independent"]).unwrap();
        let Command::Demo(args) = cli.command else {
            panic!("expected demo");
        };
        let config = fit_config_from_args(&args.output);
        assert!(!config.plot);
        assert!(config.independent);
        assert_eq!(config.plot_width, 72);
        assert!(config.export_result.is_none());
    }

    #[test]
    fn cosmology_command_builds_a_modified_copy() {
        let cli = Cli::try_parse_from(["jf", "cosmology", "--set", "Om0=0.35", "--meta", "note=test"]).unwrap();
        let Command::Cosmology(args) = cli.command else {
            panic!("expected cosmology");
        };
        let cosmo = crate::cosmology::planck18().clone_with(&cosmology_changes(&args)).unwrap();
        assert_eq!(cosmo.name(), Some("Planck18 (modified)"));
        assert_eq!(cosmo.meta()["note"], "test");

        let text = describe_cosmology(cosmo.as_ref());
        assert_eq!(text, "Planck18 (modified) (FlatLambdaCDM)\nFlat: yes\n  H0    67.66\n  Om0   0.35\n");
    }
}
