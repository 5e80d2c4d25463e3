//! Optimizer experiment commands

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Subcommand;

use gradlab_optim::{compare, optimize, run_sweep, ObjectiveKind, OptimizerConfig, SweepReport, Trajectory};

use super::{open_sink, print_json};
use crate::config::Config;

#[derive(Subcommand)]
pub enum OptimCommands {
    /// Minimize an objective with a single optimizer
    Run {
        /// Objective (pathological, gaussian, trimodal)
        #[arg(long)]
        objective: Option<ObjectiveKind>,

        /// Optimizer kind (sgd, rmsprop, adam, adamw)
        #[arg(long, default_value = "adam")]
        optimizer: String,

        /// Learning rate
        #[arg(long)]
        lr: Option<f64>,

        /// Momentum (sgd, rmsprop)
        #[arg(long)]
        momentum: Option<f64>,

        /// Weight decay
        #[arg(long)]
        weight_decay: Option<f64>,

        /// Number of steps
        #[arg(long)]
        iters: Option<usize>,

        /// Starting point as `x,y`
        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        start: Option<[f64; 2]>,

        /// Write the loss of every step as JSON lines
        #[arg(long)]
        metrics_out: Option<PathBuf>,

        /// Print the full trajectory as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run every configured optimizer from the same start
    Compare {
        /// Objective (pathological, gaussian, trimodal)
        #[arg(long)]
        objective: Option<ObjectiveKind>,

        /// Number of steps
        #[arg(long)]
        iters: Option<usize>,

        /// Print the trajectories as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the configured hyperparameter sweep
    Sweep {
        /// Number of trials (random) or maximum grid size (grid)
        #[arg(long)]
        count: Option<usize>,

        /// Seed for hyperparameter sampling
        #[arg(long)]
        seed: Option<u64>,

        /// Objective (pathological, gaussian, trimodal)
        #[arg(long)]
        objective: Option<ObjectiveKind>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(cmd: OptimCommands, config: &Config) -> Result<()> {
    let settings = &config.optim;
    match cmd {
        OptimCommands::Run {
            objective,
            optimizer,
            lr,
            momentum,
            weight_decay,
            iters,
            start,
            metrics_out,
            json,
        } => {
            let mut opt = OptimizerConfig::from_kind(&optimizer)?;
            for (name, value) in [("lr", lr), ("momentum", momentum), ("weight_decay", weight_decay)] {
                if let Some(value) = value {
                    opt = opt.with_override(name, value)?;
                }
            }

            let objective = objective.unwrap_or(settings.objective).build();
            let mut sink = open_sink(metrics_out.as_deref(), opt.kind())?;
            let trajectory = optimize(
                objective.as_ref(),
                start.unwrap_or(settings.start),
                &opt,
                iters.unwrap_or(settings.iters),
                sink.as_mut(),
            )?;
            sink.flush()?;

            if json {
                print_json(&trajectory)
            } else {
                print_trajectories(std::slice::from_ref(&trajectory));
                Ok(())
            }
        }
        OptimCommands::Compare {
            objective,
            iters,
            json,
        } => {
            if settings.optimizers.is_empty() {
                bail!("No optimizers configured under [[optim.optimizers]]");
            }
            let objective = objective.unwrap_or(settings.objective).build();
            let trajectories = compare(
                objective.as_ref(),
                settings.start,
                &settings.optimizers,
                iters.unwrap_or(settings.iters),
            )?;

            if json {
                print_json(&trajectories)
            } else {
                print_trajectories(&trajectories);
                Ok(())
            }
        }
        OptimCommands::Sweep {
            count,
            seed,
            objective,
            json,
        } => {
            let mut sweep = settings.sweep.clone();
            if let Some(count) = count {
                sweep.count = count;
            }
            let objective = objective.unwrap_or(settings.objective).build();
            let report = run_sweep(
                &sweep,
                &settings.sweep_base,
                objective.as_ref(),
                settings.start,
                settings.iters,
                seed.unwrap_or(settings.seed),
            )?;

            if json {
                print_json(&report)
            } else {
                print_report(&report);
                Ok(())
            }
        }
    }
}

fn parse_point(s: &str) -> Result<[f64; 2], String> {
    let Some((x, y)) = s.split_once(',') else {
        return Err(format!("expected `x,y`, got `{s}`"));
    };
    let parse = |v: &str| v.trim().parse::<f64>().map_err(|e| format!("invalid coordinate `{v}`: {e}"));
    Ok([parse(x)?, parse(y)?])
}

fn print_trajectories(trajectories: &[Trajectory]) {
    for t in trajectories {
        let [x, y] = t.final_point();
        println!("{}", t.optimizer);
        println!("  objective:  {}", t.objective);
        println!("  steps:      {}", t.points.len());
        println!("  end:        ({x:.4}, {y:.4})");
        println!("  final loss: {:.6}", t.final_loss());
        println!("  min loss:   {:.6}", t.min_loss());
    }
}

fn print_report(report: &SweepReport) {
    println!("Sweep {} ({})", report.name, report.sweep_id);
    println!("{:<6} {:<14} PARAMS", "TRIAL", "METRIC");
    println!("{}", "-".repeat(60));
    for trial in &report.trials {
        let params = trial
            .params
            .iter()
            .map(|(k, v)| format!("{k}={v:.4e}"))
            .collect::<Vec<_>>()
            .join(" ");
        println!("{:<6} {:<14.6e} {params}", trial.index, trial.metric);
    }

    match report.best_trial() {
        Some(best) => println!("\nBest: trial {} -> {}", best.index, best.config),
        None => println!("\nNo trial produced a finite metric"),
    }
}
