use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use color_eyre::eyre::WrapErr;
use log::{error, info};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

use hybrid_rs::context::Context;
use hybrid_rs::error::{Error, ErrorKind};
use hybrid_rs::estimator::{IntervalEstimator, SimulationEstimator, UnavailableEstimator};
use hybrid_rs::generate::{generate, GENERATORS};
use hybrid_rs::passes::{Pipeline, Registry};
use hybrid_rs::printer::PrinterConfig;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    /// RK4 simulation of one trajectory
    Sim,
    /// First-order interval enclosure
    Interval,
    /// Numeric backend disabled
    None,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Printer {
    Default,
    Spaceex,
}

#[derive(Debug, Parser)]
#[command(author, version, about = "Hybrid automaton transformation pipeline")]
struct Cli {
    /// Model generator and its parameters.
    #[arg(long, num_args = 2, value_names = ["KIND", "PARAMS"], required_unless_present = "list_passes")]
    generate: Vec<String>,

    /// Pass to run, with its parameters (repeatable, runs in order).
    #[arg(long = "pass", num_args = 2, value_names = ["FLAG", "PARAMS"], action = clap::ArgAction::Append, allow_hyphen_values = true)]
    passes: Vec<String>,

    /// Numeric backend for range estimation.
    #[arg(long, value_enum, default_value = "sim")]
    estimator: Backend,

    /// Override the time horizon of the generated model.
    #[arg(long, value_name = "FLOAT")]
    time_horizon: Option<f64>,

    /// Skip the validation gate between passes.
    #[arg(long)]
    no_validate: bool,

    /// Operator spellings of the printed model.
    #[arg(long, value_enum, default_value = "default")]
    printer: Printer,

    /// Write the final automaton as Graphviz to this file.
    #[arg(long, value_name = "FILE")]
    dot: Option<PathBuf>,

    /// Write the final model to this file instead of stdout.
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// List the available passes and exit.
    #[arg(long)]
    list_passes: bool,

    /// Verbose output (info).
    #[arg(short, long)]
    verbose: bool,

    /// Debug output.
    #[arg(short, long)]
    debug: bool,
}

fn exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Params => 2,
        ErrorKind::Validation => 3,
        ErrorKind::Backend => 4,
        ErrorKind::Unsupported => 5,
        ErrorKind::Parse => 6,
        ErrorKind::Eval => 7,
    }
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let level = if cli.debug {
        LevelFilter::Debug
    } else if cli.verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };
    TermLogger::init(level, Config::default(), TerminalMode::Stderr, ColorChoice::Auto)?;

    if let Err(report) = run(&cli) {
        if let Some(err) = report.downcast_ref::<Error>() {
            error!("{}", err);
            std::process::exit(exit_code(err.kind()));
        }
        return Err(report);
    }
    Ok(())
}

fn run(cli: &Cli) -> color_eyre::Result<()> {
    let registry = Registry::new();
    if cli.list_passes {
        for pass in registry.iter() {
            println!("{} - {}", pass.command_line_flag(), pass.name());
            println!("{}", pass.param_help());
        }
        println!("generators: {}", GENERATORS.join(", "));
        return Ok(());
    }

    let mut pipeline = Pipeline::new();
    for step in cli.passes.chunks(2) {
        let params = step.get(1).map(String::as_str).unwrap_or_default();
        pipeline.push(&registry, &step[0], params)?;
    }

    let (kind, params) = match cli.generate.as_slice() {
        [kind, params] => (kind.as_str(), params.as_str()),
        _ => return Err(Error::params("generate", "expected a generator name and its parameters").into()),
    };
    let mut config = generate(kind, params)?;
    if let Some(horizon) = cli.time_horizon {
        config.settings.time_horizon = horizon;
    }

    let mut ctx = Context::default().with_validation(!cli.no_validate);
    ctx = match cli.estimator {
        Backend::Sim => ctx.with_estimator(SimulationEstimator::default()),
        Backend::Interval => ctx.with_estimator(IntervalEstimator::default()),
        Backend::None => ctx.with_estimator(UnavailableEstimator::new("disabled on the command line")),
    };
    if let Printer::Spaceex = cli.printer {
        ctx = ctx.with_printer(PrinterConfig::spaceex());
    }

    ctx.validate(&config)?;
    let time_total = std::time::Instant::now();
    pipeline.run(&mut config, &ctx)?;
    info!("Ran {} pass(es) in {:.3} s", pipeline.len(), time_total.elapsed().as_secs_f64());

    if let Some(path) = &cli.dot {
        std::fs::write(path, config.to_dot()?).wrap_err_with(|| format!("writing {}", path.display()))?;
    }
    let text = ctx.render_configuration(&config);
    match &cli.output {
        Some(path) => std::fs::write(path, text).wrap_err_with(|| format!("writing {}", path.display()))?,
        None => print!("{}", text),
    }
    Ok(())
}
