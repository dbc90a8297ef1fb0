// Entry point and command-line flow.
//
// - `repair` flattens quoted line breaks in the raw exports.
// - `join` subsets, joins, filters and expands the repaired tables, writes
//   every CSV plus a JSON run summary, and previews each output.
// - `run` does both; `schema` prints the built-in survey schema as JSON.
use clap::{Args, Parser, Subcommand};
use log::{error, LevelFilter};
use medna_survey::output::{preview_table, write_json};
use medna_survey::util::format_int;
use medna_survey::{survey_v14, Pipeline, PipelineConfig, PipelineError, Result, RunOutput};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(author, version, about = "Repair and join eDNA field survey exports into analysis-ready CSVs.")]
struct Cli {
    /// JSON configuration file. Built-in defaults are used when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log warnings and errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Flatten line breaks inside quoted fields of every raw CSV.
    Repair(DirArgs),
    /// Subset, join, filter and expand the repaired tables.
    Join(JoinArgs),
    /// Repair, then join.
    Run(JoinArgs),
    /// Print the built-in survey schema as JSON.
    Schema {
        /// Write to this file instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct DirArgs {
    /// Directory holding the downloaded CSVs.
    #[arg(long)]
    raw_dir: Option<PathBuf>,

    /// Directory for repaired CSVs.
    #[arg(long)]
    repaired_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct JoinArgs {
    #[command(flatten)]
    dirs: DirArgs,

    /// Directory for subset and joined CSVs.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Skip the per-table subset files (the survey subset is always written).
    #[arg(long)]
    no_intermediate: bool,

    /// Fail when several parent rows share a join key.
    #[arg(long)]
    strict_join_keys: bool,

    /// Rows to preview per output table.
    #[arg(long, default_value_t = 2)]
    preview: usize,
}

fn init_logging(cli: &Cli) {
    let mut builder = env_logger::Builder::new();
    if cli.quiet {
        builder.filter_level(LevelFilter::Warn);
    } else if cli.verbose > 0 {
        builder.filter_level(if cli.verbose == 1 {
            LevelFilter::Debug
        } else {
            LevelFilter::Trace
        });
    } else {
        builder.filter_level(LevelFilter::Info);
        builder.parse_default_env();
    }
    builder.init();
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    match &cli.config {
        Some(path) => PipelineConfig::from_path(path),
        None => Ok(PipelineConfig::default()),
    }
}

fn apply_dirs(config: &mut PipelineConfig, dirs: &DirArgs) {
    if let Some(dir) = &dirs.raw_dir {
        config.raw_dir = dir.clone();
    }
    if let Some(dir) = &dirs.repaired_dir {
        config.repaired_dir = dir.clone();
    }
}

fn apply_join_args(config: &mut PipelineConfig, args: &JoinArgs) {
    apply_dirs(config, &args.dirs);
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if args.no_intermediate {
        config.write_intermediate = false;
    }
    if args.strict_join_keys {
        config.strict_join_keys = true;
    }
}

/// Print a preview of every written table, then save the run summary next
/// to the outputs.
fn report(output: &RunOutput, config: &PipelineConfig, preview_rows: usize) -> Result<()> {
    println!("Outputs saved to {}\n", config.output_dir.display());
    for w in &output.written {
        preview_table(&w.name, &w.table, preview_rows);
        println!(
            "({} rows exported to {})\n",
            format_int(w.table.len()),
            w.path.display()
        );
    }
    let summary_path = config.output_dir.join("summary.json");
    write_json(&summary_path, &output.summary)?;
    println!("Run summary: {}", summary_path.display());
    Ok(())
}

fn execute(cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Schema { out } => {
            let schema = survey_v14::schema();
            match out {
                Some(path) => write_json(path, &schema)?,
                None => {
                    let json = serde_json::to_string_pretty(&schema)
                        .map_err(|e| PipelineError::config(e.to_string()))?;
                    println!("{json}");
                }
            }
            Ok(())
        }
        Command::Repair(dirs) => {
            let mut config = load_config(cli)?;
            apply_dirs(&mut config, dirs);
            let written = Pipeline::new(config)?.repair()?;
            println!("Repaired {} files.", format_int(written.len()));
            Ok(())
        }
        Command::Join(args) | Command::Run(args) => {
            let mut config = load_config(cli)?;
            apply_join_args(&mut config, args);
            let pipeline = Pipeline::new(config)?;
            let output = if matches!(cli.command, Command::Run(_)) {
                pipeline.run()?
            } else {
                pipeline.join()?
            };
            report(&output, pipeline.config(), args.preview)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);
    match execute(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Step errors already render their whole cause chain.
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
