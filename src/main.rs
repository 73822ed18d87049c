use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pyrelease::cli::{run_release, ReleaseArgs, RunEnvironment};
use pyrelease::git::{Git2Repository, Repository};
use pyrelease::runner::SystemRunner;
use pyrelease::{config, inputs, ui};

#[derive(clap::Parser)]
#[command(
    name = "pyrelease",
    about = "Version, build, publish, tag and document a Python package release",
    disable_version_flag = true
)]
struct Args {
    #[arg(long, default_value = inputs::DEFAULT_VERSION, help = "Version to release, 0.0.0 to bump the latest tag")]
    version: String,

    #[arg(long, default_value = inputs::DEFAULT_LEVEL, help = "Bump level: major, minor or patch")]
    level: String,

    #[arg(long = "dry-run", default_value = inputs::DEFAULT_DRY_RUN, help = "true to skip upload and tagging")]
    dry_run: String,

    #[arg(short, long, help = "Custom configuration file path")]
    config: Option<PathBuf>,

    #[arg(long, default_value = ".", help = "Path inside the git repository to release")]
    repo: PathBuf,

    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help = "More log output (repeatable)")]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pyrelease={level}")));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn run(args: Args) -> Result<()> {
    // Bad parameters must fail before any repository or config access.
    inputs::ReleaseInputs::validate(&args.version, &args.level, &args.dry_run)?;

    let repo = Git2Repository::open(&args.repo)?;
    let config = config::load_config(args.config.as_deref(), &repo.workdir()?)?;
    let env = RunEnvironment::from_process(&config);

    let release_args = ReleaseArgs {
        version: args.version,
        level: args.level,
        dry_run: args.dry_run,
    };

    let report = run_release(&release_args, &config, &repo, &SystemRunner, &env)?;

    let mode = if report.dry_run { " (dry run)" } else { "" };
    println!();
    ui::display_success(&format!("Released {}{}", report.tag, mode));
    Ok(())
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Err(e) = run(args) {
        ui::display_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
