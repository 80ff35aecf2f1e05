use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use run_pahole::commands::{check_command, CheckOptions};
use run_pahole::{init_tracing, Verbosity};
use tracing::{error, info};

/// Run pahole on a set of object files and report structures that should be re-packed.
///
/// This CLI is a thin wrapper around `pahole-core` (exposed in code as `pahole_core`).
/// All substantive logic lives in the library so it can be tested thoroughly
/// and reused from other frontends.
#[derive(Parser, Debug)]
#[command(
    name = "run-pahole",
    version,
    about = "Run pahole on a set of object files and report structures with avoidable padding",
    long_about = None
)]
struct Cli {
    /// .json file containing the configuration (paths, blacklists, ignore patterns).
    #[arg(value_name = "JSON_CONFIG")]
    config: PathBuf,

    /// Only complain about structures whose size shrinks when reordered,
    /// not about holes that reordering would merely move into tail padding.
    #[arg(long, default_value_t = false)]
    lazy: bool,

    /// Path to the pahole executable. Defaults to $PAHOLE_BIN, then `pahole` on PATH.
    #[arg(long, value_name = "PATH")]
    pahole: Option<PathBuf>,

    /// Directory the `<config>_dump_*.h` files are written to.
    #[arg(long, value_name = "DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Verbosity level.
    #[arg(short, long, value_enum, default_value_t = Verbosity::Info)]
    verbosity: Verbosity,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbosity);
    info!("executing run-pahole v{} ...", pahole_core::version());

    let options = CheckOptions {
        config: cli.config,
        lazy: cli.lazy,
        pahole: cli.pahole,
        output_dir: cli.output_dir,
    };

    match check_command(&options) {
        Ok(summary) => ExitCode::from(summary.status().exit_code()),
        Err(err) => {
            error!("execution failed: {err:#}");
            ExitCode::from(2)
        }
    }
}
