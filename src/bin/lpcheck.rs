use std::path::PathBuf;
use std::process;

use clap::Parser;
use liveprobe::commands::check::{self, CheckArgs};
use liveprobe::commands::prepare;

#[derive(Debug, Parser)]
#[command(
    name = "lpcheck",
    about = "Run live checks against the configured vendors",
    disable_version_flag = true
)]
struct Cli {
    #[arg(long)]
    env_file: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,

    #[command(flatten)]
    check: CheckArgs,
}

fn main() {
    let cli = Cli::parse();
    let result = prepare(cli.env_file.as_deref(), cli.verbose)
        .and_then(|runtime| runtime.block_on(check::run(cli.check)));
    if let Err(err) = result {
        eprintln!("{err}");
        process::exit(1);
    }
}
