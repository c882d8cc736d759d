use std::io;
use std::path::PathBuf;
use std::process;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, shells};
use liveprobe::commands::ask::{self, AskArgs};
use liveprobe::commands::check::{self, CheckArgs};
use liveprobe::commands::config::{self, ConfigArgs};
use liveprobe::commands::prepare;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\ncommit: ",
    env!("LP_GIT_DESCRIBE"),
    "\ntarget: ",
    env!("LP_TARGET"),
    "\ntls: rustls"
);

const ROOT_HELP_EXAMPLES: &str = "Examples:\n  liveprobe check\n  liveprobe check --only proxy-probe,perplexity-chat --json\n  echo \"Reply with the word 'alive'.\" | liveprobe ask --provider perplexity\n  OPENAI_PROXY_HTTP=http://127.0.0.1:3128 liveprobe ask --provider openai --dry-run \"hi\"\n  liveprobe config show";

const ASK_HELP_EXAMPLES: &str = "Examples:\n  liveprobe ask --provider perplexity --max-tokens 5 --temperature 0 \"Reply with the word 'alive'.\"\n  liveprobe ask --provider openai --no-fallback --json \"2+2?\"";

#[derive(Debug, Parser)]
#[command(
    name = "liveprobe",
    about = "Reach vendor APIs directly, falling back once through a probed proxy",
    version,
    long_version = LONG_VERSION,
    after_help = ROOT_HELP_EXAMPLES
)]
struct Cli {
    /// Env file loaded before anything else; its values override the environment.
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Debug-level logging on stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Run live checks against the configured vendors")]
    Check(CheckArgs),
    #[command(about = "Send one prompt through the fallback invoker", after_help = ASK_HELP_EXAMPLES)]
    Ask(AskArgs),
    #[command(about = "Inspect local config")]
    Config(ConfigArgs),
    #[command(about = "Generate shell completion script")]
    Completion {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

fn print_completion(shell: CompletionShell) {
    let mut cmd = Cli::command();
    match shell {
        CompletionShell::Bash => generate(shells::Bash, &mut cmd, "liveprobe", &mut io::stdout()),
        CompletionShell::Zsh => generate(shells::Zsh, &mut cmd, "liveprobe", &mut io::stdout()),
        CompletionShell::Fish => generate(shells::Fish, &mut cmd, "liveprobe", &mut io::stdout()),
    }
}

fn main() {
    let cli = Cli::parse();

    let runtime = match prepare(cli.env_file.as_deref(), cli.verbose) {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("{err}");
            process::exit(1);
        }
    };

    let result = runtime.block_on(async {
        match cli.command {
            Commands::Check(args) => check::run(args).await,
            Commands::Ask(args) => ask::run(args).await,
            Commands::Config(args) => config::run(args),
            Commands::Completion { shell } => {
                print_completion(shell);
                Ok(())
            }
        }
    });

    if let Err(err) = result {
        eprintln!("{err}");
        process::exit(1);
    }
}
