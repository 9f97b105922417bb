use clap::Parser;
use clap::error::ErrorKind;
use tracing::debug;

use treesync::{SyncError, sync_trees};

/// Mirror the tree under <FROM> onto <TO>.
#[derive(Parser, Debug)]
#[command(name = "treesync")]
struct Cli {
    from: String,
    to: String,
}

#[compio::main]
#[snafu::report]
async fn main() -> Result<(), SyncError> {
    let cli_args = parse_args();
    setup_tracing();
    debug!("Parsed CLI arguments: {cli_args:?}");

    sync_trees(&cli_args.from, &cli_args.to).await?;

    Ok(())
}

/// Help goes to stdout and exits 0; anything else malformed (including a
/// wrong argument count) prints usage to stderr and exits 1.
fn parse_args() -> Cli {
    match Cli::try_parse() {
        Ok(cli_args) => cli_args,
        Err(e) if e.kind() == ErrorKind::DisplayHelp => {
            print!("{e}");
            std::process::exit(0);
        }
        Err(e) => {
            eprint!("{e}");
            std::process::exit(1);
        }
    }
}

fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .without_time()
        .compact()
        .init();
}
