use crate::demo::{run_catalog, run_demo, run_score, CatalogArgs, DemoArgs, ScoreCommand};
use crate::server;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use teremok::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "teremok",
    about = "Score Teremok diagnostics and run the diagnostics service",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Score a set of answers offline and print the outcome
    Score {
        #[command(subcommand)]
        command: ScoreCommand,
    },
    /// Print a diagnostic catalog as JSON
    Catalog(CatalogArgs),
    /// Walk through all three diagnostics with in-memory adapters
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Directory with catalog overrides (typology.json, formula.json, rsp.json)
    #[arg(long)]
    pub(crate) catalog_dir: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Score { command } => run_score(command),
        Command::Catalog(args) => run_catalog(args),
        Command::Demo(args) => run_demo(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_defaults_to_serve() {
        let cli = Cli::try_parse_from(["teremok"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn score_subcommand_collects_comma_separated_answers() {
        let cli = Cli::try_parse_from(["teremok", "score", "formula", "4,3,2,-1"])
            .expect("parses");

        match cli.command {
            Some(Command::Score {
                command: ScoreCommand::Formula(args),
            }) => assert_eq!(args.answers, vec!["4", "3", "2", "-1"]),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn serve_accepts_catalog_override() {
        let cli = Cli::try_parse_from(["teremok", "serve", "--catalog-dir", "/etc/teremok"])
            .expect("parses");

        match cli.command {
            Some(Command::Serve(args)) => {
                assert_eq!(args.catalog_dir, Some(PathBuf::from("/etc/teremok")))
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
