//! `kb` CLI entry point.

use clap::Parser;
use kbe::cli::commands;
use kbe::cli::{Cli, Commands, OutputFormat};
use kbe::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }
    if cli.silent {
        kbe::SILENT.store(true, std::sync::atomic::Ordering::Relaxed);
    }
    if cli.dry_run {
        kbe::DRY_RUN.store(true, std::sync::atomic::Ordering::Relaxed);
    }
    if matches!(cli.format, Some(OutputFormat::Csv)) {
        kbe::CSV_OUTPUT.store(true, std::sync::atomic::Ordering::Relaxed);
    }

    init_tracing(cli.verbose, cli.quiet);

    // Resolve effective JSON mode: `--json`, `--format json`, or a non-TTY
    // stdout (so agents piping our output get structured errors by
    // default). `--format csv` is never silently overridden.
    let json = cli.json
        || matches!(cli.format, Some(OutputFormat::Json))
        || (!matches!(cli.format, Some(OutputFormat::Csv))
            && !std::io::IsTerminal::is_terminal(&std::io::stdout()));

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("Error: {e}\n  Hint: {hint}");
                } else {
                    eprintln!("Error: {e}");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("kbe=info"),
            2 => EnvFilter::new("kbe=debug"),
            _ => EnvFilter::new("kbe=trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli) -> Result<(), Error> {
    match &cli.command {
        Commands::Init { force } => commands::init::execute(cli, *force),
        Commands::Version => commands::version::execute(cli.json),
        Commands::Completions { shell } => commands::completions::execute(shell),

        Commands::Create(args) => commands::create::execute(cli, args.clone()),
        Commands::Get { reference, id } => commands::get::execute(cli, reference, id.clone()),
        Commands::Update(args) => commands::update::execute(cli, args.clone()),
        Commands::Delete { reference, id } => commands::delete::execute(cli, reference, id.clone()),
        Commands::List { item_type, all, statuses } => {
            commands::list::execute(cli, item_type, *all, statuses.clone())
        }
        Commands::ChangeType { reference, to_type } => commands::change_type::execute(cli, reference, to_type),

        Commands::Search { query, types, limit, offset } => {
            commands::search::search(cli, query, types.clone(), *limit, *offset)
        }
        Commands::Suggest { prefix, types, limit } => commands::search::suggest(cli, prefix, types.clone(), *limit),
        Commands::Count { query, types } => commands::search::count(cli, query, types.clone()),

        Commands::Related { reference, depth } => commands::related::related(cli, reference, *depth),
        Commands::Relate { source, targets } => commands::related::relate(cli, source, targets.clone()),

        Commands::Type { command } => commands::types::execute(cli, command.clone()),
        Commands::Tag { command } => commands::tags::execute(cli, command.clone()),
        Commands::Status => commands::statuses::execute(cli),

        Commands::State { command } => commands::state::execute(cli, command.clone()),

        Commands::Stats => commands::stats::execute(cli),
        Commands::Rebuild => commands::rebuild::execute(cli),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_create_with_positional_type_and_named_title() {
        let cli = Cli::parse_from(["kb", "create", "issues", "--title", "Fix crash"]);
        match cli.command {
            Commands::Create(args) => {
                assert_eq!(args.item_type, "issues");
                assert_eq!(args.title, "Fix crash");
            }
            other => panic!("expected Create, got {other:?}"),
        }
    }

    #[test]
    fn cli_parses_get_with_compound_reference() {
        let cli = Cli::parse_from(["kb", "get", "issues-7"]);
        match cli.command {
            Commands::Get { reference, id } => {
                assert_eq!(reference, "issues-7");
                assert_eq!(id, None);
            }
            other => panic!("expected Get, got {other:?}"),
        }
    }

    #[test]
    fn cli_parses_get_with_split_type_and_id() {
        let cli = Cli::parse_from(["kb", "get", "issues", "7"]);
        match cli.command {
            Commands::Get { reference, id } => {
                assert_eq!(reference, "issues");
                assert_eq!(id, Some("7".to_string()));
            }
            other => panic!("expected Get, got {other:?}"),
        }
    }
}
