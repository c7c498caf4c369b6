use clap::{Parser, Subcommand};
use crockdata::Visualizer;
use crockdata::cli::{self as prog_cli, OutputMode};
use crockdata::config::Settings;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "crockdata", version, about = "Import CSV, JSON and XML files into datasets", long_about = None)]
struct Cli {
    /// Path to a settings file (TOML)
    #[arg(long, help = "Path to a settings file (TOML). If omitted, the usual locations are searched.")]
    config: Option<PathBuf>,
    /// Override the dataset store log path
    #[arg(long, help = "Dataset store file (e.g., datasets.log). Takes precedence over config/env.")]
    db: Option<PathBuf>,
    /// Print one compact JSON document instead of pretty output
    #[arg(long)]
    plain: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Sniff a file and print a preview without storing anything")]
    Analyze {
        file: PathBuf,
        #[arg(long, help = "Delimiter override: , ; | or \\t")]
        delimiter: Option<String>,
        #[arg(long, help = "Encoding override: UTF-8, ISO-8859-1 or Windows-1252")]
        encoding: Option<String>,
        #[arg(long, help = "Treat the first row as data")]
        no_header: bool,
    },
    #[command(about = "Import a file as a new dataset")]
    Import {
        file: PathBuf,
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        delimiter: Option<String>,
        #[arg(long)]
        encoding: Option<String>,
        #[arg(long)]
        no_header: bool,
        #[arg(long, help = "Re-import into this failed dataset id")]
        retry: Option<u64>,
    },
    #[command(about = "List datasets")]
    List {
        #[arg(long)]
        page: Option<u64>,
        #[arg(long)]
        per_page: Option<u64>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, help = "active (default), deleted, failed, importing or all")]
        status: Option<String>,
    },
    #[command(about = "Show the first stored rows of a dataset")]
    Preview {
        dataset_id: u64,
        #[arg(long)]
        limit: Option<u64>,
    },
    #[command(about = "Soft-delete a dataset")]
    Delete { dataset_id: u64 },
    #[command(about = "Restore a soft-deleted dataset")]
    Restore { dataset_id: u64 },
    #[command(about = "Permanently remove a dataset, its rows and visualizations")]
    Purge { dataset_id: u64 },
    #[command(about = "Change a dataset's name or description")]
    Rename {
        dataset_id: u64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
}

fn header_flag(no_header: bool) -> Option<bool> {
    no_header.then_some(false)
}

fn into_command(c: Commands) -> prog_cli::Command {
    match c {
        Commands::Analyze { file, delimiter, encoding, no_header } => {
            prog_cli::Command::Analyze { file, delimiter, encoding, has_header: header_flag(no_header) }
        }
        Commands::Import { file, name, description, delimiter, encoding, no_header, retry } => prog_cli::Command::Import {
            file,
            name,
            description,
            delimiter,
            encoding,
            has_header: header_flag(no_header),
            retry,
        },
        Commands::List { page, per_page, search, status } => prog_cli::Command::List { page, per_page, search, status },
        Commands::Preview { dataset_id, limit } => prog_cli::Command::Preview { dataset_id, limit },
        Commands::Delete { dataset_id } => prog_cli::Command::Delete { dataset_id },
        Commands::Restore { dataset_id } => prog_cli::Command::Restore { dataset_id },
        Commands::Purge { dataset_id } => prog_cli::Command::Purge { dataset_id },
        Commands::Rename { dataset_id, name, description } => prog_cli::Command::Rename { dataset_id, name, description },
    }
}

fn init_logging(settings: &Settings) {
    let result = if settings.logging.dir.is_some() {
        crockdata::logger::configure_from_settings(&settings.logging)
    } else if std::env::var_os("CROCKDATA_LOG_DIR").is_some() {
        crockdata::logger::configure_from_env()
    } else {
        Ok(())
    };
    if let Err(e) = result {
        eprintln!("warning: logging disabled: {e}");
    }
}

fn main() {
    let cli = Cli::parse();
    let mut settings = match Settings::load(cli.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(2);
        }
    };
    if let Some(db) = cli.db {
        settings.storage.path = Some(db);
    }
    init_logging(&settings);

    let v = match Visualizer::open(settings) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };
    let mode = if cli.plain { OutputMode::Plain } else { OutputMode::Json };
    let r = prog_cli::run_with_format(&v, into_command(cli.command), mode, &mut std::io::stdout().lock());
    if let Err(e) = r {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
