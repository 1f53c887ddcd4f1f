use mutorch::error::Error;
use mutorch::installation::Installation;
use mutorch::output;
use mutorch::server;
use mutorch::{Configuration, LocalBackend, Mutant, Mutation, MutationFilter, Snapshot, TemplateMatcher};

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mutorch", version, about = "Mutation orchestration over buildable program snapshots")]
struct Cli {
    /// Directory holding images, containers and snapshot records
    #[arg(long, global = true, env = "MUTORCH_ROOT", default_value = ".mutorch")]
    root: PathBuf,
    /// User configuration layered over the built-in catalogue
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Seconds before a mutant build is abandoned
    #[arg(long, global = true, default_value = "300")]
    build_timeout: u64,
    /// Output JSON instead of human-readable text
    #[arg(long, global = true)]
    json: bool,
    /// More logging (-v info, -vv debug, -vvv trace); MUTORCH_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List supported languages
    Languages,
    /// List mutation operators
    Operators {
        /// Only operators supporting this language
        #[arg(short, long)]
        language: Option<String>,
    },
    /// Register a directory as a buildable snapshot
    Import {
        /// Snapshot name
        name: String,
        /// Directory to copy into the snapshot's image
        dir: PathBuf,
        /// Command that builds the program, run from the source directory
        #[arg(long)]
        build_command: Option<String>,
        /// Subdirectory that file paths are relative to
        #[arg(long, default_value = "")]
        source_dir: String,
        /// Programming languages used by the program
        #[arg(long, value_delimiter = ';')]
        languages: Vec<String>,
    },
    /// List registered snapshots
    Snapshots,
    /// Find the mutations of a file in a snapshot
    Mutations {
        snapshot: String,
        file: String,
        /// Language of the file (detected from its suffix by default)
        #[arg(short, long)]
        language: Option<String>,
        /// Operators to use, separated by ';'
        #[arg(short, long, value_delimiter = ';')]
        operators: Option<Vec<String>>,
        /// Restrict to mutations starting on these lines, separated by ';'
        #[arg(long, value_delimiter = ';')]
        lines: Option<Vec<usize>>,
    },
    /// Show the replacements for a list of mutations
    Replacements {
        snapshot: String,
        /// JSON file holding a list of mutations ('-' for stdin)
        mutations: PathBuf,
    },
    /// Show the unified diff for a list of mutations
    Diff {
        snapshot: String,
        /// JSON file holding a list of mutations ('-' for stdin)
        mutations: PathBuf,
    },
    /// Build and register a mutant
    Mutate {
        snapshot: String,
        /// JSON file holding a list of mutations ('-' for stdin)
        mutations: PathBuf,
        /// Keep the mutant's image and snapshot after exiting
        #[arg(long)]
        keep: bool,
    },
    /// Delete a mutant kept by `mutate --keep`
    DeleteMutant {
        /// Mutant id, as printed by `mutate`
        id: String,
    },
    /// Serve JSON-lines requests on stdin
    Serve,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("MUTORCH_LOG").unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let exit_code = match run(cli) {
        Ok(()) => 0,
        Err(e) => {
            output::print_failure(&e);
            exit_code_for(&e)
        }
    };
    process::exit(exit_code);
}

fn exit_code_for(err: &Error) -> i32 {
    match err {
        Error::BuildFailure { .. } => 1,
        e if e.status_code() >= 500 => 3,
        _ => 2,
    }
}

fn run(cli: Cli) -> mutorch::Result<()> {
    let config = Configuration::load(cli.config.as_deref())?;
    let backend = Arc::new(LocalBackend::open(&cli.root)?.with_build_timeout(Duration::from_secs(cli.build_timeout)));
    let installation = Installation::new(config, backend.clone(), Arc::new(TemplateMatcher::new()));
    let json = cli.json;

    match cli.command {
        Commands::Languages => {
            let languages: Vec<_> = installation.languages().iter().collect();
            if json {
                print_json(&languages)?;
            } else {
                output::print_languages(languages);
            }
        }
        Commands::Operators { language } => {
            let operators = installation.operators(language.as_deref())?;
            if json {
                print_json(&operators)?;
            } else {
                output::print_operators(&operators);
            }
        }
        Commands::Import {
            name,
            dir,
            build_command,
            source_dir,
            languages,
        } => {
            let mut snapshot = Snapshot::new(name, "");
            snapshot.build_command = build_command;
            snapshot.source_dir = source_dir;
            snapshot.languages = languages;
            let snapshot = backend.import(snapshot, &dir)?;
            if json {
                print_json(&snapshot)?;
            } else {
                output::print_success(&format!("imported snapshot {}", snapshot.name));
            }
        }
        Commands::Snapshots => {
            let snapshots = backend.snapshots();
            if json {
                print_json(&snapshots)?;
            } else {
                for s in &snapshots {
                    println!("{} {}", s.name, s.build_command.as_deref().unwrap_or("-"));
                }
            }
        }
        Commands::Mutations {
            snapshot,
            file,
            language,
            operators,
            lines,
        } => {
            let filter = MutationFilter {
                language,
                operators,
                lines: lines.map(|l| l.into_iter().collect::<BTreeSet<_>>()),
            };
            let mutations = installation.mutations(&snapshot, &file, &filter)?;
            if json {
                print_json(&mutations)?;
            } else {
                output::print_mutations(&mutations);
            }
        }
        Commands::Replacements { snapshot, mutations } => {
            let mutations = read_mutations(&mutations)?;
            let replacements = installation.replacements(&snapshot, &mutations)?;
            if json {
                print_json(&replacements)?;
            } else {
                output::print_replacements(&replacements);
            }
        }
        Commands::Diff { snapshot, mutations } => {
            let mutations = read_mutations(&mutations)?;
            let diff = installation.diff(&snapshot, &mutations)?;
            if json {
                print_json(&diff)?;
            } else {
                output::print_diff(&diff);
            }
        }
        Commands::Mutate {
            snapshot,
            mutations,
            keep,
        } => {
            let mutations = read_mutations(&mutations)?;
            let mutant = installation.mutate(&snapshot, mutations)?;
            if json {
                print_json(&mutant)?;
            } else {
                output::print_mutant(&mutant);
            }
            if !keep {
                installation.clear_mutants();
            }
        }
        Commands::DeleteMutant { id } => {
            installation.discard_mutant(&Mutant::parse_id(&id)?)?;
            if json {
                print_json(&serde_json::json!({ "deleted": id }))?;
            } else {
                output::print_success(&format!("deleted mutant {}", id));
            }
        }
        Commands::Serve => {
            let stdin = std::io::stdin();
            server::serve(&installation, stdin.lock(), std::io::stdout())?;
        }
    }
    Ok(())
}

fn read_mutations(path: &Path) -> mutorch::Result<Vec<Mutation>> {
    let data = if path == Path::new("-") {
        std::io::read_to_string(std::io::stdin()).map_err(|e| Error::unexpected("failed to read stdin", e))?
    } else {
        std::fs::read_to_string(path).map_err(|_| Error::FileNotFound(path.display().to_string()))?
    };
    serde_json::from_str(&data).map_err(|e| Error::BadFormat(format!("{}: {}", path.display(), e)))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> mutorch::Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| Error::unexpected("failed to encode output", e))?;
    println!("{}", json);
    Ok(())
}
