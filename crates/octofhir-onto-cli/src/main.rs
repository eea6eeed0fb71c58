//! onto command-line interface

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::LevelFilter;
use octofhir_onto::cli::map::{self, MapConfig, MappingDialect};
use octofhir_onto::cli::output::{self, OutputFormat};
use octofhir_onto::cli::resolve::{self, ResolveConfig};
use octofhir_onto::cli::tree::{self, TreeConfig};
use std::path::PathBuf;

/// Profile path compiler and terminology hierarchy tool
#[derive(Parser)]
#[command(name = "onto")]
#[command(author, version, about = "FHIR profile path compiler and hierarchy builder", long_about = None)]
struct Cli {
    /// Verbose output (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format (text, json)
    #[arg(short = 'f', long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Output file (default: stdout)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    color: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve an element chain and print its per-element paths
    Resolve {
        /// Chained element id
        chain: String,

        /// Module the start profile belongs to
        #[arg(short, long)]
        module: String,

        /// Canonical URL of the start profile
        #[arg(short, long)]
        profile: String,

        /// Project directory
        #[arg(short = 'P', long, default_value = ".")]
        project: PathBuf,
    },

    /// Generate mapping tables from querying metadata
    Map {
        /// Project directory
        project: PathBuf,

        /// Only map this module
        #[arg(short, long)]
        module: Option<String>,

        /// Mapping dialect
        #[arg(short, long, value_enum, default_value_t = MappingDialect::All)]
        dialect: MappingDialect,
    },

    /// Build a concept hierarchy from an offline closure table
    Tree {
        /// Closure ConceptMap (JSON)
        closure: PathBuf,

        /// ValueSet expansion (JSON)
        #[arg(short, long)]
        expansion: Option<PathBuf>,

        /// Add descendant counts
        #[arg(long)]
        count_descendants: bool,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Resolve {
            chain,
            module,
            profile,
            project,
        } => resolve::resolve(ResolveConfig {
            project_dir: project,
            module,
            profile,
            chain,
            format: cli.format,
            output_file: cli.output,
        }),

        Commands::Map {
            project,
            module,
            dialect,
        } => map::map(MapConfig {
            project_dir: project,
            module,
            dialect,
            format: cli.format,
            output_file: cli.output,
        }),

        Commands::Tree {
            closure,
            expansion,
            count_descendants,
        } => tree::tree(TreeConfig {
            closure,
            expansion,
            count_descendants,
            format: cli.format,
            output_file: cli.output,
        }),
    }
}

fn main() {
    human_panic::setup_panic!();

    let cli = Cli::parse();

    output::setup_colors(&cli.color);
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{}", output::format_error(&e));
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::try_parse_from(["onto", "tree", "closure.json", "-f", "json", "-vv", "--count-descendants"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(matches!(
            cli.command,
            Commands::Tree {
                count_descendants: true,
                expansion: None,
                ..
            }
        ));
    }

    #[test]
    fn test_map_dialect_defaults_to_all() {
        let cli = Cli::try_parse_from(["onto", "map", "project"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Map {
                dialect: MappingDialect::All,
                module: None,
                ..
            }
        ));
    }

    #[test]
    fn test_run_reports_missing_closure() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.json");
        let cli = Cli::try_parse_from(["onto", "tree", missing.to_str().unwrap()]).unwrap();
        let err = run(cli).unwrap_err();
        assert!(format!("{err:#}").starts_with("Failed to read closure"));
    }

    #[test]
    fn test_run_tree_to_file() {
        let dir = TempDir::new().unwrap();
        let closure = dir.path().join("closure.json");
        fs::write(
            &closure,
            r#"{"group": [{"source": "http://snomed.info/sct", "element": [
                {"code": "119297000", "target": [{"code": "123038009", "equivalence": "subsumes"}]}
            ]}]}"#,
        )
        .unwrap();
        let out = dir.path().join("tree.json");
        let cli = Cli::try_parse_from([
            "onto",
            "tree",
            closure.to_str().unwrap(),
            "-f",
            "json",
            "-o",
            out.to_str().unwrap(),
        ])
        .unwrap();

        run(cli).unwrap();
        let written: serde_json::Value = serde_json::from_str(&fs::read_to_string(out).unwrap()).unwrap();
        assert!(written.get("tree").is_some());
    }
}
