use std::path::{Path, PathBuf};

mod chain;
mod show;
mod terminal;
mod validate;

use chain::Chain;
use clap::ArgAction;
use prereq_chain::{
    AnalysisError, Catalog, ModuleCode, PrereqGraph, RunLog,
    domain::{AcademicYear, PathRecord},
    storage::CONFIG_FILE,
};
use show::Show;
use tracing::instrument;
use validate::Validate;

/// Parse a module code from a string, normalizing to uppercase.
fn parse_code(s: &str) -> Result<ModuleCode, String> {
    s.to_uppercase().parse().map_err(|e| format!("{e}"))
}

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// The path to the root of the module catalogue
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        self.command
            .unwrap_or_else(|| Command::Chain(Chain::default()))
            .run(self.root)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Find the longest prerequisite chains (default)
    Chain(Chain),

    /// Check that the prerequisite graph has no cycles
    Validate(Validate),

    /// Show the prerequisites and dependents of a module
    Show(Show),

    /// Write a default configuration file and dataset layout
    Init,
}

impl Command {
    fn run(self, root: PathBuf) -> anyhow::Result<()> {
        match self {
            Self::Chain(command) => command.run(root)?,
            Self::Validate(command) => command.run(root)?,
            Self::Show(command) => command.run(root)?,
            Self::Init => Init::run(&root)?,
        }
        Ok(())
    }
}

/// Options controlling how the prerequisite graph is obtained.
#[derive(Debug, Clone, Default, clap::Args)]
struct GraphArgs {
    /// Restore the graph from the last checkpoint instead of reading the
    /// dataset
    #[arg(
        long,
        conflicts_with_all = ["contract_preclusions", "revisit_module_info", "years"]
    )]
    resume: bool,

    /// Contract modules that preclude each other into a single vertex
    #[arg(long)]
    contract_preclusions: bool,

    /// Also read prerequisites from the free-text module information
    #[arg(long)]
    revisit_module_info: bool,

    /// Academic years to read, e.g. 2019 or 2019-2020 (can be specified
    /// multiple times)
    #[arg(long = "year", value_name = "YEAR")]
    years: Vec<AcademicYear>,
}

impl GraphArgs {
    /// Applies command-line overrides to the catalogue configuration.
    fn configure(&self, catalog: &mut Catalog) {
        let config = catalog.config_mut();
        if self.contract_preclusions {
            config.contract_preclusions = true;
        }
        if self.revisit_module_info {
            config.revisit_module_info = true;
        }
        if !self.years.is_empty() {
            config.set_years(self.years.clone());
        }
    }

    /// Builds the graph, or restores it from the checkpoint.
    fn load(&self, catalog: &mut Catalog, log: &RunLog) -> Result<PrereqGraph, AnalysisError> {
        if self.resume {
            catalog.resume(log)
        } else {
            self.configure(catalog);
            catalog.build(log)
        }
    }
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Expands each vertex of a path into its sorted module codes.
fn render_path(graph: &PrereqGraph, record: &PathRecord) -> Vec<Vec<String>> {
    graph
        .render(record)
        .into_iter()
        .map(|group| group.into_iter().map(ToString::to_string).collect())
        .collect()
}

/// Formats rendered groups as `{A, B} -> {C}`.
fn format_groups(groups: &[Vec<String>]) -> String {
    groups
        .iter()
        .map(|group| format!("{{{}}}", group.join(", ")))
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[derive(Debug, clap::Parser)]
pub struct Init {}

impl Init {
    #[instrument]
    fn run(root: &Path) -> anyhow::Result<()> {
        use std::fs;

        let config_path = root.join(CONFIG_FILE);
        if config_path.exists() {
            anyhow::bail!(
                "Catalogue already initialized (found existing {})",
                CONFIG_FILE
            );
        }

        for dir in ["moduleList", "moduleCode", "moduleInfo"] {
            let path = root.join("json").join(dir);
            fs::create_dir_all(&path)
                .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", path.display()))?;
        }

        prereq_chain::Config::default()
            .save(&config_path)
            .map_err(|e| anyhow::anyhow!("Failed to create {CONFIG_FILE}: {e}"))?;

        println!("Initialized module catalogue in {}", root.display());
        println!("  Created: {CONFIG_FILE}");
        println!("  Created: json/moduleList/");
        println!("  Created: json/moduleCode/");
        println!("  Created: json/moduleInfo/");
        println!();
        println!("Next steps:");
        println!("  Download the module data into json/");
        println!("  prereq-chain chain");

        Ok(())
    }
}
