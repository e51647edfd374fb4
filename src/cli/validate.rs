use std::{path::PathBuf, process};

use clap::Parser;
use prereq_chain::{AnalysisError, Catalog, CycleError, PrereqGraph, RunLog};
use tracing::instrument;

use super::{GraphArgs, OutputFormat, terminal::Colorize};

/// Exit code reported when the graph contains a cycle.
const CYCLE_EXIT_CODE: i32 = 3;

#[derive(Debug, Parser)]
#[command(about = "Check that the prerequisite graph has no cycles")]
pub struct Validate {
    #[command(flatten)]
    graph: GraphArgs,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,
}

impl Validate {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let log = RunLog::start();
        let mut catalog = Catalog::open(root);
        let graph = self.graph.load(&mut catalog, &log)?;

        let cycle = match catalog.validate(&graph, &log) {
            Ok(_) => None,
            Err(AnalysisError::Cycle(cycle)) => Some(cycle),
            Err(e) => return Err(e.into()),
        };

        match self.output {
            OutputFormat::Json => Self::output_json(&graph, cycle.as_ref())?,
            OutputFormat::Table => Self::output_table(&graph, &catalog, cycle.as_ref()),
        }

        if cycle.is_some() {
            process::exit(CYCLE_EXIT_CODE);
        }
        Ok(())
    }

    fn cycle_groups(cycle: &CycleError) -> Vec<Vec<String>> {
        cycle
            .groups()
            .iter()
            .map(|group| group.iter().map(ToString::to_string).collect())
            .collect()
    }

    fn output_json(graph: &PrereqGraph, cycle: Option<&CycleError>) -> anyhow::Result<()> {
        use serde_json::json;

        let output = json!({
            "modules": graph.universe().len(),
            "groups": graph.group_count(),
            "vertices": graph.vertex_count(),
            "edges": graph.edge_count(),
            "acyclic": cycle.is_none(),
            "cycle": cycle.map(Self::cycle_groups),
        });

        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }

    fn output_table(graph: &PrereqGraph, catalog: &Catalog, cycle: Option<&CycleError>) {
        println!("Prerequisite graph");
        println!("{}", "──────────────────".dim());
        println!("Modules   {}", graph.universe().len());
        println!("Groups    {}", graph.group_count());
        println!("Vertices  {}", graph.vertex_count());
        println!("Edges     {}", graph.edge_count());
        println!();

        match cycle {
            None => println!("Cycles: {} ✅", "0".success()),
            Some(cycle) => {
                println!("Cycles: {} ⚠️", "1+".warning());
                println!("  - {}", super::format_groups(&Self::cycle_groups(cycle)));
                println!(
                    "{}",
                    format!(
                        "Graph state saved to {}.",
                        catalog.checkpoint_path().display()
                    )
                    .dim()
                );
            }
        }
    }
}
