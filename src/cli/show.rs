use std::path::PathBuf;

use clap::Parser;
use prereq_chain::{
    Catalog, ModuleCode, PrereqGraph, RunLog,
    domain::{AcademicYear, ModuleIndex},
};
use tracing::instrument;

use super::{GraphArgs, OutputFormat, parse_code, terminal::Colorize};

#[derive(Debug, Parser)]
#[command(about = "Show the prerequisites and dependents of a module")]
pub struct Show {
    /// Module code (e.g., CS2040)
    #[arg(value_parser = parse_code)]
    code: ModuleCode,

    #[command(flatten)]
    graph: GraphArgs,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,
}

/// A neighbouring vertex and the years the connecting edge was seen in.
#[derive(Debug, PartialEq, Eq)]
struct Neighbour {
    group: Vec<String>,
    years: Vec<AcademicYear>,
}

impl Show {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let log = RunLog::start();
        let mut catalog = Catalog::open(root);
        let graph = self.graph.load(&mut catalog, &log)?;

        let Some(vertex) = graph.vertex_of(&self.code) else {
            anyhow::bail!("Module {} is not in the catalogue", self.code);
        };

        let group = Self::group(&graph, vertex);
        let prerequisites = Self::prerequisites(&graph, vertex);
        let dependents = Self::dependents(&graph, vertex);

        match self.output {
            OutputFormat::Json => {
                Self::output_json(&self.code, &group, &prerequisites, &dependents)?;
            }
            OutputFormat::Table => {
                Self::output_table(&self.code, &group, &prerequisites, &dependents);
            }
        }
        Ok(())
    }

    fn group(graph: &PrereqGraph, vertex: ModuleIndex) -> Vec<String> {
        graph.group(vertex).into_iter().map(ToString::to_string).collect()
    }

    fn neighbour(graph: &PrereqGraph, other: ModuleIndex, from: ModuleIndex, to: ModuleIndex) -> Neighbour {
        let codes = graph.universe();
        let years = graph
            .metadata()
            .years(codes.code(from), codes.code(to))
            .map(|years| years.iter().copied().collect())
            .unwrap_or_default();
        Neighbour {
            group: Self::group(graph, other),
            years,
        }
    }

    fn prerequisites(graph: &PrereqGraph, vertex: ModuleIndex) -> Vec<Neighbour> {
        let mut neighbours: Vec<_> = graph
            .successors(vertex)
            .map(|next| Self::neighbour(graph, next, vertex, next))
            .collect();
        neighbours.sort_by(|a, b| a.group.cmp(&b.group));
        neighbours
    }

    fn dependents(graph: &PrereqGraph, vertex: ModuleIndex) -> Vec<Neighbour> {
        let mut neighbours: Vec<_> = graph
            .predecessors(vertex)
            .map(|previous| Self::neighbour(graph, previous, previous, vertex))
            .collect();
        neighbours.sort_by(|a, b| a.group.cmp(&b.group));
        neighbours
    }

    fn output_json(
        code: &ModuleCode,
        group: &[String],
        prerequisites: &[Neighbour],
        dependents: &[Neighbour],
    ) -> anyhow::Result<()> {
        use serde_json::json;

        let to_json = |neighbours: &[Neighbour]| -> Vec<serde_json::Value> {
            neighbours
                .iter()
                .map(|n| {
                    json!({
                        "group": n.group,
                        "years": n.years.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    })
                })
                .collect()
        };

        let output = json!({
            "code": code.as_str(),
            "group": group,
            "prerequisites": to_json(prerequisites),
            "dependents": to_json(dependents),
        });

        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }

    fn output_table(
        code: &ModuleCode,
        group: &[String],
        prerequisites: &[Neighbour],
        dependents: &[Neighbour],
    ) {
        println!("{}", code.as_str().info());
        println!("{}", "──────".dim());
        if group.len() > 1 {
            println!("Contracted with: {}", group.join(", "));
            println!();
        }

        for (title, neighbours) in [("Prerequisites", prerequisites), ("Required by", dependents)] {
            println!("{title} ({})", neighbours.len());
            if neighbours.is_empty() {
                println!("  {}", "(none)".dim());
            }
            for neighbour in neighbours {
                let years: Vec<_> = neighbour.years.iter().map(ToString::to_string).collect();
                if years.is_empty() {
                    println!("  {{{}}}", neighbour.group.join(", "));
                } else {
                    println!(
                        "  {{{}}} {}",
                        neighbour.group.join(", "),
                        format!("[{}]", years.join(", ")).dim()
                    );
                }
            }
            println!();
        }
    }
}
