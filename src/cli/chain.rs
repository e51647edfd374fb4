use std::path::PathBuf;

use clap::Parser;
use prereq_chain::{Catalog, LongestPaths, PrereqGraph, RunLog, domain::PathRecord};
use tracing::instrument;

use super::{
    GraphArgs, OutputFormat, format_groups, render_path,
    terminal::{Colorize, is_narrow},
};

#[derive(Debug, Parser, Default)]
#[command(about = "Find the longest prerequisite chains")]
pub struct Chain {
    #[command(flatten)]
    graph: GraphArgs,

    /// Write the built graph to the checkpoint before analysing it
    #[arg(long)]
    save_checkpoint: bool,

    /// Shortest chain length listed besides the longest
    #[arg(long, value_name = "LENGTH")]
    explore_from: Option<usize>,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,
}

impl Chain {
    #[cfg(test)]
    pub(super) const fn graph_args(&self) -> &GraphArgs {
        &self.graph
    }

    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let log = RunLog::start();
        let mut catalog = Catalog::open(root);
        if let Some(explore_from) = self.explore_from {
            catalog.config_mut().explore_from = explore_from;
        }

        let graph = self.graph.load(&mut catalog, &log)?;
        if self.save_checkpoint {
            catalog.save_checkpoint(&graph)?;
            log.step(&format!(
                "Saved checkpoint to {}",
                catalog.checkpoint_path().display()
            ));
        }

        let paths = catalog.validate(&graph, &log)?.longest_paths();
        log.step("Computed longest paths");

        let Some(max_length) = paths.max_length() else {
            println!("No prerequisite chains found.");
            return Ok(());
        };
        let explore_from = catalog.config().explore_from;

        match self.output {
            OutputFormat::Json => Self::output_json(&graph, &paths, explore_from)?,
            OutputFormat::Table => Self::output_table(&graph, &paths, explore_from),
        }

        log.step(&format!("Found longest chain of {max_length}"));
        Ok(())
    }

    /// Lengths shown in the exploratory section: from `explore_from` up to,
    /// but not including, the maximum.
    fn explored(
        paths: &LongestPaths,
        explore_from: usize,
    ) -> impl Iterator<Item = (usize, &[PathRecord])> + '_ {
        let max_length = paths.max_length().unwrap_or_default();
        paths
            .at_least(explore_from)
            .take_while(move |&(length, _)| length < max_length)
    }

    fn output_json(
        graph: &PrereqGraph,
        paths: &LongestPaths,
        explore_from: usize,
    ) -> anyhow::Result<()> {
        use serde_json::json;

        let explored: Vec<_> = Self::explored(paths, explore_from)
            .map(|(length, records)| {
                let rendered: Vec<_> = records
                    .iter()
                    .map(|record| render_path(graph, record))
                    .collect();
                json!({
                    "length": length,
                    "paths": rendered,
                })
            })
            .collect();

        let longest: Vec<_> = paths
            .longest()
            .iter()
            .map(|record| render_path(graph, record))
            .collect();

        let output = json!({
            "max_length": paths.max_length(),
            "longest": longest,
            "explored": explored,
        });

        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }

    fn output_table(graph: &PrereqGraph, paths: &LongestPaths, explore_from: usize) {
        let narrow = is_narrow();
        let print_path = |groups: &[Vec<String>]| {
            if narrow {
                for (i, group) in groups.iter().enumerate() {
                    let arrow = if i == 0 { "  " } else { "->" };
                    println!("{} {{{}}}", arrow.dim(), group.join(", "));
                }
                println!();
            } else {
                println!("{}", format_groups(groups));
            }
        };

        for (length, records) in Self::explored(paths, explore_from) {
            println!("Chains of length {length}");
            println!("{}", "──────────────────".dim());
            for record in records {
                print_path(&render_path(graph, record));
            }
            println!();
        }

        let max_length = paths.max_length().unwrap_or_default();
        println!("Longest chains");
        println!("{}", "──────────────".dim());
        for record in paths.longest() {
            print_path(&render_path(graph, record));
        }
        println!();
        println!(
            "Found {} chain(s) of length {}",
            paths.longest().len().info(),
            max_length.success()
        );
    }
}
