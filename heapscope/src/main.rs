use anyhow::Context;
use clap::{Parser, Subcommand};
use heapscope::display::Detail;
use heapscope::il::{IlDisplay, MetadataProvider, MethodId, Program};
use heapscope::{HeapAnalysisOptions, analyze_program};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
struct HeapscopeConfig {
    pub options: HeapAnalysisOptions,
}

impl HeapscopeConfig {
    fn with_overrides(mut self, params: &HeapscopeParams) -> Self {
        if let Some(n) = params.widen_after {
            self.options.widen_after = n;
        }
        if let Some(n) = params.max_iterations {
            self.options.max_iterations = n;
        }
        self
    }
}

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct HeapscopeParams {
    #[command(subcommand)]
    pub command: Commands,
    /// Joins at a loop head before widening; stored for later runs
    #[arg(long, global = true)]
    pub widen_after: Option<u32>,
    /// Bound on block visits per method; stored for later runs
    #[arg(long, global = true)]
    pub max_iterations: Option<usize>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Analyze the method bodies of a program and print the state of every block
    Analyze {
        program: PathBuf,
        /// Only analyze methods whose name or `Type::Name` matches
        #[arg(long)]
        method: Option<String>,
        /// Print the state after every instruction
        #[arg(long)]
        verbose: bool,
    },
    /// List the methods of a program that have bodies
    Methods { program: PathBuf },
}

fn main() -> anyhow::Result<()> {
    let params = HeapscopeParams::parse();
    let config = update_config(&params)?;
    match params.command {
        Commands::Analyze {
            program,
            method,
            verbose,
        } => analyze(&config, program, method, verbose),
        Commands::Methods { program } => list_methods(program),
    }
}

fn update_config(params: &HeapscopeParams) -> anyhow::Result<HeapscopeConfig> {
    let stored: HeapscopeConfig =
        confy::load("heapscope", None).context("could not load configuration")?;
    let stored_options = stored.options.clone();
    let config = stored.with_overrides(params);
    if config.options != stored_options {
        confy::store("heapscope", None, &config).context("could not store configuration")?;
    }
    Ok(config)
}

fn load(path: &PathBuf) -> anyhow::Result<Program> {
    Program::from_path(path).with_context(|| format!("could not load {}", path.display()))
}

fn method_name(md: &dyn MetadataProvider, id: MethodId) -> String {
    id.display(md).to_string()
}

fn name_matches(md: &dyn MetadataProvider, id: MethodId, filter: &str) -> bool {
    md.method(id).is_ok_and(|m| m.name == filter) || method_name(md, id) == filter
}

fn list_methods(path: PathBuf) -> anyhow::Result<()> {
    let program = load(&path)?;
    for body in &program.bodies {
        println!(
            "{}\t{} blocks",
            method_name(&program.metadata, body.method),
            body.blocks.len()
        );
    }
    Ok(())
}

fn analyze(
    config: &HeapscopeConfig,
    path: PathBuf,
    method: Option<String>,
    verbose: bool,
) -> anyhow::Result<()> {
    let mut program = load(&path)?;
    if let Some(filter) = &method {
        let md = &program.metadata;
        let bodies: Vec<_> = program
            .bodies
            .iter()
            .filter(|b| name_matches(md, b.method, filter))
            .cloned()
            .collect();
        if bodies.is_empty() {
            anyhow::bail!("no method body named {filter}");
        }
        program.bodies = bodies;
    }
    let detail = if verbose {
        Detail::Instructions
    } else {
        Detail::Blocks
    };
    for (id, result) in analyze_program(&program, &config.options) {
        match (result, program.body(id)) {
            (Ok(result), Some(body)) => println!("{}", result.listing(body, detail)),
            (Ok(_), None) => {}
            (Err(e), _) => println!(
                "method {}: unanalyzable ({e})\n",
                method_name(&program.metadata, id)
            ),
        }
    }
    Ok(())
}
