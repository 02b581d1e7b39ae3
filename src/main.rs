use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use ec2_lifecycle_stack::{Result, diagnostics, graph, model, render, spec, stack};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ec2-lifecycle-stack")]
#[command(
    about = "Private network, managed instance and weekday power schedule as a provisioning template",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Args)]
struct StackInputs {
    /// Project name; prefixes every resource name.
    #[arg(long)]
    project: Option<String>,

    /// Stack configuration (JSON). Every field has a default.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Boot-time configuration script for the workload instance.
    #[arg(long, default_value = "lib/ec2_user-data.yaml")]
    user_data: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the resource graph and write the template (stdout without -o).
    Synth {
        #[command(flatten)]
        inputs: StackInputs,

        #[arg(short = 'o', long)]
        out: Option<PathBuf>,
    },
    /// Build the resource graph and print the declaration plan as JSON.
    Plan {
        #[command(flatten)]
        inputs: StackInputs,
    },
}

struct Built {
    stack: spec::ValidatedStack,
    graph: graph::Graph,
    outputs: stack::StackOutputs,
}

fn build(inputs: &StackInputs) -> Result<Built> {
    // 1) Load + validate configuration (nothing declared yet).
    let config = spec::StackConfig::load(inputs.config.as_deref())?;
    let stack = config.validate_and_build(inputs.project.as_deref())?;

    // 2) Declare the graph in dependency order.
    let mut graph = graph::Graph::new();
    let outputs = stack::build(&mut graph, &stack, &inputs.user_data)?;

    Ok(Built {
        stack,
        graph,
        outputs,
    })
}

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the template or plan.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Synth { inputs, out } => {
            let built = build(&inputs)?;

            // 3) Render only once the whole graph validated.
            let text = render::render_template(&built.graph, &built.stack.description)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, text).with_context(|| {
                        diagnostics::error_message(format!("write template {}", path.display()))
                    })?;
                    tracing::info!(path = %path.display(), "template written");
                }
                None => print!("{}", text),
            }
        }
        Commands::Plan { inputs } => {
            let built = build(&inputs)?;
            let summary = model::build_plan_summary(&built.graph, &built.stack, &built.outputs);
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}
