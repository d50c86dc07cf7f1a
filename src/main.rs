use clap::{Parser, Subcommand};
use dotenv::dotenv;
use kinetic_flow::config::EngineConfig;
use kinetic_flow::flow::builder::Builder;
use kinetic_flow::flow::state::InitialState;
use serde_json::{json, Map, Value};

use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding workflow definitions (overrides FLOW_WORKFLOWS_DIR)
    #[arg(short, long, global = true)]
    dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a workflow for a user query
    Run {
        /// Workflow id, or path to a definition file
        #[arg(short, long)]
        workflow: String,

        /// The user query
        #[arg(short, long)]
        query: String,

        /// JSON object merged into the flow scope
        #[arg(short, long)]
        flow: Option<String>,

        /// Print the full final state instead of the terminal output
        #[arg(long)]
        state: bool,
    },
    /// Compile a workflow without running it
    Validate {
        /// Workflow id, or path to a definition file
        #[arg(short, long)]
        workflow: String,
    },
    /// Start the HTTP API
    Serve {
        #[arg(short, long, default_value_t = 3000)]
        port: u16,
    },
}

fn parse_flow(raw: Option<&str>) -> Result<Map<String, Value>, Box<dyn std::error::Error + Send + Sync>> {
    match raw {
        None => Ok(Map::new()),
        Some(text) => match serde_json::from_str::<Value>(text)? {
            Value::Object(map) => Ok(map),
            other => Err(format!("--flow must be a JSON object, got {}", other).into()),
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    let mut config = EngineConfig::from_env()?;
    if let Some(dir) = args.dir {
        config = config.with_workflows_dir(dir);
    }
    log::info!("Loading workflows from {}", config.workflows_dir.display());
    let builder = Arc::new(Builder::from_config(&config));

    match args.command {
        Commands::Run {
            workflow,
            query,
            flow,
            state,
        } => {
            let overrides = InitialState {
                flow: parse_flow(flow.as_deref())?,
                ..Default::default()
            };
            let graph = builder.build_workflow(&workflow)?;

            println!("Running workflow: {}", graph.name());
            let result = builder.run(&graph, &query, overrides).await?;
            let printed = if state {
                json!(result.state)
            } else {
                result.output
            };
            println!("{}", serde_json::to_string_pretty(&printed)?);
        }
        Commands::Validate { workflow } => {
            let graph = builder.build_workflow(&workflow)?;
            println!(
                "Workflow '{}' is valid: {} vertices, entry {}",
                graph.id(),
                graph.vertices().len(),
                graph.entry()
            );
        }
        Commands::Serve { port } => {
            kinetic_flow::server::serve(builder, port).await?;
        }
    }

    Ok(())
}
