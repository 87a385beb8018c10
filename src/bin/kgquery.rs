use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use smartkg::ingest::DirectoryImporter;
use smartkg::{AttributePair, Config, GraphRegistry, QueryOutcome};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "kgquery")]
#[command(about = "Run a knowledge graph query against one datastore and print JSON")]
struct Args {
    /// Datastore name (sub-directory of the data folder)
    #[arg(short, long)]
    datastore: String,

    /// Read datastores from this folder instead of the configured data_folder
    #[arg(long)]
    data_folder: Option<PathBuf>,

    /// Scenario filter; empty matches every scenario
    #[arg(short, long, default_value = "")]
    scenario: String,

    /// Attribute constraint as name=value (repeatable)
    #[arg(short, long = "attr", value_parser = parse_attribute)]
    attributes: Vec<AttributePair>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Breadth-first children of a start vertex, grouped by relation type
    FilterGraph {
        /// Start vertex name; defaults to the scenario's root
        #[arg(long, default_value = "")]
        start: String,
        /// Relation types to follow (repeatable); all when omitted
        #[arg(short, long = "relation")]
        relations: Vec<String>,
    },
    /// Resolve the start vertex of a scenario
    SearchRooted {
        #[arg(long, default_value = "")]
        start: String,
    },
    /// Direct children of one vertex, grouped by relation type
    Children {
        /// Vertex id
        #[arg(long)]
        vertex: String,
        #[arg(short, long = "relation")]
        relations: Vec<String>,
    },
}

fn parse_attribute(raw: &str) -> std::result::Result<AttributePair, String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => Ok(AttributePair::new(name.trim(), value.trim())),
        _ => Err(format!("expected name=value, got '{}'", raw)),
    }
}

fn print_outcome<T: Serialize>(outcome: QueryOutcome<T>) -> Result<()> {
    let body = match outcome {
        QueryOutcome::Found(results) => json!({ "success": true, "responseMessage": "Success", "results": results }),
        QueryOutcome::NotFound(message) => json!({ "success": false, "responseMessage": message }),
        QueryOutcome::InvalidInput(message) => json!({ "success": false, "responseMessage": message }),
    };
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "warn")).init();

    let args = Args::parse();

    let registry = match &args.data_folder {
        Some(folder) => GraphRegistry::new(
            Arc::new(DirectoryImporter::new(folder)),
            std::time::Duration::from_secs(30),
        ),
        None => GraphRegistry::from_config(&Config::load()?),
    };

    let ds = registry.load(&args.datastore).await?;
    let engine = ds.query();

    match &args.command {
        Command::FilterGraph { start, relations } => {
            let relations = (!relations.is_empty()).then_some(relations.as_slice());
            print_outcome(engine.filter_graph(start, &args.scenario, relations, &args.attributes))?;
        }
        Command::SearchRooted { start } => {
            print_outcome(engine.search_rooted(start, &args.scenario, &args.attributes))?;
        }
        Command::Children { vertex, relations } => {
            let vertex = match ds.graph().vertex_by_id(vertex) {
                Some(v) => v,
                None => {
                    return print_outcome(QueryOutcome::<()>::not_found(format!("no vertex with id '{}'", vertex)));
                }
            };
            let relations = (!relations.is_empty()).then_some(relations.as_slice());
            print_outcome(engine.get_children(vertex, relations, &args.attributes, &args.scenario))?;
        }
    }

    Ok(())
}
