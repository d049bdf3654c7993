use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use partial_json::{ParseState, parse_partial_json};
use schema_config::{InferenceConfig, StorageConfig, load_or_default};
use schema_inference::{
    NodeId, SchemaAnalyzer, SchemaComparator, SchemaGraph, to_json_schema,
    to_mermaid,
};
use schema_store::{GraphStore, GraphStoreExt, build_store};
use seeded_random::{MersenneTwister, Random};
use serde_json::{Map, Value};
use tracing::{info, warn};

mod input;
mod report;

#[derive(Parser, Debug)]
#[command(name = "schema-infer", version, about)]
struct Args {
    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,
    /// Log filter, e.g. "debug" or "info,schema_inference=trace"
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[arg(long, global = true)]
    json_logs: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Infer a schema from sample files or directories
    Analyze {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[arg(long, value_enum, default_value_t = OutputFormat::JsonSchema)]
        format: OutputFormat,
        /// Infer one schema per distinct value of this property
        #[arg(long)]
        by_key: Option<String>,
        /// Complete truncated documents instead of failing
        #[arg(long)]
        repair: bool,
        /// Persist the graph under this key in the configured store
        #[arg(long)]
        store_key: Option<String>,
        /// Merge into the graph already stored under `store_key`
        #[arg(long, requires = "store_key")]
        merge: bool,
    },
    /// Compare two graphs; exits with 2 on breaking changes
    Diff {
        before: String,
        after: String,
        /// Treat `before` and `after` as store keys instead of files
        #[arg(long)]
        store: bool,
        #[arg(long)]
        json: bool,
    },
    /// Complete a truncated JSON document from a file or `-` for stdin
    Repair { input: String },
    /// Draw reproducible weighted picks from `name=weight` choices
    Sample {
        #[arg(required = true)]
        choices: Vec<String>,
        #[arg(long, default_value_t = seeded_random::DEFAULT_SEED)]
        seed: u32,
        #[arg(long, default_value_t = 1)]
        count: usize,
        /// Words already consumed from the seeded stream
        #[arg(long, default_value_t = 0)]
        skip: u64,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    JsonSchema,
    Graph,
    Mermaid,
    Summary,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let o11y_cfg = o11y::O11yConfig {
        app: "schema-infer",
        logging: o11y::logging::Config {
            level: args.log_level.clone(),
            json: args.json_logs,
            with_targets: false,
        },
        install_panic_hook: true,
    };
    let _ = o11y::init_all(&o11y_cfg);

    let cfg = load_or_default(args.config.as_deref()).context("load config")?;

    match args.command {
        Command::Analyze {
            paths,
            format,
            by_key,
            repair,
            store_key,
            merge,
        } => {
            let opts = AnalyzeOpts {
                format,
                by_key,
                repair,
                store_key,
                merge,
            };
            analyze(&cfg, &paths, opts).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Diff {
            before,
            after,
            store,
            json,
        } => diff(&cfg, &before, &after, store, json).await,
        Command::Repair { input } => {
            repair(&input)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Sample {
            choices,
            seed,
            count,
            skip,
        } => {
            sample(&choices, seed, count, skip)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

struct AnalyzeOpts {
    format: OutputFormat,
    by_key: Option<String>,
    repair: bool,
    store_key: Option<String>,
    merge: bool,
}

fn open_store(cfg: &InferenceConfig) -> Result<Arc<dyn GraphStore>> {
    if cfg.storage == StorageConfig::Memory {
        warn!("memory storage does not outlive this process");
    }
    build_store(&cfg.storage).context("build graph store")
}

async fn analyze(
    cfg: &InferenceConfig,
    paths: &[PathBuf],
    opts: AnalyzeOpts,
) -> Result<()> {
    let files = input::collect_files(paths)?;
    let samples = input::load_samples(&files, opts.repair)?;
    if samples.is_empty() {
        bail!("no samples found in {} file(s)", files.len());
    }

    let mut analyzer = SchemaAnalyzer::new(cfg.analyzer.clone())
        .with_patterns(cfg.patterns.clone());

    let mut roots: Vec<(String, NodeId)> = match &opts.by_key {
        Some(key) => {
            let groups = analyzer.analyze_by_key(&samples, key);
            if groups.is_empty() {
                bail!("no sample carries the property {key:?}");
            }
            groups.into_iter().collect()
        }
        None => vec![("root".to_string(), analyzer.analyze_samples(&samples))],
    };
    let mut graph = analyzer.into_graph();
    info!(
        files = files.len(),
        samples = samples.len(),
        nodes = graph.len(),
        "schema inferred"
    );

    if let Some(key) = &opts.store_key {
        let store = open_store(cfg)?;
        if opts.merge
            && let Some(existing) = store.get_graph(key).await?
        {
            let before = existing.len();
            graph = merge_into(existing, &graph, &mut roots);
            info!(key = %key, before, after = graph.len(), "merged into stored graph");
        }
        store.put_graph(key, &graph).await?;
        info!(key = %key, backend = store.backend(), "graph stored");
    }

    let out = match opts.format {
        OutputFormat::Graph => graph.to_json()?,
        OutputFormat::Mermaid => to_mermaid(&graph),
        OutputFormat::Summary => report::render_summary(&graph),
        OutputFormat::JsonSchema if opts.by_key.is_none() => {
            let (_, root) = &roots[0];
            serde_json::to_string_pretty(&to_json_schema(&graph, root)?.to_value()?)?
        }
        OutputFormat::JsonSchema => {
            let mut schemas = Map::new();
            for (name, root) in &roots {
                schemas.insert(name.clone(), to_json_schema(&graph, root)?.to_value()?);
            }
            serde_json::to_string_pretty(&Value::Object(schemas))?
        }
    };
    println!("{}", out.trim_end());
    Ok(())
}

/// Fold `graph` into `existing` and point `roots` at their merged ids.
fn merge_into(
    mut existing: SchemaGraph,
    graph: &SchemaGraph,
    roots: &mut [(String, NodeId)],
) -> SchemaGraph {
    let mapping = existing.merge(graph);
    for (_, root) in roots.iter_mut() {
        if let Some(mapped) = mapping.get(root) {
            *root = mapped.clone();
        }
    }
    existing
}

fn read_graph_file(path: &str) -> Result<SchemaGraph> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading graph {path}"))?;
    SchemaGraph::from_json(&raw).with_context(|| format!("decoding graph {path}"))
}

async fn load_graph(
    store: Option<&Arc<dyn GraphStore>>,
    source: &str,
) -> Result<SchemaGraph> {
    match store {
        Some(store) => match store.get_graph(source).await? {
            Some(graph) => Ok(graph),
            None => bail!("no graph stored under {source:?}"),
        },
        None => read_graph_file(source),
    }
}

async fn diff(
    cfg: &InferenceConfig,
    before: &str,
    after: &str,
    from_store: bool,
    json: bool,
) -> Result<ExitCode> {
    let store = if from_store { Some(open_store(cfg)?) } else { None };
    let old = load_graph(store.as_ref(), before).await?;
    let new = load_graph(store.as_ref(), after).await?;

    let diff = SchemaComparator::new().compare(&old, &new);
    info!(
        added = diff.added.len(),
        removed = diff.removed.len(),
        modified = diff.modified.len(),
        compatibility = %diff.compatibility,
        "graphs compared"
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&diff)?);
    } else {
        print!("{}", report::render_diff(&diff, &old, &new));
    }
    Ok(ExitCode::from(report::exit_status(diff.compatibility)))
}

fn repair(source: &str) -> Result<()> {
    let raw = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading stdin")?;
        buf
    } else {
        std::fs::read_to_string(Path::new(source))
            .with_context(|| format!("reading {source}"))?
    };

    let parsed = parse_partial_json(Some(&raw));
    match (parsed.state, parsed.value) {
        (ParseState::FailedParse | ParseState::UndefinedInput, _) | (_, None) => {
            bail!("{source} could not be repaired")
        }
        (state, Some(value)) => {
            info!(state = ?state, "document parsed");
            println!("{}", serde_json::to_string(&value)?);
            Ok(())
        }
    }
}

fn parse_choice(raw: &str) -> Result<(String, f64)> {
    let Some((name, weight)) = raw.rsplit_once('=') else {
        return Ok((raw.to_string(), 1.0));
    };
    let weight: f64 = weight
        .trim()
        .parse()
        .with_context(|| format!("weight of choice {name:?}"))?;
    Ok((name.to_string(), weight))
}

fn sample(raw_choices: &[String], seed: u32, count: usize, skip: u64) -> Result<()> {
    let choices = raw_choices
        .iter()
        .map(|c| parse_choice(c))
        .collect::<Result<Vec<_>>>()?;

    let mut random = Random::new(MersenneTwister::replay(seed, skip));
    for _ in 0..count {
        println!("{}", random.weighted_pick(&choices)?);
    }

    let position = random.rng().position();
    info!(seed = position.seed, use_count = position.use_count, "stream position");
    eprintln!("{}", serde_json::to_string(&position)?);
    Ok(())
}
