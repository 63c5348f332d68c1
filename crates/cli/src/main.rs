use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cli::{ProgressObserver, format_neighbors, init_tracing, read_baskets, write_baskets};
use console::style;
use core_types::config::{AppConfig, load_config};
use product2vec::{BasketGenerator, EpochLogger, Product2Vec, Relation};
use tracing::info;

/// Debug / scripting CLI for product2vec.
#[derive(Parser, Debug)]
#[command(name = "p2v", version = cli::VERSION, about = "Train and query basket embeddings")]
struct Cli {
    /// TOML config file (defaults to ./p2v.toml when present).
    #[arg(short, long, global = true, env = "P2V_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate synthetic baskets as JSON.
    Generate {
        /// Output file; stdout when omitted.
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Override the number of baskets.
        #[arg(short = 'n', long)]
        baskets: Option<usize>,
    },
    /// Fit a model and save it.
    Fit {
        /// Where to write the fitted model.
        #[arg(short, long)]
        model: PathBuf,
        /// JSON baskets file; synthetic baskets are generated when omitted.
        #[arg(short, long)]
        baskets: Option<PathBuf>,
        #[arg(long)]
        epochs: Option<usize>,
        #[arg(long)]
        vector_size: Option<usize>,
        /// Epochs kept in the end-of-training loss summary.
        #[arg(long, default_value_t = 3)]
        n_latest: usize,
    },
    /// Show products bought together with PRODUCT.
    Complements(QueryArgs),
    /// Show products that can replace PRODUCT.
    Substitutes(QueryArgs),
    /// List the vocabulary of a fitted model, most frequent first.
    Vocab {
        #[arg(short, long)]
        model: PathBuf,
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },
}

#[derive(clap::Args, Debug)]
struct QueryArgs {
    product: String,
    #[arg(short, long)]
    model: PathBuf,
    #[arg(short = 'n', long, default_value_t = 10)]
    topn: usize,
    /// Print JSON instead of a table.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(cli.config.as_deref())?;
    let _guard = init_tracing(&cfg.logging)?;

    match cli.command {
        Commands::Generate { out, baskets } => {
            let mut gen_cfg = cfg.generator.clone();
            if let Some(n) = baskets {
                gen_cfg.num_baskets = n;
            }
            let corpus = BasketGenerator::new(gen_cfg)?.generate();
            write_baskets(&corpus, out.as_deref())?;
            if let Some(path) = out {
                eprintln!(
                    "{} {} baskets to {}",
                    style("wrote").green(),
                    corpus.len(),
                    path.display()
                );
            }
        }
        Commands::Fit {
            model,
            baskets,
            epochs,
            vector_size,
            n_latest,
        } => fit(&cfg, &model, baskets, epochs, vector_size, n_latest)?,
        Commands::Complements(args) => query(&args, Relation::Complement)?,
        Commands::Substitutes(args) => query(&args, Relation::Substitute)?,
        Commands::Vocab { model, limit } => {
            let model = load_model(&model)?;
            let space = model.vector_space()?;
            let vocab = space.vocabulary();
            for (index, key) in vocab.keys().enumerate().take(limit) {
                let count = vocab.count(index).unwrap_or(0);
                println!("{index:>5}  {key}  {}", style(count).dim());
            }
            println!("{} products", style(space.len()).bold());
        }
    }
    Ok(())
}

fn fit(
    cfg: &AppConfig,
    model_path: &Path,
    baskets: Option<PathBuf>,
    epochs: Option<usize>,
    vector_size: Option<usize>,
    n_latest: usize,
) -> Result<()> {
    let corpus = match baskets {
        Some(path) => read_baskets(&path)?,
        None => BasketGenerator::new(cfg.generator.clone())?.generate(),
    };

    let mut model_cfg = cfg.model.clone();
    if let Some(e) = epochs {
        model_cfg.epochs = e;
    }
    if let Some(v) = vector_size {
        model_cfg.vector_size = v;
    }

    let logger = Arc::new(EpochLogger::new(n_latest)?);
    let mut model = Product2Vec::new(model_cfg)?
        .with_callback(Arc::new(ProgressObserver::new()))
        .with_callback(logger.clone());
    model.fit(&corpus)?;
    model
        .save(model_path)
        .with_context(|| format!("save model to {}", model_path.display()))?;
    info!(path = %model_path.display(), "model written");

    println!(
        "{} {} products from {} baskets",
        style("fitted").green().bold(),
        model.vocab_size()?,
        corpus.len()
    );
    for record in logger.history() {
        println!("  epoch {:>3}  loss {:.4}", record.epoch + 1, record.loss);
    }
    Ok(())
}

fn query(args: &QueryArgs, relation: Relation) -> Result<()> {
    let model = load_model(&args.model)?;
    let hits = model.neighbors(&args.product, args.topn, relation)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
    } else {
        let title = match relation {
            Relation::Complement => "Complements",
            Relation::Substitute => "Substitutes",
        };
        println!("{} of {}", style(title).cyan(), style(&args.product).bold());
        println!("{}", format_neighbors(&hits));
    }
    Ok(())
}

fn load_model(path: &Path) -> Result<Product2Vec> {
    Product2Vec::load(path).with_context(|| format!("load model {}", path.display()))
}
