//! GRACE CLI - contrastive node embeddings and linear evaluation.
//!
//! # Usage
//!
//! ```bash
//! # Train on Cora with the paper's settings and report test accuracy
//! grace --dataset Cora --dataset_path datasets
//!
//! # CiteSeer, PReLU encoder, keep the best checkpoint under model/
//! grace --dataset CiteSeer --activation prelu --best_model_path model \
//!       --drop_edge_rate_1 0.2 --drop_edge_rate_2 0.0 \
//!       --drop_feature_rate_1 0.3 --drop_feature_rate_2 0.2 --temp 0.9
//!
//! # PubMed with a blocked loss and exported embeddings
//! grace --dataset PubMed --loss_batch_size 1024 --embeddings_out pubmed.npy
//! ```
//!
//! Logging is controlled with `RUST_LOG` (default `info`).

use anyhow::{Context, Result};
use candle_core::Device;
use clap::{Parser, ValueEnum};
use grace_core::{AugmentConfig, Dataset, NodeSplit, SplitStrategy};
use grace_nn::evaluation::{linear_probe, LinearProbeConfig};
use grace_nn::training::{checkpoint_path, GraceConfig, GraceTrainer};
use grace_nn::Activation;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "grace")]
#[command(about = "Graph contrastive representation learning (GRACE)", long_about = None)]
struct Cli {
    /// Dataset name (Cora, CiteSeer, PubMed)
    #[arg(long, default_value = "Cora")]
    dataset: Dataset,

    /// Directory holding the raw dataset files
    #[arg(long = "dataset_path", default_value = "datasets")]
    dataset_path: PathBuf,

    /// Directory for the best checkpoint and its config
    #[arg(long = "best_model_path", default_value = "model")]
    best_model_path: PathBuf,

    /// Training epochs
    #[arg(long, default_value_t = 200)]
    epochs: usize,

    /// Learning rate
    #[arg(long, default_value_t = 5e-4)]
    lr: f64,

    /// L2 penalty coefficient
    #[arg(long, default_value_t = 1e-5)]
    l2: f64,

    /// InfoNCE temperature
    #[arg(long, default_value_t = 0.4)]
    temp: f64,

    /// Hidden width of the encoder
    #[arg(long = "hid_dim", default_value_t = 128)]
    hid_dim: usize,

    /// Embedding width
    #[arg(long = "out_dim", default_value_t = 128)]
    out_dim: usize,

    /// Number of GCN layers
    #[arg(long = "num_layers", default_value_t = 2)]
    num_layers: usize,

    /// Edge drop rate of the first view
    #[arg(long = "drop_edge_rate_1", default_value_t = 0.2)]
    drop_edge_rate_1: f32,

    /// Edge drop rate of the second view
    #[arg(long = "drop_edge_rate_2", default_value_t = 0.4)]
    drop_edge_rate_2: f32,

    /// Feature mask rate of the first view
    #[arg(long = "drop_feature_rate_1", default_value_t = 0.3)]
    drop_feature_rate_1: f32,

    /// Feature mask rate of the second view
    #[arg(long = "drop_feature_rate_2", default_value_t = 0.4)]
    drop_feature_rate_2: f32,

    /// Encoder activation (relu, prelu)
    #[arg(long, default_value = "relu")]
    activation: Activation,

    /// Stop after this many epochs without a new best loss
    #[arg(long)]
    patience: Option<usize>,

    /// Random seed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Rows per block when computing the loss (default: all rows)
    #[arg(long = "loss_batch_size")]
    loss_batch_size: Option<usize>,

    /// Node split for the linear probe
    #[arg(long, value_enum, default_value = "per-class")]
    split: SplitKind,

    /// Training fraction for --split ratio
    #[arg(long = "train_ratio", default_value_t = 0.1)]
    train_ratio: f32,

    /// Validation fraction for --split ratio
    #[arg(long = "val_ratio", default_value_t = 0.1)]
    val_ratio: f32,

    /// Linear probe epochs
    #[arg(long = "eval_epochs", default_value_t = 300)]
    eval_epochs: usize,

    /// Linear probe learning rate
    #[arg(long = "eval_lr", default_value_t = 0.01)]
    eval_lr: f64,

    /// Linear probe weight decay
    #[arg(long = "eval_wd", default_value_t = 0.0)]
    eval_wd: f64,

    /// CUDA device ordinal (falls back to CPU)
    #[arg(long)]
    gpu: Option<usize>,

    /// Write the final embeddings to this .npy file
    #[arg(long = "embeddings_out")]
    embeddings_out: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum SplitKind {
    /// 20 train nodes per class, 500 validation, 1000 test
    PerClass,
    /// Random fractions of all nodes
    Ratio,
}

impl Cli {
    fn grace_config(&self) -> GraceConfig {
        GraceConfig::default()
            .with_hid_dim(self.hid_dim)
            .with_out_dim(self.out_dim)
            .with_num_layers(self.num_layers)
            .with_activation(self.activation)
            .with_learning_rate(self.lr)
            .with_l2(self.l2)
            .with_epochs(self.epochs)
            .with_temperature(self.temp)
            .with_views(
                AugmentConfig::new(self.drop_edge_rate_1, self.drop_feature_rate_1),
                AugmentConfig::new(self.drop_edge_rate_2, self.drop_feature_rate_2),
            )
            .with_loss_batch_size(self.loss_batch_size)
            .with_patience(self.patience)
            .with_seed(self.seed)
    }

    fn split_strategy(&self) -> SplitStrategy {
        match self.split {
            SplitKind::PerClass => SplitStrategy::default(),
            SplitKind::Ratio => SplitStrategy::Ratio {
                train: self.train_ratio,
                val: self.val_ratio,
            },
        }
    }

    fn device(&self) -> Result<Device> {
        match self.gpu {
            Some(ordinal) => Device::cuda_if_available(ordinal).context("Failed to select device"),
            None => Ok(Device::Cpu),
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    run(&cli)
}

fn run(cli: &Cli) -> Result<()> {
    let device = cli.device()?;
    let config = cli.grace_config();
    config.validate().context("Invalid training configuration")?;

    let start = Instant::now();
    let pb = ProgressBar::new_spinner();
    pb.set_message(format!("Loading {}...", cli.dataset));
    let graph = cli
        .dataset
        .load(&cli.dataset_path)
        .with_context(|| format!("Failed to load {} from {}", cli.dataset, cli.dataset_path.display()))?;
    pb.finish_with_message(format!("Loaded in {:.2?}", start.elapsed()));

    let stats = graph.stats();
    println!("{} Statistics", cli.dataset);
    println!("==========================");
    println!("Nodes:          {}", stats.num_nodes);
    println!("Edges:          {}", stats.num_edges);
    println!("Features:       {}", stats.num_features);
    println!("Classes:        {}", stats.num_classes);
    println!("Avg degree:     {:.2}", stats.avg_degree);
    println!("Isolated nodes: {}", stats.isolated_nodes);

    fs::create_dir_all(&cli.best_model_path)
        .with_context(|| format!("Failed to create {}", cli.best_model_path.display()))?;
    let checkpoint = checkpoint_path(&cli.best_model_path);

    let mut trainer = GraceTrainer::new(config, graph.num_features(), &device)?;
    let start = Instant::now();
    let pb = ProgressBar::new(cli.epochs as u64);
    pb.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} epochs {msg}")
            .context("Invalid progress template")?,
    );
    let result = trainer
        .train(&graph, Some(&checkpoint), |report| {
            pb.set_message(format!("loss {:.4} (best {:.4})", report.loss, report.best_loss));
            pb.inc(1);
        })
        .context("Training failed")?;
    pb.finish_with_message(format!("trained in {:.2?}", start.elapsed()));

    println!(
        "Best epoch:     {} (loss {:.4}){}",
        result.best_epoch,
        result.best_loss,
        if result.stopped_early { ", stopped early" } else { "" }
    );
    println!("Checkpoint:     {}", checkpoint.display());

    let embeddings = trainer.embed(&graph)?;
    if let Some(path) = &cli.embeddings_out {
        embeddings
            .write_npy(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Embeddings:     {}", path.display());
    }

    let labels = graph.require_labels()?;
    let split = NodeSplit::new(cli.split_strategy(), labels, graph.num_classes(), cli.seed)
        .context("Failed to split nodes")?;
    let probe = LinearProbeConfig::default()
        .with_learning_rate(cli.eval_lr)
        .with_weight_decay(cli.eval_wd)
        .with_epochs(cli.eval_epochs)
        .with_seed(cli.seed);
    let metrics = linear_probe(&embeddings, labels, graph.num_classes(), &split, &probe)?;

    tracing::info!(summary = %metrics.summary(), "evaluation finished");
    println!("Test acc: {:.4}", metrics.test_acc);
    Ok(())
}
