use std::{fs, io::Write, path::PathBuf};

use ab_glyph::FontArc;
use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use dataset::{AnnotationParser, ClassVocabulary, OffsetTable};
use env_logger::{Builder, Env};
use log::{LevelFilter, info};

use crate::{
    classification::ClassificationGenerator,
    config::{ClassificationConfig, DetectionConfig, read_json},
    detection::DetectionGenerator,
    preview::PreviewHost,
};

mod background;
mod classification;
mod config;
mod detection;
#[cfg(test)]
mod fake_host;
mod host;
mod mesh;
mod plot;
mod preview;
mod randomizer;

#[derive(Subcommand)]
enum Commands {
    /// Render single-object crops named after their bounding box
    Classify {
        #[arg(long)]
        config: PathBuf,
    },
    /// Render multi-object scenes with one XML annotation each
    Detect {
        #[arg(long)]
        config: PathBuf,
    },
    /// Draw the annotated boxes of a detection dataset
    Plot {
        #[arg(long)]
        dataset: PathBuf,
        #[arg(long)]
        out: PathBuf,
        /// Vocabulary in column order, defaults to the ShapeNetCore classes
        #[arg(long, value_delimiter = ',')]
        classes: Option<Vec<String>>,
        #[arg(long)]
        limit: Option<usize>,
        /// TTF/OTF font for box labels
        #[arg(long)]
        font: Option<PathBuf>,
    },
}

#[derive(Parser)]
#[command(name = "scenegen")]
#[command(about = "Synthetic classification and detection dataset generator")]
struct Cli {
    /// -v info, -vv debug, -vvv trace
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Overrides the seed in the config file
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Scene file the preview host saves and reopens between images
    #[arg(long, global = true, default_value = "cache/current_scene.json")]
    checkpoint: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

fn level_from_verbosity(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn init_logger(verbose: u8) {
    // RUST_LOG wins only when no -v was given.
    let mut logger = if verbose == 0 && std::env::var_os("RUST_LOG").is_some() {
        Builder::from_env(Env::default())
    } else {
        let mut b = Builder::new();
        b.filter_level(level_from_verbosity(verbose));
        b
    };
    logger
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    match cli.command {
        Commands::Classify { config } => {
            let mut config: ClassificationConfig = read_json(&config)?;
            if let Some(seed) = cli.seed {
                config.scene.seed = seed;
            }
            let index = config.models.load_index()?;
            let generator = ClassificationGenerator::new(&config, &index)?;
            let mut host = PreviewHost::new(&cli.checkpoint);
            let samples = generator.run(&mut host)?;
            info!("wrote {} images to {}", samples.len(), config.save_path.display());
        }
        Commands::Detect { config } => {
            let mut config: DetectionConfig = read_json(&config)?;
            if let Some(seed) = cli.seed {
                config.scene.seed = seed;
            }
            let index = config.models.load_index()?;
            let generator = DetectionGenerator::new(&config, &index)?;
            let mut host = PreviewHost::new(&cli.checkpoint);
            let samples = generator.run(&mut host)?;
            info!("wrote {} scenes to {}", samples.len(), config.save_path.display());
        }
        Commands::Plot {
            dataset,
            out,
            classes,
            limit,
            font,
        } => {
            let vocabulary = match classes {
                Some(names) => ClassVocabulary::new(names)?,
                None => OffsetTable::shapenet_core().vocabulary()?,
            };
            let font = font
                .map(|path| {
                    let bytes = fs::read(&path)
                        .with_context(|| format!("reading font {}", path.display()))?;
                    FontArc::try_from_vec(bytes)
                        .with_context(|| format!("parsing font {}", path.display()))
                })
                .transpose()?;
            let parser = AnnotationParser::new(dataset, vocabulary)?;
            let written = plot::plot_ground_truths(&parser, &out, limit, font.as_ref())?;
            info!("plotted {} images to {}", written.len(), out.display());
        }
    }

    Ok(())
}
