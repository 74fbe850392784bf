use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use spai_data::{parse_specifier, Channels, DataReader, ReaderConfig, DEFAULT_SIGNAL_COLUMN};

/// Inspect a dataset through the same readers the training pipeline uses.
#[derive(Parser)]
#[command(name = "spai-data", version)]
struct Cli {
    #[command(flatten)]
    backend: BackendArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct BackendArgs {
    /// JSON reader config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Dataset root directory.
    #[arg(long)]
    root: Option<PathBuf>,

    /// Blob container file.
    #[arg(long)]
    blob: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Print CSV rows as JSON lines.
    Rows {
        csv: String,
        /// Only rows where column=value (repeatable).
        #[arg(long = "where", value_name = "COLUMN=VALUE")]
        filters: Vec<String>,
    },
    /// Print the dimensions of an image.
    Size { image: String },
    /// Load the images referenced by a CSV column.
    Signals {
        csv: String,
        #[arg(long, default_value = DEFAULT_SIGNAL_COLUMN)]
        column: String,
        #[arg(long, default_value_t = 1)]
        channels: u8,
        #[arg(long = "where", value_name = "COLUMN=VALUE")]
        filters: Vec<String>,
    },
    /// Print the size in bytes of a raw file.
    Stream { path: String },
}

impl BackendArgs {
    fn config(&self) -> Result<ReaderConfig> {
        match (&self.config, &self.root, &self.blob) {
            (Some(path), _, _) => ReaderConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display())),
            (_, Some(root), _) => Ok(ReaderConfig::Filesystem { root: root.clone() }),
            (_, _, Some(path)) => Ok(ReaderConfig::BlobStore { path: path.clone() }),
            _ => bail!("one of --config, --root or --blob is required"),
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let reader = cli.backend.config()?.open().context("opening dataset")?;
    run(reader.as_ref(), cli.command)
}

fn run(reader: &dyn DataReader, command: Command) -> Result<()> {
    match command {
        Command::Rows { csv, filters } => {
            let spec = parse_specifier(&filters).map_err(anyhow::Error::msg)?;
            let rows = reader.read_csv_file(&csv)?;
            let total = rows.len();
            let kept = spai_data::filter_rows(rows, Some(&spec));
            for row in &kept {
                println!("{}", serde_json::to_string(row)?);
            }
            log::info!("{} of {total} rows matched", kept.len());
        }
        Command::Size { image } => {
            let size = reader.get_image_size(&image)?;
            println!("{size}");
        }
        Command::Signals {
            csv,
            column,
            channels,
            filters,
        } => {
            let spec = parse_specifier(&filters).map_err(anyhow::Error::msg)?;
            let signals = reader
                .load_signals_from_csv(&csv, &column, Channels::from(channels), Some(&spec))
                .with_context(|| format!("loading signals from {csv}"))?;
            println!("{} signals", signals.len());
            for (i, signal) in signals.iter().enumerate() {
                println!("{i}\t{}x{}\t{:?}", signal.width(), signal.height(), signal.color());
            }
        }
        Command::Stream { path } => {
            let mut stream = reader.load_file_path_or_stream(&path)?.into_reader()?;
            let mut bytes = Vec::new();
            stream
                .read_to_end(&mut bytes)
                .with_context(|| format!("reading {path}"))?;
            println!("{} bytes", bytes.len());
        }
    }
    Ok(())
}
