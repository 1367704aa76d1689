use std::path::PathBuf;

use anyhow::{Context, Result};
use arrow::util::pretty::pretty_format_batches;
use clap::{Parser, Subcommand};
use log::info;

use datasetplus::hub::{DEFAULT_ENDPOINT, DEFAULT_REVISION};
use datasetplus::{
    AudioProcessor, DatasetManager, DownloadRequest, ExtractOptions, HubClient,
    MissingAudioPolicy, RepoKind, UploadRequest,
};

/// Download, upload and extract Hugging Face Hub datasets.
#[derive(Parser, Debug)]
#[command(name = "datasetplus", version, about)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Hub access token
    #[arg(long, env = "HF_TOKEN", global = true, hide_env_values = true)]
    token: Option<String>,

    /// Hub base URL
    #[arg(long, env = "HF_ENDPOINT", global = true, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download a repository snapshot or a single file
    Download {
        /// Repository id, e.g. `fixie-ai/llama-questions`
        repo_id: String,
        /// Directory receiving the files
        local_dir: PathBuf,
        /// Fetch only this file
        #[arg(long)]
        filename: Option<String>,
        #[arg(long, value_enum, default_value_t = RepoKind::Dataset)]
        repo_type: RepoKind,
        #[arg(long, default_value = DEFAULT_REVISION)]
        revision: String,
        /// Glob of repository files to skip (repeatable)
        #[arg(long = "ignore", value_name = "PATTERN")]
        ignore_patterns: Vec<String>,
        /// Delete the download cache afterwards
        #[arg(long)]
        no_cache: bool,
    },
    /// Upload a file or directory to a repository
    Upload {
        local_path: PathBuf,
        repo_id: String,
        #[arg(long, value_enum, default_value_t = RepoKind::Dataset)]
        repo_type: RepoKind,
        #[arg(long, default_value = DEFAULT_REVISION)]
        revision: String,
        /// Commit message
        #[arg(long, short)]
        message: Option<String>,
    },
    /// Print row count, audio size, columns and leading rows
    Info {
        /// Parquet file or directory of Parquet files
        path: PathBuf,
        /// Number of rows to show
        #[arg(long, default_value_t = 5)]
        sample: usize,
        #[arg(long)]
        audio_column: Option<String>,
    },
    /// Write audio to `wavs/` and text columns to per-column directories
    Extract {
        /// Parquet file or directory of Parquet files
        path: PathBuf,
        output_dir: PathBuf,
        /// Text columns to extract (default: all non-audio columns)
        #[arg(long, value_delimiter = ',')]
        columns: Option<Vec<String>>,
        /// Maximum number of rows
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        audio_column: Option<String>,
        /// Column naming output files, checked before `id` and `filename`
        #[arg(long)]
        id_column: Option<String>,
        /// Fail on rows without audio instead of skipping them
        #[arg(long)]
        strict: bool,
        #[arg(long)]
        no_progress: bool,
    },
}

fn processor(path: PathBuf, audio_column: Option<String>) -> AudioProcessor {
    let processor = AudioProcessor::new(path);
    match audio_column {
        Some(column) => processor.with_audio_column(column),
        None => processor,
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    datasetplus::logging::init(cli.verbose);

    let client = HubClient::new(cli.token.clone()).with_endpoint(cli.endpoint.clone());
    let manager = DatasetManager::new(client);

    match cli.command {
        Command::Download {
            repo_id,
            local_dir,
            filename,
            repo_type,
            revision,
            ignore_patterns,
            no_cache,
        } => {
            let request = DownloadRequest {
                repo_id,
                local_dir,
                filename,
                repo_kind: repo_type,
                revision,
                ignore_patterns,
                no_cache,
            };
            let files = manager
                .download(&request)
                .with_context(|| format!("downloading {}", request.repo_id))?;
            info!("Fetched {} file(s) into {}", files.len(), request.local_dir.display());
        }
        Command::Upload {
            local_path,
            repo_id,
            repo_type,
            revision,
            message,
        } => {
            let request = UploadRequest {
                local_path,
                repo_id,
                repo_kind: repo_type,
                revision,
                commit_message: message,
            };
            manager
                .upload(&request)
                .with_context(|| format!("uploading to {}", request.repo_id))?;
        }
        Command::Info {
            path,
            sample,
            audio_column,
        } => {
            let summary = processor(path.clone(), audio_column)
                .summary(sample)
                .with_context(|| format!("reading {}", path.display()))?;
            println!("rows:         {}", summary.total_files);
            println!("audio column: {}", summary.audio_column);
            println!("audio size:   {:.2} MB", summary.file_size_mb());
            println!("columns:      {}", summary.columns.join(", "));
            println!("{}", pretty_format_batches(&[summary.sample]).context("formatting sample")?);
        }
        Command::Extract {
            path,
            output_dir,
            columns,
            limit,
            audio_column,
            id_column,
            strict,
            no_progress,
        } => {
            let options = ExtractOptions {
                columns,
                limit,
                id_column,
                missing_audio: if strict {
                    MissingAudioPolicy::Fail
                } else {
                    MissingAudioPolicy::Skip
                },
                progress: !no_progress,
            };
            let files = processor(path.clone(), audio_column)
                .extract_audio_files(&output_dir, &options)
                .with_context(|| format!("extracting {}", path.display()))?;
            info!("Extracted {} audio files into {}", files.len(), output_dir.display());
        }
    }
    Ok(())
}
