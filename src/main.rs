use clap::{Parser, Subcommand};
use imageflip::codec::CodecChoice;
use imageflip::download::DirectorySink;
use imageflip::orchestrator::{ConversionOrchestrator, Status};
use imageflip::types::{Direction, PendingFile};
use imageflip::{capability, config, output, runner};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "imageflip")]
#[command(about = "Convert images between AVIF and JPG")]
#[command(long_about = "\
Convert images between AVIF and JPG

Accepted inputs: .avif, .png, .jpg, .jpeg (case-insensitive). Directories
are expanded to the files they contain; anything else is skipped.

Output:
  1 file   → saved as <name>.jpg or <name>.avif
  N files  → packaged into converted_images.zip

The default direction comes from the site profile (see 'imageflip probe').

Run 'imageflip gen-config' to generate a documented imageflip.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Directory containing imageflip.toml
    #[arg(long, default_value = ".", global = true)]
    config: PathBuf,

    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert files and save the result
    Convert {
        /// Files or directories to convert
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// avif-to-jpg or jpg-to-avif (default: from site profile)
        #[arg(long)]
        direction: Option<Direction>,

        /// Where converted files are saved
        #[arg(long, default_value = "converted")]
        output: PathBuf,

        /// passthrough or native (default: from config)
        #[arg(long)]
        codec: Option<CodecChoice>,

        /// Print status events as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Show detected capabilities and the resolved site profile
    Probe,
    /// Print a stock imageflip.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Convert {
            paths,
            direction,
            output: output_dir,
            codec,
            json,
        } => {
            let mut app_config = config::load_config(&cli.config)?;
            if let Some(codec) = codec {
                app_config.processing.codec = codec;
            }
            init_thread_pool(&app_config.processing);

            let caps = capability::detect();
            let sink = DirectorySink::new(&output_dir)?;
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    if json {
                        println!("{}", output::format_status_json(&event));
                    } else {
                        for line in output::format_status_event(&event) {
                            println!("{}", line);
                        }
                    }
                }
            });

            let mut orchestrator =
                ConversionOrchestrator::from_config(&app_config, &caps, Box::new(sink))
                    .with_events(tx);
            if let Some(direction) = direction {
                orchestrator.set_direction(direction);
            }

            orchestrator.submit_files(collect_inputs(&paths)?)?;
            if !json {
                output::print_pending_files(orchestrator.files(), orchestrator.direction());
            }
            orchestrator.start_conversion();
            let status = orchestrator.wait();
            let error = orchestrator.error().map(str::to_string);
            drop(orchestrator);
            printer.join().map_err(|_| "output thread panicked")?;

            if status == Status::Error {
                return Err(error
                    .unwrap_or_else(|| "conversion failed".to_string())
                    .into());
            }
            if !json {
                println!("==> Saved to {}", output_dir.display());
            }
        }
        Command::Probe => {
            let app_config = config::load_config(&cli.config)?;
            let caps = capability::detect();
            let site = config::resolve_site(&app_config);
            let runner = runner::select_runner(&caps, app_config.processing.background_worker);
            let codec = app_config.processing.codec.build(app_config.processing.quality);
            output::print_probe(&caps, &site, runner.name(), codec.name());
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "imageflip=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Never exceeds the available cores; config can only lower the count.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// Expand the command-line paths into pending files, in argument order.
/// Directories contribute their files sorted by path.
fn collect_inputs(paths: &[PathBuf]) -> Result<Vec<PendingFile>, Box<dyn std::error::Error>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in walkdir::WalkDir::new(path).sort_by_file_name() {
                let entry = entry?;
                if entry.file_type().is_file() {
                    files.push(pending_file(entry.path())?);
                }
            }
        } else {
            files.push(pending_file(path)?);
        }
    }
    Ok(files)
}

fn pending_file(path: &Path) -> Result<PendingFile, Box<dyn std::error::Error>> {
    PendingFile::from_path(path).map_err(|e| format!("{}: {}", path.display(), e).into())
}
