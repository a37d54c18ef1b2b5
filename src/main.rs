use clap::{Parser, Subcommand};
use docs_harvest::fetch::FetchResult;
use docs_harvest::remote::{HttpBackend, UreqBackend};
use docs_harvest::types::ReleaseManifest;
use docs_harvest::{config, output, pipeline};
use std::error::Error;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Shared flags for commands that download archives.
#[derive(clap::Args, Clone)]
struct CacheArgs {
    /// Disable the archive cache and download every release again
    #[arg(long)]
    no_cache: bool,
}

#[derive(Parser)]
#[command(name = "docs-harvest")]
#[command(about = "Build a versioned documentation corpus from tagged releases")]
#[command(long_about = "\
Build a versioned documentation corpus from tagged releases

Each vMAJOR.MINOR.x line at or above the release floor is published under
its own route, next to a `latest` alias and the trunk branch:

  site/
  ├── content/docs/
  │   ├── latest/                  # Copy of the newest stable line
  │   ├── master/                  # Trunk, re-downloaded on every run
  │   ├── v4.2.x/
  │   │   ├── index.md             # Frontmatter + rewritten markdown
  │   │   └── Guides/
  │   └── v3.29.x/
  └── data/
      ├── docs.yml                 # versions, toc, releases
      └── ecosystem.yml            # Plugin registry from the trunk

Set GH_NAME and GH_TOKEN to authenticate against the release API.
Run 'docs-harvest gen-config' to generate a documented harvest.toml.")]
#[command(version)]
struct Cli {
    /// Configuration file (stock defaults when absent)
    #[arg(long, default_value = "harvest.toml", global = true)]
    config: PathBuf,

    /// Output directory
    #[arg(long, default_value = "site", global = true)]
    output: PathBuf,

    /// Directory for intermediate files (manifest, extracted archives)
    #[arg(long, default_value = ".docs-harvest-temp", global = true)]
    temp_dir: PathBuf,

    /// Log progress at info level (otherwise RUST_LOG, default warn)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve the release feed into a manifest
    Resolve,
    /// Download and extract the archives of a resolved manifest
    Fetch(CacheArgs),
    /// Run the full pipeline: resolve → fetch → extract → emit
    Build(CacheArgs),
    /// Print a stock harvest.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Resolve => {
            let config = config::load_config(&cli.config)?;
            let backend = UreqBackend::from_env(&config);
            let outcome = pipeline::resolve_stage(&config, &backend, &cli.temp_dir)?;
            output::print_resolve_output(&outcome);
        }
        Command::Fetch(cache_args) => {
            let config = config::load_config(&cli.config)?;
            init_thread_pool(&config.processing);
            let backend = UreqBackend::from_env(&config);
            let manifest = pipeline::load_manifest(&cli.temp_dir)?;
            let result = fetch_with_progress(
                &config,
                &manifest,
                &backend,
                &cli.temp_dir,
                !cache_args.no_cache,
            )?;
            println!("Cache: {}", result.cache_stats);
        }
        Command::Build(cache_args) => {
            let config = config::load_config(&cli.config)?;
            init_thread_pool(&config.processing);
            let backend = UreqBackend::from_env(&config);

            println!(
                "==> Stage 1: Resolving releases of {}/{}",
                config.repository.owner, config.repository.name
            );
            let outcome = pipeline::resolve_stage(&config, &backend, &cli.temp_dir)?;
            output::print_resolve_output(&outcome);

            println!("==> Stage 2: Fetching archives");
            let fetched = fetch_with_progress(
                &config,
                &outcome.manifest,
                &backend,
                &cli.temp_dir,
                !cache_args.no_cache,
            )?;
            println!("Cache: {}", fetched.cache_stats);

            println!("==> Stage 3: Building docs → {}", cli.output.display());
            let report =
                pipeline::build_stage(&config, &outcome.manifest, &fetched.staged, &cli.output)?;
            output::print_build_output(&report);

            if !report.failed.is_empty() {
                return Err(format!("{} release(s) failed to build", report.failed.len()).into());
            }
            println!("==> Build complete: {}", cli.output.display());
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Run the fetch stage with a printer thread draining progress events.
fn fetch_with_progress(
    config: &config::HarvestConfig,
    manifest: &ReleaseManifest,
    backend: &dyn HttpBackend,
    temp_dir: &Path,
    use_cache: bool,
) -> Result<FetchResult, Box<dyn Error>> {
    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_fetch_event(&event) {
                println!("{}", line);
            }
        }
    });
    let result = pipeline::fetch_stage(config, manifest, backend, temp_dir, use_cache, Some(tx));
    printer
        .join()
        .map_err(|_| "progress printer thread panicked")?;
    Ok(result?)
}

/// Initialize the global rayon pool used for extraction and emission.
///
/// Caps at the number of available CPU cores: user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
