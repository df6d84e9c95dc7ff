use clap::{Parser, Subcommand};
use plain_assets::bundler::EsbuildBundler;
use plain_assets::cache::{self, AssetCache, DirFetcher, DiskRegistry, document};
use plain_assets::{config, output, pipeline};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "plain-assets")]
#[command(about = "Content-addressed static assets for plain static sites")]
#[command(long_about = "\
Content-addressed static assets for plain static sites

Every stylesheet, script, font and image is renamed to carry a hash of its
contents (home.css → home.1a2b3c4d.css). Fonts and images are published to
the site, stylesheets and scripts are bundled with esbuild, and a manifest
maps each logical name to its current hashed name.

Project structure:

  project/
  ├── assets.toml                  # Optional config (see gen-config)
  ├── src/
  │   ├── stylesheets/home.css     # Bundled → docs/assets/stylesheets/home.<h>.css
  │   ├── javascripts/index.ts     # Bundled → docs/assets/javascripts/index.<h>.js
  │   ├── fonts/inter.woff2        # Published as-is, hashed
  │   └── images/hero/lake/        # lake_1280.webp, lake_1920.webp, ...
  └── docs/                        # The site
      └── assets/
          ├── manifest.json
          ├── hashTable.json
          └── hero.json

A second build over unchanged sources writes nothing but the manifests.

Run 'plain-assets gen-config' to generate a documented assets.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Project root (holds assets.toml)
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Directory for bundler metafiles, relative to the root
    #[arg(long, default_value = ".plain-assets-temp", global = true)]
    temp_dir: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Hash, publish and bundle all assets, then write the manifest (default)
    Build,
    /// Resolve the asset globs without changing anything
    Check,
    /// Print a stock assets.toml with all options documented
    GenConfig,
    /// Operate on the on-disk asset cache
    #[command(subcommand)]
    Cache(CacheCommand),
}

#[derive(Subcommand)]
enum CacheCommand {
    /// Drop old cache generations and fetch every asset a page references;
    /// images go to the hero image store
    Warm {
        /// HTML page, relative to the root
        #[arg(long)]
        page: PathBuf,
    },
    /// Delete cached entries whose hash the page no longer references
    Clean {
        /// HTML page, relative to the root
        #[arg(long)]
        page: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command.unwrap_or(Command::Build) {
        Command::Build => {
            // The bundler runs inside the root; keep every path it sees absolute.
            let root = cli.root.canonicalize()?;
            let config = config::load_config(&root)?;
            init_thread_pool(&config.processing);
            let bundler = EsbuildBundler::new(
                config.bundler.program.clone(),
                &root,
                root.join(&cli.temp_dir),
            );
            println!("==> Building assets in {}", root.display());
            let report = pipeline::build(&config, &root, &bundler)?;
            output::print_build_report(&report, &root);
            println!("==> Build complete");
        }
        Command::Check => {
            let config = config::load_config(&cli.root)?;
            println!("==> Checking {}", cli.root.display());
            let expanded = pipeline::check(&config, &cli.root)?;
            output::print_check_output(&expanded, &cli.root);
            println!("==> Asset globs are valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
        Command::Cache(command) => {
            let config = config::load_config(&cli.root)?;
            let site_root = cli.root.join(&config.site_root);
            let mut registry = DiskRegistry::new(cli.root.join(&config.cache.store_dir));
            match command {
                CacheCommand::Warm { page } => {
                    let html = std::fs::read_to_string(cli.root.join(&page))?;
                    let removed = cache::delete_old_caches(&mut registry, &config.cache.name)?;
                    let fetcher =
                        DirFetcher::new(&site_root).with_base(page_base(&cli.root, &page, &site_root));
                    let mut assets =
                        AssetCache::new(registry.open(&config.cache.name)?, fetcher.clone());
                    let mut images =
                        AssetCache::new(registry.open(&cache::image_store_name())?, fetcher);
                    let report =
                        cache::warm_page(&mut assets, &mut images, &document::references(&html));
                    output::print_warm_report(&report, &removed);
                }
                CacheCommand::Clean { page } => {
                    let html = std::fs::read_to_string(cli.root.join(&page))?;
                    let fetcher = DirFetcher::new(&site_root);
                    let mut cache = AssetCache::new(registry.open(&config.cache.name)?, fetcher);
                    let report = cache.clean_cache(&document::referenced_hashes(&html));
                    output::print_clean_report(&report);
                }
            }
        }
    }

    Ok(())
}

/// Log to stderr, filtered by `RUST_LOG` (default `info`).
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; config can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// Directory of the page relative to the site root, for resolving
/// relative URLs. Empty for pages outside the site.
fn page_base(root: &Path, page: &Path, site_root: &Path) -> PathBuf {
    root.join(page)
        .parent()
        .and_then(|dir| dir.strip_prefix(site_root).ok())
        .map(Path::to_path_buf)
        .unwrap_or_default()
}
