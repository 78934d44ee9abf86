use clap::{Parser, Subcommand};
use picture_pipe::config::{self, DEFAULT_CONFIG_FILE, PipelineConfig};
use picture_pipe::pipeline::Pipeline;
use picture_pipe::{imaging, output};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "picture-pipe")]
#[command(about = "Rewrite HTML images into responsive <picture> markup with blurred placeholders")]
#[command(long_about = "\
Rewrite HTML images into responsive <picture> markup with blurred placeholders

Each HTML document is parsed, run through the configured transformers in
order, and written back:

  srcset          <img src=\"photo.jpg\">  →  <picture> with one <source> per format,
                  listing photo@720w.webp, photo@360w.webp, ... (widths probed
                  from the image file; variants must already exist)
  srcset-augment  <img srcset=\"photo.jpg 800w\">  →  adds a <picture> next to it
  lqip            wraps images in a container showing a tiny blurred preview
                  until the real image has loaded

Configuration is read from picture-pipe.toml in the working directory, or
from --config. Run 'picture-pipe gen-config' to generate a documented one.")]
#[command(version)]
struct Cli {
    /// Config file (default: picture-pipe.toml, if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct RewriteArgs {
    /// HTML files or directories (searched recursively for *.html and *.htm)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Write results under this directory instead of in place
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the pipeline over HTML files
    Rewrite(RewriteArgs),
    /// Validate the config and show the pipeline without touching any file
    Check,
    /// Print a stock config with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Rewrite(args) => {
            let config = load_config(cli.config.as_deref())?;
            init_thread_pool(&config.processing);
            let pipeline = Pipeline::from_config(&config, imaging::default_backend())?;

            let documents = collect_documents(&args.inputs, args.output.as_deref())?;

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    output::print_pipeline_event(&event);
                }
            });
            let results = pipeline.rewrite_files(&documents, Some(tx));
            printer.join().map_err(|_| "output thread panicked")?;

            let failed = results.iter().filter(|r| r.is_err()).count();
            let rewritten = results.len() - failed;

            println!();
            println!("{}", output::format_rewrite_totals(rewritten, failed));
            if failed > 0 {
                std::process::exit(1);
            }
        }
        Command::Check => {
            let config = load_config(cli.config.as_deref())?;
            let pipeline = Pipeline::from_config(&config, imaging::default_backend())?;
            output::print_pipeline_steps(&pipeline.steps());
            if imaging::default_backend().is_none() {
                println!("==> Built without image support: srcset and lqip will skip every image");
            }
            println!("==> Config is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load `--config`, or `picture-pipe.toml` from the working directory when it
/// exists, or stock defaults.
fn load_config(path: Option<&Path>) -> Result<PipelineConfig, config::ConfigError> {
    match path {
        Some(path) => config::load_config(Some(path)),
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            config::load_config(default.exists().then_some(default))
        }
    }
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores: users can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// Expand inputs into `(source, target)` pairs.
///
/// Directories are walked for HTML files. With `output`, targets mirror each
/// file's path relative to its input; otherwise files are rewritten in place.
fn collect_documents(
    inputs: &[PathBuf],
    output: Option<&Path>,
) -> Result<Vec<(PathBuf, PathBuf)>, walkdir::Error> {
    let mut documents = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in WalkDir::new(input).sort_by_file_name() {
                let entry = entry?;
                if entry.file_type().is_file() && is_html(entry.path()) {
                    let relative = entry.path().strip_prefix(input).unwrap_or(entry.path());
                    let source = entry.path().to_path_buf();
                    documents.push((source.clone(), target(&source, relative, output)));
                }
            }
        } else {
            let relative = input.file_name().map(Path::new).unwrap_or(input);
            documents.push((input.clone(), target(input, relative, output)));
        }
    }
    Ok(documents)
}

fn target(source: &Path, relative: &Path, output: Option<&Path>) -> PathBuf {
    match output {
        Some(dir) => dir.join(relative),
        None => source.to_path_buf(),
    }
}

fn is_html(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"))
}
