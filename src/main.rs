use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use web_album::album::collect_sources;
use web_album::exporter::WebExporter;
use web_album::imaging::RustLoader;
use web_album::template::Document;
use web_album::theme::{
    IMAGE_TEMPLATE, INDEX_TEMPLATE, THUMBNAIL_TEMPLATE, ThemeError, TreeParser, find_theme_dir,
    parse_template, read_settings,
};
use web_album::{config, output};

#[derive(Parser)]
#[command(name = "web-album")]
#[command(about = "Export photos as a static web album rendered through a theme")]
#[command(long_about = "\
Export photos as a static web album rendered through a theme

A theme is a directory with three templates and any static files they use:

  themes/classic/
  ├── index.gthtml        # index pages (thumbnail grid)
  ├── thumbnail.gthtml    # one grid cell
  ├── image.gthtml        # one page per image
  └── style.css           # copied into the album

Missing templates fall back to built-in defaults.

Album layout:

  album/
  ├── index.html          # first index page, then html/page002.html ...
  ├── html/               # one page per image
  ├── thumbnails/
  ├── previews/
  ├── images/             # only with images.copy_originals
  └── theme/

Run 'web-album gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Increase log output (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Export images into a web album
    Export {
        /// Config file
        #[arg(long, default_value = "config.toml")]
        config: PathBuf,

        /// Theme name or directory (overrides the config)
        #[arg(long)]
        theme: Option<String>,

        /// Album directory
        #[arg(long, short, default_value = "album")]
        output: PathBuf,

        /// Image files or directories
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Parse a theme's templates and print their tag trees
    CheckTheme {
        /// Theme directory
        theme: PathBuf,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Export {
            config: config_path,
            theme,
            output: destination,
            inputs,
        } => {
            let config = config::load_config(&config_path)?;
            let theme = theme.unwrap_or_else(|| config.theme.clone());
            let theme_dir = find_theme_dir(&theme, &config.theme_search_path)?;
            let sources = collect_sources(&inputs)?;
            println!(
                "==> Exporting {} images with {} → {}",
                sources.len(),
                theme_dir.display(),
                destination.display()
            );

            let options = config.export_options(destination, theme_dir);
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_export_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let mut exporter =
                WebExporter::new(RustLoader::new(), TreeParser, sources, options).with_events(tx);
            let result = exporter.run();
            // The exporter owns the sender; dropping it ends the printer loop.
            drop(exporter);
            printer.join().ok();
            output::print_export_report(&result?);
        }
        Command::CheckTheme { theme } => {
            check_theme(&theme)?;
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Log level from `-v` flags, unless `RUST_LOG` is set.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn check_theme(dir: &Path) -> Result<(), ThemeError> {
    if !dir.is_dir() {
        return Err(ThemeError::NotFound(dir.display().to_string()));
    }
    println!("==> Checking theme {}", dir.display());

    let defaults: [(&str, fn() -> Document); 3] = [
        (INDEX_TEMPLATE, Document::default_index),
        (THUMBNAIL_TEMPLATE, Document::default_thumbnail),
        (IMAGE_TEMPLATE, Document::default_image),
    ];
    for (name, default) in defaults {
        let path = dir.join(name);
        match parse_template(&TreeParser, &path) {
            Ok(document) => {
                output::print_outline(name, &document);
                if name == INDEX_TEMPLATE {
                    let settings = read_settings(&document);
                    for (label, size) in [
                        ("thumbnail size", settings.thumbnail),
                        ("preview size", settings.preview_max),
                        ("preview minimum", settings.preview_min),
                    ] {
                        if let Some(size) = size {
                            println!("    => {label} {}x{}", size.width, size.height);
                        }
                    }
                }
            }
            Err(e) => {
                for line in output::format_template_error(name, &path, &e) {
                    println!("{line}");
                }
                output::print_outline("built-in default", &default());
            }
        }
    }
    println!("==> Theme checked");
    Ok(())
}
