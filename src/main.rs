use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::warn;

use image_translator_rust::{Config, overlay, settings};

#[derive(Parser, Debug)]
#[command(
    name = "image-translator-rust",
    version,
    about = "Translate the text in an image or PDF with a multimodal LLM and burn it back in"
)]
struct Cli {
    /// Image or PDF to translate
    #[arg(short = 'd', long = "data", required_unless_present_any = ["server", "show_languages"])]
    data: Option<PathBuf>,

    /// Mime type for --data (auto, image/*, png, jpeg, pdf)
    #[arg(short = 'M', long = "data-mime")]
    data_mime: Option<String>,

    /// Target language name or code (default from settings, else English)
    #[arg(short = 'l', long = "lang")]
    lang: Option<String>,

    /// Model name or provider:model (e.g. openai:MODEL_ID)
    #[arg(short = 'm', long = "model")]
    model: Option<String>,

    /// API key (overrides environment variables)
    #[arg(short = 'k', long = "key")]
    key: Option<String>,

    /// Directory for the overlay page and translated image (default: next to the input)
    #[arg(short = 'o', long = "out-dir")]
    out_dir: Option<PathBuf>,

    /// Do not write the translated PNG
    #[arg(long = "no-export")]
    no_export: bool,

    /// Do not write the HTML overlay page
    #[arg(long = "no-page")]
    no_page: bool,

    /// Reuse a saved translation result instead of calling the model
    #[arg(long = "from-result")]
    from_result: Option<PathBuf>,

    /// Save the validated translation result as JSON
    #[arg(long = "save-result")]
    save_result: Option<PathBuf>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<PathBuf>,

    /// Start the web UI on the given address (e.g. 127.0.0.1:8787)
    #[arg(long = "server")]
    server: Option<String>,

    /// Show the supported target languages and exit
    #[arg(long = "show-languages")]
    show_languages: bool,

    /// Append token usage to output
    #[arg(long = "with-using-tokens")]
    with_using_tokens: bool,

    /// Append model name to output
    #[arg(long = "with-using-model")]
    with_using_model: bool,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    image_translator_rust::logging::init(cli.verbose)?;

    let settings = settings::load_settings(cli.read_settings.as_deref())
        .with_context(|| "failed to load settings")?;

    if let Some(addr) = cli.server {
        let font = match overlay::resolve_font(
            settings.font_path.as_deref().map(std::path::Path::new),
            settings.font_family.as_deref(),
        ) {
            Ok(font) => Some(font),
            Err(err) => {
                warn!("falling back to estimated text metrics: {:#}", err);
                None
            }
        };
        return image_translator_rust::server::run_server(settings, font, addr).await;
    }

    let config = Config {
        data: cli.data,
        data_mime: cli.data_mime,
        lang: cli.lang,
        model: cli.model,
        key: cli.key,
        out_dir: cli.out_dir,
        no_export: cli.no_export,
        no_page: cli.no_page,
        settings_path: cli.read_settings,
        show_languages: cli.show_languages,
        with_using_tokens: cli.with_using_tokens,
        with_using_model: cli.with_using_model,
        from_result: cli.from_result,
        save_result: cli.save_result,
    };
    let output = image_translator_rust::run_with_settings(config, settings).await?;
    println!("{}", output);
    Ok(())
}
