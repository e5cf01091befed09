use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub mod data;
pub mod languages;
pub mod logging;
pub mod overlay;
mod providers;
pub mod server;
pub mod settings;
#[cfg(test)]
mod test_util;
pub mod translations;
mod translator;

pub use languages::TargetLanguage;
pub use providers::{Claude, Gemini, OpenAI, Provider, ProviderKind, ProviderUsage};
pub use translations::{TranslateOptions, TranslatedBlock, TranslationResult};
pub use translator::{ExecutionOutput, Translator};

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub data: Option<PathBuf>,
    pub data_mime: Option<String>,
    pub lang: Option<String>,
    pub model: Option<String>,
    pub key: Option<String>,
    pub out_dir: Option<PathBuf>,
    pub no_export: bool,
    pub no_page: bool,
    pub settings_path: Option<PathBuf>,
    pub show_languages: bool,
    pub with_using_tokens: bool,
    pub with_using_model: bool,
    pub from_result: Option<PathBuf>,
    pub save_result: Option<PathBuf>,
}

pub async fn run(config: Config) -> Result<String> {
    let settings = settings::load_settings(config.settings_path.as_deref())?;
    run_with_settings(config, settings).await
}

/// Translates one file and writes the overlay page and translated PNG next
/// to it (or into `out_dir`). Returns the formatted translation.
pub async fn run_with_settings(config: Config, settings: settings::Settings) -> Result<String> {
    if config.show_languages {
        return Ok(format_languages());
    }

    let path = config
        .data
        .as_deref()
        .ok_or_else(|| anyhow!("--data is required"))?;
    let data = data::load_attachment(path, config.data_mime.as_deref())?;
    let target = resolve_target(config.lang.as_deref(), &settings)?;

    let execution = match config.from_result.as_deref() {
        Some(result_path) => ExecutionOutput {
            result: load_result(result_path)?,
            model: None,
            usage: None,
        },
        None => {
            let selection = providers::resolve_provider_selection(
                config.model.as_deref(),
                config.key.as_deref(),
            )?;
            let key = providers::resolve_key(selection.provider, config.key.as_deref())
                .with_context(|| "no API key found for selected provider")?;
            let provider =
                providers::build_provider(selection.provider, key, selection.model());
            Translator::new(provider)
                .exec(data.clone(), &TranslateOptions { target })
                .await?
        }
    };

    if let Some(save_path) = config.save_result.as_deref() {
        let json = serde_json::to_string_pretty(&execution.result)?;
        fs::write(save_path, json)
            .with_context(|| format!("failed to write result: {}", save_path.display()))?;
        info!("result saved to {}", save_path.display());
    }

    if !(config.no_page && config.no_export) {
        let out_dir = resolve_out_dir(config.out_dir.as_deref(), path);
        write_outputs(&config, &settings, &data, &execution.result, &out_dir)?;
    }

    Ok(format_execution_output(
        &execution,
        config.with_using_model,
        config.with_using_tokens,
    ))
}

pub fn resolve_target(lang: Option<&str>, settings: &settings::Settings) -> Result<TargetLanguage> {
    let lang = lang
        .filter(|value| !value.trim().is_empty())
        .or(settings.default_language.as_deref());
    match lang {
        Some(value) => value.parse(),
        None => Ok(TargetLanguage::English),
    }
}

/// Reads a previously saved result. It goes through the same validation as
/// a live model response.
fn load_result(path: &Path) -> Result<TranslationResult> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read result: {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse result: {}", path.display()))?;
    let mut result = translations::parse_tool_args(value)?;
    result.formatted_translation = translations::normalize_formatted(&result.formatted_translation);
    Ok(result)
}

fn resolve_out_dir(out_dir: Option<&Path>, input: &Path) -> PathBuf {
    if let Some(dir) = out_dir {
        return dir.to_path_buf();
    }
    input
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn write_outputs(
    config: &Config,
    settings: &settings::Settings,
    data: &data::DataAttachment,
    result: &TranslationResult,
    out_dir: &Path,
) -> Result<()> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create output dir: {}", out_dir.display()))?;
    let source = overlay::load_source(data)?;

    if !config.no_page {
        let title = data.name.as_deref().unwrap_or("translation");
        let html = overlay::render_overlay_page(
            source.as_ref(),
            result,
            &settings.overlay_params(),
            title,
        )?;
        let page_path = out_dir.join(page_filename(data.name.as_deref()));
        fs::write(&page_path, html)
            .with_context(|| format!("failed to write overlay page: {}", page_path.display()))?;
        info!("overlay page written to {}", page_path.display());
    }

    if !config.no_export {
        let source = source.ok_or_else(|| {
            anyhow!("cannot export: no preview image for this PDF (install mutool or pdftoppm)")
        })?;
        let font = match overlay::resolve_font(
            settings.font_path.as_deref().map(Path::new),
            settings.font_family.as_deref(),
        ) {
            Ok(font) => Some(font),
            Err(err) => {
                warn!("falling back to estimated text metrics: {:#}", err);
                None
            }
        };
        let exported = overlay::export_png(
            &source,
            &result.translation_blocks,
            font.as_ref(),
            &overlay::ExportStyle::from_settings(settings),
            data.name.as_deref(),
        )?;
        let png_path = out_dir.join(&exported.file_name);
        fs::write(&png_path, &exported.png)
            .with_context(|| format!("failed to write export: {}", png_path.display()))?;
        info!("translated image written to {}", png_path.display());
    }
    Ok(())
}

fn page_filename(original_name: Option<&str>) -> String {
    let stem = original_name
        .and_then(|name| Path::new(name).file_stem())
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.trim().is_empty())
        .unwrap_or("image");
    format!("{}_overlay.html", stem)
}

fn format_languages() -> String {
    TargetLanguage::ALL
        .iter()
        .map(|lang| format!("{}\t{}", lang.code(), lang.name()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_execution_output(
    execution: &ExecutionOutput,
    with_using_model: bool,
    with_using_tokens: bool,
) -> String {
    let mut output = execution.result.formatted_translation.clone();
    let mut meta_lines = Vec::new();

    if with_using_model {
        let model = execution.model.as_deref().unwrap_or("unavailable");
        meta_lines.push(format!("model: {}", model));
    }

    if with_using_tokens {
        meta_lines.push(format_usage(execution.usage.as_ref()));
    }

    if !meta_lines.is_empty() {
        output.push('\n');
        output.push_str(&meta_lines.join("\n"));
    }

    output
}

fn format_usage(usage: Option<&ProviderUsage>) -> String {
    let Some(usage) = usage else {
        return "tokens: unavailable".to_string();
    };
    let total = usage.total_tokens.or_else(|| {
        usage
            .prompt_tokens
            .zip(usage.completion_tokens)
            .map(|(prompt, completion)| prompt + completion)
    });

    let mut parts = Vec::new();
    if let Some(prompt) = usage.prompt_tokens {
        parts.push(format!("prompt={}", prompt));
    }
    if let Some(completion) = usage.completion_tokens {
        parts.push(format!("completion={}", completion));
    }
    if let Some(total) = total {
        parts.push(format!("total={}", total));
    }

    if parts.is_empty() {
        "tokens: unavailable".to_string()
    } else {
        format!("tokens: {}", parts.join(", "))
    }
}
