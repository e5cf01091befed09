use axum::http::StatusCode;
use tracing::{info, warn};

use super::models::{ExportRequest, ExportResponse, TranslateRequest, TranslateResponse};
use super::state::ServerState;
use crate::data::{self, DataAttachment};
use crate::languages::TargetLanguage;
use crate::overlay::{self, ExportStyle};
use crate::providers::{self, Provider};
use crate::translations::{TranslateOptions, validate_response};
use crate::translator::Translator;

#[derive(Debug)]
pub(crate) struct ServerError {
    pub(crate) status: StatusCode,
    pub(crate) message: String,
}

impl ServerError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn busy(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: message.into(),
        }
    }

    fn upstream(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(err: anyhow::Error) -> Self {
        ServerError::internal(format!("{:#}", err))
    }
}

pub(crate) async fn translate_request(
    state: &ServerState,
    request: TranslateRequest,
) -> Result<TranslateResponse, ServerError> {
    let data = decode_upload(
        request.data_base64.as_deref(),
        request.data_mime.as_deref(),
        request.data_name.as_deref(),
    )?;
    let target = resolve_target(request.lang.as_deref(), state)?;

    let selection =
        providers::resolve_provider_selection(request.model.as_deref(), request.key.as_deref())
            .map_err(|err| ServerError::bad_request(err.to_string()))?;
    let key = providers::resolve_key(selection.provider, request.key.as_deref())
        .map_err(|err| ServerError::bad_request(err.to_string()))?;
    let provider = providers::build_provider(selection.provider, key, selection.model());

    run_translation(state, provider, data, target).await
}

/// Runs one translation while holding the in-flight flag. A second request
/// arriving meanwhile is refused rather than queued.
pub(crate) async fn run_translation<P: Provider>(
    state: &ServerState,
    provider: P,
    data: DataAttachment,
    target: TargetLanguage,
) -> Result<TranslateResponse, ServerError> {
    let _guard = state
        .translating
        .try_acquire()
        .ok_or_else(|| ServerError::busy("a translation is already in progress"))?;

    let title = data.name.clone().unwrap_or_else(|| "translation".to_string());
    let (data, source) = tokio::task::spawn_blocking(move || {
        let source = overlay::load_source(&data);
        (data, source)
    })
    .await
    .map_err(|err| ServerError::internal(format!("preview task failed: {}", err)))?;
    let source = source.map_err(|err| ServerError::bad_request(format!("{:#}", err)))?;

    let output = Translator::new(provider)
        .exec(data, &TranslateOptions { target })
        .await
        .map_err(|err| {
            warn!("translation failed: {:#}", err);
            ServerError::upstream(format!("{:#}", err))
        })?;

    let params = state.settings.overlay_params();
    let overlay_html =
        overlay::render_overlay_page(source.as_ref(), &output.result, &params, &title)?;
    let regions = overlay::build_regions(&output.result.translation_blocks, &params);
    info!(blocks = regions.len(), "translation served");

    Ok(TranslateResponse {
        result: output.result,
        regions,
        overlay_html,
        model: output.model,
        usage: output.usage,
    })
}

pub(crate) async fn export_request(
    state: &ServerState,
    request: ExportRequest,
) -> Result<ExportResponse, ServerError> {
    let _guard = state
        .exporting
        .try_acquire()
        .ok_or_else(|| ServerError::busy("an export is already in progress"))?;

    let data = decode_upload(
        Some(&request.data_base64),
        request.data_mime.as_deref(),
        request.data_name.as_deref(),
    )?;
    let result = validate_response(&request.result)
        .map_err(|err| ServerError::bad_request(format!("invalid translation result: {}", err)))?;

    let style = ExportStyle::from_settings(&state.settings);
    let font = state.font.clone();
    let exported = tokio::task::spawn_blocking(move || {
        let source = overlay::load_source(&data)?.ok_or_else(|| {
            anyhow::anyhow!("no preview image for this PDF (install mutool or pdftoppm)")
        })?;
        overlay::export_png(
            &source,
            &result.translation_blocks,
            font.as_deref(),
            &style,
            data.name.as_deref(),
        )
    })
    .await
    .map_err(|err| ServerError::internal(format!("export task failed: {}", err)))??;

    Ok(ExportResponse {
        file_name: exported.file_name,
        png: exported.png,
        report: exported.report,
    })
}

fn decode_upload(
    encoded: Option<&str>,
    mime: Option<&str>,
    name: Option<&str>,
) -> Result<DataAttachment, ServerError> {
    let encoded = encoded
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ServerError::bad_request("data_base64 is required"))?;
    let bytes =
        data::decode_base64(encoded).map_err(|err| ServerError::bad_request(err.to_string()))?;
    data::attachment_from_bytes(bytes, mime, name)
        .map_err(|err| ServerError::bad_request(err.to_string()))
}

fn resolve_target(lang: Option<&str>, state: &ServerState) -> Result<TargetLanguage, ServerError> {
    let lang = lang
        .filter(|value| !value.trim().is_empty())
        .or(state.settings.default_language.as_deref());
    match lang {
        Some(value) => value
            .parse::<TargetLanguage>()
            .map_err(|err| ServerError::bad_request(err.to_string())),
        None => Ok(TargetLanguage::English),
    }
}
