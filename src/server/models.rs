use serde::{Deserialize, Serialize};

use crate::overlay::{ExportReport, OverlayRegion};
use crate::providers::ProviderUsage;
use crate::translations::TranslationResult;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub(crate) struct TranslateRequest {
    pub(crate) data_base64: Option<String>,
    pub(crate) data_mime: Option<String>,
    pub(crate) data_name: Option<String>,
    pub(crate) lang: Option<String>,
    pub(crate) model: Option<String>,
    pub(crate) key: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TranslateResponse {
    #[serde(flatten)]
    pub(crate) result: TranslationResult,
    pub(crate) regions: Vec<OverlayRegion>,
    pub(crate) overlay_html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) usage: Option<ProviderUsage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExportRequest {
    pub(crate) data_base64: String,
    #[serde(default)]
    pub(crate) data_mime: Option<String>,
    #[serde(default)]
    pub(crate) data_name: Option<String>,
    pub(crate) result: serde_json::Value,
}

#[derive(Debug)]
pub(crate) struct ExportResponse {
    pub(crate) file_name: String,
    pub(crate) png: Vec<u8>,
    pub(crate) report: ExportReport,
}

#[derive(Debug, Serialize)]
pub(crate) struct LanguageOption {
    pub(crate) name: &'static str,
    pub(crate) code: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}
