use anyhow::{Context, Result};
use serde_json::{Value, json};
use tera::{Context as TeraContext, Tera};

use crate::data::DataInfo;
use crate::languages::TargetLanguage;
use crate::providers::ToolSpec;

mod schema;

pub use schema::{
    TranslatedBlock, TranslationResult, ValidationError, normalize_formatted, validate_response,
};

pub const TOOL_NAME: &str = "deliver_image_translation";

const SYSTEM_PROMPT_TEMPLATE: &str = include_str!("prompts/system_prompt.tera");

#[derive(Debug, Clone)]
pub struct TranslateOptions {
    pub target: TargetLanguage,
}

pub fn tool_spec(tool_name: &str) -> ToolSpec {
    let bounding_box = json!({
        "type": "object",
        "description": "Block location in percent (0-100) of the image width/height.",
        "properties": {
            "x": {"type": "number"},
            "y": {"type": "number"},
            "width": {"type": "number"},
            "height": {"type": "number"}
        },
        "required": ["x", "y", "width", "height"]
    });
    let parameters = json!({
        "type": "object",
        "properties": {
            "translationBlocks": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "originalText": {"type": "string"},
                        "translatedText": {"type": "string"},
                        "boundingBox": bounding_box
                    },
                    "required": ["originalText", "translatedText", "boundingBox"]
                }
            },
            "formattedTranslation": {"type": "string"}
        },
        "required": ["translationBlocks", "formattedTranslation"]
    });

    ToolSpec {
        name: tool_name.to_string(),
        description: "Return every detected text block with its translation and location, plus the formatted translation."
            .to_string(),
        parameters,
    }
}

pub fn render_system_prompt(
    options: &TranslateOptions,
    tool_name: &str,
    data: Option<&DataInfo>,
) -> Result<String> {
    let is_pdf = data
        .map(|info| info.mime == crate::data::PDF_MIME)
        .unwrap_or(false);
    let mut context = TeraContext::new();
    context.insert("target_lang", options.target.name());
    context.insert("tool_name", tool_name);
    context.insert("is_pdf", &is_pdf);
    context.insert("document_kind", if is_pdf { "document" } else { "image" });
    context.insert("file_name", &data.and_then(|info| info.name.clone()));

    Tera::one_off(SYSTEM_PROMPT_TEMPLATE, &context, false)
        .with_context(|| "failed to render system prompt")
}

pub fn user_instruction(options: &TranslateOptions) -> String {
    format!(
        "Extract and translate all text in the attached file into {}.",
        options.target.name()
    )
}

/// Validates tool arguments returned by the model.
pub fn parse_tool_args(value: Value) -> Result<TranslationResult> {
    let result = validate_response(&value).with_context(|| "malformed translation response")?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_names_target_language_and_tool() {
        let options = TranslateOptions {
            target: TargetLanguage::Japanese,
        };
        let prompt = render_system_prompt(&options, TOOL_NAME, None).unwrap();
        assert!(prompt.contains("translate it into Japanese"));
        assert!(prompt.contains("\"deliver_image_translation\""));
        assert!(!prompt.contains("first page"));
    }

    #[test]
    fn pdf_prompt_mentions_first_page() {
        let options = TranslateOptions {
            target: TargetLanguage::German,
        };
        let info = DataInfo {
            mime: crate::data::PDF_MIME.to_string(),
            name: Some("menu.pdf".to_string()),
        };
        let prompt = render_system_prompt(&options, TOOL_NAME, Some(&info)).unwrap();
        assert!(prompt.contains("first page"));
        assert!(prompt.contains("(\"menu.pdf\")"));
    }

    #[test]
    fn schema_requires_both_top_level_fields() {
        let spec = tool_spec(TOOL_NAME);
        assert_eq!(
            spec.parameters["required"],
            json!(["translationBlocks", "formattedTranslation"])
        );
    }

    #[test]
    fn parse_reports_validation_path() {
        let err = parse_tool_args(json!({"translationBlocks": []})).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("malformed translation response"));
        assert!(message.contains("formattedTranslation"));
        assert!(err.downcast_ref::<ValidationError>().is_some());
    }
}
