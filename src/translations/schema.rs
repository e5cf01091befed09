use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::overlay::BoundingBox;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslatedBlock {
    pub original_text: String,
    pub translated_text: String,
    pub bounding_box: BoundingBox,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationResult {
    pub translation_blocks: Vec<TranslatedBlock>,
    pub formatted_translation: String,
}

/// Why a model response was rejected. `path` points at the offending field,
/// e.g. `translationBlocks[2].boundingBox.width`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("response must be a JSON object")]
    NotAnObject,
    #[error("`{path}` is missing")]
    Missing { path: String },
    #[error("`{path}` must be {expected}")]
    WrongType {
        path: String,
        expected: &'static str,
    },
}

impl ValidationError {
    pub fn path(&self) -> Option<&str> {
        match self {
            ValidationError::NotAnObject => None,
            ValidationError::Missing { path } | ValidationError::WrongType { path, .. } => {
                Some(path)
            }
        }
    }
}

pub fn validate_response(value: &Value) -> Result<TranslationResult, ValidationError> {
    let root = value.as_object().ok_or(ValidationError::NotAnObject)?;

    let blocks = require(root, "translationBlocks", "")?
        .as_array()
        .ok_or_else(|| wrong_type("translationBlocks", "an array"))?;
    let formatted_translation = require_string(root, "formattedTranslation", "")?;

    let translation_blocks = blocks
        .iter()
        .enumerate()
        .map(|(index, block)| validate_block(block, &format!("translationBlocks[{}]", index)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TranslationResult {
        translation_blocks,
        formatted_translation,
    })
}

fn validate_block(value: &Value, path: &str) -> Result<TranslatedBlock, ValidationError> {
    let block = value
        .as_object()
        .ok_or_else(|| wrong_type(path, "an object"))?;
    let original_text = require_string(block, "originalText", path)?;
    let translated_text = require_string(block, "translatedText", path)?;

    let bbox_path = join(path, "boundingBox");
    let bbox = require(block, "boundingBox", path)?
        .as_object()
        .ok_or_else(|| wrong_type(&bbox_path, "an object"))?;
    let bounding_box = BoundingBox {
        x: require_number(bbox, "x", &bbox_path)?,
        y: require_number(bbox, "y", &bbox_path)?,
        width: require_number(bbox, "width", &bbox_path)?,
        height: require_number(bbox, "height", &bbox_path)?,
    };

    Ok(TranslatedBlock {
        original_text,
        translated_text,
        bounding_box,
    })
}

fn require<'a>(
    object: &'a Map<String, Value>,
    key: &str,
    parent: &str,
) -> Result<&'a Value, ValidationError> {
    match object.get(key) {
        Some(Value::Null) | None => Err(ValidationError::Missing {
            path: join(parent, key),
        }),
        Some(value) => Ok(value),
    }
}

fn require_string(
    object: &Map<String, Value>,
    key: &str,
    parent: &str,
) -> Result<String, ValidationError> {
    require(object, key, parent)?
        .as_str()
        .map(|value| value.to_string())
        .ok_or_else(|| wrong_type(&join(parent, key), "a string"))
}

fn require_number(
    object: &Map<String, Value>,
    key: &str,
    parent: &str,
) -> Result<f32, ValidationError> {
    require(object, key, parent)?
        .as_f64()
        .filter(|value| value.is_finite())
        .map(|value| value as f32)
        .ok_or_else(|| wrong_type(&join(parent, key), "a number"))
}

fn wrong_type(path: &str, expected: &'static str) -> ValidationError {
    ValidationError::WrongType {
        path: path.to_string(),
        expected,
    }
}

fn join(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

/// Turns literal `\n` escape sequences left in model output into line breaks.
pub fn normalize_formatted(text: &str) -> String {
    text.replace("\\n", "\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid() -> Value {
        json!({
            "translationBlocks": [
                {
                    "originalText": "Sortie",
                    "translatedText": "Exit",
                    "boundingBox": {"x": 10, "y": 12.5, "width": 30, "height": 8}
                }
            ],
            "formattedTranslation": "# Exit\\nThis way"
        })
    }

    #[test]
    fn accepts_well_formed_response() {
        let result = validate_response(&valid()).unwrap();
        assert_eq!(result.translation_blocks.len(), 1);
        let block = &result.translation_blocks[0];
        assert_eq!(block.translated_text, "Exit");
        assert_eq!(block.bounding_box, BoundingBox::new(10.0, 12.5, 30.0, 8.0));
    }

    #[test]
    fn empty_block_list_is_valid() {
        let value = json!({"translationBlocks": [], "formattedTranslation": ""});
        let result = validate_response(&value).unwrap();
        assert!(result.translation_blocks.is_empty());
    }

    #[test]
    fn rejects_non_object() {
        assert_eq!(
            validate_response(&json!(["nope"])).unwrap_err(),
            ValidationError::NotAnObject
        );
        assert_eq!(
            validate_response(&json!("text")).unwrap_err(),
            ValidationError::NotAnObject
        );
    }

    #[test]
    fn rejects_missing_formatted_translation() {
        let mut value = valid();
        value.as_object_mut().unwrap().remove("formattedTranslation");
        let err = validate_response(&value).unwrap_err();
        assert_eq!(err.path(), Some("formattedTranslation"));
        assert_eq!(err.to_string(), "`formattedTranslation` is missing");
    }

    #[test]
    fn rejects_blocks_that_are_not_an_array() {
        let mut value = valid();
        value["translationBlocks"] = json!({"0": {}});
        let err = validate_response(&value).unwrap_err();
        assert_eq!(err.to_string(), "`translationBlocks` must be an array");
    }

    #[test]
    fn rejects_incomplete_bounding_box() {
        let mut value = valid();
        value["translationBlocks"][0]["boundingBox"]
            .as_object_mut()
            .unwrap()
            .remove("height");
        let err = validate_response(&value).unwrap_err();
        assert_eq!(err.path(), Some("translationBlocks[0].boundingBox.height"));
    }

    #[test]
    fn rejects_non_numeric_coordinates_without_coercion() {
        let mut value = valid();
        value["translationBlocks"][0]["boundingBox"]["x"] = json!("10");
        let err = validate_response(&value).unwrap_err();
        assert_eq!(
            err,
            ValidationError::WrongType {
                path: "translationBlocks[0].boundingBox.x".to_string(),
                expected: "a number",
            }
        );
    }

    #[test]
    fn rejects_missing_text_fields() {
        let mut value = valid();
        value["translationBlocks"][0]
            .as_object_mut()
            .unwrap()
            .remove("originalText");
        let err = validate_response(&value).unwrap_err();
        assert_eq!(err.path(), Some("translationBlocks[0].originalText"));

        let mut value = valid();
        value["translationBlocks"][0]["translatedText"] = json!(null);
        let err = validate_response(&value).unwrap_err();
        assert_eq!(err.path(), Some("translationBlocks[0].translatedText"));
    }

    #[test]
    fn normalizes_escaped_newlines() {
        assert_eq!(normalize_formatted("a\\nb\\n\\nc"), "a\nb\n\nc");
        assert_eq!(normalize_formatted("already\nfine"), "already\nfine");
    }
}
