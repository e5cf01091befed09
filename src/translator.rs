use anyhow::Result;
use tracing::{debug, info};

use crate::data::{self, DataAttachment};
use crate::providers::{Provider, ProviderUsage};
use crate::translations::{
    self, TOOL_NAME, TranslateOptions, TranslationResult, normalize_formatted, tool_spec,
};

#[derive(Debug, Clone)]
pub struct Translator<P: Provider> {
    provider: P,
}

#[derive(Debug, Clone)]
pub struct ExecutionOutput {
    pub result: TranslationResult,
    pub model: Option<String>,
    pub usage: Option<ProviderUsage>,
}

impl<P: Provider> Translator<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Sends one file to the model and returns the validated blocks. The
    /// formatted translation comes back with literal `\n` already expanded.
    pub async fn exec(
        &self,
        data: DataAttachment,
        options: &TranslateOptions,
    ) -> Result<ExecutionOutput> {
        data::ensure_accepted(&data.mime)?;

        let info = data.info();
        let system_prompt = translations::render_system_prompt(options, TOOL_NAME, Some(&info))?;
        info!(
            mime = %info.mime,
            bytes = data.bytes.len(),
            target = options.target.name(),
            "requesting translation"
        );

        let response = self
            .provider
            .clone()
            .register_tool(tool_spec(TOOL_NAME))
            .append_system_input(system_prompt)
            .append_user_data(data)
            .append_user_input(translations::user_instruction(options))
            .call_tool(TOOL_NAME)
            .await?;

        let mut result = translations::parse_tool_args(response.args)?;
        result.formatted_translation = normalize_formatted(&result.formatted_translation);
        debug!(
            blocks = result.translation_blocks.len(),
            model = response.model.as_deref().unwrap_or("unknown"),
            "translation received"
        );

        Ok(ExecutionOutput {
            result,
            model: response.model,
            usage: response.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{PNG_MIME, TEXT_MIME, UploadError};
    use crate::languages::TargetLanguage;
    use crate::providers::{ProviderFuture, ProviderResponse, ToolSpec};
    use crate::translations::ValidationError;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone)]
    struct StubProvider {
        args: Value,
        calls: Arc<AtomicUsize>,
        system: Vec<String>,
        tools: Vec<String>,
    }

    impl StubProvider {
        fn new(args: Value) -> Self {
            Self {
                args,
                calls: Arc::new(AtomicUsize::new(0)),
                system: Vec::new(),
                tools: Vec::new(),
            }
        }
    }

    impl Provider for StubProvider {
        fn append_system_input(mut self, input: String) -> Self {
            self.system.push(input);
            self
        }

        fn append_user_input(self, _input: String) -> Self {
            self
        }

        fn append_user_data(self, _data: DataAttachment) -> Self {
            self
        }

        fn register_tool(mut self, tool: ToolSpec) -> Self {
            self.tools.push(tool.name);
            self
        }

        fn call_tool(self, tool_name: &str) -> ProviderFuture {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(self.tools, vec![tool_name.to_string()]);
            assert!(self.system[0].contains("French"));
            let args = self.args.clone();
            Box::pin(async move {
                Ok(ProviderResponse {
                    args,
                    model: Some("stub-model".to_string()),
                    usage: None,
                })
            })
        }
    }

    fn png() -> DataAttachment {
        DataAttachment {
            bytes: vec![0x89, b'P', b'N', b'G'],
            mime: PNG_MIME.to_string(),
            name: Some("sign.png".to_string()),
        }
    }

    fn french() -> TranslateOptions {
        TranslateOptions {
            target: TargetLanguage::French,
        }
    }

    #[tokio::test]
    async fn returns_validated_blocks_with_normalized_text() {
        let provider = StubProvider::new(json!({
            "translationBlocks": [{
                "originalText": "Exit",
                "translatedText": "Sortie",
                "boundingBox": {"x": 10, "y": 20, "width": 30, "height": 5}
            }],
            "formattedTranslation": "Sortie\\npar ici"
        }));
        let calls = provider.calls.clone();
        let output = Translator::new(provider)
            .exec(png(), &french())
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(output.model.as_deref(), Some("stub-model"));
        assert_eq!(output.result.translation_blocks[0].translated_text, "Sortie");
        assert_eq!(output.result.formatted_translation, "Sortie\npar ici");
    }

    #[tokio::test]
    async fn rejects_unsupported_files_before_calling_the_model() {
        let provider = StubProvider::new(json!({}));
        let calls = provider.calls.clone();
        let data = DataAttachment {
            bytes: b"hello".to_vec(),
            mime: TEXT_MIME.to_string(),
            name: Some("notes.txt".to_string()),
        };
        let err = Translator::new(provider)
            .exec(data, &french())
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(matches!(
            err.downcast_ref::<UploadError>(),
            Some(UploadError::Unsupported { .. })
        ));
    }

    #[tokio::test]
    async fn malformed_response_fails_after_one_call() {
        let provider = StubProvider::new(json!({"translationBlocks": []}));
        let calls = provider.calls.clone();
        let err = Translator::new(provider)
            .exec(png(), &french())
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            err.downcast_ref::<ValidationError>().and_then(|e| e.path()),
            Some("formattedTranslation")
        );
    }
}
