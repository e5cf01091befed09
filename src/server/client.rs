use anyhow::{Context, Result};
use tera::{Context as TeraContext, Tera};

use crate::languages::{TargetLanguage, supported_names};

const CLIENT_TEMPLATE: &str = include_str!("templates/client.html.tera");

pub(crate) fn render_client_html(default_lang: TargetLanguage) -> Result<String> {
    let mut context = TeraContext::new();
    context.insert("languages", &supported_names());
    context.insert("default_lang", default_lang.name());
    Tera::one_off(CLIENT_TEMPLATE, &context, true)
        .with_context(|| "failed to render client template")
}
