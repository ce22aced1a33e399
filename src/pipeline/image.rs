//! Image inputs (PNG / JPEG).
//!
//! Without a vision model an image becomes a short Markdown stub: the image
//! reference plus its pixel dimensions. With `--describe-images` the image is
//! re-encoded as base64 PNG and sent to the configured vendor through
//! `edgequake-llm`; the returned description is appended under the stub.
//!
//! A caption failure never fails the conversion. The stub is still written
//! and the failure is logged.

use crate::config::AppConfig;
use crate::error::{ConfigError, ConversionError};
use crate::prompts::DESCRIBE_IMAGE_PROMPT;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use image::DynamicImage;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Build the vision provider used for `--describe-images`.
///
/// The provider reads its own API key from the environment
/// (`GEMINI_API_KEY` / `OPENAI_API_KEY`).
pub fn create_captioner(config: &AppConfig) -> Result<Arc<dyn LLMProvider>, ConfigError> {
    let provider = config.vendor.provider_name();
    let model = config.effective_model();
    info!("Vision captioning via {}/{}", provider, model);
    ProviderFactory::create_llm_provider(provider, model).map_err(|e| {
        ConfigError::Invalid(format!(
            "cannot create vision provider {provider}/{model}: {e}"
        ))
    })
}

/// Encode an image as base64 PNG for a vision request.
///
/// PNG keeps text in screenshots and mockups crisp; `detail: "high"` keeps
/// small labels legible to the model.
pub fn encode_image(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded image → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

/// Markdown stub for an image: reference line plus dimensions.
pub fn image_stub(file_name: &str, width: u32, height: u32) -> String {
    format!("![{file_name}]({file_name})\n\n*{file_name}: {width} × {height} px*\n")
}

/// Convert an image file to Markdown, optionally with a model-written description.
pub async fn image_to_markdown(
    path: &Path,
    captioner: Option<&Arc<dyn LLMProvider>>,
) -> Result<String, ConversionError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| ConversionError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;

    let owned_path = path.to_path_buf();
    let want_payload = captioner.is_some();
    let (width, height, payload) = tokio::task::spawn_blocking(move || {
        let img = image::load_from_memory(&bytes).map_err(|e| ConversionError::ImageDecode {
            path: owned_path.clone(),
            detail: e.to_string(),
        })?;
        let payload = if want_payload {
            Some(encode_image(&img).map_err(|e| ConversionError::ImageDecode {
                path: owned_path,
                detail: e.to_string(),
            })?)
        } else {
            None
        };
        Ok::<_, ConversionError>((img.width(), img.height(), payload))
    })
    .await
    .map_err(|e| ConversionError::Internal(format!("image decode task panicked: {e}")))??;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let mut markdown = image_stub(&file_name, width, height);

    if let (Some(provider), Some(image)) = (captioner, payload) {
        match describe(provider, image).await {
            Ok(caption) if !caption.trim().is_empty() => {
                markdown.push('\n');
                markdown.push_str(caption.trim());
                markdown.push('\n');
            }
            Ok(_) => warn!("{}: vision model returned an empty description", file_name),
            Err(detail) => warn!("{}: image description failed: {}", file_name, detail),
        }
    }

    Ok(markdown)
}

/// One vision call; the provider error is returned as text for logging.
async fn describe(provider: &Arc<dyn LLMProvider>, image: ImageData) -> Result<String, String> {
    let messages = vec![ChatMessage::user_with_images(
        DESCRIBE_IMAGE_PROMPT,
        vec![image],
    )];
    let options = CompletionOptions {
        temperature: Some(0.1),
        max_tokens: Some(1024),
        ..Default::default()
    };

    let response = provider
        .chat(&messages, Some(&options))
        .await
        .map_err(|e| e.to_string())?;
    debug!(
        "caption: {} input tokens, {} output tokens",
        response.prompt_tokens, response.completion_tokens
    );
    Ok(response.content)
}
