//! Streaming text generation behind one vendor-neutral contract.
//!
//! Every backend implements [`TextGenerator`]: give it a prompt, get back a
//! [`FragmentStream`] of text deltas in arrival order. The stream is lazy and
//! single-pass; dropping it early cancels the remaining network work.
//!
//! ```text
//! AppConfig ──▶ create_generator ──▶ Arc<dyn TextGenerator>
//!                                        │ generate(prompt)
//!                                        ▼
//!                         FragmentStream ("Hel", "lo", …)
//!                                        │ collect_text
//!                                        ▼
//!                                     "Hello…"
//! ```
//!
//! The vendor is chosen once, when the generator is built; callers never
//! re-check it per request. Synchronous callers go through
//! [`blocking::GenerationBridge`].

pub mod blocking;
mod google;
mod openai;
mod sse;

pub use blocking::{BlockingFragments, GenerationBridge};
pub use google::GeminiGenerator;
pub use openai::OpenAiGenerator;

use crate::config::{AppConfig, Vendor};
use crate::error::{ConfigError, GenerationError};
use async_trait::async_trait;
use futures::StreamExt;
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::debug;

/// A boxed stream of generated text fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, GenerationError>> + Send>>;

/// One capability: turn a prompt into a stream of text fragments.
///
/// The prompt is sent as the sole user turn. Implementations keep no state
/// between calls.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Short backend name used in logs and errors.
    fn name(&self) -> &str;

    /// Open a streaming generation for `prompt`.
    ///
    /// Connection and HTTP-status failures are returned here; failures after
    /// the first byte arrive as `Err` items and terminate the stream.
    async fn generate(&self, prompt: &str) -> Result<FragmentStream, GenerationError>;
}

/// Build the generator for the configured vendor.
///
/// Fails with [`ConfigError::MissingCredential`] when the vendor's API key is
/// absent, before any request is attempted.
pub fn create_generator(config: &AppConfig) -> Result<Arc<dyn TextGenerator>, ConfigError> {
    let api_key = config
        .vendor_api_key()
        .ok_or_else(|| ConfigError::MissingCredential {
            vendor: config.vendor.to_string(),
            variable: config.vendor.api_key_var().to_string(),
        })?
        .to_string();
    let model = config.effective_model().to_string();
    debug!("Using {} generator with model {}", config.vendor, model);

    let generator: Arc<dyn TextGenerator> = match config.vendor {
        Vendor::Google => Arc::new(GeminiGenerator::new(
            api_key,
            model,
            config.gemini_base_url.clone(),
        )),
        Vendor::OpenAi => Arc::new(OpenAiGenerator::new(
            api_key,
            model,
            config.openai_base_url.clone(),
        )),
    };
    Ok(generator)
}

/// Drain a fragment stream into one string.
///
/// Stops at the first error; fragments received before it are discarded.
pub async fn collect_text(mut stream: FragmentStream) -> Result<String, GenerationError> {
    let mut text = String::new();
    while let Some(fragment) = stream.next().await {
        text.push_str(&fragment?);
    }
    Ok(text)
}

/// Generate and concatenate in one call.
pub async fn generate_text(
    generator: &dyn TextGenerator,
    prompt: &str,
) -> Result<String, GenerationError> {
    let stream = generator.generate(prompt).await?;
    collect_text(stream).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    struct Fixed(Vec<&'static str>);

    #[async_trait]
    impl TextGenerator for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn generate(&self, _prompt: &str) -> Result<FragmentStream, GenerationError> {
            let items: Vec<Result<String, GenerationError>> =
                self.0.iter().map(|s| Ok(s.to_string())).collect();
            Ok(Box::pin(stream::iter(items)))
        }
    }

    #[tokio::test]
    async fn fragments_concatenate_in_order() {
        let generator = Fixed(vec!["A", "B", "C"]);
        let stream = generator.generate("prompt").await.unwrap();
        let items: Vec<_> = stream.collect().await;
        assert_eq!(items.len(), 3);

        let text = generate_text(&generator, "prompt").await.unwrap();
        assert_eq!(text, "ABC");
    }

    #[tokio::test]
    async fn collect_stops_on_error() {
        let items: Vec<Result<String, GenerationError>> = vec![
            Ok("partial".into()),
            Err(GenerationError::Api {
                message: "boom".into(),
            }),
            Ok("never".into()),
        ];
        let err = collect_text(Box::pin(stream::iter(items))).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn missing_key_fails_fast() {
        let config = AppConfig::builder().vendor(Vendor::OpenAi).build().unwrap();
        let err = create_generator(&config).err().expect("should fail");
        match err {
            ConfigError::MissingCredential { vendor, variable } => {
                assert_eq!(vendor, "openai");
                assert_eq!(variable, "OPENAI_API_KEY");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn generator_matches_vendor() {
        let config = AppConfig::builder()
            .vendor(Vendor::Google)
            .gemini_api_key("key")
            .build()
            .unwrap();
        let generator = create_generator(&config).unwrap();
        assert_eq!(generator.name(), "google");
    }
}
