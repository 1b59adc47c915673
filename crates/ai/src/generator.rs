use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::error::AiError;
use crate::prompt::Prompt;

/// Turns structured facts into prose.
///
/// A failure is soft: callers treat it as a failure of the one unit of work that
/// needed the text, never of the whole cycle.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &Prompt) -> Result<String, AiError>;

    /// Short identifier for logs.
    fn name(&self) -> &'static str;
}

#[async_trait]
impl<T> TextGenerator for Arc<T>
where
    T: TextGenerator + ?Sized,
{
    async fn generate(&self, prompt: &Prompt) -> Result<String, AiError> {
        (**self).generate(prompt).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Uses `primary`, falling back to `fallback` when it fails.
pub struct WithFallback {
    primary: Arc<dyn TextGenerator>,
    fallback: Arc<dyn TextGenerator>,
}

impl WithFallback {
    pub fn new(primary: Arc<dyn TextGenerator>, fallback: Arc<dyn TextGenerator>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl TextGenerator for WithFallback {
    async fn generate(&self, prompt: &Prompt) -> Result<String, AiError> {
        match self.primary.generate(prompt).await {
            Ok(text) => Ok(text),
            Err(err) => {
                warn!(
                    generator = self.primary.name(),
                    fallback = self.fallback.name(),
                    prompt = prompt.kind(),
                    error = %err,
                    "text generation failed; using fallback"
                );
                self.fallback.generate(prompt).await
            }
        }
    }

    fn name(&self) -> &'static str {
        "with_fallback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::TemplateTextGenerator;
    use procura_core::Money;

    struct Down;

    #[async_trait]
    impl TextGenerator for Down {
        async fn generate(&self, _prompt: &Prompt) -> Result<String, AiError> {
            Err(AiError::Unavailable("connection refused".into()))
        }

        fn name(&self) -> &'static str {
            "down"
        }
    }

    fn prompt() -> Prompt {
        Prompt::PaymentRequest {
            po_number: "PO-7".into(),
            vendor_name: "Acme".into(),
            amount: Money::from_major(10).unwrap(),
            payment_terms: "NET 30".into(),
        }
    }

    #[tokio::test]
    async fn fallback_covers_primary_failure() {
        let generator = WithFallback::new(Arc::new(Down), Arc::new(TemplateTextGenerator::new()));
        let text = generator.generate(&prompt()).await.unwrap();
        assert!(text.contains("PO-7"));
    }

    #[tokio::test]
    async fn both_failing_surfaces_the_fallback_error() {
        let generator = WithFallback::new(Arc::new(Down), Arc::new(Down));
        assert!(matches!(
            generator.generate(&prompt()).await,
            Err(AiError::Unavailable(_))
        ));
    }
}
