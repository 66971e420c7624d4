//! Next-words suggestions for partially typed input.

use std::sync::Arc;

use tracing::warn;

use crate::llm::generator::Generator;
use crate::memory::core::config::SamplingConfig;

/// Suggests a short continuation of the user's text.
pub struct Autocompleter {
    generator: Arc<dyn Generator>,
    sampling: SamplingConfig,
}

impl Autocompleter {
    /// Create an autocompleter with its own sampling settings.
    #[must_use]
    pub fn new(generator: Arc<dyn Generator>, sampling: SamplingConfig) -> Self {
        Self {
            generator,
            sampling,
        }
    }

    /// Suggest the next few words. Failures and blank input give an empty suggestion.
    pub async fn suggest(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return String::new();
        }

        let prompt = format!(
            "Continue the following text naturally.\n\
             Only return the next few words. Do not repeat the text.\n\n\
             Text:\n{text}"
        );

        match self.generator.generate(&prompt, self.sampling).await {
            Ok(suggestion) => suggestion.trim().to_string(),
            Err(err) => {
                warn!("Autocomplete skipped: {err}");
                String::new()
            }
        }
    }
}
