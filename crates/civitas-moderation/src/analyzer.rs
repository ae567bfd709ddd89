//! Secondary analyzer abstraction

use async_trait::async_trait;
use civitas_core::Result;

/// Generative text service consulted for ambiguous cases.
///
/// Implementations return the raw reply text. Errors mean the service could
/// not be reached or answered with a failure.
#[async_trait]
pub trait SecondaryAnalyzer: Send + Sync {
    /// Ask the service to assess `text`
    async fn prompt(&self, text: &str) -> Result<String>;

    /// Name used in logs
    fn name(&self) -> &str;
}

/// Instruction sent ahead of the analyzed text
pub fn build_prompt(text: &str) -> String {
    format!(
        "Analyze the following text for hate speech.\n\
         Provide the result in JSON format with two fields:\n\
         - \"score\" (0-100) indicating how hateful it is.\n\
         - \"sentiment\" (1-5 words describing the sentiment).\n\
         \n\
         Text: {}",
        text
    )
}
