pub mod anthropic;
pub mod extract;
pub mod openai;
pub mod provider;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;
pub use provider::{
    classify_with_timeout, triage_system_prompt, ClassificationRequest, ClassificationResponse,
    ClassifierProvider, ProviderError,
};
