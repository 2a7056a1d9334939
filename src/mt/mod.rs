//! Machine translation providers
//!
//! Text-level translation behind the [`MachineTranslator`] trait:
//!
//! - [`GoogleTranslateProvider`]: Google Translate v2 REST API
//! - [`ChatCompletionProvider`]: DeepSeek or any OpenAI-compatible chat endpoint
//! - [`PassthroughTranslator`]: identity
//! - [`MockTranslator`]: deterministic, for tests
//!
//! Document handling lives in [`crate::backend`], which feeds paragraph
//! texts to one of these.
pub mod chat_completion;
pub mod error;
pub mod google_translate;
pub mod mock;
pub mod passthrough;
pub mod translator;

pub use chat_completion::ChatCompletionProvider;
pub use error::{MtError, MtResult};
pub use google_translate::GoogleTranslateProvider;
pub use mock::{MockMode, MockTranslator};
pub use passthrough::PassthroughTranslator;
pub use translator::{
    MachineTranslator, ensure_same_length, language_name, normalize_locale, validate_locale,
};
