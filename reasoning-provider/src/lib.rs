//! Provider role contract, error classification, and concrete LLM provider
//! adapters.

#![deny(missing_docs)]

mod bundle;
mod classifier;
mod generic_http;
mod provider;
mod reader;

pub use bundle::MultiModelBundleProvider;
pub use classifier::{ErrorCategory, ErrorClassifier, Classification, RawProviderFailure};
pub use generic_http::{GenerateFn, GenerateResponse, GenericHttpProvider};
pub use provider::{Provider, ProviderError, RateLimit, RawProviderFailureError};
pub use reader::{CodeReader, CodeReaderError, InMemoryCodeReader};
