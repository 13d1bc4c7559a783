//! Model providers for Tandem.
//!
//! Every provider implements [`tandem_core::Provider`].
//! [`complete_with_retry`] adds bounded exponential backoff around a call, and
//! the router builds the configured set.

pub mod openai_compat;
pub mod retry;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use retry::{RetryPolicy, complete_with_retry};
pub use router::{ProviderRouter, build_from_config};
