pub mod cancel;
pub mod error;
pub mod fallback;
pub mod family;
pub mod http;
pub mod interpret;
pub mod pipeline;
pub mod prompt;
pub mod request;
pub mod response;
pub mod signing;
pub mod timestamp;
pub mod transport;
pub mod types;

pub use cancel::CancelToken;
pub use error::*;
pub use family::{ModelFamily, classify};
pub use pipeline::{FallbackReason, Pipeline, PipelineConfig, PipelineState, SummaryOutcome};
pub use request::{GenerationConfig, InferenceRequest};
pub use response::InferenceResponse;
pub use transport::{BedrockTransport, Credentials, Endpoint, InferenceTransport};
pub use types::*;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
