pub mod anthropic;
pub mod coda;
pub mod error;
pub mod openai;
pub mod platform;
pub mod source;
pub mod summarizer;
pub mod target;
pub mod youtube;

pub use error::{DeliveryError, FetchError, RegistryError, SummarizeError, ThreadError};
pub use platform::{ThreadInfo, ThreadPlatform};
pub use source::{SourceAdapter, SourceRegistry};
pub use summarizer::{SummarizeOptions, Summarizer, SummarizerRegistry};
pub use target::{DeliveryReceipt, Target, TargetRegistry};
