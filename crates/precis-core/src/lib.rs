pub mod config;
pub mod error;
pub mod link;
pub mod strings;
pub mod types;

pub use config::PrecisConfig;
pub use error::{CoreError, Result};
pub use link::{normalize_url, ContentFingerprint, Link};
pub use types::{FetchedContent, Summary, ThreadBinding};
