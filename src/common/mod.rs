//! Common utilities and types shared across quorumkv

pub mod config;
pub mod error;
pub mod utils;

pub use config::ClientConfig;
pub use error::{Result, RpcError, SdkError};
pub use utils::{successor_key, timestamp_now_millis, Backoff};
