pub mod client;
pub mod error;
pub mod retry;

pub use client::{LightNodeClient, NodeApi, WalletDetails};
pub use error::ApiError;
