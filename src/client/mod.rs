use async_trait::async_trait;
use thiserror::Error;

use crate::model::{Address, RiskAssessment};

mod http;
pub mod retry;

pub use http::{risk_url, search_url, HttpRiskClient};

/// Failure of a single backend query.
///
/// Surfacing from `search` it is a search failure (swallowed by the search
/// controller); surfacing from `risk_for` it is a risk failure (shown to the
/// user by the app controller).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    #[error("backend returned HTTP {status}")]
    Http { status: u16 },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Http { status } => Some(*status),
            _ => None,
        }
    }
}

/// The two read-only queries the dashboard issues against the backend.
///
/// The HTTP implementation carries no retry policy; wrap it in
/// [`retry::Retrying`] for that.
#[async_trait]
pub trait RiskApi {
    async fn search(&self, query: &str) -> Result<Vec<Address>, ClientError>;
    async fn risk_for(&self, address: &Address) -> Result<RiskAssessment, ClientError>;
}
