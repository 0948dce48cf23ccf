//! Uniform, serializable view of an operation's outcome

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ProvisionError;
use crate::manager::CertificateState;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl OperationReport {
    pub fn succeeded(message: Option<String>) -> Self {
        Self {
            success: true,
            message,
            error: None,
            is_active: None,
            expires_at: None,
        }
    }

    pub fn failed(error: &ProvisionError) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.to_string()),
            is_active: None,
            expires_at: None,
        }
    }

    pub fn from_setup(result: &Result<(), ProvisionError>) -> Self {
        match result {
            Ok(()) => Self::succeeded(None),
            Err(e) => Self::failed(e),
        }
    }

    pub fn from_remove(result: &Result<String, ProvisionError>) -> Self {
        match result {
            Ok(message) => Self::succeeded(Some(message.clone())),
            Err(e) => Self::failed(e),
        }
    }

    pub fn from_check(result: &Result<CertificateState, ProvisionError>) -> Self {
        match result {
            Ok(state) => Self {
                is_active: Some(state.is_active),
                expires_at: Some(state.expires_at),
                ..Self::succeeded(None)
            },
            Err(e) => Self::failed(e),
        }
    }
}
