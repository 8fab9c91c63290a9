use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Deserialize;

use crate::decode::decode_typed;
use crate::error::LLMError;

use super::ChatClient;

/// Account balance, in the account currency.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct Balance {
    pub available_balance: f64,
    #[serde(default)]
    pub voucher_balance: f64,
    #[serde(default)]
    pub cash_balance: f64,
}

#[derive(Deserialize)]
struct BalanceEnvelope {
    data: Balance,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub owned_by: Option<String>,
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelInfo>,
}

impl ChatClient {
    pub async fn get_balance(&self) -> Result<Balance, LLMError> {
        let raw = self.send_simple(Method::GET, "users/me/balance").await?;
        let envelope: BalanceEnvelope = decode_typed(raw).await?;
        Ok(envelope.data)
    }

    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, LLMError> {
        let raw = self.send_simple(Method::GET, "models").await?;
        let list: ModelList = decode_typed(raw).await?;
        Ok(list.data)
    }
}
