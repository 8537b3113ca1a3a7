use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Client,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CoinType {
    Bitcoin,
    Ethereum,
    Solana,
    Litecoin,
    Dogecoin,
}

impl CoinType {
    pub const ALL: [CoinType; 5] = [
        CoinType::Bitcoin,
        CoinType::Ethereum,
        CoinType::Solana,
        CoinType::Litecoin,
        CoinType::Dogecoin,
    ];

    /// The mining algorithm conventionally associated with the coin.
    pub fn algorithm(self) -> Algorithm {
        match self {
            CoinType::Bitcoin => Algorithm::Sha256,
            CoinType::Ethereum => Algorithm::Ethash,
            CoinType::Solana => Algorithm::SolanaPoh,
            CoinType::Litecoin => Algorithm::Scrypt,
            CoinType::Dogecoin => Algorithm::Scrypt,
        }
    }
}

impl fmt::Display for CoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CoinType::Bitcoin => "Bitcoin",
            CoinType::Ethereum => "Ethereum",
            CoinType::Solana => "Solana",
            CoinType::Litecoin => "Litecoin",
            CoinType::Dogecoin => "Dogecoin",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Algorithm {
    #[serde(rename = "SHA-256")]
    Sha256,
    Ethash,
    Scrypt,
    #[serde(rename = "Solana-PoH")]
    SolanaPoh,
    Equihash,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Idle,
    Running,
    Paused,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    Send,
    Receive,
    Convert,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartMiningRequest {
    pub coin_type: CoinType,
    pub target_reward: f64,
    /// Overrides the coin's conventional algorithm when set.
    pub algorithm: Option<Algorithm>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateWalletRequest {
    pub name: String,
    pub coin_type: CoinType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddExternalWalletRequest {
    pub name: String,
    pub address: String,
    pub coin_type: CoinType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendCoinsRequest {
    pub from_wallet_id: String,
    pub to_address: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertCoinsRequest {
    pub from_wallet_id: String,
    pub to_coin: CoinType,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryPhraseResponse {
    pub phrase: String,
    pub word_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreWalletsRequest {
    pub phrase: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatsResponse {
    pub hashrate: f64,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coin_algorithms_match_convention() {
        assert_eq!(CoinType::Bitcoin.algorithm(), Algorithm::Sha256);
        assert_eq!(CoinType::Ethereum.algorithm(), Algorithm::Ethash);
        assert_eq!(CoinType::Solana.algorithm(), Algorithm::SolanaPoh);
        assert_eq!(CoinType::Litecoin.algorithm(), Algorithm::Scrypt);
        assert_eq!(CoinType::Dogecoin.algorithm(), Algorithm::Scrypt);
    }

    #[test]
    fn wire_names_are_stable() {
        let json = serde_json::to_string(&Algorithm::Sha256).unwrap();
        assert_eq!(json, "\"SHA-256\"");
        let json = serde_json::to_string(&TaskStatus::Running).unwrap();
        assert_eq!(json, "\"running\"");
        let json = serde_json::to_string(&CoinType::Dogecoin).unwrap();
        assert_eq!(json, "\"Dogecoin\"");
    }
}
