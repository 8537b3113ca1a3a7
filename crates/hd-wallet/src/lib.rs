use bip39::{Language, Mnemonic, MnemonicType};
use hd_api_types::{CoinType, TxKind, TxStatus};
use hd_session::SessionStore;
use hd_storage::{Clock, StateStore, transactions_key, wallets_key};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

const SEND_FEE_RATE: f64 = 0.01;
const CONVERT_FEE_RATE: f64 = 0.02;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("not logged in")]
    NotLoggedIn,
    #[error("wallet not found: {0}")]
    WalletNotFound(String),
    #[error("insufficient balance: required {required:.5} {coin}, available {available:.5}")]
    InsufficientBalance {
        required: f64,
        available: f64,
        coin: CoinType,
    },
    #[error("invalid recovery phrase")]
    InvalidRecoveryPhrase,
    #[error("storage error: {0}")]
    Store(#[from] anyhow::Error),
}

/// A mock record of a coin balance. The address is random hex, not a derived
/// key; nothing here can sign anything.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Wallet {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub address: String,
    pub coin_type: CoinType,
    pub balance: f64,
    pub is_default: bool,
    pub created_at_epoch_ms: u128,
}

/// Append-only ledger entry, never mutated after creation. Transfers settle
/// instantly, so entries are born `Completed`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub from_wallet_id: String,
    pub to_wallet_id: Option<String>,
    pub to_address: Option<String>,
    pub amount: f64,
    pub coin_type: CoinType,
    pub status: TxStatus,
    pub fee: f64,
    pub timestamp_epoch_ms: u128,
    pub kind: TxKind,
}

/// Static mock conversion rates. Values come from the product's demo table;
/// the diagonal is 1.
pub fn exchange_rate(from: CoinType, to: CoinType) -> f64 {
    use CoinType::*;
    match (from, to) {
        (Bitcoin, Bitcoin) => 1.0,
        (Bitcoin, Ethereum) => 15.2,
        (Bitcoin, Solana) => 440.0,
        (Bitcoin, Litecoin) => 220.0,
        (Bitcoin, Dogecoin) => 12_500.0,
        (Ethereum, Bitcoin) => 0.066,
        (Ethereum, Ethereum) => 1.0,
        (Ethereum, Solana) => 29.0,
        (Ethereum, Litecoin) => 14.5,
        (Ethereum, Dogecoin) => 823.0,
        (Solana, Bitcoin) => 0.0023,
        (Solana, Ethereum) => 0.035,
        (Solana, Solana) => 1.0,
        (Solana, Litecoin) => 0.5,
        (Solana, Dogecoin) => 28.5,
        (Litecoin, Bitcoin) => 0.0046,
        (Litecoin, Ethereum) => 0.069,
        (Litecoin, Solana) => 2.0,
        (Litecoin, Litecoin) => 1.0,
        (Litecoin, Dogecoin) => 57.0,
        (Dogecoin, Bitcoin) => 0.00008,
        (Dogecoin, Ethereum) => 0.0012,
        (Dogecoin, Solana) => 0.035,
        (Dogecoin, Litecoin) => 0.0175,
        (Dogecoin, Dogecoin) => 1.0,
    }
}

/// Generates a 24-word BIP-39 recovery phrase. The phrase is only used for
/// the confirmation flow; no keys are ever derived from it.
pub fn create_recovery_phrase() -> String {
    Mnemonic::new(MnemonicType::Words24, Language::English)
        .phrase()
        .to_owned()
}

pub fn validate_recovery_phrase(phrase: &str) -> bool {
    Mnemonic::validate(phrase, Language::English).is_ok()
}

/// Mock wallets and an append-only transaction ledger for the current user.
/// Wallets are never deleted; every mutation persists both lists under the
/// user's keys.
///
/// Invariant: at most one wallet per coin type has `is_default` set.
///
/// Mutations are serialized behind the store's own lock, which matches the
/// original single-threaded guarantee; there is no cross-process balance
/// locking.
pub struct WalletStore {
    store: Arc<dyn StateStore>,
    session: Arc<SessionStore>,
    clock: Arc<dyn Clock>,
    wallets: RwLock<Vec<Wallet>>,
    transactions: RwLock<Vec<Transaction>>,
    rng: Mutex<StdRng>,
}

impl WalletStore {
    pub fn new(store: Arc<dyn StateStore>, session: Arc<SessionStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_rng(store, session, clock, StdRng::from_entropy())
    }

    pub fn with_seed(
        store: Arc<dyn StateStore>,
        session: Arc<SessionStore>,
        clock: Arc<dyn Clock>,
        seed: u64,
    ) -> Self {
        Self::with_rng(store, session, clock, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        store: Arc<dyn StateStore>,
        session: Arc<SessionStore>,
        clock: Arc<dyn Clock>,
        rng: StdRng,
    ) -> Self {
        Self {
            store,
            session,
            clock,
            wallets: RwLock::new(Vec::new()),
            transactions: RwLock::new(Vec::new()),
            rng: Mutex::new(rng),
        }
    }

    /// Reloads both lists for the current identity; clears them when nobody
    /// is logged in.
    pub async fn load(&self) -> Result<(), WalletError> {
        let identity = self.session.current().await;
        let mut wallets = self.wallets.write().await;
        let mut transactions = self.transactions.write().await;

        match identity {
            Some(identity) => {
                *wallets = match self.store.get(&wallets_key(&identity.id)).await? {
                    Some(raw) => serde_json::from_slice(&raw).map_err(anyhow::Error::from)?,
                    None => Vec::new(),
                };
                *transactions = match self.store.get(&transactions_key(&identity.id)).await? {
                    Some(raw) => serde_json::from_slice(&raw).map_err(anyhow::Error::from)?,
                    None => Vec::new(),
                };
            }
            None => {
                wallets.clear();
                transactions.clear();
            }
        }
        Ok(())
    }

    /// Creates a wallet with a mock address and a random seed balance. It
    /// becomes the default for its coin iff no wallet of that coin exists.
    pub async fn generate_wallet(&self, name: &str, coin_type: CoinType) -> Result<Wallet, WalletError> {
        let identity = self.session.current().await.ok_or(WalletError::NotLoggedIn)?;
        let mut wallets = self.wallets.write().await;
        let is_default = !wallets.iter().any(|w| w.coin_type == coin_type);
        let wallet = self.build_wallet(&identity.id, name, coin_type, is_default);
        wallets.push(wallet.clone());
        self.persist_wallets(&identity.id, &wallets).await?;
        info!(wallet_id = %wallet.id, coin = %coin_type, "wallet generated");
        Ok(wallet)
    }

    /// Registers an existing external address. The balance starts at zero
    /// since the real balance is unknowable here.
    pub async fn add_external_wallet(
        &self,
        name: &str,
        address: &str,
        coin_type: CoinType,
    ) -> Result<Wallet, WalletError> {
        let identity = self.session.current().await.ok_or(WalletError::NotLoggedIn)?;
        let mut wallets = self.wallets.write().await;
        let is_default = !wallets.iter().any(|w| w.coin_type == coin_type);

        let wallet = Wallet {
            id: Uuid::new_v4().to_string(),
            user_id: identity.id.clone(),
            name: name.to_owned(),
            address: address.to_owned(),
            coin_type,
            balance: 0.0,
            is_default,
            created_at_epoch_ms: self.clock.now_epoch_ms(),
        };

        wallets.push(wallet.clone());
        self.persist_wallets(&identity.id, &wallets).await?;
        info!(wallet_id = %wallet.id, coin = %coin_type, "external wallet added");
        Ok(wallet)
    }

    /// Makes the target wallet the single default for its coin type.
    pub async fn set_default_wallet(&self, wallet_id: &str) -> Result<Wallet, WalletError> {
        let identity = self.session.current().await.ok_or(WalletError::NotLoggedIn)?;
        let mut wallets = self.wallets.write().await;

        let coin_type = wallets
            .iter()
            .find(|w| w.id == wallet_id)
            .map(|w| w.coin_type)
            .ok_or_else(|| WalletError::WalletNotFound(wallet_id.to_owned()))?;

        for wallet in wallets.iter_mut() {
            if wallet.coin_type == coin_type {
                wallet.is_default = wallet.id == wallet_id;
            }
        }

        self.persist_wallets(&identity.id, &wallets).await?;
        let updated = wallets
            .iter()
            .find(|w| w.id == wallet_id)
            .cloned()
            .expect("wallet present above");
        Ok(updated)
    }

    /// Debits `amount + 1% fee` from the source and appends a completed Send
    /// entry. There is no pending or settlement phase.
    pub async fn send_coins(
        &self,
        from_wallet_id: &str,
        to_address: &str,
        amount: f64,
    ) -> Result<Transaction, WalletError> {
        let identity = self.session.current().await.ok_or(WalletError::NotLoggedIn)?;
        let mut wallets = self.wallets.write().await;

        let source = wallets
            .iter_mut()
            .find(|w| w.id == from_wallet_id)
            .ok_or_else(|| WalletError::WalletNotFound(from_wallet_id.to_owned()))?;

        let fee = amount * SEND_FEE_RATE;
        let total = amount + fee;
        if source.balance < total {
            return Err(WalletError::InsufficientBalance {
                required: total,
                available: source.balance,
                coin: source.coin_type,
            });
        }

        source.balance -= total;
        let transaction = Transaction {
            id: Uuid::new_v4().to_string(),
            from_wallet_id: from_wallet_id.to_owned(),
            to_wallet_id: None,
            to_address: Some(to_address.to_owned()),
            amount,
            coin_type: source.coin_type,
            status: TxStatus::Completed,
            fee,
            timestamp_epoch_ms: self.clock.now_epoch_ms(),
            kind: TxKind::Send,
        };

        self.persist_wallets(&identity.id, &wallets).await?;
        drop(wallets);
        self.append_transaction(&identity.id, transaction.clone())
            .await?;
        info!(tx_id = %transaction.id, amount, "coins sent");
        Ok(transaction)
    }

    /// Converts via the static rate table, debiting `amount + 2% fee` from
    /// the source and crediting `amount * rate` to the default wallet of the
    /// target coin, which is created on the fly when absent.
    pub async fn convert_coins(
        &self,
        from_wallet_id: &str,
        to_coin: CoinType,
        amount: f64,
    ) -> Result<Transaction, WalletError> {
        let identity = self.session.current().await.ok_or(WalletError::NotLoggedIn)?;
        let mut wallets = self.wallets.write().await;

        let source = wallets
            .iter()
            .find(|w| w.id == from_wallet_id)
            .cloned()
            .ok_or_else(|| WalletError::WalletNotFound(from_wallet_id.to_owned()))?;

        let fee = amount * CONVERT_FEE_RATE;
        let total = amount + fee;
        if source.balance < total {
            return Err(WalletError::InsufficientBalance {
                required: total,
                available: source.balance,
                coin: source.coin_type,
            });
        }

        let to_wallet_id = match wallets.iter().find(|w| w.coin_type == to_coin && w.is_default) {
            Some(wallet) => wallet.id.clone(),
            None => {
                let is_default = !wallets.iter().any(|w| w.coin_type == to_coin);
                let wallet = self.build_wallet(
                    &identity.id,
                    &format!("{to_coin} Wallet"),
                    to_coin,
                    is_default,
                );
                let id = wallet.id.clone();
                wallets.push(wallet);
                id
            }
        };

        let rate = exchange_rate(source.coin_type, to_coin);
        let converted = amount * rate;

        for wallet in wallets.iter_mut() {
            if wallet.id == from_wallet_id {
                wallet.balance -= total;
            } else if wallet.id == to_wallet_id {
                wallet.balance += converted;
            }
        }

        let transaction = Transaction {
            id: Uuid::new_v4().to_string(),
            from_wallet_id: from_wallet_id.to_owned(),
            to_wallet_id: Some(to_wallet_id),
            to_address: None,
            amount,
            coin_type: source.coin_type,
            status: TxStatus::Completed,
            fee,
            timestamp_epoch_ms: self.clock.now_epoch_ms(),
            kind: TxKind::Convert,
        };

        self.persist_wallets(&identity.id, &wallets).await?;
        drop(wallets);
        self.append_transaction(&identity.id, transaction.clone())
            .await?;
        info!(tx_id = %transaction.id, from = %source.coin_type, to = %to_coin, amount, "coins converted");
        Ok(transaction)
    }

    /// Validates the phrase and replaces the wallet list with a fresh mock
    /// set. No keys are derived from the phrase; the wallets that come back
    /// are mocks like everything else here.
    pub async fn restore_wallets(&self, phrase: &str) -> Result<Vec<Wallet>, WalletError> {
        let identity = self.session.current().await.ok_or(WalletError::NotLoggedIn)?;
        if !validate_recovery_phrase(phrase) {
            return Err(WalletError::InvalidRecoveryPhrase);
        }

        let mut wallets = self.wallets.write().await;
        wallets.clear();
        // Only the Bitcoin wallet comes back as a default.
        for (name, coin, is_default) in [
            ("Bitcoin Wallet", CoinType::Bitcoin, true),
            ("Ethereum Wallet", CoinType::Ethereum, false),
            ("Solana Wallet", CoinType::Solana, false),
        ] {
            let wallet = self.build_wallet(&identity.id, name, coin, is_default);
            wallets.push(wallet);
        }

        self.persist_wallets(&identity.id, &wallets).await?;
        info!(count = wallets.len(), "wallets restored from phrase");
        Ok(wallets.clone())
    }

    pub async fn wallet(&self, wallet_id: &str) -> Option<Wallet> {
        let wallets = self.wallets.read().await;
        wallets.iter().find(|w| w.id == wallet_id).cloned()
    }

    pub async fn wallets(&self) -> Vec<Wallet> {
        self.wallets.read().await.clone()
    }

    /// The default wallet for a coin, or any default wallet when no coin is
    /// given.
    pub async fn default_wallet(&self, coin_type: Option<CoinType>) -> Option<Wallet> {
        let wallets = self.wallets.read().await;
        wallets
            .iter()
            .find(|w| w.is_default && coin_type.is_none_or(|coin| w.coin_type == coin))
            .cloned()
    }

    pub async fn transaction(&self, tx_id: &str) -> Option<Transaction> {
        let transactions = self.transactions.read().await;
        transactions.iter().find(|tx| tx.id == tx_id).cloned()
    }

    pub async fn transactions(&self) -> Vec<Transaction> {
        self.transactions.read().await.clone()
    }

    /// Every transaction the wallet participates in, as source or
    /// destination.
    pub async fn wallet_transactions(&self, wallet_id: &str) -> Vec<Transaction> {
        let transactions = self.transactions.read().await;
        transactions
            .iter()
            .filter(|tx| {
                tx.from_wallet_id == wallet_id || tx.to_wallet_id.as_deref() == Some(wallet_id)
            })
            .cloned()
            .collect()
    }

    fn build_wallet(
        &self,
        user_id: &str,
        name: &str,
        coin_type: CoinType,
        is_default: bool,
    ) -> Wallet {
        let mut rng = self.rng.lock().expect("rng lock poisoned");
        let seed_cap = match coin_type {
            CoinType::Bitcoin => 2.0,
            CoinType::Ethereum => 10.0,
            _ => 100.0,
        };

        Wallet {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_owned(),
            name: name.to_owned(),
            address: mock_address(&mut rng),
            coin_type,
            balance: rng.gen_range(0.0..seed_cap),
            is_default,
            created_at_epoch_ms: self.clock.now_epoch_ms(),
        }
    }

    async fn persist_wallets(&self, user_id: &str, wallets: &[Wallet]) -> Result<(), WalletError> {
        let raw = serde_json::to_vec(wallets).map_err(anyhow::Error::from)?;
        self.store.put(&wallets_key(user_id), raw).await?;
        Ok(())
    }

    async fn append_transaction(
        &self,
        user_id: &str,
        transaction: Transaction,
    ) -> Result<(), WalletError> {
        let mut transactions = self.transactions.write().await;
        transactions.push(transaction);
        let raw = serde_json::to_vec(&*transactions).map_err(anyhow::Error::from)?;
        self.store.put(&transactions_key(user_id), raw).await?;
        Ok(())
    }
}

fn mock_address(rng: &mut StdRng) -> String {
    let mut address = String::with_capacity(40);
    address.push_str("0x");
    for _ in 0..19 {
        let byte = rng.gen_range(0..=u8::MAX);
        address.push_str(&format!("{byte:02x}"));
    }
    address
}

#[cfg(test)]
mod tests {
    use super::*;
    use hd_storage::{InMemoryStore, ManualClock};

    async fn store_with_user() -> WalletStore {
        let backing = Arc::new(InMemoryStore::default());
        let clock = Arc::new(ManualClock::default());
        clock.set(1_700_000_000_000);
        let session = Arc::new(SessionStore::new(backing.clone(), clock.clone()));
        session.login("miner@example.com", "pw").await.unwrap();
        let wallet = WalletStore::with_seed(backing, session, clock, 11);
        wallet.load().await.unwrap();
        wallet
    }

    async fn set_balance(store: &WalletStore, wallet_id: &str, balance: f64) {
        let mut wallets = store.wallets.write().await;
        let wallet = wallets.iter_mut().find(|w| w.id == wallet_id).unwrap();
        wallet.balance = balance;
    }

    #[tokio::test]
    async fn operations_require_identity() {
        let backing = Arc::new(InMemoryStore::default());
        let clock = Arc::new(ManualClock::default());
        let session = Arc::new(SessionStore::new(backing.clone(), clock.clone()));
        let store = WalletStore::with_seed(backing, session, clock, 1);

        let err = store.generate_wallet("W", CoinType::Bitcoin).await.unwrap_err();
        assert!(matches!(err, WalletError::NotLoggedIn));
        let err = store.restore_wallets("whatever").await.unwrap_err();
        assert!(matches!(err, WalletError::NotLoggedIn));
    }

    #[tokio::test]
    async fn generated_wallet_has_mock_shape() -> anyhow::Result<()> {
        let store = store_with_user().await;
        let wallet = store.generate_wallet("Cold", CoinType::Bitcoin).await?;

        assert!(wallet.address.starts_with("0x"));
        assert_eq!(wallet.address.len(), 40);
        assert!(wallet.balance >= 0.0 && wallet.balance < 2.0);
        assert!(wallet.is_default);

        let eth = store.generate_wallet("Hot", CoinType::Ethereum).await?;
        assert!(eth.balance < 10.0);
        let sol = store.generate_wallet("Stake", CoinType::Solana).await?;
        assert!(sol.balance < 100.0);
        Ok(())
    }

    #[tokio::test]
    async fn at_most_one_default_per_coin() -> anyhow::Result<()> {
        let store = store_with_user().await;
        let first = store.generate_wallet("A", CoinType::Bitcoin).await?;
        let second = store.generate_wallet("B", CoinType::Bitcoin).await?;
        let external = store
            .add_external_wallet("C", "0xdeadbeef", CoinType::Bitcoin)
            .await?;

        assert!(first.is_default);
        assert!(!second.is_default);
        assert!(!external.is_default);

        store.set_default_wallet(&second.id).await?;
        let wallets = store.wallets().await;
        let defaults: Vec<_> = wallets
            .iter()
            .filter(|w| w.coin_type == CoinType::Bitcoin && w.is_default)
            .collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].id, second.id);

        // Other coins are untouched.
        let eth = store.generate_wallet("Eth", CoinType::Ethereum).await?;
        store.set_default_wallet(&first.id).await?;
        assert!(store.wallet(&eth.id).await.unwrap().is_default);
        Ok(())
    }

    #[tokio::test]
    async fn set_default_unknown_id_fails() {
        let store = store_with_user().await;
        let err = store.set_default_wallet("missing").await.unwrap_err();
        assert!(matches!(err, WalletError::WalletNotFound(_)));
    }

    #[tokio::test]
    async fn external_wallet_starts_empty() -> anyhow::Result<()> {
        let store = store_with_user().await;
        let wallet = store
            .add_external_wallet("Ledger", "0xabc123", CoinType::Litecoin)
            .await?;
        assert_eq!(wallet.balance, 0.0);
        assert_eq!(wallet.address, "0xabc123");
        assert!(wallet.is_default);
        Ok(())
    }

    #[tokio::test]
    async fn send_rejects_balance_below_amount_plus_fee() -> anyhow::Result<()> {
        let store = store_with_user().await;
        let wallet = store.generate_wallet("Main", CoinType::Bitcoin).await?;
        set_balance(&store, &wallet.id, 10.05).await;

        let err = store
            .send_coins(&wallet.id, "0xrecipient", 10.0)
            .await
            .unwrap_err();
        match err {
            WalletError::InsufficientBalance {
                required,
                available,
                coin,
            } => {
                assert!((required - 10.1).abs() < 1e-9);
                assert!((available - 10.05).abs() < 1e-9);
                assert_eq!(coin, CoinType::Bitcoin);
            }
            other => panic!("unexpected error: {other}"),
        }

        // Balance untouched and no ledger entry on failure.
        assert!((store.wallet(&wallet.id).await.unwrap().balance - 10.05).abs() < 1e-9);
        assert!(store.transactions().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn send_debits_amount_plus_fee() -> anyhow::Result<()> {
        let store = store_with_user().await;
        let wallet = store.generate_wallet("Main", CoinType::Bitcoin).await?;
        set_balance(&store, &wallet.id, 10.2).await;

        let tx = store.send_coins(&wallet.id, "0xrecipient", 10.0).await?;
        assert_eq!(tx.kind, TxKind::Send);
        assert_eq!(tx.status, TxStatus::Completed);
        assert!((tx.fee - 0.1).abs() < 1e-9);
        assert_eq!(tx.to_address.as_deref(), Some("0xrecipient"));
        assert!(tx.to_wallet_id.is_none());

        let balance = store.wallet(&wallet.id).await.unwrap().balance;
        assert!((balance - 0.10).abs() < 1e-9);
        Ok(())
    }

    #[tokio::test]
    async fn convert_debits_source_and_credits_destination() -> anyhow::Result<()> {
        let store = store_with_user().await;
        let btc = store.generate_wallet("BTC", CoinType::Bitcoin).await?;
        let eth = store.generate_wallet("ETH", CoinType::Ethereum).await?;
        set_balance(&store, &btc.id, 1.0).await;
        set_balance(&store, &eth.id, 0.0).await;

        let tx = store.convert_coins(&btc.id, CoinType::Ethereum, 0.1).await?;
        assert_eq!(tx.kind, TxKind::Convert);
        assert_eq!(tx.coin_type, CoinType::Bitcoin);
        assert_eq!(tx.to_wallet_id.as_deref(), Some(eth.id.as_str()));
        assert!((tx.fee - 0.002).abs() < 1e-9);

        let source = store.wallet(&btc.id).await.unwrap();
        assert!((source.balance - 0.898).abs() < 1e-9);
        let destination = store.wallet(&eth.id).await.unwrap();
        assert!((destination.balance - 1.52).abs() < 1e-9);
        Ok(())
    }

    #[tokio::test]
    async fn convert_creates_missing_destination_wallet() -> anyhow::Result<()> {
        let store = store_with_user().await;
        let btc = store.generate_wallet("BTC", CoinType::Bitcoin).await?;
        set_balance(&store, &btc.id, 1.0).await;

        let tx = store.convert_coins(&btc.id, CoinType::Ethereum, 0.1).await?;
        let destination = store.wallet(tx.to_wallet_id.as_deref().unwrap()).await.unwrap();
        assert_eq!(destination.coin_type, CoinType::Ethereum);
        assert!(destination.is_default);
        Ok(())
    }

    #[tokio::test]
    async fn convert_after_restore_creates_fresh_destination() -> anyhow::Result<()> {
        let store = store_with_user().await;
        let restored = store.restore_wallets(&create_recovery_phrase()).await?;
        let btc = restored
            .iter()
            .find(|w| w.coin_type == CoinType::Bitcoin)
            .unwrap()
            .clone();
        let restored_eth = restored
            .iter()
            .find(|w| w.coin_type == CoinType::Ethereum)
            .unwrap()
            .clone();
        set_balance(&store, &btc.id, 1.0).await;

        // No default Ethereum wallet exists, so conversion creates a new
        // destination rather than crediting the restored non-default one.
        let tx = store.convert_coins(&btc.id, CoinType::Ethereum, 0.1).await?;
        assert_ne!(tx.to_wallet_id.as_deref(), Some(restored_eth.id.as_str()));
        let destination = store.wallet(tx.to_wallet_id.as_deref().unwrap()).await.unwrap();
        assert!(!destination.is_default);
        Ok(())
    }

    #[tokio::test]
    async fn convert_rejects_insufficient_balance_without_side_effects() -> anyhow::Result<()> {
        let store = store_with_user().await;
        let btc = store.generate_wallet("BTC", CoinType::Bitcoin).await?;
        set_balance(&store, &btc.id, 0.101).await;

        let err = store
            .convert_coins(&btc.id, CoinType::Ethereum, 0.1)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::InsufficientBalance { .. }));
        // The lazy destination wallet is not created on failure.
        assert!(store.default_wallet(Some(CoinType::Ethereum)).await.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn ledger_filters_by_participation() -> anyhow::Result<()> {
        let store = store_with_user().await;
        let btc = store.generate_wallet("BTC", CoinType::Bitcoin).await?;
        let eth = store.generate_wallet("ETH", CoinType::Ethereum).await?;
        set_balance(&store, &btc.id, 5.0).await;

        let send = store.send_coins(&btc.id, "0xelsewhere", 1.0).await?;
        let convert = store.convert_coins(&btc.id, CoinType::Ethereum, 1.0).await?;

        let btc_txs = store.wallet_transactions(&btc.id).await;
        assert_eq!(btc_txs.len(), 2);

        let eth_txs = store.wallet_transactions(&eth.id).await;
        assert_eq!(eth_txs.len(), 1);
        assert_eq!(eth_txs[0].id, convert.id);

        assert_eq!(store.transaction(&send.id).await.map(|tx| tx.kind), Some(TxKind::Send));
        Ok(())
    }

    #[tokio::test]
    async fn recovery_phrase_roundtrip() -> anyhow::Result<()> {
        let phrase = create_recovery_phrase();
        assert_eq!(phrase.split_whitespace().count(), 24);
        assert!(validate_recovery_phrase(&phrase));
        assert!(!validate_recovery_phrase("word soup that is not a mnemonic"));

        let store = store_with_user().await;
        let err = store.restore_wallets("definitely not valid").await.unwrap_err();
        assert!(matches!(err, WalletError::InvalidRecoveryPhrase));

        let restored = store.restore_wallets(&phrase).await?;
        let flags: Vec<_> = restored
            .iter()
            .map(|w| (w.coin_type, w.is_default))
            .collect();
        assert_eq!(
            flags,
            vec![
                (CoinType::Bitcoin, true),
                (CoinType::Ethereum, false),
                (CoinType::Solana, false),
            ]
        );
        // Only Bitcoin resolves as a default after restore.
        assert!(store.default_wallet(Some(CoinType::Bitcoin)).await.is_some());
        assert!(store.default_wallet(Some(CoinType::Ethereum)).await.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn state_survives_reload() -> anyhow::Result<()> {
        let backing = Arc::new(InMemoryStore::default());
        let clock = Arc::new(ManualClock::default());
        clock.set(1_700_000_000_000);
        let session = Arc::new(SessionStore::new(backing.clone(), clock.clone()));
        session.login("miner@example.com", "pw").await?;

        let store = WalletStore::with_seed(backing.clone(), session.clone(), clock.clone(), 3);
        store.load().await?;
        let wallet = store.generate_wallet("Main", CoinType::Bitcoin).await?;
        set_balance(&store, &wallet.id, 2.0).await;
        store.send_coins(&wallet.id, "0xsomeone", 1.0).await?;

        let reloaded = WalletStore::with_seed(backing, session, clock, 3);
        reloaded.load().await?;
        assert_eq!(reloaded.wallets().await.len(), 1);
        assert_eq!(reloaded.transactions().await.len(), 1);
        Ok(())
    }
}
