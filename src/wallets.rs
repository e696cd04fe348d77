use crate::ledger::{
    AccountProvider,
    EventStream,
};
use alloy::{
    primitives::Address,
    signers::local::PrivateKeySigner,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use eth_keystore::decrypt_key;
use futures::StreamExt;
use rpassword::prompt_password;
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
    sync::{
        Arc,
        Mutex,
    },
};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;

/// An encrypted keystore file on disk, named by its file stem.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Keystore {
    pub name: String,
    pub path: PathBuf,
}

impl Keystore {
    fn from_path(path: PathBuf) -> Option<Self> {
        let looks_like_keystore = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            None | Some("json")
        );
        if !path.is_file() || !looks_like_keystore {
            return None;
        }
        let name = path.file_stem()?.to_str()?.to_owned();
        Some(Self { name, path })
    }

    /// Prompts for the password on the controlling terminal and decrypts the key.
    pub fn unlock(&self) -> Result<PrivateKeySigner> {
        let password = prompt_password(format!("Password for keystore '{}': ", self.name))
            .wrap_err("Could not read the keystore password")?;
        let secret = decrypt_key(&self.path, password.as_bytes())
            .map_err(|err| eyre!("Could not decrypt keystore '{}': {err}", self.name))?;
        PrivateKeySigner::from_slice(&secret)
            .map_err(|err| eyre!("Keystore '{}' holds an unusable key: {err}", self.name))
    }
}

/// Foundry's keystore directory under `$HOME`.
pub fn default_keystore_dir() -> Result<PathBuf> {
    let home = std::env::var_os("HOME").ok_or_else(|| eyre!("$HOME is not set"))?;
    Ok(PathBuf::from(home).join(".foundry").join("keystores"))
}

pub fn resolve_keystore_dir(dir: Option<&str>) -> Result<PathBuf> {
    dir.map_or_else(default_keystore_dir, |raw| {
        Ok(PathBuf::from(shellexpand::tilde(raw).into_owned()))
    })
}

/// Keystores in `dir`, sorted by name. A missing directory holds none.
pub fn list_keystores(dir: &Path) -> Result<Vec<Keystore>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(dir)
        .wrap_err_with(|| format!("Could not list keystores in {}", dir.display()))?;
    let mut keystores = entries
        .map(|entry| entry.map(|e| Keystore::from_path(e.path())))
        .filter_map(|entry| entry.transpose())
        .collect::<std::io::Result<Vec<_>>>()
        .wrap_err("Could not read a keystore entry")?;
    keystores.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(keystores)
}

pub fn find_keystore(dir: &Path, name: &str) -> Result<Keystore> {
    list_keystores(dir)?
        .into_iter()
        .find(|keystore| keystore.name == name)
        .ok_or_else(|| eyre!("No keystore named '{name}' in {}", dir.display()))
}

/// Builds a signer from a hex private key, with or without `0x`.
pub fn dev_signer(raw: &str) -> Result<PrivateKeySigner> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = hex::decode(digits).wrap_err("Dev key is not valid hex")?;
    PrivateKeySigner::from_slice(&bytes).map_err(|e| eyre!("Dev key rejected: {e}"))
}

/// Wallet-side account list with a switchable active account.
///
/// Stands in for a browser wallet's account picker: switching emits on every
/// stream handed out by [`AccountProvider::accounts_changed`].
#[derive(Clone)]
pub struct AccountSelector {
    accounts: Arc<Vec<Address>>,
    active: Arc<Mutex<usize>>,
    changes: broadcast::Sender<Address>,
}

impl AccountSelector {
    pub fn new(accounts: Vec<Address>) -> Result<Self> {
        if accounts.is_empty() {
            return Err(eyre!("At least one account is required"));
        }
        let (changes, _) = broadcast::channel(16);
        Ok(Self {
            accounts: Arc::new(accounts),
            active: Arc::new(Mutex::new(0)),
            changes,
        })
    }

    pub fn active(&self) -> Result<Address> {
        let index = *self
            .active
            .lock()
            .map_err(|_| eyre!("account selector lock poisoned"))?;
        Ok(self.accounts[index])
    }
}

impl AccountProvider for AccountSelector {
    async fn request_accounts(&self) -> Result<Vec<Address>> {
        let active = self.active()?;
        let mut accounts = vec![active];
        accounts.extend(self.accounts.iter().copied().filter(|a| *a != active));
        Ok(accounts)
    }

    fn accounts_changed(&self) -> EventStream<Address> {
        BroadcastStream::new(self.changes.subscribe())
            .filter_map(|change| async move {
                match change {
                    Ok(account) => Some(account),
                    Err(err) => {
                        warn!(?err, "account change stream lagged");
                        None
                    }
                }
            })
            .boxed_local()
    }

    fn switch_account(&self, account: Address) -> Result<()> {
        let index = self
            .accounts
            .iter()
            .position(|a| *a == account)
            .ok_or_else(|| eyre!("Account {account} is not managed by this wallet"))?;
        *self
            .active
            .lock()
            .map_err(|_| eyre!("account selector lock poisoned"))? = index;
        // Nobody listening yet is fine; the next request_accounts sees it.
        let _ = self.changes.send(account);
        Ok(())
    }
}
