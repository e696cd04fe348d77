use alloy::primitives::Address;
use chrono::Utc;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    fs,
    path::{
        Path,
        PathBuf,
    },
};

pub const DEPLOYMENTS_ROOT: &str = ".deployments";
const DEPLOYMENTS_FILE: &str = "deployments.json";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeploymentEnv {
    Local,
    Sepolia,
}

impl DeploymentEnv {
    pub const ALL: [DeploymentEnv; 2] = [DeploymentEnv::Local, DeploymentEnv::Sepolia];

    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Sepolia => "sepolia",
        }
    }
}

impl fmt::Display for DeploymentEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeploymentEnv::Local => "local node",
            DeploymentEnv::Sepolia => "Sepolia",
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub recorded_at: String,
    pub contract_address: Address,
    pub network_url: String,
}

impl DeploymentRecord {
    pub fn now(contract_address: Address, network_url: impl Into<String>) -> Self {
        Self {
            recorded_at: Utc::now().to_rfc3339(),
            contract_address,
            network_url: network_url.into(),
        }
    }
}

/// Known lottery deployments for one network, kept as a JSON array on disk.
#[derive(Debug)]
pub struct DeploymentStore {
    env: DeploymentEnv,
    path: PathBuf,
}

impl DeploymentStore {
    pub fn new(env: DeploymentEnv) -> Result<Self> {
        Self::new_in(Path::new(DEPLOYMENTS_ROOT), env)
    }

    pub fn new_in(root: &Path, env: DeploymentEnv) -> Result<Self> {
        let path = init_network_file(root, env)?;
        Ok(Self { env, path })
    }

    pub fn load(&self) -> Result<Vec<DeploymentRecord>> {
        let raw = fs::read_to_string(&self.path).wrap_err_with(|| {
            format!("Reading {} lottery deployments", self.env)
        })?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&raw)
            .wrap_err_with(|| format!("{} is not a deployment list", self.path.display()))
    }

    pub fn append(&self, record: DeploymentRecord) -> Result<()> {
        let records: Vec<_> = self.load()?.into_iter().chain([record]).collect();
        let json = serde_json::to_string_pretty(&records)
            .wrap_err("Encoding lottery deployments")?;
        fs::write(&self.path, json).wrap_err_with(|| {
            format!("Saving {} lottery deployments", self.env)
        })
    }

    /// Most recently appended record.
    pub fn latest(&self) -> Result<DeploymentRecord> {
        self.load()?.pop().ok_or_else(|| {
            eyre!(
                "No {} lottery deployment recorded in {}; pass --contract <address>",
                self.env,
                self.path.display()
            )
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Creates `<root>/<network>/deployments.json` for every network.
pub fn ensure_structure(root: &Path) -> Result<()> {
    DeploymentEnv::ALL
        .into_iter()
        .try_for_each(|env| init_network_file(root, env).map(drop))
}

fn init_network_file(root: &Path, env: DeploymentEnv) -> Result<PathBuf> {
    let dir = root.join(env.dir_name());
    fs::create_dir_all(&dir)
        .wrap_err_with(|| format!("Creating deployment directory {}", dir.display()))?;
    let path = dir.join(DEPLOYMENTS_FILE);
    if !path.exists() {
        fs::write(&path, "[]")
            .wrap_err_with(|| format!("Seeding {} for {env}", path.display()))?;
    }
    Ok(path)
}
