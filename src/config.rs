use crate::error::ConfigurationError;
use crate::util;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

fn default_data_dir() -> PathBuf {
    PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string()))
}

fn default_security_dir() -> PathBuf {
    PathBuf::from(env::var("SECURITY_DIR").unwrap_or_else(|_| "./security".to_string()))
}

fn default_action_log_path() -> Option<PathBuf> {
    env::var("ACTION_LOG_PATH").ok().map(PathBuf::from)
}

fn default_admin_usernames() -> Vec<String> {
    vec![]
}

fn default_enforce_prerequisites() -> bool {
    env::var("ENFORCE_PREREQUISITES")
        .map(|it| matches!(it.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

fn default_seed_username() -> String {
    env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string())
}

fn default_seed_password() -> Option<String> {
    env::var("ADMIN_PASSWORD").ok()
}

fn default_seed_name() -> String {
    "System Administrator".to_string()
}

/// Account created when the user collection is empty.
#[derive(Clone, Serialize, Deserialize)]
pub struct SeedAdmin {
    #[serde(default = "default_seed_username")]
    pub username: String,
    /// Read from the file or `ADMIN_PASSWORD`, never written back.
    #[serde(default = "default_seed_password", skip_serializing)]
    pub password: Option<String>,
    #[serde(default = "default_seed_name")]
    pub name: String,
}

impl Default for SeedAdmin {
    fn default() -> Self {
        SeedAdmin {
            username: default_seed_username(),
            password: default_seed_password(),
            name: default_seed_name(),
        }
    }
}

impl SeedAdmin {
    /// The configured password, or a freshly generated one that's logged once
    /// so the operator can sign in.
    pub fn password_or_generated(&self) -> String {
        match &self.password {
            Some(password) => password.clone(),
            None => {
                use rand::distributions::{Alphanumeric, DistString};
                let generated = Alphanumeric.sample_string(&mut rand::thread_rng(), 16);
                tracing::warn!(
                    "ADMIN_PASSWORD not set. Generated seed admin password: {}",
                    generated
                );
                generated
            }
        }
    }
}

impl std::fmt::Debug for SeedAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SeedAdmin:{}", self.username)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip)]
    file_path: PathBuf,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_security_dir")]
    pub security_dir: PathBuf,
    #[serde(default = "default_action_log_path")]
    pub action_log_path: Option<PathBuf>,

    /// Signups with one of these usernames are given the admin role.
    #[serde(default = "default_admin_usernames")]
    pub admin_usernames: Vec<String>,
    #[serde(default)]
    pub seed_admin: SeedAdmin,

    #[serde(default = "default_enforce_prerequisites")]
    pub enforce_prerequisites: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            file_path: config_dir().join("settings.yml"),
            data_dir: default_data_dir(),
            security_dir: default_security_dir(),
            action_log_path: default_action_log_path(),
            admin_usernames: default_admin_usernames(),
            seed_admin: SeedAdmin::default(),
            enforce_prerequisites: default_enforce_prerequisites(),
        }
    }
}

#[inline]
fn config_dir() -> PathBuf {
    PathBuf::from(env::var("CONFIG_DIR").unwrap_or_else(|_| "./config".to_string()))
}

impl Config {
    /// Configuration with every path rooted in `root`; used for tests and
    /// throwaway instances.
    pub fn rooted(root: impl AsRef<Path>) -> Config {
        let root = root.as_ref();
        Config {
            file_path: root.join("config").join("settings.yml"),
            data_dir: root.join("data"),
            security_dir: root.join("security"),
            action_log_path: None,
            admin_usernames: vec![],
            seed_admin: SeedAdmin {
                username: "admin".to_string(),
                password: Some("admin_password".to_string()),
                name: default_seed_name(),
            },
            enforce_prerequisites: false,
        }
    }

    pub fn load() -> Result<Config, ConfigurationError> {
        Config::load_from(config_dir())
    }

    pub fn load_from(dir: impl AsRef<Path>) -> Result<Config, ConfigurationError> {
        let dir = dir.as_ref();
        let config_file =
            util::find_first_subpath(dir, &["settings.yml", "settings.yaml"], Path::exists)
                .ok_or_else(|| ConfigurationError::NotFound(dir.to_path_buf()))?;

        let file = File::open(&config_file)?;
        let mut config: Config = serde_yaml::from_reader(BufReader::new(file))?;
        config.file_path = config_file;

        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigurationError> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&self.file_path)?;
        let mut out = BufWriter::new(file);
        serde_yaml::to_writer(&mut out, self)?;
        out.flush()?;
        Ok(())
    }
}
