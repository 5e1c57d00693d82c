use std::fs;
use std::path::Path;

const TOKEN_SECRET: &str = "auth_token.secret";
const TOKEN_SECRET_LEN: usize = 32;

/// Signing material for auth tokens.
#[derive(Clone)]
pub struct Security {
    pub token_secret: Vec<u8>,
}

impl std::fmt::Debug for Security {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Security(..)")
    }
}

impl Security {
    /// Loads the token secret from `dir`, generating and storing a new one if
    /// it's missing or too short.
    pub fn load(dir: impl AsRef<Path>) -> std::io::Result<Security> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let path = dir.join(TOKEN_SECRET);
        tracing::info!("Loading token signing secret...");

        let token_secret = match fs::read(&path) {
            Ok(secret) if secret.len() >= TOKEN_SECRET_LEN => {
                tracing::info!("Token secret found and loaded.");
                secret
            }
            _ => {
                tracing::info!(
                    "Token secret not found in '{}'. Generating a new one.",
                    path.display()
                );
                let secret: [u8; TOKEN_SECRET_LEN] = rand::random();
                fs::write(&path, secret)?;
                secret.to_vec()
            }
        };

        Ok(Security { token_secret })
    }

    /// Throwaway secret that's never written anywhere.
    pub fn ephemeral() -> Security {
        let secret: [u8; TOKEN_SECRET_LEN] = rand::random();
        Security {
            token_secret: secret.to_vec(),
        }
    }
}
