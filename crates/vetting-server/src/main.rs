//! vetting-bot binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered with
//! `VETTING__SECTION__KEY` environment variables, opens the SQLite case
//! store, reschedules every open poll, and serves the operator API.
//!
//! # Password hash generation
//!
//! To generate the argon2 PHC string for `server.auth_password_hash`:
//!
//! ```
//! cargo run -p vetting-server --bin vetting-bot -- --hash-password
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::Parser;
use rand_core::OsRng;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use vetting_engine::service::VettingService;
use vetting_matrix::MatrixClient;
use vetting_server::{AppState, ServerConfig, auth::AuthConfig};
use vetting_store_sqlite::SqliteStore;

#[derive(Parser)]
#[command(author, version, about = "Matrix vetting bot")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if cli.hash_password {
    let password = read_password()?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
      .to_string();
    println!("{hash}");
    return Ok(());
  }

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config.as_path()).required(false))
    .add_source(
      config::Environment::with_prefix("VETTING")
        .separator("__")
        .try_parsing(true),
    )
    .build()
    .with_context(|| format!("failed to read config from {:?}", cli.config))?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;
  server_cfg.validate().context("invalid configuration")?;

  let db_path = expand_tilde(&server_cfg.storage.database);
  let store = SqliteStore::open(&db_path)
    .await
    .with_context(|| format!("failed to open store at {db_path:?}"))?;

  let transport =
    MatrixClient::new(server_cfg.matrix_config()).context("failed to build matrix client")?;

  let service = VettingService::new(
    Arc::new(store),
    Arc::new(transport),
    Arc::new(server_cfg.engine_config()),
  );

  let recovered = service
    .scheduler()
    .recover_all()
    .await
    .context("failed to reschedule open polls")?;
  tracing::info!(recovered, "poll closures restored");

  let http = &server_cfg.server;
  let state = AppState {
    service,
    auth: Arc::new(AuthConfig {
      username:      http.auth_username.clone(),
      password_hash: http.auth_password_hash.clone(),
    }),
  };

  let app = vetting_server::router(state);
  let address = format!("{}:{}", http.host, http.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Read a password line from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
