use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;

use route_auth::auth::SessionSealer;
use route_auth::store::InMemoryCredentialStore;
use route_auth::utils::hash_password;

#[derive(Parser, Debug)]
#[command(author, version, about = "route-auth admin tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print an argon2 hash suitable for a principals file `password_hash`
    HashPassword { password: String },
    /// Decrypt a session cookie value and print its payload
    InspectSession {
        /// Signing secret; defaults to SESSION_SECRET
        #[arg(long)]
        secret: Option<String>,
        value: String,
    },
    /// Load a principals file and report how many entries it holds
    CheckPrincipals { path: std::path::PathBuf },
}

fn main() -> anyhow::Result<()> {
    if dotenv().is_err() {
        let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::HashPassword { password } => {
            println!("{}", hash_password(&password)?);
        }
        Commands::InspectSession { secret, value } => {
            let secret = match secret {
                Some(secret) => secret,
                None => std::env::var("SESSION_SECRET").context("pass --secret or set SESSION_SECRET")?,
            };
            let sealer = SessionSealer::new(secret.as_bytes())?;
            let session = sealer.unseal(&value)?;
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
        Commands::CheckPrincipals { path } => {
            let store = InMemoryCredentialStore::from_file(&path)?;
            println!("{}: {} principal(s)", path.display(), store.len());
        }
    }

    Ok(())
}
