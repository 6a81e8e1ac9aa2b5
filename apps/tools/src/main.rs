use anyhow::Result;
use clap::{Parser, Subcommand};
use storage::{SessionStore, JWT_STORAGE_KEY};

#[derive(Parser, Debug)]
#[command(about = "Admin helper for the local session store")]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/session.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print whether a token is persisted (without revealing it).
    Show,
    /// Store a token, replacing any existing one.
    SetToken { token: String },
    /// Remove the persisted token.
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let store = SessionStore::new(&cli.database_url).await?;
    store.health_check().await?;

    match cli.command {
        Command::Show => match store.load_token().await? {
            Some(token) => println!(
                "session token present under key {JWT_STORAGE_KEY:?} ({} chars)",
                token.len()
            ),
            None => println!("no session token stored"),
        },
        Command::SetToken { token } => {
            store.store_token(&token).await?;
            println!("session token stored");
        }
        Command::Clear => {
            store.clear_token().await?;
            println!("session token cleared");
        }
    }

    Ok(())
}
