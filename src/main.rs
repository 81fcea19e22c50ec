use clap::{Parser, Subcommand};
use strum::IntoEnumIterator;
use tracing_subscriber::EnvFilter;

use keygate::config::Config;
use keygate::crypto::hash_secret;
use keygate::db::{self, AppState, queries};
use keygate::models::Plan;
use keygate::payments::PixClient;
use keygate::util::normalize_email;
use keygate::{handlers, reconcile};

#[derive(Parser)]
#[command(name = "keygate", about = "Machine-bound timed license service", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the license server (default)
    Serve,
    /// Create an administrator account, or promote an existing account
    CreateAdmin { email: String, password: String },
    /// Mint single-use activation keys for a plan
    GenKeys {
        plan: String,
        #[arg(long, default_value_t = 1)]
        count: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("keygate=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    let pool = db::open_pool(&config.database_path)?;
    let conn = pool.get()?;
    db::init_schema(&conn)?;
    drop(conn);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, pool).await,
        Command::CreateAdmin { email, password } => {
            let conn = pool.get()?;
            let email = normalize_email(&email);
            match queries::get_account_by_email(&conn, &email)? {
                Some(account) => {
                    queries::promote_to_admin(&conn, &account.id)?;
                    println!("promoted {} to administrator", email);
                }
                None => {
                    queries::create_account(&conn, &email, &hash_secret(&password), true)?;
                    println!("created administrator {}", email);
                }
            }
            Ok(())
        }
        Command::GenKeys { plan, count } => {
            let plan: Plan = plan.parse().map_err(|_| {
                let known: Vec<&str> = Plan::iter().map(|p| p.into()).collect();
                anyhow::anyhow!("unknown plan '{}'; expected one of: {}", plan, known.join(", "))
            })?;
            let conn = pool.get()?;
            for _ in 0..count {
                let key =
                    queries::create_activation_key(&conn, plan.as_ref(), plan.duration_days())?;
                println!("{}", key.key);
            }
            Ok(())
        }
    }
}

async fn serve(config: Config, pool: db::DbPool) -> anyhow::Result<()> {
    let provider = PixClient::new(&config);
    let state = AppState {
        db: pool,
        config: config.clone(),
        provider,
    };

    tokio::spawn(reconcile::run_poller(state.clone()));

    let app = handlers::router(state);
    let listener = tokio::net::TcpListener::bind(config.addr()).await?;
    tracing::info!(addr = %config.addr(), dev_mode = config.dev_mode, "keygate listening");
    axum::serve(listener, app).await?;
    Ok(())
}
