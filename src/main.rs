use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use recipe_backend::db::readiness::connect_when_ready;
use recipe_backend::db::schema::create_tables;
use recipe_backend::db::services::user_service;
use recipe_backend::server::config::ServerConfig;
use recipe_backend::server::logging::init_logging;
use recipe_backend::web::create_axum_router;

#[derive(Parser, Debug)]
#[command(author, version, about = "Recipe API server", long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Wait for the database, create the schema and serve the API (default)
    Serve,
    /// Block until the database accepts connections, then exit
    WaitForDb,
    /// Create an account with staff and superuser rights
    CreateSuperuser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "")]
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    let config = match ServerConfig::load(args.config.as_deref()) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Failed to load server configuration: {e}");
            return Err(e.into());
        }
    };

    init_logging(&config.log_dir);
    info!("Starting recipe server, version: {}", env!("CARGO_PKG_VERSION"));

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::WaitForDb => {
            connect_when_ready(&config.database_url, 1, &config.wait_options()).await?;
            Ok(())
        }
        Command::CreateSuperuser { email, password, name } => {
            let db_pool = connect_when_ready(&config.database_url, 1, &config.wait_options()).await?;
            create_tables(&db_pool).await?;
            let user = user_service::create_superuser(&db_pool, &email, &password, &name, config.bcrypt_cost)
                .await
                .inspect_err(|e| error!(error = %e, "Failed to create superuser."))?;
            info!(user_id = user.id, email = %user.email, "Superuser created.");
            Ok(())
        }
    }
}

async fn serve(config: Arc<ServerConfig>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let db_pool = connect_when_ready(&config.database_url, config.max_connections, &config.wait_options()).await?;
    create_tables(&db_pool).await?;

    let addr: SocketAddr = config.bind_addr.parse()?;
    let socket = if addr.is_ipv4() {
        tokio::net::TcpSocket::new_v4()?
    } else {
        tokio::net::TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.set_keepalive(true)?;
    socket.bind(addr)?;
    let listener = socket.listen(1024)?;
    info!(address = %addr, "HTTP server listening");

    let app = create_axum_router(db_pool, config);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for the shutdown signal.");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received.");
}
