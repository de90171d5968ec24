use std::net::TcpListener;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use vidtube::configuration::get_configuration;
use vidtube::media::MediaClient;
use vidtube::startup::run;
use vidtube::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    let connection_string = configuration.database.connection_string();
    tracing::info!("Attempting to connect to database");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&connection_string)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create connection pool: {}", e);
            std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "Database connection error",
            )
        })?;

    tracing::info!("Database connection pool created successfully");

    // Media host calls carry a bounded timeout so a stalled upload never
    // pins a request forever.
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(configuration.media.timeout_seconds))
        .build()
        .map_err(|e| {
            tracing::error!("Failed to build media http client: {}", e);
            std::io::Error::new(std::io::ErrorKind::Other, "Media client error")
        })?;
    let media_client = MediaClient::new(
        configuration.media.base_url.clone(),
        configuration.media.api_key.clone(),
        http_client,
    );

    let address = format!("127.0.0.1:{}", configuration.application.port);
    tracing::info!("Binding server to address: {}", address);

    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    let server = run(
        listener,
        pool,
        configuration.jwt.clone(),
        media_client,
        configuration.media.clone(),
    )?;
    tracing::info!("Server started successfully");

    let _ = server.await;

    Ok(())
}
