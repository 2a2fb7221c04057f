//! # PlantMart
//!
//! Plant marketplace backend.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export STRIPE_SECRET_KEY=sk_test_...
//! export FIREBASE_API_KEY=...
//! export DATABASE_URL=postgres://localhost/plantmart
//! export CLIENT_DOMAIN=http://localhost:5173
//!
//! # Run the server
//! plantmart
//! ```

use plant_api::{routes, state::AppState};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    print_banner();

    let state = AppState::new().await?;

    let addr = state.config.socket_addr()?;
    let is_prod = state.config.is_production();

    info!("Environment: {}", state.config.environment);
    info!("Client origin: {}", state.config.client_domain);
    info!("Payment provider: {}", state.broker.provider_name());

    let app = routes::create_router(state);

    info!("PlantMart starting on http://{}", addr);

    if !is_prod {
        info!("Health: http://{}/health", addr);
        info!("Checkout: POST http://{}/create-checkout-session", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
  PlantMart
  ━━━━━━━━━━━━━━━━━━━━━━━
  Plant marketplace backend
  Version: {}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
