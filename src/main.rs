// src/main.rs

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use factory_backend::{
    app::build_app,
    common::safe_mode,
    config::{AppState, SecretConfig},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Inicializa o logger (RUST_LOG, padrão "info")
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    // Lido UMA vez; daqui em diante ninguém mais olha o ambiente
    let config = SecretConfig::from_env();

    let status = safe_mode::evaluate(&config);
    if status.active {
        tracing::warn!(reasons = ?status.reasons, "⚠️ Modo seguro ATIVO: efeitos externos desligados");
    }

    // Em produção, segredo de sessão inválido => não sobe (exit code 1)
    let bind_addr = config.bind_addr.clone();
    let app_state = match AppState::new(config).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "❌ Falha ao inicializar o estado da aplicação");
            std::process::exit(1);
        }
    };

    let app = build_app(app_state);

    // Inicia o servidor
    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
