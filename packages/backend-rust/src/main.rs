use noobular_backend::config::Config;
use noobular_backend::db::Database;
use noobular_backend::logging::init_tracing;
use noobular_backend::services::course_loader::load_courses_dir;
use noobular_backend::state::AppState;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();
    let _log_guard = init_tracing(&config.log_level);

    if let Err(err) = config.engine.validate() {
        tracing::error!(error = %err, "invalid engine configuration");
        std::process::exit(1);
    }

    let db = match Database::open(&config.database_path).await {
        Ok(db) => db,
        Err(err) => {
            tracing::error!(path = %config.database_path.display(), error = %err, "database not initialized");
            std::process::exit(1);
        }
    };
    tracing::info!(path = %config.database_path.display(), "database ready");

    let report = load_courses_dir(&db, &config.courses_dir, chrono::Utc::now().timestamp_millis()).await;
    tracing::info!(
        dir = %config.courses_dir.display(),
        loaded = report.loaded,
        skipped = report.skipped,
        invalid = report.invalid,
        "course directory scanned"
    );

    let state = AppState::new(db, config.engine.clone());
    let app = noobular_backend::create_app(state);

    let addr = config.bind_addr();
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(%addr, error = %err, "bind listener failed");
            std::process::exit(1);
        }
    };
    tracing::info!(%addr, "noobular-backend listening");

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    if let Err(e) = server.await {
        tracing::error!(error = %e, "server error");
    }

    tracing::info!("graceful shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
