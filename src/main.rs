use std::{net::SocketAddr, sync::Arc, time::Duration};

use mongodb::Client;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use stockwatch::{
    config::{self, DataBackend},
    logging, routes,
    services::{
        alerts_service::MongoAlertStore,
        db_init,
        finnhub::FinnhubClient,
        market_data::MarketData,
        notifier::{HttpEventNotifier, LogNotifier, Notifier},
        scheduler,
        user_directory::MongoUserDirectory,
        watchlist_service::MongoWatchlistStore,
    },
    templates, AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let settings = config::load();
    let hbs = templates::build_handlebars()?;
    let timeout = Duration::from_secs(settings.http_timeout_secs);

    if settings.finnhub_api_key.trim().is_empty() {
        tracing::warn!("FINNHUB_API_KEY is not set; market data requests will fail");
    }

    let market: Arc<dyn MarketData> = Arc::new(FinnhubClient::new(
        settings.finnhub_api_key.clone(),
        settings.finnhub_base_url.clone(),
        timeout,
    ));

    let notifier: Arc<dyn Notifier> = if settings.event_key.trim().is_empty() {
        tracing::warn!("EVENT_KEY is not set; notifications are only logged");
        Arc::new(LogNotifier)
    } else {
        Arc::new(HttpEventNotifier::new(
            &settings.event_api_url,
            &settings.event_key,
            hbs.clone(),
            &settings.app_url,
            timeout,
        ))
    };

    let state = match settings.data_backend {
        DataBackend::Memory => {
            tracing::warn!("using the in-memory backend; data is lost on restart");
            AppState::in_memory(settings.clone(), hbs, market, notifier).0
        }
        DataBackend::Mongo => {
            let client = Client::with_uri_str(&settings.mongodb_uri).await?;
            let db = client.database(&settings.mongodb_db);

            if let Err(e) = db_init::ensure_indexes(&db).await {
                tracing::error!(error = %e, "cannot ensure indexes");
            }

            AppState::new(
                settings.clone(),
                hbs,
                market,
                Arc::new(MongoAlertStore::new(db.clone())),
                Arc::new(MongoWatchlistStore::new(db.clone())),
                Arc::new(MongoUserDirectory::new(db)),
                notifier,
            )
        }
    };

    if settings.scheduler_enabled {
        scheduler::spawn_alert_monitor(
            state.evaluator.clone(),
            Duration::from_secs(settings.alert_check_interval_secs),
        );
        scheduler::spawn_digest_jobs(state.clone());
        tracing::info!(
            every_secs = settings.alert_check_interval_secs,
            digest_hour_utc = settings.digest_hour_utc,
            "background jobs started"
        );
    }

    let app = routes::app(state)
        .layer(TimeoutLayer::new(timeout * 3))
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from((settings.host.parse::<std::net::IpAddr>()?, settings.port));
    tracing::info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
