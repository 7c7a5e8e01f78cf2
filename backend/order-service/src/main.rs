use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use db_pool::{create_pool, DbConfig};
use kafka_bus::EventProducer;
use order_service::db::OrderRepository;
use order_service::services::OrderService;
use order_service::{handlers, schema};
use service_config::Config;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transactional_outbox::{BusOutboxPublisher, MySqlOutboxRepository, OutboxDispatcher};

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate =
            signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = terminate.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("configuration loading failed: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        service = %config.service_name,
        "starting order-service v{}",
        env!("CARGO_PKG_VERSION")
    );

    let db_config = DbConfig::new(&config.service_name, &config.mysql_dsn);
    db_config.log_config();
    let pool = match create_pool(db_config).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("database pool creation failed: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = schema::ensure_tables(&pool).await {
        tracing::error!("schema bootstrap failed: {e}");
        std::process::exit(1);
    }

    let producer = match EventProducer::new(&config.brokers()) {
        Ok(producer) => Arc::new(producer),
        Err(e) => {
            tracing::error!("kafka producer creation failed: {e}");
            std::process::exit(1);
        }
    };

    let poll_interval = match config.poll_interval() {
        Ok(interval) => interval,
        Err(e) => {
            tracing::error!("invalid outbox poll interval: {e}");
            std::process::exit(1);
        }
    };

    let outbox = Arc::new(MySqlOutboxRepository::new(pool.clone()));
    let dispatcher = OutboxDispatcher::new(
        outbox.clone(),
        Arc::new(BusOutboxPublisher::new(producer.clone())),
        poll_interval,
    );

    let order_service = web::Data::new(OrderService::new(pool.clone(), outbox.clone()));
    let order_repo = web::Data::new(OrderRepository::new(pool.clone()));

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let bind_address = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting HTTP server at {bind_address}");

    let server = HttpServer::new(move || {
        App::new()
            .app_data(order_service.clone())
            .app_data(order_repo.clone())
            .wrap(Cors::default().allow_any_origin().allow_any_method().allow_any_header())
            .wrap(tracing_actix_web::TracingLogger::default())
            .route("/healthz", web::get().to(handlers::health))
            .service(
                web::scope("/orders")
                    .route("", web::post().to(handlers::create_order))
                    .route("", web::get().to(handlers::list_orders))
                    .route("/{id}", web::get().to(handlers::get_order))
                    .route("/{id}/pay", web::post().to(handlers::pay_order))
                    .route("/{id}/cancel", web::post().to(handlers::cancel_order)),
            )
    })
    .bind(&bind_address)?
    .run();
    let server_handle = server.handle();

    let dispatcher_shutdown = shutdown_tx.subscribe();
    let dispatcher_task =
        tokio::spawn(async move { dispatcher.run(dispatcher_shutdown).await });
    let mut server_task = tokio::spawn(server);

    tokio::select! {
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
            let _ = shutdown_tx.send(());
            server_handle.stop(true).await;
            let _ = (&mut server_task).await;
        }
        result = &mut server_task => {
            tracing::error!("HTTP server exited unexpectedly: {result:?}");
            let _ = shutdown_tx.send(());
        }
    }

    if let Err(e) = dispatcher_task.await {
        tracing::error!("dispatcher task join error: {e}");
    }
    producer.close();

    tracing::info!("order-service stopped");
    Ok(())
}
