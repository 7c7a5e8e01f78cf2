use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use db_pool::{create_pool, DbConfig};
use event_schema::topics;
use idempotent_consumer::{IdempotencyGuard, MySqlProcessedEventStore};
use kafka_bus::{EventConsumer, EventProducer};
use product_service::consumer::OrderCreatedHandler;
use product_service::db::ProductRepository;
use product_service::services::ProductService;
use product_service::{handlers, schema};
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
        "starting product-service v{}",
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

    let products = Arc::new(ProductRepository::new(pool.clone()));
    let product_service = web::Data::new(ProductService::new(pool.clone(), outbox.clone()));
    let products_data = web::Data::new(products.clone());

    // order.created consumer with relational idempotency tracking.
    let guard = IdempotencyGuard::new(
        MySqlProcessedEventStore::new(pool.clone()),
        config.service_name.clone(),
    );
    let order_handler = Arc::new(OrderCreatedHandler::new(
        products.clone(),
        producer.clone(),
        guard,
    ));
    let order_consumer = match EventConsumer::new(
        &config.brokers(),
        topics::ORDER_CREATED,
        &config.service_name,
        producer.clone(),
    ) {
        Ok(consumer) => consumer,
        Err(e) => {
            tracing::error!("kafka consumer creation failed: {e}");
            std::process::exit(1);
        }
    };

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let bind_address = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting HTTP server at {bind_address}");

    let server = HttpServer::new(move || {
        App::new()
            .app_data(product_service.clone())
            .app_data(products_data.clone())
            .wrap(Cors::default().allow_any_origin().allow_any_method().allow_any_header())
            .wrap(tracing_actix_web::TracingLogger::default())
            .route("/healthz", web::get().to(handlers::health))
            .service(
                web::scope("/products")
                    .route("", web::post().to(handlers::create_product))
                    .route("", web::get().to(handlers::list_products))
                    .route("/{id}", web::get().to(handlers::get_product))
                    .route("/{id}", web::put().to(handlers::update_product)),
            )
    })
    .bind(&bind_address)?
    .run();
    let server_handle = server.handle();

    let dispatcher_shutdown = shutdown_tx.subscribe();
    let dispatcher_task =
        tokio::spawn(async move { dispatcher.run(dispatcher_shutdown).await });

    let consumer_shutdown = shutdown_tx.subscribe();
    let consumer_task = tokio::spawn(async move {
        order_consumer.run(consumer_shutdown, order_handler).await
    });

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
    if let Err(e) = consumer_task.await {
        tracing::error!("consumer task join error: {e}");
    }
    producer.close();

    tracing::info!("product-service stopped");
    Ok(())
}
