use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use event_schema::topics;
use idempotent_consumer::{IdempotencyGuard, MongoProcessedEventStore};
use kafka_bus::{EventConsumer, EventProducer};
use query_service::consumer::{EventRouter, TopicHandler};
use query_service::handlers;
use query_service::projections::{OrderProjection, ProductProjection, UserProjection};
use service_config::Config;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DB_NAME: &str = "ecommerce";

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
                .unwrap_or_else(|_| "info".into()),
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
        "starting query-service v{}",
        env!("CARGO_PKG_VERSION")
    );

    let mongo = match mongodb::Client::with_uri_str(&config.mongo_uri).await {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("mongodb connection failed: {e}");
            std::process::exit(1);
        }
    };
    let db = mongo
        .default_database()
        .unwrap_or_else(|| mongo.database(DB_NAME));

    let store = MongoProcessedEventStore::new(&db);
    if let Err(e) = store.ensure_indexes().await {
        tracing::error!("failed to create processed_events index: {e}");
        std::process::exit(1);
    }

    let users = Arc::new(UserProjection::new(&db));
    let products = Arc::new(ProductProjection::new(&db));
    let orders = Arc::new(OrderProjection::new(&db));

    let guard = IdempotencyGuard::new(store, config.service_name.clone());
    let router = Arc::new(EventRouter::new(
        users.clone(),
        products.clone(),
        orders.clone(),
        guard,
    ));

    // The producer only feeds the DLQ side of the consumers here.
    let producer = match EventProducer::new(&config.brokers()) {
        Ok(producer) => Arc::new(producer),
        Err(e) => {
            tracing::error!("kafka producer creation failed: {e}");
            std::process::exit(1);
        }
    };

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let mut consumers: JoinSet<()> = JoinSet::new();
    for topic in topics::ALL {
        let consumer = match EventConsumer::new(
            &config.brokers(),
            topic,
            &config.service_name,
            producer.clone(),
        ) {
            Ok(consumer) => consumer,
            Err(e) => {
                tracing::error!(topic = %topic, "kafka consumer creation failed: {e}");
                std::process::exit(1);
            }
        };

        let handler = Arc::new(TopicHandler::new(topic, router.clone()));
        let shutdown = shutdown_tx.subscribe();
        consumers.spawn(async move {
            consumer.run(shutdown, handler).await;
        });
    }

    let users_data = web::Data::new(users.clone());
    let products_data = web::Data::new(products.clone());
    let orders_data = web::Data::new(orders.clone());

    let bind_address = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting HTTP server at {bind_address}");

    let server = HttpServer::new(move || {
        App::new()
            .app_data(users_data.clone())
            .app_data(products_data.clone())
            .app_data(orders_data.clone())
            .wrap(Cors::default().allow_any_origin().allow_any_method().allow_any_header())
            .wrap(tracing_actix_web::TracingLogger::default())
            .route("/healthz", web::get().to(handlers::health))
            .service(
                web::scope("/q")
                    .route("/users", web::get().to(handlers::list_users))
                    .route("/users/{id}", web::get().to(handlers::get_user))
                    .route("/products", web::get().to(handlers::list_products))
                    .route("/products/{id}", web::get().to(handlers::get_product))
                    .route("/orders", web::get().to(handlers::list_orders))
                    .route("/orders/{id}", web::get().to(handlers::get_order)),
            )
    })
    .bind(&bind_address)?
    .run();
    let server_handle = server.handle();
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

    while consumers.join_next().await.is_some() {}
    producer.close();

    tracing::info!("query-service stopped");
    Ok(())
}
