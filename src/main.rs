use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use sqlx::PgPool;

use taskhub::auth::{PrincipalResolver, TokenCodec};
use taskhub::config::Config;
use taskhub::routes;
use taskhub::session::SessionManager;
use taskhub::store::{CredentialStore, RefreshTokenStore};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = Config::from_env();
    let pool = PgPool::connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // The auth core is assembled once here and injected; no component reads
    // the environment or shares ambient state after this point.
    let codec = TokenCodec::new(&config.jwt_secret, config.access_token_ttl_secs);
    let credentials = CredentialStore::new(pool.clone());
    let refresh_tokens = RefreshTokenStore::new(pool, config.refresh_token_ttl_secs);
    let sessions = SessionManager::new(credentials.clone(), refresh_tokens, codec.clone());

    let codec = web::Data::new(codec);
    let credentials = web::Data::new(credentials);
    let sessions = web::Data::new(sessions);

    log::info!("Starting TaskHub server at {}", config.server_url());
    let bind_addr = (config.server_host.clone(), config.server_port);

    HttpServer::new(move || {
        App::new()
            .app_data(codec.clone())
            .app_data(credentials.clone())
            .app_data(sessions.clone())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .service(routes::health::health)
            .service(
                web::scope("/api")
                    .wrap(PrincipalResolver)
                    .configure(routes::config),
            )
    })
    .bind(bind_addr)?
    .run()
    .await
}
