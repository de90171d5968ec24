use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use sqlx::PgPool;
use std::net::TcpListener;

use crate::configuration::{JwtSettings, MediaSettings};
use crate::logger::RequestLogger;
use crate::media::MediaClient;
use crate::middleware::SessionGuard;
use crate::routes::{
    change_password, current_user, health_check, login, logout, refresh_access_token, register,
    update_account, update_avatar, update_cover_image,
};

pub fn run(
    listener: TcpListener,
    connection: PgPool,
    jwt_config: JwtSettings,
    media_client: MediaClient,
    media_settings: MediaSettings,
) -> Result<Server, std::io::Error> {
    let connection = web::Data::new(connection);
    let jwt_config_data = web::Data::new(jwt_config.clone());
    let media_client = web::Data::new(media_client);
    let media_settings = web::Data::new(media_settings);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(RequestLogger)
            .app_data(connection.clone())
            .app_data(jwt_config_data.clone())
            .app_data(media_client.clone())
            .app_data(media_settings.clone())
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/api/v1/users")
                    // Public: onboarding and token acquisition
                    .route("/register", web::post().to(register))
                    .route("/login", web::post().to(login))
                    .route("/refresh-token", web::post().to(refresh_access_token))
                    // Everything below requires a valid access token
                    .service(
                        web::scope("")
                            .wrap(SessionGuard::new(jwt_config.clone()))
                            .route("/logout", web::post().to(logout))
                            .route("/change-password", web::post().to(change_password))
                            .route("/current-user", web::get().to(current_user))
                            .route("/update-account", web::patch().to(update_account))
                            .route("/avatar", web::patch().to(update_avatar))
                            .route("/cover-image", web::patch().to(update_cover_image)),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
