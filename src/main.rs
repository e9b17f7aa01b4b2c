use actix_cors::Cors;
use actix_web::http::header;
use actix_web::{middleware, web, App, HttpServer};
use edge_file_server::config::{ConfigError, ServerConfig, TlsPaths};
use edge_file_server::dispatcher::FileActionDispatcher;
use edge_file_server::file_system::BaseDir;
use edge_file_server::handlers;
use edge_file_server::supervisor::Supervisor;
use log::{info, warn};
use rustls::ServerConfig as TlsConfig;
use rustls_pemfile::{certs, pkcs8_private_keys};
use std::fs::File as FsFile;
use std::io::{self, BufReader};

fn load_tls(paths: &TlsPaths) -> io::Result<TlsConfig> {
    let cert_file = &mut BufReader::new(FsFile::open(&paths.cert)?);
    let key_file = &mut BufReader::new(FsFile::open(&paths.key)?);
    let cert_chain = certs(cert_file).collect::<Result<Vec<_>, _>>()?;
    let mut keys = pkcs8_private_keys(key_file).collect::<Result<Vec<_>, _>>()?;

    if keys.is_empty() {
        return Err(io::Error::other("No private keys found in key file"));
    }

    TlsConfig::builder()
        .with_no_client_auth()
        .with_single_cert(cert_chain, keys.remove(0).into())
        .map_err(io::Error::other)
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    let config = ServerConfig::from_env().map_err(io::Error::other)?;

    // RUST_LOG still wins over FILE_SERVER_DEBUG when both are set.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.log_level()))
        .init();

    let base = BaseDir::new(&config.root)
        .map_err(ConfigError::BaseDir)
        .map_err(io::Error::other)?;
    info!("Serving files from {}", base.path().display());

    let dispatcher = web::Data::new(
        FileActionDispatcher::new(base.clone())
            .with_failure_policy(config.on_failure)
            .with_removal_mode(config.remove_mode),
    );
    let max_body = config.max_body;

    let mut http_server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
            .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(dispatcher.clone())
            .app_data(handlers::BodyLimit(max_body))
            .default_service(web::to(handlers::entry))
    });

    let addr = config.bind_addr();
    let tls = match &config.tls {
        Some(paths) if paths.cert.exists() && paths.key.exists() => Some(load_tls(paths)?),
        Some(_) => {
            warn!("CERT_PATH or KEY_PATH points to a non-existent file. Starting without HTTPS.");
            None
        }
        None => None,
    };
    match tls {
        Some(tls) => {
            http_server = http_server.bind_rustls_0_23(addr, tls)?;
            info!("File Server:: Listening on https://{}", addr);
        }
        None => {
            http_server = http_server.bind(addr)?;
            info!("File Server:: Listening on http://{}", addr);
        }
    }

    // Held for the lifetime of the server; the companion is never killed here.
    let _companion = Supervisor::new(config.companion_config(base.path().to_path_buf())).start();

    http_server.run().await
}
