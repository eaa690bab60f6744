use clap::Parser;
use fileserver::server::Server;
use fileserver::Args;
use std::process;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .format_module_path(false)
        .init();

    let args = Args::parse();

    let server = match Server::bind(&args).await {
        Ok(server) => server,
        Err(e) => {
            log::error!("{}", e);
            process::exit(1);
        }
    };

    if let Some(addr) = server.local_addr() {
        log::info!("Starting HTTP server on {:?} ({})", args.addr, addr);
    }
    if let Some(addr) = server.tls_local_addr() {
        log::info!("Starting HTTPS server on {:?} ({})", args.addr_tls, addr);
    }
    let config = server.app().config();
    log::info!("Serving files from directory {:?}", config.root);
    log::info!(
        "byte ranges: {}, compression: {}, index pages: {}, vhost: {}",
        config.byte_range,
        config.compress,
        config.generate_index_pages,
        config.vhost
    );
    log::info!("See stats at http://{}/stats", args.addr);

    server.run().await;
}
