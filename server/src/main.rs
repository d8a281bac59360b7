use clap::Parser;
use log::{error, info};
use server::hub::Hub;
use server::network::NetworkServer;

/// Parses command-line arguments, then runs the hub actor and the
/// websocket listener until either fails or the process is interrupted.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Server IP address to bind to
        #[clap(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
        /// Server port to listen on
        #[clap(short, long, default_value = "3001")]
        port: u16,
        /// Shared secret guarding the /control endpoint
        #[clap(short, long, default_value = "abretesesamo")]
        secret: String,
    }

    env_logger::init();
    let args = Args::parse();

    let (hub, handle) = Hub::new();
    let hub_task = tokio::spawn(hub.run());

    let address = format!("{}:{}", args.host, args.port);
    let network = NetworkServer::bind(&address, args.secret).await?;
    let network_task = tokio::spawn(network.run(handle));

    tokio::select! {
        result = hub_task => {
            if let Err(e) = result {
                error!("hub task panicked: {}", e);
            }
        }
        result = network_task => {
            match result {
                Ok(Err(e)) => error!("network error: {}", e),
                Err(e) => error!("network task panicked: {}", e),
                Ok(Ok(())) => {}
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received ctrl-c, shutting down");
        }
    }

    Ok(())
}
