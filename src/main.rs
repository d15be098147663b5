use clap::Parser;
use mangaka::config::setup_logging;
use mangaka::sdapi::SdClient;
use mangaka::store::CharacterStore;
use tracing::error;

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cli = mangaka::cli::CliOptions::parse();

    if setup_logging(cli.debug).is_err() {
        return;
    }

    let store = match CharacterStore::load(&cli.characters_file).await {
        Ok(store) => store,
        Err(err) => {
            error!(
                "Failed to load characters from {}: {}",
                cli.characters_file.display(),
                err
            );
            return;
        }
    };

    let sd_client = match SdClient::new(&cli.sd_url, cli.sd_timeout()) {
        Ok(client) => client.with_controlnet_model(&cli.controlnet_model),
        Err(err) => {
            error!("Invalid image generation backend {}: {}", cli.sd_url, err);
            return;
        }
    };

    if let Err(err) = mangaka::web::setup_server(
        &cli.listen_address,
        cli.port,
        &cli.static_dir,
        store,
        sd_client,
    )
    .await
    {
        error!("Application error: {}", err);
    }
}
