use log::*;

use pollbooth::config::Config;
use pollbooth::AppState;

#[async_std::main]
async fn main() -> Result<(), std::io::Error> {
    pretty_env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("Invalid configuration! {}", err);
            return Err(std::io::Error::new(std::io::ErrorKind::Other, err.to_string()));
        }
    };
    let listen_addr = config.listen_addr.clone();

    match AppState::from_config(config).await {
        Ok(state) => {
            let app = pollbooth::app(state);
            info!("Listening on {}", listen_addr);
            app.listen(listen_addr).await?;
            Ok(())
        }
        Err(err) => {
            error!("Could not initialize! {:?}", err);
            Err(std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))
        }
    }
}
