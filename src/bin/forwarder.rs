use clap::{arg, command};
use portbridge::common::{ConfigError, ForwarderConfig};
use portbridge::forwarder::Forwarder;

use std::error::Error;
use std::fs::File;
use std::io::Read;
use std::process;

fn read_config() -> Result<ForwarderConfig, ConfigError> {
    let matches = command!()
        .about("A TCP port forwarder that relays every connection to a fixed destination")
        .arg(arg!(-d --dest_addr <Address>).required(false)
            .help("Destination address (host:port) every connection is forwarded to"))
        .arg(arg!(-l --listen_addr <Address>).required(false)
            .help("Explicit listen address (ip:port). If absent or already in use, an available port is searched in the configured range"))
        .arg(arg!(--port_range_start <Port>).required(false)
            .help("First port tried when searching for an available listen port. [default: 8000]")
            .value_parser(clap::value_parser!(u16)))
        .arg(arg!(--port_range_end <Port>).required(false)
            .help("Last port tried when searching for an available listen port. [default: 9000]")
            .value_parser(clap::value_parser!(u16)))
        .arg(arg!(--enable_graceful_shutdown <bool>).required(false)
            .help("Close the listener and exit cleanly on Ctrl-C. [default: true]")
            .value_parser(clap::value_parser!(bool)))
        .arg(arg!(-c --config <Path>).required(false)
            .help("Path to an optional TOML config file"))
        .get_matches();

    // The config file is the base layer, command line arguments override it
    let mut config = match matches.get_one::<String>("config") {
        Some(config_path) => {
            let mut file = match File::open(config_path) {
                Ok(v) => v,
                Err(e) => {
                    return Err(ConfigError::ConfigFileError((
                        e.to_string(),
                        config_path.to_owned(),
                    )));
                }
            };
            let mut config_contents = String::new();
            if let Err(e) = file.read_to_string(&mut config_contents) {
                return Err(ConfigError::ConfigFileError((
                    e.to_string(),
                    config_path.to_owned(),
                )));
            }
            match toml::from_str(&config_contents) {
                Ok(v) => v,
                Err(e) => {
                    return Err(ConfigError::ConfigFileError((
                        e.to_string(),
                        config_path.to_owned(),
                    )));
                }
            }
        }
        None => ForwarderConfig::default(),
    };

    // Check for existing command line arguments and swap the values out
    if let Some(dest_addr) = matches.get_one::<String>("dest_addr") {
        config.dest_addr = Some(dest_addr.to_owned());
    }

    if let Some(listen_addr) = matches.get_one::<String>("listen_addr") {
        config.listen_addr = Some(listen_addr.to_owned());
    }

    if let Some(port_range_start) = matches.get_one::<u16>("port_range_start") {
        config.port_range_start = Some(port_range_start.to_owned());
    }

    if let Some(port_range_end) = matches.get_one::<u16>("port_range_end") {
        config.port_range_end = Some(port_range_end.to_owned());
    }

    if let Some(enable_graceful_shutdown) = matches.get_one::<bool>("enable_graceful_shutdown") {
        config.enable_graceful_shutdown = Some(enable_graceful_shutdown.to_owned());
    }

    // Default arguments will be filled out automatically
    config.fill_defaults();

    // Sanity checks
    config.validate()?;

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::builder().format_timestamp_millis().init();

    let config = match read_config() {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Error when reading config: {e}");
            process::exit(1);
        }
    };

    println!("Starting port forwarder with config: \n{config}");

    let mut forwarder = match Forwarder::new(&config) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Error when reading config: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = forwarder.probe_destination().await {
        eprintln!("{e}");
        process::exit(1);
    }

    if let Err(e) = forwarder.bind().await {
        eprintln!("{e}");
        process::exit(1);
    }

    forwarder.run().await
}
