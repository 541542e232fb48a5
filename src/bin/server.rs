use clap::error::ErrorKind;
use clap::Parser;
use log::error;
use std::process;
use tput::config::{ServerArgs, ServerConfig};
use tput::server::{self, Server};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match ServerArgs::try_parse() {
        Ok(args) => args,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            eprintln!("{}", err);
            process::exit(-1);
        }
    };

    let server = match Server::bind(ServerConfig::from(args)) {
        Ok(server) => server,
        Err(err) => {
            error!("{}", err);
            process::exit(-1);
        }
    };

    if let Err(err) = server::shutdown_on_signals(server.shutdown_handle()) {
        error!("cannot install signal handling: {}", err);
        process::exit(-1);
    }

    if let Err(err) = server.run() {
        error!("{}", err);
        process::exit(-1);
    }
}
