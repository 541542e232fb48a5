use clap::error::ErrorKind;
use clap::Parser;
use log::error;
use std::process;
use tput::config::ClientArgs;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match ClientArgs::try_parse() {
        Ok(args) => args,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            eprintln!("{}", err);
            process::exit(-1);
        }
    };

    // validation happens before any socket is created
    let config = match args.into_config() {
        Ok(config) => config,
        Err(err) => {
            error!("{}", err);
            process::exit(-1);
        }
    };

    match tput::client::run(&config) {
        Ok(report) => println!("{}", report),
        Err(err) => {
            error!("{}", err);
            process::exit(-1);
        }
    }
}
