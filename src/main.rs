use omnik_export::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let options = Options::new();

    // logging is configured from the file, so report config problems directly
    let config = omnik_export::load_config(&options).unwrap_or_else(|err| {
        eprintln!("Failed to load config {}: {:#}", options.config_file, err);
        std::process::exit(255);
    });

    if let Err(err) = omnik_export::logging::init(&config.loglevel, config.log_file.as_deref()) {
        eprintln!("{:#}", err);
    }

    if let Err(err) = omnik_export::app(config).await {
        error!("{:#}", err);
        std::process::exit(Error::exit_code_for(&err));
    }
}
