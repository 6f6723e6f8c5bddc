mod cli;

fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();

    if let Err(err) = cli::run() {
        log::error!("{err}");
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
