use std::env;
use xr_session::config::SessionConfig;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run() {
        eprintln!("[simulate] error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = match env::args().nth(1) {
        Some(path) => SessionConfig::from_path(&path)?,
        None => SessionConfig::default(),
    };

    let stats = xr_session::run(config)?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
