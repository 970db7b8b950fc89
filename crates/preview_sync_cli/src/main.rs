mod app;
mod command;
mod logging;

use clap::Parser;

#[tokio::main]
async fn main() {
    let app = app::App::parse();

    if let Err(e) = app.run().await {
        eprintln!("error: {e:?}");
        std::process::exit(1);
    }
}
