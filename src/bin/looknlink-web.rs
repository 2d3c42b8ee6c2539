//! looknlink-web: web server binary for the LooknLink app.

#[tokio::main]
async fn main() {
    if let Err(e) = looknlink::web::run().await {
        eprintln!("looknlink-web: {e}");
        std::process::exit(1);
    }
}
