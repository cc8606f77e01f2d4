#[tokio::main]
async fn main() -> std::io::Result<()> {
    bump_server::frameworks::server::run_with_config().await
}
