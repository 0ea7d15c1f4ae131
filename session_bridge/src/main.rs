#[tokio::main]
async fn main() -> std::io::Result<()> {
    session_bridge::run().await
}
