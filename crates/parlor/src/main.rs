//! Binary entry point for the Parlor lobby server.

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    lib_parlor::init().await
}
