use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // .env may carry RUST_LOG
    let dotenv = quill_server::config::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = quill_server::config::load(dotenv)?;
    let host = config
        .get(quill_server::config::HTTP_HOST)
        .unwrap_or("0.0.0.0")
        .to_string();
    let port = config
        .get(quill_server::config::HTTP_PORT)
        .unwrap_or("3001")
        .to_string();

    let app = quill_server::build(&config)?;
    app.listen(format!("{host}:{port}")).await?;

    Ok(())
}
