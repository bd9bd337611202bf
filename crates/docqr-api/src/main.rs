use docqr_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    let app = docqr_api::setup::initialize_app(config.clone()).await?;

    docqr_api::setup::server::start_server(&config, app.router).await?;
    docqr_api::setup::server::finish_background_work(app.state, app.audit_worker).await;

    Ok(())
}
