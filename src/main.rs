use mailgate::{config::get_or_init_config, App, Result};

use tracing::error;

#[tokio::main]
async fn main() -> Result<()> {
    // We have a different logging mechanism for production
    #[cfg(not(debug_assertions))]
    {
        mailgate::init_production_tracing()
    }
    #[cfg(debug_assertions)]
    {
        mailgate::init_dbg_tracing();
    }

    // Missing credentials stop the binary before anything is bound.
    let config = get_or_init_config().inspect_err(|er| error!("failed to load config: {er}"))?;
    let app = App::build_from_config(config).await?;

    mailgate::serve(app)
        .await
        .inspect_err(|er| error!("server stopped: {er}"))
}
