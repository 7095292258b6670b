mod logger;

use std::{
    io,
    process::{
        ExitCode,
    },
};

use tracing::{
    debug,
    warn,
};

use yt_thumbnail::{
    app,
    auth,
    config::{
        Config,
    },
    Error,
    YouTube,
    APPLICATION_NAME,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let dotenv = dotenvy::dotenv();
    logger::setup_logger();
    if let Ok(path) = dotenv {
        debug!(path = %path.display(), "loaded environment file");
    };

    let (config, youtube) = match connect().await {
        Ok(connected) => connected,
        Err(err) => {
            if let Err(write_err) = app::report_failure(&mut io::stderr(), &err) {
                warn!(error = %write_err, "couldn't report failure");
            };
            return ExitCode::from(app::EXIT_FAILURE);
        },
    };

    let outcome = app::run(&youtube, &config.upload, io::stdin().lock(), io::stdout().lock(), io::stderr()).await;
    ExitCode::from(outcome.exit_code())
}

async fn connect() -> Result<(Config, YouTube), Error> {
    let config = Config::from_env()?;
    let credential = auth::authorize(&[auth::SCOPE_YOUTUBE], app::CREDENTIAL_DATASTORE, &config.auth).await?;
    let youtube = YouTube::new(credential, APPLICATION_NAME)?
        .with_base_url(config.api_base_url.clone());
    Ok((config, youtube))
}
