use pecanhq::{config::Config, observability::init_tracing, Pecan};
use std::fs;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load()?;
    config.validate()?;

    // Initialize tracing/logging
    init_tracing(&config.observability)?;

    let client = &config.client;
    tracing::info!(
        artifact = %client.artifact,
        schema = client.schema,
        base_url = %client.base_url,
        "Starting Pecan client"
    );

    // Prefer the cached state, falling back to a fresh connection
    let state_path = &config.cache.state_path;
    let restored = fs::read(state_path).ok().and_then(|bytes| {
        Pecan::restore(
            &bytes,
            &client.key_id,
            &client.secret,
            &client.artifact,
            client.schema,
            client,
        )
    });

    let pecan = match restored {
        Some(pecan) => {
            tracing::info!(path = %state_path.display(), "Service state restored from cache");
            pecan
        }
        None => {
            Pecan::connect(
                &client.key_id,
                &client.secret,
                &client.artifact,
                client.schema,
                Some(client.base_url()?),
                client,
            )
            .await?
        }
    };

    if !pecan.reload().await? {
        tracing::warn!(artifact = %pecan.artifact(), "Manifest could not be reloaded");
    }

    let compiled = pecan.compiled();
    for (name, registration) in compiled.services() {
        tracing::info!(
            service = %name,
            claim = %registration.claim,
            resources = registration.resources.len(),
            restricted = compiled.restricted().contains_key(&registration.claim),
            "Service registered"
        );
    }
    tracing::info!(
        issuer = %pecan.issuer(),
        account_id = %pecan.account_id(),
        registrations = compiled.registration_count(),
        "Authorization schema ready"
    );

    // Persist the refreshed state for the next run
    if let Some(parent) = state_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(state_path, pecan.state_json()?)?;
    tracing::info!(path = %state_path.display(), "Service state cached");

    Ok(())
}
