use std::time::Duration;

use devbot_server::supervisor::{self, ConfigSource, Options};

pub fn run(
    source: ConfigSource,
    port: Option<u16>,
    startup_delay_ms: Option<u64>,
) -> anyhow::Result<()> {
    let settings = source.server_settings();
    let port = port.unwrap_or(settings.port);
    let startup_delay =
        Duration::from_millis(startup_delay_ms.unwrap_or(settings.startup_delay_ms));

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
        tracing::info!(
            port = listener.local_addr()?.port(),
            delay_ms = startup_delay.as_millis() as u64,
            "starting supervisor"
        );
        let options = Options {
            source,
            startup_delay,
        };
        tokio::select! {
            res = supervisor::run(listener, options) => res,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                Ok(())
            }
        }
    })
}
