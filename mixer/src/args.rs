use anyhow::{Context, Result};
use clap::Parser;
use linkerd_mixer_adapters as adapters;
use linkerd_mixer_aspect::{self as aspect, Dispatcher};
use linkerd_mixer_config::{self as config, FileSource, Validator};
use linkerd_mixer_core::expr::{Evaluator, IdentityEvaluator};
use std::{path::PathBuf, sync::Arc};
use tokio::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[clap(name = "mixer", about = "Resolves and executes policy aspects")]
pub struct Args {
    #[clap(long, default_value = "linkerd=info,warn", env = "LINKERD_MIXER_LOG")]
    log_level: String,

    #[clap(long, value_enum, default_value = "plain")]
    log_format: LogFormat,

    /// Declares adapters and metric descriptors.
    #[clap(long, env = "LINKERD_MIXER_GLOBAL_CONFIG")]
    global_config: PathBuf,

    /// Declares the rule tree.
    #[clap(long, env = "LINKERD_MIXER_SERVICE_CONFIG")]
    service_config: PathBuf,

    #[clap(long, default_value = "10", value_parser = clap::value_parser!(u64).range(1..))]
    config_refresh_interval_secs: u64,

    /// Validates the configuration and exits.
    #[clap(long)]
    validate_only: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    Plain,
    Json,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            global_config,
            service_config,
            config_refresh_interval_secs,
            validate_only,
        } = self;

        init_tracing(&log_level, log_format)?;

        let eval = Arc::new(IdentityEvaluator::new()) as Arc<dyn Evaluator>;
        let managers = Arc::new(aspect::Registry::standard());
        let builders = Arc::new(adapters::inventory());

        if validate_only {
            let global = tokio::fs::read_to_string(&global_config)
                .await
                .with_context(|| format!("failed to read {}", global_config.display()))?;
            let service = tokio::fs::read_to_string(&service_config)
                .await
                .with_context(|| format!("failed to read {}", service_config.display()))?;
            let validated = Validator::new(&*managers, &*builders, &*eval)
                .validate(&service, &global)
                .context("invalid configuration")?;
            info!(
                kinds = validated.num_aspects(),
                adapters = validated.global_config().adapters.len(),
                "Configuration is valid"
            );
            return Ok(());
        }

        let dispatcher = Arc::new(Dispatcher::new(
            managers.clone(),
            builders.clone(),
            eval.clone(),
        ));
        let mut manager = config::Manager::new(
            eval,
            managers,
            builders.clone(),
            FileSource::new(global_config),
            FileSource::new(service_config),
            Duration::from_secs(config_refresh_interval_secs),
        );
        manager.register(dispatcher.clone());
        let handle = manager.start().await;

        shutdown_signal().await?;
        info!("Shutting down");
        handle.close().await;
        dispatcher.close();
        if let Err(error) = builders.close() {
            warn!(%error, "Failed to close adapters");
        }
        Ok(())
    }
}

fn init_tracing(filter: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_new(filter).context("invalid log level")?;
    let fmt = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Plain => fmt.try_init(),
        LogFormat::Json => fmt.json().try_init(),
    }
    .map_err(|error| anyhow::anyhow!(error))
}

async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res?,
            _ = term.recv() => {}
        }
        Ok(())
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags() {
        let args = Args::try_parse_from([
            "mixer",
            "--global-config=/etc/mixer/global.yml",
            "--service-config",
            "/etc/mixer/service.yml",
            "--log-format=json",
            "--config-refresh-interval-secs=30",
            "--validate-only",
        ])
        .expect("flags must parse");
        assert_eq!(args.global_config, PathBuf::from("/etc/mixer/global.yml"));
        assert_eq!(args.service_config, PathBuf::from("/etc/mixer/service.yml"));
        assert_eq!(args.log_format, LogFormat::Json);
        assert_eq!(args.config_refresh_interval_secs, 30);
        assert!(args.validate_only);
    }

    #[test]
    fn rejects_zero_refresh_interval() {
        assert!(Args::try_parse_from([
            "mixer",
            "--global-config=/g.yml",
            "--service-config=/s.yml",
            "--config-refresh-interval-secs=0",
        ])
        .is_err());
    }

    #[test]
    fn requires_config_paths() {
        assert!(Args::try_parse_from(["mixer", "--global-config=/g.yml"]).is_err());
    }
}
