use leap_plugin::{Plugin, PluginConfig};

use crate::cmd::{block_on_local, finish, parse_duration, RunArgs};
use crate::exit::{plugin_error, CliResult, SUCCESS};
use crate::output::{render, OutputFormat};

pub fn run(args: RunArgs) -> CliResult<i32> {
    let duration = args.duration.as_deref().map(parse_duration).transpose()?;
    let config = PluginConfig {
        controller_pump: args.controller_pump,
        listen: !args.no_listen,
        ..PluginConfig::default()
    };

    block_on_local(async move {
        let plugin = Plugin::stdio(config);
        plugin.set_inbound_handler(|envelope| {
            tracing::info!(
                pump = %envelope.pump,
                data = %render(&envelope.data, OutputFormat::Notation),
                "event"
            );
            Ok(())
        });
        plugin
            .start()
            .await
            .map_err(|err| plugin_error("startup failed", err))?;
        if let Ok(session) = plugin.session() {
            let features: Vec<&String> = session.features().keys().collect();
            tracing::info!(?features, "host features");
        }

        let deadline = async {
            match duration {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            result = plugin.run_until_stopped() => finish(result),
            () = deadline => {
                tracing::info!("duration elapsed");
                plugin.stop();
                Ok(SUCCESS)
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(err) = signal {
                    tracing::warn!(error = %err, "signal handler failed");
                }
                tracing::info!("interrupted");
                plugin.stop();
                Ok(SUCCESS)
            }
        }
    })?
}
