use leap_llsd::Value;
use leap_plugin::{Plugin, PluginConfig};

use crate::cmd::{block_on_local, finish, parse_duration, HelloArgs};
use crate::exit::{plugin_error, CliError, CliResult, INTERNAL, SUCCESS};

pub fn run(args: HelloArgs) -> CliResult<i32> {
    let period = parse_duration(&args.interval)?;
    let config = PluginConfig {
        listen: args.listen,
        ..PluginConfig::default()
    };

    block_on_local(async move {
        let plugin = Plugin::stdio(config);
        plugin
            .start()
            .await
            .map_err(|err| plugin_error("startup failed", err))?;

        let count = args.count;
        let producer = plugin.spawn_periodic(args.pump, period, move |n| {
            if count.is_some_and(|limit| n >= limit) {
                return None;
            }
            Some(greeting(n))
        });

        tokio::select! {
            result = plugin.run_until_stopped() => finish(result),
            joined = producer => match joined {
                Ok(Ok(())) => {
                    tracing::info!("all greetings sent");
                    Ok(SUCCESS)
                }
                Ok(Err(err)) => Err(plugin_error("send failed", err)),
                Err(err) => Err(CliError::new(INTERNAL, format!("producer task failed: {err}"))),
            },
        }
    })?
}

fn greeting(count: u64) -> Value {
    [
        ("msg", Value::from("Hello world!")),
        ("count", Value::Integer(i64::try_from(count).unwrap_or(i64::MAX))),
    ]
    .into_iter()
    .collect()
}
