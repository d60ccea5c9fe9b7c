#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![deny(unreachable_pub)]
#![deny(missing_copy_implementations)]
#![deny(missing_debug_implementations)]

use logrelay::{
    aws::{AwsClient, cloudwatch_logs::CloudWatchLogsClient, ses::SesClient, sns::SnsClient},
    config::{self, AwsConfig, Config, ConfigError},
    dispatch::Dispatcher,
    http_client, logger,
    relay::Relay,
    runtime::{RuntimeApiClient, RuntimeError},
};
use std::{
    env,
    io::{Error, ErrorKind, Result},
    path::Path,
    sync::Arc,
};
use tracing::{debug, error, info, info_span, Instrument};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let runtime_client = http_client::get_runtime_client().map_err(|e| {
        Error::new(
            ErrorKind::InvalidData,
            format!("Failed to create client: {e:?}"),
        )
    })?;
    let runtime = RuntimeApiClient::from_env(runtime_client).map_err(to_io_error)?;

    let (aws_config, config) = match load_configs() {
        Ok(configs) => configs,
        Err(e) => {
            println!("Error starting logrelay: {e}");
            if let Err(report_err) = runtime.init_error("Runtime.ConfigError", &e.to_string()).await
            {
                println!("Failed to report init error: {report_err}");
            }
            return Err(Error::new(ErrorKind::InvalidInput, e.to_string()));
        }
    };

    enable_logging_subsystem(&config);
    info!(
        "Starting logrelay for function {} in {}",
        aws_config.function_name, aws_config.region
    );

    let relay = build_relay(&config, aws_config).map_err(|e| {
        error!("Failed to build relay: {}", e);
        Error::new(ErrorKind::InvalidInput, e.to_string())
    })?;

    invocation_loop(&runtime, &relay, &config).await
}

fn load_configs() -> std::result::Result<(Arc<AwsConfig>, Arc<Config>), ConfigError> {
    let aws_config = Arc::new(AwsConfig::from_env());
    let lambda_directory = env::var("LAMBDA_TASK_ROOT").unwrap_or_else(|_| "/var/task".to_string());
    let config = Arc::new(config::get_config(Path::new(&lambda_directory))?);
    Ok((aws_config, config))
}

fn enable_logging_subsystem(config: &Arc<Config>) {
    let filter = EnvFilter::try_new(config.log_level.env_filter()).unwrap_or_else(|e| {
        println!("Could not parse log level in configuration: {e}, using info");
        EnvFilter::new("info")
    });
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(false)
        .without_time()
        .event_format(logger::Formatter)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        println!("Setting default subscriber failed: {e}");
    }

    debug!("Logging subsystem enabled");
}

fn build_relay(
    config: &Arc<Config>,
    aws_config: Arc<AwsConfig>,
) -> std::result::Result<Relay, ConfigError> {
    let aws_client = AwsClient::new(http_client::get_client(config), aws_config);
    let dispatcher = Dispatcher::new(
        Arc::new(SnsClient::new(aws_client.clone())),
        Arc::new(SesClient::new(aws_client.clone())),
    );
    let log_sink = Arc::new(CloudWatchLogsClient::new(aws_client));
    Relay::new(config, dispatcher, log_sink)
}

async fn invocation_loop(runtime: &RuntimeApiClient, relay: &Relay, config: &Config) -> Result<()> {
    loop {
        let invocation = runtime.next_invocation().await.map_err(|e| {
            error!("Failed to fetch next invocation: {}", e);
            to_io_error(e)
        })?;
        let request_id = invocation.context.request_id.clone();
        let span = info_span!("invocation", request_id = %request_id);

        async {
            if let Some(deadline_ms) = invocation.context.deadline_ms {
                debug!("Deadline at {} ms since epoch", deadline_ms);
            }
            let outcome = relay.handle(&invocation.payload, &invocation.context).await;
            let summary = outcome.summary();
            let result = if outcome.is_failure(config.error_policy) {
                runtime
                    .send_error(
                        &request_id,
                        outcome.error_type(),
                        outcome.reason().unwrap_or_default(),
                    )
                    .await
            } else {
                runtime.send_response(&request_id, &summary).await
            };
            match result {
                Ok(()) => info!("Invocation finished with outcome {}", summary.outcome),
                Err(e) => error!("Failed to report invocation result: {}", e),
            }
        }
        .instrument(span)
        .await;
    }
}

fn to_io_error(e: RuntimeError) -> Error {
    Error::new(ErrorKind::InvalidData, e.to_string())
}
