//! `appbus-invoke`: submits one invocation and prints its result as JSON.
//!
//! ```text
//! appbus-invoke Test helloWorld --node-instance 1 --param name=Michael
//! ```

use std::time::Duration;

use anyhow::Context;
use appbus_client::{
    CancellationToken, ClientConfig, InvocationClient, PollPolicy, DEFAULT_BASE_PATH,
};
use appbus_core::{InstanceRef, InvocationRequest, InvocationTarget};
use clap::Parser;
use serde_json::Value;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Client command line arguments.
#[derive(Parser, Debug)]
#[command(name = "appbus-invoke")]
#[command(about = "Invoke an operation through an AppBus server and wait for the result")]
struct Args {
    /// Interface that owns the operation
    interface: String,

    /// Operation to invoke
    operation: String,

    /// Server URL
    #[arg(long, env = "APPBUS_URL", default_value = "http://localhost:1337")]
    server: String,

    /// Path of the submit endpoint
    #[arg(long, env = "APPBUS_BASE_PATH", default_value = DEFAULT_BASE_PATH)]
    base_path: String,

    /// Target node instance
    #[arg(long, conflicts_with_all = ["service_instance", "node_template"])]
    node_instance: Option<String>,

    /// Target service instance (requires --node-template)
    #[arg(long, requires = "node_template")]
    service_instance: Option<String>,

    /// Node template inside the service instance
    #[arg(long, requires = "service_instance")]
    node_template: Option<String>,

    /// Parameter as `name=value`; values that parse as JSON are sent as JSON
    #[arg(long = "param", short = 'p', value_parser = parse_param)]
    params: Vec<(String, Value)>,

    /// Delay between polls in milliseconds
    #[arg(long, default_value_t = 5_000)]
    poll_interval_ms: u64,

    /// Double the delay after each poll, up to this many milliseconds
    #[arg(long)]
    backoff_max_ms: Option<u64>,

    /// Give up after this many polls
    #[arg(long, default_value_t = 720)]
    max_polls: u32,

    /// Give up after this many seconds of polling
    #[arg(long)]
    max_wait_secs: Option<u64>,
}

impl Args {
    fn target(&self) -> anyhow::Result<InvocationTarget> {
        match (&self.node_instance, &self.service_instance, &self.node_template) {
            (Some(node), None, None) => Ok(InvocationTarget::NodeInstance {
                node_instance_id: instance_ref(node),
            }),
            (None, Some(service), Some(template)) => Ok(InvocationTarget::ServiceInstance {
                service_instance_id: instance_ref(service),
                node_template_id: template.clone(),
            }),
            _ => anyhow::bail!(
                "pass either --node-instance or --service-instance with --node-template"
            ),
        }
    }

    fn client_config(&self) -> ClientConfig {
        let interval = Duration::from_millis(self.poll_interval_ms);
        let poll_policy = match self.backoff_max_ms {
            Some(max) => PollPolicy::Exponential {
                initial: interval,
                max: Duration::from_millis(max),
            },
            None => PollPolicy::Fixed(interval),
        };
        ClientConfig {
            server_url: self.server.clone(),
            base_path: self.base_path.clone(),
            poll_policy,
            max_polls: self.max_polls,
            max_wait: self.max_wait_secs.map(Duration::from_secs),
            ..ClientConfig::default()
        }
    }

    fn request(&self) -> anyhow::Result<InvocationRequest> {
        let mut request =
            InvocationRequest::new(&self.interface, &self.operation, self.target()?);
        for (name, value) in &self.params {
            request = request.with_param(name.clone(), value.clone());
        }
        Ok(request)
    }
}

fn instance_ref(raw: &str) -> InstanceRef {
    raw.parse::<u64>()
        .map_or_else(|_| InstanceRef::Text(raw.to_string()), InstanceRef::Number)
}

fn parse_param(raw: &str) -> Result<(String, Value), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("`{raw}` is not name=value"))?;
    if name.is_empty() {
        return Err(format!("`{raw}` has an empty name"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((name.to_string(), value))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "appbus_client=info".into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing();

    let request = args.request()?;
    let client = InvocationClient::new(args.client_config())?;

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let result = client
        .invoke_with_cancel(&request, &cancel)
        .await
        .with_context(|| format!("invoking {}", request.qualified_name()))?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
