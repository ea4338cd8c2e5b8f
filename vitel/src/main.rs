//! Demo host: registers a greeter service and waits for its init.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{error, info};
use vitel::{HostApp, ServiceConfig, ServiceSpec, logging, register_service};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let logging = match logging::init_logging(None) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };
    if std::env::args().any(|arg| arg == "--verbose") {
        if let Err(e) = logging.set_filter("vitel=debug") {
            eprintln!("{e}");
        }
    }

    if let Err(e) = run().await {
        error!(error = %e, "Demo failed");
        std::process::exit(1);
    }
}

async fn run() -> vitel::Result<()> {
    let host = Arc::new(HostApp::headless().with_registry());

    let greeter = ServiceSpec::new("$greeter")
        .with_method("greet", |service, args| {
            let who = args.first().and_then(Value::as_str).unwrap_or("world");
            let greeting = service
                .get("greeting")
                .and_then(|g| g.as_str().map(str::to_owned))
                .unwrap_or_else(|| "Hello".to_string());
            json!(format!("{greeting}, {who}!"))
        })
        .with_init(|service| async move {
            let greeting = service
                .props()
                .get("greeting")
                .cloned()
                .unwrap_or_else(|| json!("Hello"));
            service.set("greeting", greeting.clone());
            Ok(greeting)
        });

    let config = ServiceConfig::from_json(&host, json!({"greeting": "Hi"}))?;
    let service = register_service(&greeter, config)?;
    info!(ready = ?service.ready(), "Registered $greeter");

    host.tick().await;

    if let Some(promise) = service.promise() {
        let greeting = promise.await?;
        info!(greeting = %greeting, ready = ?service.ready(), "Greeter initialized");
    }

    if let Some(global) = host.global("$greeter") {
        let result = global
            .call("greet", &[json!("vitel")])
            .unwrap_or(Value::Null);
        info!(result = %result, "Called $greeter.greet");
    }

    Ok(())
}
