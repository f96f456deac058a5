//! Sensor node example
//!
//! Runs as `ESP8266/SensorNode`, answers `Ping` sagas, follows a CPU load
//! StateObject and publishes a fake temperature every few seconds.
//!
//! Run with: cargo run --example sensor_node -- http://localhost:8088 <access key>

use constellation_http::client::{
    ClientConfig, ConstellationClient, MessageHandler, StateObjectPush,
};
use constellation_http::descriptor::MessageCallbackDescriptor;
use constellation_http::types::{MessageContext, StateObjectFilter};
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

fn main() -> constellation_http::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("constellation_http=info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let url = args.next().unwrap_or_else(|| "http://localhost:8088".to_string());
    let access_key = args.next().unwrap_or_default();

    println!("Constellation Sensor Node Example");
    println!("=================================\n");
    println!("Connecting to {}", url);

    let config = ClientConfig::from_url(&url)?.with_identity("ESP8266", "SensorNode", access_key);
    let mut client = ConstellationClient::with_tcp(config);

    // Saga requests are answered from the main loop: handlers cannot borrow the client.
    let pending: Rc<RefCell<Vec<MessageContext>>> = Rc::new(RefCell::new(Vec::new()));
    let queue = pending.clone();
    client.register_message_callback_with_descriptor(
        "Ping",
        MessageCallbackDescriptor::new()
            .with_description("Answer with the uptime in seconds")
            .with_optional_parameter("verbose", "System.Boolean", json!(false)),
        MessageHandler::with_context(move |_, ctx| {
            if ctx.is_saga {
                queue.borrow_mut().push(ctx.clone());
            }
        }),
    )?;
    client.register_state_object_link(
        &StateObjectFilter::new("*", "HWMonitor").with_name("/intelcpu/load/0"),
        |so| println!("CPU load: {}", so["Value"]["Value"]),
    )?;
    client.declare_package_descriptor()?;
    client.write_info("Sensor node started")?;

    let started = Instant::now();
    let mut last_push: Option<Instant> = None;
    loop {
        if let Err(e) = client.poll() {
            tracing::warn!("poll failed: {}", e);
        }

        let requests: Vec<MessageContext> = pending.borrow_mut().drain(..).collect();
        for ctx in requests {
            if let Err(e) = client.send_response(&ctx, json!(started.elapsed().as_secs())) {
                tracing::warn!("unable to answer {}: {}", ctx.reply_address(), e);
            }
        }

        if last_push.map_or(true, |at| at.elapsed() >= Duration::from_secs(5)) {
            let temperature = 20.0 + (started.elapsed().as_secs() % 50) as f64 / 10.0;
            let push = StateObjectPush::new("Temperature", temperature).with_lifetime(30);
            if let Err(e) = client.push_state_object(&push) {
                tracing::warn!("unable to push the temperature: {}", e);
            }
            last_push = Some(Instant::now());
        }

        std::thread::sleep(Duration::from_millis(10));
    }
}
