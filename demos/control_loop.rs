//! Tango event control loop example
//!
//! Starts an owner thread, subscribes to a heartbeat and two attribute
//! events through a local administrative peer, and feeds the owner with
//! simulated publisher messages until Ctrl+C.
//!
//! Run with `RUST_LOG=debug` to see the control frames.

use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tango_events::payload::{DecodeError, ALIGNMENT_PADDING};
use tango_events::{
    AdminPeer, Context, ControlChannel, ControlConfig, EventMessage, EventSubscriptionInfo,
    EventType, Owner, PayloadDecoder, Result, StaticHost, StructuredDecoder, StructuredValue,
    SubscriptionManager, SubscriptionTable,
};

const HOST: &str = "localhost:10000";
const DEVICE: &str = "sys/tg_test/1";

fn timestamp() -> String {
    let now = chrono::Local::now();
    now.format("%H:%M:%S%.3f").to_string()
}

/// Administrative peer answering with fixed publisher endpoints.
struct LocalAdmin;

impl AdminPeer for LocalAdmin {
    fn name(&self) -> &str {
        "dserver/TangoTest/test"
    }

    fn event_subscription_change(
        &self,
        device: &str,
        attribute: &str,
        action: &str,
        event: &str,
    ) -> Result<EventSubscriptionInfo> {
        println!("[admin] {} {}/{} ({})", action, device, attribute, event);
        Ok(EventSubscriptionInfo::new(
            vec![0, 0, 1000, 0, 0],
            vec![
                "tcp://localhost:5555".to_string(),
                "tcp://localhost:5556".to_string(),
            ],
        ))
    }
}

/// Decodes every payload as a single double.
struct DoubleDecoder;

fn read_f64(bytes: &[u8], little_endian: bool) -> std::result::Result<f64, DecodeError> {
    let raw: [u8; 8] = bytes.get(..8).ok_or("need 8 bytes")?.try_into()?;
    Ok(if little_endian {
        f64::from_le_bytes(raw)
    } else {
        f64::from_be_bytes(raw)
    })
}

impl StructuredDecoder for DoubleDecoder {
    type AttributeValue = f64;
    type AttributeConfig = String;
    type DataReady = f64;

    fn decode_attribute_value(&self, bytes: &[u8], little_endian: bool) -> std::result::Result<f64, DecodeError> {
        read_f64(bytes, little_endian)
    }

    fn decode_attribute_config(
        &self,
        bytes: &[u8],
        _little_endian: bool,
    ) -> std::result::Result<String, DecodeError> {
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    fn decode_data_ready(&self, bytes: &[u8], little_endian: bool) -> std::result::Result<f64, DecodeError> {
        read_f64(bytes, little_endian)
    }
}

fn main() -> Result<()> {
    env_logger::init();

    println!("Tango Event Control Loop Example");
    println!("===============================\n");

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl-C handler");

    let context = Arc::new(Context::new());
    let config = ControlConfig::from_env();

    let decoder = PayloadDecoder::new(DoubleDecoder);
    let (table, publisher) = SubscriptionTable::with_inbound();
    let owner = Owner::spawn(
        Arc::clone(&context),
        &config,
        table,
        Some(Box::new(move |msg: EventMessage| {
            if msg.is_heartbeat() {
                println!("[{}] heartbeat {}", timestamp(), msg.name);
                return;
            }
            match msg.decode_with(&decoder) {
                Ok(StructuredValue::AttributeValue(v)) => {
                    println!("[{}] {} = {:.3}", timestamp(), msg.name, v)
                }
                Ok(other) => println!("[{}] {} -> {:?}", timestamp(), msg.name, other.kind()),
                Err(e) => eprintln!("[{}] {}: {}", timestamp(), msg.name, e),
            }
        })),
    )?;
    println!("[OK] Owner listening on {}", config.address);

    let manager = SubscriptionManager::new(
        ControlChannel::new(Arc::clone(&context), config.clone()),
        StaticHost::new(HOST),
    );
    let change = manager.subscribe(&LocalAdmin, DEVICE, "double_scalar", EventType::Change)?;
    let periodic = manager.subscribe(&LocalAdmin, DEVICE, "long_scalar", EventType::Periodic)?;
    println!("[OK] Subscribed to {}", change);
    println!("[OK] Subscribed to {}", periodic);

    let heartbeat = format!("tango://{}/{}.heartbeat", HOST, LocalAdmin.name());
    // Never subscribed, dropped by the owner.
    let ignored = format!("tango://{}/{}/ampli.change", HOST, DEVICE);

    let feeder_running = running.clone();
    let feeder = thread::spawn(move || {
        let mut rng = rand::rng();
        let mut tick = 0u64;
        while feeder_running.load(Ordering::SeqCst) {
            let value: f64 = rng.random_range(-100.0..100.0);
            let mut payload = vec![0u8; ALIGNMENT_PADDING];
            payload.extend_from_slice(&value.to_le_bytes());

            let name = if tick % 2 == 0 { &change } else { &periodic };
            let messages = [
                EventMessage::new(name.as_str(), payload.clone(), true),
                EventMessage::new(ignored.as_str(), payload, true),
            ];
            for message in messages {
                if publisher.send(message).is_err() {
                    return;
                }
            }
            if tick % 10 == 0 && publisher.send(EventMessage::new(heartbeat.as_str(), Vec::new(), true)).is_err() {
                return;
            }

            tick += 1;
            thread::sleep(Duration::from_millis(200));
        }
    });

    println!("\nReceiving events (Ctrl+C to stop)...\n");
    while running.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(100));
    }

    println!("\n\nShutting down...");
    if feeder.join().is_err() {
        eprintln!("feeder thread panicked");
    }

    manager.unsubscribe(DEVICE, "double_scalar", EventType::Change)?;
    manager.unsubscribe(DEVICE, "long_scalar", EventType::Periodic)?;
    println!("[OK] Unsubscribed");

    owner.shutdown()?;
    println!("[OK] Owner stopped");

    Ok(())
}
