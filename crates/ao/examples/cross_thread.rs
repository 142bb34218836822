//! Cross-thread example: application code driving the System thread.
//!
//! Boots the two process threads, then from the Application thread queues
//! fire-and-forget work on System and reads a value back synchronously.

use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::Duration;

use ao::process::{self, ProcessThreads};
use ao::ActiveObjectConfig;

static HOUSEKEEPING: AtomicU32 = AtomicU32::new(0);

#[derive(Debug)]
struct Publish {
    topic: &'static str,
    payload: Vec<u8>,
}

fn publish(event: &mut Publish) {
    println!(
        "[{}] publish {} ({} bytes)",
        thread::current().name().unwrap_or("?"),
        event.topic,
        event.payload.len()
    );
}

fn signal_strength() -> i32 {
    println!("[{}] sampling rssi", thread::current().name().unwrap_or("?"));
    -67
}

fn main() -> ao::Result<()> {
    println!("=== Cross-thread Active Object Example ===\n");

    let threads = ProcessThreads::default().system(
        ActiveObjectConfig::builder()
            .name("system")
            .background_task(|| {
                HOUSEKEEPING.fetch_add(1, Ordering::Relaxed);
            })
            .build(),
    );
    process::boot(threads)?;

    let app = process::application_thread()?;
    let rssi = app.sync_call(|| {
        let system = match process::system_thread() {
            Ok(system) => system,
            Err(_) => return None,
        };
        let _ = system.invoke_with(
            publish,
            Publish {
                topic: "app/started",
                payload: b"hello".to_vec(),
            },
        );
        Some(process::system_sync(signal_strength))
    });
    println!("application read rssi {rssi:?}");

    thread::sleep(Duration::from_millis(250));
    println!(
        "system housekeeping ran {} times",
        HOUSEKEEPING.load(Ordering::Relaxed)
    );
    Ok(())
}
