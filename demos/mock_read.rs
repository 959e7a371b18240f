//! Example: Several reads multiplexed over scripted connections
//!
//! Run with: RUST_LOG=debug cargo run --example mock_read
//!
//! This example demonstrates:
//! - Submitting reads to a scheduler
//! - Two reads sharing one connection
//! - Cancelling a read that is waiting on its device
//! - Taking outcomes and releasing responses

use modbus_task::utils::format_frame;
use modbus_task::{
    MockConnection, ModbusDriver, Outcome, ReadExecution, ReadRequest, Scheduler,
    SharedConnection,
};

fn main() -> modbus_task::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let driver = ModbusDriver::default();
    let mut scheduler = Scheduler::new();

    // =========================================================================
    // Two reads on one device, one read on a device that never answers
    // =========================================================================

    let device = MockConnection::new();
    let shared = SharedConnection::new(device.clone());
    let silent = SharedConnection::new(MockConnection::new());

    let registers = ReadExecution::new(ReadRequest::parse("holding-register:100[3]")?, shared.clone());
    let coils = ReadExecution::new(ReadRequest::parse("coil:0[10]")?, shared);
    let stuck = ReadExecution::new(ReadRequest::parse("input-register:0:REAL")?, silent);

    for exec in [&registers, &coils, &stuck] {
        let id = driver.submit_read(&mut scheduler, exec)?;
        println!("submitted {} as task {}", exec.request(), id);
    }

    // =========================================================================
    // Answer the first request, then the second
    // =========================================================================

    scheduler.run_until_idle(32);
    println!("sent: {}", format_frame(&device.written()));
    device.push_inbound(&[
        0x00, 0x00, 0x00, 0x00, 0x00, 0x09, 0x01, 0x03, 0x06, 0x00, 0x0A, 0x00, 0x0B, 0x00, 0x0C,
    ]);

    scheduler.run_until_idle(32);
    device.push_inbound(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x05, 0x01, 0x01, 0x02, 0x81, 0x02]);
    scheduler.run_until_idle(32);

    // =========================================================================
    // Give up on the silent device
    // =========================================================================

    stuck.cancel();
    scheduler.run_until_idle(32);
    println!("reaped {} tasks", scheduler.reap().len());

    for exec in [&registers, &coils, &stuck] {
        match exec.take_outcome() {
            Some(Outcome::Finished(mut response)) => {
                println!("{}:", exec.request());
                for item in &response {
                    if let Some(value) = item.value() {
                        println!("  {} = {}", item.address(), value);
                    }
                }
                driver.release_response(&mut response);
            }
            Some(Outcome::Failed(err)) => println!("{} failed: {}", exec.request(), err),
            Some(Outcome::Cancelled) => println!("{} cancelled", exec.request()),
            None => println!("{} still running", exec.request()),
        }
    }

    Ok(())
}
