//! Example: Polling a read against a real Modbus TCP device
//!
//! Run with: cargo run --example tcp_read -- 192.168.1.10:502 holding-register:0[4]
//!
//! The socket is non-blocking, so the loop below spins the scheduler and
//! sleeps briefly whenever every task is waiting on the network. The core has
//! no timeouts; the demo gives up after a deadline and cancels the read.

use std::net::SocketAddr;
use std::thread;
use std::time::{Duration, Instant};

use modbus_task::{
    DriverConfig, ModbusDriver, ReadExecution, ReadRequest, Scheduler, SharedConnection,
    TaskError, TcpConnection, DEFAULT_MODBUS_PORT,
};

fn main() -> modbus_task::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let mut args = std::env::args().skip(1);
    let addr: SocketAddr = args
        .next()
        .unwrap_or_else(|| format!("127.0.0.1:{}", DEFAULT_MODBUS_PORT))
        .parse()
        .map_err(|_| TaskError::invalid_request("addr", "expected <ip>:<port>"))?;
    let field = args.next().unwrap_or_else(|| String::from("holding-register:0[4]"));

    let connection = SharedConnection::new(TcpConnection::connect(addr)?);
    let driver = ModbusDriver::new(DriverConfig::new(1));
    let mut scheduler = Scheduler::new();

    let exec = ReadExecution::new(ReadRequest::parse(&field)?, connection);
    let id = driver.submit_read(&mut scheduler, &exec)?;

    let deadline = Instant::now() + Duration::from_secs(3);
    while scheduler.is_completed(id) == Some(false) {
        if Instant::now() >= deadline {
            exec.cancel();
        }
        if scheduler.run_until_idle(64) == 0 {
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }

    let response = exec
        .take_outcome()
        .ok_or(TaskError::Cancelled)?
        .into_result()?;
    for item in &response {
        if let Some(value) = item.value() {
            println!("{} = {}", item.address(), value);
        }
    }
    Ok(())
}
