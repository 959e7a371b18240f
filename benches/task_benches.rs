use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use modbus_task::{
    Codec, MockConnection, ModbusDriver, ModbusTcpCodec, ReadExecution, ReadRequest, Scheduler,
    SharedConnection,
};

fn register_response(tid: u16, count: usize) -> Vec<u8> {
    let byte_count = count * 2;
    let mut frame = tid.to_be_bytes().to_vec();
    frame.extend_from_slice(&[0x00, 0x00]);
    frame.extend_from_slice(&((byte_count + 3) as u16).to_be_bytes());
    frame.extend_from_slice(&[0x01, 0x03, byte_count as u8]);
    frame.resize(frame.len() + byte_count, 0xA5);
    frame
}

fn bench_codec(c: &mut Criterion) {
    let codec = ModbusTcpCodec::default();
    let request = ReadRequest::parse("holding-register:0[125]").unwrap();
    let response = register_response(1, 125);

    c.bench_function("encode_request", |b| {
        b.iter(|| codec.encode_request(black_box(&request), 1).unwrap())
    });
    c.bench_function("decode_125_registers", |b| {
        b.iter(|| {
            codec
                .decode_response(black_box(&response), &request, 1)
                .unwrap()
        })
    });
}

fn bench_read_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_cycle");
    for count in [1usize, 16, 125] {
        let address = format!("holding-register:0[{}]", count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &address, |b, address| {
            b.iter(|| {
                let mock = MockConnection::new();
                let connection = SharedConnection::new(mock.clone());
                let driver = ModbusDriver::default();
                let mut scheduler = Scheduler::new();

                let exec = ReadExecution::new(ReadRequest::parse(address).unwrap(), connection);
                driver.submit_read(&mut scheduler, &exec).unwrap();
                mock.push_inbound(&register_response(0, count));
                scheduler.run_until_idle(16);
                black_box(exec.take_outcome())
            })
        });
    }
    group.finish();
}

fn bench_many_connections(c: &mut Criterion) {
    c.bench_function("scheduler_64_connections", |b| {
        b.iter(|| {
            let driver = ModbusDriver::default();
            let mut scheduler = Scheduler::new();
            let mut executions = Vec::with_capacity(64);
            for i in 0..64u16 {
                let mock = MockConnection::new();
                let connection = SharedConnection::new(mock.clone());
                let exec = ReadExecution::new(
                    ReadRequest::parse("holding-register:0[8]").unwrap(),
                    connection,
                );
                driver.submit_read(&mut scheduler, &exec).unwrap();
                mock.push_inbound(&register_response(i, 8));
                executions.push(exec);
            }
            scheduler.run_until_idle(1024);
            black_box(scheduler.reap().len())
        })
    });
}

criterion_group!(benches, bench_codec, bench_read_cycle, bench_many_connections);
criterion_main!(benches);
