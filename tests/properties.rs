//! Property tests for read tasks under arbitrary payloads and delivery patterns.

use proptest::prelude::*;

use modbus_task::{
    Completion, MockConnection, ModbusDriver, PlcValue, ReadExecution, ReadRequest,
    SharedConnection, StepStatus,
};

/// Holding-register response to transaction 0 from unit 1.
fn register_response(values: &[u16]) -> Vec<u8> {
    let byte_count = values.len() * 2;
    let mut frame = vec![0x00, 0x00, 0x00, 0x00];
    frame.extend_from_slice(&((byte_count + 3) as u16).to_be_bytes());
    frame.extend_from_slice(&[0x01, 0x03, byte_count as u8]);
    for value in values {
        frame.extend_from_slice(&value.to_be_bytes());
    }
    frame
}

/// Splits `frame` at the given cut points (taken modulo its length).
fn split(frame: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    let mut points: Vec<usize> = cuts.iter().map(|c| c % frame.len()).collect();
    points.push(0);
    points.push(frame.len());
    points.sort_unstable();
    points.dedup();
    points
        .windows(2)
        .map(|w| frame[w[0]..w[1]].to_vec())
        .collect()
}

proptest! {
    /// N requested registers yield exactly N items, in request order.
    #[test]
    fn finished_store_matches_request(
        start in 0u16..1000,
        values in prop::collection::vec(any::<u16>(), 1..=125),
    ) {
        let mock = MockConnection::new();
        let connection = SharedConnection::new(mock.clone());
        let address = format!("holding-register:{}[{}]", start, values.len());
        let exec = ReadExecution::new(ReadRequest::parse(&address).unwrap(), connection);
        let driver = ModbusDriver::default();
        let mut task = driver.create_read_task(&exec).unwrap();

        mock.push_inbound(&register_response(&values));
        let mut status = StepStatus::Pending;
        for _ in 0..10 {
            status = task.poll();
        }
        prop_assert_eq!(status, StepStatus::Done(Completion::Finished));

        let response = exec.take_outcome().unwrap().into_result().unwrap();
        prop_assert_eq!(response.len(), values.len());
        for (index, item) in response.iter().enumerate() {
            prop_assert_eq!(item.address(), start + index as u16);
            prop_assert_eq!(item.value(), Some(&PlcValue::UInt(values[index])));
        }
    }

    /// Completion flips from false to true exactly once, however the
    /// response trickles in.
    #[test]
    fn completion_is_monotonic(
        values in prop::collection::vec(any::<u16>(), 1..=20),
        cuts in prop::collection::vec(any::<usize>(), 0..8),
        idle_polls in prop::collection::vec(0usize..3, 8),
    ) {
        let mock = MockConnection::new();
        let connection = SharedConnection::new(mock.clone());
        let address = format!("input-register:0[{}]", values.len());
        let exec = ReadExecution::new(ReadRequest::parse(&address).unwrap(), connection);
        let driver = ModbusDriver::default();
        let mut task = driver.create_read_task(&exec).unwrap();

        // the request is for input registers
        let mut frame = register_response(&values);
        frame[7] = 0x04;

        let mut completions = 0;
        let mut was_completed = false;
        let mut observe = |done: bool| {
            if done && !was_completed {
                completions += 1;
            }
            assert!(!(was_completed && !done), "completion went back to false");
            was_completed = done;
        };

        let chunks = split(&frame, &cuts);
        for (chunk, idle) in chunks.iter().zip(idle_polls.iter().cycle()) {
            for _ in 0..*idle {
                task.poll();
                observe(task.is_completed());
            }
            mock.push_inbound(chunk);
        }
        for _ in 0..(chunks.len() + 5) {
            task.poll();
            observe(task.is_completed());
        }

        prop_assert_eq!(completions, 1);
        prop_assert_eq!(task.completion(), Some(Completion::Finished));
    }

    /// Releasing a response a second time changes nothing.
    #[test]
    fn double_release_is_noop(values in prop::collection::vec(any::<u16>(), 1..=50)) {
        let mock = MockConnection::new();
        let connection = SharedConnection::new(mock.clone());
        let address = format!("holding-register:0[{}]", values.len());
        let exec = ReadExecution::new(ReadRequest::parse(&address).unwrap(), connection);
        let driver = ModbusDriver::default();
        let mut task = driver.create_read_task(&exec).unwrap();
        mock.push_inbound(&register_response(&values));
        for _ in 0..10 {
            task.poll();
        }

        let mut response = exec.take_outcome().unwrap().into_result().unwrap();
        prop_assert_eq!(driver.release_response(&mut response), values.len());
        let after_first = response.clone();
        prop_assert_eq!(driver.release_response(&mut response), 0);
        prop_assert_eq!(&response, &after_first);
        prop_assert_eq!(response.retained(), 0);
    }
}
