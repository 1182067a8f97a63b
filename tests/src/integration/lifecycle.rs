//! # Engine Lifecycle
//!
//! start / stop / pause / resume, result delivery for tasks caught by `stop`,
//! timeout accounting and the shutdown-timeout error state.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use futures::future::join_all;
    use nexus_core::{
        Engine, EngineConfigBuilder, EngineError, EngineState, OperationError, OperationKind,
        OperationRequest,
    };

    use crate::integration::{test_engine, GatePlugin};

    #[test]
    fn test_restart_after_clean_stop() {
        let engine = test_engine(2, 64);
        for round in 0..3u64 {
            engine.start(2).unwrap();
            let status = engine.status();
            assert_eq!(status.state, EngineState::Running);
            assert_eq!(status.worker_count, 2);
            assert_eq!(status.queue_capacity, 64);

            let result = engine
                .submit(OperationRequest::binary("xor", round, Some(1)))
                .unwrap();
            assert!(result.is_success());

            engine.stop().unwrap();
            let status = engine.status();
            assert_eq!(status.state, EngineState::Stopped);
            assert_eq!(status.uptime, Duration::ZERO);
        }
        assert_eq!(engine.metrics().total_operations, 3);
    }

    #[test]
    fn test_stop_completes_in_flight_and_cancels_queued() {
        let engine = Arc::new(test_engine(1, 32));
        let gate = GatePlugin::install(&engine);
        engine.start(1).unwrap();

        let in_flight = engine.submit_async(GatePlugin::request()).unwrap();
        gate.wait_entered(1);
        let queued: Vec<_> = (0..5)
            .map(|i| {
                engine
                    .submit_async(OperationRequest::binary("not", i, None))
                    .unwrap()
            })
            .collect();
        assert_eq!(engine.status().queue_depth, 5);

        let stopper = {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.stop())
        };

        // Queued tasks are failed as soon as the queue closes
        for handle in queued {
            let result = handle.wait();
            assert_eq!(result.failure_reason(), Some(&OperationError::EngineStopped));
            assert_eq!(result.latency_us, 0);
        }

        gate.open();
        stopper.join().unwrap().unwrap();
        assert!(in_flight.wait().is_success());

        // Only the executed task is in the metrics
        let metrics = engine.metrics();
        assert_eq!(metrics.total_operations, 1);
        assert_eq!(metrics.operations_by_kind.get(&OperationKind::Plugin), Some(&1));
    }

    #[test]
    fn test_pause_holds_queued_tasks_until_resume() {
        let engine = test_engine(1, 32);
        let gate = GatePlugin::install(&engine);
        engine.start(1).unwrap();

        let held = engine.submit_async(GatePlugin::request()).unwrap();
        gate.wait_entered(1);
        let queued: Vec<_> = (0..3)
            .map(|i| {
                engine
                    .submit_async(OperationRequest::binary("popcount", i, None))
                    .unwrap()
            })
            .collect();

        engine.pause().unwrap();
        assert_eq!(engine.state(), EngineState::Paused);
        gate.open();
        assert!(held.wait().is_success());

        // The worker is free but must not dequeue while paused
        thread::sleep(Duration::from_millis(50));
        assert_eq!(engine.status().queue_depth, 3);
        assert!(matches!(
            engine.pause(),
            Err(EngineError::EngineNotRunning {
                state: EngineState::Paused
            })
        ));

        engine.resume().unwrap();
        assert!(queued.into_iter().all(|h| h.wait().is_success()));
        engine.stop().unwrap();
    }

    #[test]
    fn test_stop_from_paused_cancels_queue() {
        let engine = test_engine(1, 32);
        engine.start(1).unwrap();
        engine.pause().unwrap();

        // Paused engines reject new work, so nothing is queued here
        assert!(engine
            .submit_async(OperationRequest::binary("and", 1, Some(1)))
            .is_err());
        engine.stop().unwrap();
        assert_eq!(engine.state(), EngineState::Stopped);
    }

    #[test]
    fn test_tasks_expire_against_operation_timeout() {
        let config = EngineConfigBuilder::new()
            .num_threads(1)
            .queue_capacity(16)
            .batch_size(16)
            .operation_timeout(Duration::from_millis(50))
            .build()
            .unwrap();
        let engine = Engine::new(config).unwrap();
        let gate = GatePlugin::install(&engine);
        engine.start(1).unwrap();

        let slow = engine.submit_async(GatePlugin::request()).unwrap();
        gate.wait_entered(1);
        let waiting = engine
            .submit_async(OperationRequest::hash("sha256", b"late".to_vec()))
            .unwrap();

        thread::sleep(Duration::from_millis(120));
        gate.open();

        let timeout = OperationError::Timeout { timeout_ms: 50 };
        assert_eq!(slow.wait().failure_reason(), Some(&timeout));
        assert_eq!(waiting.wait().failure_reason(), Some(&timeout));
        assert_eq!(engine.metrics().total_errors, 2);
        engine.stop().unwrap();
    }

    #[test]
    fn test_shutdown_timeout_enters_error_state() {
        let config = EngineConfigBuilder::new()
            .num_threads(1)
            .queue_capacity(8)
            .batch_size(8)
            .shutdown_timeout(Duration::from_millis(100))
            .build()
            .unwrap();
        let engine = Engine::new(config).unwrap();
        let gate = GatePlugin::install(&engine);
        engine.start(1).unwrap();

        let stuck = engine.submit_async(GatePlugin::request()).unwrap();
        gate.wait_entered(1);

        assert!(matches!(
            engine.stop(),
            Err(EngineError::ShutdownTimeout { unjoined: 1, .. })
        ));
        assert_eq!(engine.state(), EngineState::Error);
        assert_eq!(
            engine.start(1),
            Err(EngineError::AlreadyRunning {
                state: EngineState::Error
            })
        );

        // Release the detached worker
        gate.open();
        assert!(stuck.wait().is_success());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_async_submissions_all_resolve() {
        let engine = test_engine(4, 1_024);
        engine.start(4).unwrap();

        let handles: Vec<_> = (0..200u64)
            .map(|i| {
                let request = match i % 4 {
                    0 => OperationRequest::binary("rotl", i, Some(i % 64)),
                    1 => OperationRequest::matrix("ones", 8, 8),
                    2 => OperationRequest::quantum("hadamard", 4, Some(1)),
                    _ => OperationRequest::hash("blake3", i.to_le_bytes().to_vec()),
                };
                engine.submit_async(request).unwrap()
            })
            .collect();
        let ids: std::collections::HashSet<_> = handles.iter().map(|h| h.task_id()).collect();

        let results = join_all(handles).await;
        assert_eq!(results.len(), 200);
        assert!(results.iter().all(|r| r.is_success()));
        assert!(results.iter().all(|r| ids.contains(&r.task_id)));

        let metrics = engine.metrics();
        assert_eq!(metrics.total_operations, 200);
        assert_eq!(metrics.operations_by_kind.get(&OperationKind::Matrix), Some(&50));
        engine.stop().unwrap();
    }
}
