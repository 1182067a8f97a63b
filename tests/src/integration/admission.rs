//! # Admission and Backpressure
//!
//! Non-blocking rejection on a full queue, atomic batch admission, and
//! concurrent producers against a shared engine.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use nexus_core::{EngineError, EngineState, OperationKind, OperationRequest};

    use crate::integration::{test_engine, GatePlugin};

    #[test]
    fn test_full_queue_rejects_immediately() {
        let engine = test_engine(1, 4);
        let gate = GatePlugin::install(&engine);
        engine.start(1).unwrap();

        let pinned = engine.submit_async(GatePlugin::request()).unwrap();
        gate.wait_entered(1);

        let mut accepted: Vec<_> = (0..4u64)
            .map(|i| {
                engine
                    .submit_async(OperationRequest::binary("or", i, Some(8)))
                    .unwrap()
            })
            .collect();

        let started = Instant::now();
        let rejected = engine.submit_async(OperationRequest::binary("or", 9, Some(8)));
        assert!(started.elapsed() < Duration::from_millis(100));
        assert!(matches!(rejected, Err(EngineError::QueueFull { capacity: 4 })));

        gate.open();
        accepted.push(pinned);
        assert!(accepted.into_iter().all(|h| h.wait().is_success()));

        // Rejected submissions never reach the metrics
        assert_eq!(engine.metrics().total_operations, 5);
        engine.stop().unwrap();
    }

    #[test]
    fn test_submission_requires_running_engine() {
        let engine = test_engine(1, 8);
        let request = OperationRequest::quantum("ground", 2, None);
        assert!(matches!(
            engine.submit(request.clone()),
            Err(EngineError::EngineNotRunning {
                state: EngineState::Stopped
            })
        ));

        engine.start(1).unwrap();
        assert!(engine.submit(request.clone()).unwrap().is_success());
        engine.stop().unwrap();

        assert!(matches!(
            engine.submit_batch(vec![request]),
            Err(EngineError::EngineNotRunning { .. })
        ));
    }

    #[test]
    fn test_batch_admission_is_all_or_nothing() {
        let engine = test_engine(1, 8);
        let gate = GatePlugin::install(&engine);
        engine.start(1).unwrap();

        let pinned = engine.submit_async(GatePlugin::request()).unwrap();
        gate.wait_entered(1);
        let first = engine
            .submit_batch(vec![OperationRequest::binary("xor", 1, Some(2)); 5])
            .unwrap();
        assert_eq!(engine.status().queue_depth, 5);

        let overflow = engine.submit_batch(vec![OperationRequest::binary("xor", 3, Some(4)); 4]);
        assert!(matches!(overflow, Err(EngineError::QueueFull { capacity: 8 })));
        assert_eq!(engine.status().queue_depth, 5);

        let second = engine
            .submit_batch(vec![OperationRequest::binary("xor", 5, Some(6)); 3])
            .unwrap();
        assert_eq!(engine.status().queue_depth, 8);

        gate.open();
        assert!(pinned.wait().is_success());
        for handle in first.into_iter().chain(second) {
            let result = handle.wait();
            assert!(result.is_success());
            assert_eq!(result.kind, OperationKind::Binary);
        }
        engine.stop().unwrap();
    }

    #[test]
    fn test_empty_batch_is_accepted() {
        let engine = test_engine(1, 8);
        engine.start(1).unwrap();
        assert!(engine.submit_batch(Vec::new()).unwrap().is_empty());
        engine.stop().unwrap();
    }

    #[test]
    fn test_concurrent_producers() {
        let engine = Arc::new(test_engine(4, 10_000));
        engine.start(4).unwrap();

        let producers: Vec<_> = (0..4u64)
            .map(|p| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    (0..250u64)
                        .map(|i| {
                            let request = if i % 2 == 0 {
                                OperationRequest::hash("siphash", (p * 1_000 + i).to_be_bytes().to_vec())
                            } else {
                                OperationRequest::binary("hamming", p, Some(i))
                            };
                            engine.submit(request).unwrap()
                        })
                        .filter(|r| r.is_success())
                        .count()
                })
            })
            .collect();

        let succeeded: usize = producers.into_iter().map(|p| p.join().unwrap()).sum();
        assert_eq!(succeeded, 1_000);

        let metrics = engine.metrics();
        assert_eq!(metrics.total_operations, 1_000);
        assert_eq!(metrics.total_errors, 0);
        assert_eq!(metrics.operations_by_kind.get(&OperationKind::Hash), Some(&500));
        assert_eq!(metrics.operations_by_kind.get(&OperationKind::Binary), Some(&500));
        assert_eq!(metrics.queue_depth, 0);
        engine.stop().unwrap();
    }
}
