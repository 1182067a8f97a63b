//! # Modules End to End
//!
//! Built-in module outputs observed through the engine, custom dispatch
//! tables, and the aggregated metrics they produce.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use nexus_core::{
        Dispatcher, Engine, EngineConfigBuilder, EngineError, NullModule, OperationError,
        OperationKind, OperationOutput, OperationRequest,
    };

    use crate::integration::test_engine;

    fn run(engine: &Engine, request: OperationRequest) -> Result<OperationOutput, EngineError> {
        engine.submit(request)?.into_output()
    }

    #[test]
    fn test_builtin_modules_through_engine() {
        let engine = test_engine(2, 64);
        engine.start(2).unwrap();

        let Ok(OperationOutput::Binary(out)) =
            run(&engine, OperationRequest::binary("and", 0b1100, Some(0b1010)))
        else {
            panic!("expected binary output");
        };
        assert_eq!(out.value, 0b1000);
        assert_eq!(out.binary.len(), 64);

        let Ok(OperationOutput::Matrix(summary)) =
            run(&engine, OperationRequest::matrix("identity", 5, 5))
        else {
            panic!("expected matrix summary");
        };
        assert_eq!((summary.rows, summary.cols), (5, 5));
        assert_eq!(summary.trace, Some(5.0));
        assert_eq!(summary.sum, 5.0);
        assert_eq!(summary.sample.len(), 3);

        let Ok(OperationOutput::Quantum(state)) =
            run(&engine, OperationRequest::quantum("superposition", 3, None))
        else {
            panic!("expected quantum output");
        };
        assert_eq!(state.probabilities.len(), 3);
        assert!((state.norm - 1.0).abs() < 1e-9);
        for qubit in &state.probabilities {
            assert!((qubit.p0 - 0.5).abs() < 1e-9);
            assert!((qubit.p0 + qubit.p1 - 1.0).abs() < 1e-9);
        }

        let Ok(OperationOutput::Hash(digest)) =
            run(&engine, OperationRequest::hash("sha256", b"abc".to_vec()))
        else {
            panic!("expected hash output");
        };
        assert_eq!(
            digest.hex,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(digest.bytes_hashed, 3);

        engine.stop().unwrap();
    }

    #[test]
    fn test_arithmetic_and_vector_requests_through_engine() {
        let engine = test_engine(2, 64);
        engine.start(2).unwrap();

        let Ok(OperationOutput::MatrixResult(product)) = run(
            &engine,
            OperationRequest::matrix_binary(
                "multiply",
                vec![vec![1.0, 2.0], vec![3.0, 4.0]],
                vec![vec![0.0, 1.0], vec![1.0, 0.0]],
            ),
        ) else {
            panic!("expected matrix result");
        };
        assert_eq!(product.matrix, Some(vec![vec![2.0, 1.0], vec![4.0, 3.0]]));

        assert!(matches!(
            run(&engine, OperationRequest::matrix_unary("determinant", vec![vec![1.0, 2.0]])),
            Err(EngineError::InvalidRequest(_))
        ));

        let Ok(OperationOutput::BitVector(words)) =
            run(&engine, OperationRequest::bit_vector("or", vec![1, 2], vec![4]))
        else {
            panic!("expected bit vector output");
        };
        assert_eq!(words, vec![5, 2]);

        let Ok(OperationOutput::Binary(zeros)) =
            run(&engine, OperationRequest::binary("trailing_zeros", 96, None))
        else {
            panic!("expected binary output");
        };
        assert_eq!(zeros.value, 5);

        let Ok(OperationOutput::Hash(digest)) =
            run(&engine, OperationRequest::hash("xxhash64", Vec::new()))
        else {
            panic!("expected hash output");
        };
        assert_eq!(digest.hex, "ef46db3751d8e999");

        let Ok(OperationOutput::Quantum(bell)) =
            run(&engine, OperationRequest::quantum("bell", 3, Some(0)))
        else {
            panic!("expected quantum output");
        };
        assert!((bell.entanglement.unwrap() - 2.0 / 3.0).abs() < 1e-9);

        let metrics = engine.metrics();
        assert_eq!(metrics.operations_by_kind.get(&OperationKind::Matrix), Some(&2));
        assert_eq!(metrics.operations_by_kind.get(&OperationKind::Binary), Some(&2));
        engine.stop().unwrap();
    }

    #[test]
    fn test_configured_qubit_cap_fails_oversized_registers() {
        let config = EngineConfigBuilder::new()
            .num_threads(1)
            .queue_capacity(8)
            .batch_size(8)
            .max_qubits(8)
            .build()
            .unwrap();
        let engine = Engine::new(config).unwrap();
        engine.start(1).unwrap();

        let result = engine
            .submit(OperationRequest::quantum("superposition", 9, None))
            .unwrap();
        assert!(matches!(
            result.failure_reason(),
            Some(OperationError::ResourceExhausted(_))
        ));
        assert!(engine
            .submit(OperationRequest::quantum("superposition", 8, None))
            .unwrap()
            .is_success());
        engine.stop().unwrap();
    }

    #[test]
    fn test_invalid_requests_surface_as_invalid_request() {
        let engine = test_engine(1, 16);
        engine.start(1).unwrap();

        for request in [
            OperationRequest::binary("nand", 1, Some(1)),
            OperationRequest::matrix("diagonal", 2, 2),
            OperationRequest::quantum("superposition", 0, None),
            OperationRequest::quantum("superposition", 33, None),
            OperationRequest::quantum("hadamard", 2, Some(2)),
            OperationRequest::hash("md5", b"x".to_vec()),
        ] {
            assert!(
                matches!(run(&engine, request.clone()), Err(EngineError::InvalidRequest(_))),
                "{:?} should be rejected",
                request
            );
        }

        let metrics = engine.metrics();
        assert_eq!(metrics.total_operations, 6);
        assert_eq!(metrics.total_errors, 6);
        assert!((metrics.error_rate - 1.0).abs() < f64::EPSILON);
        engine.stop().unwrap();
    }

    #[test]
    fn test_null_dispatch_reports_module_unavailable() {
        let config = EngineConfigBuilder::new()
            .num_threads(1)
            .queue_capacity(8)
            .batch_size(8)
            .build()
            .unwrap();
        let dispatcher = Dispatcher::builtin()
            .with_module(OperationKind::Matrix, Arc::new(NullModule::new(OperationKind::Matrix)));
        let engine = Engine::with_dispatcher(config, dispatcher).unwrap();
        engine.start(1).unwrap();

        let result = engine
            .submit(OperationRequest::matrix("zeros", 2, 2))
            .unwrap();
        assert!(matches!(
            result.failure_reason(),
            Some(OperationError::ModuleUnavailable(_))
        ));
        assert!(engine
            .submit(OperationRequest::binary("not", 0, None))
            .unwrap()
            .is_success());
        engine.stop().unwrap();
    }

    #[test]
    fn test_metrics_json_and_reset() {
        let engine = test_engine(2, 256);
        engine.start(2).unwrap();
        for i in 0..100u64 {
            engine
                .submit(OperationRequest::hash("murmur3", i.to_le_bytes().to_vec()))
                .unwrap();
        }

        let metrics = engine.metrics();
        assert_eq!(metrics.sample_count, 100);
        assert!(metrics.latency_us.p50 <= metrics.latency_us.p95);
        assert!(metrics.latency_us.p95 <= metrics.latency_us.p99);
        assert!(metrics.latency_us.p99 <= metrics.latency_us.max);

        let json: serde_json::Value = serde_json::from_str(&metrics.to_json().unwrap()).unwrap();
        assert_eq!(json["total_operations"], 100);
        assert_eq!(json["operations_by_kind"]["hash"], 100);

        engine.metrics_collector().reset();
        let cleared = engine.metrics();
        assert_eq!(cleared.total_operations, 0);
        assert_eq!(cleared.sample_count, 0);
        engine.stop().unwrap();
    }

    #[test]
    fn test_scratch_buffers_are_returned() {
        let engine = test_engine(2, 64);
        engine.start(2).unwrap();
        for _ in 0..20 {
            engine
                .submit(OperationRequest::matrix("random", 32, 32))
                .unwrap();
            engine
                .submit(OperationRequest::hash("blake3", vec![7u8; 1_024]))
                .unwrap();
        }
        engine.stop().unwrap();

        let floats = engine.buffers().floats.stats();
        let bytes = engine.buffers().bytes.stats();
        assert_eq!(floats.in_use_blocks, 0);
        assert_eq!(bytes.in_use_blocks, 0);
        assert_eq!(floats.total_acquisitions, floats.total_releases);
    }
}
