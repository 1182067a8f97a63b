//! # Plugins Through the Engine
//!
//! Registration, load/unload, routing by name, fault isolation and shutdown
//! on drop, using the bundled runtime plugins and test doubles.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use nexus_core::{
        EngineError, EngineState, ExecutionContext, OperationError, OperationModule, OperationOutput,
        OperationRequest, Plugin, PluginDescriptor, PluginError, PluginState,
    };
    use nexus_runtime::{install_bundled, ExamplePlugin, QuantumOptimizerPlugin};
    use serde_json::json;

    use crate::integration::{test_engine, GatePlugin};

    /// Panics on `"boom"`, otherwise echoes. Counts shutdowns.
    #[derive(Default)]
    struct Flaky {
        shutdowns: AtomicUsize,
    }

    impl OperationModule for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        fn execute(
            &self,
            request: &OperationRequest,
            _ctx: &ExecutionContext<'_>,
        ) -> Result<OperationOutput, OperationError> {
            match request {
                OperationRequest::Plugin { payload, .. } if payload == "boom" => {
                    panic!("flaky plugin exploded")
                }
                OperationRequest::Plugin { payload, .. } if payload == "fail" => Err(
                    OperationError::InvalidRequest("flaky rejected the payload".into()),
                ),
                OperationRequest::Plugin { payload, .. } => {
                    Ok(OperationOutput::Plugin(payload.clone()))
                }
                _ => Err(OperationError::InvalidRequest("plugin requests only".into())),
            }
        }
    }

    impl Plugin for Flaky {
        fn shutdown(&self) -> Result<(), OperationError> {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn flaky_descriptor() -> PluginDescriptor {
        PluginDescriptor::new("flaky", "0.0.1", "tests").with_description("unreliable on purpose")
    }

    #[test]
    fn test_bundled_plugins_execute() {
        let engine = test_engine(2, 64);
        install_bundled(&engine).unwrap();
        engine.start(2).unwrap();

        let listed = engine.list_plugins();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|d| d.state == PluginState::Active));

        let result = engine
            .submit(OperationRequest::plugin(
                QuantumOptimizerPlugin::NAME,
                json!({"gates": ["x", "x", "h", "t"]}),
            ))
            .unwrap();
        let Ok(OperationOutput::Plugin(out)) = result.into_output() else {
            panic!("expected plugin output");
        };
        assert_eq!(out["original_depth"], 4);
        assert_eq!(out["optimized_depth"], 2);

        let echo = engine
            .submit(OperationRequest::plugin(ExamplePlugin::NAME, json!({"n": 1})))
            .unwrap();
        assert!(echo.is_success());
        engine.stop().unwrap();
    }

    #[test]
    fn test_unknown_and_inactive_plugins_fail_the_task() {
        let engine = test_engine(1, 16);
        engine
            .register_plugin(flaky_descriptor(), Arc::new(Flaky::default()))
            .unwrap();
        engine.start(1).unwrap();

        let unknown = engine
            .submit(OperationRequest::plugin("missing", json!(null)))
            .unwrap();
        assert!(matches!(
            unknown.failure_reason(),
            Some(OperationError::InvalidRequest(_))
        ));

        // Registered but never loaded
        let inactive = engine
            .submit(OperationRequest::plugin("flaky", json!("hi")))
            .unwrap();
        assert!(matches!(
            inactive.failure_reason(),
            Some(OperationError::ModuleUnavailable(_))
        ));

        engine.load_plugin("flaky").unwrap();
        assert!(engine
            .submit(OperationRequest::plugin("flaky", json!("hi")))
            .unwrap()
            .is_success());

        engine.plugins().deactivate("flaky").unwrap();
        assert!(matches!(
            engine
                .submit(OperationRequest::plugin("flaky", json!("hi")))
                .unwrap()
                .failure_reason(),
            Some(OperationError::ModuleUnavailable(_))
        ));

        // Reloading an initialized plugin only re-activates it
        engine.load_plugin("flaky").unwrap();
        assert_eq!(
            engine.plugins().descriptor("flaky").map(|d| d.state),
            Some(PluginState::Active)
        );
        engine.stop().unwrap();
    }

    #[test]
    fn test_plugin_faults_are_isolated() {
        let engine = test_engine(2, 16);
        engine
            .register_plugin(flaky_descriptor(), Arc::new(Flaky::default()))
            .unwrap();
        engine.load_plugin("flaky").unwrap();
        engine.start(2).unwrap();

        let panicked = engine
            .submit(OperationRequest::plugin("flaky", json!("boom")))
            .unwrap();
        assert!(matches!(
            panicked.failure_reason(),
            Some(OperationError::PluginFault { plugin, message })
                if plugin == "flaky" && message.contains("exploded")
        ));

        let failed = engine
            .submit(OperationRequest::plugin("flaky", json!("fail")))
            .unwrap();
        assert!(matches!(
            failed.failure_reason(),
            Some(OperationError::PluginFault { .. })
        ));

        // Workers survive and keep serving other kinds
        assert!(engine
            .submit(OperationRequest::binary("xor", 3, Some(5)))
            .unwrap()
            .is_success());
        assert_eq!(engine.status().worker_count, 2);
        assert_eq!(engine.metrics().total_errors, 2);
        engine.stop().unwrap();
    }

    #[test]
    fn test_plugin_faults_leave_in_flight_tasks_untouched() {
        let engine = test_engine(3, 64);
        let gate = GatePlugin::install(&engine);
        engine
            .register_plugin(flaky_descriptor(), Arc::new(Flaky::default()))
            .unwrap();
        engine.load_plugin("flaky").unwrap();
        engine.start(3).unwrap();

        // Two workers held mid-task
        let held: Vec<_> = (0..2)
            .map(|_| engine.submit_async(GatePlugin::request()).unwrap())
            .collect();
        gate.wait_entered(2);

        // The third worker takes the faults and ordinary work while they run
        let queued = engine
            .submit_batch(vec![OperationRequest::binary("and", 12, Some(10)); 16])
            .unwrap();
        let panicked = engine
            .submit(OperationRequest::plugin("flaky", json!("boom")))
            .unwrap();
        let failed = engine
            .submit(OperationRequest::plugin("flaky", json!("fail")))
            .unwrap();
        assert!(matches!(
            panicked.failure_reason(),
            Some(OperationError::PluginFault { .. })
        ));
        assert!(matches!(
            failed.failure_reason(),
            Some(OperationError::PluginFault { .. })
        ));
        assert_eq!(engine.state(), EngineState::Running);

        gate.open();
        for handle in held {
            let result = handle.wait();
            assert!(result.is_success(), "held task failed: {:?}", result);
            assert_eq!(result.into_output().unwrap(), OperationOutput::Plugin(json!("hold")));
        }
        for handle in queued {
            let Ok(OperationOutput::Binary(out)) = handle.wait().into_output() else {
                panic!("expected binary output");
            };
            assert_eq!(out.value, 8);
        }

        assert_eq!(engine.state(), EngineState::Running);
        assert_eq!(engine.status().worker_count, 3);
        assert_eq!(engine.metrics().total_errors, 2);
        engine.stop().unwrap();
    }

    #[test]
    fn test_duplicate_registration_and_unload() {
        let engine = test_engine(1, 16);
        engine
            .register_plugin(flaky_descriptor(), Arc::new(Flaky::default()))
            .unwrap();
        assert_eq!(
            engine.register_plugin(flaky_descriptor(), Arc::new(Flaky::default())),
            Err(EngineError::Plugin(PluginError::DuplicateName(
                "flaky".to_string()
            )))
        );

        engine.load_plugin("flaky").unwrap();
        let descriptor = engine.unload_plugin("flaky").unwrap();
        assert_eq!(descriptor.state, PluginState::ShutDown);
        assert_eq!(descriptor.description, "unreliable on purpose");
        assert!(engine.list_plugins().is_empty());

        engine.start(1).unwrap();
        let result = engine
            .submit(OperationRequest::plugin("flaky", json!("hi")))
            .unwrap();
        assert!(matches!(
            result.failure_reason(),
            Some(OperationError::InvalidRequest(_))
        ));
        engine.stop().unwrap();

        assert!(matches!(
            engine.unload_plugin("flaky"),
            Err(EngineError::Plugin(PluginError::NotFound(_)))
        ));
    }

    #[test]
    fn test_dropping_engine_shuts_plugins_down() {
        let flaky = Arc::new(Flaky::default());
        {
            let engine = test_engine(1, 8);
            engine.register_plugin(flaky_descriptor(), flaky.clone()).unwrap();
            engine.load_plugin("flaky").unwrap();
            engine.start(1).unwrap();
        }
        assert_eq!(flaky.shutdowns.load(Ordering::SeqCst), 1);
    }
}
