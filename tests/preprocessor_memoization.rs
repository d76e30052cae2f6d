// tests/preprocessor_memoization.rs

use bundlewatch_test_utils::builders::PreprocessorOptionsBuilder;
use bundlewatch_test_utils::fake_engine::FakeEngine;
use bundlewatch_test_utils::{eventually, init_tracing, with_timeout};

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use bundlewatch::config::PreprocessorOptions;
use bundlewatch::errors::{BundlewatchError, FailureKind};
use bundlewatch::registry::BundleRegistry;
use bundlewatch::{FileEvent, Preprocessor};

type TestResult = Result<(), Box<dyn Error>>;

fn preprocessor(engine: &Arc<FakeEngine>, options: PreprocessorOptions) -> Preprocessor {
    Preprocessor::new(options, engine.clone())
}

#[tokio::test]
async fn concurrent_requests_share_one_build() -> TestResult {
    with_timeout(async {
        init_tracing();

        let engine = Arc::new(FakeEngine::new());
        let pre = preprocessor(&engine, PreprocessorOptions::default());
        let file = FileEvent::new("/p/spec/a.ts", "/out/a", false);

        let first = pre.handle(&file)?;
        let second = pre.handle(&file)?;
        // A different event for the same path hits the same entry.
        let third = pre.handle(&FileEvent::new("/p/spec/a.ts", "/elsewhere/a", false))?;

        assert!(first.ptr_eq(&second));
        assert!(first.ptr_eq(&third));
        assert_eq!(engine.invocation_count(), 1);

        let compiler = engine.controller("/p/spec/a.ts").unwrap();
        compiler.compile_started();
        compiler.succeed();

        let (a, b) = tokio::join!(first.wait(), second.wait());
        assert_eq!(a?, PathBuf::from("/out/a.js"));
        assert_eq!(b?, PathBuf::from("/out/a.js"));
        Ok(())
    })
    .await
}

#[tokio::test]
async fn settled_bundle_is_served_from_cache() -> TestResult {
    with_timeout(async {
        init_tracing();

        let engine = Arc::new(FakeEngine::auto_succeed());
        let pre = preprocessor(&engine, PreprocessorOptions::default());
        let file = FileEvent::new("/p/spec/a.ts", "/out/a.js", false);

        let first = pre.handle(&file)?;
        assert_eq!(first.wait().await?, PathBuf::from("/out/a.js"));

        let again = pre.handle(&file)?;
        assert!(again.ptr_eq(&first));
        assert_eq!(again.peek(), Some(Ok(PathBuf::from("/out/a.js"))));
        assert_eq!(engine.invocation_count(), 1);
        Ok(())
    })
    .await
}

#[tokio::test]
async fn different_paths_get_separate_sessions() -> TestResult {
    with_timeout(async {
        init_tracing();

        let engine = Arc::new(FakeEngine::auto_succeed());
        let pre = preprocessor(&engine, PreprocessorOptions::default());

        let a = pre.handle(&FileEvent::new("/p/a.ts", "/out/a", false))?;
        let b = pre.handle(&FileEvent::new("/p/b.ts", "/out/b", false))?;

        assert!(!a.ptr_eq(&b));
        assert_eq!(a.wait().await?, PathBuf::from("/out/a.js"));
        assert_eq!(b.wait().await?, PathBuf::from("/out/b.js"));
        assert_eq!(engine.invocations_for("/p/a.ts"), 1);
        assert_eq!(engine.invocations_for("/p/b.ts"), 1);
        assert_eq!(pre.registry().len(), 2);
        Ok(())
    })
    .await
}

#[tokio::test]
async fn failed_build_stays_cached() -> TestResult {
    with_timeout(async {
        init_tracing();

        let engine = Arc::new(FakeEngine::new());
        let pre = preprocessor(&engine, PreprocessorOptions::default());
        let file = FileEvent::new("/p/spec/a.ts", "/out/a", false);

        let first = pre.handle(&file)?;
        let compiler = engine.controller("/p/spec/a.ts").unwrap();
        compiler.compile_started();
        compiler.fail_engine("loader crashed");

        let failure = first.wait().await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::Engine);
        assert_eq!(failure.message, "loader crashed");
        assert_eq!(failure.file_path, PathBuf::from("/p/spec/a.ts"));

        let again = pre.handle(&file)?;
        assert!(again.ptr_eq(&first));
        assert_eq!(engine.invocation_count(), 1);
        Ok(())
    })
    .await
}

#[tokio::test]
async fn engine_that_stops_without_a_result_fails_the_build() -> TestResult {
    with_timeout(async {
        init_tracing();

        let engine = Arc::new(FakeEngine::new());
        let pre = preprocessor(&engine, PreprocessorOptions::default());
        let file = FileEvent::new("/p/spec/a.ts", "/out/a", false);

        let promise = pre.handle(&file)?;
        let compiler = engine.controller("/p/spec/a.ts").unwrap();
        compiler.compile_started();
        compiler.stop();

        let failure = promise.wait().await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::Engine);
        assert!(failure.message.contains("without reporting a result"));
        Ok(())
    })
    .await
}

#[tokio::test]
async fn engine_start_failure_is_returned_synchronously() -> TestResult {
    with_timeout(async {
        init_tracing();

        let engine = Arc::new(FakeEngine::failing_to_start("bundler binary missing"));
        let pre = preprocessor(&engine, PreprocessorOptions::default());
        let file = FileEvent::new("/p/spec/a.ts", "/out/a", false);

        match pre.handle(&file) {
            Err(BundlewatchError::EngineStart { path, message }) => {
                assert_eq!(path, PathBuf::from("/p/spec/a.ts"));
                assert!(message.contains("bundler binary missing"));
            }
            other => panic!("expected EngineStart, got {other:?}"),
        }
        assert!(pre.registry().is_empty());
        Ok(())
    })
    .await
}

#[tokio::test]
async fn invalid_rule_is_a_configuration_error() -> TestResult {
    with_timeout(async {
        init_tracing();

        let engine = Arc::new(FakeEngine::new());
        let options = PreprocessorOptionsBuilder::new()
            .with_rule("(unclosed", "broken-loader")
            .build();
        let pre = preprocessor(&engine, options);

        let err = pre
            .handle(&FileEvent::new("/p/spec/a.ts", "/out/a", false))
            .unwrap_err();
        assert!(matches!(err, BundlewatchError::InvalidPattern(_)));
        assert_eq!(engine.invocation_count(), 0);
        assert!(pre.registry().is_empty());
        Ok(())
    })
    .await
}

#[tokio::test]
async fn engine_receives_resolved_options() -> TestResult {
    with_timeout(async {
        init_tracing();

        let engine = Arc::new(FakeEngine::new());
        let options = PreprocessorOptionsBuilder::new()
            .with_rule(r"\.coffee$", "coffee-loader")
            .with_devtool("source-map")
            .with_additional_entry("/p/support/polyfills.js")
            .build();
        let pre = preprocessor(&engine, options);

        pre.handle(&FileEvent::new("/p/spec/a.ts", "/out/bundles/a", false))?;

        let invocations = engine.invocations();
        let invocation = &invocations[0];
        assert!(!invocation.is_watch());
        let resolved = &invocation.options;
        assert_eq!(
            resolved.entry,
            vec![PathBuf::from("/p/spec/a.ts"), PathBuf::from("/p/support/polyfills.js")]
        );
        let output = resolved.output.as_ref().unwrap();
        assert_eq!(output.path, PathBuf::from("/out/bundles"));
        assert_eq!(output.filename, "a.js");
        // The required override wins over the caller's devtool.
        assert_eq!(resolved.devtool.as_deref(), Some("inline-source-map"));
        let tests: Vec<&str> = resolved.module.rules.iter().map(|r| r.test.as_str()).collect();
        assert_eq!(tests, vec![r"\.coffee$", r"\.tsx?$"]);
        Ok(())
    })
    .await
}

#[tokio::test]
async fn shared_registry_and_reset() -> TestResult {
    with_timeout(async {
        init_tracing();

        let engine = Arc::new(FakeEngine::auto_succeed());
        let registry = BundleRegistry::new();
        let a = Preprocessor::with_registry(
            PreprocessorOptions::default(),
            engine.clone(),
            registry.clone(),
        );
        let b = Preprocessor::with_registry(
            PreprocessorOptions::default(),
            engine.clone(),
            registry.clone(),
        );
        let file = FileEvent::new("/p/spec/a.ts", "/out/a", false);

        let first = a.handle(&file)?;
        let second = b.handle(&file)?;
        assert!(first.ptr_eq(&second));
        first.wait().await?;

        a.reset();
        assert!(registry.is_empty());

        let rebuilt = b.handle(&file)?;
        assert!(!rebuilt.ptr_eq(&first));
        eventually(|| engine.invocations_for("/p/spec/a.ts") == 2).await;
        Ok(())
    })
    .await
}
