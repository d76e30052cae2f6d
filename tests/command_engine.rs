// tests/command_engine.rs

//! The process-backed engine, driven through the preprocessor with a real
//! shell.

#![cfg(unix)]

use bundlewatch_test_utils::builders::PreprocessorOptionsBuilder;
use bundlewatch_test_utils::{init_tracing, with_timeout};

use std::error::Error;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bundlewatch::config::{CommandSection, PreprocessorOptions};
use bundlewatch::errors::FailureKind;
use bundlewatch::exec::CommandEngine;
use bundlewatch::fs::mock::MockFileSystem;
use bundlewatch::{FileEvent, Preprocessor};

type TestResult = Result<(), Box<dyn Error>>;

fn preprocessor(options: PreprocessorOptions) -> Preprocessor {
    let command = options.command.clone().expect("test options carry a command");
    Preprocessor::new(options, Arc::new(CommandEngine::new(command)))
}

fn source(dir: &Path) -> std::io::Result<std::path::PathBuf> {
    let spec = dir.join("spec");
    fs::create_dir_all(&spec)?;
    let file = spec.join("a.ts");
    fs::write(&file, "export const answer = 42;\n")?;
    Ok(file)
}

#[tokio::test]
async fn successful_command_resolves_and_passes_placeholders() -> TestResult {
    with_timeout(async {
        init_tracing();
        let dir = tempfile::tempdir()?;
        let file_path = source(dir.path())?;
        let out = dir.path().join("out");
        let seen = dir.path().join("seen.txt");

        let options = PreprocessorOptionsBuilder::new()
            .with_command(&format!(
                "test -f \"$BUNDLEWATCH_CONFIG\" && \
                 echo \"$BUNDLEWATCH_ENTRY\" > {seen} && \
                 cp \"$BUNDLEWATCH_ENTRY\" \"$BUNDLEWATCH_OUTPUT\" && \
                 printf 'warning: slow build\\n\\nnot a diagnostic\\n' >&2",
                seen = seen.display()
            ))
            .build();
        let pre = preprocessor(options);
        let file = FileEvent::new(&file_path, out.join("a"), false);

        let bundle = pre.handle(&file)?.wait().await?;

        assert_eq!(bundle, out.join("a.js"));
        assert_eq!(fs::read_to_string(&bundle)?, "export const answer = 42;\n");
        assert_eq!(fs::read_to_string(&seen)?.trim(), file_path.to_string_lossy());
        file.close().await;
        Ok(())
    })
    .await
}

#[tokio::test]
async fn failing_command_rejects_with_cleansed_errors() -> TestResult {
    with_timeout(async {
        init_tracing();
        let dir = tempfile::tempdir()?;
        let file_path = source(dir.path())?;

        let options = PreprocessorOptionsBuilder::new()
            .with_command(
                "printf 'Error: boom\\n    at compile (x.js:1:1)\\n\\nError: second\\n' >&2; exit 2",
            )
            .build();
        let pre = preprocessor(options);
        let file = FileEvent::new(&file_path, dir.path().join("out/a"), false);

        let failure = pre.handle(&file)?.wait().await.unwrap_err();

        assert_eq!(failure.kind, FailureKind::Compilation);
        assert_eq!(failure.message, "Error: boom\n\nError: second");
        assert_eq!(failure.file_path, file_path);
        Ok(())
    })
    .await
}

#[tokio::test]
async fn silent_failure_reports_exit_status() -> TestResult {
    with_timeout(async {
        init_tracing();
        let dir = tempfile::tempdir()?;
        let file_path = source(dir.path())?;

        let options = PreprocessorOptionsBuilder::new().with_command("exit 3").build();
        let pre = preprocessor(options);
        let file = FileEvent::new(&file_path, dir.path().join("out/a"), false);

        let failure = pre.handle(&file)?.wait().await.unwrap_err();
        assert_eq!(failure.message, "bundler exited with status 3");
        Ok(())
    })
    .await
}

#[tokio::test]
async fn missing_program_is_an_engine_failure() -> TestResult {
    with_timeout(async {
        init_tracing();
        let dir = tempfile::tempdir()?;
        let file_path = source(dir.path())?;

        let mut options = PreprocessorOptions::default();
        options.command = Some(CommandSection {
            program: dir.path().join("no-such-bundler").to_string_lossy().into_owned(),
            args: vec!["{entry}".to_string()],
            env: Default::default(),
        });
        let pre = preprocessor(options);
        let file = FileEvent::new(&file_path, dir.path().join("out/a"), false);

        let failure = pre.handle(&file)?.wait().await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::Engine);
        assert!(failure.message.contains("no-such-bundler"));
        Ok(())
    })
    .await
}

#[tokio::test]
async fn rendered_config_goes_through_the_filesystem_abstraction() -> TestResult {
    with_timeout(async {
        init_tracing();
        let dir = tempfile::tempdir()?;
        let file_path = source(dir.path())?;
        let fs_mock = Arc::new(MockFileSystem::new());

        // Succeeds only if the config never touched the real disk.
        let command = CommandSection {
            program: "test ! -e \"$BUNDLEWATCH_CONFIG\"".to_string(),
            args: vec![],
            env: Default::default(),
        };
        let engine = CommandEngine::with_fs(command, fs_mock.clone());
        let pre = Preprocessor::new(PreprocessorOptions::default(), Arc::new(engine));
        let file = FileEvent::new(&file_path, dir.path().join("out/a"), false);

        pre.handle(&file)?.wait().await?;

        // Removed again once the one-shot build is over.
        let config = dir.path().join("out/.bundlewatch/a.js.toml");
        tokio::time::timeout(Duration::from_secs(2), async {
            while fs_mock.contents(&config).is_some() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await?;
        Ok(())
    })
    .await
}

#[tokio::test]
#[ignore = "depends on filesystem notifications"]
async fn watch_mode_rebuilds_on_change_and_reruns() -> TestResult {
    with_timeout(async {
        init_tracing();
        let dir = tempfile::tempdir()?;
        let file_path = source(dir.path())?;
        let out = dir.path().join("out");

        let options = PreprocessorOptionsBuilder::new()
            .with_command("cp \"$BUNDLEWATCH_ENTRY\" \"$BUNDLEWATCH_OUTPUT\"")
            .with_aggregate_timeout(20)
            .build();
        let pre = preprocessor(options);
        let file = FileEvent::new(&file_path, out.join("a"), true);
        let mut reruns = file.subscribe_rerun();

        let bundle = pre.handle(&file)?.wait().await?;
        assert_eq!(fs::read_to_string(&bundle)?, "export const answer = 42;\n");

        fs::write(&file_path, "export const answer = 43;\n")?;
        reruns.recv().await?;

        let rebuilt = pre.handle(&file)?.wait().await?;
        assert_eq!(fs::read_to_string(&rebuilt)?, "export const answer = 43;\n");

        file.close().await;
        assert!(pre.registry().is_empty());
        Ok(())
    })
    .await
}
