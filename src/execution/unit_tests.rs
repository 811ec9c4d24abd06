use super::*;
use crate::execution::{program, ScriptError, StaticCompiler};
use crate::suite::TestStatus;

fn unit_with(compiler: StaticCompiler, options: RunOptions) -> ExecutionUnit {
    ExecutionUnit::new(Arc::new(compiler), options).with_process(ProcessSnapshot::empty())
}

#[tokio::test]
async fn test_successful_file_yields_report_only() {
    let compiler = StaticCompiler::new();
    compiler.register(
        "ok.test",
        program(|sb| {
            sb.console().log("registering");
            sb.suite().it("passes", || async { Ok(()) });
            sb.suite().it("fails", || async { Err(TestFailure::new("expected 2, got 3")) });
            sb.run();
            Ok(())
        }),
    );
    let unit = unit_with(compiler, RunOptions::default());

    let result = unit.execute(Path::new("ok.test")).await;
    let report = result.report().expect("report");
    assert!(result.execution_error().is_none());
    assert_eq!(result.state, ExecutionState::Completed);
    assert_eq!(report.description, "ok.test");
    assert_eq!(report.stats.passed, 1);
    assert_eq!(report.stats.failed, 1);
    assert!(!result.passed());
    assert_eq!(result.logs.len(), 1);
    assert_eq!(result.logs[0].message, "registering");
}

#[tokio::test]
async fn test_compile_error_is_execution_error() {
    let compiler = StaticCompiler::new();
    compiler.fail("broken.test", "unexpected token", None);
    let unit = unit_with(compiler, RunOptions::default());

    let result = unit.execute(Path::new("broken.test")).await;
    assert!(result.report().is_none());
    assert!(matches!(result.execution_error(), Some(ExecutionError::Compile { .. })));
    assert_eq!(result.state, ExecutionState::Crashed);
}

#[tokio::test]
async fn test_registration_error_and_panic_crash_the_sandbox() {
    let compiler = StaticCompiler::new();
    compiler.register("throws.test", program(|_| Err(ScriptError::new("ReferenceError: x"))));
    compiler.register(
        "panics.test",
        program(|_| {
            if true {
                panic!("top-level panic");
            }
            Ok(())
        }),
    );
    let unit = unit_with(compiler, RunOptions::default());

    let thrown = unit.execute(Path::new("throws.test")).await;
    assert_eq!(
        thrown.execution_error(),
        Some(&ExecutionError::SandboxCrash {
            message: "ReferenceError: x".into()
        })
    );

    let panicked = unit.execute(Path::new("panics.test")).await;
    match panicked.execution_error() {
        Some(ExecutionError::SandboxCrash { message }) => assert!(message.contains("top-level panic")),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_run_call_is_malformed() {
    let compiler = StaticCompiler::new();
    compiler.register(
        "norun.test",
        program(|sb| {
            sb.suite().it("never runs", || async { Ok(()) });
            Ok(())
        }),
    );
    let unit = unit_with(compiler, RunOptions::default());

    let result = unit.execute(Path::new("norun.test")).await;
    assert!(matches!(
        result.execution_error(),
        Some(ExecutionError::MalformedReport { .. })
    ));
}

#[tokio::test]
async fn test_file_timeout_abandons_sandbox() {
    let compiler = StaticCompiler::new();
    compiler.register(
        "slow.test",
        program(|sb| {
            let timers = sb.timers().clone();
            sb.suite().it("sleeps", move || {
                let timers = timers.clone();
                async move {
                    timers.sleep(Duration::from_secs(10)).await;
                    Ok(())
                }
            });
            sb.run();
            Ok(())
        }),
    );
    let options = RunOptions {
        file_timeout: Duration::from_millis(50),
        ..RunOptions::default()
    };
    let unit = unit_with(compiler, options);

    let started = Instant::now();
    let result = unit.execute(Path::new("slow.test")).await;
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(result.state, ExecutionState::TimedOut);
    assert_eq!(
        result.execution_error().map(ToString::to_string).as_deref(),
        Some("file timed out: exceeded 50 ms")
    );
}

#[tokio::test]
async fn test_sandboxes_do_not_share_state() {
    let compiler = StaticCompiler::new();
    compiler.register(
        "a.test",
        program(|sb| {
            let seen = sb.process().var("QUIVER_UNIT_MARKER").map(str::to_string);
            sb.suite().it("sees clean env", move || {
                let seen = seen.clone();
                async move {
                    match seen {
                        None => Ok(()),
                        Some(v) => Err(TestFailure::new(format!("leaked {}", v))),
                    }
                }
            });
            sb.run();
            Ok(())
        }),
    );
    let unit = unit_with(compiler, RunOptions::default());

    let first = unit.execute(Path::new("a.test")).await;
    let second = unit.execute(Path::new("a.test")).await;
    assert!(first.passed() && second.passed());
    assert_eq!(second.report().unwrap().tests[0].status, TestStatus::Passed);
}

#[tokio::test]
async fn test_extensions_reach_the_sandbox() {
    let compiler = StaticCompiler::new();
    compiler.register(
        "ext.test",
        program(|sb| {
            let tolerance = sb
                .extensions()
                .get::<f64>("tolerance")
                .ok_or_else(|| ScriptError::new("tolerance not injected"))?;
            sb.suite().it("close enough", move || {
                let tolerance = *tolerance;
                async move {
                    if (0.1 + 0.2 - 0.3_f64).abs() < tolerance {
                        Ok(())
                    } else {
                        Err(TestFailure::new("not close"))
                    }
                }
            });
            sb.run();
            Ok(())
        }),
    );
    let unit = unit_with(compiler, RunOptions::default())
        .with_extensions(Extensions::new().with("tolerance", 1e-9_f64));

    assert!(unit.execute(Path::new("ext.test")).await.passed());
}
