// src/compiler/event_handlers.rs

//! Event handling logic for the session core.

use std::path::PathBuf;

use tracing::{debug, warn, Level};

use crate::compiler::diagnostics::compilation_message;
use crate::errors::BuildFailure;
use crate::exec::{BuildStats, EngineFailure};
use crate::registry::BundleRegistry;
use crate::types::{BuildMode, BundleDeferred, BundlePromise, BundleState};

/// Tracing target for rendered build statistics.
pub const STATS_TARGET: &str = "bundlewatch::stats";

/// Command produced by the session core, executed by the async shell.
#[derive(Debug, Clone)]
pub enum SessionCommand {
    /// Once this rebuild's promise settles, tell the caller to request the
    /// bundle again.
    NotifyRerunAfter(BundlePromise),
    /// Stop the engine's watcher.
    StopWatching,
}

/// Decision returned by the core after handling a single `SessionEvent`.
#[derive(Debug, Clone)]
pub struct SessionStep {
    pub commands: Vec<SessionCommand>,
    /// Whether the shell should keep draining events.
    pub keep_running: bool,
}

impl SessionStep {
    pub fn idle() -> Self {
        Self {
            commands: Vec::new(),
            keep_running: true,
        }
    }
}

/// Input and output of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTarget {
    pub file_path: PathBuf,
    /// Normalized bundle location handed to callers on success.
    pub output_path: PathBuf,
}

/// The build cycle currently owned by a session.
#[derive(Debug)]
pub struct BuildCycle {
    pub deferred: BundleDeferred,
    pub state: BundleState,
    /// Compile passes started for this deferred that have not finished yet.
    /// Only the last one to start may settle it.
    pub in_flight: usize,
}

impl BuildCycle {
    pub fn new() -> Self {
        Self {
            deferred: BundleDeferred::new(),
            state: BundleState::Building,
            in_flight: 0,
        }
    }
}

impl Default for BuildCycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle a compile start.
///
/// - A pending deferred (first cycle, or a rebuild that overlapped the
///   previous one) is reused: no replacement, no extra rerun. The pass is
///   counted so that earlier passes cannot settle it.
/// - In watch mode, a settled deferred is replaced by a new one. The new
///   promise is published only if the registry still holds the previous
///   one, and only a published rebuild produces a rerun.
/// - One-shot sessions never start a second cycle.
pub fn handle_compile_started(
    target: &BuildTarget,
    cycle: &mut BuildCycle,
    registry: &BundleRegistry,
    mode: BuildMode,
) -> SessionStep {
    let mut step = SessionStep::idle();

    if cycle.state == BundleState::Closed {
        return step;
    }

    if cycle.deferred.is_pending() {
        cycle.in_flight += 1;
        debug!(
            file = %target.file_path.display(),
            in_flight = cycle.in_flight,
            "compile started; current cycle still pending"
        );
        cycle.state = BundleState::Building;
        return step;
    }

    if !mode.is_watch() {
        debug!(
            file = %target.file_path.display(),
            "ignoring compile start after one-shot build settled"
        );
        return step;
    }

    let previous = cycle.deferred.promise();
    let next = BundleDeferred::new();
    let next_promise = next.promise();

    if registry.replace_if_current(&target.file_path, &previous, next_promise.clone()) {
        step.commands.push(SessionCommand::NotifyRerunAfter(next_promise));
    } else {
        debug!(
            file = %target.file_path.display(),
            "bundle entry no longer ours; rebuild not published"
        );
    }

    cycle.deferred = next;
    cycle.state = BundleState::Building;
    cycle.in_flight = 1;
    step
}

/// Handle a finished compile by settling the current deferred.
///
/// Passes finish in the order they started, so while a newer pass is still
/// running the result belongs to a superseded pass and is dropped.
pub fn handle_done(
    target: &BuildTarget,
    cycle: &mut BuildCycle,
    result: Result<BuildStats, EngineFailure>,
) -> SessionStep {
    if cycle.state == BundleState::Closed {
        return SessionStep::idle();
    }

    let file = target.file_path.display();
    if cycle.in_flight > 1 {
        cycle.in_flight -= 1;
        debug!(
            file = %file,
            in_flight = cycle.in_flight,
            "dropping result of a superseded compile pass"
        );
        return SessionStep::idle();
    }
    cycle.in_flight = 0;

    let settled = match result {
        Err(failure) => {
            warn!(file = %file, error = %failure, "engine failed");
            cycle.state = BundleState::Failed;
            cycle
                .deferred
                .reject(BuildFailure::engine(&target.file_path, failure.message))
        }
        Ok(stats) if stats.has_errors() => {
            let message = compilation_message(&stats.errors);
            warn!(file = %file, errors = stats.errors.len(), "compilation failed");
            cycle.state = BundleState::Failed;
            cycle
                .deferred
                .reject(BuildFailure::compilation(&target.file_path, message))
        }
        Ok(stats) => {
            for warning in &stats.warnings {
                debug!(file = %file, "compilation warning: {}", warning);
            }
            if tracing::enabled!(target: STATS_TARGET, Level::DEBUG) {
                debug!(target: STATS_TARGET, file = %file, "{}", stats);
            }
            debug!(
                file = %file,
                output = %target.output_path.display(),
                "bundle ready"
            );
            cycle.state = BundleState::Ready;
            cycle.deferred.resolve(target.output_path.clone())
        }
    };

    if !settled {
        debug!(file = %file, "compile finished after its cycle was already settled");
    }

    SessionStep::idle()
}

/// The engine stopped reporting. A cycle still pending can never settle.
pub fn handle_engine_stopped(target: &BuildTarget, cycle: &mut BuildCycle) -> SessionStep {
    if cycle.state != BundleState::Closed && cycle.deferred.is_pending() {
        warn!(file = %target.file_path.display(), "engine stopped before finishing the build");
        cycle.deferred.reject(BuildFailure::engine(
            &target.file_path,
            "engine stopped without reporting a result",
        ));
        cycle.state = BundleState::Failed;
        cycle.in_flight = 0;
    }
    SessionStep::idle()
}

/// Close the session: forget the bundle, fail a pending cycle and stop
/// watching.
pub fn handle_close(
    target: &BuildTarget,
    cycle: &mut BuildCycle,
    registry: &BundleRegistry,
    mode: BuildMode,
) -> SessionStep {
    let mut commands = Vec::new();

    if cycle.state != BundleState::Closed {
        registry.evict_if_current(&target.file_path, &cycle.deferred.promise());
        if cycle.deferred.reject(BuildFailure::closed(&target.file_path)) {
            debug!(file = %target.file_path.display(), "pending build rejected on close");
        }
        cycle.state = BundleState::Closed;
        if mode.is_watch() {
            commands.push(SessionCommand::StopWatching);
        }
    }

    SessionStep {
        commands,
        keep_running: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FailureKind;

    fn target() -> BuildTarget {
        BuildTarget {
            file_path: PathBuf::from("/p/spec/a.ts"),
            output_path: PathBuf::from("/tmp/out/a.ts.js"),
        }
    }

    fn published(registry: &BundleRegistry) -> BuildCycle {
        let cycle = BuildCycle::new();
        registry.publish(&target().file_path, cycle.deferred.promise());
        cycle
    }

    #[test]
    fn first_compile_start_reuses_the_pending_cycle() {
        let registry = BundleRegistry::new();
        let mut cycle = published(&registry);
        let first = cycle.deferred.promise();

        let step = handle_compile_started(&target(), &mut cycle, &registry, BuildMode::Watch);

        assert!(step.commands.is_empty());
        assert!(cycle.deferred.promise().ptr_eq(&first));
        assert!(registry.lookup(&target().file_path).unwrap().ptr_eq(&first));
    }

    #[test]
    fn rebuild_after_settlement_publishes_a_new_promise() {
        let registry = BundleRegistry::new();
        let mut cycle = published(&registry);
        let first = cycle.deferred.promise();
        handle_done(&target(), &mut cycle, Ok(BuildStats::default()));

        let step = handle_compile_started(&target(), &mut cycle, &registry, BuildMode::Watch);

        let current = registry.lookup(&target().file_path).unwrap();
        assert!(!current.ptr_eq(&first));
        assert!(!current.is_settled());
        assert!(matches!(
            step.commands.as_slice(),
            [SessionCommand::NotifyRerunAfter(p)] if p.ptr_eq(&current)
        ));
        assert_eq!(cycle.state, BundleState::Building);
    }

    #[test]
    fn rebuild_after_eviction_is_not_published() {
        let registry = BundleRegistry::new();
        let mut cycle = published(&registry);
        handle_done(&target(), &mut cycle, Ok(BuildStats::default()));
        registry.evict(&target().file_path);

        let step = handle_compile_started(&target(), &mut cycle, &registry, BuildMode::Watch);

        assert!(step.commands.is_empty());
        assert!(!registry.contains(&target().file_path));
    }

    #[test]
    fn superseded_pass_cannot_settle_the_cycle() {
        let registry = BundleRegistry::new();
        let mut cycle = published(&registry);
        let promise = cycle.deferred.promise();

        handle_compile_started(&target(), &mut cycle, &registry, BuildMode::Watch);
        handle_compile_started(&target(), &mut cycle, &registry, BuildMode::Watch);
        assert_eq!(cycle.in_flight, 2);

        handle_done(&target(), &mut cycle, Ok(BuildStats::default()));
        assert!(!promise.is_settled());
        assert_eq!(cycle.state, BundleState::Building);

        handle_done(
            &target(),
            &mut cycle,
            Ok(BuildStats {
                errors: vec!["Error C3".into()],
                ..BuildStats::default()
            }),
        );
        assert_eq!(promise.peek().unwrap().unwrap_err().message, "Error C3");
        assert_eq!(cycle.in_flight, 0);
    }

    #[test]
    fn one_shot_sessions_ignore_late_compile_starts() {
        let registry = BundleRegistry::new();
        let mut cycle = published(&registry);
        let first = cycle.deferred.promise();
        handle_done(&target(), &mut cycle, Ok(BuildStats::default()));

        let step = handle_compile_started(&target(), &mut cycle, &registry, BuildMode::Once);

        assert!(step.commands.is_empty());
        assert!(registry.lookup(&target().file_path).unwrap().ptr_eq(&first));
        assert_eq!(cycle.state, BundleState::Ready);
    }

    #[test]
    fn success_resolves_with_the_output_path() {
        let mut cycle = BuildCycle::new();
        let promise = cycle.deferred.promise();
        let stats = BuildStats {
            warnings: vec!["unused import".into()],
            ..BuildStats::default()
        };

        handle_done(&target(), &mut cycle, Ok(stats));

        assert_eq!(promise.peek(), Some(Ok(PathBuf::from("/tmp/out/a.ts.js"))));
        assert_eq!(cycle.state, BundleState::Ready);
    }

    #[test]
    fn compilation_errors_are_normalized_and_joined() {
        let mut cycle = BuildCycle::new();
        let promise = cycle.deferred.promise();
        let stats = BuildStats {
            errors: vec!["Error A\n    at foo.js:1".into(), "Error B".into()],
            ..BuildStats::default()
        };

        handle_done(&target(), &mut cycle, Ok(stats));

        let failure = promise.peek().unwrap().unwrap_err();
        assert_eq!(failure.message, "Error A\n\nError B");
        assert_eq!(failure.kind, FailureKind::Compilation);
        assert_eq!(failure.file_path, PathBuf::from("/p/spec/a.ts"));
        assert_eq!(cycle.state, BundleState::Failed);
    }

    #[test]
    fn engine_failures_keep_their_message() {
        let mut cycle = BuildCycle::new();
        let promise = cycle.deferred.promise();

        handle_done(&target(), &mut cycle, Err(EngineFailure::new("out of memory")));

        let failure = promise.peek().unwrap().unwrap_err();
        assert_eq!(failure.message, "out of memory");
        assert_eq!(failure.kind, FailureKind::Engine);
    }

    #[test]
    fn engine_stop_fails_only_pending_cycles() {
        let mut cycle = BuildCycle::new();
        let promise = cycle.deferred.promise();
        handle_engine_stopped(&target(), &mut cycle);
        assert_eq!(promise.peek().unwrap().unwrap_err().kind, FailureKind::Engine);

        let mut done = BuildCycle::new();
        let done_promise = done.deferred.promise();
        handle_done(&target(), &mut done, Ok(BuildStats::default()));
        handle_engine_stopped(&target(), &mut done);
        assert!(done_promise.peek().unwrap().is_ok());
        assert_eq!(done.state, BundleState::Ready);
    }

    #[test]
    fn close_evicts_rejects_and_stops_watching() {
        let registry = BundleRegistry::new();
        let mut cycle = published(&registry);
        let promise = cycle.deferred.promise();

        let step = handle_close(&target(), &mut cycle, &registry, BuildMode::Watch);

        assert!(!step.keep_running);
        assert!(matches!(step.commands.as_slice(), [SessionCommand::StopWatching]));
        assert!(!registry.contains(&target().file_path));
        assert_eq!(promise.peek().unwrap().unwrap_err().kind, FailureKind::Closed);
        assert_eq!(cycle.state, BundleState::Closed);
    }

    #[test]
    fn close_leaves_a_newer_session_entry_alone() {
        let registry = BundleRegistry::new();
        let mut cycle = published(&registry);
        let newer = BundleDeferred::new();
        registry.publish(&target().file_path, newer.promise());

        handle_close(&target(), &mut cycle, &registry, BuildMode::Once);

        assert!(registry.lookup(&target().file_path).unwrap().ptr_eq(&newer.promise()));
    }

    #[test]
    fn events_after_close_are_ignored() {
        let registry = BundleRegistry::new();
        let mut cycle = published(&registry);
        handle_close(&target(), &mut cycle, &registry, BuildMode::Watch);

        let step = handle_compile_started(&target(), &mut cycle, &registry, BuildMode::Watch);
        assert!(step.commands.is_empty());
        handle_done(&target(), &mut cycle, Ok(BuildStats::default()));
        assert_eq!(cycle.state, BundleState::Closed);
        assert!(registry.is_empty());
    }
}
