//! End-to-end tests against real process signals.
//!
//! Every test listens for a different signal: tests in this binary run in
//! parallel and a raised signal reaches every listener in the process. A
//! signal raised after its last subscription is gone takes its default
//! action, so those cases run in a re-executed child process.

#![cfg(unix)]

mod common;

use common::{init_tracing, WAIT};
use pretty_assertions::assert_eq;
use sigctx::prelude::*;
use signal_hook::consts::{SIGALRM, SIGUSR1, SIGUSR2};
use signal_hook::low_level::raise;
use std::os::unix::process::ExitStatusExt;
use std::process::{Command, ExitStatus};
use tokio::time::timeout;

/// Selects the scenario `test_child_scenario` runs in a child process.
const CHILD_SCENARIO: &str = "SIGCTX_CHILD_SCENARIO";

#[tokio::test]
async fn test_signal_cancels_background_context() {
    init_tracing();
    let (ctx, _cancel) = with_cancel_by_signal(background(), [Signal::User1]);

    let done = ctx.done();
    assert!(!done.is_closed());
    assert!(ctx.err().is_none());

    raise(SIGUSR1).unwrap();

    timeout(WAIT, done.wait())
        .await
        .expect("context should be canceled by SIGUSR1");
    assert_eq!(ctx.err(), Some(SIGNAL_RECEIVED));
    assert!(!ctx.is_subscribed());
    assert_eq!(ctx.parent().err(), Some(ContextError::Canceled));
}

#[tokio::test]
async fn test_parent_cancel_revokes_os_subscription() {
    init_tracing();
    let (parent, cancel_parent) = with_cancel(background());
    let (ctx, _cancel) = with_cancel_by_signal(parent, [Signal::User2]);

    cancel_parent.cancel_with_cause(ContextError::cause("job finished"));
    timeout(WAIT, ctx.done().wait()).await.unwrap();

    assert_eq!(ctx.err(), Some(ContextError::cause("job finished")));
    assert!(!ctx.is_subscribed());
}

#[tokio::test]
async fn test_pre_canceled_parent_never_needs_a_signal() {
    init_tracing();
    let (parent, cancel_parent) = with_cancel(background());
    cancel_parent.cancel_with_cause(ContextError::cause("E"));

    let (ctx, _cancel) = with_cancel_by_signal(parent, [Signal::Hangup]);

    timeout(WAIT, ctx.done().wait()).await.unwrap();
    assert_eq!(ctx.err(), Some(ContextError::cause("E")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_explicit_cancel() {
    init_tracing();
    let (ctx, cancel) = with_cancel_by_signal(background(), [Signal::WindowChange]);

    let callers: Vec<_> = (0..2)
        .map(|_| {
            let cancel = cancel.clone();
            tokio::spawn(async move { cancel.cancel() })
        })
        .collect();
    for caller in futures::future::join_all(callers).await {
        caller.unwrap();
    }

    timeout(WAIT, ctx.done().wait()).await.unwrap();
    assert_eq!(ctx.err(), Some(ContextError::Canceled));
    assert!(!ctx.is_subscribed());
}

#[tokio::test]
async fn test_one_signal_cancels_every_listener() {
    init_tracing();
    let (first, _cancel_first) = with_cancel_by_signal(background(), [Signal::Alarm]);
    let (second, _cancel_second) =
        with_cancel_by_signal(background(), [Signal::Terminate, Signal::Alarm]);

    raise(SIGALRM).unwrap();

    timeout(WAIT, first.done().wait()).await.unwrap();
    timeout(WAIT, second.done().wait()).await.unwrap();
    assert_eq!(first.err(), Some(SIGNAL_RECEIVED));
    assert_eq!(second.err(), Some(SIGNAL_RECEIVED));
}

#[tokio::test]
async fn test_configured_signal_set() {
    init_tracing();
    let signals: SignalSet = "SIGQUIT, term".parse().unwrap();
    let (ctx, cancel) = try_with_cancel_by_signal(background(), &signals).unwrap();

    assert_eq!(ctx.signals(), &signals);
    assert!(ctx.is_subscribed());

    cancel.cancel();
    timeout(WAIT, ctx.done().wait()).await.unwrap();
    assert_eq!(ctx.err(), Some(ContextError::Canceled));
}

/// Runs one scenario inside a re-executed copy of this test binary. Does
/// nothing when run as part of the normal suite.
#[test]
fn test_child_scenario() {
    let Ok(scenario) = std::env::var(CHILD_SCENARIO) else {
        return;
    };
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    runtime.block_on(async {
        match scenario.as_str() {
            "raise-after-revoke" => {
                let (ctx, cancel) = with_cancel_by_signal(background(), [Signal::User2]);
                cancel.cancel();
                timeout(WAIT, ctx.done().wait()).await.unwrap();
                assert!(!ctx.is_subscribed());

                // Terminates the process when the default action is back.
                raise(SIGUSR2).unwrap();
            }
            "raise-after-resubscribe" => {
                let (first, cancel) = with_cancel_by_signal(background(), [Signal::User2]);
                cancel.cancel();
                timeout(WAIT, first.done().wait()).await.unwrap();

                let (second, _cancel) = with_cancel_by_signal(background(), [Signal::User2]);
                raise(SIGUSR2).unwrap();
                timeout(WAIT, second.done().wait()).await.unwrap();
                assert_eq!(second.err(), Some(SIGNAL_RECEIVED));
                assert_eq!(first.err(), Some(ContextError::Canceled));
            }
            other => panic!("unknown child scenario {other}"),
        }
    });
}

fn run_child_scenario(scenario: &str) -> ExitStatus {
    Command::new(std::env::current_exe().unwrap())
        .args(["--exact", "test_child_scenario", "--test-threads=1", "--nocapture"])
        .env(CHILD_SCENARIO, scenario)
        .status()
        .unwrap()
}

#[test]
fn test_revoked_signal_takes_default_action() {
    let status = run_child_scenario("raise-after-revoke");
    assert_eq!(status.signal(), Some(SIGUSR2), "child exited with {status}");
}

#[test]
fn test_new_subscription_suppresses_default_action_again() {
    let status = run_child_scenario("raise-after-resubscribe");
    assert!(status.success(), "child exited with {status}");
}
