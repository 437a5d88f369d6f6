// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Teardown releases waiters and notifies the peer.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use icc_e2e::{ready_pair, wait_until, Pair, SETTLE};
use tcc_ipc::{ChannelState, Command, CommandCode, Error, OvpParams, Wait};

#[test]
fn close_fails_in_flight_request_promptly() {
    let pair = ready_pair();
    pair.local_box.set_drop_outbound(true);
    let waiter = {
        let channel = Arc::clone(&pair.local);
        thread::spawn(move || {
            let start = Instant::now();
            let message = Command::Ping.to_message().unwrap();
            (channel.send_and_wait(message, Duration::from_secs(5)), start.elapsed())
        })
    };
    assert!(wait_until(SETTLE, || {
        pair.local_box.sent().iter().any(|m| m.code() == Some(CommandCode::Ping))
    }));
    pair.local_box.set_drop_outbound(false);
    pair.local.close();

    let (result, elapsed) = waiter.join().unwrap();
    assert_eq!(result, Err(Error::Closed));
    assert!(elapsed < Duration::from_secs(1));
    assert!(wait_until(SETTLE, || pair.remote.state() == ChannelState::Init));
}

#[test]
fn operations_after_close_report_closed() {
    let pair = ready_pair();
    pair.local.close();
    let err = pair.local.set_ovp(OvpParams { channel: 0, value: 0 }).unwrap_err();
    assert_eq!(err, Error::Closed);
    assert_eq!(err.as_errno(), -19);
    let mut out = [0u8; 4];
    assert_eq!(pair.local.read(&mut out, 1, Wait::NonBlocking), Err(Error::Closed));
    assert!(!pair.local.wait_ready(Duration::from_millis(10)));
}

#[test]
fn dropping_last_handle_closes() {
    let Pair { local, remote, .. } = ready_pair();
    drop(local);
    assert!(wait_until(SETTLE, || remote.state() == ChannelState::Init));
}
