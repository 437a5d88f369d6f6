// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! READY rendezvous, first-command sequencing and remote restarts.

use std::sync::Arc;

use icc_e2e::{ready_pair, wait_until, RecordingHandler, Seen, SETTLE};
use tcc_ipc::host::loopback_pair;
use tcc_ipc::{Channel, ChannelState, Error, IccConfig, OvpParams, ResetParams};

#[test]
fn first_command_each_way_carries_sequence_one() {
    let pair = ready_pair();
    assert_eq!(pair.local.state(), ChannelState::Ready);
    assert_eq!(pair.remote.state(), ChannelState::Ready);

    pair.local.set_ovp(OvpParams { channel: 1, value: 7 }).unwrap();
    assert_eq!(pair.remote.last_rx_sequence(), 1);
    assert_eq!(pair.remote_handler.seen(), vec![Seen::Ovp(OvpParams { channel: 1, value: 7 })]);

    pair.remote.set_reset(ResetParams { block: 3, mode: 0 }).unwrap();
    assert_eq!(pair.local.last_rx_sequence(), 1);
    assert_eq!(pair.local_handler.seen(), vec![Seen::Reset(ResetParams { block: 3, mode: 0 })]);
}

#[test]
fn lone_channel_stays_in_init() {
    let (a, _b) = loopback_pair();
    let handler = Arc::new(RecordingHandler::default());
    let channel = Channel::open(&IccConfig::default(), Arc::new(a), handler).unwrap();
    assert!(!channel.wait_ready(std::time::Duration::from_millis(60)));
    assert_eq!(channel.state(), ChannelState::Init);
    assert!(!channel.query_status());
    assert_eq!(channel.set_ovp(OvpParams { channel: 0, value: 0 }), Err(Error::NotReady));
}

#[test]
fn remote_restart_renegotiates() {
    let pair = ready_pair();
    pair.local.set_ovp(OvpParams { channel: 0, value: 1 }).unwrap();

    pair.remote.close();
    assert!(wait_until(SETTLE, || pair.local.state() == ChannelState::Init));
    assert_eq!(pair.local.set_ovp(OvpParams { channel: 0, value: 2 }), Err(Error::NotReady));

    let config = IccConfig { name: "remote".to_string(), ..IccConfig::default() };
    let handler = Arc::new(RecordingHandler::default());
    let reopened = Channel::open(&config, pair.remote_box.clone(), handler.clone()).unwrap();
    assert!(pair.local.wait_ready(SETTLE));
    assert!(reopened.wait_ready(SETTLE));
    assert_eq!(reopened.last_rx_sequence(), 0);

    // The local counter keeps running; a fresh peer accepts any nonzero start.
    pair.local.set_ovp(OvpParams { channel: 0, value: 3 }).unwrap();
    assert_eq!(reopened.last_rx_sequence(), 2);
    assert_eq!(handler.seen(), vec![Seen::Ovp(OvpParams { channel: 0, value: 3 })]);

    reopened.set_reset(ResetParams { block: 0, mode: 1 }).unwrap();
    assert_eq!(pair.local.last_rx_sequence(), 1);
}
