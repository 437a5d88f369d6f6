// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Replayed and stale inbound commands are absorbed without side effects.

use icc_e2e::{ready_pair, wait_until, Pair, SETTLE};
use proptest::prelude::*;
use tcc_ipc::{Command, CommandCode, Message, OvpParams};

fn ovp(seq: u32) -> Message {
    Command::Ovp(OvpParams { channel: 0, value: seq }).to_message().unwrap().stamped(seq)
}

/// Injects `seq` as if the local side had sent it and waits until the remote
/// has committed it; used to fence earlier injections.
fn fence(pair: &Pair, seq: u32) {
    pair.remote_box.inject(&ovp(seq)).unwrap();
    assert!(wait_until(SETTLE, || pair.remote.last_rx_sequence() == seq));
}

fn acks_for(pair: &Pair, seq: u32) -> usize {
    pair.remote_box
        .sent()
        .iter()
        .filter(|m| m.is_ack() && m.code() == Some(CommandCode::Ovp) && m.sequence() == seq)
        .count()
}

#[test]
fn replayed_command_is_handled_and_acked_once() {
    let pair = ready_pair();
    pair.remote_box.inject(&ovp(5)).unwrap();
    pair.remote_box.inject(&ovp(5)).unwrap();
    // A STATUS probe queued behind the replay; its reply marks both as processed.
    pair.remote_box.inject(&Message::control(CommandCode::Status)).unwrap();
    assert!(wait_until(SETTLE, || {
        pair.remote_box.sent().iter().any(|m| m.code() == Some(CommandCode::Status))
    }));

    assert_eq!(pair.remote.last_rx_sequence(), 5);
    assert_eq!(pair.remote_handler.seen().len(), 1);
    assert_eq!(acks_for(&pair, 5), 1);
    assert_eq!(pair.remote.stats().duplicates_dropped, 1);
}

#[test]
fn stale_command_is_dropped_silently() {
    let pair = ready_pair();
    fence(&pair, 9);
    pair.remote_box.inject(&ovp(3)).unwrap();
    pair.remote_box.inject(&ovp(9)).unwrap();
    fence(&pair, 10);

    assert_eq!(pair.remote_handler.seen().len(), 2);
    assert!(wait_until(SETTLE, || acks_for(&pair, 10) == 1));
    assert_eq!(acks_for(&pair, 3), 0);
    assert_eq!(acks_for(&pair, 9), 1);
    assert_eq!(pair.remote.stats().duplicates_dropped, 2);
}

#[test]
fn zero_sequence_command_is_rejected() {
    let pair = ready_pair();
    pair.remote_box.inject(&ovp(0)).unwrap();
    fence(&pair, 1);
    assert_eq!(pair.remote_handler.seen().len(), 1);
    assert_eq!(acks_for(&pair, 0), 0);
}

#[test]
fn unknown_codes_get_no_reply() {
    let pair = ready_pair();
    let unknown = Message::from_parts(4, 0x77, tcc_ipc::Flags::empty(), tcc_ipc::Payload::EMPTY);
    pair.remote_box.inject(&unknown).unwrap();
    pair.remote_box.inject(&Message::control(CommandCode::Null)).unwrap();
    fence(&pair, 1);
    assert_eq!(pair.remote.stats().unknown_dropped, 2);
    assert!(pair.remote_box.sent().iter().all(|m| m.raw_code() != 0x77));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn handler_runs_once_per_new_high_water_mark(seqs in proptest::collection::vec(1u32..64, 1..24)) {
        let pair = ready_pair();
        for &seq in &seqs {
            pair.remote_box.inject(&ovp(seq)).unwrap();
        }
        fence(&pair, 1000);

        let mut high = 0;
        let mut expected = Vec::new();
        for &seq in &seqs {
            if seq > high {
                high = seq;
                expected.push(seq);
            }
        }
        expected.push(1000);
        let values: Vec<u32> = pair
            .remote_handler
            .seen()
            .into_iter()
            .map(|seen| match seen {
                icc_e2e::Seen::Ovp(params) => params.value,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        prop_assert_eq!(values, expected);
    }
}
