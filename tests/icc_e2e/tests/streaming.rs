// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Streamed bytes through the device surface.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use icc_e2e::{ready_pair, ready_pair_with, wait_until, SETTLE};
use tcc_ipc::{ioctl_nr, Error, IccConfig, IccDevice, IoctlReply, OpenMode, PingResult};

#[test]
fn write_lands_in_remote_reader() {
    let pair = ready_pair();
    let config = IccConfig::default();
    let writer = IccDevice::new(Arc::clone(&pair.local), &config).open(OpenMode::Blocking);
    let reader = IccDevice::new(Arc::clone(&pair.remote), &config).open(OpenMode::Blocking);

    assert_eq!(writer.write(b"frame-0001"), Ok(10));
    let mut out = [0u8; 32];
    assert_eq!(reader.read(&mut out), Ok(10));
    assert_eq!(&out[..10], b"frame-0001");
}

#[test]
fn blocked_reader_wakes_on_arrival() {
    let pair = ready_pair();
    let config = IccConfig::default();
    let reader = IccDevice::new(Arc::clone(&pair.remote), &config).open(OpenMode::Blocking);
    // vmin 4, vtime 2s
    reader.ioctl_raw(ioctl_nr::SET_PARAM, &[4, 20]).unwrap();
    let handle = thread::spawn(move || {
        let mut out = [0u8; 16];
        reader.read(&mut out).map(|n| out[..n].to_vec())
    });
    thread::sleep(Duration::from_millis(30));
    pair.local.write(b"wake").unwrap();
    assert_eq!(handle.join().unwrap(), Ok(b"wake".to_vec()));
}

#[test]
fn non_blocking_reader_sees_would_block() {
    let pair = ready_pair();
    let reader =
        IccDevice::new(Arc::clone(&pair.remote), &IccConfig::default()).open(OpenMode::NonBlocking);
    let mut out = [0u8; 8];
    let err = reader.read(&mut out).unwrap_err();
    assert_eq!(err, Error::WouldBlock);
    assert_eq!(err.as_errno(), -11);
}

#[test]
fn non_blocking_handle_is_not_held_up_by_blocked_handle() {
    let pair = ready_pair();
    let device = IccDevice::new(Arc::clone(&pair.remote), &IccConfig::default());
    let blocking = device.open(OpenMode::Blocking);
    blocking.ioctl_raw(ioctl_nr::SET_PARAM, &[1, 10]).unwrap();
    let parked = thread::spawn(move || {
        let mut out = [0u8; 8];
        blocking.read(&mut out)
    });
    thread::sleep(Duration::from_millis(30));

    let non_blocking = device.open(OpenMode::NonBlocking);
    let mut out = [0u8; 8];
    let start = std::time::Instant::now();
    assert_eq!(non_blocking.read(&mut out), Err(Error::WouldBlock));
    assert!(start.elapsed() < Duration::from_millis(300));
    assert_eq!(parked.join().unwrap(), Ok(0));
}

#[test]
fn oversized_payload_is_dropped_whole_but_acked() {
    let remote = IccConfig { name: "remote".to_string(), ring_capacity: 16, ..IccConfig::default() };
    let pair = ready_pair_with(&IccConfig::default(), &remote);

    assert_eq!(pair.local.write(&[0xab; 20]), Ok(20));
    assert_eq!(pair.remote.readable(), 0);
    assert_eq!(pair.remote.stats().ring_bytes_dropped, 20);
    assert_eq!(pair.remote.stats().commands_handled, 1);

    assert_eq!(pair.local.write(&[0xcd; 8]), Ok(8));
    assert_eq!(pair.remote.readable(), 8);
}

#[test]
fn long_write_is_truncated_to_one_frame() {
    let pair = ready_pair();
    assert_eq!(pair.local.write(&[1u8; 600]), Ok(512));
    assert!(wait_until(SETTLE, || pair.remote.readable() == 512));
}

#[test]
fn ping_test_and_readiness_over_ioctl() {
    let pair = ready_pair();
    let file = IccDevice::new(Arc::clone(&pair.local), &IccConfig::default())
        .open(OpenMode::Blocking);
    assert_eq!(file.ioctl_raw(ioctl_nr::IS_READY, &[]), Ok(IoctlReply::Ready(true)));
    match file.ioctl_raw(ioctl_nr::PING_TEST, &[]) {
        Ok(IoctlReply::Ping(info)) => {
            assert_eq!(info.result, PingResult::Success);
            assert_eq!(info.result.code(), 0);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(file.ioctl_raw(ioctl_nr::SET_OVP, &[0, 5]), Ok(IoctlReply::Done));
    assert_eq!(file.ioctl_raw(ioctl_nr::SET_POS, &[0, 1, 10, 20]), Ok(IoctlReply::Done));
    assert_eq!(file.ioctl_raw(ioctl_nr::SET_RESET, &[2, 0]), Ok(IoctlReply::Done));
    assert_eq!(pair.remote_handler.seen().len(), 3);
    assert_eq!(file.ioctl_raw(0xdead, &[]), Err(Error::InvalidArgument));
}
