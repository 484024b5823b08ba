//! Concurrency tests: parallel duplex-buffer readers and threaded
//! membership mutation.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::thread;

use bytes::Bytes;

use peerwire::{
    Membership, MemoryTransport, Packet, PacketBuffer, PeerId, ProtocolId, Role, ROLE_VALIDATOR,
};

#[test]
fn test_concurrent_buffer_readers_share_one_packet() {
    let buffer = Arc::new(PacketBuffer::new());
    let mut pkt = Packet::new(
        ProtocolId::new(0x0001),
        ProtocolId::new(0x0002),
        Bytes::from_static(b"shared"),
    );
    buffer.write_packet(&mut pkt).unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let buffer = Arc::clone(&buffer);
        handles.push(thread::spawn(move || {
            buffer.read_packet().expect("read")
        }));
    }

    for handle in handles {
        let got = handle.join().expect("reader thread");
        assert_eq!(got.payload().as_ref(), b"shared");
        assert_eq!(got.checksum(), pkt.checksum());
    }
}

#[test]
fn test_threaded_role_mutation_stays_duplicate_free() {
    let transport = Arc::new(MemoryTransport::new());
    let membership = Arc::new(Membership::new(
        "concurrent",
        ProtocolId::new(0x0400),
        PeerId::ZERO,
        0,
        transport,
    ));

    let mut handles = Vec::new();
    for t in 0..4 {
        let membership = Arc::clone(&membership);
        handles.push(thread::spawn(move || {
            for i in 0..32u8 {
                let peer = PeerId::from([i; 20]);
                membership.add_role(ROLE_VALIDATOR, peer).expect("add");
                membership
                    .add_role(Role::new(format!("shard-{t}")), peer)
                    .expect("add shard role");
            }
        }));
    }
    for handle in handles {
        handle.join().expect("mutator thread");
    }

    // Every thread added the same 32 validators; the set holds each once.
    let validators = membership.role_peers(&ROLE_VALIDATOR).unwrap();
    assert_eq!(validators.len(), 32);

    for t in 0..4 {
        let role = Role::new(format!("shard-{t}"));
        assert_eq!(membership.role_peers(&role).unwrap().len(), 32);
    }
}

#[test]
fn test_reader_waits_out_writer() {
    // A writer and several readers race; every reader that finds the
    // packet sees the same sealed bytes.
    let buffer = Arc::new(PacketBuffer::new());

    let writer = {
        let buffer = Arc::clone(&buffer);
        thread::spawn(move || {
            let mut pkt = Packet::new(
                ProtocolId::new(0x0001),
                ProtocolId::new(0x0003),
                Bytes::from_static(b"raced"),
            );
            buffer.write_packet(&mut pkt).expect("write");
            pkt.checksum()
        })
    };
    let expected = writer.join().expect("writer thread");

    let mut handles = Vec::new();
    for _ in 0..4 {
        let buffer = Arc::clone(&buffer);
        handles.push(thread::spawn(move || buffer.read_packet().expect("read")));
    }
    for handle in handles {
        assert_eq!(handle.join().expect("reader").checksum(), expected);
    }
}
