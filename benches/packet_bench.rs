use bytes::{Bytes, BytesMut};
use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use peerwire::{Packet, PacketCodec, ProtocolId};
use tokio_util::codec::{Decoder, Encoder};

#[allow(clippy::unwrap_used)]
fn bench_packet_encode_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("packet_encode_decode");
    let payload_sizes = [64usize, 512, 4096, 65536, 1024 * 1024];

    for &size in &payload_sizes {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("encode_{size}b"), |b| {
            b.iter_batched(
                || Bytes::from(vec![0u8; size]),
                |payload| {
                    let pkt = Packet::new(ProtocolId::new(0x0100), ProtocolId::new(0x0001), payload);
                    let mut buf = BytesMut::with_capacity(size + 64);
                    let mut codec = PacketCodec::default();
                    codec.encode(pkt, &mut buf).unwrap();
                },
                BatchSize::SmallInput,
            )
        });
        group.bench_function(format!("decode_{size}b"), |b| {
            let mut wire = BytesMut::new();
            let mut codec = PacketCodec::default();
            codec
                .encode(
                    Packet::new(
                        ProtocolId::new(0x0100),
                        ProtocolId::new(0x0001),
                        Bytes::from(vec![0u8; size]),
                    ),
                    &mut wire,
                )
                .unwrap();
            let wire = wire.freeze();
            b.iter(|| {
                let mut codec = PacketCodec::default();
                let mut buf = BytesMut::from(&wire[..]);
                let decoded = codec.decode(&mut buf).unwrap().unwrap();
                assert!(decoded.is_valid());
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_packet_encode_decode);
criterion_main!(benches);
