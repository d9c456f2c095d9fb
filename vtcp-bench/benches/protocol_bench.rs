//! Frame encoding/decoding benchmarks.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::net::Ipv4Addr;
use vtcp_protocol::{Decoder, Encoder, Request, Response, ResponseShape};

fn send_request(size: usize) -> Request {
    Request::Send {
        handle: 1,
        payload: Bytes::from(vec![0x42u8; size]),
    }
}

fn bench_send_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("send_encode");

    for size in [16, 1024, 65535] {
        let request = send_request(size);

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &request, |b, request| {
            b.iter(|| black_box(Encoder::encode_request(request).unwrap()));
        });
    }

    group.finish();
}

fn bench_send_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("send_decode");

    for size in [16, 1024, 65535] {
        let encoded = Encoder::encode_request(&send_request(size)).unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &encoded, |b, encoded| {
            b.iter(|| {
                let mut decoder = Decoder::new();
                decoder.extend(encoded);
                black_box(decoder.decode_request().unwrap())
            });
        });
    }

    group.finish();
}

fn bench_control_frames(c: &mut Criterion) {
    let mut group = c.benchmark_group("control_frames");
    group.throughput(Throughput::Elements(1));

    let connect = Request::Connect {
        handle: 3,
        ip: Ipv4Addr::new(10, 0, 0, 1),
        port: 501,
    };
    let encoded = Encoder::encode_request(&connect).unwrap();

    group.bench_function("connect_encode", |b| {
        b.iter(|| black_box(Encoder::encode_request(&connect).unwrap()));
    });
    group.bench_function("connect_decode", |b| {
        b.iter(|| {
            let mut decoder = Decoder::new();
            decoder.extend(&encoded);
            black_box(decoder.decode_request().unwrap())
        });
    });

    let accepted = Response::Accepted {
        handle: 1,
        ip: Ipv4Addr::new(10, 0, 0, 2),
        port: 7000,
    };
    let encoded = Encoder::encode_response(&accepted).unwrap();
    group.bench_function("accept_response_decode", |b| {
        b.iter(|| {
            let mut decoder = Decoder::new();
            decoder.extend(&encoded);
            black_box(decoder.decode_response(ResponseShape::Accepted).unwrap())
        });
    });

    group.finish();
}

fn bench_pipelined_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipelined_decode");

    for count in [10, 100, 1000] {
        let mut stream = Vec::new();
        for i in 0..count {
            let request = Request::Recv { handle: i, len: 64 };
            stream.extend_from_slice(&Encoder::encode_request(&request).unwrap());
        }

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &stream, |b, stream| {
            b.iter(|| {
                let mut decoder = Decoder::new();
                decoder.extend(stream);
                let mut n = 0;
                while let Some(request) = decoder.decode_request().unwrap() {
                    black_box(request);
                    n += 1;
                }
                n
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_send_encode,
    bench_send_decode,
    bench_control_frames,
    bench_pipelined_decode,
);

criterion_main!(benches);
