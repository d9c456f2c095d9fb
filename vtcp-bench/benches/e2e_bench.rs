//! End-to-end client-registry benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use vtcp_client::{AddressFamily, ConnectionConfig, SocketType, VirtualTcp};
use vtcp_server::{Server, ServerConfig};

const LOCAL: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 1), 501);

struct TestSetup {
    _server: Arc<Server>,
    client: VirtualTcp,
}

fn setup_registry_and_client(rt: &Runtime) -> TestSetup {
    // Find available port
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = ServerConfig::new(addr).with_poll_interval(Duration::from_millis(1));
    let server = Arc::new(Server::new(config));

    let server_clone = server.clone();
    rt.spawn(async move {
        let _ = server_clone.run().await;
    });

    // Give server time to start
    std::thread::sleep(Duration::from_millis(100));

    let client = VirtualTcp::new(ConnectionConfig::new(addr), LOCAL);
    rt.block_on(async { client.start().await.unwrap() });

    TestSetup {
        _server: server,
        client,
    }
}

fn bench_create_e2e(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let setup = setup_registry_and_client(&rt);

    let mut group = c.benchmark_group("e2e_create");
    group.throughput(Throughput::Elements(1));

    group.bench_function("create", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(
                setup
                    .client
                    .create(AddressFamily::Inet, SocketType::Stream, 0)
                    .await
                    .unwrap(),
            )
        });
    });

    group.finish();
}

fn bench_send_recv_e2e(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let setup = setup_registry_and_client(&rt);
    let handle = rt.block_on(async {
        setup
            .client
            .create(AddressFamily::Inet, SocketType::Stream, 0)
            .await
            .unwrap()
    });

    let mut group = c.benchmark_group("e2e_send_recv");
    let payload = vec![0x42u8; 1024];
    group.throughput(Throughput::Bytes(payload.len() as u64));

    group.bench_function("1KiB", |b| {
        b.to_async(&rt).iter(|| async {
            setup.client.send(handle, &payload).await.unwrap();
            black_box(setup.client.recv(handle, payload.len()).await.unwrap())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_create_e2e, bench_send_recv_e2e);

criterion_main!(benches);
