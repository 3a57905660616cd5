//! Benchmarks for buildkit-tunnel
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use buildkit_tunnel::collector::{channel, BuildErrors, Interrupt, StreamItem};
use buildkit_tunnel::session::upgrade::{parse_response_head, upgrade_request};
use buildkit_tunnel::vcs::VcsInfo;
use buildkit_tunnel::BuildConfig;

const SWITCHING: &[u8] = b"HTTP/1.1 101 UPGRADED\r\n\
Content-Type: application/vnd.docker.raw-stream\r\n\
Connection: Upgrade\r\n\
Upgrade: h2c\r\n\
\r\n\
PRI * HTTP/2.0\r\n";

fn bench_upgrade_handshake(c: &mut Criterion) {
    c.bench_function("upgrade_request", |b| {
        b.iter(|| upgrade_request(black_box("127.0.0.1:2375"), black_box("/grpc")))
    });

    c.bench_function("parse_response_head_101", |b| {
        b.iter(|| parse_response_head(black_box(SWITCHING)))
    });

    c.bench_function("parse_response_head_partial", |b| {
        b.iter(|| parse_response_head(black_box(&SWITCHING[..40])))
    });
}

fn bench_frontend_options(c: &mut Criterion) {
    let config = BuildConfig::local("/work/app").dockerfile("docker/prod.Dockerfile");
    let vcs = VcsInfo {
        revision: "0123456789abcdef0123456789abcdef01234567".to_string(),
        source: "https://example.com/app.git".to_string(),
    };

    c.bench_function("frontend_options", |b| {
        b.iter(|| black_box(&config).frontend_options(black_box(&vcs)))
    });
}

fn bench_collector(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("collector_drain_1000", |b| {
        b.to_async(&runtime).iter_batched(
            || {
                let (sink, collector) = channel::<u64>("bench", BuildErrors::new(), Interrupt::never());
                for i in 0..1000 {
                    sink.next(i);
                }
                sink.complete();
                collector
            },
            |mut collector| async move {
                let mut total = 0u64;
                while let Ok(Some(StreamItem::Value(v))) = collector.take().await {
                    total += v;
                }
                black_box(total)
            },
            BatchSize::SmallInput,
        )
    });

    c.bench_function("collector_single", |b| {
        b.to_async(&runtime).iter_batched(
            || {
                let (sink, collector) = channel::<u64>("bench", BuildErrors::new(), Interrupt::never());
                sink.next(7);
                sink.complete();
                collector
            },
            |collector| async move { black_box(collector.single().await) },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(
    benches,
    bench_upgrade_handshake,
    bench_frontend_options,
    bench_collector
);
criterion_main!(benches);
