//! Integration benchmark for the Jaalee processing pipeline.
//!
//! Benchmarks the full application loop using the same patterns as the
//! tests in app.rs: a FakeScanner feeding advertisements through run_with_io.

use clap::Parser;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use jaalee_listener::app::{Options, Scanner, run_with_io};
use jaalee_listener::{Advertisement, Backend, MacAddress, ScanError};
use std::future::Future;
use std::pin::Pin;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;

/// 24-byte frame: 25.0°C, 50%, battery 90%
fn long_frame() -> Vec<u8> {
    let mut frame = vec![0u8; 24];
    frame[..2].copy_from_slice(&[0x02, 0x15]);
    frame[16..18].copy_from_slice(&[0xF5, 0x25]);
    frame[18..22].copy_from_slice(&[0x66, 0x66, 0x80, 0x00]);
    frame[23] = 90;
    frame
}

fn advertisement(address: MacAddress) -> Advertisement {
    Advertisement {
        address,
        rssi: -60,
        manufacturer_data: long_frame(),
    }
}

/// A fake scanner that replays advertisements, similar to the one in app.rs tests.
struct FakeScanner {
    advertisements: Vec<Advertisement>,
}

impl Scanner for FakeScanner {
    fn start_scan(
        &self,
        _backend: Backend,
    ) -> Pin<Box<dyn Future<Output = Result<mpsc::Receiver<Advertisement>, ScanError>> + Send + '_>>
    {
        let advertisements = self.advertisements.clone();
        Box::pin(async move {
            let (tx, rx) = mpsc::channel::<Advertisement>(advertisements.len().max(1));
            tokio::spawn(async move {
                for a in advertisements {
                    let _ = tx.send(a).await;
                }
            });
            Ok(rx)
        })
    }
}

fn default_options() -> Options {
    Options::parse_from(["jaalee-listener"])
}

fn run(rt: &Runtime, advertisements: Vec<Advertisement>, capacity: usize) -> Vec<u8> {
    let scanner = FakeScanner { advertisements };
    let mut out = Vec::<u8>::with_capacity(capacity);
    let mut err = Vec::<u8>::new();

    rt.block_on(async {
        run_with_io(default_options(), &scanner, &mut out, &mut err)
            .await
            .unwrap();
    });

    out
}

/// Repeated readings from one sensor: discovery once, then state only
fn bench_single_device(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_device");
    let rt = Runtime::new().unwrap();
    let mac = MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

    for batch_size in [1, 10, 100] {
        group.throughput(Throughput::Elements(batch_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            &batch_size,
            |b, &size| {
                let advertisements: Vec<Advertisement> =
                    (0..size).map(|_| advertisement(mac)).collect();
                b.iter(|| black_box(run(&rt, advertisements.clone(), 256 * (size + 4))))
            },
        );
    }

    group.finish();
}

/// Many sensors appearing at once: every reading triggers an announcement
fn bench_multi_device(c: &mut Criterion) {
    let mut group = c.benchmark_group("multi_device");
    let rt = Runtime::new().unwrap();

    let advertisements: Vec<Advertisement> = (0..10u8)
        .map(|i| advertisement(MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, i])))
        .collect();

    group.throughput(Throughput::Elements(10));
    group.bench_function("10_new_devices", |b| {
        b.iter(|| {
            let out = run(&rt, advertisements.clone(), 2048 * 10);
            // 3 discovery + status + state per device
            debug_assert_eq!(out.iter().filter(|&&b| b == b'\n').count(), 50);
            black_box(out)
        })
    });

    group.finish();
}

criterion_group!(benches, bench_single_device, bench_multi_device);
criterion_main!(benches);
