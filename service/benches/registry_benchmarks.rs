//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Benchmarks for registry, formatting and fan-out

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use varidial_linecodec::OutputFrame;
use varidial_service::{
    Broadcaster, Channel, ChatRegistry, ConnectionId, LineNumber, MessageFormatter, Outbound,
    ServerMetrics, UserRecord, outbound_channel,
};

fn populate(registry: &ChatRegistry, count: u32) -> Vec<tokio::sync::mpsc::Receiver<Outbound>> {
    (0..count)
        .map(|i| {
            let (writer, rx) = outbound_channel(ConnectionId::new(i as u64), 1024);
            registry
                .register(
                    &UserRecord::new(i, format!("user{i}"), (i % 5) as u8),
                    ConnectionId::new(i as u64),
                    writer,
                )
                .unwrap();
            rx
        })
        .collect()
}

fn bench_register_deregister(c: &mut Criterion) {
    let registry = ChatRegistry::new();
    let _receivers = populate(&registry, 50);
    let (writer, _rx) = outbound_channel(ConnectionId::new(999), 1);
    let user = UserRecord::new(999, "bench", 0);

    c.bench_function("register_deregister", |b| {
        b.iter(|| {
            let line = registry
                .register(&user, ConnectionId::new(999), writer.clone())
                .unwrap();
            black_box(line);
            black_box(registry.deregister("bench"));
        })
    });
}

fn bench_lookups(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_lookups");

    for count in [1u32, 50, 99] {
        let registry = ChatRegistry::new();
        let _receivers = populate(&registry, count);
        let last = LineNumber::new(count as u8).unwrap();

        group.bench_with_input(BenchmarkId::new("find", count), &last, |b, line| {
            b.iter(|| black_box(registry.find(*line)))
        });
        group.bench_with_input(BenchmarkId::new("snapshot", count), &count, |b, _| {
            b.iter(|| black_box(registry.snapshot()))
        });
        group.bench_with_input(BenchmarkId::new("entries_on_channel", count), &count, |b, _| {
            b.iter(|| black_box(registry.entries_on_channel(Channel::DEFAULT)))
        });
    }

    group.finish();
}

fn bench_chat_line(c: &mut Criterion) {
    let line = LineNumber::new(42).unwrap();
    c.bench_function("format_chat_line", |b| {
        b.iter(|| {
            black_box(MessageFormatter::chat_line(
                line,
                Channel::DEFAULT,
                black_box("alice"),
                2,
                black_box("hello everyone on the line"),
            ))
        })
    });
}

fn bench_broadcast(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("broadcast");

    for count in [1u32, 50, 99] {
        let registry = Arc::new(ChatRegistry::new());
        for mut rx in populate(&registry, count) {
            rt.spawn(async move { while rx.recv().await.is_some() {} });
        }
        let broadcaster = Broadcaster::new(
            registry.clone(),
            Arc::new(ServerMetrics::new()),
            Duration::from_millis(100),
        );

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.to_async(&rt).iter(|| async {
                let result = broadcaster
                    .broadcast(Channel::DEFAULT, vec![OutputFrame::line("#1(T1:alice ): hi")])
                    .await;
                black_box(result);
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_register_deregister,
    bench_lookups,
    bench_chat_line,
    bench_broadcast
);
criterion_main!(benches);
