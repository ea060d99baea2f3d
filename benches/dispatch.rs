//! Benchmarks for command dispatch and response shaping.

use std::sync::Arc;

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use leetbot::capabilities::{BotControl, Capabilities, Messenger, ServerStatus};
use leetbot::commands::{CommandInvocation, Origin, Registry, register_builtins};
use leetbot::config::CommandsConfig;
use leetbot::error::SendError;
use leetbot::outbound::{OutboundMessage, shape_response, split_text};

struct Discard;

impl Messenger for Discard {
    fn send(&self, _server: &str, _msg: OutboundMessage) -> Result<(), SendError> {
        Ok(())
    }
}

impl BotControl for Discard {
    fn join(&self, _: &str, _: &str, _: Option<&str>) -> Result<(), SendError> {
        Ok(())
    }
    fn part(&self, _: &str, _: &str, _: Option<&str>) -> Result<(), SendError> {
        Ok(())
    }
    fn change_nick(&self, _: &str, _: &str) -> Result<(), SendError> {
        Ok(())
    }
    fn send_raw(&self, _: &str, _: &str) -> Result<(), SendError> {
        Ok(())
    }
    fn connect(&self, _: &str) -> Result<(), SendError> {
        Ok(())
    }
    fn disconnect(&self, _: &str) -> Result<(), SendError> {
        Ok(())
    }
    fn servers(&self) -> Vec<ServerStatus> {
        Vec::new()
    }
    fn request_shutdown(&self, _: Option<String>) {}
}

fn dispatch_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut registry = Registry::new(CommandsConfig::default());
    register_builtins(&mut registry).unwrap();
    let registry = registry.seal();
    let caps = Capabilities::new(Arc::new(Discard), Arc::new(Discard), "bench");

    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(1));

    group.bench_function("parse_invocation", |b| {
        b.iter(|| {
            CommandInvocation::parse(black_box("!weather Helsinki"), '!', Origin::Channel)
        })
    });

    for (name, line) in [("ping", "!ping"), ("help", "!help"), ("unknown", "!nosuch")] {
        let inv = CommandInvocation::parse(line, '!', Origin::Private)
            .unwrap()
            .on_server("bench", "alice", "alice");
        group.bench_function(name, |b| {
            b.to_async(&runtime)
                .iter(|| async { black_box(registry.dispatch(&inv, &caps).await) })
        });
    }

    group.finish();
}

fn shaping_benchmark(c: &mut Criterion) {
    let text = "the quick brown fox jumps over the lazy dog ".repeat(100);
    let mut group = c.benchmark_group("shaping");
    group.throughput(Throughput::Bytes(text.len() as u64));

    group.bench_function("split_text", |b| b.iter(|| split_text(black_box(&text), 400)));
    group.bench_function("shape_response", |b| {
        b.iter(|| shape_response(black_box(&text), 400, 10))
    });

    group.finish();
}

criterion_group!(benches, dispatch_benchmark, shaping_benchmark);
criterion_main!(benches);
