use criterion::{criterion_group, criterion_main, Criterion};
use deskband_pipe::{dispatcher::Dispatcher, state::SharedState, HeadlessHost};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

fn bench_dispatch(c: &mut Criterion) {
    let (host, events) = HeadlessHost::new();
    let state = SharedState::default();
    let dispatcher = Dispatcher::new(
        state.clone(),
        Arc::new(host),
        Arc::new(AtomicBool::new(false)),
    );
    for i in 0..100 {
        dispatcher.handle_line("NEW_TEXTINFO\n");
        dispatcher.handle_line(&format!("SET,TEXT,record {i}\n"));
    }

    c.bench_function("set_text_targeted", |b| {
        b.iter(|| {
            dispatcher.handle_line("SET,TEXTINFO_TARGET,42\n");
            dispatcher.handle_line("SET,TEXT,CPU: 17%\n");
            dispatcher.handle_line("SET,TEXTINFO_TARGET\n");
        })
    });
    c.bench_function("paint", |b| {
        b.iter(|| {
            dispatcher.handle_line("PAINT\n");
            while events.try_recv().is_ok() {}
        })
    });
    c.bench_function("snapshot_100", |b| b.iter(|| state.snapshot()));
}

criterion_group!(benches, bench_dispatch);
criterion_main!(benches);
