// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::time::Duration;

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use kurbo::{Point, Size, Vec2};
use understory_ui::{
    Layer, LayerCore, LayerFeatures, LayerHandle, Modifiers, NodeFlags, NodeHandle, Pointer,
    PointerEvent, PointerMoveEvent, Pointers, UserInterface,
};

struct AcceptAll {
    core: LayerCore,
}

impl Layer for AcceptAll {
    fn core(&self) -> &LayerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut LayerCore {
        &mut self.core
    }

    fn features(&self) -> LayerFeatures {
        LayerFeatures::DRAW | LayerFeatures::EVENT
    }

    fn pointer_press_event(&mut self, _data: u32, event: &mut PointerEvent) {
        event.set_accepted(true);
    }

    fn pointer_move_event(&mut self, _data: u32, event: &mut PointerMoveEvent) {
        event.set_accepted(true);
    }
}

/// `n`×`n` cells of 10×10, each a root with one clipped child carrying data.
fn grid_ui(n: usize) -> (UserInterface, Vec<NodeHandle>) {
    let side = n as f64 * 10.0;
    let mut ui = UserInterface::with_unscaled_size(Size::new(side, side));
    let layer = ui.create_layer(LayerHandle::NULL);
    ui.set_layer_instance(Box::new(AcceptAll {
        core: LayerCore::new(layer),
    }));
    let mut cells = Vec::with_capacity(n * n);
    for y in 0..n {
        for x in 0..n {
            let offset = Vec2::new(x as f64 * 10.0, y as f64 * 10.0);
            let cell_size = Size::new(10.0, 10.0);
            let cell = ui.create_node(NodeHandle::NULL, offset, cell_size, NodeFlags::CLIP);
            let child_offset = Vec2::new(1.0, 1.0);
            let child =
                ui.create_node(cell, child_offset, Size::new(8.0, 8.0), NodeFlags::empty());
            ui.layer_mut(layer).core_mut().create(child);
            cells.push(cell);
        }
    }
    (ui, cells)
}

fn bench_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("update");
    for &n in &[16usize, 64] {
        group.throughput(Throughput::Elements((n * n * 2) as u64));
        group.bench_function(format!("full_n{}", n), |b| {
            b.iter_batched(
                || grid_ui(n).0,
                |mut ui| {
                    ui.update();
                    ui
                },
                BatchSize::LargeInput,
            )
        });
        group.bench_function(format!("offsets_only_n{}", n), |b| {
            let (mut ui, cells) = grid_ui(n);
            ui.update();
            let mut shift = 0.0;
            b.iter(|| {
                shift = 1.0 - shift;
                ui.set_node_offset(cells[0], Vec2::new(shift, 0.0));
                ui.update();
                black_box(ui.state());
            });
        });
        group.bench_function(format!("reorder_roots_n{}", n), |b| {
            let (mut ui, cells) = grid_ui(n);
            ui.update();
            b.iter(|| {
                let first = ui.node_order_first();
                ui.set_node_order(first, NodeHandle::NULL);
                ui.update();
                black_box(ui.node_order_last() == first);
            });
            black_box(cells.len());
        });
    }
    group.finish();
}

fn left_button() -> PointerEvent {
    PointerEvent::new(
        Duration::ZERO,
        Pointer::MouseLeft,
        true,
        0,
        Modifiers::empty(),
    )
}

fn bench_events(c: &mut Criterion) {
    let mut group = c.benchmark_group("events");
    for &n in &[16usize, 64] {
        let (mut ui, _) = grid_ui(n);
        ui.update();
        let side = n as f64 * 10.0;
        group.bench_function(format!("press_release_n{}", n), |b| {
            let mut i = 0_usize;
            b.iter(|| {
                i = (i + 7) % (n * n);
                let x = (i % n) as f64 * 10.0 + 5.0;
                let y = (i / n) as f64 * 10.0 + 5.0;
                let mut press = left_button();
                black_box(ui.pointer_press_event(Point::new(x, y), &mut press));
                let mut release = left_button();
                black_box(ui.pointer_release_event(Point::new(x, y), &mut release));
            });
        });
        group.bench_function(format!("hover_sweep_n{}", n), |b| {
            let mut x = 0.0;
            b.iter(|| {
                x = (x + 3.0) % side;
                let mut event = PointerMoveEvent::new(
                    Duration::ZERO,
                    None,
                    Pointers::empty(),
                    true,
                    0,
                    Modifiers::empty(),
                );
                black_box(ui.pointer_move_event(Point::new(x, side / 2.0), &mut event));
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_update, bench_events);
criterion_main!(benches);
