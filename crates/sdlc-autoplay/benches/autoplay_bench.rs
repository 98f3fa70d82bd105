use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sdlc_autoplay::{play, Strategy};
use sdlc_catalog::ScenarioCatalog;
use sdlc_runtime::SimulationController;

fn bench_strategies(c: &mut Criterion) {
    let catalog = ScenarioCatalog::builtin().unwrap();
    for strategy in [Strategy::First, Strategy::Random { seed: 42 }, Strategy::Greedy] {
        c.bench_function(&format!("autoplay fintech-ai {strategy}"), |b| {
            b.iter(|| {
                let mut ctrl = SimulationController::new();
                ctrl.start_scenario(&catalog, "fintech-ai").unwrap();
                black_box(play(&mut ctrl, strategy).unwrap())
            })
        });
    }
}

criterion_group!(benches, bench_strategies);
criterion_main!(benches);
