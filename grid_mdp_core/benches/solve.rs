use criterion::{Criterion, black_box, criterion_group, criterion_main};
use grid_mdp_core::{Cell, GridMdpSolver, GridWorld};

/// Open grid with a comb of walls hanging from alternating edges.
fn comb_world(size: usize) -> GridWorld {
    let mut obstacles = Vec::new();
    for col in (2..size - 1).step_by(4) {
        for row in 0..size - 2 {
            obstacles.push(Cell::new(row, col));
        }
    }
    for col in (4..size - 1).step_by(4) {
        for row in 2..size {
            obstacles.push(Cell::new(row, col));
        }
    }
    GridWorld::new(size, Cell::new(0, 0), Cell::new(size - 1, size - 1), obstacles).unwrap()
}

fn bench_solve(c: &mut Criterion, size: usize) {
    let world = comb_world(size);
    let solver = GridMdpSolver::default();

    c.bench_function(&format!("solve_comb_{}", size), |b| {
        b.iter(|| black_box(solver.solve(black_box(&world))))
    });
}

pub fn grid_small(c: &mut Criterion) {
    bench_solve(c, 10);
}

pub fn grid_medium(c: &mut Criterion) {
    bench_solve(c, 25);
}

pub fn grid_large(c: &mut Criterion) {
    bench_solve(c, 50);
}

criterion_group!(benches, grid_small, grid_medium, grid_large);
criterion_main!(benches);
