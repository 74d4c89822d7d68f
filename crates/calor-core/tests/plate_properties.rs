//! Integration tests: physical properties of the whole-grid solver and the
//! row partition it is compared against.

use approx::{assert_abs_diff_eq, assert_relative_eq};
use calor_core::grid::LocalSubgrid;
use calor_core::input::parse_grid;
use calor_core::reference::ReferenceSolver;
use calor_core::types::plate;
use calor_core::{HeatParams, PartitionPlan, Side, SnapshotReader, SnapshotWriter};
use ndarray::{s, Array2};

/// With the stable coefficient the interior relaxes towards the boundary.
#[test]
fn test_plate_relaxes_to_boundary_temperature() {
    let params = HeatParams::with_resolution(8);
    let mut solver = ReferenceSolver::from_params(&params);

    let mut last_min = 0.0;
    for _ in 0..400 {
        solver.step();
        let min = solver.state().iter().copied().fold(f64::INFINITY, f64::min);
        assert!(min >= last_min - 1e-12, "interior cooled down");
        last_min = min;
    }
    for &v in solver.state().iter() {
        assert_abs_diff_eq!(v, 10.0, epsilon = 1e-3);
    }
}

/// Temperatures stay within the range of the initial condition.
#[test]
fn test_maximum_principle() {
    let mut initial = plate(9, 9, 10.0, 0.0);
    initial[[4, 4]] = 50.0;
    let mut solver = ReferenceSolver::new(initial, 0.25);
    for _ in 0..100 {
        solver.step();
        for &v in solver.state().iter() {
            assert!((0.0..=50.0).contains(&v));
        }
    }
}

/// Stitching blocks together by hand, with ghost rows copied between them,
/// reproduces the whole-grid update.
#[test]
fn test_blocks_with_ghost_rows_reproduce_whole_grid() {
    let params = HeatParams::with_resolution(9);
    let plan = PartitionPlan::new(9, 3).unwrap();
    assert_eq!(plan.rows_per_worker(), 2);
    assert_eq!(plan.remainder(), 1);

    let mut grids: Vec<LocalSubgrid> = plan
        .blocks()
        .iter()
        .map(|b| {
            let mut g = LocalSubgrid::new(b.rows, 9).unwrap();
            g.initialize(params.boundary, params.initial, b.is_topmost(), b.is_bottommost());
            g
        })
        .collect();

    let mut solver = ReferenceSolver::from_params(&params);
    for _ in 0..10 {
        for k in 1..grids.len() {
            let down = grids[k - 1].send_row(Side::South);
            let up = grids[k].send_row(Side::North);
            grids[k].set_ghost(Side::North, &down).unwrap();
            grids[k - 1].set_ghost(Side::South, &up).unwrap();
        }
        for g in &mut grids {
            let rows = g.rows();
            g.update_rows(1..rows + 1, params.alpha());
        }
        solver.step();

        for (block, g) in plan.blocks().iter().zip(&grids) {
            assert_eq!(g.true_rows(), solver.state().slice(s![block.global_rows(), ..]));
        }
        for g in &mut grids {
            g.swap();
        }
    }
}

#[test]
fn test_stream_replays_reference_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reference.dat");

    let params = HeatParams::with_resolution(5);
    let mut writer = SnapshotWriter::create(&path, 5, 5).unwrap();
    let mut solver = ReferenceSolver::from_params(&params);
    solver.run(4, &mut writer).unwrap();
    assert_eq!(writer.close().unwrap(), 4);

    let mut reader = SnapshotReader::open(&path, 5, 5).unwrap();
    assert_eq!(reader.len(), 4);
    let last: Array2<f64> = reader.read(3).unwrap();
    assert_eq!(&last, solver.state());
}

#[test]
fn test_parsed_grid_runs_like_plate() {
    let text = "P2\n4 3\n255\n10 10 10 10\n10 0 0 10\n10 10 10 10\n";
    let grid = parse_grid(text).unwrap();
    assert_eq!(grid.dim(), (3, 4));
    assert_eq!(grid, plate(3, 4, 10.0, 0.0));

    let mut solver = ReferenceSolver::new(grid, 0.25);
    solver.step();
    assert_relative_eq!(solver.state()[[1, 1]], 7.5);
    assert_relative_eq!(solver.state()[[1, 2]], 7.5);
}
