//! Binary snapshot output: header fidelity and rank-count independence.

use std::collections::HashSet;
use std::path::PathBuf;

use cellgrid::io::{read_snapshot, write_snapshot};
use cellgrid::prelude::*;

fn scratch_file(name: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("cellgrid-{}-{name}", std::process::id()));
    path
}

fn run_ranks<F>(size: usize, body: F)
where
    F: Fn(ThreadComm) + Send + Sync + Clone + 'static,
{
    let handles: Vec<_> = ThreadComm::group(size)
        .into_iter()
        .map(|comm| {
            let body = body.clone();
            std::thread::spawn(move || body(comm))
        })
        .collect();
    for handle in handles {
        handle.join().expect("rank thread panicked");
    }
}

#[test]
fn header_and_records_roundtrip() {
    let mut grid: Grid<u64> = GridBuilder::new([3, 3, 1])
        .geometry(CartesianGeometry::new([1.0, 2.0, 3.0], [0.5, 0.5, 2.0]).unwrap())
        .build(NoComm)
        .unwrap();
    for cell in grid.get_cells() {
        *grid.get_mut(cell).unwrap() = cell.get() * 7;
    }
    let path = scratch_file("header.dc");
    write_snapshot(&grid, 42, &path, |v| *v).unwrap();

    let snapshot = read_snapshot(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(snapshot.step, 42);
    assert_eq!(snapshot.origin, [1.0, 2.0, 3.0]);
    assert_eq!(snapshot.base_length, [0.5, 0.5, 2.0]);
    assert_eq!(snapshot.grid_length, [3, 3, 1]);
    assert_eq!(snapshot.max_refinement_level, 0);
    let expected: Vec<(u64, u64)> = (1..=9).map(|id| (id, id * 7)).collect();
    assert_eq!(snapshot.cells, expected);
}

#[test]
fn file_size_matches_the_layout() {
    let grid: Grid<u64> = GridBuilder::new([4, 2, 1]).build(NoComm).unwrap();
    let path = scratch_file("layout.dc");
    write_snapshot(&grid, 0, &path, |v| *v).unwrap();
    let len = std::fs::metadata(&path).unwrap().len();
    std::fs::remove_file(&path).ok();
    // 84-byte header plus 16 bytes per cell
    assert_eq!(len, 84 + 16 * 8);
}

#[test]
fn striped_two_rank_output_is_byte_identical_to_serial() {
    let serial_path = scratch_file("serial.dc");
    let parallel_path = scratch_file("parallel.dc");

    let mut grid: Grid<u64> = GridBuilder::new([6, 2, 1]).build(NoComm).unwrap();
    for cell in grid.get_cells() {
        *grid.get_mut(cell).unwrap() = cell.get() + 5;
    }
    write_snapshot(&grid, 3, &serial_path, |v| *v).unwrap();

    let parallel_path_for_ranks = parallel_path.clone();
    run_ranks(2, move |comm| {
        let mut grid: Grid<u64, _, ThreadComm> =
            GridBuilder::new([6, 2, 1]).build(comm).unwrap();
        for cell in grid.get_cells() {
            *grid.get_mut(cell).unwrap() = cell.get() + 5;
        }
        write_snapshot(&grid, 3, &parallel_path_for_ranks, |v| *v).unwrap();
    });

    let serial = std::fs::read(&serial_path).unwrap();
    let parallel = std::fs::read(&parallel_path).unwrap();
    std::fs::remove_file(&serial_path).ok();
    std::fs::remove_file(&parallel_path).ok();
    assert_eq!(serial, parallel);
}

#[test]
fn balanced_output_carries_the_same_record_set() {
    let path = scratch_file("balanced.dc");
    let path_for_ranks = path.clone();
    run_ranks(3, move |comm| {
        let mut grid: Grid<u64, _, ThreadComm> =
            GridBuilder::new([5, 4, 1]).build(comm).unwrap();
        grid.balance_load().unwrap();
        for cell in grid.get_cells() {
            *grid.get_mut(cell).unwrap() = cell.get() * 11;
        }
        write_snapshot(&grid, 9, &path_for_ranks, |v| *v).unwrap();
    });

    let snapshot = read_snapshot(&path).unwrap();
    std::fs::remove_file(&path).ok();
    let expected: HashSet<(u64, u64)> = (1..=20).map(|id| (id, id * 11)).collect();
    let actual: HashSet<(u64, u64)> = snapshot.cells.iter().copied().collect();
    assert_eq!(actual, expected);
    assert_eq!(snapshot.cells.len(), 20);
}

#[test]
fn truncated_files_are_rejected() {
    let grid: Grid<u64> = GridBuilder::new([2, 2, 1]).build(NoComm).unwrap();
    let path = scratch_file("truncated.dc");
    write_snapshot(&grid, 1, &path, |v| *v).unwrap();
    let mut bytes = std::fs::read(&path).unwrap();
    bytes.truncate(bytes.len() - 3);
    std::fs::write(&path, &bytes).unwrap();
    let err = read_snapshot(&path).unwrap_err();
    std::fs::remove_file(&path).ok();
    assert!(matches!(err, cellgrid::error::GridError::SnapshotFormat(_)));
}
