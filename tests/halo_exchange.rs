//! The start/wait exchange pair across in-process ranks.

use cellgrid::prelude::*;

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

fn line_grid(comm: ThreadComm) -> Grid<u64, CartesianGeometry, ThreadComm> {
    GridBuilder::new([4, 1, 1])
        .neighborhood_size(1)
        .build(comm)
        .unwrap()
}

#[test]
fn boundary_copies_arrive() {
    run_ranks(2, |comm| {
        let mut grid = line_grid(comm);
        // striped layout: rank 0 owns {1,2}, rank 1 owns {3,4}
        for cell in grid.get_cells() {
            *grid.get_mut(cell).unwrap() = cell.get() * 100;
        }
        grid.update_copies_of_remote_neighbors().unwrap();

        let me = grid.rank();
        let boundary_remote = CellId::from_raw(if me == 0 { 3 } else { 2 });
        assert_eq!(grid.owner_of(boundary_remote), Some(1 - me));
        assert_eq!(grid.get(boundary_remote), Some(&(boundary_remote.get() * 100)));
    });
}

#[test]
fn copies_reflect_values_at_start_not_at_wait() {
    run_ranks(2, |comm| {
        let mut grid = line_grid(comm);
        for cell in grid.get_cells() {
            *grid.get_mut(cell).unwrap() = cell.get();
        }
        grid.start_remote_neighbor_copy_updates().unwrap();
        // mutate after start; peers must still observe the pre-start values
        for cell in grid.get_cells() {
            *grid.get_mut(cell).unwrap() = 9999;
        }
        grid.wait_remote_neighbor_copy_updates().unwrap();

        let me = grid.rank();
        let boundary_remote = CellId::from_raw(if me == 0 { 3 } else { 2 });
        assert_eq!(grid.get(boundary_remote), Some(&boundary_remote.get()));
    });
}

#[test]
fn inner_cells_never_depend_on_remote_data() {
    run_ranks(2, |comm| {
        let grid = line_grid(comm);
        let me = grid.rank();
        // each rank's far cell only touches its own near cell
        let inner: Vec<u64> = grid.inner_cells().iter().map(|c| c.get()).collect();
        let outer: Vec<u64> = grid.outer_cells().iter().map(|c| c.get()).collect();
        if me == 0 {
            assert_eq!(inner, vec![1]);
            assert_eq!(outer, vec![2]);
        } else {
            assert_eq!(inner, vec![4]);
            assert_eq!(outer, vec![3]);
        }
        for &cell in grid.inner_cells() {
            for &n in grid.get_neighbors_of(cell).unwrap() {
                assert_eq!(grid.owner_of(n), Some(me));
            }
        }
    });
}

#[test]
fn repeated_exchanges_track_owner_updates() {
    run_ranks(2, |comm| {
        let mut grid = line_grid(comm);
        for round in 1..=3u64 {
            for cell in grid.get_cells() {
                *grid.get_mut(cell).unwrap() = cell.get() + round * 1000;
            }
            grid.update_copies_of_remote_neighbors().unwrap();
            let me = grid.rank();
            let boundary_remote = CellId::from_raw(if me == 0 { 3 } else { 2 });
            assert_eq!(
                grid.get(boundary_remote),
                Some(&(boundary_remote.get() + round * 1000))
            );
        }
    });
}

#[test]
fn three_ranks_exchange_both_sides() {
    run_ranks(3, |comm| {
        let mut grid: Grid<u64, _, ThreadComm> = GridBuilder::new([6, 1, 1])
            .build(comm)
            .unwrap();
        // striped: rank r owns {2r+1, 2r+2}
        for cell in grid.get_cells() {
            *grid.get_mut(cell).unwrap() = cell.get() * 10;
        }
        grid.update_copies_of_remote_neighbors().unwrap();
        let me = grid.rank();
        if me == 1 {
            assert_eq!(grid.get(CellId::from_raw(2)), Some(&20));
            assert_eq!(grid.get(CellId::from_raw(5)), Some(&50));
        }
        if me == 0 {
            assert_eq!(grid.get(CellId::from_raw(3)), Some(&30));
        }
        if me == 2 {
            assert_eq!(grid.get(CellId::from_raw(4)), Some(&40));
        }
    });
}

#[test]
#[should_panic(expected = "in flight")]
fn double_start_is_a_usage_error() {
    let mut grid: Grid<u64> = GridBuilder::new([2, 1, 1]).build(NoComm).unwrap();
    grid.start_remote_neighbor_copy_updates().unwrap();
    let _ = grid.start_remote_neighbor_copy_updates();
}

#[test]
#[should_panic(expected = "without a matching start")]
fn wait_without_start_is_a_usage_error() {
    let mut grid: Grid<u64> = GridBuilder::new([2, 1, 1]).build(NoComm).unwrap();
    let _ = grid.wait_remote_neighbor_copy_updates();
}
