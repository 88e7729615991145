//! Refinement and unrefinement topology.

use cellgrid::prelude::*;

fn grid_2x2(max_level: u32) -> Grid<u64> {
    GridBuilder::new([2, 2, 1])
        .max_refinement_level(max_level)
        .build(NoComm)
        .unwrap()
}

#[test]
fn refining_replaces_the_parent_with_eight_children() {
    let mut grid = grid_2x2(1);
    let parent = grid.mapping().encode(0, [0, 0, 0]).unwrap();
    assert!(grid.refine_completely(parent));
    let created = grid.stop_refining().unwrap();

    assert_eq!(created.len(), 8);
    assert!(!grid.cell_exists(parent));
    assert_eq!(grid.local_cell_count(), 3 + 8);
    for &child in &created {
        assert_eq!(grid.mapping().parent_of(child), Some(parent));
        assert!(grid.is_local(child));
        assert_eq!(grid.get(child), Some(&0), "children start with default payloads");
    }
}

#[test]
fn refinement_at_max_level_is_refused() {
    let mut grid = grid_2x2(0);
    let cell = grid.get_cells()[0];
    assert!(!grid.refine_completely(cell));
    let created = grid.stop_refining().unwrap();
    assert!(created.is_empty());
    assert_eq!(grid.local_cell_count(), 4);
}

#[test]
#[should_panic(expected = "not owned")]
fn refining_a_foreign_cell_panics() {
    let mut grid = grid_2x2(1);
    grid.refine_completely(CellId::from_raw(4000));
}

#[test]
fn coarse_neighbors_see_finer_coverage_after_refining() {
    let mut grid = grid_2x2(1);
    let refined = grid.mapping().encode(0, [0, 0, 0]).unwrap();
    let neighbor = grid.mapping().encode(0, [1, 0, 0]).unwrap();
    grid.refine_completely(refined);
    grid.stop_refining().unwrap();

    let detailed = grid.neighbors_detailed(neighbor).unwrap();
    let coverage: Vec<_> = detailed
        .iter()
        .filter_map(|n| match n {
            Neighbor::FinerCoverage(ids) => Some(ids.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(coverage.len(), 1, "one refined area beside this cell");
    assert_eq!(coverage[0].len(), 8);
    // flattened neighbor list carries all leaves, no sentinel entries
    let flat = grid.get_neighbors_of(neighbor).unwrap();
    assert!(flat.iter().all(|&c| grid.cell_exists(c)));
}

#[test]
fn refining_a_fine_cell_drags_coarse_neighbors_along() {
    let mut grid: Grid<u64> = GridBuilder::new([2, 1, 1])
        .max_refinement_level(2)
        .build(NoComm)
        .unwrap();
    let left = grid.mapping().encode(0, [0, 0, 0]).unwrap();
    let right = grid.mapping().encode(0, [1, 0, 0]).unwrap();

    grid.refine_completely(left);
    grid.stop_refining().unwrap();
    assert!(grid.cell_exists(right), "right neighbor is one level apart");

    // refining a face-adjacent child would leave the right cell two levels
    // behind its grandchildren, so the right cell must refine too
    let face_child = grid.mapping().encode(1, [1, 0, 0]).unwrap();
    assert!(grid.is_local(face_child));
    grid.refine_completely(face_child);
    grid.stop_refining().unwrap();

    assert!(!grid.cell_exists(face_child));
    assert!(!grid.cell_exists(right), "coarse neighbor was dragged along");
    for child in grid.mapping().children_of(right) {
        assert!(grid.cell_exists(child));
    }
}

#[test]
fn unrefining_merges_the_family_back() {
    let mut grid = grid_2x2(1);
    let parent = grid.mapping().encode(0, [1, 1, 0]).unwrap();
    grid.refine_completely(parent);
    let children = grid.stop_refining().unwrap();

    grid.unrefine_completely(children[0]);
    let created = grid.stop_refining().unwrap();

    assert_eq!(created, vec![parent]);
    assert!(grid.cell_exists(parent));
    assert_eq!(grid.get(parent), Some(&0), "merged parent starts fresh");
    for child in children {
        assert!(!grid.cell_exists(child));
    }
    assert_eq!(grid.local_cell_count(), 4);
}

#[test]
fn refine_wins_over_unrefine_on_siblings() {
    let mut grid: Grid<u64> = GridBuilder::new([2, 2, 1])
        .max_refinement_level(2)
        .build(NoComm)
        .unwrap();
    let parent = grid.mapping().encode(0, [0, 0, 0]).unwrap();
    grid.refine_completely(parent);
    let children = grid.stop_refining().unwrap();

    // one sibling asks to go deeper while another asks to merge away
    grid.refine_completely(children[0]);
    grid.unrefine_completely(children[1]);
    grid.stop_refining().unwrap();

    assert!(!grid.cell_exists(parent), "merge was cancelled");
    assert!(!grid.cell_exists(children[0]), "refinement was applied");
    for grandchild in grid.mapping().children_of(children[0]) {
        assert!(grid.cell_exists(grandchild));
    }
    assert!(grid.cell_exists(children[1]));
}

#[test]
fn unrefining_near_finer_cells_is_refused() {
    let mut grid: Grid<u64> = GridBuilder::new([2, 1, 1])
        .max_refinement_level(2)
        .build(NoComm)
        .unwrap();
    let left = grid.mapping().encode(0, [0, 0, 0]).unwrap();
    let right = grid.mapping().encode(0, [1, 0, 0]).unwrap();
    grid.refine_completely(left);
    grid.refine_completely(right);
    grid.stop_refining().unwrap();

    // deepen the left side only
    let left_children = grid.mapping().children_of(left);
    for child in &left_children {
        grid.refine_completely(*child);
    }
    grid.stop_refining().unwrap();

    // merging the right family would put level-2 cells beside a level-0 one
    let right_child = grid.mapping().children_of(right)[0];
    assert!(grid.is_local(right_child));
    grid.unrefine_completely(right_child);
    let created = grid.stop_refining().unwrap();

    assert!(created.is_empty());
    assert!(!grid.cell_exists(right), "merge must be refused");
    for child in grid.mapping().children_of(right) {
        assert!(grid.cell_exists(child));
    }
}

#[test]
fn refinement_keeps_the_grid_covering_the_domain() {
    let mut grid: Grid<u64> = GridBuilder::new([3, 3, 1])
        .max_refinement_level(1)
        .build(NoComm)
        .unwrap();
    let center = grid.mapping().encode(0, [1, 1, 0]).unwrap();
    grid.refine_completely(center);
    grid.stop_refining().unwrap();

    // every point probe finds exactly one leaf cell
    let geometry = grid.geometry().clone();
    for probe in [
        [0.5, 0.5, 0.5],
        [1.25, 1.25, 0.25],
        [1.75, 1.75, 0.75],
        [2.5, 1.5, 0.5],
    ] {
        let coarse = geometry.cell_at(grid.mapping(), probe, 0);
        let fine = geometry.cell_at(grid.mapping(), probe, 1);
        let exists: Vec<CellId> = [coarse, fine]
            .into_iter()
            .flatten()
            .filter(|&c| grid.cell_exists(c))
            .collect();
        assert_eq!(exists.len(), 1, "point {probe:?} covered exactly once");
    }
}
