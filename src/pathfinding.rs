//! Breadth-first search over the grid's walkable tiles.
//!
//! Every agent kind routes through these functions. Neighbour expansion order
//! is fixed (north, east, south, west) so equal-length routes always resolve
//! the same way for a given grid.

use std::collections::VecDeque;

use crate::grid::{Coord, Grid, Tile};

/// Shortest 4-connected route from `start` to `end`, both inclusive.
/// `None` when either end is not walkable or no route exists.
pub fn find_path(grid: &Grid, start: Coord, end: Coord) -> Option<Vec<Coord>> {
    find_path_with(grid, start, end, |_| true)
}

/// Same as [`find_path`] with an extra traversal rule layered on top of
/// [`Grid::is_walkable`].
pub fn find_path_with<F>(grid: &Grid, start: Coord, end: Coord, extra: F) -> Option<Vec<Coord>>
where
    F: Fn(&Tile) -> bool,
{
    let passable = |at: Coord| grid.is_walkable(at) && grid.tile(at).is_some_and(&extra);
    if !passable(end) {
        return None;
    }
    search(grid, start, passable, |at| at == end)
}

/// Route to any walkable tile 4-adjacent to `site`, typically a ride or stall
/// that itself blocks movement.
pub fn find_path_to_structure(grid: &Grid, start: Coord, site: Coord) -> Option<Vec<Coord>> {
    if !grid.in_bounds(site) {
        return None;
    }
    search(grid, start, |at| grid.is_walkable(at), |at| at.is_adjacent(site))
}

/// Route to the closest tile satisfying `goal`.
pub fn find_nearest<G>(grid: &Grid, start: Coord, goal: G) -> Option<Vec<Coord>>
where
    G: Fn(Coord) -> bool,
{
    search(grid, start, |at| grid.is_walkable(at), goal)
}

/// Route to the closest tile satisfying `goal`, crossing only tiles accepted
/// by `passable` (which must include `start`).
pub fn find_nearest_over<P, G>(
    grid: &Grid,
    start: Coord,
    passable: P,
    goal: G,
) -> Option<Vec<Coord>>
where
    P: Fn(Coord) -> bool,
    G: Fn(Coord) -> bool,
{
    search(grid, start, passable, goal)
}

fn search<P, G>(grid: &Grid, start: Coord, passable: P, goal: G) -> Option<Vec<Coord>>
where
    P: Fn(Coord) -> bool,
    G: Fn(Coord) -> bool,
{
    if !passable(start) {
        return None;
    }
    if goal(start) {
        return Some(vec![start]);
    }

    let size = grid.size();
    let index = |at: Coord| at.y as usize * size + at.x as usize;
    let mut came_from: Vec<Option<Coord>> = vec![None; size * size];
    let mut visited = vec![false; size * size];
    let mut frontier = VecDeque::new();
    visited[index(start)] = true;
    frontier.push_back(start);

    while let Some(current) = frontier.pop_front() {
        for next in current.neighbors() {
            if !grid.in_bounds(next) || visited[index(next)] || !passable(next) {
                continue;
            }
            visited[index(next)] = true;
            came_from[index(next)] = Some(current);
            if goal(next) {
                return Some(rebuild(&came_from, start, next, index));
            }
            frontier.push_back(next);
        }
    }
    None
}

fn rebuild<I>(came_from: &[Option<Coord>], start: Coord, end: Coord, index: I) -> Vec<Coord>
where
    I: Fn(Coord) -> usize,
{
    let mut path = vec![end];
    let mut cursor = end;
    while cursor != start {
        match came_from[index(cursor)] {
            Some(previous) => {
                path.push(previous);
                cursor = previous;
            }
            None => break,
        }
    }
    path.reverse();
    path
}
