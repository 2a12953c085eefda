//! Movement patterns of the built-in modes.
//!
//! Each generator pushes the cells reachable from `origin` in one move. The
//! caller turns them into costed moves.

use crate::domain::Cell;
use crate::terrain::{Terrain, TerrainSample};

const CARDINAL: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const DIAGONAL: [(i32, i32); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
const AXES: [(i32, i32, i32); 6] = [
    (1, 0, 0),
    (-1, 0, 0),
    (0, 1, 0),
    (0, -1, 0),
    (0, 0, 1),
    (0, 0, -1),
];

/// Body and head both open.
fn passable(terrain: &dyn Terrain, cell: Cell) -> bool {
    terrain.sample(cell).is_open() && terrain.sample(cell.up()).is_open()
}

/// Passable with something to stand on (or holding a ladder).
fn standable(terrain: &dyn Terrain, cell: Cell) -> bool {
    passable(terrain, cell)
        && (terrain.sample(cell.down()).supports() || terrain.sample(cell) == TerrainSample::Ladder)
}

pub(super) fn walk(origin: Cell, terrain: &dyn Terrain, out: &mut Vec<Cell>) {
    if !standable(terrain, origin) {
        return;
    }

    for (dx, dz) in CARDINAL {
        let target = origin.offset(dx, 0, dz);
        if standable(terrain, target) {
            out.push(target);
            continue;
        }
        // Step down one level
        let below = origin.offset(dx, -1, dz);
        if passable(terrain, target) && standable(terrain, below) {
            out.push(below);
        }
    }

    // Diagonals only when neither adjacent cardinal is blocked
    for (dx, dz) in DIAGONAL {
        let target = origin.offset(dx, 0, dz);
        if passable(terrain, origin.offset(dx, 0, 0))
            && passable(terrain, origin.offset(0, 0, dz))
            && standable(terrain, target)
        {
            out.push(target);
        }
    }
}

pub(super) fn jump(origin: Cell, terrain: &dyn Terrain, out: &mut Vec<Cell>) {
    if !standable(terrain, origin) || !terrain.sample(origin.offset(0, 2, 0)).is_open() {
        return;
    }
    for (dx, dz) in CARDINAL {
        let target = origin.offset(dx, 1, dz);
        if standable(terrain, target) {
            out.push(target);
        }
    }
}

pub(super) fn swim(origin: Cell, terrain: &dyn Terrain, out: &mut Vec<Cell>) {
    let here = terrain.sample(origin);
    if here != TerrainSample::Water && !here.is_open() {
        return;
    }
    for (dx, dy, dz) in AXES {
        let target = origin.offset(dx, dy, dz);
        if terrain.sample(target) == TerrainSample::Water {
            out.push(target);
        } else if here == TerrainSample::Water && standable(terrain, target) {
            // Climbing out onto land
            out.push(target);
        }
    }
}

pub(super) fn climb(origin: Cell, terrain: &dyn Terrain, out: &mut Vec<Cell>) {
    let here = terrain.sample(origin);

    let up = origin.up();
    if here == TerrainSample::Ladder
        && (terrain.sample(up) == TerrainSample::Ladder || passable(terrain, up))
    {
        out.push(up);
    }

    let down = origin.down();
    if here.is_open() && terrain.sample(down) == TerrainSample::Ladder {
        out.push(down);
    }
}

pub(super) fn door(origin: Cell, terrain: &dyn Terrain, out: &mut Vec<Cell>) {
    let here = terrain.sample(origin);
    let in_door = here == TerrainSample::Door;
    if !in_door && !standable(terrain, origin) {
        return;
    }

    for (dx, dz) in CARDINAL {
        let target = origin.offset(dx, 0, dz);
        if terrain.sample(target) == TerrainSample::Door {
            let head = terrain.sample(target.up());
            if (head.is_open() || head == TerrainSample::Door)
                && terrain.sample(target.down()).supports()
            {
                out.push(target);
            }
        } else if in_door && standable(terrain, target) {
            out.push(target);
        }
    }
}

pub(super) fn dig(origin: Cell, terrain: &dyn Terrain, out: &mut Vec<Cell>) {
    let diggable = |s: TerrainSample| s == TerrainSample::Ground || s.is_open();
    for (dx, dz) in CARDINAL {
        let target = origin.offset(dx, 0, dz);
        let body = terrain.sample(target);
        let head = terrain.sample(target.up());
        if diggable(body)
            && diggable(head)
            && (body == TerrainSample::Ground || head == TerrainSample::Ground)
            && terrain.sample(target.down()).supports()
        {
            out.push(target);
        }
    }
}

pub(super) fn boat(origin: Cell, terrain: &dyn Terrain, out: &mut Vec<Cell>) {
    let afloat = |c: Cell| terrain.sample(c).is_open() && terrain.sample(c.down()) == TerrainSample::Water;
    if !afloat(origin) {
        return;
    }
    for (dx, dz) in CARDINAL.into_iter().chain(DIAGONAL) {
        let target = origin.offset(dx, 0, dz);
        if afloat(target) {
            out.push(target);
        }
    }
}
