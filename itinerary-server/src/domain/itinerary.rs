//! Itinerary types.
//!
//! An `Itinerary` is a complete route from origin to destination, made of
//! intra-region paths joined by tunnels.

use super::{Cell, DomainError, Path, Tunnel};

/// A segment of an itinerary: either a path or a tunnel.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Movement within one region
    Path(Path),
    /// A fixed-cost jump between two cells
    Tunnel(Tunnel),
}

impl Segment {
    /// Returns the cell this segment starts at.
    pub fn origin(&self) -> Cell {
        match self {
            Segment::Path(path) => path.origin(),
            Segment::Tunnel(tunnel) => tunnel.origin(),
        }
    }

    /// Returns the cell this segment ends at.
    pub fn destination(&self) -> Cell {
        match self {
            Segment::Path(path) => path.destination(),
            Segment::Tunnel(tunnel) => tunnel.destination(),
        }
    }

    /// Returns the cost of this segment.
    pub fn length(&self) -> f64 {
        match self {
            Segment::Path(path) => path.length(),
            Segment::Tunnel(tunnel) => tunnel.cost(),
        }
    }

    /// Returns the path if this is a path segment.
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Segment::Path(path) => Some(path),
            Segment::Tunnel(_) => None,
        }
    }

    /// Returns the tunnel if this is a tunnel segment.
    pub fn as_tunnel(&self) -> Option<&Tunnel> {
        match self {
            Segment::Path(_) => None,
            Segment::Tunnel(tunnel) => Some(tunnel),
        }
    }
}

/// A complete route, possibly across regions.
///
/// # Invariants
///
/// - At least one segment
/// - Segments alternate Path, Tunnel, Path, ..., Path
/// - Consecutive segments connect (destination of one = origin of next)
#[derive(Debug, Clone, PartialEq)]
pub struct Itinerary {
    segments: Vec<Segment>,
    total_length: f64,
}

impl Itinerary {
    /// Validates segments and builds an itinerary.
    ///
    /// # Errors
    ///
    /// Returns `Err` if:
    /// - Segments list is empty
    /// - Segments don't alternate starting and ending with a path
    /// - Segments don't connect (destination != next origin)
    pub fn new(segments: Vec<Segment>) -> Result<Self, DomainError> {
        if segments.is_empty() {
            return Err(DomainError::EmptyItinerary);
        }

        // Even positions are paths, odd positions tunnels, and the count is odd
        if segments.len() % 2 == 0 {
            return Err(DomainError::BrokenAlternation(segments.len() - 1));
        }
        for (i, segment) in segments.iter().enumerate() {
            let expect_path = i % 2 == 0;
            if matches!(segment, Segment::Path(_)) != expect_path {
                return Err(DomainError::BrokenAlternation(i));
            }
        }

        for window in segments.windows(2) {
            let prev_dest = window[0].destination();
            let next_origin = window[1].origin();
            if prev_dest != next_origin {
                return Err(DomainError::Disconnected {
                    from: prev_dest,
                    to: next_origin,
                });
            }
        }

        let total_length = segments.iter().map(Segment::length).sum();
        Ok(Itinerary {
            segments,
            total_length,
        })
    }

    /// An itinerary consisting of a single path.
    pub fn direct(path: Path) -> Self {
        let total_length = path.length();
        Itinerary {
            segments: vec![Segment::Path(path)],
            total_length,
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns the first cell of the itinerary.
    pub fn origin(&self) -> Cell {
        self.segments[0].origin()
    }

    /// Returns the final cell of the itinerary.
    pub fn destination(&self) -> Cell {
        self.segments[self.segments.len() - 1].destination()
    }

    /// Sum of all path lengths and tunnel costs.
    pub fn total_length(&self) -> f64 {
        self.total_length
    }

    /// Iterates over the path segments.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.segments.iter().filter_map(Segment::as_path)
    }

    /// Iterates over the tunnel segments.
    pub fn tunnels(&self) -> impl Iterator<Item = &Tunnel> {
        self.segments.iter().filter_map(Segment::as_tunnel)
    }

    /// Number of tunnels taken.
    pub fn tunnel_count(&self) -> usize {
        self.segments.len() / 2
    }

    /// Returns true if no tunnel is used.
    pub fn is_direct(&self) -> bool {
        self.segments.len() == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RegionId, Step};
    use crate::modes::ModeType;

    fn cell(x: i32, region: u32) -> Cell {
        Cell::new(x, 0, 0, RegionId(region))
    }

    fn straight(from: i32, to: i32, region: u32) -> Path {
        let mut steps = vec![Step::start(cell(from, region))];
        let dir = if to >= from { 1 } else { -1 };
        let mut x = from;
        while x != to {
            x += dir;
            steps.push(Step::reached(cell(x, region), ModeType::Walk, 1.0));
        }
        Path::new(steps).unwrap()
    }

    #[test]
    fn direct_itinerary() {
        let itinerary = Itinerary::direct(straight(0, 4, 1));
        assert!(itinerary.is_direct());
        assert_eq!(itinerary.total_length(), 4.0);
        assert_eq!(itinerary.origin(), cell(0, 1));
        assert_eq!(itinerary.destination(), cell(4, 1));
    }

    #[test]
    fn path_tunnel_path() {
        let tunnel = Tunnel::new(cell(0, 1), cell(100, 2), 1.0).unwrap();
        let itinerary = Itinerary::new(vec![
            Segment::Path(straight(3, 0, 1)),
            Segment::Tunnel(tunnel),
            Segment::Path(straight(100, 102, 2)),
        ])
        .unwrap();

        assert_eq!(itinerary.tunnel_count(), 1);
        assert_eq!(itinerary.total_length(), 3.0 + 1.0 + 2.0);
        assert_eq!(itinerary.paths().count(), 2);
        assert_eq!(itinerary.destination(), cell(102, 2));
    }

    #[test]
    fn empty_rejected() {
        assert!(matches!(
            Itinerary::new(vec![]),
            Err(DomainError::EmptyItinerary)
        ));
    }

    #[test]
    fn must_end_with_path() {
        let tunnel = Tunnel::new(cell(0, 1), cell(100, 2), 1.0).unwrap();
        let result = Itinerary::new(vec![
            Segment::Path(straight(3, 0, 1)),
            Segment::Tunnel(tunnel),
        ]);
        assert!(matches!(result, Err(DomainError::BrokenAlternation(_))));
    }

    #[test]
    fn must_alternate() {
        let result = Itinerary::new(vec![
            Segment::Path(straight(0, 2, 1)),
            Segment::Path(straight(2, 4, 1)),
            Segment::Path(straight(4, 6, 1)),
        ]);
        assert!(matches!(result, Err(DomainError::BrokenAlternation(1))));
    }

    #[test]
    fn segments_must_connect() {
        let tunnel = Tunnel::new(cell(0, 1), cell(100, 2), 1.0).unwrap();
        let result = Itinerary::new(vec![
            Segment::Path(straight(3, 1, 1)),
            Segment::Tunnel(tunnel),
            Segment::Path(straight(100, 102, 2)),
        ]);
        assert!(matches!(result, Err(DomainError::Disconnected { .. })));
    }
}
