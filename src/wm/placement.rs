//! Placement Module
//!
//! Initial placement for windows that did not ask for a position.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::shared::{Geometry, Point};

/// Placement policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlacementPolicy {
    /// Smart placement (avoid overlapping)
    Smart,
    /// Center placement
    Center,
    /// Mouse placement (at cursor)
    Mouse,
}

/// Everything a placement policy may look at
#[derive(Debug, Clone, Copy)]
pub struct PlacementRequest<'a> {
    /// Current frame geometry; only the size is meaningful
    pub frame: Geometry,
    /// Area the window must end up in
    pub area: Geometry,
    /// Frames of the other visible windows on the target desktop
    pub occupied: &'a [Geometry],
    pub pointer: Option<Point>,
    /// Frame of the main window when placing a transient
    pub parent: Option<Geometry>,
}

pub trait Placement {
    fn place(&self, request: &PlacementRequest<'_>) -> Geometry;
}

/// Placement manager
#[derive(Debug, Clone)]
pub struct PlacementManager {
    pub policy: PlacementPolicy,
}

impl PlacementManager {
    pub fn new(policy: PlacementPolicy) -> Self {
        Self { policy }
    }

    fn place_smart(&self, req: &PlacementRequest<'_>) -> Geometry {
        let area = req.area;
        let frame = req.frame;
        let step_x = (frame.width / 4).max(10) as usize;
        let step_y = (frame.height / 4).max(10) as usize;
        let max_x = area.right() - frame.width as i32;
        let max_y = area.bottom() - frame.height as i32;

        let mut best: Option<Point> = None;
        let mut best_score = i32::MAX;
        for y in (area.y..=max_y.max(area.y)).step_by(step_y) {
            for x in (area.x..=max_x.max(area.x)).step_by(step_x) {
                let candidate = frame.with_position(Point::new(x, y));
                if req.occupied.iter().any(|g| g.intersects(&candidate)) {
                    continue;
                }
                // Prefer top-left positions
                let score = (x - area.x) + (y - area.y);
                if score < best_score {
                    best_score = score;
                    best = Some(Point::new(x, y));
                }
            }
        }

        match best {
            Some(pos) => frame.with_position(pos),
            None => {
                debug!("No free spot for {}x{}, centering", frame.width, frame.height);
                self.place_center(frame, area)
            }
        }
    }

    fn place_center(&self, frame: Geometry, area: Geometry) -> Geometry {
        frame.with_position(Point::new(
            area.x + (area.width as i32 - frame.width as i32) / 2,
            area.y + (area.height as i32 - frame.height as i32) / 2,
        ))
    }

    fn place_mouse(&self, req: &PlacementRequest<'_>) -> Geometry {
        let pointer = req.pointer.unwrap_or_else(|| req.area.center());
        req.frame.with_position(Point::new(
            pointer.x - req.frame.width as i32 / 2,
            pointer.y - req.frame.height as i32 / 2,
        ))
    }

    /// Keep the frame inside `area` where it fits
    fn constrain(frame: Geometry, area: Geometry) -> Geometry {
        let x = frame.x.min(area.right() - frame.width as i32).max(area.x);
        let y = frame.y.min(area.bottom() - frame.height as i32).max(area.y);
        frame.with_position(Point::new(x, y))
    }
}

impl Placement for PlacementManager {
    fn place(&self, req: &PlacementRequest<'_>) -> Geometry {
        let placed = if let Some(parent) = req.parent {
            // Transients go on top of their main window
            self.place_center(req.frame, parent)
        } else {
            match self.policy {
                PlacementPolicy::Smart => self.place_smart(req),
                PlacementPolicy::Center => self.place_center(req.frame, req.area),
                PlacementPolicy::Mouse => self.place_mouse(req),
            }
        };
        Self::constrain(placed, req.area)
    }
}

impl Default for PlacementManager {
    fn default() -> Self {
        Self::new(PlacementPolicy::Smart)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(occupied: &'a [Geometry]) -> PlacementRequest<'a> {
        PlacementRequest {
            frame: Geometry::new(0, 0, 200, 100),
            area: Geometry::new(0, 0, 1000, 800),
            occupied,
            pointer: None,
            parent: None,
        }
    }

    #[test]
    fn test_smart_avoids_overlap() {
        let occupied = [Geometry::new(0, 0, 400, 300)];
        let placed = PlacementManager::new(PlacementPolicy::Smart).place(&request(&occupied));
        assert!(!placed.intersects(&occupied[0]));
        assert_eq!(placed.size(), (Geometry::new(0, 0, 200, 100)).size());
    }

    #[test]
    fn test_center() {
        let placed = PlacementManager::new(PlacementPolicy::Center).place(&request(&[]));
        assert_eq!(placed, Geometry::new(400, 350, 200, 100));
    }

    #[test]
    fn test_transient_centers_on_parent_and_stays_on_screen() {
        let mut req = request(&[]);
        req.parent = Some(Geometry::new(900, 700, 100, 100));
        let placed = PlacementManager::default().place(&req);
        assert_eq!(placed, Geometry::new(800, 700, 200, 100));
    }
}
