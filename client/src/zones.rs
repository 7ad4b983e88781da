//! Pickup and delivery zone detection
//!
//! Turns continuous vehicle position samples into the two discrete events
//! of a delivery: picking the pizza up and dropping it off. Distances are
//! measured on the horizontal plane only, and both transitions are
//! edge-triggered so sitting inside a zone fires at most once.

use shared::{horizontal_distance, DeliveryTask, Vec3, ZONE_RADIUS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZonePhase {
    NoPizza,
    HasPizza,
    /// Arrival reported; waiting for the server's verdict.
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneEvent {
    PickedUp,
    Delivered,
}

#[derive(Debug, Clone)]
pub struct ZoneDetector {
    pickup: Vec3,
    delivery: Vec3,
    phase: ZonePhase,
    in_pickup_zone: bool,
    in_delivery_zone: bool,
}

impl ZoneDetector {
    pub fn new(task: &DeliveryTask) -> Self {
        Self {
            pickup: task.pickup_location.position,
            delivery: task.delivery_location.position,
            phase: ZonePhase::NoPizza,
            in_pickup_zone: false,
            in_delivery_zone: false,
        }
    }

    /// Feeds one position sample and returns the transition it caused, if any.
    ///
    /// The delivery zone is not examined while the pizza has not been picked
    /// up, nor in the same sample that picked it up.
    pub fn update(&mut self, position: Vec3) -> Option<ZoneEvent> {
        if self.phase == ZonePhase::Resolved {
            return None;
        }

        let was_in_pickup = self.in_pickup_zone;
        self.in_pickup_zone = horizontal_distance(&position, &self.pickup) < ZONE_RADIUS;

        if self.phase == ZonePhase::NoPizza {
            if self.in_pickup_zone && !was_in_pickup {
                self.phase = ZonePhase::HasPizza;
                return Some(ZoneEvent::PickedUp);
            }
            return None;
        }

        let was_in_delivery = self.in_delivery_zone;
        self.in_delivery_zone = horizontal_distance(&position, &self.delivery) < ZONE_RADIUS;

        if self.in_delivery_zone && !was_in_delivery {
            self.phase = ZonePhase::Resolved;
            return Some(ZoneEvent::Delivered);
        }
        None
    }

    /// Where the driver should head next, or None once arrival is reported.
    pub fn target(&self) -> Option<Vec3> {
        match self.phase {
            ZonePhase::NoPizza => Some(self.pickup),
            ZonePhase::HasPizza => Some(self.delivery),
            ZonePhase::Resolved => None,
        }
    }

    pub fn distance_to_target(&self, position: Vec3) -> Option<f32> {
        self.target().map(|target| position.distance(&target))
    }

    pub fn phase(&self) -> ZonePhase {
        self.phase
    }

    pub fn has_pizza(&self) -> bool {
        self.phase == ZonePhase::HasPizza
    }
}
