use std::collections::HashSet;

use crate::models::{Booking, Service};

/// Drop every slot already booked for a service on the day `bookings` cover.
/// The remaining slots keep their catalog order.
pub fn open_slots(services: Vec<Service>, bookings: &[Booking]) -> Vec<Service> {
    services
        .into_iter()
        .map(|mut service| {
            let booked: HashSet<&str> = bookings
                .iter()
                .filter(|b| b.treatment == service.name)
                .map(|b| b.slot.as_str())
                .collect();
            service.slots.retain(|slot| !booked.contains(slot.as_str()));
            service
        })
        .collect()
}
