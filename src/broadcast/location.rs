use std::sync::Mutex;

use super::types::LocationSnapshot;

/// Device location capability. Returns `None` while no fix is available.
pub trait LocationSource: Send + Sync {
    fn snapshot(&self) -> Option<LocationSnapshot>;
}

/// Last position pushed by the host, e.g. from a platform location callback.
#[derive(Default)]
pub struct LastKnownLocation {
    current: Mutex<Option<LocationSnapshot>>,
}

impl LastKnownLocation {
    pub fn new(initial: Option<LocationSnapshot>) -> Self {
        Self {
            current: Mutex::new(initial),
        }
    }

    pub fn update(&self, latitude: f64, longitude: f64) {
        if let Ok(mut current) = self.current.lock() {
            *current = Some(LocationSnapshot { latitude, longitude });
        }
    }
}

impl LocationSource for LastKnownLocation {
    fn snapshot(&self) -> Option<LocationSnapshot> {
        self.current.lock().ok().and_then(|c| *c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_replaces_fix() {
        let location = LastKnownLocation::new(None);
        assert_eq!(location.snapshot(), None);

        location.update(59.33, 18.06);
        assert_eq!(
            location.snapshot(),
            Some(LocationSnapshot {
                latitude: 59.33,
                longitude: 18.06
            })
        );
    }
}
