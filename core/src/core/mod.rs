pub mod engine;
pub mod events;
pub mod job;
pub mod result_aggregator;
pub mod state;
pub mod target_manager;

use serde::Serialize;

/// Probe outcome classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Classification {
    Success,
    NonSuccess,
    Unreachable,
}

impl Classification {
    /// `Success` iff the status is 200; no status at all means `Unreachable`.
    pub fn from_status(status: Option<u16>) -> Self {
        match status {
            Some(200) => Classification::Success,
            Some(_) => Classification::NonSuccess,
            None => Classification::Unreachable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_from_status() {
        assert_eq!(Classification::from_status(Some(200)), Classification::Success);
        assert_eq!(Classification::from_status(Some(201)), Classification::NonSuccess);
        assert_eq!(Classification::from_status(Some(404)), Classification::NonSuccess);
        assert_eq!(Classification::from_status(None), Classification::Unreachable);
    }
}
