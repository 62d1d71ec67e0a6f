use crate::config::DEFAULT_SOURCE_COMPONENT_TYPE;
use crate::events::models::{EventRecord, EventType};

/// Selects the `FETCH` events emitted by one source component type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    component_type: String,
}

impl Default for EventFilter {
    fn default() -> Self {
        Self::new(DEFAULT_SOURCE_COMPONENT_TYPE)
    }
}

impl EventFilter {
    pub fn new(component_type: impl Into<String>) -> Self {
        Self {
            component_type: component_type.into(),
        }
    }

    pub fn component_type(&self) -> &str {
        &self.component_type
    }

    pub fn matches(&self, event: &EventRecord) -> bool {
        event.component_type == self.component_type && event.event_type == EventType::Fetch
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn ev(component_type: &str, event_type: EventType) -> EventRecord {
        EventRecord::new(0, component_type, event_type, BTreeMap::new())
    }

    #[test]
    fn includes_only_fetch_events_from_the_source_component() {
        let filter = EventFilter::default();
        assert!(filter.matches(&ev("FetchS3Object", EventType::Fetch)));

        assert!(!filter.matches(&ev("FetchS3Object", EventType::Receive)));
        assert!(!filter.matches(&ev("FetchS3Object", EventType::Unknown)));
        assert!(!filter.matches(&ev("FetchSFTP", EventType::Fetch)));
        assert!(!filter.matches(&ev("fetchs3object", EventType::Fetch)));
        assert!(!filter.matches(&ev("", EventType::Fetch)));
    }

    #[test]
    fn component_type_is_configurable() {
        let filter = EventFilter::new("FetchGCSObject");
        assert!(filter.matches(&ev("FetchGCSObject", EventType::Fetch)));
        assert!(!filter.matches(&ev("FetchS3Object", EventType::Fetch)));
    }
}
