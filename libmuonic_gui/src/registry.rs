use fxhash::FxHashMap;

use super::error::RegistryError;
use super::widgets::Widget;

/// A registered widget and the label of its tab
pub struct RegistryEntry {
    pub name: String,
    pub label: String,
    pub widget: Box<dyn Widget>,
}

impl std::fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("name", &self.name)
            .field("label", &self.label)
            .field("active", &self.widget.is_active())
            .finish()
    }
}

/// Name-keyed store of widgets. Iterates in insertion order, which is also the tab order
#[derive(Debug, Default)]
pub struct WidgetRegistry {
    entries: Vec<RegistryEntry>,
    index: FxHashMap<String, usize>,
}

impl WidgetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a widget under a unique name, with a tab labeled `label`.
    /// On error the registry is left untouched
    pub fn add(
        &mut self,
        name: &str,
        label: &str,
        widget: Box<dyn Widget>,
    ) -> Result<(), RegistryError> {
        if self.has(name) {
            return Err(RegistryError::DuplicateName(name.to_string()));
        }
        let capabilities = widget.capabilities();
        if !capabilities.is_complete() {
            return Err(RegistryError::InvalidCapability(
                name.to_string(),
                capabilities.missing().join(", "),
            ));
        }
        self.index.insert(name.to_string(), self.entries.len());
        self.entries.push(RegistryEntry {
            name: name.to_string(),
            label: label.to_string(),
            widget,
        });
        Ok(())
    }

    pub fn has(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&(dyn Widget + 'static)> {
        self.index
            .get(name)
            .map(|idx| self.entries[*idx].widget.as_ref())
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut (dyn Widget + 'static)> {
        match self.index.get(name) {
            Some(idx) => Some(self.entries[*idx].widget.as_mut()),
            None => None,
        }
    }

    /// The widget registered under `name`, if it exists and is a `T`
    pub fn get_as<T: Widget>(&self, name: &str) -> Option<&T> {
        self.get(name).and_then(|w| w.downcast_ref::<T>())
    }

    pub fn get_as_mut<T: Widget>(&mut self, name: &str) -> Option<&mut T> {
        self.get_mut(name).and_then(|w| w.downcast_mut::<T>())
    }

    /// False if there is no such widget, else the widget's own flag
    pub fn is_active(&self, name: &str) -> bool {
        self.get(name).map(|w| w.is_active()).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RegistryEntry> {
        self.entries.iter_mut()
    }

    /// (name, label) pairs in tab order
    pub fn tabs(&self) -> Vec<(&str, &str)> {
        self.entries
            .iter()
            .map(|e| (e.name.as_str(), e.label.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widgets::{Capabilities, DaqWidget, GpsWidget};

    struct Headless;

    impl Widget for Headless {
        fn capabilities(&self) -> Capabilities {
            Capabilities {
                render: false,
                ..Capabilities::FULL
            }
        }

        fn is_active(&self) -> bool {
            true
        }

        fn set_active(&mut self, _active: bool) {}
    }

    #[test]
    fn test_duplicate_name() {
        let mut registry = WidgetRegistry::new();
        registry
            .add("daq", "DAQ Output", Box::new(DaqWidget::default()))
            .unwrap();
        registry
            .add("gps", "GPS Output", Box::new(GpsWidget::default()))
            .unwrap();

        let result = registry.add("daq", "Other", Box::new(GpsWidget::default()));
        assert_eq!(result, Err(RegistryError::DuplicateName(String::from("daq"))));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.tabs(), [("daq", "DAQ Output"), ("gps", "GPS Output")]);
        assert!(registry.get_as::<DaqWidget>("daq").is_some());
        assert!(registry.get_as::<GpsWidget>("daq").is_none());
    }

    #[test]
    fn test_invalid_capability() {
        let mut registry = WidgetRegistry::new();
        let result = registry.add("headless", "Headless", Box::new(Headless));
        assert_eq!(
            result,
            Err(RegistryError::InvalidCapability(
                String::from("headless"),
                String::from("render")
            ))
        );
        assert!(registry.is_empty());
        assert!(!registry.has("headless"));
    }

    #[test]
    fn test_is_active() {
        let mut registry = WidgetRegistry::new();
        registry
            .add("daq", "DAQ Output", Box::new(DaqWidget::default()))
            .unwrap();
        assert!(registry.is_active("daq"));
        assert!(!registry.is_active("rate"));
        if let Some(widget) = registry.get_mut("daq") {
            widget.set_active(false);
        }
        assert!(!registry.is_active("daq"));
        assert!(registry.get("rate").is_none());
    }
}
