use std::collections::HashMap;

use anyhow::{anyhow, Result};

use crate::detect::result::Detection;
use crate::frame::Frame;

use super::backend::DetectorBackend;

/// Registry of detector backends keyed by name.
///
/// The pipeline runs on a single thread, so backends are owned directly.
pub struct BackendRegistry {
    backends: HashMap<String, Box<dyn DetectorBackend>>,
    default_name: Option<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
            default_name: None,
        }
    }

    /// Register a backend. The first registered backend becomes the default.
    pub fn register<B: DetectorBackend + 'static>(&mut self, backend: B) {
        self.register_boxed(Box::new(backend));
    }

    pub fn register_boxed(&mut self, backend: Box<dyn DetectorBackend>) {
        let name = backend.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.backends.insert(name, backend);
    }

    /// Set default backend by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.backends.contains_key(name) {
            return Err(anyhow!("backend '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    pub fn default_name(&self) -> Option<&str> {
        self.default_name.as_deref()
    }

    /// List registered backends, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }

    fn default_backend_mut(&mut self) -> Result<&mut Box<dyn DetectorBackend>> {
        let name = self
            .default_name
            .as_ref()
            .ok_or_else(|| anyhow!("no detector backend registered"))?;
        self.backends
            .get_mut(name)
            .ok_or_else(|| anyhow!("backend '{}' not registered", name))
    }

    /// Warm up the default backend.
    pub fn warm_up(&mut self) -> Result<()> {
        self.default_backend_mut()?.warm_up()
    }

    /// Run detection with the default backend.
    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        self.default_backend_mut()?.detect(frame)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for BackendRegistry {
    fn name(&self) -> &'static str {
        "registry"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        BackendRegistry::detect(self, frame)
    }

    fn warm_up(&mut self) -> Result<()> {
        BackendRegistry::warm_up(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::backends::StubBackend;
    use crate::geometry::Rect;

    struct FailingBackend;

    impl DetectorBackend for FailingBackend {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
            Err(anyhow!("model crashed"))
        }
    }

    #[test]
    fn first_registered_backend_is_default() {
        let mut registry = BackendRegistry::new();
        registry.register(StubBackend::new(vec![Detection::new(Rect::raw(0, 0, 4, 4), 0.9)]));
        registry.register(FailingBackend);

        assert_eq!(registry.default_name(), Some("stub"));
        assert_eq!(registry.list(), vec!["failing", "stub"]);

        let frame = Frame::blank(8, 8, 0);
        assert_eq!(registry.detect(&frame).unwrap().len(), 1);

        registry.set_default("failing").unwrap();
        assert!(registry.detect(&frame).is_err());
    }

    #[test]
    fn unknown_default_is_rejected() {
        let mut registry = BackendRegistry::new();
        assert!(registry.set_default("tract").is_err());
        assert!(registry.detect(&Frame::blank(2, 2, 0)).is_err());
    }
}
