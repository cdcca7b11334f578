//! Curriculum Registry port (driven/secondary port)
//!
//! Read-only queries against the currently-loaded curriculum. Every query
//! here is a synchronous in-memory lookup, unlike `StorageBridge`: the
//! curriculum is assumed to already be loaded into memory by the time the
//! core consults it, so no trait method needs to suspend.

/// The shape a component type's progress record is expected to take.
///
/// Registered once per component type by the embedding application and
/// consulted by Progress Integrity when deciding whether stored progress
/// for a component can be kept as-is.
pub trait ComponentProgressValidator: Send + Sync {
    /// Returns true if `payload` is a structurally valid progress record
    /// for this component type, independent of any particular lesson.
    fn validate_shape(&self, payload: &serde_json::Map<String, serde_json::Value>) -> bool;

    /// Returns true if `payload` is consistent with `lesson_config` - the
    /// parsed configuration of the lesson this component belongs to. This
    /// is the optional, stricter structural check §4.5 allows a component
    /// type to register in addition to the shape check.
    fn validate_against_lesson(
        &self,
        payload: &serde_json::Map<String, serde_json::Value>,
        lesson_config: &serde_json::Value,
    ) -> bool {
        let _ = lesson_config;
        self.validate_shape(payload)
    }

    /// Builds the type-default progress record used when stored progress
    /// for this component is missing or fails validation.
    fn default_progress(&self) -> serde_json::Map<String, serde_json::Value>;
}

/// Port trait for read-only curriculum lookups.
///
/// ## Implementation Notes
///
/// - `component_validator` returns `None` for an unregistered component
///   type; Progress Integrity treats that the same as "type unknown" (I5).
/// - Lesson/domain/entity ids are opaque strings as far as this crate is
///   concerned; the Registry owns their actual shape.
pub trait CurriculumRegistry: Send + Sync {
    fn has_lesson(&self, id: &str) -> bool;
    fn has_domain(&self, id: &str) -> bool;
    fn has_entity(&self, id: &str) -> bool;
    fn get_entity_page_count(&self, id: &str) -> Option<u32>;
    fn has_component(&self, id: &str) -> bool;
    fn get_component_type(&self, id: &str) -> Option<String>;
    fn get_lesson_id_for_component(&self, id: &str) -> Option<String>;
    fn get_all_component_ids(&self) -> Vec<String>;
    fn get_all_lesson_ids(&self) -> Vec<String>;
    fn get_all_domain_ids(&self) -> Vec<String>;

    /// Looks up the registered validator/initializer bundle for a component type.
    fn component_validator(&self, component_type: &str) -> Option<&dyn ComponentProgressValidator>;
}
