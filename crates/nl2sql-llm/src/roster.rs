//! The model roster: interchangeable backends bound to roles.

use std::sync::Arc;

use nl2sql_core::{GenerateError, ModelRole, TextGenerator};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Which roster entry serves which role.
///
/// Indices point into the roster. `generation` is the ordered fallback list
/// used by the query generator; an empty list means "every model, in roster
/// order".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleBindings {
    pub routing: usize,
    pub summary: usize,
    pub reranking: usize,
    pub explanation: usize,
    pub generation: Vec<usize>,
}

impl RoleBindings {
    /// Bind every single-model role to the same index.
    #[must_use]
    pub fn all(index: usize) -> Self {
        Self {
            routing: index,
            summary: index,
            reranking: index,
            explanation: index,
            generation: Vec::new(),
        }
    }

    fn single(&self, role: ModelRole) -> Option<usize> {
        match role {
            ModelRole::Routing => Some(self.routing),
            ModelRole::Summary => Some(self.summary),
            ModelRole::Reranking => Some(self.reranking),
            ModelRole::Explanation => Some(self.explanation),
            ModelRole::Generation => self.generation.first().copied().or(Some(0)),
        }
    }
}

/// Ordered collection of text-generation backends.
#[derive(Clone)]
pub struct ModelRoster {
    models: Vec<Arc<dyn TextGenerator>>,
    bindings: RoleBindings,
}

impl ModelRoster {
    /// Build a roster, checking every binding points at a model.
    pub fn new(
        models: Vec<Arc<dyn TextGenerator>>,
        bindings: RoleBindings,
    ) -> Result<Self, GenerateError> {
        let len = models.len();
        let singles = [
            (ModelRole::Routing, bindings.routing),
            (ModelRole::Summary, bindings.summary),
            (ModelRole::Reranking, bindings.reranking),
            (ModelRole::Explanation, bindings.explanation),
        ];
        for (role, index) in singles {
            if index >= len {
                return Err(GenerateError::NoModel(format!(
                    "{role} (index {index}, roster has {len} models)"
                )));
            }
        }
        if let Some(bad) = bindings.generation.iter().find(|&&i| i >= len) {
            return Err(GenerateError::NoModel(format!(
                "generation (index {bad}, roster has {len} models)"
            )));
        }

        for (i, model) in models.iter().enumerate() {
            info!("Roster model {}: {}", i, model.model_name());
        }
        Ok(Self { models, bindings })
    }

    /// A roster of one model serving every role.
    pub fn single(model: Arc<dyn TextGenerator>) -> Self {
        Self {
            models: vec![model],
            bindings: RoleBindings::all(0),
        }
    }

    /// The model bound to `role`. For [`ModelRole::Generation`] this is the
    /// first model of the fallback chain.
    pub fn for_role(&self, role: ModelRole) -> Result<Arc<dyn TextGenerator>, GenerateError> {
        self.bindings
            .single(role)
            .and_then(|i| self.models.get(i))
            .cloned()
            .ok_or_else(|| GenerateError::NoModel(role.to_string()))
    }

    /// The ordered fallback chain for query generation.
    #[must_use]
    pub fn generation_models(&self) -> Vec<Arc<dyn TextGenerator>> {
        if self.bindings.generation.is_empty() {
            return self.models.clone();
        }
        self.bindings
            .generation
            .iter()
            .filter_map(|&i| self.models.get(i).cloned())
            .collect()
    }

    /// All models, in roster order.
    #[must_use]
    pub fn models(&self) -> &[Arc<dyn TextGenerator>] {
        &self.models
    }

    /// The role bindings.
    #[must_use]
    pub fn bindings(&self) -> &RoleBindings {
        &self.bindings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScriptedGenerator;

    fn model(name: &str) -> Arc<dyn TextGenerator> {
        Arc::new(ScriptedGenerator::new(name, ["ok"]))
    }

    #[test]
    fn test_roles_resolve() {
        let roster = ModelRoster::new(
            vec![model("a"), model("b"), model("c")],
            RoleBindings {
                routing: 1,
                summary: 0,
                reranking: 2,
                explanation: 1,
                generation: vec![2, 0],
            },
        )
        .unwrap();

        assert_eq!(roster.for_role(ModelRole::Routing).unwrap().model_name(), "b");
        assert_eq!(roster.for_role(ModelRole::Reranking).unwrap().model_name(), "c");
        assert_eq!(roster.for_role(ModelRole::Generation).unwrap().model_name(), "c");
        let chain: Vec<_> = roster
            .generation_models()
            .iter()
            .map(|m| m.model_name().to_string())
            .collect();
        assert_eq!(chain, vec!["c", "a"]);
    }

    #[test]
    fn test_empty_generation_list_uses_whole_roster() {
        let roster =
            ModelRoster::new(vec![model("a"), model("b")], RoleBindings::default()).unwrap();
        assert_eq!(roster.generation_models().len(), 2);
        assert_eq!(roster.models().len(), 2);
    }

    #[test]
    fn test_out_of_range_binding_rejected() {
        let err = ModelRoster::new(
            vec![model("a")],
            RoleBindings {
                reranking: 3,
                ..RoleBindings::default()
            },
        )
        .err()
        .unwrap();
        assert!(err.to_string().contains("reranking"));

        let err = ModelRoster::new(
            vec![model("a")],
            RoleBindings {
                generation: vec![0, 1],
                ..RoleBindings::default()
            },
        )
        .err()
        .unwrap();
        assert!(err.to_string().contains("generation"));
    }

    #[test]
    fn test_empty_roster_has_no_models() {
        let err = ModelRoster::new(Vec::new(), RoleBindings::default()).err().unwrap();
        assert!(matches!(err, GenerateError::NoModel(_)));
    }

    #[test]
    fn test_single() {
        let roster = ModelRoster::single(model("solo"));
        assert_eq!(roster.for_role(ModelRole::Explanation).unwrap().model_name(), "solo");
        assert_eq!(roster.bindings(), &RoleBindings::all(0));
    }
}
