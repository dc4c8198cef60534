use constellation_types::Type;

/// The ordered input signature of a registered module: argument name to
/// declared type, in the order the host registered them.
pub type InputSignature = Vec<(String, Type)>;

/// What a host exposes for a registered module (spec §6, "Module
/// registration"). The checker and DAG compiler only ever see this shape;
/// the evaluator itself (`inputs -> output`, possibly failing) is an
/// execution-time concern that lives with the runtime, not here.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleSignature {
    pub name: String,
    pub namespace: String,
    pub version: String,
    pub inputs: InputSignature,
    pub output: Type,
}

impl ModuleSignature {
    pub fn qualified_name(&self) -> String {
        format!("{}::{}", self.namespace, self.name)
    }
}

/// Read-only lookup of module signatures by name, as seen by the type
/// checker and the DAG compiler. A host provides a concrete implementation
/// backed by however it stores registrations; this crate only describes
/// the contract.
pub trait ModuleSignatureRegistry {
    fn lookup(&self, name: &str) -> Option<&ModuleSignature>;
}

/// A simple in-memory registry, sufficient for tests and for hosts with a
/// small, static module set.
#[derive(Debug, Default, Clone)]
pub struct StaticModuleRegistry {
    modules: Vec<ModuleSignature>,
}

impl StaticModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, signature: ModuleSignature) -> &mut Self {
        self.modules.push(signature);
        self
    }
}

impl ModuleSignatureRegistry for StaticModuleRegistry {
    fn lookup(&self, name: &str) -> Option<&ModuleSignature> {
        self.modules.iter().find(|m| m.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_registry_looks_up_by_name() {
        let mut registry = StaticModuleRegistry::new();
        registry.register(ModuleSignature {
            name: "FetchCustomer".into(),
            namespace: "crm".into(),
            version: "1.0.0".into(),
            inputs: vec![("id".into(), Type::String)],
            output: Type::product([("name".into(), Type::String)]).unwrap(),
        });
        assert!(registry.lookup("FetchCustomer").is_some());
        assert!(registry.lookup("Missing").is_none());
    }
}
