//! Built-in plugins.
//!
//! mdcrypt ships no transformations of its own. The built-in plugins only
//! observe the program and report on the configured scope, which makes the
//! scheduler usable from the command line without external plugins.

pub mod inventory;
pub mod report;

pub use inventory::InventoryPlugin;
pub use report::ReportPlugin;

use crate::pipeline::{ConfigurationError, PluginRegistry};

/// Create a registry holding every built-in plugin.
pub fn builtin_registry() -> Result<PluginRegistry, ConfigurationError> {
    let mut registry = PluginRegistry::new();
    registry.register(Box::new(InventoryPlugin))?;
    registry.register(Box::new(ReportPlugin))?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_order() {
        let registry = builtin_registry().unwrap();
        let order: Vec<_> = registry
            .resolve_order()
            .unwrap()
            .iter()
            .map(|p| p.as_str())
            .collect();
        assert_eq!(order, ["inventory", "report"]);
    }
}
