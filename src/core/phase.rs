//! The phase capability trait and the parameters handed to a phase.

use std::str::FromStr;

use crate::core::definition::{Definition, KindMask};
use crate::core::plugin_id::PluginId;
use crate::core::settings::{PluginParameters, TargetConfiguration};
use crate::pipeline::ExecutionContext;

/// A concrete operation contributed by a plugin, bound to one stage slot.
pub trait Phase {
    /// Name shown in logs and events.
    fn name(&self) -> &str;

    /// Kinds of definitions this phase may touch.
    fn targets(&self) -> KindMask;

    /// Process every definition of the admitted kinds, not only those whose
    /// configuration requests the owning plugin.
    fn process_all(&self) -> bool {
        false
    }

    /// Run the phase over its scoped targets.
    ///
    /// Long-running phases should call
    /// [`ExecutionContext::check_cancellation`] and propagate its error
    /// with `?`.
    fn execute(
        &self,
        ctx: &mut ExecutionContext,
        params: &PhaseParameters<'_>,
    ) -> anyhow::Result<()>;
}

/// Scoped input of one phase invocation.
#[derive(Debug)]
pub struct PhaseParameters<'a> {
    owner: PluginId,
    targets: Vec<Definition>,
    configuration: &'a TargetConfiguration,
}

impl<'a> PhaseParameters<'a> {
    pub(crate) fn new(
        owner: PluginId,
        targets: Vec<Definition>,
        configuration: &'a TargetConfiguration,
    ) -> Self {
        PhaseParameters {
            owner,
            targets,
            configuration,
        }
    }

    /// Plugin owning the running phase.
    pub fn owner(&self) -> PluginId {
        self.owner
    }

    /// Definitions the phase must process, in program order.
    pub fn targets(&self) -> &[Definition] {
        &self.targets
    }

    /// The owning plugin's parameters for `def`, if the plugin is in its scope.
    pub fn parameters(&self, def: &Definition) -> Option<&'a PluginParameters> {
        self.configuration
            .resolve(def.id)
            .and_then(|settings| settings.get(self.owner))
    }

    /// Parse one parameter for `def`, falling back to `default` when it is
    /// absent or does not parse.
    pub fn parameter<T: FromStr>(&self, def: &Definition, key: &str, default: T) -> T {
        self.parameters(def)
            .and_then(|params| params.get(key))
            .and_then(|value| value.parse().ok())
            .unwrap_or(default)
    }
}
