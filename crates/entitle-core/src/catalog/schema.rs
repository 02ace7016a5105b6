//! Catalog schema for catalog.toml
//!
//! ```toml
//! [service.fips]
//! title = "FIPS"
//! requires = ["esm-infra"]
//! incompatible = ["livepatch"]
//! commands = [["apt-get", "install", "-y", "ubuntu-fips"]]
//! reboot_required = true
//! post_enable = ["FIPS support requires a reboot."]
//!
//! [service.fips.variant.updates]
//! commands = [["apt-get", "install", "-y", "ubuntu-fips-updates"]]
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Command line, program first.
pub type Argv = Vec<String>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Catalog {
    #[serde(default)]
    pub service: BTreeMap<String, ServiceDefinition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceDefinition {
    #[serde(default)]
    pub title: Option<String>,

    /// Services enabled first, if not already enabled
    #[serde(default)]
    pub requires: Vec<String>,

    /// Services disabled first, if enabled
    #[serde(default)]
    pub incompatible: Vec<String>,

    #[serde(default)]
    pub commands: Vec<Argv>,

    /// Commands run when another service disables this one
    #[serde(default)]
    pub disable_commands: Vec<Argv>,

    #[serde(default)]
    pub reboot_required: bool,

    /// Strings are shown to the user; other entries are ignored
    #[serde(default)]
    pub post_enable: Vec<serde_json::Value>,

    /// Skip `commands` when access-only activation is requested
    #[serde(default)]
    pub supports_access_only: bool,

    #[serde(default)]
    pub variant: BTreeMap<String, VariantDefinition>,
}

/// Overrides applied when a variant is selected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariantDefinition {
    #[serde(default)]
    pub commands: Option<Vec<Argv>>,

    #[serde(default)]
    pub reboot_required: Option<bool>,

    #[serde(default)]
    pub post_enable: Option<Vec<serde_json::Value>>,
}

/// A service definition with its variant overrides applied.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveDefinition<'a> {
    pub name: &'a str,
    pub definition: &'a ServiceDefinition,
    pub commands: &'a [Argv],
    pub reboot_required: bool,
    pub post_enable: &'a [serde_json::Value],
}

impl Catalog {
    pub fn get(&self, name: &str) -> Option<&ServiceDefinition> {
        self.service.get(name)
    }

    /// Definition of `name` with `variant` applied.
    ///
    /// `None` if the service or the variant does not exist.
    pub fn effective<'a>(
        &'a self,
        name: &str,
        variant: Option<&str>,
    ) -> Option<EffectiveDefinition<'a>> {
        let (name, definition) = self.service.get_key_value(name)?;
        let overrides = match variant {
            Some(variant) => Some(definition.variant.get(variant)?),
            None => None,
        };

        Some(EffectiveDefinition {
            name: name.as_str(),
            definition,
            commands: overrides
                .and_then(|v| v.commands.as_deref())
                .unwrap_or(&definition.commands),
            reboot_required: overrides
                .and_then(|v| v.reboot_required)
                .unwrap_or(definition.reboot_required),
            post_enable: overrides
                .and_then(|v| v.post_enable.as_deref())
                .unwrap_or(&definition.post_enable),
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, definition) in &self.service {
            for required in &definition.requires {
                if required == name {
                    anyhow::bail!("service '{}' requires itself", name);
                }
                if !self.service.contains_key(required) {
                    anyhow::bail!("service '{}' requires unknown service '{}'", name, required);
                }
                if definition.incompatible.contains(required) {
                    anyhow::bail!(
                        "service '{}' both requires and is incompatible with '{}'",
                        name,
                        required
                    );
                }
            }
            for incompatible in &definition.incompatible {
                if incompatible == name {
                    anyhow::bail!("service '{}' is incompatible with itself", name);
                }
                if !self.service.contains_key(incompatible) {
                    anyhow::bail!(
                        "service '{}' is incompatible with unknown service '{}'",
                        name,
                        incompatible
                    );
                }
            }
            let variant_commands = definition
                .variant
                .values()
                .filter_map(|v| v.commands.as_ref())
                .flatten();
            let all_commands = definition
                .commands
                .iter()
                .chain(&definition.disable_commands)
                .chain(variant_commands);
            for argv in all_commands {
                if argv.first().is_none_or(|program| program.trim().is_empty()) {
                    anyhow::bail!("service '{}' has an empty command", name);
                }
            }
        }
        Ok(())
    }
}
