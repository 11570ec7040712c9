use crate::error::LinkError;
use crate::parameter::Parameter;
use crate::toml_helpers::describe_toml_error;
use crate::variant::DeviceVariant;
use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(rename = "variant")]
    pub variants: Vec<VariantRaw>,
}

#[derive(Debug, Deserialize, Clone)]
struct VariantRaw {
    pub model: DeviceVariant,
    pub parameters: Vec<Parameter>,
}

/// Parsed set of built-in parameter defaults, one ordered list per variant.
#[derive(Debug, Clone)]
pub struct VariantCatalog {
    variants: Vec<VariantRaw>,
}

static BUILTIN_CATALOG: OnceCell<Arc<VariantCatalog>> = OnceCell::new();

impl VariantCatalog {
    /// Parse and validate a catalog TOML document.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, LinkError> {
        let cf: CatalogFile = toml::from_str(s)
            .map_err(|e| LinkError::Protocol(describe_toml_error("variants.toml", s, &e)))?;
        let catalog = Self {
            variants: cf.variants,
        };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load and parse a catalog TOML from a filesystem path.
    pub fn from_path(path: &Path) -> Result<Self, LinkError> {
        let s = fs::read_to_string(path)
            .map_err(|e| LinkError::Protocol(format!("read variants toml: {e}")))?;
        s.parse::<Self>()
    }

    /// The catalog compiled into the crate from `src/variants.toml`.
    pub fn builtin() -> Arc<Self> {
        BUILTIN_CATALOG
            .get_or_init(|| match Self::from_str(include_str!("./variants.toml")) {
                Ok(c) => Arc::new(c),
                Err(e) => {
                    log::error!("failed parse embedded variants.toml: {}", e);
                    Arc::new(Self {
                        variants: Vec::new(),
                    })
                }
            })
            .clone()
    }

    /// Ordered default parameters of `variant`, if the catalog defines it.
    #[must_use]
    pub fn defaults(&self, variant: DeviceVariant) -> Option<&[Parameter]> {
        self.variants
            .iter()
            .find(|v| v.model == variant)
            .map(|v| v.parameters.as_slice())
    }

    fn validate(&self) -> Result<(), LinkError> {
        for variant in DeviceVariant::ALL {
            let defs: Vec<_> = self.variants.iter().filter(|v| v.model == variant).collect();
            match defs.as_slice() {
                [] => {
                    return Err(LinkError::Protocol(format!(
                        "variant {variant} missing from catalog"
                    )))
                }
                [one] => {
                    if one.parameters.len() != variant.item_count() {
                        return Err(LinkError::Protocol(format!(
                            "variant {variant}: expected {} parameters, found {}",
                            variant.item_count(),
                            one.parameters.len()
                        )));
                    }
                    for p in &one.parameters {
                        if p.name.trim().is_empty() {
                            return Err(LinkError::Protocol(format!(
                                "variant {variant}: parameter name empty"
                            )));
                        }
                        if p.min > p.max || !p.contains(p.current) {
                            return Err(LinkError::Protocol(format!(
                                "variant {variant}: parameter {name}: default {cur} outside [{min}, {max}]",
                                name = p.name,
                                cur = p.current,
                                min = p.min,
                                max = p.max
                            )));
                        }
                    }
                }
                _ => {
                    return Err(LinkError::Protocol(format!(
                        "duplicate variant in catalog: {variant}"
                    )))
                }
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for VariantCatalog {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str(s)
    }
}

/// Authoritative parameter list of the currently selected controller model.
#[derive(Debug, Clone)]
pub struct DeviceRegistry {
    variant: DeviceVariant,
    parameters: Vec<Parameter>,
    catalog: Arc<VariantCatalog>,
}

impl DeviceRegistry {
    /// Registry for `variant` populated from the built-in defaults.
    #[must_use]
    pub fn new(variant: DeviceVariant) -> Self {
        Self::with_catalog(VariantCatalog::builtin(), variant)
    }

    #[must_use]
    pub fn with_catalog(catalog: Arc<VariantCatalog>, variant: DeviceVariant) -> Self {
        let mut reg = Self {
            variant,
            parameters: Vec::new(),
            catalog,
        };
        reg.load_defaults(variant);
        reg
    }

    /// Registry whose defaults come from a catalog file on disk.
    pub fn with_catalog_path(path: &Path, variant: DeviceVariant) -> Result<Self, LinkError> {
        let catalog = VariantCatalog::from_path(path)?;
        Ok(Self::with_catalog(Arc::new(catalog), variant))
    }

    /// Switch to `variant` and replace the parameter list with its defaults.
    pub fn load_defaults(&mut self, variant: DeviceVariant) {
        self.variant = variant;
        self.parameters.clear();
        match self.catalog.defaults(variant) {
            Some(defs) => self.parameters.extend_from_slice(defs),
            None => log::error!("no defaults for {variant} in catalog"),
        }
        log::debug!(
            "registry: loaded {} defaults for {variant}",
            self.parameters.len()
        );
    }

    #[must_use]
    pub const fn variant(&self) -> DeviceVariant {
        self.variant
    }

    #[must_use]
    pub const fn device_name(&self) -> &'static str {
        self.variant.as_str()
    }

    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Current values in payload order.
    #[must_use]
    pub fn values(&self) -> Vec<u8> {
        self.parameters.iter().map(|p| p.current).collect()
    }

    /// `true` iff `buf` has one byte per parameter and each lies within bounds.
    #[must_use]
    pub fn validate_range(&self, buf: &[u8]) -> bool {
        buf.len() == self.parameters.len()
            && self
                .parameters
                .iter()
                .zip(buf)
                .all(|(p, v)| p.contains(*v))
    }

    /// Overwrite current values positionally. No bounds check; callers run
    /// [`Self::validate_range`] first.
    pub fn apply_values(&mut self, buf: &[u8]) {
        if buf.len() != self.parameters.len() {
            return;
        }
        for (p, v) in self.parameters.iter_mut().zip(buf) {
            p.current = *v;
        }
    }

    /// Commit a verified inbound payload.
    ///
    /// Returns `false` and leaves the registry untouched when `variant` is
    /// not the active one, the length is wrong for that variant, or any
    /// value is out of range.
    pub fn update_for_variant(&mut self, variant: DeviceVariant, buf: &[u8]) -> bool {
        if self.variant != variant {
            log::warn!(
                "registry: update for {variant} rejected, active variant is {}",
                self.variant
            );
            return false;
        }
        if buf.len() != variant.item_count() || buf.len() != self.parameters.len() {
            log::warn!(
                "registry: update for {variant} rejected, {} values for {} items",
                buf.len(),
                variant.item_count()
            );
            return false;
        }
        if !self.validate_range(buf) {
            log::warn!("registry: update for {variant} rejected, value out of range");
            return false;
        }
        self.apply_values(buf);
        true
    }

    /// Bounds-checked edit of a single current value.
    pub fn set_value(&mut self, index: usize, value: u8) -> Result<(), LinkError> {
        let p = self.parameters.get_mut(index).ok_or_else(|| LinkError::Parameter {
            index,
            value,
            reason: "no such parameter".into(),
        })?;
        if !p.contains(value) {
            return Err(LinkError::Parameter {
                index,
                value,
                reason: format!("{} accepts [{}, {}]", p.name, p.min, p.max),
            });
        }
        p.current = value;
        Ok(())
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new(DeviceVariant::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_defaults_have_fixed_counts() {
        let reg = DeviceRegistry::new(DeviceVariant::Ck3864s);
        assert_eq!(reg.parameters().len(), 13);
        assert_eq!(reg.parameters()[0].name, "A-Limit");
        assert_eq!(reg.parameters()[8].min, 5);
        let reg = DeviceRegistry::new(DeviceVariant::Ck3862s);
        assert_eq!(reg.parameters().len(), 8);
        assert_eq!(reg.values(), vec![12, 20, 10, 5, 5, 30, 25, 5]);
    }

    #[test]
    fn load_defaults_discards_previous_values() {
        let mut reg = DeviceRegistry::new(DeviceVariant::Ck3864s);
        reg.set_value(0, 100).expect("in range");
        reg.load_defaults(DeviceVariant::Ck3862s);
        assert_eq!(reg.variant(), DeviceVariant::Ck3862s);
        assert_eq!(reg.parameters()[0].current, 12);
        reg.load_defaults(DeviceVariant::Ck3864s);
        assert_eq!(reg.parameters().len(), 13);
    }

    #[test]
    fn validate_range_checks_length_and_bounds() {
        let reg = DeviceRegistry::new(DeviceVariant::Ck3862s);
        assert!(reg.validate_range(&[1, 1, 1, 1, 1, 1, 1, 1]));
        assert!(reg.validate_range(&[250, 250, 100, 100, 255, 250, 250, 120]));
        assert!(!reg.validate_range(&[0, 1, 1, 1, 1, 1, 1, 1]));
        assert!(!reg.validate_range(&[1, 1, 1, 1, 1, 1, 1, 121]));
        assert!(!reg.validate_range(&[1, 1, 1]));
    }

    #[test]
    fn update_for_variant_is_noop_on_any_out_of_range_byte() {
        let mut reg = DeviceRegistry::new(DeviceVariant::Ck3864s);
        let before = reg.values();
        for idx in 0..13 {
            let mut buf = before.clone();
            buf[idx] = 0; // every minimum is >= 1
            assert!(!reg.update_for_variant(DeviceVariant::Ck3864s, &buf));
            assert_eq!(reg.values(), before);
        }
    }

    #[test]
    fn update_for_variant_rejects_other_variant_and_bad_length() {
        let mut reg = DeviceRegistry::new(DeviceVariant::Ck3862s);
        let before = reg.values();
        assert!(!reg.update_for_variant(DeviceVariant::Ck3864s, &[1; 13]));
        assert!(!reg.update_for_variant(DeviceVariant::Ck3862s, &[1; 7]));
        assert!(!reg.update_for_variant(DeviceVariant::Ck3862s, &[0x10, 0x20]));
        assert_eq!(reg.values(), before);
        assert!(reg.update_for_variant(DeviceVariant::Ck3862s, &[2; 8]));
        assert_eq!(reg.values(), vec![2; 8]);
    }

    #[test]
    fn apply_values_ignores_length_mismatch() {
        let mut reg = DeviceRegistry::new(DeviceVariant::Ck3862s);
        reg.apply_values(&[9; 3]);
        assert_eq!(reg.parameters()[0].current, 12);
    }

    #[test]
    fn set_value_enforces_bounds() {
        let mut reg = DeviceRegistry::new(DeviceVariant::Ck3864s);
        assert!(reg.set_value(8, 4).is_err());
        assert!(reg.set_value(42, 1).is_err());
        reg.set_value(8, 5).expect("min is valid");
        assert_eq!(reg.parameters()[8].current, 5);
    }

    #[test]
    fn catalog_rejects_wrong_item_count() {
        let toml = r#"
[[variant]]
model = "CK3864S"
parameters = [{ name = "A", min = 1, max = 2, default = 1 }]

[[variant]]
model = "CK3862S"
parameters = []
"#;
        let err = toml.parse::<VariantCatalog>().expect_err("bad counts");
        assert!(err.to_string().contains("expected 13 parameters"), "{err}");
    }

    #[test]
    fn catalog_reports_parse_position() {
        let err = "[[variant]]\nmodel = 3\n"
            .parse::<VariantCatalog>()
            .expect_err("bad model");
        assert!(err.to_string().contains("variants.toml parse error"), "{err}");
    }
}
