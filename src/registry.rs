//! Template registry: maps a template id to an extraction schema and
//! its prompt contract.
//!
//! Identifiers are matched by *category*, not equality — operators name
//! template files freely ("GRINDING JULY.xlsx", "grinding-line2.xlsx"),
//! so descriptors carry a substring rule tested against the upper-cased
//! id, tried in priority order. A fallback descriptor is held separately
//! from the ordered list, which makes [`TemplateRegistry::resolve`] total
//! by construction: it can never fail and never be ambiguous.
//!
//! The registry is a plain value carried by the request config. Pure
//! lookup, no state, no side effects.

use crate::prompts;

/// How a descriptor decides whether it applies to a template id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchRule {
    /// Applies when the upper-cased template id contains this substring.
    Contains(String),
}

impl MatchRule {
    fn matches(&self, upper_id: &str) -> bool {
        match self {
            MatchRule::Contains(needle) => upper_id.contains(needle.as_str()),
        }
    }
}

/// One extraction schema: a match rule, the prompt contract that describes
/// the schema to the vision model, and the field names the prompt promises.
///
/// Immutable once constructed; built at process start and shared by every
/// request through the config.
#[derive(Debug, Clone)]
pub struct TemplateDescriptor {
    /// Short schema name, used in logs ("grinding", "mpi", …).
    pub name: String,
    /// Substring rule tested against the upper-cased template id.
    pub rule: MatchRule,
    /// System instruction sent to the vision model.
    pub prompt: String,
    /// Field names the prompt asks for, in column order.
    pub fields: Vec<String>,
}

impl TemplateDescriptor {
    fn new(name: &str, needle: &str, prompt: &str, fields: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            rule: MatchRule::Contains(needle.to_string()),
            prompt: prompt.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }
}

/// Priority-ordered descriptor table with a guaranteed fallback.
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    /// Tried in order; first match wins.
    descriptors: Vec<TemplateDescriptor>,
    /// Applies to any id no earlier descriptor claimed.
    fallback: TemplateDescriptor,
}

impl TemplateRegistry {
    /// The built-in table: grinding, MPI, shot blasting, and the
    /// side-by-side pair schema as the fallback for everything else.
    pub fn builtin() -> Self {
        let pair_fields = ["Die No", "Qty", "Die No.1", "Qty.1"];
        Self {
            descriptors: vec![
                TemplateDescriptor::new(
                    "grinding",
                    "GRINDING",
                    prompts::GRINDING_PROMPT,
                    &[
                        "DATE",
                        "SHIFT",
                        "DIE NO",
                        "NET WT.",
                        "GRINDING QTY",
                        "STATUS",
                        "VENDOR",
                    ],
                ),
                TemplateDescriptor::new(
                    "mpi",
                    "MPI",
                    prompts::MPI_PROMPT,
                    &[
                        "Date",
                        "Shift",
                        "Machine No.",
                        "Operator Name",
                        "Die No.",
                        "RF. NO",
                        "Heat Code",
                        "Head Shot",
                        "Coil Shot",
                        "Total Qty. Checked",
                        "OK",
                        "Rework",
                        "Remark",
                    ],
                ),
                TemplateDescriptor::new(
                    "shot-blasting",
                    "SHOT BLASTING",
                    prompts::PAIR_PROMPT,
                    &pair_fields,
                ),
            ],
            fallback: TemplateDescriptor::new(
                "generic-pair",
                "",
                prompts::PAIR_PROMPT,
                &pair_fields,
            ),
        }
    }

    /// Build a custom registry from an ordered descriptor table plus a
    /// fallback. Callers with their own form library use this instead of
    /// [`TemplateRegistry::builtin`].
    pub fn new(descriptors: Vec<TemplateDescriptor>, fallback: TemplateDescriptor) -> Self {
        Self {
            descriptors,
            fallback,
        }
    }

    /// Resolve a template id to its descriptor.
    ///
    /// Deterministic and total: matching is first-match over the ordered
    /// table, and an unmatched id resolves to the fallback rather than
    /// failing.
    pub fn resolve(&self, template_id: &str) -> &TemplateDescriptor {
        let upper = template_id.to_uppercase();
        self.descriptors
            .iter()
            .find(|d| d.rule.matches(&upper))
            .unwrap_or(&self.fallback)
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grinding_ids_route_to_grinding() {
        let reg = TemplateRegistry::builtin();
        assert_eq!(reg.resolve("GRINDING.xlsx").name, "grinding");
        assert_eq!(reg.resolve("grinding july.xlsx").name, "grinding");
        assert_eq!(reg.resolve("Line2-Grinding-Report.xlsx").name, "grinding");
    }

    #[test]
    fn mpi_ids_route_to_mpi() {
        let reg = TemplateRegistry::builtin();
        let d = reg.resolve("MPI.xlsx");
        assert_eq!(d.name, "mpi");
        assert_eq!(d.fields.len(), 13);
    }

    #[test]
    fn shot_blasting_and_unknown_share_the_pair_schema() {
        let reg = TemplateRegistry::builtin();
        let sb = reg.resolve("SHOT BLASTING.xlsx");
        let unknown = reg.resolve("whatever.xlsx");
        assert_eq!(sb.prompt, unknown.prompt);
        assert_eq!(sb.fields, unknown.fields);
        assert_eq!(unknown.name, "generic-pair");
    }

    #[test]
    fn resolve_is_total() {
        let reg = TemplateRegistry::builtin();
        for id in ["", "x", "ремонт.xlsx", "GRINDING", "a-very-long-name"] {
            // Must not panic and must yield exactly one descriptor.
            let _ = reg.resolve(id);
        }
    }

    #[test]
    fn priority_order_is_respected() {
        // An id containing both GRINDING and MPI hits the earlier descriptor.
        let reg = TemplateRegistry::builtin();
        assert_eq!(reg.resolve("GRINDING-MPI-combined.xlsx").name, "grinding");
    }

    #[test]
    fn custom_registry_uses_caller_table() {
        let custom = TemplateDescriptor {
            name: "audit".into(),
            rule: MatchRule::Contains("AUDIT".into()),
            prompt: "extract the audit table".into(),
            fields: vec!["Item".into(), "Finding".into()],
        };
        let fallback = TemplateDescriptor {
            name: "default".into(),
            rule: MatchRule::Contains(String::new()),
            prompt: "extract the table".into(),
            fields: vec![],
        };
        let reg = TemplateRegistry::new(vec![custom], fallback);
        assert_eq!(reg.resolve("q3-audit.xlsx").name, "audit");
        assert_eq!(reg.resolve("other.xlsx").name, "default");
    }
}
