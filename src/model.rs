use anyhow::{Context, Result, anyhow};
use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use crate::diff::Keyed;

// ────────────────────────────────────────────────────────────────────────────
// Identifiers
// ────────────────────────────────────────────────────────────────────────────

/// Stable opaque identifier of a model entity.
///
/// Ids are assigned once at creation and never reused. Model files written by
/// older tools use bare integers for compartment ids, so both JSON numbers and
/// strings are accepted on input; output is always a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawId", into = "String")]
pub struct Id(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(u64),
}

impl From<RawId> for Id {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => Id(s),
            RawId::Number(n) => Id(n.to_string()),
        }
    }
}

impl From<Id> for String {
    fn from(id: Id) -> Self {
        id.0
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id(s.to_string())
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id(s)
    }
}

impl From<u64> for Id {
    fn from(n: u64) -> Self {
        Id(n.to_string())
    }
}

impl Id {
    pub fn new(value: impl Into<String>) -> Self {
        Id(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric suffix of the id (`"f12"` -> 12), used to seed [`IdAllocator`].
    fn numeric_suffix(&self) -> Option<u64> {
        let digits_start = self
            .0
            .char_indices()
            .rev()
            .take_while(|(_, c)| c.is_ascii_digit())
            .last()
            .map(|(i, _)| i)?;
        self.0[digits_start..].parse().ok()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The four kinds of entity held by a [`Model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Compartment,
    Constant,
    Intervention,
    Flow,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityKind::Compartment => "compartment",
            EntityKind::Constant => "constant",
            EntityKind::Intervention => "intervention",
            EntityKind::Flow => "flow",
        };
        f.write_str(s)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Entities
// ────────────────────────────────────────────────────────────────────────────

/// A population compartment. `value` is its initial condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Compartment {
    pub id: Id,
    pub name: String,
    pub value: f64,
}

/// A named model constant (rate, probability, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constant {
    pub id: Id,
    pub name: String,
    pub value: f64,
}

/// A time-varying external input. Its values are supplied at run time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intervention {
    pub id: Id,
    pub name: String,
}

/// A transfer between two compartments with a symbolic rate equation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub id: Id,
    pub source: Id,
    pub target: Id,
    pub equation: String,
}

impl Compartment {
    pub fn new(id: impl Into<Id>, name: impl Into<String>, value: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            value,
        }
    }
}

impl Constant {
    pub fn new(id: impl Into<Id>, name: impl Into<String>, value: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            value,
        }
    }
}

impl Intervention {
    pub fn new(id: impl Into<Id>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl Flow {
    pub fn new(
        id: impl Into<Id>,
        source: impl Into<Id>,
        target: impl Into<Id>,
        equation: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            equation: equation.into(),
        }
    }

    /// True if `compartment` is this flow's source or target.
    pub fn touches(&self, compartment: &Id) -> bool {
        &self.source == compartment || &self.target == compartment
    }
}

/// An entity that owns a symbol name usable inside flow equations.
pub trait Named: Keyed {
    const KIND: EntityKind;
    fn name(&self) -> &str;
}

macro_rules! impl_named {
    ($ty:ty, $kind:expr) => {
        impl Keyed for $ty {
            fn key(&self) -> &Id {
                &self.id
            }
        }

        impl Named for $ty {
            const KIND: EntityKind = $kind;
            fn name(&self) -> &str {
                &self.name
            }
        }
    };
}

impl_named!(Compartment, EntityKind::Compartment);
impl_named!(Constant, EntityKind::Constant);
impl_named!(Intervention, EntityKind::Intervention);

impl Keyed for Flow {
    fn key(&self) -> &Id {
        &self.id
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Model
// ────────────────────────────────────────────────────────────────────────────

/// A complete compartmental model.
///
/// Names are unique across compartments, constants and interventions, and
/// every flow endpoint should name an existing compartment. Both rules are
/// checked by [`crate::validate`], not enforced structurally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Model {
    pub compartments: Vec<Compartment>,
    pub constants: Vec<Constant>,
    pub interventions: Vec<Intervention>,
    pub flows: Vec<Flow>,
}

impl Model {
    /// True when there is nothing to draw: no compartments and no flows.
    pub fn is_graph_empty(&self) -> bool {
        self.compartments.is_empty() && self.flows.is_empty()
    }

    pub fn compartment(&self, id: &Id) -> Option<&Compartment> {
        self.compartments.iter().find(|c| &c.id == id)
    }

    pub fn constant(&self, id: &Id) -> Option<&Constant> {
        self.constants.iter().find(|c| &c.id == id)
    }

    pub fn intervention(&self, id: &Id) -> Option<&Intervention> {
        self.interventions.iter().find(|i| &i.id == id)
    }

    pub fn flow(&self, id: &Id) -> Option<&Flow> {
        self.flows.iter().find(|f| &f.id == id)
    }

    pub fn compartment_by_name(&self, name: &str) -> Option<&Compartment> {
        self.compartments.iter().find(|c| c.name == name)
    }

    pub fn compartment_names(&self) -> Vec<String> {
        self.compartments.iter().map(|c| c.name.clone()).collect()
    }

    pub fn constant_names(&self) -> Vec<String> {
        self.constants.iter().map(|c| c.name.clone()).collect()
    }

    pub fn intervention_names(&self) -> Vec<String> {
        self.interventions.iter().map(|i| i.name.clone()).collect()
    }

    /// Every symbol usable in an equation: compartments, then constants,
    /// then interventions.
    pub fn symbols(&self) -> Vec<String> {
        let mut out = self.compartment_names();
        out.extend(self.constant_names());
        out.extend(self.intervention_names());
        out
    }

    /// Which kind of entity owns `name`, if any.
    pub fn symbol_owner(&self, name: &str) -> Option<(EntityKind, &Id)> {
        if let Some(c) = self.compartments.iter().find(|c| c.name == name) {
            return Some((EntityKind::Compartment, &c.id));
        }
        if let Some(c) = self.constants.iter().find(|c| c.name == name) {
            return Some((EntityKind::Constant, &c.id));
        }
        self.interventions
            .iter()
            .find(|i| i.name == name)
            .map(|i| (EntityKind::Intervention, &i.id))
    }

    /// All ids in the model, in collection order.
    pub fn ids(&self) -> impl Iterator<Item = &Id> {
        self.compartments
            .iter()
            .map(|c| &c.id)
            .chain(self.constants.iter().map(|c| &c.id))
            .chain(self.interventions.iter().map(|i| &i.id))
            .chain(self.flows.iter().map(|f| &f.id))
    }

    pub fn contains_id(&self, id: &Id) -> bool {
        self.ids().any(|existing| existing == id)
    }

    /// Flows that start or end at `compartment`.
    pub fn flows_touching<'a>(&'a self, compartment: &'a Id) -> impl Iterator<Item = &'a Flow> {
        self.flows.iter().filter(move |f| f.touches(compartment))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Id allocation
// ────────────────────────────────────────────────────────────────────────────

/// Hands out fresh ids. A single counter is shared by all entity kinds so an
/// id is never handed out twice, even across kinds.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: u64,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an allocator whose ids cannot collide with any id in `model`.
    pub fn seeded(model: &Model) -> Self {
        let mut alloc = Self::new();
        alloc.observe(model);
        alloc
    }

    /// Move the counter past every numeric id suffix found in `model`.
    /// Suffixes too large to move past are ignored; the counter cannot reach
    /// them.
    pub fn observe(&mut self, model: &Model) {
        for id in model.ids() {
            let Some(suffix) = id.numeric_suffix() else {
                continue;
            };
            match suffix.checked_add(1).filter(|next| *next < u64::MAX) {
                Some(next) => self.next = self.next.max(next),
                None => warn!(%id, "id suffix out of allocator range, ignored"),
            }
        }
    }

    pub fn next(&mut self, prefix: &str) -> Id {
        let id = Id(format!("{}{}", prefix, self.next));
        self.next += 1;
        id
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Model files
// ────────────────────────────────────────────────────────────────────────────

/// Kinds of file the editor exchanges, keyed by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// `.scm`: a bare model.
    Model,
    /// `.scr`: a model together with the run parameters used with it.
    Run,
    /// `.scs`: result values only, no model.
    Values,
}

impl FileKind {
    pub fn from_path(path: &Utf8Path) -> Option<Self> {
        match path.extension()? {
            "scm" => Some(FileKind::Model),
            "scr" => Some(FileKind::Run),
            "scs" => Some(FileKind::Values),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            FileKind::Model => "scm",
            FileKind::Run => "scr",
            FileKind::Values => "scs",
        }
    }
}

#[derive(Deserialize)]
struct RunFile {
    model: Model,
}

/// JSON wrapper used for reading and writing model files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelDoc {
    #[serde(flatten)]
    pub model: Model,
}

impl ModelDoc {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let model: Model = serde_json::from_str(json).context("Parse model JSON")?;
        Ok(Self { model })
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.model)?)
    }

    /// Load the model stored in a `.scm` or `.scr` file. Files without a
    /// known extension are read as bare models.
    pub fn load<P: AsRef<Utf8Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).with_context(|| format!("Open {}", path))?;
        match FileKind::from_path(path) {
            Some(FileKind::Run) => {
                let run: RunFile = serde_json::from_str(&text)
                    .with_context(|| format!("Failed to parse run file {}", path))?;
                Ok(Self { model: run.model })
            }
            Some(FileKind::Values) => Err(anyhow!("{} holds result values, not a model", path)),
            Some(FileKind::Model) | None => {
                Self::from_json_str(&text).with_context(|| format!("Failed to load {}", path))
            }
        }
    }

    pub fn save<P: AsRef<Utf8Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json_string()?).with_context(|| format!("Write {}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_ignores_out_of_range_suffix() {
        let model = Model {
            compartments: vec![
                Compartment::new(format!("c{}", u64::MAX), "S", 1.0),
                Compartment::new("c4", "I", 1.0),
            ],
            ..Default::default()
        };
        let mut ids = IdAllocator::seeded(&model);
        assert_eq!(ids.next("c"), Id::from("c5"));
        assert_eq!(ids.next("f"), Id::from("f6"));
    }

    #[test]
    fn test_id_accepts_numbers_and_strings() {
        let model: Model = serde_json::from_str(
            r#"{"compartments":[{"id":1,"name":"S","value":99}],
                "flows":[{"id":"f1","source":1,"target":"2","equation":"b*S"}]}"#,
        )
        .unwrap();
        assert_eq!(model.compartments[0].id, Id::from("1"));
        assert_eq!(model.flows[0].source, Id::from(1u64));
        assert!(model.constants.is_empty());
        let json = serde_json::to_string(&model.compartments[0]).unwrap();
        assert!(json.contains(r#""id":"1""#));
    }

    #[test]
    fn test_symbols_order() {
        let model = Model {
            compartments: vec![Compartment::new("1", "S", 1.0)],
            constants: vec![Constant::new("2", "beta", 0.3)],
            interventions: vec![Intervention::new("3", "u")],
            flows: vec![],
        };
        assert_eq!(model.symbols(), vec!["S", "beta", "u"]);
        assert_eq!(
            model.symbol_owner("beta"),
            Some((EntityKind::Constant, &Id::from("2")))
        );
        assert_eq!(model.symbol_owner("nope"), None);
    }

    #[test]
    fn test_id_allocator_skips_existing() {
        let model = Model {
            compartments: vec![Compartment::new("c7", "S", 1.0)],
            flows: vec![Flow::new("f12", "c7", "c7", "1")],
            ..Default::default()
        };
        let mut alloc = IdAllocator::seeded(&model);
        assert_eq!(alloc.next("c"), Id::from("c13"));
        assert_eq!(alloc.next("f"), Id::from("f14"));
    }

    #[test]
    fn test_file_kind_from_extension() {
        assert_eq!(FileKind::from_path(Utf8Path::new("a/sir.scm")), Some(FileKind::Model));
        assert_eq!(FileKind::from_path(Utf8Path::new("run.scr")), Some(FileKind::Run));
        assert_eq!(FileKind::from_path(Utf8Path::new("out.scs")), Some(FileKind::Values));
        assert_eq!(FileKind::from_path(Utf8Path::new("x.json")), None);
        assert_eq!(FileKind::Run.extension(), "scr");
    }
}
