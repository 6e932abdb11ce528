// registry.rs — Variable and environment property registries
//
// One uniquely-keyed registry per variable kind plus one for environment
// properties. All registries iterate lexicographically by name (`BTreeMap`),
// so slot numbering never depends on registration order.
//
// Slot ordinals are not recomputed by each consumer: `OrdinalTable::build`
// freezes the registries once per generation cycle and every code-generation
// pass and the buffer initialization read from that single table.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CurveError, Result};
use crate::types::{normalize_type_name, DeviceType, TypeDescriptor};

// ── Kinds ───────────────────────────────────────────────────────────────────

/// The four pointer-slot registries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryKind {
    Agent,
    MessageIn,
    MessageOut,
    NewAgent,
}

impl RegistryKind {
    /// Buffer section order after the environment region.
    pub const SECTION_ORDER: [RegistryKind; 4] = [
        RegistryKind::Agent,
        RegistryKind::MessageOut,
        RegistryKind::MessageIn,
        RegistryKind::NewAgent,
    ];

    /// Noun used in host-side error messages.
    pub fn label(self) -> &'static str {
        match self {
            RegistryKind::Agent => "agent variable",
            RegistryKind::MessageIn => "message input variable",
            RegistryKind::MessageOut => "message output variable",
            RegistryKind::NewAgent => "new agent variable",
        }
    }
}

impl fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RegistryKind::Agent => "agent",
            RegistryKind::MessageIn => "message_in",
            RegistryKind::MessageOut => "message_out",
            RegistryKind::NewAgent => "new_agent",
        };
        f.write_str(s)
    }
}

const ENV_LABEL: &str = "environment property";

// ── Declarations ────────────────────────────────────────────────────────────

fn one() -> u32 {
    1
}

fn yes() -> bool {
    true
}

/// A registration request for a pointer-slot variable.
///
/// Deserializable so model manifests can list variables directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableDecl {
    pub name: String,
    /// Raw, possibly platform-specific type identifier.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Size in bytes of one element.
    #[serde(rename = "size")]
    pub type_size: usize,
    #[serde(default = "one")]
    pub elements: u32,
    #[serde(default = "yes")]
    pub read: bool,
    #[serde(default = "yes")]
    pub write: bool,
}

impl VariableDecl {
    /// Read-write scalar with an explicit raw type identifier.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, type_size: usize) -> Self {
        VariableDecl {
            name: name.into(),
            type_name: type_name.into(),
            type_size,
            elements: 1,
            read: true,
            write: true,
        }
    }

    /// Read-write scalar of a Rust device type.
    pub fn of<T: DeviceType>(name: impl Into<String>) -> Self {
        let desc = TypeDescriptor::of::<T>();
        Self::new(name, desc.name, desc.size)
    }

    pub fn elements(mut self, elements: u32) -> Self {
        self.elements = elements;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read = true;
        self.write = false;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.read = false;
        self.write = true;
        self
    }
}

fn check_shape(what: &'static str, name: &str, type_size: usize, elements: u32) -> Result<()> {
    if name.is_empty() {
        return Err(CurveError::InvalidConfig(format!("{} name must not be empty", what)));
    }
    if type_size == 0 {
        return Err(CurveError::InvalidConfig(format!(
            "{} '{}' has a zero type size",
            what, name
        )));
    }
    if elements == 0 {
        return Err(CurveError::InvalidConfig(format!(
            "{} '{}' has zero elements",
            what, name
        )));
    }
    Ok(())
}

// ── Variable registry ───────────────────────────────────────────────────────

/// Registered properties of one pointer-slot variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableProperties {
    #[serde(rename = "type")]
    pub type_name: String,
    pub type_size: usize,
    pub elements: u32,
    pub read: bool,
    pub write: bool,
    /// Byte offset of this variable's slot in the host buffer. Assigned by
    /// buffer initialization; `None` before that.
    #[serde(skip)]
    pub host_slot: Option<usize>,
}

/// A registry of one variable kind.
#[derive(Debug, Clone)]
pub struct VariableRegistry {
    kind: RegistryKind,
    entries: BTreeMap<String, VariableProperties>,
}

impl VariableRegistry {
    pub fn new(kind: RegistryKind) -> Self {
        VariableRegistry {
            kind,
            entries: BTreeMap::new(),
        }
    }

    /// Insert a variable. Never overwrites an existing entry.
    pub fn register(&mut self, decl: VariableDecl) -> Result<()> {
        let what = self.kind.label();
        check_shape(what, &decl.name, decl.type_size, decl.elements)?;
        if self.entries.contains_key(&decl.name) {
            return Err(CurveError::AlreadyExists {
                what,
                name: decl.name,
            });
        }
        tracing::debug!(
            registry = %self.kind,
            name = %decl.name,
            elements = decl.elements,
            "registered variable"
        );
        self.entries.insert(
            decl.name,
            VariableProperties {
                type_name: normalize_type_name(&decl.type_name),
                type_size: decl.type_size,
                elements: decl.elements,
                read: decl.read,
                write: decl.write,
                host_slot: None,
            },
        );
        Ok(())
    }

    pub fn unregister(&mut self, name: &str) -> Result<VariableProperties> {
        let removed = self.entries.remove(name).ok_or_else(|| CurveError::NotFound {
            what: self.kind.label(),
            name: name.to_string(),
        })?;
        tracing::debug!(registry = %self.kind, name, "unregistered variable");
        Ok(removed)
    }

    pub fn get(&self, name: &str) -> Option<&VariableProperties> {
        self.entries.get(name)
    }

    /// Host slot offset assigned at buffer initialization.
    pub fn cached_slot(&self, name: &str) -> Result<Option<usize>> {
        self.entries
            .get(name)
            .map(|p| p.host_slot)
            .ok_or_else(|| CurveError::NotFound {
                what: self.kind.label(),
                name: name.to_string(),
            })
    }

    pub(crate) fn assign_slot(&mut self, name: &str, offset: usize) -> Result<()> {
        match self.entries.get_mut(name) {
            Some(props) => {
                props.host_slot = Some(offset);
                Ok(())
            }
            None => Err(CurveError::InternalError(format!(
                "{} '{}' vanished between layout and buffer initialization",
                self.kind.label(),
                name
            ))),
        }
    }

    /// Entries in the fixed (lexicographic) order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &VariableProperties)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ── Environment registry ────────────────────────────────────────────────────

/// An environment property stored by value inside the environment region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvPropertyDecl {
    pub name: String,
    /// Byte offset into the environment region.
    pub offset: usize,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(rename = "size")]
    pub type_size: usize,
    #[serde(default = "one")]
    pub elements: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvProperty {
    #[serde(rename = "type")]
    pub type_name: String,
    pub type_size: usize,
    pub elements: u32,
    pub offset: usize,
}

fn extent_end(offset: usize, type_size: usize, elements: u32) -> Option<usize> {
    type_size
        .checked_mul(elements as usize)
        .and_then(|len| offset.checked_add(len))
}

impl EnvProperty {
    /// One past the last byte occupied by the property, `None` if that
    /// overflows the address space.
    pub fn end(&self) -> Option<usize> {
        extent_end(self.offset, self.type_size, self.elements)
    }
}

#[derive(Debug, Clone, Default)]
pub struct EnvironmentRegistry {
    entries: BTreeMap<String, EnvProperty>,
}

impl EnvironmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, decl: EnvPropertyDecl) -> Result<()> {
        check_shape(ENV_LABEL, &decl.name, decl.type_size, decl.elements)?;
        if extent_end(decl.offset, decl.type_size, decl.elements).is_none() {
            return Err(CurveError::InvalidConfig(format!(
                "{} '{}' at offset {} overflows the address space",
                ENV_LABEL, decl.name, decl.offset
            )));
        }
        if self.entries.contains_key(&decl.name) {
            return Err(CurveError::AlreadyExists {
                what: ENV_LABEL,
                name: decl.name,
            });
        }
        tracing::debug!(name = %decl.name, offset = decl.offset, "registered environment property");
        self.entries.insert(
            decl.name,
            EnvProperty {
                type_name: normalize_type_name(&decl.type_name),
                type_size: decl.type_size,
                elements: decl.elements,
                offset: decl.offset,
            },
        );
        Ok(())
    }

    pub fn unregister(&mut self, name: &str) -> Result<EnvProperty> {
        let removed = self.entries.remove(name).ok_or_else(|| CurveError::NotFound {
            what: ENV_LABEL,
            name: name.to_string(),
        })?;
        tracing::debug!(name, "unregistered environment property");
        Ok(removed)
    }

    pub fn get(&self, name: &str) -> Option<&EnvProperty> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EnvProperty)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ── All registries ──────────────────────────────────────────────────────────

/// The five registries owned by one generator instance.
#[derive(Debug, Clone)]
pub struct Registries {
    agent: VariableRegistry,
    message_in: VariableRegistry,
    message_out: VariableRegistry,
    new_agent: VariableRegistry,
    pub environment: EnvironmentRegistry,
}

impl Default for Registries {
    fn default() -> Self {
        Self::new()
    }
}

impl Registries {
    pub fn new() -> Self {
        Registries {
            agent: VariableRegistry::new(RegistryKind::Agent),
            message_in: VariableRegistry::new(RegistryKind::MessageIn),
            message_out: VariableRegistry::new(RegistryKind::MessageOut),
            new_agent: VariableRegistry::new(RegistryKind::NewAgent),
            environment: EnvironmentRegistry::new(),
        }
    }

    pub fn get(&self, kind: RegistryKind) -> &VariableRegistry {
        match kind {
            RegistryKind::Agent => &self.agent,
            RegistryKind::MessageIn => &self.message_in,
            RegistryKind::MessageOut => &self.message_out,
            RegistryKind::NewAgent => &self.new_agent,
        }
    }

    pub fn get_mut(&mut self, kind: RegistryKind) -> &mut VariableRegistry {
        match kind {
            RegistryKind::Agent => &mut self.agent,
            RegistryKind::MessageIn => &mut self.message_in,
            RegistryKind::MessageOut => &mut self.message_out,
            RegistryKind::NewAgent => &mut self.new_agent,
        }
    }

    /// Canonical compact JSON of every registry, for fingerprinting.
    ///
    /// Keys are sorted (all maps are `BTreeMap`) and host slots are
    /// excluded, so the output depends only on what was registered.
    pub fn canonical_json(&self) -> String {
        #[derive(Serialize)]
        struct Canonical<'a> {
            agent: &'a BTreeMap<String, VariableProperties>,
            message_in: &'a BTreeMap<String, VariableProperties>,
            message_out: &'a BTreeMap<String, VariableProperties>,
            new_agent: &'a BTreeMap<String, VariableProperties>,
            environment: &'a BTreeMap<String, EnvProperty>,
        }
        let canonical = Canonical {
            agent: &self.agent.entries,
            message_in: &self.message_in.entries,
            message_out: &self.message_out.entries,
            new_agent: &self.new_agent.entries,
            environment: &self.environment.entries,
        };
        // Plain maps of strings and integers cannot fail to serialize.
        serde_json::to_string(&canonical).unwrap_or_default()
    }
}

// ── Ordinal table ───────────────────────────────────────────────────────────

/// A frozen registry entry with its slot ordinal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrdinalEntry {
    pub name: String,
    pub ordinal: usize,
    pub props: VariableProperties,
}

/// Slot ordinals for every pointer-slot variable, computed once per
/// generation cycle.
///
/// The ordinal advances for every entry, whatever subset a pass emits code
/// for, so all passes agree on each variable's slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrdinalTable {
    sections: BTreeMap<RegistryKind, Vec<OrdinalEntry>>,
}

impl OrdinalTable {
    pub fn build(registries: &Registries) -> Self {
        let sections = RegistryKind::SECTION_ORDER
            .iter()
            .map(|&kind| {
                let entries = registries
                    .get(kind)
                    .iter()
                    .enumerate()
                    .map(|(ordinal, (name, props))| OrdinalEntry {
                        name: name.to_string(),
                        ordinal,
                        props: props.clone(),
                    })
                    .collect();
                (kind, entries)
            })
            .collect();
        OrdinalTable { sections }
    }

    pub fn entries(&self, kind: RegistryKind) -> &[OrdinalEntry] {
        self.sections.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn ordinal(&self, kind: RegistryKind, name: &str) -> Option<usize> {
        self.entries(kind)
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.ordinal)
    }

    pub fn len(&self, kind: RegistryKind) -> usize {
        self.entries(kind).len()
    }
}
