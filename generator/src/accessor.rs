// accessor.rs — Device accessor code generation
//
// Emits, for every (registry, access) pair, a chain of name-equality guarded
// blocks resolving a compile-time name literal to a fixed buffer address.
// No hashing happens on the device: each block compares the caller's literal
// against one registered name and, on match, loads or stores through the
// variable's slot.
//
// Preconditions: `layout` was computed from the same registry snapshot that
//                `environment` belongs to, and nothing mutated it since.
// Postconditions: every fill point of the header template is filled.
// Failure modes: template/generator drift → `CurveError::InternalError`.
// Side effects: none.

use std::fmt::Write as _;

use crate::config::{GeneratorConfig, Seatbelts};
use crate::error::Result;
use crate::header::{Access, EnvAccess, FillPoint, HeaderDocument};
use crate::layout::Layout;
use crate::registry::{EnvProperty, EnvironmentRegistry, RegistryKind, VariableProperties};

const SLOT_INDENT: usize = 8;
const ENV_INDENT: usize = 4;
const SEATBELTS_IF: &str = "#if !defined(SEATBELTS) || SEATBELTS\n";

// ── Device faults ───────────────────────────────────────────────────────────

/// A fault raised by generated code when safety checks are compiled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceFault {
    TypeMismatch,
    LengthMismatch,
    /// Carries the name of the index variable reported in the message.
    OutOfBounds(&'static str),
    NotFound,
}

impl DeviceFault {
    /// The fault-reporting statement, e.g.
    /// `DTHROW("Agent variable '%s' type mismatch during getVariable().\n", name);`
    pub fn render(self, fault_macro: &str, subject: &str, during: Option<&str>) -> String {
        let suffix = during.map(|op| format!(" during {}", op)).unwrap_or_default();
        match self {
            DeviceFault::TypeMismatch => format!(
                "{}(\"{} '%s' type mismatch{}.\\n\", name);",
                fault_macro, subject, suffix
            ),
            DeviceFault::LengthMismatch => format!(
                "{}(\"{} '%s' length mismatch{}.\\n\", name);",
                fault_macro, subject, suffix
            ),
            DeviceFault::OutOfBounds(index) => format!(
                "{}(\"{} '%s', index %d is out of bounds{}.\\n\", name, {});",
                fault_macro, subject, suffix, index
            ),
            DeviceFault::NotFound => format!(
                "{}(\"{} '%s' was not found{}.\\n\", name);",
                fault_macro, subject, suffix
            ),
        }
    }
}

/// Subject used in device fault messages.
pub fn device_subject(kind: RegistryKind, array: bool) -> &'static str {
    match (kind, array) {
        (RegistryKind::Agent, false) => "Agent variable",
        (RegistryKind::Agent, true) => "Agent array variable",
        (RegistryKind::MessageIn | RegistryKind::MessageOut, false) => "Message variable",
        (RegistryKind::MessageIn | RegistryKind::MessageOut, true) => "Message array variable",
        (RegistryKind::NewAgent, false) => "New agent variable",
        (RegistryKind::NewAgent, true) => "New agent array variable",
    }
}

/// Quote `s` as a C++ string literal.
pub fn cpp_string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            // Octal escapes stop after three digits; hex escapes would
            // swallow a following hex-digit character.
            c if c.is_ascii_control() => {
                let _ = write!(out, "\\{:03o}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Whether an accessor emits a block for a variable.
pub fn emits_block(access: Access, props: &VariableProperties, vector_types: bool) -> bool {
    let capable = if access.is_get() { props.read } else { props.write };
    let shaped = if access.is_array() {
        props.elements > 1
    } else {
        vector_types || props.elements == 1
    };
    capable && shaped
}

// ── Body builder ────────────────────────────────────────────────────────────

struct Body {
    seatbelts: Seatbelts,
    out: String,
}

impl Body {
    fn new(seatbelts: Seatbelts) -> Self {
        Body {
            seatbelts,
            out: String::new(),
        }
    }

    fn line(&mut self, indent: usize, text: &str) {
        push_line(&mut self.out, indent, text);
    }

    /// Emit `checks` or `fallback` according to the seatbelt policy.
    fn guarded(&mut self, checks: &str, fallback: &str) {
        match self.seatbelts {
            Seatbelts::Enabled => self.out.push_str(checks),
            Seatbelts::Disabled => self.out.push_str(fallback),
            Seatbelts::Preprocessor => {
                self.out.push_str(SEATBELTS_IF);
                self.out.push_str(checks);
                if !fallback.is_empty() {
                    self.out.push_str("#else\n");
                    self.out.push_str(fallback);
                }
                self.out.push_str("#endif\n");
            }
        }
    }

    fn finish(self) -> String {
        self.out
    }
}

fn push_line(out: &mut String, indent: usize, text: &str) {
    out.extend(std::iter::repeat(' ').take(indent));
    out.push_str(text);
    out.push('\n');
}

/// `if (c0) { fault; ret } else if (c1) { ... }` at `indent`.
fn check_chain(indent: usize, checks: &[(String, Option<String>)], ret: &str) -> String {
    let mut out = String::new();
    for (i, (cond, fault)) in checks.iter().enumerate() {
        let head = if i == 0 {
            format!("if ({}) {{", cond)
        } else {
            format!("}} else if ({}) {{", cond)
        };
        push_line(&mut out, indent, &head);
        if let Some(fault) = fault {
            push_line(&mut out, indent + 4, fault);
        }
        push_line(&mut out, indent + 4, ret);
    }
    if !checks.is_empty() {
        push_line(&mut out, indent, "}");
    }
    out
}

// ── Generator ───────────────────────────────────────────────────────────────

/// Produces the text of every fill point from one frozen layout.
pub struct AccessorGenerator<'a> {
    config: &'a GeneratorConfig,
    layout: &'a Layout,
    environment: &'a EnvironmentRegistry,
}

impl<'a> AccessorGenerator<'a> {
    pub fn new(
        config: &'a GeneratorConfig,
        layout: &'a Layout,
        environment: &'a EnvironmentRegistry,
    ) -> Self {
        AccessorGenerator {
            config,
            layout,
            environment,
        }
    }

    /// Fill the whole document: buffer declaration, environment, setter,
    /// then getter passes.
    pub fn generate(&self, doc: &mut HeaderDocument) -> Result<()> {
        for point in FillPoint::all() {
            let text = match point {
                FillPoint::Variables => self.variables(),
                FillPoint::Environment(access) => self.environment_body(access),
                FillPoint::Accessor(kind, access) => self.accessor_body(kind, access),
            };
            doc.fill(point, text)?;
        }
        Ok(())
    }

    /// Declaration of the device buffer.
    pub fn variables(&self) -> String {
        format!(
            "__constant__ char {}[{}];\n",
            self.config.symbol_name, self.layout.offsets.total
        )
    }

    fn fault(&self, fault: DeviceFault, subject: &str, during: Option<&str>) -> String {
        fault.render(&self.config.fault_macro, subject, during)
    }

    fn slot_deref(&self, offset: usize) -> String {
        format!(
            "(*static_cast<T**>(static_cast<void*>({} + {})))",
            self.config.symbol_name, offset
        )
    }

    /// Body of one pointer-slot accessor.
    pub fn accessor_body(&self, kind: RegistryKind, access: Access) -> String {
        let vector = self.config.vector_types;
        let subject = device_subject(kind, access.is_array());
        let op = if access.is_get() { "getVariable()" } else { "setVariable()" };
        let ret = if access.is_get() { "return {};" } else { "return;" };
        let inner = SLOT_INDENT + 4;
        let mut body = Body::new(self.config.seatbelts);

        for entry in self.layout.ordinals.entries(kind) {
            let props = &entry.props;
            if !emits_block(access, props, vector) {
                continue;
            }
            let offset = self.layout.offsets.slot_offset(kind, entry.ordinal);
            body.line(
                SLOT_INDENT,
                &format!("if (names_equal(name, {})) {{", cpp_string_literal(&entry.name)),
            );

            let (checks, fallback, element) = if access.is_array() {
                let bound = format!("array_index >= {}", props.elements);
                let checks = vec![
                    (
                        format!("sizeof(T) != {}", props.type_size),
                        Some(self.fault(DeviceFault::TypeMismatch, subject, Some(op))),
                    ),
                    (
                        format!("N != {}", props.elements),
                        Some(self.fault(DeviceFault::LengthMismatch, subject, Some(op))),
                    ),
                    (
                        bound.clone(),
                        Some(self.fault(DeviceFault::OutOfBounds("array_index"), subject, Some(op))),
                    ),
                ];
                (
                    check_chain(inner, &checks, ret),
                    check_chain(inner, &[(bound, None)], ret),
                    format!("index * {} + array_index", props.elements),
                )
            } else {
                let size = if vector {
                    props.type_size * props.elements as usize
                } else {
                    props.type_size
                };
                let checks = vec![(
                    format!("sizeof(T) != {}", size),
                    Some(self.fault(DeviceFault::TypeMismatch, subject, Some(op))),
                )];
                (check_chain(inner, &checks, ret), String::new(), "index".to_string())
            };
            body.guarded(&checks, &fallback);

            let slot = self.slot_deref(offset);
            if !access.is_get() {
                body.line(inner, &format!("{}[{}] = (T) value;", slot, element));
                body.line(inner, "return;");
            } else if access.is_ldg() && !vector {
                body.line(inner, &format!("return (T) __ldg({} + ({}));", slot, element));
            } else {
                // Vector types cannot all be loaded through __ldg().
                body.line(inner, &format!("return {}[{}];", slot, element));
            }
            body.line(SLOT_INDENT, "}");
        }

        let missing = self.fault(DeviceFault::NotFound, subject, Some(op));
        body.guarded(&format!("{}{}\n", " ".repeat(SLOT_INDENT), missing), "");
        if access.is_get() {
            body.line(SLOT_INDENT, ret);
        }
        body.finish()
    }

    /// Body of one environment accessor.
    pub fn environment_body(&self, access: EnvAccess) -> String {
        let vector = self.config.vector_types;
        let inner = ENV_INDENT + 4;
        let mut body = Body::new(self.config.seatbelts);
        let emits = |p: &EnvProperty| match access {
            EnvAccess::Get => vector || p.elements == 1,
            EnvAccess::GetArray => p.elements > 1,
            EnvAccess::Contains => true,
        };
        let subject = if access == EnvAccess::GetArray {
            "Environment array property"
        } else {
            "Environment property"
        };

        for (name, prop) in self.environment.iter().filter(|(_, p)| emits(*p)) {
            body.line(
                ENV_INDENT,
                &format!("if (names_equal(name, {})) {{", cpp_string_literal(name)),
            );
            let addr = format!("{} + {}", self.config.symbol_name, prop.offset);
            match access {
                EnvAccess::Contains => body.line(inner, "return true;"),
                EnvAccess::Get => {
                    let size = if vector {
                        prop.type_size * prop.elements as usize
                    } else {
                        prop.type_size
                    };
                    let checks = vec![(
                        format!("sizeof(T) != {}", size),
                        Some(self.fault(DeviceFault::TypeMismatch, subject, None)),
                    )];
                    body.guarded(&check_chain(inner, &checks, "return {};"), "");
                    body.line(inner, &format!("return *reinterpret_cast<const T*>({});", addr));
                }
                EnvAccess::GetArray => {
                    let bound = format!("index >= {}", prop.elements);
                    let checks = vec![
                        (
                            format!("sizeof(T) != {}", prop.type_size),
                            Some(self.fault(DeviceFault::TypeMismatch, subject, None)),
                        ),
                        (
                            bound.clone(),
                            Some(self.fault(DeviceFault::OutOfBounds("index"), subject, None)),
                        ),
                    ];
                    body.guarded(
                        &check_chain(inner, &checks, "return {};"),
                        &check_chain(inner, &[(bound, None)], "return {};"),
                    );
                    body.line(inner, &format!("return reinterpret_cast<const T*>({})[index];", addr));
                }
            }
            body.line(ENV_INDENT, "}");
        }

        match access {
            EnvAccess::Contains => body.line(ENV_INDENT, "return false;"),
            _ => {
                let missing = self.fault(DeviceFault::NotFound, subject, None);
                body.guarded(&format!("{}{}\n", " ".repeat(ENV_INDENT), missing), "");
                body.line(ENV_INDENT, "return {};");
            }
        }
        body.finish()
    }
}
