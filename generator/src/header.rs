// header.rs — Structured header document
//
// The generated header is a fixed template of literal text interleaved with
// typed fill points. Generation fills each point exactly once; rendering
// refuses to produce text while any point is empty. A template/generator
// mismatch surfaces as `CurveError::InternalError` instead of a silently
// unreplaced placeholder.

use std::collections::BTreeMap;

use crate::error::{CurveError, Result};
use crate::registry::RegistryKind;

// ── Fill points ─────────────────────────────────────────────────────────────

/// What a pointer-slot accessor does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Access {
    Get,
    GetLdg,
    GetArray,
    GetArrayLdg,
    Set,
    SetArray,
}

impl Access {
    pub fn is_get(self) -> bool {
        !matches!(self, Access::Set | Access::SetArray)
    }

    pub fn is_array(self) -> bool {
        matches!(self, Access::GetArray | Access::GetArrayLdg | Access::SetArray)
    }

    /// Non-coherent cached read.
    pub fn is_ldg(self) -> bool {
        matches!(self, Access::GetLdg | Access::GetArrayLdg)
    }
}

/// Environment accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EnvAccess {
    Get,
    GetArray,
    Contains,
}

/// A named hole in the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FillPoint {
    /// Declaration of the device buffer.
    Variables,
    Environment(EnvAccess),
    Accessor(RegistryKind, Access),
}

const GETTERS: [Access; 4] = [Access::Get, Access::GetLdg, Access::GetArray, Access::GetArrayLdg];
const SETTERS: [Access; 2] = [Access::Set, Access::SetArray];

impl FillPoint {
    /// Every fill point, in generation order: buffer declaration,
    /// environment, setters, getters.
    pub fn all() -> Vec<FillPoint> {
        let mut points = vec![
            FillPoint::Variables,
            FillPoint::Environment(EnvAccess::Get),
            FillPoint::Environment(EnvAccess::GetArray),
            FillPoint::Environment(EnvAccess::Contains),
        ];
        for kind in [RegistryKind::Agent, RegistryKind::MessageOut, RegistryKind::NewAgent] {
            for access in SETTERS {
                points.push(FillPoint::Accessor(kind, access));
            }
        }
        for kind in [RegistryKind::Agent, RegistryKind::MessageIn] {
            for access in GETTERS {
                points.push(FillPoint::Accessor(kind, access));
            }
        }
        points
    }
}

// ── Template ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub enum Segment {
    Text(&'static str),
    Fill(FillPoint),
}

use self::Access as A;
use crate::registry::RegistryKind as K;
use self::Segment::{Fill, Text};

/// The header template. Function bodies are indented eight spaces inside
/// `struct Curve` and four inside the environment namespace.
pub const TEMPLATE: &[Segment] = &[
    Text(
        r#"// Generated by curvegen. Do not edit.
#ifndef CURVE_RTC_DYNAMIC_H_
#define CURVE_RTC_DYNAMIC_H_

namespace curve_rtc {

template <unsigned int N, unsigned int I> struct NameCompare {
    __device__ __forceinline__ static bool equal(const char(&a)[N], const char(&b)[N]) {
        return a[N - I] == b[N - I] && NameCompare<N, I - 1>::equal(a, b);
    }
};

template <unsigned int N> struct NameCompare<N, 1> {
    __device__ __forceinline__ static bool equal(const char(&a)[N], const char(&b)[N]) {
        return a[N - 1] == b[N - 1];
    }
};

template <unsigned int N>
__device__ __forceinline__ bool names_equal(const char(&a)[N], const char(&b)[N]) {
    return NameCompare<N, N>::equal(a, b);
}

template <unsigned int N, unsigned int M>
__device__ __forceinline__ bool names_equal(const char(&)[N], const char(&)[M]) {
    return false;
}

// Environment bytes, then one pointer slot per variable:
// agent, message output, message input, new agent.
"#,
    ),
    Fill(FillPoint::Variables),
    Text(
        r#"
struct Curve {
    template <typename T, unsigned int M>
    __device__ __forceinline__ static T getAgentVariable(const char(&name)[M], unsigned int index) {
"#,
    ),
    Fill(FillPoint::Accessor(K::Agent, A::Get)),
    Text(
        r#"    }

    template <typename T, unsigned int M>
    __device__ __forceinline__ static T getMessageVariable(const char(&name)[M], unsigned int index) {
"#,
    ),
    Fill(FillPoint::Accessor(K::MessageIn, A::Get)),
    Text(
        r#"    }

    template <typename T, unsigned int M>
    __device__ __forceinline__ static T getAgentVariable_ldg(const char(&name)[M], unsigned int index) {
"#,
    ),
    Fill(FillPoint::Accessor(K::Agent, A::GetLdg)),
    Text(
        r#"    }

    template <typename T, unsigned int M>
    __device__ __forceinline__ static T getMessageVariable_ldg(const char(&name)[M], unsigned int index) {
"#,
    ),
    Fill(FillPoint::Accessor(K::MessageIn, A::GetLdg)),
    Text(
        r#"    }

    template <typename T, unsigned int N, unsigned int M>
    __device__ __forceinline__ static T getAgentArrayVariable(const char(&name)[M], unsigned int index, unsigned int array_index) {
"#,
    ),
    Fill(FillPoint::Accessor(K::Agent, A::GetArray)),
    Text(
        r#"    }

    template <typename T, unsigned int N, unsigned int M>
    __device__ __forceinline__ static T getMessageArrayVariable(const char(&name)[M], unsigned int index, unsigned int array_index) {
"#,
    ),
    Fill(FillPoint::Accessor(K::MessageIn, A::GetArray)),
    Text(
        r#"    }

    template <typename T, unsigned int N, unsigned int M>
    __device__ __forceinline__ static T getAgentArrayVariable_ldg(const char(&name)[M], unsigned int index, unsigned int array_index) {
"#,
    ),
    Fill(FillPoint::Accessor(K::Agent, A::GetArrayLdg)),
    Text(
        r#"    }

    template <typename T, unsigned int N, unsigned int M>
    __device__ __forceinline__ static T getMessageArrayVariable_ldg(const char(&name)[M], unsigned int index, unsigned int array_index) {
"#,
    ),
    Fill(FillPoint::Accessor(K::MessageIn, A::GetArrayLdg)),
    Text(
        r#"    }

    template <typename T, unsigned int M>
    __device__ __forceinline__ static void setAgentVariable(const char(&name)[M], T value, unsigned int index) {
"#,
    ),
    Fill(FillPoint::Accessor(K::Agent, A::Set)),
    Text(
        r#"    }

    template <typename T, unsigned int M>
    __device__ __forceinline__ static void setMessageVariable(const char(&name)[M], T value, unsigned int index) {
"#,
    ),
    Fill(FillPoint::Accessor(K::MessageOut, A::Set)),
    Text(
        r#"    }

    template <typename T, unsigned int M>
    __device__ __forceinline__ static void setNewAgentVariable(const char(&name)[M], T value, unsigned int index) {
"#,
    ),
    Fill(FillPoint::Accessor(K::NewAgent, A::Set)),
    Text(
        r#"    }

    template <typename T, unsigned int N, unsigned int M>
    __device__ __forceinline__ static void setAgentArrayVariable(const char(&name)[M], T value, unsigned int index, unsigned int array_index) {
"#,
    ),
    Fill(FillPoint::Accessor(K::Agent, A::SetArray)),
    Text(
        r#"    }

    template <typename T, unsigned int N, unsigned int M>
    __device__ __forceinline__ static void setMessageArrayVariable(const char(&name)[M], T value, unsigned int index, unsigned int array_index) {
"#,
    ),
    Fill(FillPoint::Accessor(K::MessageOut, A::SetArray)),
    Text(
        r#"    }

    template <typename T, unsigned int N, unsigned int M>
    __device__ __forceinline__ static void setNewAgentArrayVariable(const char(&name)[M], T value, unsigned int index, unsigned int array_index) {
"#,
    ),
    Fill(FillPoint::Accessor(K::NewAgent, A::SetArray)),
    Text(
        r#"    }
};

namespace environment {

template <typename T, unsigned int M>
__device__ __forceinline__ T getProperty(const char(&name)[M]) {
"#,
    ),
    Fill(FillPoint::Environment(EnvAccess::Get)),
    Text(
        r#"}

template <typename T, unsigned int M>
__device__ __forceinline__ T getProperty(const char(&name)[M], unsigned int index) {
"#,
    ),
    Fill(FillPoint::Environment(EnvAccess::GetArray)),
    Text(
        r#"}

template <unsigned int M>
__device__ __forceinline__ bool containsProperty(const char(&name)[M]) {
"#,
    ),
    Fill(FillPoint::Environment(EnvAccess::Contains)),
    Text(
        r#"}

}  // namespace environment
}  // namespace curve_rtc

#endif  // CURVE_RTC_DYNAMIC_H_
"#,
    ),
];

// ── Document ────────────────────────────────────────────────────────────────

/// The template plus the text generated for each fill point.
#[derive(Debug, Default)]
pub struct HeaderDocument {
    fills: BTreeMap<FillPoint, String>,
}

impl HeaderDocument {
    pub fn new() -> Self {
        Self::default()
    }

    fn in_template(point: FillPoint) -> bool {
        TEMPLATE
            .iter()
            .any(|seg| matches!(seg, Fill(p) if *p == point))
    }

    /// Provide the text for `point`.
    pub fn fill(&mut self, point: FillPoint, text: String) -> Result<()> {
        if !Self::in_template(point) {
            return Err(CurveError::InternalError(format!(
                "fill point {:?} does not exist in the header template",
                point
            )));
        }
        if self.fills.contains_key(&point) {
            return Err(CurveError::InternalError(format!(
                "fill point {:?} was filled twice",
                point
            )));
        }
        self.fills.insert(point, text);
        Ok(())
    }

    /// Assemble the final text.
    pub fn render(&self) -> Result<String> {
        let mut out = String::with_capacity(16 * 1024);
        for seg in TEMPLATE {
            match seg {
                Text(text) => out.push_str(text),
                Fill(point) => match self.fills.get(point) {
                    Some(text) => out.push_str(text),
                    None => {
                        return Err(CurveError::InternalError(format!(
                            "fill point {:?} was never filled",
                            point
                        )))
                    }
                },
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_fill_point_appears_exactly_once() {
        for point in FillPoint::all() {
            let n = TEMPLATE
                .iter()
                .filter(|seg| matches!(seg, Fill(p) if *p == point))
                .count();
            assert_eq!(n, 1, "{:?} appears {} times", point, n);
        }
        let total = TEMPLATE.iter().filter(|s| matches!(s, Fill(_))).count();
        assert_eq!(total, FillPoint::all().len());
    }

    #[test]
    fn unfilled_point_is_internal_error() {
        let doc = HeaderDocument::new();
        assert!(matches!(doc.render(), Err(CurveError::InternalError(_))));
    }

    #[test]
    fn foreign_point_is_rejected() {
        let mut doc = HeaderDocument::new();
        // Input messages are read-only on the device; no setter exists.
        let point = FillPoint::Accessor(RegistryKind::MessageIn, Access::Set);
        assert!(matches!(
            doc.fill(point, String::new()),
            Err(CurveError::InternalError(_))
        ));
    }

    #[test]
    fn double_fill_is_rejected() {
        let mut doc = HeaderDocument::new();
        doc.fill(FillPoint::Variables, "a".into()).unwrap();
        assert!(doc.fill(FillPoint::Variables, "b".into()).is_err());
    }

    #[test]
    fn render_places_text_in_order() {
        let mut doc = HeaderDocument::new();
        for (i, point) in FillPoint::all().into_iter().enumerate() {
            doc.fill(point, format!("/*fill {}*/\n", i)).unwrap();
        }
        let text = doc.render().unwrap();
        let vars = text.find("/*fill 0*/").unwrap();
        let curve = text.find("struct Curve").unwrap();
        let env = text.find("namespace environment").unwrap();
        assert!(vars < curve && curve < env);
        assert!(text.ends_with("#endif  // CURVE_RTC_DYNAMIC_H_\n"));
    }
}
