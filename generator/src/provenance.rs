// provenance.rs — Fingerprints for reproducible generation
//
// `layout_fingerprint`: SHA-256 of the registries' canonical compact JSON
//                       followed by the configuration's compact JSON.
// `header_hash`: SHA-256 of the generated header text, once there is one.
//
// Two hosts with equal fingerprints generate byte-identical headers and
// identically laid out buffers.

use std::fmt::Write;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::host::CurveHost;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub layout_fingerprint: [u8; 32],
    pub header_hash: Option<[u8; 32]>,
    pub buffer_size: usize,
    pub generator_version: &'static str,
}

#[derive(Serialize)]
struct BuildInfo<'a> {
    layout_fingerprint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    header_hash: Option<String>,
    buffer_size: usize,
    generator_version: &'a str,
}

impl Provenance {
    pub fn layout_fingerprint_hex(&self) -> String {
        bytes_to_hex(&self.layout_fingerprint)
    }

    pub fn header_hash_hex(&self) -> Option<String> {
        self.header_hash.as_ref().map(bytes_to_hex)
    }

    /// Pretty JSON for `--emit build-info`.
    pub fn to_json(&self) -> String {
        let info = BuildInfo {
            layout_fingerprint: self.layout_fingerprint_hex(),
            header_hash: self.header_hash_hex(),
            buffer_size: self.buffer_size,
            generator_version: self.generator_version,
        };
        let mut out = serde_json::to_string_pretty(&info).unwrap_or_default();
        out.push('\n');
        out
    }
}

fn sha256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&hasher.finalize());
    hash
}

fn bytes_to_hex(bytes: &[u8; 32]) -> String {
    let mut s = String::with_capacity(64);
    for b in bytes {
        let _ = write!(s, "{:02x}", b);
    }
    s
}

pub fn compute_provenance(host: &CurveHost) -> Provenance {
    let registries = host.registries().canonical_json();
    let config = serde_json::to_string(host.config()).unwrap_or_default();
    Provenance {
        layout_fingerprint: sha256(&[registries.as_bytes(), "\n".as_bytes(), config.as_bytes()]),
        header_hash: host.header().map(|h| sha256(&[h.as_bytes()])),
        buffer_size: host.buffer_size(),
        generator_version: env!("CARGO_PKG_VERSION"),
    }
}
