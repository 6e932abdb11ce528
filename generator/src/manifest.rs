// manifest.rs — JSON model description
//
// A manifest lists the variables a model exposes to device code, grouped by
// registry kind, plus the environment properties and an optional generator
// configuration:
//
//   {
//     "config":      { "environment_capacity": 64, "seatbelts": "disabled" },
//     "agent":       [ { "name": "x", "type": "float", "size": 4 } ],
//     "message_out": [ { "name": "v", "type": "float", "size": 4, "elements": 3 } ],
//     "environment": [ { "name": "g", "offset": 0, "type": "float", "size": 4 } ]
//   }
//
// Failure modes: unreadable file, malformed JSON, or a registration the
// host rejects.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::GeneratorConfig;
use crate::error::CurveError;
use crate::host::CurveHost;
use crate::registry::{EnvPropertyDecl, RegistryKind, VariableDecl};

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("cannot read {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{}: {}", .path.display(), .source)]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Curve(#[from] CurveError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Manifest {
    pub config: GeneratorConfig,
    pub agent: Vec<VariableDecl>,
    pub message_in: Vec<VariableDecl>,
    pub message_out: Vec<VariableDecl>,
    pub new_agent: Vec<VariableDecl>,
    pub environment: Vec<EnvPropertyDecl>,
}

impl Manifest {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let text = std::fs::read_to_string(path).map_err(|e| ManifestError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&text).map_err(|e| ManifestError::Json {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn variables(&self, kind: RegistryKind) -> &[VariableDecl] {
        match kind {
            RegistryKind::Agent => &self.agent,
            RegistryKind::MessageIn => &self.message_in,
            RegistryKind::MessageOut => &self.message_out,
            RegistryKind::NewAgent => &self.new_agent,
        }
    }

    /// Create a fresh host from the manifest's configuration and register
    /// everything it lists.
    pub fn build_host(&self) -> Result<CurveHost, ManifestError> {
        let mut host = CurveHost::new(self.config.clone())?;
        for kind in RegistryKind::SECTION_ORDER {
            for decl in self.variables(kind) {
                host.register_variable(kind, decl.clone())?;
            }
        }
        for decl in &self.environment {
            host.register_env_property(decl.clone())?;
        }
        Ok(host)
    }
}
