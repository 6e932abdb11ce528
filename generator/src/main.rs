use clap::Parser;
use std::io::Write;
use std::path::PathBuf;

use curvegen::manifest::Manifest;
use curvegen::provenance::compute_provenance;
use curvegen::sync::LoopbackModule;
use curvegen::{CurveHost, Seatbelts};

#[derive(Debug, Clone, clap::ValueEnum)]
enum EmitStage {
    Header,
    Layout,
    BuildInfo,
    Buffer,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum SeatbeltsArg {
    Enabled,
    Disabled,
    Preprocessor,
}

impl From<SeatbeltsArg> for Seatbelts {
    fn from(arg: SeatbeltsArg) -> Self {
        match arg {
            SeatbeltsArg::Enabled => Seatbelts::Enabled,
            SeatbeltsArg::Disabled => Seatbelts::Disabled,
            SeatbeltsArg::Preprocessor => Seatbelts::Preprocessor,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "curvegen",
    version,
    about = "Generates name-indexed device accessors and the matching host buffer layout"
)]
struct Cli {
    /// Model manifest (JSON)
    manifest: PathBuf,

    /// Output file path (stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output stage
    #[arg(long, value_enum, default_value_t = EmitStage::Header)]
    emit: EmitStage,

    /// Accessor safety checks (overrides the manifest)
    #[arg(long, value_enum)]
    seatbelts: Option<SeatbeltsArg>,

    /// Allow aggregate vector types through scalar accessors
    #[arg(long)]
    vector_types: bool,

    /// Environment region size in bytes (overrides the manifest)
    #[arg(long)]
    env_capacity: Option<usize>,

    /// Raw environment snapshot copied into the buffer for `--emit buffer`
    #[arg(long)]
    env_snapshot: Option<PathBuf>,

    /// Log generation phases to stderr
    #[arg(long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    curvegen::logging::init(cli.verbose);

    // ── Load manifest ──
    let mut manifest = match Manifest::load(&cli.manifest) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("curvegen: error: {}", e);
            std::process::exit(2);
        }
    };
    if let Some(seatbelts) = cli.seatbelts {
        manifest.config.seatbelts = seatbelts.into();
    }
    if cli.vector_types {
        manifest.config.vector_types = true;
    }
    if let Some(capacity) = cli.env_capacity {
        manifest.config.environment_capacity = capacity;
    }

    let mut host = match manifest.build_host() {
        Ok(h) => h,
        Err(e) => {
            eprintln!("curvegen: error: {}", e);
            std::process::exit(2);
        }
    };

    let snapshot = match &cli.env_snapshot {
        Some(path) => match std::fs::read(path) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                eprintln!("curvegen: error: {}: {}", path.display(), e);
                std::process::exit(2);
            }
        },
        None => None,
    };

    // ── Generate ──
    let output = match emit(&mut host, &cli.emit, snapshot.as_deref()) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("curvegen: error: {}", e);
            std::process::exit(1);
        }
    };

    let written = match &cli.output {
        Some(path) => std::fs::write(path, &output).map_err(|e| (path.display().to_string(), e)),
        None => std::io::stdout()
            .write_all(&output)
            .map_err(|e| ("stdout".to_string(), e)),
    };
    if let Err((target, e)) = written {
        eprintln!("curvegen: error: {}: {}", target, e);
        std::process::exit(1);
    }
}

fn emit(
    host: &mut CurveHost,
    stage: &EmitStage,
    snapshot: Option<&[u8]>,
) -> curvegen::Result<Vec<u8>> {
    match stage {
        EmitStage::Header => Ok(host.dynamic_header()?.into_bytes()),
        EmitStage::Layout => {
            host.compute_layout()?;
            let report = host.layout().map(|l| l.report()).ok_or_else(|| {
                curvegen::CurveError::InternalError("layout missing after computation".into())
            })?;
            let mut json = serde_json::to_string_pretty(&report)
                .map_err(|e| curvegen::CurveError::InternalError(e.to_string()))?;
            json.push('\n');
            Ok(json.into_bytes())
        }
        EmitStage::BuildInfo => {
            host.dynamic_header()?;
            Ok(compute_provenance(host).to_json().into_bytes())
        }
        EmitStage::Buffer => {
            host.dynamic_header()?;
            host.refresh_environment(snapshot)?;
            let mut module = LoopbackModule::new();
            let symbol = host.config().device_symbol();
            module.declare(symbol.as_str(), host.buffer_size());
            host.push_to_device(&mut module)?;
            Ok(module.contents(&symbol).unwrap_or_default().to_vec())
        }
    }
}
