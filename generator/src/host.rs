// host.rs — Generator instance and header assembly state machine
//
// Fresh ──generate_header──▶ Generating ──initialize_buffer──▶ BufferReady
//                                                      ──finalize──▶ Finalized
//
// Registries are open only while Fresh. Generation freezes them into one
// `Layout` (offsets + ordinal table) that the accessor passes and buffer
// initialization both read, so slot numbers agree everywhere.
//
// Preconditions: configuration passes `GeneratorConfig::validate`.
// Postconditions: after `initialize_buffer`, every registered variable has a
//                 host slot inside the single host buffer.
// Failure modes: out-of-sequence calls → `InvalidOperation`; template drift →
//                `InternalError`.
// Side effects: `push_to_device` writes device memory through the module.

use std::ptr::NonNull;

use crate::accessor::AccessorGenerator;
use crate::config::GeneratorConfig;
use crate::error::{CurveError, Result};
use crate::header::HeaderDocument;
use crate::layout::{HostBuffer, Layout, SectionOffsets};
use crate::registry::{EnvPropertyDecl, Registries, RegistryKind, VariableDecl};
use crate::sync::{self, DeviceModule, DeviceSymbol};

/// Where a generator instance is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyState {
    /// Registries open, nothing generated.
    Fresh,
    /// Registries frozen, header text produced.
    Generating,
    /// Host buffer allocated and slots assigned.
    BufferReady,
    /// Header handed off.
    Finalized,
}

/// Owns the registries, the generated header, and the host buffer.
#[derive(Debug)]
pub struct CurveHost {
    config: GeneratorConfig,
    registries: Registries,
    state: AssemblyState,
    layout: Option<Layout>,
    header: Option<String>,
    buffer: Option<HostBuffer>,
}

impl CurveHost {
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        config.validate()?;
        Ok(CurveHost {
            config,
            registries: Registries::new(),
            state: AssemblyState::Fresh,
            layout: None,
            header: None,
            buffer: None,
        })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn state(&self) -> AssemblyState {
        self.state
    }

    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    pub fn layout(&self) -> Option<&Layout> {
        self.layout.as_ref()
    }

    pub fn header(&self) -> Option<&str> {
        self.header.as_deref()
    }

    // ── Registration ────────────────────────────────────────────────────

    fn ensure_open(&self, action: &str) -> Result<()> {
        if self.state != AssemblyState::Fresh {
            return Err(CurveError::InvalidOperation(format!(
                "cannot {} once header generation has started",
                action
            )));
        }
        Ok(())
    }

    pub fn register_variable(&mut self, kind: RegistryKind, decl: VariableDecl) -> Result<()> {
        self.ensure_open("register a variable")?;
        self.registries.get_mut(kind).register(decl)?;
        self.layout = None;
        Ok(())
    }

    pub fn unregister_variable(&mut self, kind: RegistryKind, name: &str) -> Result<()> {
        self.ensure_open("unregister a variable")?;
        self.registries.get_mut(kind).unregister(name)?;
        self.layout = None;
        Ok(())
    }

    pub fn register_env_property(&mut self, decl: EnvPropertyDecl) -> Result<()> {
        self.ensure_open("register an environment property")?;
        self.registries.environment.register(decl)?;
        self.layout = None;
        Ok(())
    }

    pub fn unregister_env_property(&mut self, name: &str) -> Result<()> {
        self.ensure_open("unregister an environment property")?;
        self.registries.environment.unregister(name)?;
        self.layout = None;
        Ok(())
    }

    // ── Layout and generation ───────────────────────────────────────────

    /// Compute section offsets. Repeated calls without registry mutation
    /// return identical offsets.
    pub fn compute_layout(&mut self) -> Result<SectionOffsets> {
        if self.state == AssemblyState::Fresh || self.layout.is_none() {
            let layout = Layout::compute(self.config.environment_capacity, &self.registries)?;
            tracing::info!(
                agent = layout.offsets.agent,
                message_out = layout.offsets.message_out,
                message_in = layout.offsets.message_in,
                new_agent = layout.offsets.new_agent,
                total = layout.offsets.total,
                "computed buffer layout"
            );
            self.layout = Some(layout);
        }
        self.layout
            .as_ref()
            .map(|l| l.offsets)
            .ok_or_else(|| CurveError::InternalError("layout missing after computation".into()))
    }

    /// Freeze the registries and produce the header text.
    pub fn generate_header(&mut self) -> Result<&str> {
        if self.state != AssemblyState::Fresh {
            return Err(CurveError::InvalidOperation(
                "the header has already been generated for this instance".into(),
            ));
        }
        self.compute_layout()?;
        self.state = AssemblyState::Generating;

        let layout = self
            .layout
            .as_ref()
            .ok_or_else(|| CurveError::InternalError("layout missing during generation".into()))?;
        let mut doc = HeaderDocument::new();
        AccessorGenerator::new(&self.config, layout, &self.registries.environment)
            .generate(&mut doc)?;
        let text = doc.render()?;
        tracing::info!(bytes = text.len(), seatbelts = ?self.config.seatbelts, "generated header");
        Ok(self.header.insert(text).as_str())
    }

    /// Allocate the host buffer and assign every variable its slot.
    pub fn initialize_buffer(&mut self) -> Result<()> {
        match self.state {
            AssemblyState::Fresh => {
                return Err(CurveError::InvalidOperation(
                    "the header must be generated before the buffer is initialized".into(),
                ))
            }
            AssemblyState::BufferReady | AssemblyState::Finalized => {
                return Err(CurveError::InvalidOperation(
                    "the host buffer can only be initialized once".into(),
                ))
            }
            AssemblyState::Generating => {}
        }
        if self.buffer.is_some() {
            return Err(CurveError::InvalidOperation(
                "the host buffer can only be initialized once".into(),
            ));
        }
        let layout = self
            .layout
            .as_ref()
            .ok_or_else(|| CurveError::InvalidOperation("layout has not been computed".into()))?;
        let buffer = HostBuffer::allocate(layout.offsets.total)?;

        for kind in RegistryKind::SECTION_ORDER {
            for entry in layout.ordinals.entries(kind) {
                let offset = layout.offsets.slot_offset(kind, entry.ordinal);
                self.registries.get_mut(kind).assign_slot(&entry.name, offset)?;
            }
        }
        tracing::info!(bytes = buffer.len(), "initialized host buffer");
        self.buffer = Some(buffer);
        self.state = AssemblyState::BufferReady;
        Ok(())
    }

    /// Hand the header off. No further changes are expected.
    pub fn finalize(&mut self) -> Result<&str> {
        match self.state {
            AssemblyState::BufferReady | AssemblyState::Finalized => {}
            _ => {
                return Err(CurveError::InvalidOperation(
                    "cannot finalize before the host buffer is initialized".into(),
                ))
            }
        }
        self.state = AssemblyState::Finalized;
        self.header
            .as_deref()
            .ok_or_else(|| CurveError::InternalError("header missing at finalization".into()))
    }

    /// Run the whole chain (layout, generation, buffer) and return the header.
    pub fn dynamic_header(&mut self) -> Result<String> {
        self.generate_header()?;
        self.initialize_buffer()?;
        self.finalize().map(str::to_owned)
    }

    // ── Host buffer access ──────────────────────────────────────────────

    pub fn buffer(&self) -> Option<&[u8]> {
        self.buffer.as_ref().map(HostBuffer::as_bytes)
    }

    /// Total buffer size of the current layout, 0 if none was computed.
    pub fn buffer_size(&self) -> usize {
        self.layout.as_ref().map_or(0, |l| l.offsets.total)
    }

    pub fn symbol_name(&self) -> &str {
        &self.config.symbol_name
    }

    fn buffer_mut(&mut self) -> Result<&mut HostBuffer> {
        self.buffer
            .as_mut()
            .ok_or_else(|| CurveError::InvalidOperation("the host buffer is not initialized".into()))
    }

    fn buffer_ref(&self) -> Result<&HostBuffer> {
        self.buffer
            .as_ref()
            .ok_or_else(|| CurveError::InvalidOperation("the host buffer is not initialized".into()))
    }

    /// Byte offset of a variable's slot; `None` before buffer initialization.
    pub fn slot_offset(&self, kind: RegistryKind, name: &str) -> Result<Option<usize>> {
        self.registries.get(kind).cached_slot(name)
    }

    /// Host address backing a variable's slot; `None` before buffer
    /// initialization. The pointer covers `POINTER_SIZE` bytes and is
    /// invalidated by any later `&mut self` call on this host.
    pub fn slot_pointer(&mut self, kind: RegistryKind, name: &str) -> Result<Option<NonNull<u8>>> {
        match self.slot_offset(kind, name)? {
            Some(offset) => self.buffer_mut()?.slot_ptr(offset).map(Some),
            None => Ok(None),
        }
    }

    fn assigned_slot(&self, kind: RegistryKind, name: &str) -> Result<usize> {
        self.slot_offset(kind, name)?.ok_or_else(|| {
            CurveError::InvalidOperation(format!(
                "{} '{}' has no slot before buffer initialization",
                kind.label(),
                name
            ))
        })
    }

    /// Store the device address of a variable's data in its slot.
    pub fn write_slot(&mut self, kind: RegistryKind, name: &str, address: usize) -> Result<()> {
        let offset = self.assigned_slot(kind, name)?;
        self.buffer_mut()?.write_slot(offset, address)
    }

    pub fn read_slot(&self, kind: RegistryKind, name: &str) -> Result<usize> {
        let offset = self.assigned_slot(kind, name)?;
        self.buffer_ref()?.read_slot(offset)
    }

    // ── Synchronization ─────────────────────────────────────────────────

    /// Overwrite the environment region from an external snapshot. Does
    /// nothing without a snapshot.
    pub fn refresh_environment(&mut self, source: Option<&[u8]>) -> Result<()> {
        let Some(source) = source else {
            tracing::warn!("environment refresh requested without a snapshot");
            return Ok(());
        };
        let capacity = self.config.environment_capacity;
        self.buffer_mut()?.write_environment(source, capacity)?;
        tracing::debug!(bytes = capacity, "refreshed environment region");
        Ok(())
    }

    /// Copy the whole host buffer to the device symbol.
    pub fn push_to_device<M: DeviceModule + ?Sized>(&self, module: &mut M) -> Result<DeviceSymbol> {
        let bytes = self.buffer_ref()?.as_bytes();
        sync::push_buffer(module, &self.config.device_symbol(), bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::POINTER_SIZE;
    use crate::sync::LoopbackModule;

    fn small_host() -> CurveHost {
        let mut host = CurveHost::new(GeneratorConfig {
            environment_capacity: 16,
            ..Default::default()
        })
        .unwrap();
        host.register_variable(RegistryKind::Agent, VariableDecl::of::<f32>("x"))
            .unwrap();
        host.register_variable(RegistryKind::NewAgent, VariableDecl::of::<u32>("id"))
            .unwrap();
        host
    }

    #[test]
    fn lifecycle_states() {
        let mut host = small_host();
        assert_eq!(host.state(), AssemblyState::Fresh);
        host.generate_header().unwrap();
        assert_eq!(host.state(), AssemblyState::Generating);
        host.initialize_buffer().unwrap();
        assert_eq!(host.state(), AssemblyState::BufferReady);
        host.finalize().unwrap();
        assert_eq!(host.state(), AssemblyState::Finalized);
    }

    #[test]
    fn registries_freeze_after_generation() {
        let mut host = small_host();
        host.generate_header().unwrap();
        let err = host
            .register_variable(RegistryKind::Agent, VariableDecl::of::<f32>("y"))
            .unwrap_err();
        assert!(matches!(err, CurveError::InvalidOperation(_)));
        assert!(host.unregister_variable(RegistryKind::Agent, "x").is_err());
    }

    #[test]
    fn generating_twice_is_invalid() {
        let mut host = small_host();
        host.generate_header().unwrap();
        assert!(matches!(
            host.generate_header(),
            Err(CurveError::InvalidOperation(_))
        ));
    }

    #[test]
    fn buffer_before_generation_is_invalid() {
        let mut host = small_host();
        host.compute_layout().unwrap();
        assert!(matches!(
            host.initialize_buffer(),
            Err(CurveError::InvalidOperation(_))
        ));
    }

    #[test]
    fn zero_sized_layout_cannot_be_allocated() {
        let mut host = CurveHost::new(GeneratorConfig {
            environment_capacity: 0,
            ..Default::default()
        })
        .unwrap();
        host.generate_header().unwrap();
        assert!(matches!(
            host.initialize_buffer(),
            Err(CurveError::InvalidOperation(_))
        ));
    }

    #[test]
    fn dynamic_header_runs_the_whole_chain() {
        let mut host = small_host();
        let header = host.dynamic_header().unwrap();
        assert!(header.contains(&format!("__constant__ char curve_rtc_data[{}];", 16 + 2 * POINTER_SIZE)));
        assert_eq!(host.state(), AssemblyState::Finalized);
        assert_eq!(host.slot_offset(RegistryKind::Agent, "x"), Ok(Some(16)));
        assert_eq!(
            host.slot_offset(RegistryKind::NewAgent, "id"),
            Ok(Some(16 + POINTER_SIZE))
        );
    }

    #[test]
    fn slots_hold_device_addresses() {
        let mut host = small_host();
        host.dynamic_header().unwrap();
        host.write_slot(RegistryKind::Agent, "x", 0x7f00_0000).unwrap();
        assert_eq!(host.read_slot(RegistryKind::Agent, "x").unwrap(), 0x7f00_0000);
        assert_eq!(host.read_slot(RegistryKind::NewAgent, "id").unwrap(), 0);
    }

    #[test]
    fn slot_pointer_is_none_before_initialization() {
        let mut host = small_host();
        assert_eq!(host.slot_pointer(RegistryKind::Agent, "x"), Ok(None));
        assert!(host.write_slot(RegistryKind::Agent, "x", 1).is_err());
    }

    #[test]
    fn refresh_environment_copies_capacity_bytes() {
        let mut host = small_host();
        // No snapshot is a no-op even before the buffer exists.
        host.refresh_environment(None).unwrap();
        host.dynamic_header().unwrap();
        host.write_slot(RegistryKind::Agent, "x", 42).unwrap();
        let snapshot: Vec<u8> = (0..32).collect();
        host.refresh_environment(Some(&snapshot)).unwrap();
        let buf = host.buffer().unwrap();
        assert_eq!(&buf[..16], &snapshot[..16]);
        assert_eq!(host.read_slot(RegistryKind::Agent, "x").unwrap(), 42);
        assert!(host.refresh_environment(Some(&snapshot[..8])).is_err());
    }

    #[test]
    fn push_requires_buffer_and_copies_it() {
        let mut host = small_host();
        let mut module = LoopbackModule::new();
        assert!(host.push_to_device(&mut module).is_err());
        host.dynamic_header().unwrap();
        module.declare("curve_rtc::curve_rtc_data", host.buffer_size());
        host.write_slot(RegistryKind::NewAgent, "id", 0xabc).unwrap();
        host.push_to_device(&mut module).unwrap();
        assert_eq!(
            module.contents("curve_rtc::curve_rtc_data").unwrap(),
            host.buffer().unwrap()
        );
    }
}
