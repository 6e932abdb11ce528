// layout.rs — Host buffer layout and storage
//
// Buffer sections, in order and without padding:
//   [environment: fixed capacity][agent][message out][message in][new agent]
// Each non-environment section holds one pointer-sized slot per registered
// variable, in registry order. Environment properties live inline at their
// registered byte offsets.

use std::collections::BTreeMap;
use std::ptr::NonNull;

use serde::Serialize;

use crate::error::{CurveError, Result};
use crate::registry::{OrdinalTable, Registries, RegistryKind};

/// Size of one variable slot.
pub const POINTER_SIZE: usize = std::mem::size_of::<*const ()>();

/// Byte offset of each buffer section, plus the total buffer size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SectionOffsets {
    pub environment_capacity: usize,
    pub agent: usize,
    pub message_out: usize,
    pub message_in: usize,
    pub new_agent: usize,
    pub total: usize,
}

impl SectionOffsets {
    /// Lay out the sections for the given per-kind entry counts.
    pub fn compute(
        environment_capacity: usize,
        count: impl Fn(RegistryKind) -> usize,
    ) -> Result<Self> {
        if environment_capacity % POINTER_SIZE != 0 {
            return Err(CurveError::InvalidConfig(format!(
                "environment capacity {} is not a multiple of {}",
                environment_capacity, POINTER_SIZE
            )));
        }
        let mut total = environment_capacity;
        let mut next = |kind: RegistryKind| {
            let offset = total;
            total += count(kind) * POINTER_SIZE;
            offset
        };
        let agent = next(RegistryKind::Agent);
        let message_out = next(RegistryKind::MessageOut);
        let message_in = next(RegistryKind::MessageIn);
        let new_agent = next(RegistryKind::NewAgent);
        Ok(SectionOffsets {
            environment_capacity,
            agent,
            message_out,
            message_in,
            new_agent,
            total,
        })
    }

    pub fn section(&self, kind: RegistryKind) -> usize {
        match kind {
            RegistryKind::Agent => self.agent,
            RegistryKind::MessageOut => self.message_out,
            RegistryKind::MessageIn => self.message_in,
            RegistryKind::NewAgent => self.new_agent,
        }
    }

    pub fn slot_offset(&self, kind: RegistryKind, ordinal: usize) -> usize {
        self.section(kind) + ordinal * POINTER_SIZE
    }
}

/// Offsets together with the ordinal table they were computed from.
///
/// Code generation and buffer initialization both read this one value, so
/// they cannot disagree on a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub offsets: SectionOffsets,
    pub ordinals: OrdinalTable,
}

impl Layout {
    pub fn compute(environment_capacity: usize, registries: &Registries) -> Result<Self> {
        for (name, prop) in registries.environment.iter() {
            match prop.end() {
                Some(end) if end <= environment_capacity => {}
                Some(end) => {
                    return Err(CurveError::InvalidConfig(format!(
                        "environment property '{}' spans bytes {}..{}, beyond capacity {}",
                        name, prop.offset, end, environment_capacity
                    )))
                }
                None => {
                    return Err(CurveError::InvalidConfig(format!(
                        "environment property '{}' at offset {} overflows the address space",
                        name, prop.offset
                    )))
                }
            }
        }
        let ordinals = OrdinalTable::build(registries);
        let offsets = SectionOffsets::compute(environment_capacity, |k| ordinals.len(k))?;
        Ok(Layout { offsets, ordinals })
    }

    /// Slot offset of a named variable, if registered.
    pub fn slot_offset(&self, kind: RegistryKind, name: &str) -> Option<usize> {
        self.ordinals
            .ordinal(kind, name)
            .map(|ordinal| self.offsets.slot_offset(kind, ordinal))
    }

    /// Offsets plus every slot, for `--emit layout`.
    pub fn report(&self) -> LayoutReport {
        let slots = RegistryKind::SECTION_ORDER
            .iter()
            .map(|&kind| {
                let entries = self
                    .ordinals
                    .entries(kind)
                    .iter()
                    .map(|e| SlotReport {
                        name: e.name.clone(),
                        ordinal: e.ordinal,
                        offset: self.offsets.slot_offset(kind, e.ordinal),
                    })
                    .collect();
                (kind, entries)
            })
            .collect();
        LayoutReport {
            offsets: self.offsets,
            pointer_size: POINTER_SIZE,
            slots,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotReport {
    pub name: String,
    pub ordinal: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayoutReport {
    pub offsets: SectionOffsets,
    pub pointer_size: usize,
    pub slots: BTreeMap<RegistryKind, Vec<SlotReport>>,
}

/// The single contiguous host buffer mirrored to the device.
#[derive(Debug)]
pub struct HostBuffer {
    bytes: Box<[u8]>,
}

impl HostBuffer {
    /// Allocate a zeroed buffer.
    pub fn allocate(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(CurveError::InvalidOperation(
                "cannot allocate a zero-sized host buffer".into(),
            ));
        }
        Ok(HostBuffer {
            bytes: vec![0u8; size].into_boxed_slice(),
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Overwrite the first `capacity` bytes (the environment region).
    pub fn write_environment(&mut self, source: &[u8], capacity: usize) -> Result<()> {
        if source.len() < capacity {
            return Err(CurveError::InvalidOperation(format!(
                "environment snapshot holds {} bytes, expected at least {}",
                source.len(),
                capacity
            )));
        }
        self.bytes[..capacity].copy_from_slice(&source[..capacity]);
        Ok(())
    }

    fn slot(&self, offset: usize) -> Result<&[u8]> {
        self.bytes
            .get(offset..offset + POINTER_SIZE)
            .ok_or_else(|| CurveError::InternalError(format!("slot offset {} outside buffer", offset)))
    }

    /// Store a device address in the slot at `offset`.
    pub fn write_slot(&mut self, offset: usize, address: usize) -> Result<()> {
        let slot = self
            .bytes
            .get_mut(offset..offset + POINTER_SIZE)
            .ok_or_else(|| CurveError::InternalError(format!("slot offset {} outside buffer", offset)))?;
        slot.copy_from_slice(&address.to_ne_bytes());
        Ok(())
    }

    pub fn read_slot(&self, offset: usize) -> Result<usize> {
        let mut raw = [0u8; POINTER_SIZE];
        raw.copy_from_slice(self.slot(offset)?);
        Ok(usize::from_ne_bytes(raw))
    }

    /// Host address of the slot at `offset`, valid for `POINTER_SIZE` bytes
    /// until the buffer is next borrowed mutably or dropped.
    pub fn slot_ptr(&mut self, offset: usize) -> Result<NonNull<u8>> {
        let slot = self
            .bytes
            .get_mut(offset..offset + POINTER_SIZE)
            .ok_or_else(|| CurveError::InternalError(format!("slot offset {} outside buffer", offset)))?;
        Ok(NonNull::from(slot).cast::<u8>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{EnvPropertyDecl, VariableDecl};

    #[test]
    fn sections_follow_fixed_order() {
        let offsets = SectionOffsets::compute(64, |k| match k {
            RegistryKind::Agent => 2,
            RegistryKind::MessageOut => 1,
            RegistryKind::MessageIn => 0,
            RegistryKind::NewAgent => 3,
        })
        .unwrap();
        assert_eq!(offsets.agent, 64);
        assert_eq!(offsets.message_out, 64 + 2 * POINTER_SIZE);
        assert_eq!(offsets.message_in, 64 + 3 * POINTER_SIZE);
        assert_eq!(offsets.new_agent, 64 + 3 * POINTER_SIZE);
        assert_eq!(offsets.total, 64 + 6 * POINTER_SIZE);
    }

    #[test]
    fn misaligned_capacity_is_rejected() {
        assert!(matches!(
            SectionOffsets::compute(POINTER_SIZE + 3, |_| 0),
            Err(CurveError::InvalidConfig(_))
        ));
    }

    #[test]
    fn environment_property_must_fit() {
        let mut regs = Registries::new();
        regs.environment
            .register(EnvPropertyDecl {
                name: "grid".into(),
                offset: 56,
                type_name: "float".into(),
                type_size: 4,
                elements: 4,
            })
            .unwrap();
        assert!(Layout::compute(64, &regs).is_err());
        assert!(Layout::compute(72, &regs).is_ok());
    }

    #[test]
    fn layout_slot_offsets() {
        let mut regs = Registries::new();
        let agent = regs.get_mut(RegistryKind::Agent);
        agent.register(VariableDecl::of::<f32>("x")).unwrap();
        agent.register(VariableDecl::of::<i32>("id").read_only()).unwrap();
        let layout = Layout::compute(32, &regs).unwrap();
        assert_eq!(layout.slot_offset(RegistryKind::Agent, "id"), Some(32));
        assert_eq!(layout.slot_offset(RegistryKind::Agent, "x"), Some(32 + POINTER_SIZE));
        assert_eq!(layout.slot_offset(RegistryKind::MessageIn, "x"), None);
    }

    #[test]
    fn report_lists_every_slot() {
        let mut regs = Registries::new();
        regs.get_mut(RegistryKind::Agent)
            .register(VariableDecl::of::<f32>("x"))
            .unwrap();
        regs.get_mut(RegistryKind::NewAgent)
            .register(VariableDecl::of::<u32>("id"))
            .unwrap();
        let report = Layout::compute(16, &regs).unwrap().report();
        assert_eq!(report.slots.len(), 4);
        assert!(report.slots[&RegistryKind::MessageIn].is_empty());
        assert_eq!(report.slots[&RegistryKind::NewAgent][0].offset, 16 + POINTER_SIZE);
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"new_agent\":[{\"name\":\"id\""));
    }

    #[test]
    fn slot_pointer_covers_the_whole_slot() {
        let mut buf = HostBuffer::allocate(3 * POINTER_SIZE).unwrap();
        let ptr = buf.slot_ptr(POINTER_SIZE).unwrap();
        let bytes = usize::MAX.to_ne_bytes();
        // SAFETY: the pointer was derived from the full slot slice and the
        // buffer is not touched again until after the copy.
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.as_ptr(), POINTER_SIZE);
        }
        assert_eq!(buf.read_slot(POINTER_SIZE).unwrap(), usize::MAX);
        assert_eq!(buf.read_slot(0).unwrap(), 0);
        assert_eq!(buf.read_slot(2 * POINTER_SIZE).unwrap(), 0);
        assert!(buf.slot_ptr(3 * POINTER_SIZE).is_err());
    }

    #[test]
    fn zero_sized_buffer_is_invalid() {
        assert!(matches!(
            HostBuffer::allocate(0),
            Err(CurveError::InvalidOperation(_))
        ));
    }

    #[test]
    fn slot_write_then_read() {
        let mut buf = HostBuffer::allocate(4 * POINTER_SIZE).unwrap();
        buf.write_slot(2 * POINTER_SIZE, 0xdead_beef).unwrap();
        assert_eq!(buf.read_slot(2 * POINTER_SIZE).unwrap(), 0xdead_beef);
        assert_eq!(buf.read_slot(POINTER_SIZE).unwrap(), 0);
        assert!(buf.write_slot(4 * POINTER_SIZE, 1).is_err());
    }

    #[test]
    fn short_environment_snapshot_is_rejected() {
        let mut buf = HostBuffer::allocate(16).unwrap();
        assert!(buf.write_environment(&[1u8; 4], 8).is_err());
        buf.write_environment(&[7u8; 12], 8).unwrap();
        assert_eq!(&buf.as_bytes()[..8], &[7u8; 8]);
        assert_eq!(&buf.as_bytes()[8..], &[0u8; 8]);
    }
}
