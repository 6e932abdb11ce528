// sync.rs — Host → device synchronization seam
//
// The compiled device module is owned by the compilation toolchain; this
// crate only needs to resolve one global symbol inside it and copy bytes
// there. `DeviceModule` is that boundary. `LoopbackModule` implements it in
// host memory for tests and offline inspection.

use std::collections::HashMap;

use crate::error::{CurveError, Result};

/// A resolved global inside a compiled device module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSymbol {
    pub address: u64,
    pub size: usize,
}

/// A loaded device module whose globals can be written from the host.
pub trait DeviceModule {
    /// Look up a global by its fully qualified name.
    fn resolve_symbol(&self, name: &str) -> Result<DeviceSymbol>;

    /// Copy `bytes` to the start of `dst`. Must complete before any
    /// execution that reads `dst` is launched.
    fn copy_to_device(&mut self, dst: DeviceSymbol, bytes: &[u8]) -> Result<()>;
}

/// Resolve `symbol` in `module` and copy all of `bytes` into it.
pub fn push_buffer<M: DeviceModule + ?Sized>(
    module: &mut M,
    symbol: &str,
    bytes: &[u8],
) -> Result<DeviceSymbol> {
    let dst = module.resolve_symbol(symbol)?;
    if dst.size < bytes.len() {
        return Err(CurveError::Device(format!(
            "symbol '{}' holds {} bytes, host buffer has {}",
            symbol,
            dst.size,
            bytes.len()
        )));
    }
    module.copy_to_device(dst, bytes)?;
    tracing::info!(symbol, address = dst.address, bytes = bytes.len(), "pushed buffer to device");
    Ok(dst)
}

/// An in-memory device module.
#[derive(Debug)]
pub struct LoopbackModule {
    symbols: HashMap<String, (u64, Vec<u8>)>,
    next_address: u64,
    copies: usize,
}

impl Default for LoopbackModule {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackModule {
    pub fn new() -> Self {
        LoopbackModule {
            symbols: HashMap::new(),
            next_address: 0x1000,
            copies: 0,
        }
    }

    /// Declare a zero-initialized global of `size` bytes.
    pub fn declare(&mut self, name: impl Into<String>, size: usize) -> DeviceSymbol {
        let address = self.next_address;
        // Keep globals 256-byte aligned like a real module would.
        self.next_address += ((size as u64).max(1) + 255) & !255;
        self.symbols.insert(name.into(), (address, vec![0u8; size]));
        DeviceSymbol { address, size }
    }

    /// Current contents of a global.
    pub fn contents(&self, name: &str) -> Option<&[u8]> {
        self.symbols.get(name).map(|(_, bytes)| bytes.as_slice())
    }

    /// Number of completed host → device copies.
    pub fn copies(&self) -> usize {
        self.copies
    }
}

impl DeviceModule for LoopbackModule {
    fn resolve_symbol(&self, name: &str) -> Result<DeviceSymbol> {
        self.symbols
            .get(name)
            .map(|(address, bytes)| DeviceSymbol {
                address: *address,
                size: bytes.len(),
            })
            .ok_or_else(|| CurveError::Device(format!("symbol '{}' not found in module", name)))
    }

    fn copy_to_device(&mut self, dst: DeviceSymbol, bytes: &[u8]) -> Result<()> {
        let target = self
            .symbols
            .values_mut()
            .find(|(address, _)| *address == dst.address)
            .ok_or_else(|| CurveError::Device(format!("no global at address {:#x}", dst.address)))?;
        let region = target.1.get_mut(..bytes.len()).ok_or_else(|| {
            CurveError::Device(format!("copy of {} bytes overruns global at {:#x}", bytes.len(), dst.address))
        })?;
        region.copy_from_slice(bytes);
        self.copies += 1;
        Ok(())
    }
}
