//! # Execution Context
//!
//! The one computation environment every ensemble member executes against.
//! A decoder creates it once, wraps it in an [`Arc`](std::sync::Arc), and
//! hands each scorer a non-owning handle during `init`. It is never recreated
//! per decode call.

use candle_core::Device;
use crate::error::{DecodeError, Result};

const BYTES_PER_MB: usize = 1024 * 1024;

/// Device binding plus a fixed workspace reservation.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    device: Device,
    workspace_bytes: usize,
    math_threads: usize,
}

impl ExecutionContext {
    /// A context bound to `device` with no workspace reserved yet.
    pub fn new(device: Device) -> Self {
        Self {
            device,
            workspace_bytes: 0,
            math_threads: 1,
        }
    }

    /// A context bound to the host CPU.
    pub fn cpu() -> Self {
        Self::new(Device::Cpu)
    }

    pub fn reserve_workspace_mb(&mut self, megabytes: usize) {
        self.workspace_bytes = megabytes.saturating_mul(BYTES_PER_MB);
    }

    pub fn set_math_threads(&mut self, threads: usize) {
        self.math_threads = threads.max(1);
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn workspace_bytes(&self) -> usize {
        self.workspace_bytes
    }

    pub fn math_threads(&self) -> usize {
        self.math_threads
    }

    /// Fails with [`DecodeError::WorkspaceExhausted`] when `bytes` does not fit
    /// into the reservation.
    pub fn check_allocation(&self, bytes: usize) -> Result<()> {
        if bytes > self.workspace_bytes {
            return Err(DecodeError::WorkspaceExhausted {
                requested: bytes,
                reserved: self.workspace_bytes,
            });
        }
        Ok(())
    }
}
