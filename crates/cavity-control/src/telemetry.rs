// ─────────────────────────────────────────────────────────────────────
// SCPN Cavity Sim — Circular Telemetry Buffer
// © 1998–2026 Miroslav Šotek. All rights reserved.
// ─────────────────────────────────────────────────────────────────────
//! Fixed-capacity ring buffers for per-step cavity telemetry.
//! Allocation happens once at construction; pushes never allocate.

use crate::context::StepRecord;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// A fixed-size circular buffer for a single telemetry channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircularChannel<T> {
    data: Vec<T>,
    capacity: usize,
    head: usize,
    count: usize,
}

impl<T: Copy + Default> CircularChannel<T> {
    /// Capacity is at least one sample.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            data: vec![T::default(); capacity],
            capacity,
            head: 0,
            count: 0,
        }
    }

    pub fn push(&mut self, value: T) {
        self.data[self.head] = value;
        self.head = (self.head + 1) % self.capacity;
        if self.count < self.capacity {
            self.count += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the data in chronological order (oldest to newest).
    pub fn get_view(&self) -> Vec<T> {
        let mut result = Vec::with_capacity(self.count);
        if self.count < self.capacity {
            result.extend_from_slice(&self.data[0..self.count]);
        } else {
            result.extend_from_slice(&self.data[self.head..self.capacity]);
            result.extend_from_slice(&self.data[0..self.head]);
        }
        result
    }

    pub fn latest(&self) -> Option<T> {
        if self.count == 0 {
            return None;
        }
        let idx = if self.head == 0 {
            self.capacity - 1
        } else {
            self.head - 1
        };
        Some(self.data[idx])
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.count = 0;
    }
}

/// Cavity voltage, reflected voltage and detuning history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySuite {
    pub forward: CircularChannel<Complex64>,
    pub vc: CircularChannel<Complex64>,
    pub vr: CircularChannel<Complex64>,
    /// Detuning [rad/s].
    pub dw: CircularChannel<f64>,
}

impl TelemetrySuite {
    pub fn new(capacity: usize) -> Self {
        Self {
            forward: CircularChannel::new(capacity),
            vc: CircularChannel::new(capacity),
            vr: CircularChannel::new(capacity),
            dw: CircularChannel::new(capacity),
        }
    }

    pub fn record(&mut self, step: &StepRecord) {
        self.forward.push(step.forward);
        self.vc.push(step.vc);
        self.vr.push(step.vr);
        self.dw.push(step.dw);
    }

    /// Cavity voltage magnitudes in MV, oldest first.
    pub fn vc_amplitude_mv(&self) -> Vec<f64> {
        self.vc.get_view().iter().map(|v| v.norm() * 1e-6).collect()
    }

    pub fn clear(&mut self) {
        self.forward.clear();
        self.vc.clear();
        self.vr.clear();
        self.dw.clear();
    }
}
