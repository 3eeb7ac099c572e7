//! Distributed block vector.
//!
//! Holds `neq` values per local block index, owned and ghost alike, laid out
//! as `block·neq + eq`. Writes to ghost entries stay local until [`sync`]
//! overwrites them with the owners' values.
//!
//! [`sync`]: DistributedVector::sync

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use log::debug;

use crate::error::LssError;
use crate::parallel::CommPattern;

struct VectorState<P> {
    pattern: Arc<P>,
    neq: usize,
    data: Vec<f64>,
}

/// `neq` values per local block of a [`CommPattern`]. Starts uncreated.
pub struct DistributedVector<P: CommPattern> {
    state: Option<VectorState<P>>,
}

impl<P: CommPattern> Default for DistributedVector<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: CommPattern> DistributedVector<P> {
    /// Uncreated vector.
    pub fn new() -> Self {
        Self { state: None }
    }

    /// Allocate `neq` zeroed values per local block of `pattern`.
    pub fn create(&mut self, pattern: Arc<P>, neq: usize) -> Result<(), LssError> {
        if self.state.is_some() {
            return Err(LssError::AlreadyCreated("vector"));
        }
        if neq == 0 {
            return Err(LssError::InvalidOption("number of equations must be positive".into()));
        }
        let data = vec![0.0; pattern.local_size() * neq];
        debug!("created vector: {} blocks x {} equations", pattern.local_size(), neq);
        self.state = Some(VectorState { pattern, neq, data });
        Ok(())
    }

    /// Release the values. No-op when not created.
    pub fn destroy(&mut self) {
        self.state = None;
    }

    /// Whether `create` succeeded since the last `destroy`.
    pub fn is_created(&self) -> bool {
        self.state.is_some()
    }

    /// Values per block, 0 before `create`.
    pub fn neq(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.neq)
    }

    /// Number of local blocks, owned and ghost.
    pub fn blockrow_size(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.pattern.local_size())
    }

    /// Communication pattern the vector was created on.
    pub fn pattern(&self) -> Option<&Arc<P>> {
        self.state.as_ref().map(|s| &s.pattern)
    }

    fn state(&self) -> Result<&VectorState<P>, LssError> {
        self.state.as_ref().ok_or(LssError::NotCreated("vector"))
    }

    fn state_mut(&mut self) -> Result<&mut VectorState<P>, LssError> {
        self.state.as_mut().ok_or(LssError::NotCreated("vector"))
    }

    /// Overwrite scalar entry `irow = block·neq + eq`.
    pub fn set_value(&mut self, irow: usize, value: f64) -> Result<(), LssError> {
        let s = self.state_mut()?;
        *entry_mut(&mut s.data, irow)? = value;
        Ok(())
    }

    /// Add `value` to scalar entry `irow`.
    pub fn add_value(&mut self, irow: usize, value: f64) -> Result<(), LssError> {
        let s = self.state_mut()?;
        *entry_mut(&mut s.data, irow)? += value;
        Ok(())
    }

    /// Read scalar entry `irow`.
    pub fn get_value(&self, irow: usize) -> Result<f64, LssError> {
        let s = self.state()?;
        s.data.get(irow).copied().ok_or_else(|| out_of_range(irow, s.data.len()))
    }

    /// Overwrite the blocks `block_indices`; `values` holds `neq` entries per block.
    pub fn set_values(&mut self, block_indices: &[usize], values: &[f64]) -> Result<(), LssError> {
        let s = self.state_mut()?;
        check_blocks(s, block_indices, values.len())?;
        let neq = s.neq;
        for (k, &b) in block_indices.iter().enumerate() {
            s.data[b * neq..(b + 1) * neq].copy_from_slice(&values[k * neq..(k + 1) * neq]);
        }
        Ok(())
    }

    /// Add into the blocks `block_indices`, same layout as [`set_values`](Self::set_values).
    pub fn add_values(&mut self, block_indices: &[usize], values: &[f64]) -> Result<(), LssError> {
        let s = self.state_mut()?;
        check_blocks(s, block_indices, values.len())?;
        let neq = s.neq;
        for (k, &b) in block_indices.iter().enumerate() {
            for (d, v) in s.data[b * neq..(b + 1) * neq].iter_mut().zip(&values[k * neq..(k + 1) * neq]) {
                *d += v;
            }
        }
        Ok(())
    }

    /// Copy the blocks `block_indices` into `out`, `neq` entries per block.
    pub fn get_values(&self, block_indices: &[usize], out: &mut [f64]) -> Result<(), LssError> {
        let s = self.state()?;
        check_blocks(s, block_indices, out.len())?;
        let neq = s.neq;
        for (k, &b) in block_indices.iter().enumerate() {
            out[k * neq..(k + 1) * neq].copy_from_slice(&s.data[b * neq..(b + 1) * neq]);
        }
        Ok(())
    }

    /// Fill every entry, ghosts included, with `value`.
    pub fn reset(&mut self, value: f64) -> Result<(), LssError> {
        self.state_mut()?.data.fill(value);
        Ok(())
    }

    /// Refresh ghost entries from their owners. Collective.
    pub fn sync(&mut self) -> Result<(), LssError> {
        let s = self.state_mut()?;
        s.pattern.exchange(&mut s.data, s.neq);
        Ok(())
    }

    /// Local values in scalar-row order.
    pub fn as_slice(&self) -> Result<&[f64], LssError> {
        Ok(&self.state()?.data)
    }

    pub fn as_mut_slice(&mut self) -> Result<&mut [f64], LssError> {
        Ok(&mut self.state_mut()?.data)
    }

    /// Header line, then one `irow value` line per entry.
    pub fn print<W: Write>(&self, out: &mut W) -> Result<(), LssError> {
        let s = self.state()?;
        writeln!(out, "# distributed vector: {} blocks, neq = {}", s.pattern.local_size(), s.neq)?;
        for (irow, v) in s.data.iter().enumerate() {
            writeln!(out, "{irow} {v:e}")?;
        }
        Ok(())
    }

    pub fn print_to_file<Q: AsRef<Path>>(&self, path: Q) -> Result<(), LssError> {
        let mut out = BufWriter::new(File::create(path)?);
        self.print(&mut out)?;
        out.flush()?;
        Ok(())
    }
}

fn out_of_range(irow: usize, len: usize) -> LssError {
    LssError::IndexOutOfRange(format!("vector row {irow} (rows: {len})"))
}

fn entry_mut(data: &mut [f64], irow: usize) -> Result<&mut f64, LssError> {
    let len = data.len();
    data.get_mut(irow).ok_or_else(|| out_of_range(irow, len))
}

fn check_blocks<P: CommPattern>(s: &VectorState<P>, block_indices: &[usize], nvalues: usize) -> Result<(), LssError> {
    let expected = block_indices.len() * s.neq;
    if nvalues != expected {
        return Err(LssError::DimensionMismatch { expected, found: nvalues });
    }
    let nblocks = s.pattern.local_size();
    if let Some(&bad) = block_indices.iter().find(|&&b| b >= nblocks) {
        return Err(LssError::IndexOutOfRange(format!("vector block {bad} (blocks: {nblocks})")));
    }
    Ok(())
}
