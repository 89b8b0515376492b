//! RF-chop removal.

use crate::packet::SampleCube;
use ndarray::s;

/// Undoes RF chopping by negating every other phase-encode line, starting with the
/// first (views 0, 2, 4, ...), across every readout sample and channel.
///
/// Applied to the whole packet, reference views included. Applying it twice is a
/// no-op.
pub fn undo_rf_chop(cube: &mut SampleCube) {
    cube.slice_mut(s![.., ..;2, ..]).mapv_inplace(|sample| -sample);
}
