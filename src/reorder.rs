//! Physical view → output slot mapping.
//!
//! Every data packet carries `top + acquired_y + bottom` physical views. Reference
//! views are packed first, in arrival order, followed by the image views in
//! phase-encode order. Slots are global: the packet's window starts at the cursor,
//! the number of slots written by all previous data packets.
//!
//! ```text
//! physical:  [ref ref | img0 img1 img2 img3]      top = 2, acquired_y = 4
//! slots:     [ c+0 c+1 | c+2  c+3  c+4  c+5 ]
//! ```

use crate::params::ScanParameters;

/// Inclusive range of physical views holding reference data.
///
/// Top views take priority: when both top and bottom views are configured only the
/// top block is reported. With no reference views at all the range degenerates to
/// `[0, 0]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceViewRange {
    start: usize,
    end: usize,
}

impl ReferenceViewRange {
    /// Range for a packet with the given reference blocks around `acquired_y` image views.
    pub fn compute(top_views: usize, acquired_y: usize, bottom_views: usize) -> Self {
        if top_views > 0 {
            Self {
                start: 0,
                end: top_views - 1,
            }
        } else if bottom_views > 0 {
            Self {
                start: acquired_y,
                end: acquired_y + bottom_views - 1,
            }
        } else {
            Self { start: 0, end: 0 }
        }
    }

    /// First reference view.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Last reference view (inclusive).
    pub fn end(&self) -> usize {
        self.end
    }

    /// Whether `view` lies in the range.
    pub fn contains(&self, view: usize) -> bool {
        (self.start..=self.end).contains(&view)
    }
}

impl std::fmt::Display for ReferenceViewRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Where one physical view goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotAssignment {
    /// Physical view index within the packet.
    pub view: usize,
    /// Global output slot.
    pub slot: usize,
    /// Phase-encode step recorded for the view.
    pub kspace_encode_step_1: usize,
    /// Whether the view holds reference data.
    pub is_reference: bool,
}

/// Computes slot assignments for every packet of one scan.
#[derive(Debug, Clone)]
pub struct ViewReorderer {
    range: ReferenceViewRange,
    top_views: usize,
    acquired_y: usize,
    reference_views: usize,
    total_views: usize,
}

impl ViewReorderer {
    /// Computes the reference range for the scan.
    pub fn new(params: &ScanParameters) -> Self {
        Self {
            range: ReferenceViewRange::compute(
                params.top_views,
                params.acquired_y,
                params.bottom_views,
            ),
            top_views: params.top_views,
            acquired_y: params.acquired_y,
            reference_views: params.reference_views(),
            total_views: params.total_views(),
        }
    }

    /// Reference range, computed once per scan.
    pub fn range(&self) -> ReferenceViewRange {
        self.range
    }

    /// Physical views per packet.
    pub fn total_views(&self) -> usize {
        self.total_views
    }

    /// Whether `view` holds reference data.
    ///
    /// A scan without reference views has none, even though its range degenerates
    /// to `[0, 0]`.
    pub fn is_reference(&self, view: usize) -> bool {
        self.reference_views > 0 && self.range.contains(view)
    }

    /// Starts a packet whose window begins at global slot `cursor`.
    pub fn begin_packet(&self, cursor: usize) -> PacketSlots<'_> {
        PacketSlots {
            reorderer: self,
            cursor,
            reference_count: 0,
            next_view: 0,
        }
    }
}

/// Slot assignments for one packet, yielded in physical view order.
#[derive(Debug)]
pub struct PacketSlots<'a> {
    reorderer: &'a ViewReorderer,
    cursor: usize,
    reference_count: usize,
    next_view: usize,
}

impl PacketSlots<'_> {
    /// First global slot of this packet's window.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn assign(&mut self, view: usize) -> SlotAssignment {
        let r = self.reorderer;
        if r.is_reference(view) {
            let slot = self.cursor + self.reference_count;
            self.reference_count += 1;
            SlotAssignment {
                view,
                slot,
                kspace_encode_step_1: r.acquired_y / 2,
                is_reference: true,
            }
        } else {
            // Views below `top_views` are always reference views when top views exist.
            let step = view - r.top_views;
            SlotAssignment {
                view,
                slot: self.cursor + r.reference_views + step,
                kspace_encode_step_1: step,
                is_reference: false,
            }
        }
    }
}

impl Iterator for PacketSlots<'_> {
    type Item = SlotAssignment;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_view >= self.reorderer.total_views {
            return None;
        }
        let view = self.next_view;
        self.next_view += 1;
        Some(self.assign(view))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.reorderer.total_views - self.next_view;
        (left, Some(left))
    }
}

impl ExactSizeIterator for PacketSlots<'_> {}
