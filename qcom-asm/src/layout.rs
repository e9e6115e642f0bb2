//! Emission order of instructions
//!
//! Instructions are not laid out back to back. The emitter holds one pending instruction body
//! and decides, as each new instruction arrives, whether that instruction's page setup
//! prelude goes before or after the pending body:
//!
//! - the first instruction emits its prelude right away, unless it is `JIF`/`JNI`, in which
//!   case the prelude is never emitted
//! - a later `JIF`/`JNI` emits its prelude, then the pending body
//! - any other later instruction emits the pending body, then its own prelude
//!
//! The last pending body is flushed at the end. The order only depends on the shape of each
//! instruction, so it is computed once and reused for label binding and for emission.

/// `AND R7, $0x0F` followed by `OR R7, $page`
pub const PRELUDE_LEN: usize = 6;

/// What the scheduler needs to know about one instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub prelude_len: usize,
    pub body_len: usize,
    pub conditional: bool,
}

impl Slot {
    fn has_prelude(&self) -> bool {
        self.prelude_len > 0
    }
}

/// A run of bytes belonging to the instruction at the given index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Prelude(usize),
    Body(usize),
}

impl Unit {
    pub fn index(self) -> usize {
        match self {
            Unit::Prelude(i) | Unit::Body(i) => i,
        }
    }

    pub fn len(self, slots: &[Slot]) -> usize {
        match self {
            Unit::Prelude(i) => slots[i].prelude_len,
            Unit::Body(i) => slots[i].body_len,
        }
    }
}

pub fn schedule(slots: &[Slot]) -> Vec<Unit> {
    let mut units = Vec::with_capacity(slots.len() * 2);
    let mut pending = None;

    for (i, slot) in slots.iter().enumerate() {
        match pending {
            None => {
                if slot.has_prelude() && !slot.conditional {
                    units.push(Unit::Prelude(i));
                }
            }
            Some(prev) => match (slot.has_prelude(), slot.conditional) {
                (true, true) => {
                    units.push(Unit::Prelude(i));
                    units.push(Unit::Body(prev));
                }
                (true, false) => {
                    units.push(Unit::Body(prev));
                    units.push(Unit::Prelude(i));
                }
                (false, _) => units.push(Unit::Body(prev)),
            },
        }

        pending = Some(i);
    }

    if let Some(prev) = pending {
        units.push(Unit::Body(prev));
    }

    units
}

/// Offset of the earliest emitted byte of every instruction, plus the total length.
pub fn first_offsets(slots: &[Slot], units: &[Unit]) -> (Vec<usize>, usize) {
    let mut first = vec![usize::MAX; slots.len()];
    let mut offset = 0;

    for unit in units {
        let i = unit.index();
        first[i] = first[i].min(offset);
        offset += unit.len(slots);
    }

    (first, offset)
}
