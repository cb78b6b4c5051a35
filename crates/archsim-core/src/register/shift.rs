use super::RegisterOp;
use crate::circuit::Circuit;
use crate::entity::{sign_bit, EntityInfo, RegisterId};
use crate::ArchError;

/// Which shift a serial input feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum SerialInput {
    /// Left shift; the feed's most significant bit enters at bit zero.
    ForLeftShift,
    /// Logical right shift; the feed's bit zero enters at the top bit.
    ForRightShift,
}

impl SerialInput {
    pub(super) const fn operation_name(self) -> &'static str {
        match self {
            Self::ForLeftShift => "left shift input",
            Self::ForRightShift => "right shift input",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(super) struct ShiftRegister {
    selected: Option<RegisterOp>,
    left_feed: Option<RegisterId>,
    right_feed: Option<RegisterId>,
}

impl ShiftRegister {
    pub(super) fn select(&mut self, op: RegisterOp) {
        self.selected = Some(op);
    }

    pub(super) fn set_input(&mut self, side: SerialInput, feed: RegisterId) {
        match side {
            SerialInput::ForLeftShift => self.left_feed = Some(feed),
            SerialInput::ForRightShift => self.right_feed = Some(feed),
        }
    }

    pub(super) fn next_value(
        &self,
        info: &EntityInfo,
        current: u64,
        net: &Circuit,
    ) -> Result<Option<u64>, ArchError> {
        if self.left_feed.is_some() && self.right_feed.is_some() {
            return Err(conflict(info, "cannot specify both left and right inputs"));
        }
        let top = sign_bit(info.width());
        let Some(op) = self.selected else {
            return Ok(None);
        };
        let next = match op {
            RegisterOp::ShiftLeft => {
                let mut next = current << 1;
                if let Some(feed) = self.left_feed {
                    next |= u64::from(net.register(feed)?.msb());
                }
                next
            }
            RegisterOp::ShiftRight => {
                let mut next = (current >> 1) & !top;
                if let Some(feed) = self.right_feed {
                    if net.register(feed)?.value() & 1 == 1 {
                        next |= top;
                    }
                }
                next
            }
            RegisterOp::ShiftRightArith => {
                if self.right_feed.is_some() {
                    return Err(
                        conflict(info, "cannot have a right shift input with arithmetic shift")
                    );
                }
                (current >> 1) | (current & top)
            }
            _ => current,
        };
        Ok(Some(next & info.mask()))
    }

    /// Operations and serial inputs last one cycle.
    pub(super) fn reset(&mut self) {
        *self = Self::default();
    }
}

fn conflict(info: &EntityInfo, reason: &'static str) -> ArchError {
    ArchError::ConflictingShiftInput {
        register: info.name().to_owned(),
        reason,
    }
}
