//! Hints Module
//!
//! ICCCM size/WM hints and Motif hints, decoded from raw 32-bit property
//! values. Malformed or short properties decode to `None`.

use crate::shared::{Geometry, Size};

const US_POSITION: u32 = 1 << 0;
const P_POSITION: u32 = 1 << 2;
const P_MIN_SIZE: u32 = 1 << 4;
const P_MAX_SIZE: u32 = 1 << 5;
const P_RESIZE_INC: u32 = 1 << 6;
const P_BASE_SIZE: u32 = 1 << 8;

const INPUT_HINT: u32 = 1 << 0;
const STATE_HINT: u32 = 1 << 1;
const WINDOW_GROUP_HINT: u32 = 1 << 6;
const URGENCY_HINT: u32 = 1 << 8;
const ICONIC_STATE: u32 = 3;

const MWM_HINTS_FUNCTIONS: u32 = 1 << 0;
const MWM_HINTS_DECORATIONS: u32 = 1 << 1;
const MWM_FUNC_ALL: u32 = 1 << 0;
const MWM_FUNC_CLOSE: u32 = 1 << 5;

/// Size hints (WM_NORMAL_HINTS)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SizeHints {
    pub flags: u32,
    pub min_width: u32,
    pub min_height: u32,
    pub max_width: u32,
    pub max_height: u32,
    pub width_inc: u32,
    pub height_inc: u32,
    pub base_width: u32,
    pub base_height: u32,
    pub win_gravity: u8,
}

impl SizeHints {
    /// Decode WM_NORMAL_HINTS (18 32-bit values)
    pub fn from_raw(values: &[u32]) -> Option<Self> {
        if values.len() < 18 {
            return None;
        }
        Some(Self {
            flags: values[0],
            min_width: values[5],
            min_height: values[6],
            max_width: values[7],
            max_height: values[8],
            width_inc: values[9],
            height_inc: values[10],
            base_width: values[15],
            base_height: values[16],
            win_gravity: values[17] as u8,
        })
    }

    /// The client asked for its initial position to be honored
    pub fn has_position(&self) -> bool {
        self.flags & (US_POSITION | P_POSITION) != 0
    }

    pub fn user_position(&self) -> bool {
        self.flags & US_POSITION != 0
    }

    pub fn min_size(&self) -> Size {
        if self.flags & P_MIN_SIZE != 0 {
            Size::new(self.min_width.max(1), self.min_height.max(1))
        } else {
            Size::new(1, 1)
        }
    }

    pub fn max_size(&self) -> Size {
        if self.flags & P_MAX_SIZE != 0 && self.max_width > 0 && self.max_height > 0 {
            Size::new(self.max_width, self.max_height)
        } else {
            Size::new(u32::MAX, u32::MAX)
        }
    }

    /// Clamp a client size to min/max and snap it to the resize increments
    pub fn constrain(&self, size: Size) -> Size {
        let min = self.min_size();
        let max = self.max_size();
        let mut width = size.width.clamp(min.width, max.width.max(min.width));
        let mut height = size.height.clamp(min.height, max.height.max(min.height));

        if self.flags & P_RESIZE_INC != 0 {
            let (base_w, base_h) = if self.flags & P_BASE_SIZE != 0 {
                (self.base_width, self.base_height)
            } else {
                (0, 0)
            };
            if self.width_inc > 1 && width > base_w {
                width = base_w + (width - base_w) / self.width_inc * self.width_inc;
            }
            if self.height_inc > 1 && height > base_h {
                height = base_h + (height - base_h) / self.height_inc * self.height_inc;
            }
        }
        Size::new(width.max(min.width), height.max(min.height))
    }

    /// Fixed-size windows cannot be resized or maximized
    pub fn is_fixed_size(&self) -> bool {
        let min = self.min_size();
        let max = self.max_size();
        self.flags & P_MIN_SIZE != 0 && self.flags & P_MAX_SIZE != 0 && min == max
    }

    pub fn apply(&self, geometry: Geometry) -> Geometry {
        geometry.with_size(self.constrain(geometry.size()))
    }
}

/// WM hints (WM_HINTS)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WmHints {
    pub flags: u32,
    pub input: bool,
    pub initial_state: u32,
    pub window_group: Option<u32>,
}

impl WmHints {
    /// Decode WM_HINTS (9 32-bit values)
    pub fn from_raw(values: &[u32]) -> Option<Self> {
        if values.len() < 9 {
            return None;
        }
        Some(Self {
            flags: values[0],
            input: values[1] & 1 != 0,
            initial_state: values[2],
            window_group: (values[0] & WINDOW_GROUP_HINT != 0 && values[8] != 0).then_some(values[8]),
        })
    }

    /// Missing input hint means the client accepts input
    pub fn accepts_input(&self) -> bool {
        self.flags & INPUT_HINT == 0 || self.input
    }

    pub fn starts_iconic(&self) -> bool {
        self.flags & STATE_HINT != 0 && self.initial_state == ICONIC_STATE
    }

    pub fn is_urgent(&self) -> bool {
        self.flags & URGENCY_HINT != 0
    }
}

/// _MOTIF_WM_HINTS
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MotifHints {
    pub flags: u32,
    pub functions: u32,
    pub decorations: u32,
}

impl MotifHints {
    pub fn from_raw(values: &[u32]) -> Option<Self> {
        if values.len() < 3 {
            return None;
        }
        Some(Self {
            flags: values[0],
            functions: values[1],
            decorations: values[2],
        })
    }

    /// The application asked for no decoration
    pub fn no_border(&self) -> bool {
        self.flags & MWM_HINTS_DECORATIONS != 0 && self.decorations == 0
    }

    pub fn closeable(&self) -> bool {
        if self.flags & MWM_HINTS_FUNCTIONS == 0 {
            return true;
        }
        // MWM_FUNC_ALL inverts the meaning of the other bits.
        let close = self.functions & MWM_FUNC_CLOSE != 0;
        if self.functions & MWM_FUNC_ALL != 0 { !close } else { close }
    }
}
