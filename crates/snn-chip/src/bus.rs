//! Bit-serial bus pin layout per die revision.
//!
//! Every clock cycle the host presents one bus word. The low-order bits carry
//! a small control field (an active-low reset pin, exposed here as the
//! `n_reset` flag, plus a mode select field); the high-order bits carry one
//! data word of weight, input, or don't-care payload.
//!
//! ## Observed layouts
//!
//! ```text
//! GFMPW (GF180 shuttle, single 38-pin io bank)
//!   bit  0..4   other control pins (held low)
//!   bit  5      n_reset
//!   bit  6..10  mode    input=00000 weights=00100 idle=01000 execute=00001
//!   bit 11..18  data    multi-word values loaded low word first
//!
//! TINYTAPEOUT (rst_n / uio_in / ui_in packed into one word)
//!   bit  0      n_reset (rst_n)
//!   bit  1..8   mode    (uio_in) input=0 weights=1 execute=2 idle=3
//!   bit  9..16  data    (ui_in)  multi-word values loaded high word first
//! ```
//!
//! A word with `n_reset` low is all-zero: reset dominates every other field.

/// Operating mode selected by the control field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Mode {
    /// Shift one data word into the input register per cycle.
    SetupInput,
    /// Shift one data word into the weight register per cycle.
    SetupWeights,
    /// Hold all configured state.
    Idle,
    /// Run the neuron array; outputs are valid every cycle.
    Execute,
}

impl Mode {
    /// All modes, in mode-field declaration order.
    pub const ALL: [Mode; 4] = [Mode::SetupInput, Mode::SetupWeights, Mode::Idle, Mode::Execute];
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SetupInput => write!(f, "SETUP_INPUT"),
            Self::SetupWeights => write!(f, "SETUP_WEIGHTS"),
            Self::Idle => write!(f, "IDLE"),
            Self::Execute => write!(f, "EXECUTE"),
        }
    }
}

/// Mode field values for one die revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModeCodes {
    /// Code for [`Mode::SetupInput`].
    pub input: u32,
    /// Code for [`Mode::SetupWeights`].
    pub weights: u32,
    /// Code for [`Mode::Idle`].
    pub idle: u32,
    /// Code for [`Mode::Execute`].
    pub execute: u32,
}

impl ModeCodes {
    /// Field value selecting `mode`.
    #[must_use]
    pub const fn code(&self, mode: Mode) -> u32 {
        match mode {
            Mode::SetupInput => self.input,
            Mode::SetupWeights => self.weights,
            Mode::Idle => self.idle,
            Mode::Execute => self.execute,
        }
    }

    /// Mode selected by a raw field value, if it is one of the four codes.
    #[must_use]
    pub fn mode(&self, code: u32) -> Option<Mode> {
        Mode::ALL.into_iter().find(|&m| self.code(m) == code)
    }
}

/// Order in which a multi-word value is presented on the data field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum WordOrder {
    /// Least significant word first (bit 0 is the first loaded bit).
    LittleEndian,
    /// Most significant word first.
    BigEndian,
}

/// Where the device reports its per-cycle outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OutputLayout {
    /// Bit of neuron 0's spike flag; neuron `i` reports at `spike_offset + i`.
    pub spike_offset: u8,
    /// Optional PWM-coded membrane potential pin.
    pub pwm_bit: Option<u8>,
}

impl OutputLayout {
    /// `uo_out[0]` = spike of the first neuron, `uo_out[1]` = PWM.
    pub const SINGLE_NEURON_PWM: Self = Self { spike_offset: 0, pwm_bit: Some(1) };

    /// Spike flags from bit 0 upwards, no PWM pin.
    pub const SPIKES_ONLY: Self = Self { spike_offset: 0, pwm_bit: None };

    /// Spike flag of neuron `index` in a raw output word.
    #[must_use]
    pub const fn spike(&self, word: u64, index: usize) -> bool {
        let bit = self.spike_offset as usize + index;
        bit < 64 && (word >> bit) & 1 == 1
    }

    /// PWM bit of a raw output word, if the layout has one.
    #[must_use]
    pub const fn pwm(&self, word: u64) -> Option<bool> {
        match self.pwm_bit {
            Some(bit) => Some((word >> bit) & 1 == 1),
            None => None,
        }
    }
}

impl Default for OutputLayout {
    fn default() -> Self {
        Self::SPIKES_ONLY
    }
}

/// Control/data field placement for one die revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BusLayout {
    /// Bit position of the `n_reset` (not-in-reset) flag.
    pub n_reset_bit: u8,
    /// Lowest bit of the mode field.
    pub mode_offset: u8,
    /// Mode field width in bits.
    pub mode_width: u8,
    /// Lowest bit of the data field.
    pub data_offset: u8,
    /// Data field width in bits (8 or 16 on the observed dies).
    pub data_width: u8,
    /// Mode field values.
    pub modes: ModeCodes,
    /// Multi-word load order.
    pub word_order: WordOrder,
}

impl BusLayout {
    /// GF180 shuttle die.
    pub const GFMPW: Self = Self {
        n_reset_bit: 5,
        mode_offset: 6,
        mode_width: 5,
        data_offset: 11,
        data_width: 8,
        modes: ModeCodes { input: 0b000_00, weights: 0b001_00, idle: 0b010_00, execute: 0b000_01 },
        word_order: WordOrder::LittleEndian,
    };

    /// Tiny Tapeout die (`rst_n`, `uio_in`, `ui_in` packed low to high).
    pub const TINYTAPEOUT: Self = Self {
        n_reset_bit: 0,
        mode_offset: 1,
        mode_width: 8,
        data_offset: 9,
        data_width: 8,
        modes: ModeCodes { input: 0, weights: 1, idle: 3, execute: 2 },
        word_order: WordOrder::BigEndian,
    };

    /// Named presets, for CLI listing and scenario files.
    pub const PRESETS: [(&'static str, Self); 2] =
        [("gfmpw", Self::GFMPW), ("tinytapeout", Self::TINYTAPEOUT)];

    /// Look up a preset by name (case-insensitive).
    #[must_use]
    pub fn preset(name: &str) -> Option<Self> {
        Self::PRESETS
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|&(_, layout)| layout)
    }

    /// Mask of the data field, unshifted.
    #[must_use]
    pub const fn data_mask(&self) -> u64 {
        field_mask(self.data_width)
    }

    /// Mask of the mode field, unshifted.
    #[must_use]
    pub const fn mode_mask(&self) -> u64 {
        field_mask(self.mode_width)
    }

    /// Total bus width covered by the three fields.
    #[must_use]
    pub const fn bus_width(&self) -> u32 {
        let reset_end = self.n_reset_bit as u32 + 1;
        let mode_end = self.mode_offset as u32 + self.mode_width as u32;
        let data_end = self.data_offset as u32 + self.data_width as u32;
        max(reset_end, max(mode_end, data_end))
    }

    /// Check the layout is usable: fields fit in 64 bits, do not overlap, and
    /// every mode code is distinct and fits its field.
    ///
    /// # Errors
    ///
    /// Returns a short description of the first problem found.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.mode_width == 0 || self.mode_width > 16 {
            return Err("mode field must be 1..=16 bits wide");
        }
        if self.data_width == 0 || self.data_width > 32 {
            return Err("data field must be 1..=32 bits wide");
        }
        if self.bus_width() > 64 {
            return Err("fields extend past bit 63");
        }
        let reset = 1u64 << self.n_reset_bit;
        let mode = self.mode_mask() << self.mode_offset;
        let data = self.data_mask() << self.data_offset;
        if reset & mode != 0 || reset & data != 0 || mode & data != 0 {
            return Err("control and data fields overlap");
        }
        let codes = Mode::ALL.map(|m| self.modes.code(m));
        if codes.iter().any(|&c| u64::from(c) > self.mode_mask()) {
            return Err("mode code does not fit the mode field");
        }
        for (i, a) in codes.iter().enumerate() {
            if codes[i + 1..].contains(a) {
                return Err("mode codes are not distinct");
            }
        }
        Ok(())
    }

    /// Pack a bus word. With `n_reset` low the word is all-zero.
    #[must_use]
    pub const fn pack(&self, n_reset: bool, mode_code: u32, data: u32) -> u64 {
        if !n_reset {
            return 0;
        }
        (1u64 << self.n_reset_bit)
            | ((mode_code as u64 & self.mode_mask()) << self.mode_offset)
            | ((data as u64 & self.data_mask()) << self.data_offset)
    }

    /// `n_reset` flag of a raw bus word.
    #[must_use]
    pub const fn n_reset(&self, word: u64) -> bool {
        (word >> self.n_reset_bit) & 1 == 1
    }

    /// Raw mode field of a bus word.
    #[must_use]
    pub const fn mode_code(&self, word: u64) -> u32 {
        ((word >> self.mode_offset) & self.mode_mask()) as u32
    }

    /// Raw data field of a bus word.
    #[must_use]
    pub const fn data(&self, word: u64) -> u32 {
        ((word >> self.data_offset) & self.data_mask()) as u32
    }
}

impl Default for BusLayout {
    fn default() -> Self {
        Self::GFMPW
    }
}

const fn field_mask(width: u8) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

const fn max(a: u32, b: u32) -> u32 {
    if a > b {
        a
    } else {
        b
    }
}
