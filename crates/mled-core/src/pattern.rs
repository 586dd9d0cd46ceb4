//! Pattern configuration
//!
//! The 20-byte `PatternConfig` payload carries everything a node needs to
//! render a pattern. The 12-byte `data` block is interpreted per pattern
//! type, so it is modeled here as a tagged [`Pattern`] enum with one
//! pack/unpack pair per variant instead of raw offset arithmetic. The
//! protocol layer only transports and schedules the config.

use crate::{Error, Result};
use bytes::BufMut;
use serde::{Deserialize, Serialize};

/// Size of the fixed pattern config payload block
pub const PATTERN_CONFIG_SIZE: usize = 20;

/// Size of the per-pattern data block inside the config
pub const PATTERN_DATA_SIZE: usize = 12;

/// An RGB color
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb {
        r: 255,
        g: 255,
        b: 255,
    };
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };

    /// Parse a `#RRGGBB` / `RRGGBB` hex color
    pub fn parse(s: &str) -> Result<Self> {
        let hex = s.trim().trim_start_matches('#');
        // ASCII-only so the digit-pair slices below land on char boundaries.
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(Error::InvalidPattern(format!("invalid hex color: {s:?}")));
        }
        let parse = |range| {
            u8::from_str_radix(&hex[range], 16)
                .map_err(|_| Error::InvalidPattern(format!("invalid hex color: {s:?}")))
        };
        Ok(Rgb {
            r: parse(0..2)?,
            g: parse(2..4)?,
            b: parse(4..6)?,
        })
    }
}

/// A renderable pattern with its wire parameters
///
/// Each variant documents its layout within the 12-byte data block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Pattern {
    /// All pixels off
    Off,
    /// data[0]=speed (0..=20), data[1]=saturation (0..=100), data[2]=spread_x10 (1..=50)
    Rainbow {
        speed: u8,
        saturation: u8,
        spread_x10: u8,
    },
    /// data[0]=speed, data[1]=tail_len, data[2]=gap_len, data[3]=trains,
    /// data[4..7]=fg RGB, data[7..10]=bg RGB, data[10]=direction, data[11]=fade_tail
    Chase {
        speed: u8,
        tail_len: u8,
        gap_len: u8,
        trains: u8,
        fg: Rgb,
        bg: Rgb,
        /// 0 = forward, 1 = reverse, 2 = bounce
        direction: u8,
        fade_tail: bool,
    },
    /// data[0]=speed (0..=20), data[1..4]=RGB, data[4]=min_bri, data[5]=max_bri, data[6]=curve
    Breathing {
        speed: u8,
        color: Rgb,
        min_bri: u8,
        max_bri: u8,
        /// 0 = sine, 1 = linear, 2 = ease
        curve: u8,
    },
    /// data[0]=speed (0..=20), data[1..4]=RGB, data[4]=density_pct, data[5]=fade_speed,
    /// data[6]=color_mode, data[7..10]=bg RGB
    Sparkle {
        speed: u8,
        color: Rgb,
        density_pct: u8,
        fade_speed: u8,
        /// 0 = fixed, 1 = random, 2 = rainbow
        color_mode: u8,
        bg: Rgb,
    },
    /// Unrecognized pattern type; the raw data block round-trips untouched
    Other { pattern_type: u8, data: [u8; 12] },
}

impl Pattern {
    /// Wire code for this pattern type
    pub fn type_code(&self) -> u8 {
        match self {
            Pattern::Off => 0,
            Pattern::Rainbow { .. } => 1,
            Pattern::Chase { .. } => 2,
            Pattern::Breathing { .. } => 3,
            Pattern::Sparkle { .. } => 4,
            Pattern::Other { pattern_type, .. } => *pattern_type,
        }
    }

    /// Human name for the wire code, used in status output
    pub fn type_name(code: u8) -> &'static str {
        match code {
            0 => "off",
            1 => "rainbow",
            2 => "chase",
            3 => "breathing",
            4 => "sparkle",
            _ => "unknown",
        }
    }

    fn pack_data(&self) -> [u8; PATTERN_DATA_SIZE] {
        let mut data = [0u8; PATTERN_DATA_SIZE];
        match *self {
            Pattern::Off => {}
            Pattern::Rainbow {
                speed,
                saturation,
                spread_x10,
            } => {
                data[0] = speed;
                data[1] = saturation;
                data[2] = spread_x10;
            }
            Pattern::Chase {
                speed,
                tail_len,
                gap_len,
                trains,
                fg,
                bg,
                direction,
                fade_tail,
            } => {
                data[0] = speed;
                data[1] = tail_len;
                data[2] = gap_len;
                data[3] = trains;
                data[4] = fg.r;
                data[5] = fg.g;
                data[6] = fg.b;
                data[7] = bg.r;
                data[8] = bg.g;
                data[9] = bg.b;
                data[10] = direction;
                data[11] = fade_tail as u8;
            }
            Pattern::Breathing {
                speed,
                color,
                min_bri,
                max_bri,
                curve,
            } => {
                data[0] = speed;
                data[1] = color.r;
                data[2] = color.g;
                data[3] = color.b;
                data[4] = min_bri;
                data[5] = max_bri;
                data[6] = curve;
            }
            Pattern::Sparkle {
                speed,
                color,
                density_pct,
                fade_speed,
                color_mode,
                bg,
            } => {
                data[0] = speed;
                data[1] = color.r;
                data[2] = color.g;
                data[3] = color.b;
                data[4] = density_pct;
                data[5] = fade_speed;
                data[6] = color_mode;
                data[7] = bg.r;
                data[8] = bg.g;
                data[9] = bg.b;
            }
            Pattern::Other { data: raw, .. } => data = raw,
        }
        data
    }

    fn unpack(type_code: u8, data: [u8; PATTERN_DATA_SIZE]) -> Self {
        match type_code {
            0 => Pattern::Off,
            1 => Pattern::Rainbow {
                speed: data[0],
                saturation: data[1],
                spread_x10: data[2],
            },
            2 => Pattern::Chase {
                speed: data[0],
                tail_len: data[1],
                gap_len: data[2],
                trains: data[3],
                fg: Rgb {
                    r: data[4],
                    g: data[5],
                    b: data[6],
                },
                bg: Rgb {
                    r: data[7],
                    g: data[8],
                    b: data[9],
                },
                direction: data[10],
                fade_tail: data[11] != 0,
            },
            3 => Pattern::Breathing {
                speed: data[0],
                color: Rgb {
                    r: data[1],
                    g: data[2],
                    b: data[3],
                },
                min_bri: data[4],
                max_bri: data[5],
                curve: data[6],
            },
            4 => Pattern::Sparkle {
                speed: data[0],
                color: Rgb {
                    r: data[1],
                    g: data[2],
                    b: data[3],
                },
                density_pct: data[4],
                fade_speed: data[5],
                color_mode: data[6],
                bg: Rgb {
                    r: data[7],
                    g: data[8],
                    b: data[9],
                },
            },
            other => Pattern::Other {
                pattern_type: other,
                data,
            },
        }
    }
}

/// The 20-byte pattern config carried by CUE_PREPARE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternConfig {
    pub pattern: Pattern,
    /// Overall brightness, 0..=100
    pub brightness_pct: u8,
    pub flags: u8,
    /// Seed for randomized patterns; 0 lets the node pick
    pub seed: u32,
}

impl PatternConfig {
    pub fn new(pattern: Pattern, brightness_pct: u8) -> Self {
        Self {
            pattern,
            brightness_pct: brightness_pct.min(100),
            flags: 0,
            seed: 0,
        }
    }

    pub fn encode_to(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.pattern.type_code());
        buf.put_u8(self.brightness_pct);
        buf.put_u8(self.flags);
        buf.put_u8(0); // reserved
        buf.put_u32_le(self.seed);
        buf.put_slice(&self.pattern.pack_data());
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < PATTERN_CONFIG_SIZE {
            return Err(Error::BufferTooSmall {
                needed: PATTERN_CONFIG_SIZE,
                have: buf.len(),
            });
        }
        let mut data = [0u8; PATTERN_DATA_SIZE];
        data.copy_from_slice(&buf[8..20]);
        Ok(Self {
            pattern: Pattern::unpack(buf[0], data),
            brightness_pct: buf[1],
            flags: buf[2],
            seed: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
        })
    }
}
