//! Pattern construction from command-line flags

use anyhow::{bail, Result};
use clap::{Args, ValueEnum};
use mled_core::{Pattern, PatternConfig, Rgb};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PatternKind {
    Off,
    Rainbow,
    Chase,
    Breathing,
    Sparkle,
}

/// Flags shared by every command that builds a pattern
#[derive(Debug, Args)]
pub struct PatternArgs {
    /// Pattern to render
    #[arg(long, value_enum, default_value = "rainbow")]
    pub pattern: PatternKind,

    /// Overall brightness percent (0-100)
    #[arg(long, default_value = "60")]
    pub brightness: u8,

    /// Animation speed (0-20)
    #[arg(long, default_value = "5")]
    pub speed: u8,

    /// Primary color as #RRGGBB
    #[arg(long, default_value = "#FFFFFF")]
    pub color: String,

    /// Background color as #RRGGBB
    #[arg(long, default_value = "#000000")]
    pub bg: String,

    /// Rainbow saturation percent (0-100)
    #[arg(long, default_value = "100")]
    pub saturation: u8,

    /// Rainbow spread in tenths of a cycle across the strip (1-50)
    #[arg(long, default_value = "10")]
    pub spread: u8,

    /// Chase tail length in pixels
    #[arg(long, default_value = "5")]
    pub tail: u8,

    /// Chase gap length in pixels
    #[arg(long, default_value = "10")]
    pub gap: u8,

    /// Chase train count
    #[arg(long, default_value = "1")]
    pub trains: u8,

    /// Chase direction: forward, reverse, bounce
    #[arg(long, default_value = "forward")]
    pub direction: String,

    /// Fade the chase tail
    #[arg(long)]
    pub fade_tail: bool,

    /// Breathing minimum brightness percent
    #[arg(long, default_value = "5")]
    pub min_bri: u8,

    /// Breathing maximum brightness percent
    #[arg(long, default_value = "100")]
    pub max_bri: u8,

    /// Breathing curve: sine, linear, ease
    #[arg(long, default_value = "sine")]
    pub curve: String,

    /// Sparkle density percent
    #[arg(long, default_value = "20")]
    pub density: u8,

    /// Sparkle fade speed (0-100)
    #[arg(long, default_value = "50")]
    pub fade_speed: u8,

    /// Sparkle color mode: fixed, random, rainbow
    #[arg(long, default_value = "fixed")]
    pub color_mode: String,

    /// Seed for randomized patterns (0 lets the node pick)
    #[arg(long, default_value = "0")]
    pub seed: u32,
}

impl PatternArgs {
    pub fn to_config(&self) -> Result<PatternConfig> {
        let color = Rgb::parse(&self.color)?;
        let bg = Rgb::parse(&self.bg)?;
        let speed = self.speed.min(20);

        let pattern = match self.pattern {
            PatternKind::Off => Pattern::Off,
            PatternKind::Rainbow => Pattern::Rainbow {
                speed,
                saturation: self.saturation.min(100),
                spread_x10: self.spread.clamp(1, 50),
            },
            PatternKind::Chase => Pattern::Chase {
                speed,
                tail_len: self.tail,
                gap_len: self.gap,
                trains: self.trains.max(1),
                fg: color,
                bg,
                direction: match self.direction.as_str() {
                    "forward" => 0,
                    "reverse" => 1,
                    "bounce" => 2,
                    other => bail!("unknown direction: {other}"),
                },
                fade_tail: self.fade_tail,
            },
            PatternKind::Breathing => Pattern::Breathing {
                speed,
                color,
                min_bri: self.min_bri.min(100),
                max_bri: self.max_bri.min(100),
                curve: match self.curve.as_str() {
                    "sine" => 0,
                    "linear" => 1,
                    "ease" => 2,
                    other => bail!("unknown curve: {other}"),
                },
            },
            PatternKind::Sparkle => Pattern::Sparkle {
                speed,
                color,
                density_pct: self.density.min(100),
                fade_speed: self.fade_speed.min(100),
                color_mode: match self.color_mode.as_str() {
                    "fixed" => 0,
                    "random" => 1,
                    "rainbow" => 2,
                    other => bail!("unknown color mode: {other}"),
                },
                bg,
            },
        };

        let mut config = PatternConfig::new(pattern, self.brightness);
        config.seed = self.seed;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: PatternArgs,
    }

    fn parse(argv: &[&str]) -> PatternArgs {
        let mut full = vec!["test"];
        full.extend_from_slice(argv);
        Wrapper::parse_from(full).args
    }

    #[test]
    fn test_defaults_build_rainbow() {
        let config = parse(&[]).to_config().unwrap();
        assert!(matches!(config.pattern, Pattern::Rainbow { .. }));
        assert_eq!(config.brightness_pct, 60);
    }

    #[test]
    fn test_chase_flags() {
        let config = parse(&[
            "--pattern",
            "chase",
            "--color",
            "#FF0000",
            "--direction",
            "bounce",
            "--fade-tail",
        ])
        .to_config()
        .unwrap();
        match config.pattern {
            Pattern::Chase {
                fg,
                direction,
                fade_tail,
                ..
            } => {
                assert_eq!(fg, Rgb { r: 255, g: 0, b: 0 });
                assert_eq!(direction, 2);
                assert!(fade_tail);
            }
            other => panic!("expected chase, got {other:?}"),
        }
    }

    #[test]
    fn test_out_of_range_values_clamp() {
        let config = parse(&["--speed", "99", "--brightness", "200"])
            .to_config()
            .unwrap();
        assert_eq!(config.brightness_pct, 100);
        match config.pattern {
            Pattern::Rainbow { speed, .. } => assert_eq!(speed, 20),
            other => panic!("expected rainbow, got {other:?}"),
        }
    }

    #[test]
    fn test_bad_direction_rejected() {
        assert!(parse(&["--pattern", "chase", "--direction", "sideways"])
            .to_config()
            .is_err());
    }
}
