//! Command-line configuration (component H's bootstrap input).
//!
//! Hand-parsed from `std::env::args`, matching the pack's nearest idiom for a
//! handful of flags rather than pulling in a parser crate; `anyhow` reports
//! malformed arguments back to `main`.

use anyhow::{anyhow, Result};
use vulkanalia::vk;

/// Presentation mode requested on the command line, before the swapchain's
/// own fallback chain (`vulkan::swapchain::get_swapchain_present_mode`) picks
/// what the surface actually supports.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PresentationMode {
    Immediate,
    Mailbox,
    Fifo,
    FifoRelaxed,
}

impl PresentationMode {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "immediate" => Ok(Self::Immediate),
            "mailbox" => Ok(Self::Mailbox),
            "fifo" => Ok(Self::Fifo),
            "fifo_relaxed" => Ok(Self::FifoRelaxed),
            other => Err(anyhow!(
                "invalid --presentation_mode '{other}' (expected one of: immediate, mailbox, fifo, fifo_relaxed)"
            )),
        }
    }

    pub fn to_vk(self) -> vk::PresentModeKHR {
        match self {
            Self::Immediate => vk::PresentModeKHR::IMMEDIATE,
            Self::Mailbox => vk::PresentModeKHR::MAILBOX,
            Self::Fifo => vk::PresentModeKHR::FIFO,
            Self::FifoRelaxed => vk::PresentModeKHR::FIFO_RELAXED,
        }
    }
}

/// Parsed CLI surface for a core-using program (spec §6): validation layers,
/// windowing mode, swapchain present mode, and a target update rate.
#[derive(Copy, Clone, Debug)]
pub struct Config {
    pub debug: bool,
    pub fullscreen: bool,
    pub presentation_mode: PresentationMode,
    pub update_frequency: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            fullscreen: false,
            presentation_mode: PresentationMode::Fifo,
            update_frequency: 60.0,
        }
    }
}

impl Config {
    /// Parses `--debug`, `--fullscreen`, `--presentation_mode <mode>`, and
    /// `--update_frequency <hz>` out of an argument iterator (the program name
    /// is expected to already have been consumed by the caller, matching
    /// `std::env::args().skip(1)`). Unknown flags are rejected rather than
    /// silently ignored.
    pub fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Self> {
        let mut config = Self::default();
        let mut iter = args.into_iter();

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--debug" => config.debug = true,
                "--fullscreen" => config.fullscreen = true,
                "--presentation_mode" => {
                    let value = iter
                        .next()
                        .ok_or_else(|| anyhow!("--presentation_mode requires a value"))?;
                    config.presentation_mode = PresentationMode::parse(&value)?;
                }
                "--update_frequency" => {
                    let value = iter
                        .next()
                        .ok_or_else(|| anyhow!("--update_frequency requires a value"))?;
                    config.update_frequency = value
                        .parse::<f32>()
                        .map_err(|_| anyhow!("invalid --update_frequency '{value}', expected a number"))?;
                    if config.update_frequency <= 0.0 {
                        return Err(anyhow!("--update_frequency must be positive, got {}", config.update_frequency));
                    }
                }
                other => return Err(anyhow!("unrecognized argument '{other}'")),
            }
        }

        Ok(config)
    }

    pub fn update_period(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f32(1.0 / self.update_frequency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_to_fifo_and_sixty_hertz() {
        let config = Config::parse(args(&[])).unwrap();
        assert_eq!(config.presentation_mode, PresentationMode::Fifo);
        assert_eq!(config.update_frequency, 60.0);
        assert!(!config.debug);
        assert!(!config.fullscreen);
    }

    #[test]
    fn parses_all_flags_together() {
        let config = Config::parse(args(&[
            "--debug",
            "--fullscreen",
            "--presentation_mode",
            "mailbox",
            "--update_frequency",
            "144",
        ]))
        .unwrap();
        assert!(config.debug);
        assert!(config.fullscreen);
        assert_eq!(config.presentation_mode, PresentationMode::Mailbox);
        assert_eq!(config.update_frequency, 144.0);
    }

    #[test]
    fn rejects_unknown_flag() {
        assert!(Config::parse(args(&["--nonsense"])).is_err());
    }

    #[test]
    fn rejects_invalid_presentation_mode() {
        assert!(Config::parse(args(&["--presentation_mode", "bogus"])).is_err());
    }

    #[test]
    fn rejects_non_positive_update_frequency() {
        assert!(Config::parse(args(&["--update_frequency", "0"])).is_err());
        assert!(Config::parse(args(&["--update_frequency", "-5"])).is_err());
    }
}
