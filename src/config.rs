use crate::error::Error;
use crate::event_log::Click;
use serde::Deserialize;
use std::ops::RangeInclusive;
use std::path::Path;

#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct KeyboardRange {
    pub low: u8,
    pub high: u8,
}

impl Default for KeyboardRange {
    fn default() -> Self {
        KeyboardRange { low: 0, high: 127 }
    }
}

impl KeyboardRange {
    pub fn notes(&self) -> RangeInclusive<u8> {
        self.low..=self.high
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Fuzzy name of the controller to read from.
    pub input: String,
    /// Fuzzy name of the synth to play into.
    pub output: String,
    /// Seconds per loop cycle.
    pub loop_length: f64,
    /// Update steps per second.
    pub tick_rate: f64,
    /// Longest stall, in seconds, the scheduler will try to catch up on.
    pub max_catchup: f64,
    /// Seconds shaved off every sleep so wakeups land before the deadline.
    pub safety_margin: f64,
    /// Cycles between drift reports.
    pub drift_every: u64,
    pub keyboard: KeyboardRange,
    pub click: Click,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            input: "CH345".to_string(),
            output: "OP-1".to_string(),
            loop_length: 3.0,
            // Sixteenth notes at 240 bpm.
            tick_rate: 16.0,
            max_catchup: 0.25,
            safety_margin: 0.0001,
            drift_every: 4,
            keyboard: KeyboardRange::default(),
            click: Click::default(),
        }
    }
}

impl Config {
    /// Defaults, overlaid with the TOML file at `path` if one is given.
    pub fn load(path: Option<&Path>) -> Result<Config, Error> {
        match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)?;
                Self::parse(&contents)
            }
            None => Ok(Config::default()),
        }
    }

    pub fn parse(contents: &str) -> Result<Config, Error> {
        Ok(toml::from_str(contents)?)
    }

    pub fn tick_period(&self) -> f64 {
        1.0 / self.tick_rate
    }

    /// How early a cycle may end to absorb tick granularity.
    pub fn rollover_epsilon(&self) -> f64 {
        self.tick_period() * 0.1
    }

    pub fn validate(&self) -> Result<(), Error> {
        let fail = |message: String| -> Result<(), Error> { Err(Error::Config(message)) };
        if !(self.loop_length > 0.0) {
            return fail(format!("loop_length must be positive, got {}", self.loop_length));
        }
        if !(self.tick_rate > 0.0) {
            return fail(format!("tick_rate must be positive, got {}", self.tick_rate));
        }
        if !(self.max_catchup >= self.tick_period()) {
            return fail(format!(
                "max_catchup ({}) must cover at least one tick ({})",
                self.max_catchup,
                self.tick_period()
            ));
        }
        if !(self.safety_margin >= 0.0) {
            return fail(format!("safety_margin must not be negative, got {}", self.safety_margin));
        }
        if self.drift_every == 0 {
            return fail("drift_every must be at least 1".to_string());
        }
        if self.keyboard.low > self.keyboard.high || self.keyboard.high > 127 {
            return fail(format!(
                "keyboard range {}..={} is not a valid note range",
                self.keyboard.low, self.keyboard.high
            ));
        }
        let click = &self.click;
        let data = [click.note, click.velocity, click.release_velocity];
        if click.channel > 15 || data.iter().any(|&byte| byte > 127) {
            return fail(format!("click {:?} is not a valid midi note", click));
        }
        if !(click.length >= 0.0 && click.length < self.loop_length) {
            return fail(format!(
                "click length {} must fit inside the {}s loop",
                click.length, self.loop_length
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.tick_period(), 0.0625);
        assert!(config.rollover_epsilon() < config.tick_period());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = Config::parse(
            r#"
            output = "LMMS"
            loop_length = 2.0

            [click]
            note = 37
            "#,
        )
        .unwrap();
        assert_eq!(config.output, "LMMS");
        assert_eq!(config.input, "CH345");
        assert_eq!(config.loop_length, 2.0);
        assert_eq!(config.click.note, 37);
        assert_eq!(config.click.velocity, 64);
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "drift_every = 8\n[keyboard]\nlow = 21\nhigh = 108").unwrap();
        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.drift_every, 8);
        assert_eq!(config.keyboard.notes(), 21..=108);
        config.validate().unwrap();
    }

    #[test]
    fn rejects_nonsense() {
        let mut config = Config::default();
        config.loop_length = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.click.length = 5.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.keyboard = KeyboardRange { low: 90, high: 20 };
        assert!(config.validate().is_err());

        assert!(matches!(Config::parse("loop_length = \"long\""), Err(Error::Config(_))));
    }
}
