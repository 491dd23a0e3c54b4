use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Size units for space metrics. Each step is a factor of 1024.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum ByteUnit {
    Byte,
    Kilobyte,
    Megabyte,
    Gigabyte,
    Terabyte,
}

impl ByteUnit {
    pub const ALL: [ByteUnit; 5] = [
        ByteUnit::Byte, ByteUnit::Kilobyte, ByteUnit::Megabyte, ByteUnit::Gigabyte, ByteUnit::Terabyte,
    ];

    pub fn exponent(self) -> i32 {
        match self {
            ByteUnit::Byte     => 0,
            ByteUnit::Kilobyte => 1,
            ByteUnit::Megabyte => 2,
            ByteUnit::Gigabyte => 3,
            ByteUnit::Terabyte => 4,
        }
    }

    /// Name as it appears in metric names: "gigabyte" in `root.gigabyte_used`.
    pub fn name(self) -> &'static str {
        match self {
            ByteUnit::Byte     => "byte",
            ByteUnit::Kilobyte => "kilobyte",
            ByteUnit::Megabyte => "megabyte",
            ByteUnit::Gigabyte => "gigabyte",
            ByteUnit::Terabyte => "terabyte",
        }
    }

    pub fn divisor(self) -> f64 {
        1024f64.powi(self.exponent())
    }

    pub fn convert(self, bytes: u64) -> f64 {
        bytes as f64 / self.divisor()
    }
}

impl Default for ByteUnit {
    fn default() -> Self {
        ByteUnit::Gigabyte
    }
}

impl fmt::Display for ByteUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ByteUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ByteUnit::ALL
            .into_iter()
            .find(|u| u.name() == wanted)
            .ok_or_else(|| format!("unknown byte unit '{}' (expected one of byte, kilobyte, megabyte, gigabyte, terabyte)", s))
    }
}

impl TryFrom<String> for ByteUnit {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Round half away from zero to `precision` decimal places.
pub fn round_to(value: f64, precision: u32) -> f64 {
    let scale = 10f64.powi(precision as i32);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unit_names() {
        assert_eq!("gigabyte".parse::<ByteUnit>().unwrap(), ByteUnit::Gigabyte);
        assert_eq!(" MegaByte ".parse::<ByteUnit>().unwrap(), ByteUnit::Megabyte);
        assert!("gibibyte".parse::<ByteUnit>().is_err());
    }

    #[test]
    fn test_convert_powers_of_1024() {
        assert_eq!(ByteUnit::Byte.convert(1536), 1536.0);
        assert_eq!(ByteUnit::Kilobyte.convert(1536), 1.5);
        assert_eq!(ByteUnit::Megabyte.convert(3 * 1024 * 1024), 3.0);
        assert_eq!(ByteUnit::Gigabyte.convert(1 << 30), 1.0);
        assert_eq!(ByteUnit::Terabyte.convert(1 << 41), 2.0);
    }

    #[test]
    fn test_round_to_two_places() {
        assert_eq!(round_to(284.525_726_318_359_4, 2), 284.53);
        assert_eq!(round_to(1090.826_110_839_843_8, 2), 1090.83);
        assert_eq!(round_to(1020.962_257_385_253_9, 2), 1020.96);
        assert_eq!(round_to(7.0, 2), 7.0);
    }

    #[test]
    fn test_converted_value_reconstructs_bytes() {
        let quantities = [0u64, 1, 4095, 1_476_769_812_480, 305_509_539_840, 9_876_543_210_123];
        for unit in ByteUnit::ALL {
            for bytes in quantities {
                let rounded = round_to(unit.convert(bytes), 2);
                let back = rounded * unit.divisor();
                let err_in_unit = (back - bytes as f64).abs() / unit.divisor();
                assert!(err_in_unit <= 0.005 + 1e-9, "{} {} -> {}", unit, bytes, rounded);
            }
        }
    }

    #[test]
    fn test_deserialize_from_toml_string() {
        #[derive(Deserialize)]
        struct Wrap { unit: ByteUnit }
        let w: Wrap = toml::from_str("unit = \"Terabyte\"").unwrap();
        assert_eq!(w.unit, ByteUnit::Terabyte);
        assert!(toml::from_str::<Wrap>("unit = \"bit\"").is_err());
    }
}
