use crate::models::unit::ByteUnit;

/// Format a raw byte count into a human-readable string: "12.5 GB"
pub fn fmt_bytes(bytes: u64) -> String {
    let unit = ByteUnit::ALL
        .into_iter()
        .rev()
        .find(|u| bytes as f64 >= u.divisor())
        .unwrap_or(ByteUnit::Byte);

    match unit {
        ByteUnit::Byte => format!("{} B", bytes),
        _              => format!("{:.1} {}", unit.convert(bytes), abbrev(unit)),
    }
}

fn abbrev(unit: ByteUnit) -> &'static str {
    match unit {
        ByteUnit::Byte     => "B",
        ByteUnit::Kilobyte => "KB",
        ByteUnit::Megabyte => "MB",
        ByteUnit::Gigabyte => "GB",
        ByteUnit::Terabyte => "TB",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_bytes() {
        assert_eq!(fmt_bytes(0), "0 B");
        assert_eq!(fmt_bytes(1023), "1023 B");
        assert_eq!(fmt_bytes(1536), "1.5 KB");
        assert_eq!(fmt_bytes(305_509_539_840), "284.5 GB");
        assert_eq!(fmt_bytes(3 * (1 << 40)), "3.0 TB");
    }
}
