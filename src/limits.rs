/// Longest accepted user or class name, in characters.
pub const MAX_NAME_LEN: usize = 50;

/// Widest date range a single schedule request may expand to.
pub const MAX_SCHEDULE_DAYS: i64 = 366;

pub const MAX_CLASS_CAPACITY: u32 = 10_000;

/// Check a user or class name against the length rule.
pub fn check_name(name: &str) -> Result<(), &'static str> {
    let len = name.chars().count();
    if len == 0 {
        return Err("name must not be empty");
    }
    if len > MAX_NAME_LEN {
        return Err("name too long");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_bounds() {
        assert!(check_name("").is_err());
        assert!(check_name("a").is_ok());
        assert!(check_name(&"x".repeat(MAX_NAME_LEN)).is_ok());
        assert!(check_name(&"x".repeat(MAX_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn name_length_counts_chars_not_bytes() {
        assert!(check_name(&"é".repeat(MAX_NAME_LEN)).is_ok());
    }
}
