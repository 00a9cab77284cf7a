use crate::traits::writer::WriteTo;

/// Parses a hex dump such as `"02 00 07 63 6f"` into bytes, whitespace is ignored.
pub fn hex_to_bytes(s: &str) -> Option<Vec<u8>> {
    let digits: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    if !digits.len().is_multiple_of(2) {
        return None;
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            digits
                .get(i..i + 2)
                .and_then(|sub| u8::from_str_radix(sub, 16).ok())
        })
        .collect()
}

pub fn writable_to_bytes<E, T: WriteTo<Vec<u8>, Error = E>>(writable: &T) -> Result<Vec<u8>, E> {
    let mut bytes = vec![];
    writable.write_to(&mut bytes)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::hex_to_bytes;

    #[test]
    fn hex() {
        assert_eq!(hex_to_bytes("58 85"), Some(vec![0x58, 0x85]));
        assert_eq!(hex_to_bytes("0a0B"), Some(vec![0x0a, 0x0b]));
        assert_eq!(hex_to_bytes("123"), None);
        assert_eq!(hex_to_bytes("zz"), None);
    }
}
