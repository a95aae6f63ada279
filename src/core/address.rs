use crate::error::AddressError;

/// `transfer(address,uint256)` function selector.
const ERC20_TRANSFER_SELECTOR: &str = "0xa9059cbb";

/// Validate an Ethereum address and return its lowercase form.
///
/// Checksums are not verified: any capitalization of the same 20 bytes maps to one key.
pub fn normalize(input: &str) -> Result<String, AddressError> {
    let trimmed = input.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| AddressError::Invalid(input.to_string()))?;

    if hex_part.len() != 40 || hex::decode(hex_part).is_err() {
        return Err(AddressError::Invalid(input.to_string()));
    }

    Ok(format!("0x{}", hex_part.to_ascii_lowercase()))
}

/// Recipient of an ERC-20 `transfer` call, read from the first ABI word of the calldata.
pub fn decode_erc20_recipient(input: &str) -> Option<String> {
    if input.len() < 74 || !input.starts_with(ERC20_TRANSFER_SELECTOR) {
        return None;
    }
    // 0x + selector(8) + 12 bytes of left padding(24)
    let recipient = input.get(34..74)?;
    normalize(&format!("0x{recipient}")).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_checksum_case() {
        let a = normalize("0xd5ED34b52AC4ab84d8FA8A231a3218bbF01Ed510").unwrap();
        let b = normalize("0xd5ed34b52ac4ab84d8fa8a231a3218bbf01ed510").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, "0xd5ed34b52ac4ab84d8fa8a231a3218bbf01ed510");
    }

    #[test]
    fn accepts_upper_prefix_and_whitespace() {
        assert_eq!(
            normalize("  0X00000000000000000000000000000000000000AB ").unwrap(),
            "0x00000000000000000000000000000000000000ab"
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!(normalize("").is_err());
        assert!(normalize("d5ed34b52ac4ab84d8fa8a231a3218bbf01ed510").is_err());
        assert!(normalize("0xd5ed34b52ac4ab84d8fa8a231a3218bbf01ed5").is_err());
        assert!(normalize("0xzzed34b52ac4ab84d8fa8a231a3218bbf01ed510").is_err());
        assert_eq!(
            normalize("0x12"),
            Err(AddressError::Invalid("0x12".to_string()))
        );
    }

    #[test]
    fn decodes_transfer_recipient() {
        let input = "0xa9059cbb\
            000000000000000000000000D5ED34B52AC4AB84D8FA8A231A3218BBF01ED510\
            0000000000000000000000000000000000000000000000000de0b6b3a7640000";
        assert_eq!(
            decode_erc20_recipient(input).as_deref(),
            Some("0xd5ed34b52ac4ab84d8fa8a231a3218bbf01ed510")
        );
    }

    #[test]
    fn ignores_other_calldata() {
        assert_eq!(decode_erc20_recipient("0x"), None);
        assert_eq!(decode_erc20_recipient("0x095ea7b3000000000000000000000000d5ed34b52ac4ab84d8fa8a231a3218bbf01ed510"), None);
    }
}
