use super::ProtocolError;
use crate::game::constants::{NAME_MAX_BYTES, SKIN_MAX};

pub const START_LOGIN: u8 = 99;
pub const SETUP: u8 = 115;

pub const SECRET_LEN: usize = 24;
const SECRET_SPAN: usize = 17 + SECRET_LEN * 2;

/// Challenge-response permutation used for both `'6'` exchanges. The first
/// exchange permutes the entire frame (routing bytes included); the second
/// permutes the server-version payload. Both call sites pass the full byte
/// run they received.
pub fn decode_secret(raw: &[u8]) -> Result<[u8; SECRET_LEN], ProtocolError> {
    if raw.len() < SECRET_SPAN {
        return Err(ProtocolError::Handshake(format!(
            "secret material too short: {} bytes, need {SECRET_SPAN}",
            raw.len()
        )));
    }

    let mut out = [0u8; SECRET_LEN];
    let mut carry: i32 = 0;
    for i in 0..SECRET_LEN {
        let mut hi = raw[17 + 2 * i] as i32;
        if hi <= 96 {
            hi += 32;
        }
        hi = (hi - 98 - 34 * i as i32).rem_euclid(26);

        let mut lo = raw[18 + 2 * i] as i32;
        if lo <= 96 {
            lo += 32;
        }
        lo = (lo - 115 - 34 * i as i32).rem_euclid(26);

        let mut mixed = (hi << 4) | lo;
        let offset = if mixed >= 97 { 97 } else { 65 };
        mixed -= offset;
        if i == 0 {
            carry = 2 + mixed;
        }
        out[i] = ((mixed + carry).rem_euclid(26) + offset) as u8;
        carry += 3 + mixed;
    }
    Ok(out)
}

/// The server version must be pure ASCII letters; anything else means the
/// exchange is off the rails and the session should fail.
pub fn is_valid_version(payload: &[u8]) -> bool {
    !payload.is_empty() && payload.iter().all(|byte| byte.is_ascii_alphabetic())
}

/// Login/respawn packet: opcode 115, protocol version − 1, skin, nickname
/// length + bytes, then the custom-skin block or the `(0, 255)` sentinel.
pub fn setup_frame(
    protocol_version: u8,
    skin: u8,
    nickname: &str,
    custom_skin: Option<&[u8]>,
) -> Vec<u8> {
    let bytes = nickname.as_bytes();
    let mut end = bytes.len().min(NAME_MAX_BYTES);
    while !nickname.is_char_boundary(end) {
        end -= 1;
    }

    let mut frame = Vec::with_capacity(6 + end + custom_skin.map_or(0, <[u8]>::len));
    frame.push(SETUP);
    frame.push(protocol_version.wrapping_sub(1));
    frame.push(skin.min(SKIN_MAX));
    frame.push(end as u8);
    frame.extend_from_slice(&bytes[..end]);
    match custom_skin {
        Some(pattern) if !pattern.is_empty() => {
            let len = pattern.len().min(u8::MAX as usize);
            frame.push(len as u8);
            frame.extend_from_slice(&pattern[..len]);
        }
        _ => {
            frame.push(0);
            frame.push(255);
        }
    }
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_permutation_is_deterministic() {
        let mut raw = vec![7u8; 80];
        raw[20] = 113;
        let first = decode_secret(&raw).expect("secret");
        let second = decode_secret(&raw).expect("secret");
        assert_eq!(first, second);
    }

    #[test]
    fn secret_permutation_boundary_fixture() {
        let mut raw = vec![0u8; 17];
        for _ in 0..SECRET_LEN {
            raw.push(98);
            raw.push(115);
        }
        let out = decode_secret(&raw).expect("secret");
        assert!(out.iter().all(u8::is_ascii_alphabetic));
        // i = 0: both halves reduce to 0, mixed = -65, carry = -63,
        // (-128).rem_euclid(26) = 2, + 'A' = 67.
        assert_eq!(out[0], 67);
    }

    #[test]
    fn short_secret_material_is_rejected() {
        let raw = vec![0u8; SECRET_SPAN - 1];
        assert!(decode_secret(&raw).is_err());
    }

    #[test]
    fn version_validation_requires_letters_only() {
        assert!(is_valid_version(b"AbcDEF"));
        assert!(!is_valid_version(b"Abc1"));
        assert!(!is_valid_version(b"Abc_"));
        assert!(!is_valid_version(b""));
    }

    #[test]
    fn setup_frame_layout() {
        let frame = setup_frame(11, 7, "Tester", None);
        assert_eq!(frame[0], SETUP);
        assert_eq!(frame[1], 10);
        assert_eq!(frame[2], 7);
        assert_eq!(frame[3], 6);
        assert_eq!(&frame[4..10], b"Tester");
        assert_eq!(&frame[10..], &[0, 255]);
    }

    #[test]
    fn setup_frame_clamps_nickname_at_char_boundary() {
        // 8 × 'é' is 16 bytes; 13 × 'é' would be 26 and must clamp to 24.
        let name: String = std::iter::repeat('é').take(13).collect();
        let frame = setup_frame(11, 0, &name, None);
        let len = frame[3] as usize;
        assert!(len <= NAME_MAX_BYTES);
        assert!(std::str::from_utf8(&frame[4..4 + len]).is_ok());
    }

    #[test]
    fn setup_frame_carries_custom_skin() {
        let frame = setup_frame(11, 0, "A", Some(&[1, 2, 3]));
        assert_eq!(frame[3], 1);
        assert_eq!(frame[4], b'A');
        assert_eq!(frame[5], 3);
        assert_eq!(&frame[6..], &[1, 2, 3]);
    }
}
