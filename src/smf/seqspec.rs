// Proprietary sequencer chunks, carried as SMF meta events of type
// 0x7F. Each chunk opens with a four-byte big-endian tag; the declared
// meta length covers the tag plus the payload.

use crate::smf::vlq;

/// Chunk tags: 0x242400nn with `nn` identifying the field.
pub mod tag {
    pub const MIDI_BUS: u32 = 0x2424_0001;
    pub const MIDI_CHANNEL: u32 = 0x2424_0002;
    pub const TIME_SIG: u32 = 0x2424_0006;
    pub const TRIGGERS_EX: u32 = 0x2424_0008;
    pub const MUSIC_KEY: u32 = 0x2424_0011;
    pub const MUSIC_SCALE: u32 = 0x2424_0012;
    pub const BACKGROUND_SEQUENCE: u32 = 0x2424_0013;
    pub const TRANSPOSE: u32 = 0x2424_0014;
    pub const SEQ_COLOR: u32 = 0x2424_001B;
    pub const SEQ_LOOP_COUNT: u32 = 0x2424_001D;
    pub const TRIG_TRANSPOSE: u32 = 0x2424_0020;
}

/// True for tags this engine understands.
pub fn is_known_tag(tag: u32) -> bool {
    matches!(
        tag,
        tag::MIDI_BUS
            | tag::MIDI_CHANNEL
            | tag::TIME_SIG
            | tag::TRIGGERS_EX
            | tag::MUSIC_KEY
            | tag::MUSIC_SCALE
            | tag::BACKGROUND_SEQUENCE
            | tag::TRANSPOSE
            | tag::SEQ_COLOR
            | tag::SEQ_LOOP_COUNT
            | tag::TRIG_TRANSPOSE
    )
}

/// Serialized size of one chunk carrying `data_len` payload bytes:
/// delta byte + 0xFF + 0x7F + length quantity + tag + payload.
pub fn item_size(data_len: usize) -> usize {
    3 + vlq::encoded_len((data_len + 4) as u64) + 4 + data_len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_low_bytes() {
        assert_eq!(tag::MIDI_BUS & 0xFF, 0x01);
        assert_eq!(tag::TRIGGERS_EX & 0xFF, 0x08);
        assert_eq!(tag::TRIG_TRANSPOSE & 0xFF, 0x20);
        assert_eq!(tag::MIDI_BUS >> 16, 0x2424);
    }

    #[test]
    fn test_item_size_small_payload() {
        // 1-byte payload: 3 framing + 1 length byte + 4 tag + 1 data
        assert_eq!(item_size(1), 9);
        // Declared length is payload + tag; it crosses the one-byte
        // quantity limit at a 0x7B-byte payload (0x7B + 4 = 0x7F)
        assert_eq!(item_size(0x7B), 3 + 1 + 4 + 0x7B);
        assert_eq!(item_size(0x7C), 3 + 2 + 4 + 0x7C);
    }

    #[test]
    fn test_known_tags() {
        assert!(is_known_tag(tag::SEQ_COLOR));
        assert!(!is_known_tag(0x2424_00FF));
        assert!(!is_known_tag(0x1111_0001));
    }
}
