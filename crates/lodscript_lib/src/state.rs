use byteorder::{ByteOrder, LittleEndian};

use crate::ScriptError;

/// Read head over a script buffer.
///
/// `header` is the start of the instruction being decoded and `current` walks through its
/// header and parameters. The cursor is a plain value: every linear scan works on its own copy,
/// so sibling branches never observe each other's position.
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    header: usize,
    current: usize,
    param2: i32,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, header: 0, current: 0, param2: 0 }
    }

    /// Length in bytes of the whole words in the buffer. Trailing bytes are not addressable.
    pub fn len(&self) -> usize {
        self.buf.len() & !0x3
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn word_count(&self) -> usize {
        self.len() / 4
    }

    pub fn word_at(&self, offset: usize) -> Result<u32, ScriptError> {
        if offset & 0x3 != 0 {
            return Err(ScriptError::Misaligned(offset));
        }
        if offset >= self.len() {
            return Err(ScriptError::OutOfBounds { offset, len: self.len() });
        }
        Ok(LittleEndian::read_u32(&self.buf[offset..offset + 4]))
    }

    pub fn current_word(&self) -> Result<u32, ScriptError> {
        self.word_at(self.current)
    }

    /// Whether `words` consecutive words starting at the current offset are inside the buffer.
    pub fn has_words(&self, words: usize) -> bool {
        self.current
            .checked_add(words * 4)
            .is_some_and(|end| end <= self.len())
    }

    pub fn advance(&mut self, words: usize) {
        self.current += words * 4;
    }

    /// Starts a new instruction at the current offset.
    pub fn step(&mut self) {
        self.header = self.current;
    }

    pub fn jump(&mut self, offset: usize) {
        self.header = offset;
        self.current = offset;
    }

    pub fn has_more(&self) -> bool {
        self.current < self.len()
    }

    pub fn header_offset(&self) -> usize {
        self.header
    }

    pub fn current_offset(&self) -> usize {
        self.current
    }

    /// Secondary immediate latched by the last [`Cursor::param_type`] read.
    pub fn param2(&self) -> i32 {
        self.param2
    }

    /// Reads the parameter-type code from the top byte of the current word and latches the byte
    /// below it as `param2`.
    pub fn param_type(&mut self) -> Result<u8, ScriptError> {
        let word = self.current_word()?;
        self.param2 = (word >> 16 & 0xff) as i32;
        Ok((word >> 24) as u8)
    }

    /// Converts a computed address into a word offset if it is aligned and inside the buffer.
    pub fn word_offset(&self, address: i64) -> Option<usize> {
        let offset = usize::try_from(address).ok()?;
        (offset & 0x3 == 0 && offset < self.len()).then_some(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buf(words: &[u32]) -> Vec<u8> {
        let mut out = vec![0; words.len() * 4];
        LittleEndian::write_u32_into(words, &mut out);
        out
    }

    #[test]
    fn reads_words_little_endian() {
        let bytes = buf(&[0x1234_5678, 0xdead_beef]);
        let c = Cursor::new(&bytes);
        assert_eq!(c.word_at(0).unwrap(), 0x1234_5678);
        assert_eq!(c.word_at(4).unwrap(), 0xdead_beef);
        assert_eq!(c.word_count(), 2);
    }

    #[test]
    fn out_of_bounds_and_misaligned_reads_fail() {
        let bytes = buf(&[1, 2]);
        let c = Cursor::new(&bytes);
        assert!(matches!(c.word_at(8), Err(ScriptError::OutOfBounds { offset: 8, len: 8 })));
        assert!(matches!(c.word_at(2), Err(ScriptError::Misaligned(2))));
    }

    #[test]
    fn trailing_bytes_are_not_addressable() {
        let mut bytes = buf(&[1]);
        bytes.extend_from_slice(&[0xaa, 0xbb]);
        let c = Cursor::new(&bytes);
        assert_eq!(c.len(), 4);
        assert!(c.word_at(4).is_err());
    }

    #[test]
    fn step_and_advance_track_header() {
        let bytes = buf(&[0, 0, 0, 0]);
        let mut c = Cursor::new(&bytes);
        c.jump(4);
        c.step();
        c.advance(2);
        assert_eq!(c.header_offset(), 4);
        assert_eq!(c.current_offset(), 12);
        assert!(c.has_more());
        assert!(c.has_words(1));
        assert!(!c.has_words(2));
        c.advance(1);
        assert!(!c.has_more());
    }

    #[test]
    fn copies_are_independent() {
        let bytes = buf(&[0, 0, 0, 0]);
        let mut a = Cursor::new(&bytes);
        a.jump(8);
        let mut b = a;
        b.advance(1);
        assert_eq!(a.current_offset(), 8);
        assert_eq!(b.current_offset(), 12);
    }

    #[test]
    fn param_type_latches_param2() {
        let bytes = buf(&[0x0d03_fffe]);
        let mut c = Cursor::new(&bytes);
        assert_eq!(c.param_type().unwrap(), 0x0d);
        assert_eq!(c.param2(), 3);
    }

    #[test]
    fn word_offset_validation() {
        let bytes = buf(&[0, 0]);
        let c = Cursor::new(&bytes);
        assert_eq!(c.word_offset(4), Some(4));
        assert_eq!(c.word_offset(6), None);
        assert_eq!(c.word_offset(8), None);
        assert_eq!(c.word_offset(-4), None);
    }
}
