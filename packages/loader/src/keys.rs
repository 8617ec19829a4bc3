/// Surrogate keys for one table, handed out 1, 2, 3, ...
///
/// [`Self::peek`] only peeks; the key is spent by [`Self::commit`] once the
/// row using it is actually stored, so a failed insert leaves no gap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeySequence {
    last: i64,
}

impl KeySequence {
    #[must_use]
    pub const fn new() -> Self {
        Self { last: 0 }
    }

    /// Key the next stored row will get.
    #[must_use]
    pub const fn peek(&self) -> i64 {
        self.last + 1
    }

    /// Marks [`Self::peek`] as used and returns it.
    pub const fn commit(&mut self) -> i64 {
        self.last += 1;
        self.last
    }

    pub const fn reset(&mut self) {
        self.last = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peeking_does_not_consume() {
        let mut seq = KeySequence::new();
        assert_eq!(seq.peek(), 1);
        assert_eq!(seq.peek(), 1);
        assert_eq!(seq.commit(), 1);
        assert_eq!(seq.peek(), 2);
        seq.reset();
        assert_eq!(seq, KeySequence::new());
        assert_eq!(seq.peek(), 1);
    }
}
