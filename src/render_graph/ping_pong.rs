//! Two-slot ping-pong storage.

/// One of the two slots of a [`PingPong`] pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Slot {
    A,
    B,
}

impl Slot {
    pub fn other(self) -> Self {
        match self {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        }
    }
}

/// A pair of equally-shaped values where one is read this frame and the other written.
///
/// The pipeline stores [`TargetId`](crate::TargetId)s here rather than textures, so
/// "which buffer is history" is always a plain index lookup:
///
/// ```text
/// frame N:   read A ── blend ──▶ write B   flip
/// frame N+1: read B ── blend ──▶ write A   flip
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PingPong<T> {
    a: T,
    b: T,
    read: Slot,
}

impl<T> PingPong<T> {
    /// Creates a pair whose read slot is `a`.
    pub fn new(a: T, b: T) -> Self {
        Self { a, b, read: Slot::A }
    }

    pub fn read_slot(&self) -> Slot {
        self.read
    }

    pub fn read(&self) -> &T {
        self.get(self.read)
    }

    pub fn write(&self) -> &T {
        self.get(self.read.other())
    }

    pub fn read_mut(&mut self) -> &mut T {
        match self.read {
            Slot::A => &mut self.a,
            Slot::B => &mut self.b,
        }
    }

    pub fn get(&self, slot: Slot) -> &T {
        match slot {
            Slot::A => &self.a,
            Slot::B => &self.b,
        }
    }

    /// Make the just-written slot the read slot.
    pub fn flip(&mut self) {
        self.read = self.read.other();
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        [&self.a, &self.b].into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flip_alternates_roles() {
        let mut pair = PingPong::new(1, 2);
        assert_eq!((*pair.read(), *pair.write()), (1, 2));
        pair.flip();
        assert_eq!((*pair.read(), *pair.write()), (2, 1));
        pair.flip();
        assert_eq!(pair.read_slot(), Slot::A);
    }

    #[test]
    fn read_and_write_never_alias() {
        let mut pair = PingPong::new('x', 'y');
        for _ in 0..5 {
            assert_ne!(pair.read(), pair.write());
            pair.flip();
        }
    }

    #[test]
    fn swapping_into_read_slot_replaces_history() {
        let mut pair = PingPong::new(10, 11);
        pair.flip();
        let mut current = 12;
        std::mem::swap(&mut current, pair.read_mut());
        assert_eq!(*pair.read(), 12);
        assert_eq!(current, 11);
        assert_eq!(*pair.write(), 10);
    }
}
