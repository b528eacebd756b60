//! Ping-pong storage with named roles.
//!
//! The role of each slot is derived from a [`StepCounter`]: slot
//! `counter % 2` is current, the other is next. Swapping bumps the counter.

/// Identifies one of the two slots of a [`DoubleBuffer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferId {
    A,
    B,
}

impl BufferId {
    pub fn index(self) -> usize {
        match self {
            BufferId::A => 0,
            BufferId::B => 1,
        }
    }
    pub fn other(self) -> BufferId {
        match self {
            BufferId::A => BufferId::B,
            BufferId::B => BufferId::A,
        }
    }
    fn from_parity(parity: u64) -> BufferId {
        if parity % 2 == 0 { BufferId::A } else { BufferId::B }
    }
}

/// Number of completed simulation steps. Only ever incremented.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct StepCounter(u64);

impl StepCounter {
    pub fn get(self) -> u64 {
        self.0
    }
    pub fn current_id(self) -> BufferId {
        BufferId::from_parity(self.0)
    }
    fn increment(&mut self) {
        self.0 += 1;
    }
}

#[derive(Clone, Debug)]
pub struct DoubleBuffer<T> {
    slots: [T; 2],
    counter: StepCounter,
}

impl<T> DoubleBuffer<T> {
    /// `a` starts out as the current slot.
    pub fn new(a: T, b: T) -> Self {
        Self {
            slots: [a, b],
            counter: StepCounter::default(),
        }
    }

    pub fn counter(&self) -> StepCounter {
        self.counter
    }
    pub fn current_id(&self) -> BufferId {
        self.counter.current_id()
    }
    pub fn next_id(&self) -> BufferId {
        self.current_id().other()
    }
    pub fn current(&self) -> &T {
        &self.slots[self.current_id().index()]
    }
    pub fn next(&self) -> &T {
        &self.slots[self.next_id().index()]
    }
    pub fn get(&self, id: BufferId) -> &T {
        &self.slots[id.index()]
    }
    pub fn get_mut(&mut self, id: BufferId) -> &mut T {
        &mut self.slots[id.index()]
    }

    /// Borrow current for reading and next for writing at the same time.
    pub fn split(&mut self) -> (&T, &mut T) {
        let [a, b] = &mut self.slots;
        match self.counter.current_id() {
            BufferId::A => (&*a, b),
            BufferId::B => (&*b, a),
        }
    }

    /// Promote next to current. Returns the new `(current, next)` ids.
    pub fn swap(&mut self) -> (BufferId, BufferId) {
        self.counter.increment();
        (self.current_id(), self.next_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_follow_parity() {
        let mut buf = DoubleBuffer::new("a", "b");
        assert_eq!(buf.current_id(), BufferId::A);
        assert_eq!(*buf.current(), "a");
        assert_eq!(*buf.next(), "b");

        assert_eq!(buf.swap(), (BufferId::B, BufferId::A));
        assert_eq!(*buf.current(), "b");
        assert_eq!(*buf.next(), "a");
        assert_eq!(buf.counter().get(), 1);
    }

    #[test]
    fn no_drift_over_many_swaps() {
        let mut buf = DoubleBuffer::new(0u8, 1u8);
        for k in 1..=1000u64 {
            buf.swap();
            assert_eq!(buf.counter().get(), k);
            assert_eq!(buf.current_id().index() as u64, k % 2);
            assert_eq!(*buf.current() as u64, k % 2);
        }
    }

    #[test]
    fn split_never_aliases() {
        let mut buf = DoubleBuffer::new(vec![1], vec![2]);
        {
            let (cur, next) = buf.split();
            assert_eq!(cur, &vec![1]);
            next[0] = 9;
        }
        assert_eq!(buf.current(), &vec![1]);
        assert_eq!(buf.next(), &vec![9]);
        buf.swap();
        let (cur, next) = buf.split();
        assert_eq!(cur, &vec![9]);
        assert_eq!(next, &mut vec![1]);
    }
}
