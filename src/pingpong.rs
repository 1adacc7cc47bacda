//! Double-buffered field storage.
//!
//! A [`PingPong`] owns two equal-sized buffers. At the start of a step
//! `read` holds the previous frame's state and `write` is scratch; after the
//! step [`PingPong::swap`] exchanges the roles by flipping an index, without
//! touching the buffers themselves.
//!
//! [`PingPong::split_mut`] is the only way to reach `write` mutably, and it
//! hands out `read` shared at the same time, so one buffer can never be both
//! the input and the output of a pass.

/// Two buffers with swappable read/write roles.
#[derive(Debug)]
pub struct PingPong<T> {
    buffers: [T; 2],
    read: usize,
}

impl<T> PingPong<T> {
    /// Pair two buffers; `a` starts as `read`.
    pub fn new(a: T, b: T) -> Self {
        Self {
            buffers: [a, b],
            read: 0,
        }
    }

    /// Build both buffers with the same constructor, stopping at the first failure.
    pub fn try_from_fn<E>(mut make: impl FnMut(usize) -> Result<T, E>) -> Result<Self, E> {
        let a = make(0)?;
        let b = make(1)?;
        Ok(Self::new(a, b))
    }

    /// The authoritative buffer from the previous step.
    #[inline]
    pub fn read(&self) -> &T {
        &self.buffers[self.read]
    }

    /// The scratch buffer this step writes into.
    #[inline]
    pub fn write(&self) -> &T {
        &self.buffers[1 - self.read]
    }

    /// Borrow `read` shared and `write` exclusively.
    pub fn split_mut(&mut self) -> (&T, &mut T) {
        let [a, b] = &mut self.buffers;
        if self.read == 0 {
            (&*a, b)
        } else {
            (&*b, a)
        }
    }

    /// Exchange roles. O(1), no data is moved.
    #[inline]
    pub fn swap(&mut self) {
        self.read = 1 - self.read;
    }

    /// Overwrite the `read` buffer through `fill`, leaving `write` untouched.
    pub fn reset<R>(&mut self, fill: impl FnOnce(&mut T) -> R) -> R {
        fill(&mut self.buffers[self.read])
    }

    /// Which slot currently plays `read` (0 or 1).
    #[inline]
    pub fn read_slot(&self) -> usize {
        self.read
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_exchanges_identities() {
        let mut pair = PingPong::new(vec![1.0f32], vec![2.0f32]);
        let read_before: *const Vec<f32> = pair.read();
        let write_before: *const Vec<f32> = pair.write();

        pair.swap();

        assert!(std::ptr::eq(pair.read(), write_before));
        assert!(std::ptr::eq(pair.write(), read_before));
        assert_eq!(pair.read(), &vec![2.0]);
        assert_eq!(pair.read_slot(), 1);

        pair.swap();
        assert!(std::ptr::eq(pair.read(), read_before));
    }

    #[test]
    fn test_split_mut_writes_scratch_only() {
        let mut pair = PingPong::new(vec![0u8; 4], vec![0u8; 4]);
        {
            let (read, write) = pair.split_mut();
            write.copy_from_slice(&[9; 4]);
            assert_eq!(read, &vec![0; 4]);
        }
        assert_eq!(pair.read(), &vec![0; 4]);
        assert_eq!(pair.write(), &vec![9; 4]);

        pair.swap();
        let (read, write) = pair.split_mut();
        assert_eq!(read, &vec![9; 4]);
        assert_eq!(write, &mut vec![0; 4]);
    }

    #[test]
    fn test_reset_leaves_write_untouched() {
        let mut pair = PingPong::new(vec![1, 1], vec![2, 2]);
        pair.swap();
        pair.reset(|read| read.fill(7));
        assert_eq!(pair.read(), &vec![7, 7]);
        assert_eq!(pair.write(), &vec![1, 1]);
        assert_eq!(pair.read_slot(), 1);
    }

    #[test]
    fn test_try_from_fn_stops_on_error() {
        let mut calls = 0;
        let result: Result<PingPong<u32>, &str> = PingPong::try_from_fn(|slot| {
            calls += 1;
            if slot == 1 {
                Err("out of memory")
            } else {
                Ok(0)
            }
        });
        assert_eq!(result.unwrap_err(), "out of memory");
        assert_eq!(calls, 2);
    }
}
