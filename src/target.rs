//! Byte-oriented sinks for finished write operations
//!
//! The [`Writer`](crate::writer::Writer) defers every write until
//! [`finish`](crate::writer::Writer::finish), at which point each pending
//! operation is replayed into a `Target`. Keeping the replay generic over
//! `Target` lets the same operation logic fill the final buffer and, with
//! [`ByteCounter`], confirm the byte-length each operation announced when
//! it was queued.

/// Marker trait for byte-oriented buffers with incremental append operations
///
/// In most ways, it is convenient to think of `Target` as an analogous trait to
/// [`std::io::Write`]. The principal difference between the two is the fact
/// that the `push_XXX` methods on `Target` are infallible and total; while
/// they return a `usize` value representing the number of bytes written, this
/// is used only for book-keeping on the caller side, rather than a feedback
/// mechanism that may indicate failure or partial success.
pub trait Target {
    /// Performs any necessary operations that amortize the cost incurred by
    /// writing a certain number of additional bytes to the end of the `Target`.
    ///
    /// For many implementors, this may simply be a no-op.
    fn anticipate(&mut self, extra: usize);

    /// Returns a fresh object of the `Self` type with an initially empty buffer.
    fn create() -> Self;

    /// Appends a single byte to a Target object.
    ///
    /// This method should never panic under normal conditions, and the return value must be `1`.
    fn push_one(&mut self, b: u8) -> usize;

    /// Appends the bytes in a known-length array to a Target object.
    ///
    /// The operational semantics of this method should be indistinguishable from repeated
    /// calls to `push_one` over every element of the array in order. The return value must be `N`.
    fn push_many<const N: usize>(&mut self, arr: [u8; N]) -> usize;

    /// Appends the bytes in an arbitrary-length byte-slice to a Target object.
    ///
    /// The return value must be the total length of the slice.
    fn push_all(&mut self, buf: &[u8]) -> usize;
}

/// Useful alias for `std::io::Sink` that is used to count the number of
/// bytes an operation would write, without performing any memory operations.
pub type ByteCounter = std::io::Sink;

impl Target for ByteCounter {
    #[inline(always)]
    fn anticipate(&mut self, _: usize) {}

    #[inline]
    fn create() -> Self {
        std::io::sink()
    }

    #[inline(always)]
    fn push_one(&mut self, _: u8) -> usize {
        1
    }

    #[inline(always)]
    fn push_many<const N: usize>(&mut self, _: [u8; N]) -> usize {
        N
    }

    #[inline(always)]
    fn push_all(&mut self, buf: &[u8]) -> usize {
        buf.len()
    }
}

impl Target for Vec<u8> {
    #[inline]
    fn anticipate(&mut self, extra: usize) {
        self.reserve_exact(extra)
    }

    #[inline]
    fn create() -> Self {
        Self::new()
    }

    #[inline]
    fn push_one(&mut self, b: u8) -> usize {
        self.push(b);
        1
    }

    #[inline]
    fn push_many<const N: usize>(&mut self, arr: [u8; N]) -> usize {
        self.extend_from_slice(&arr);
        N
    }

    #[inline]
    fn push_all(&mut self, buf: &[u8]) -> usize {
        self.extend_from_slice(buf);
        buf.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn counter_matches_vec() {
        let mut counter: ByteCounter = Target::create();
        let mut buf: Vec<u8> = Target::create();
        let n = counter.push_one(7) + counter.push_many([1, 2, 3]) + counter.push_all(b"abcd");
        let m = buf.push_one(7) + buf.push_many([1, 2, 3]) + buf.push_all(b"abcd");
        assert_eq!(n, 8);
        assert_eq!(n, m);
        assert_eq!(buf, vec![7, 1, 2, 3, b'a', b'b', b'c', b'd']);
    }
}
