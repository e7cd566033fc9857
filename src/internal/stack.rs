//! Minimal stack abstraction over the containers used for frame stacks
//!
//! The [`Writer`](crate::writer::Writer) keeps one saved frame per open
//! `fork()`. Nesting is usually shallow, so the backing container is chosen
//! at compile-time: a plain `Vec` by default, or an inline `SmallVec` with the
//! `smallvec_framestack` feature.

pub(crate) trait Stack {
    /// Type of the values that are pushed onto the stack.
    type Item: Copy;

    /// Removes and returns the topmost value of the stack, or `None` if it
    /// is empty.
    fn pop(&mut self) -> Option<Self::Item>;

    /// Push `item` onto the top of the stack.
    fn push(&mut self, item: Self::Item);

    /// Number of items currently on the stack
    fn depth(&self) -> usize;

    /// Removes every item from the stack.
    fn clear(&mut self);
}

impl<T: Copy> Stack for Vec<T> {
    type Item = T;

    fn pop(&mut self) -> Option<Self::Item> {
        Vec::pop(self)
    }

    fn push(&mut self, item: Self::Item) {
        Vec::push(self, item)
    }

    fn depth(&self) -> usize {
        self.len()
    }

    fn clear(&mut self) {
        Vec::clear(self)
    }
}

#[cfg(feature = "smallvec_framestack")]
impl<A> Stack for smallvec::SmallVec<A>
where
    A: smallvec::Array,
    A::Item: Copy,
{
    type Item = A::Item;

    fn pop(&mut self) -> Option<Self::Item> {
        smallvec::SmallVec::pop(self)
    }

    fn push(&mut self, item: Self::Item) {
        smallvec::SmallVec::push(self, item)
    }

    fn depth(&self) -> usize {
        self.len()
    }

    fn clear(&mut self) {
        smallvec::SmallVec::clear(self)
    }
}

#[cfg(test)]
mod test {
    use super::Stack;

    #[test]
    fn lifo_order() {
        let mut stack: Vec<(usize, usize)> = Vec::new();
        assert_eq!(Stack::depth(&stack), 0);
        Stack::push(&mut stack, (1, 2));
        Stack::push(&mut stack, (3, 4));
        assert_eq!(Stack::depth(&stack), 2);
        assert_eq!(Stack::pop(&mut stack), Some((3, 4)));
        assert_eq!(Stack::pop(&mut stack), Some((1, 2)));
        assert_eq!(Stack::pop(&mut stack), None);
    }
}
