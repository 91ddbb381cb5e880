//! Immutable singly-linked list with structural sharing
//!
//! [`PersistentList<T>`] is a stack: [`add`](PersistentList::add) places a new
//! element at the head and shares the existing list as its tail, so every
//! previously obtained list stays valid and unchanged. Lists are used both
//! for the results of value expressions and as work-lists in traversals.
//!
//! The element at the head is the one added most recently. Building a list
//! from `[a, b, c]` with [`create`](PersistentList::create) therefore yields a
//! list whose head is `c`.

use std::fmt::Debug;
use std::sync::Arc;

use crate::internal::Trampoline;

struct ListNode<T> {
    head: T,
    tail: PersistentList<T>,
    size: usize,
}

/// Persistent stack-ordered list. Cloning is O(1).
pub struct PersistentList<T> {
    node: Option<Arc<ListNode<T>>>,
}

impl<T> PersistentList<T> {
    /// Constructs a new empty list
    #[must_use]
    pub const fn new() -> Self {
        Self { node: None }
    }

    /// Returns a list with `head` in front of `self`, leaving `self` untouched.
    #[must_use]
    pub fn add(&self, head: T) -> Self {
        Self {
            node: Some(Arc::new(ListNode {
                head,
                tail: self.clone(),
                size: self.len() + 1,
            })),
        }
    }

    #[must_use]
    pub fn head(&self) -> Option<&T> {
        self.node.as_ref().map(|node| &node.head)
    }

    /// Returns the list without its head, or an empty list if `self` is empty.
    #[must_use]
    pub fn tail(&self) -> Self {
        self.node
            .as_ref()
            .map_or_else(Self::new, |node| node.tail.clone())
    }

    /// Splits a non-empty list into references to its head and tail.
    #[must_use]
    pub fn split(&self) -> Option<(&T, &PersistentList<T>)> {
        self.node.as_ref().map(|node| (&node.head, &node.tail))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.node.as_ref().map_or(0, |node| node.size)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.node.is_none()
    }

    /// Iterates from the head (most recently added) to the end.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter { cur: self }
    }

    /// Returns `true` if both lists share the same first node.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.node, &other.node) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: Clone> PersistentList<T> {
    /// Builds a list by adding each element of `items` in turn, so that the
    /// last element becomes the head.
    pub fn create<I: IntoIterator<Item = T>>(items: I) -> Self {
        items
            .into_iter()
            .fold(Self::new(), |list, item| list.add(item))
    }

    /// Returns the elements of `self` in reverse order.
    #[must_use]
    pub fn reverse(&self) -> Self {
        reverse_onto(self.clone(), Self::new()).compute_result()
    }

    /// Places all elements of `other` in front of `self`, keeping their order,
    /// so that the head of `other` becomes the head of the result.
    #[must_use]
    pub fn add_all(&self, other: &Self) -> Self {
        reverse_onto(other.reverse(), self.clone()).compute_result()
    }

    /// Copies the elements into a `Vec`, head first.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }

    /// Returns the element at `index`, counting from the head.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.iter().nth(index)
    }
}

/// Moves every element of `input` onto `output`, reversing their order.
pub(crate) fn reverse_onto<'a, T: Clone + 'a>(
    input: PersistentList<T>,
    output: PersistentList<T>,
) -> Trampoline<'a, PersistentList<T>> {
    match input.split() {
        None => Trampoline::complete(output),
        Some((head, tail)) => {
            let output = output.add(head.clone());
            let tail = tail.clone();
            Trampoline::intermediate(move || reverse_onto(tail, output))
        }
    }
}

impl<T> Clone for PersistentList<T> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
        }
    }
}

impl<T> Default for PersistentList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for PersistentList<T> {
    // Unlinks uniquely owned nodes one at a time; the derived drop glue would
    // recurse once per element.
    fn drop(&mut self) {
        let mut cur = self.node.take();
        while let Some(node) = cur {
            match Arc::try_unwrap(node) {
                Ok(mut node) => cur = node.tail.node.take(),
                Err(_) => break,
            }
        }
    }
}

impl<T: PartialEq> PartialEq for PersistentList<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && (self.ptr_eq(other) || self.iter().zip(other.iter()).all(|(a, b)| a == b))
    }
}

impl<T: Eq> Eq for PersistentList<T> {}

impl<T: Debug> Debug for PersistentList<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: Clone> FromIterator<T> for PersistentList<T> {
    /// Collects so that the first element yielded becomes the head.
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::create(iter).reverse()
    }
}

/// Head-to-end iterator over a [`PersistentList`].
pub struct Iter<'a, T> {
    cur: &'a PersistentList<T>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let (head, tail) = self.cur.split()?;
        self.cur = tail;
        Some(head)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.cur.len(), Some(self.cur.len()))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<'a, T> IntoIterator for &'a PersistentList<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn add_shares_and_preserves() {
        let base = PersistentList::create([1, 2]);
        let one = base.add(3);
        let two = base.add(4);
        assert_eq!(base.to_vec(), vec![2, 1]);
        assert_eq!(one.to_vec(), vec![3, 2, 1]);
        assert_eq!(two.to_vec(), vec![4, 2, 1]);
        assert!(one.tail().ptr_eq(&base));
        assert!(two.tail().ptr_eq(&base));
    }

    #[test]
    fn reverse_and_add_all() {
        let list = PersistentList::create([1, 2, 3]);
        assert_eq!(list.reverse().to_vec(), vec![1, 2, 3]);
        let front = PersistentList::create([9, 8]);
        assert_eq!(list.add_all(&front).to_vec(), vec![8, 9, 3, 2, 1]);
        assert_eq!(PersistentList::<u8>::new().reverse().len(), 0);
    }

    #[test]
    fn collect_keeps_iteration_order() {
        let list: PersistentList<u8> = vec![1, 2, 3].into_iter().collect();
        assert_eq!(list.head(), Some(&1));
        assert_eq!(list.get(2), Some(&3));
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn long_lists_reverse_and_drop() {
        let list = PersistentList::create(0..500_000u32);
        let reversed = list.reverse();
        assert_eq!(reversed.head(), Some(&0));
        assert_eq!(reversed.len(), 500_000);
        drop(list);
        drop(reversed);
    }
}
