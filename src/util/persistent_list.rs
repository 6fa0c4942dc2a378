use std::rc::Rc;

/// A single cons cell, shared between every list that reaches it
struct Node<T> {
    value: T,
    next: Option<Rc<Node<T>>>
}

/// Immutable singly-linked list with tail sharing.
/// Pushing creates a new head that points at the existing list, so cloning and extending are both O(1).
/// Iteration yields the newest entry first.
pub struct PersistentList<T> {
    head: Option<Rc<Node<T>>>,
    len: usize
}

impl<T> Default for PersistentList<T> {
    fn default() -> Self {
        Self {
            head: None,
            len: 0
        }
    }
}

impl<T> Clone for PersistentList<T> {
    fn clone(&self) -> Self {
        Self {
            head: self.head.clone(),
            len: self.len
        }
    }
}

impl<T> Drop for PersistentList<T> {
    // unwind iteratively, a recursive drop overflows the stack on chromosome-length histories
    fn drop(&mut self) {
        let mut next = self.head.take();
        while let Some(node) = next {
            match Rc::try_unwrap(node) {
                Ok(mut owned) => next = owned.next.take(),
                Err(_) => break
            }
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for PersistentList<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T> PersistentList<T> {
    /// Creates an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new list with `value` at the front, sharing the rest with `self`
    pub fn push(&self, value: T) -> Self {
        Self {
            head: Some(Rc::new(Node {
                value,
                next: self.head.clone()
            })),
            len: self.len + 1
        }
    }

    /// The most recently pushed value
    pub fn head(&self) -> Option<&T> {
        self.head.as_ref().map(|n| &n.value)
    }

    /// Iterates from newest to oldest
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            next: self.head.as_deref()
        }
    }

    // getters
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T: Clone> PersistentList<T> {
    /// Copies the values out oldest-first
    pub fn to_vec_oldest_first(&self) -> Vec<T> {
        let mut ret: Vec<T> = self.iter().cloned().collect();
        ret.reverse();
        ret
    }
}

pub struct Iter<'a, T> {
    next: Option<&'a Node<T>>
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.next.map(|node| {
            self.next = node.next.as_deref();
            &node.value
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_shares_tail() {
        let base = PersistentList::new().push(1).push(2);
        let left = base.push(3);
        let right = base.push(4);

        assert_eq!(base.len(), 2);
        assert_eq!(left.iter().copied().collect::<Vec<i32>>(), vec![3, 2, 1]);
        assert_eq!(right.iter().copied().collect::<Vec<i32>>(), vec![4, 2, 1]);
        assert_eq!(right.head(), Some(&4));
        assert_eq!(left.to_vec_oldest_first(), vec![1, 2, 3]);
    }

    #[test]
    fn test_empty() {
        let list: PersistentList<u8> = PersistentList::new();
        assert!(list.is_empty());
        assert_eq!(list.head(), None);
        assert_eq!(list.iter().count(), 0);
    }

    #[test]
    fn test_long_list_drop() {
        let mut list = PersistentList::new();
        for i in 0..1_000_000 {
            list = list.push(i);
        }
        assert_eq!(list.len(), 1_000_000);
        let shared = list.clone();
        std::mem::drop(list);
        assert_eq!(shared.head(), Some(&999_999));
    }
}
