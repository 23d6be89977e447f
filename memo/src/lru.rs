use generational_arena::{Arena, Index};

#[derive(Debug)]
struct Node<K> {
  key: K,
  next: Option<Index>,
  prev: Option<Index>,
}

/// Access-ordered list of keys backed by an arena.
///
/// Callers keep the returned [`Index`] next to their entry, so moves and
/// removals never need a key lookup.
#[derive(Debug)]
pub(crate) struct LruList<K> {
  nodes: Arena<Node<K>>,
  // Most recently used.
  head: Option<Index>,
  // Least recently used.
  tail: Option<Index>,
}

impl<K> LruList<K> {
  pub(crate) fn new() -> Self {
    Self {
      nodes: Arena::new(),
      head: None,
      tail: None,
    }
  }

  pub(crate) fn len(&self) -> usize {
    self.nodes.len()
  }

  fn unlink(&mut self, index: Index) {
    let (prev, next) = {
      let node = &self.nodes[index];
      (node.prev, node.next)
    };

    match prev {
      Some(prev) => self.nodes[prev].next = next,
      None => self.head = next,
    }
    match next {
      Some(next) => self.nodes[next].prev = prev,
      None => self.tail = prev,
    }
  }

  fn link_front(&mut self, index: Index) {
    let old_head = self.head;
    self.nodes[index].next = old_head;
    self.nodes[index].prev = None;
    self.head = Some(index);

    match old_head {
      Some(old_head) => self.nodes[old_head].prev = Some(index),
      None => self.tail = Some(index),
    }
  }

  /// Inserts `key` as the most recently used element.
  pub(crate) fn push_front(&mut self, key: K) -> Index {
    let index = self.nodes.insert(Node {
      key,
      next: None,
      prev: None,
    });
    self.link_front(index);
    index
  }

  /// Marks the element at `index` as most recently used.
  pub(crate) fn touch(&mut self, index: Index) {
    if self.head != Some(index) && self.nodes.contains(index) {
      self.unlink(index);
      self.link_front(index);
    }
  }

  pub(crate) fn remove(&mut self, index: Index) -> Option<K> {
    if !self.nodes.contains(index) {
      return None;
    }
    self.unlink(index);
    self.nodes.remove(index).map(|node| node.key)
  }

  /// Removes and returns the least recently used key.
  pub(crate) fn pop_back(&mut self) -> Option<K> {
    let tail = self.tail?;
    self.remove(tail)
  }

  pub(crate) fn clear(&mut self) {
    self.nodes.clear();
    self.head = None;
    self.tail = None;
  }

  // Keys from most to least recently used.
  #[cfg(test)]
  fn keys_as_vec(&self) -> Vec<K>
  where
    K: Clone,
  {
    let mut keys = Vec::new();
    let mut current = self.head;
    while let Some(index) = current {
      keys.push(self.nodes[index].key.clone());
      current = self.nodes[index].next;
    }
    keys
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn new_list_is_empty() {
    let mut list = LruList::<i32>::new();
    assert_eq!(list.len(), 0);
    assert!(list.keys_as_vec().is_empty());
    assert_eq!(list.pop_back(), None);
  }

  #[test]
  fn push_front_orders_by_recency() {
    let mut list = LruList::new();
    list.push_front(10);
    list.push_front(20);
    list.push_front(30);
    assert_eq!(list.keys_as_vec(), vec![30, 20, 10]);
    assert_eq!(list.len(), 3);
  }

  #[test]
  fn touch_moves_to_front() {
    let mut list = LruList::new();
    let ten = list.push_front(10);
    list.push_front(20);
    let thirty = list.push_front(30);

    list.touch(ten);
    assert_eq!(list.keys_as_vec(), vec![10, 30, 20]);

    // Touching the head is a no-op.
    list.touch(ten);
    assert_eq!(list.keys_as_vec(), vec![10, 30, 20]);

    list.touch(thirty);
    assert_eq!(list.keys_as_vec(), vec![30, 10, 20]);
  }

  #[test]
  fn pop_back_returns_least_recent() {
    let mut list = LruList::new();
    let one = list.push_front(1);
    list.push_front(2);
    list.push_front(3);
    list.touch(one);

    assert_eq!(list.pop_back(), Some(2));
    assert_eq!(list.pop_back(), Some(3));
    assert_eq!(list.pop_back(), Some(1));
    assert_eq!(list.pop_back(), None);
    assert_eq!(list.len(), 0);
  }

  #[test]
  fn remove_middle_head_and_tail() {
    let mut list = LruList::new();
    let a = list.push_front("a");
    let b = list.push_front("b");
    let c = list.push_front("c");
    let d = list.push_front("d");

    assert_eq!(list.remove(b), Some("b"));
    assert_eq!(list.keys_as_vec(), vec!["d", "c", "a"]);

    assert_eq!(list.remove(d), Some("d"));
    assert_eq!(list.keys_as_vec(), vec!["c", "a"]);

    assert_eq!(list.remove(a), Some("a"));
    assert_eq!(list.keys_as_vec(), vec!["c"]);

    // Stale handles are ignored.
    assert_eq!(list.remove(a), None);
    list.touch(b);

    assert_eq!(list.remove(c), Some("c"));
    assert!(list.keys_as_vec().is_empty());
  }

  #[test]
  fn clear_resets_everything() {
    let mut list = LruList::new();
    list.push_front(1);
    list.push_front(2);
    list.clear();
    assert_eq!(list.len(), 0);
    assert_eq!(list.pop_back(), None);

    list.push_front(3);
    assert_eq!(list.keys_as_vec(), vec![3]);
  }
}
