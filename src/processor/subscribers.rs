use smallvec::SmallVec;

/// Id-keyed registry of the links of a processor.
///
/// - **SmallVec**: no heap allocation for the common case of 0-2 links.
/// - **Pre-allocation**: `reserve_id()` + `insert()` lets the subscription
///   handle know its id before the link is registered.
/// - **Snapshots**: emission clones the (cheap, reference counted) handles
///   out of the registry and iterates them without holding the lock, so
///   structural changes made meanwhile never tear the iteration.
pub(crate) struct Subscribers<L> {
  next_id: usize,
  items: SmallVec<[(usize, L); 2]>,
}

/// Snapshot of link handles taken for one emission.
pub(crate) type Snapshot<L> = SmallVec<[L; 4]>;

impl<L> Default for Subscribers<L> {
  fn default() -> Self { Self { next_id: 0, items: SmallVec::new() } }
}

impl<L> Subscribers<L> {
  /// Reserve the next id without adding a link.
  #[inline]
  pub fn reserve_id(&mut self) -> usize {
    let id = self.next_id;
    self.next_id += 1;
    id
  }

  /// Insert a link under an id from `reserve_id()`.
  #[inline]
  pub fn insert(&mut self, id: usize, link: L) { self.items.push((id, link)); }

  pub fn remove(&mut self, id: usize) -> Option<L> {
    self
      .items
      .iter()
      .position(|(i, _)| *i == id)
      .map(|pos| self.items.remove(pos).1)
  }

  #[inline]
  pub fn contains(&self, id: usize) -> bool { self.items.iter().any(|(i, _)| *i == id) }

  #[inline]
  pub fn len(&self) -> usize { self.items.len() }

  #[inline]
  pub fn is_empty(&self) -> bool { self.items.is_empty() }

  /// Removes every link, in subscription order.
  pub fn drain(&mut self) -> Snapshot<L> { self.items.drain(..).map(|(_, link)| link).collect() }

  #[inline]
  pub fn iter(&self) -> impl Iterator<Item = &L> { self.items.iter().map(|(_, link)| link) }
}

impl<L: Clone> Subscribers<L> {
  /// Clones the handles of the links matching `filter`.
  pub fn snapshot(&self, filter: impl Fn(&L) -> bool) -> Snapshot<L> {
    self.iter().filter(|l| filter(l)).cloned().collect()
  }
}

/// Hands `value` to every target: clones for all but the last one, which
/// receives the moved value.
pub(crate) fn broadcast_value<L, V: Clone>(targets: &[L], value: V, mut deliver: impl FnMut(&L, V)) {
  let mut iter = targets.iter().peekable();
  while let Some(target) = iter.next() {
    if iter.peek().is_some() {
      deliver(target, value.clone());
    } else {
      deliver(target, value);
      break;
    }
  }
}
