use tokio::sync::{Mutex, MutexGuard};

/// A fixed number of items, each behind its own lock.
///
/// Locking one slot never blocks callers working on a different slot.
#[derive(Debug)]
pub struct LockArray<T> {
    slots: Box<[Mutex<T>]>,
}

impl<T> LockArray<T> {
    pub fn from_fn(len: usize, mut init: impl FnMut(usize) -> T) -> Self {
        Self {
            slots: (0..len).map(|i| Mutex::new(init(i))).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Lock the slot at `index`, or `None` if it is out of bounds.
    pub async fn lock(&self, index: usize) -> Option<MutexGuard<'_, T>> {
        match self.slots.get(index) {
            Some(slot) => Some(slot.lock().await),
            None => None,
        }
    }

    /// Lock every slot in index order. Callers that need more than one slot
    /// must go through here so locks are always taken in the same order.
    pub async fn lock_all(&self) -> Vec<MutexGuard<'_, T>> {
        let mut guards = Vec::with_capacity(self.slots.len());
        for slot in self.slots.iter() {
            guards.push(slot.lock().await);
        }
        guards
    }
}

impl<T: Clone> LockArray<T> {
    /// Copy out every slot, one lock at a time. The result is not a single
    /// consistent cut across slots.
    pub async fn snapshot(&self) -> Vec<T> {
        let mut values = Vec::with_capacity(self.slots.len());
        for slot in self.slots.iter() {
            values.push(slot.lock().await.clone());
        }
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn from_fn_initializes_each_slot() {
        let slots = LockArray::from_fn(3, |i| i * 10);
        assert_eq!(slots.len(), 3);
        assert_eq!(slots.snapshot().await, vec![0, 10, 20]);
    }

    #[tokio::test]
    async fn lock_out_of_bounds_is_none() {
        let slots = LockArray::from_fn(2, |_| ());
        assert!(slots.lock(2).await.is_none());
    }

    #[tokio::test]
    async fn slots_lock_independently() {
        let slots = LockArray::from_fn(2, |_| 0u32);
        let mut first = slots.lock(0).await.unwrap();
        // Holding slot 0 must not block slot 1.
        let mut second = slots.lock(1).await.unwrap();
        *first += 1;
        *second += 2;
        drop(first);
        drop(second);
        assert_eq!(slots.snapshot().await, vec![1, 2]);
    }

    #[tokio::test]
    async fn lock_all_holds_every_slot() {
        let slots = LockArray::from_fn(3, |_| false);
        {
            let mut guards = slots.lock_all().await;
            for guard in guards.iter_mut() {
                **guard = true;
            }
            assert!(slots.slots[1].try_lock().is_err());
        }
        assert_eq!(slots.snapshot().await, vec![true, true, true]);
    }
}
