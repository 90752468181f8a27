use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A thread-safe, reference-counted resource container with read-write locking.
///
/// `MtResource` is how the world engine shares a piece of state between the
/// owner thread and background I/O or generation threads. The persistence layer
/// uses it for the known-key index and the table of in-flight loads, both of
/// which are read on the hot path and written from completion handlers.
///
/// Locks never poison: a panic on a background thread leaves the data usable
/// for the owner thread.
///
/// # Examples
///
/// ```
/// use voxel_world_engine::core::MtResource;
///
/// let known = MtResource::new(Vec::<u64>::new());
/// let writer = known.clone();
///
/// std::thread::spawn(move || writer.get_mut().push(7))
///     .join()
///     .unwrap();
///
/// assert_eq!(known.get().as_slice(), &[7]);
/// ```
pub struct MtResource<T: Send + Sync> {
    resource: Arc<RwLock<T>>,
}

impl<T: Send + Sync> MtResource<T> {
    /// Creates a new `MtResource` containing the given value.
    pub fn new(resource: T) -> Self {
        Self {
            resource: Arc::new(RwLock::new(resource)),
        }
    }

    /// Returns a read guard. Several readers may hold one at the same time.
    pub fn get(&self) -> RwLockReadGuard<'_, T> {
        self.resource.read()
    }

    /// Returns an exclusive write guard.
    pub fn get_mut(&self) -> RwLockWriteGuard<'_, T> {
        self.resource.write()
    }

    /// Replaces the contained value and returns the previous one.
    pub fn replace(&self, value: T) -> T {
        std::mem::replace(&mut *self.resource.write(), value)
    }
}

impl<T: Send + Sync + Default> Default for MtResource<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Send + Sync> Clone for MtResource<T> {
    fn clone(&self) -> Self {
        Self {
            resource: self.resource.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MtResource;

    #[test]
    fn clones_share_the_same_value() {
        let a = MtResource::new(1u32);
        let b = a.clone();
        *b.get_mut() += 4;
        assert_eq!(*a.get(), 5);
    }

    #[test]
    fn replace_returns_previous_value() {
        let a = MtResource::new(String::from("old"));
        let previous = a.replace(String::from("new"));
        assert_eq!(previous, "old");
        assert_eq!(a.get().as_str(), "new");
    }
}
