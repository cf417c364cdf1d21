use core::hash::BuildHasher;
use core::hash::Hash;
use core::marker::PhantomData;

cfg_if::cfg_if! {
    if #[cfg(feature = "foldhash")] {
        /// Hasher builder used when none is supplied.
        pub type DefaultHashBuilder = foldhash::fast::RandomState;
    } else if #[cfg(feature = "std")] {
        /// Hasher builder used when none is supplied.
        pub type DefaultHashBuilder = std::hash::RandomState;
    }
}

/// The capabilities a table type hands to the diagnostics: how to hash a
/// key, how to compare a stored slot against a key, and how a slot is laid
/// out in memory.
///
/// A policy must agree with the hash and equality the table was populated
/// with. A mismatched policy is not detected; it produces meaningless probe
/// counts.
///
/// # Examples
///
/// ```rust
/// use swiss_probe::Policy;
///
/// struct ById;
///
/// struct User {
///     id: u64,
///     name: String,
/// }
///
/// impl Policy for ById {
///     type Key = u64;
///     type Slot = User;
///
///     fn hash(&self, key: &u64) -> u64 {
///         key.wrapping_mul(0x9E37_79B9_7F4A_7C15)
///     }
///
///     fn eq(&self, slot: &User, key: &u64) -> bool {
///         slot.id == *key
///     }
///
///     fn key<'s>(&self, slot: &'s User) -> &'s u64 {
///         &slot.id
///     }
/// }
///
/// assert_eq!(ById.slot_size(), core::mem::size_of::<User>());
/// ```
pub trait Policy {
    /// The lookup key type.
    type Key: ?Sized;

    /// The element type stored in each slot.
    type Slot;

    /// Hashes `key` exactly as the table does.
    fn hash(&self, key: &Self::Key) -> u64;

    /// Returns `true` if the element in `slot` is the one `key` names.
    fn eq(&self, slot: &Self::Slot, key: &Self::Key) -> bool;

    /// The key of a stored element.
    fn key<'s>(&self, slot: &'s Self::Slot) -> &'s Self::Key;

    /// Size in bytes of one slot.
    fn slot_size(&self) -> usize {
        core::mem::size_of::<Self::Slot>()
    }

    /// Alignment in bytes of one slot.
    fn slot_align(&self) -> usize {
        core::mem::align_of::<Self::Slot>()
    }
}

impl<P> Policy for &P
where
    P: Policy + ?Sized,
{
    type Key = P::Key;
    type Slot = P::Slot;

    #[inline]
    fn hash(&self, key: &Self::Key) -> u64 {
        (**self).hash(key)
    }

    #[inline]
    fn eq(&self, slot: &Self::Slot, key: &Self::Key) -> bool {
        (**self).eq(slot, key)
    }

    #[inline]
    fn key<'s>(&self, slot: &'s Self::Slot) -> &'s Self::Key {
        (**self).key(slot)
    }

    fn slot_size(&self) -> usize {
        (**self).slot_size()
    }

    fn slot_align(&self) -> usize {
        (**self).slot_align()
    }
}

/// Policy for a set: each slot holds a `T` that is its own key.
pub struct SetPolicy<T, S> {
    hash_builder: S,
    _marker: PhantomData<fn(&T)>,
}

impl<T, S> SetPolicy<T, S> {
    /// Creates a set policy hashing with `hash_builder`.
    pub const fn with_hasher(hash_builder: S) -> Self {
        Self {
            hash_builder,
            _marker: PhantomData,
        }
    }

    /// The hasher builder this policy hashes with.
    pub fn hasher(&self) -> &S {
        &self.hash_builder
    }
}

impl<T, S: Clone> Clone for SetPolicy<T, S> {
    fn clone(&self) -> Self {
        Self::with_hasher(self.hash_builder.clone())
    }
}

impl<T, S: Default> Default for SetPolicy<T, S> {
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<T, S> Policy for SetPolicy<T, S>
where
    T: Hash + Eq,
    S: BuildHasher,
{
    type Key = T;
    type Slot = T;

    #[inline]
    fn hash(&self, key: &T) -> u64 {
        self.hash_builder.hash_one(key)
    }

    #[inline]
    fn eq(&self, slot: &T, key: &T) -> bool {
        slot == key
    }

    #[inline]
    fn key<'s>(&self, slot: &'s T) -> &'s T {
        slot
    }
}

/// Policy for a map: each slot holds a `(K, V)` pair keyed by `K`.
pub struct MapPolicy<K, V, S> {
    hash_builder: S,
    _marker: PhantomData<fn(&K, &V)>,
}

impl<K, V, S> MapPolicy<K, V, S> {
    /// Creates a map policy hashing keys with `hash_builder`.
    pub const fn with_hasher(hash_builder: S) -> Self {
        Self {
            hash_builder,
            _marker: PhantomData,
        }
    }

    /// The hasher builder this policy hashes with.
    pub fn hasher(&self) -> &S {
        &self.hash_builder
    }
}

impl<K, V, S: Clone> Clone for MapPolicy<K, V, S> {
    fn clone(&self) -> Self {
        Self::with_hasher(self.hash_builder.clone())
    }
}

impl<K, V, S: Default> Default for MapPolicy<K, V, S> {
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S> Policy for MapPolicy<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    type Key = K;
    type Slot = (K, V);

    #[inline]
    fn hash(&self, key: &K) -> u64 {
        self.hash_builder.hash_one(key)
    }

    #[inline]
    fn eq(&self, slot: &(K, V), key: &K) -> bool {
        slot.0 == *key
    }

    #[inline]
    fn key<'s>(&self, slot: &'s (K, V)) -> &'s K {
        &slot.0
    }
}
