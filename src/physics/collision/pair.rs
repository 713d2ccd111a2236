use std::collections::HashSet;

use crate::physics::{BodyKey, ColliderKey};

/// Identifies an unordered pair of colliders along with the bodies they're attached to.
///
/// The pair is canonicalized on construction, so `PairKey::new(a, .., b, ..)`
/// and `PairKey::new(b, .., a, ..)` are equal and hash the same.
/// The first collider of the canonical pair is the one with the lower key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PairKey {
    colliders: [ColliderKey; 2],
    bodies: [Option<BodyKey>; 2],
}

impl PairKey {
    pub fn new(
        coll1: ColliderKey,
        body1: Option<BodyKey>,
        coll2: ColliderKey,
        body2: Option<BodyKey>,
    ) -> Self {
        if coll2 < coll1 {
            Self {
                colliders: [coll2, coll1],
                bodies: [body2, body1],
            }
        } else {
            Self {
                colliders: [coll1, coll2],
                bodies: [body1, body2],
            }
        }
    }

    #[inline]
    pub fn colliders(&self) -> [ColliderKey; 2] {
        self.colliders
    }

    #[inline]
    pub fn bodies(&self) -> [Option<BodyKey>; 2] {
        self.bodies
    }

    #[inline]
    pub fn involves(&self, coll: ColliderKey) -> bool {
        self.colliders.contains(&coll)
    }
}

/// Ordered set of collider pairs, used to make sure each pair
/// is passed to the narrow phase only once per step.
#[derive(Clone, Debug, Default)]
pub struct PairSet {
    seen: HashSet<PairKey>,
    pairs: Vec<PairKey>,
}

impl PairSet {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pair, returning `true` if it wasn't in the set yet.
    pub fn insert(&mut self, pair: PairKey) -> bool {
        let is_new = self.seen.insert(pair);
        if is_new {
            self.pairs.push(pair);
        }
        is_new
    }

    #[inline]
    pub fn contains(&self, pair: &PairKey) -> bool {
        self.seen.contains(pair)
    }

    /// Pairs in the order they were first inserted.
    #[inline]
    pub fn as_slice(&self) -> &[PairKey] {
        &self.pairs
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn clear(&mut self) {
        self.seen.clear();
        self.pairs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{Body, Collider, EntitySet};
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    fn hash_of(pair: &PairKey) -> u64 {
        let mut hasher = DefaultHasher::new();
        pair.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn pair_key_is_symmetric() {
        let mut set = EntitySet::new();
        let body = set.insert_body(Body::new_kinematic());
        let c1 = set.attach_collider(body, Collider::new_circle(1.0).unwrap());
        let c2 = set.insert_collider(Collider::new_square(1.0).unwrap());

        let p1 = PairKey::new(c1, Some(body), c2, None);
        let p2 = PairKey::new(c2, None, c1, Some(body));
        assert_eq!(p1, p2);
        assert_eq!(hash_of(&p1), hash_of(&p2));
        // bodies travel with their colliders
        assert_eq!(p1.bodies(), p2.bodies());
        let [first, _] = p1.colliders();
        let first_body = if first == c1 { Some(body) } else { None };
        assert_eq!(p1.bodies()[0], first_body);
        assert!(p1.involves(c1) && p1.involves(c2));
    }

    #[test]
    fn pair_set_deduplicates() {
        let mut set = EntitySet::new();
        let c1 = set.insert_collider(Collider::new_circle(1.0).unwrap());
        let c2 = set.insert_collider(Collider::new_circle(1.0).unwrap());
        let c3 = set.insert_collider(Collider::new_circle(1.0).unwrap());

        let mut pairs = PairSet::new();
        assert!(pairs.insert(PairKey::new(c1, None, c2, None)));
        assert!(!pairs.insert(PairKey::new(c2, None, c1, None)));
        assert!(pairs.insert(PairKey::new(c3, None, c1, None)));
        assert_eq!(pairs.len(), 2);
        assert!(pairs.contains(&PairKey::new(c1, None, c3, None)));
        pairs.clear();
        assert!(pairs.is_empty());
    }
}
