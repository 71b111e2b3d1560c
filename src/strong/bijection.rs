use std::marker::PhantomData;
use delegate::delegate;

use crate::permutation::{Permutation, PermutationError};
use crate::strong::Index;

/// Struct representing a bijection between index spaces
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Debug, Hash)]
pub struct Bijection<T: Index, U: Index> {
    /// Underlying weakly index-typed Permutation
    pub permutation: Permutation,
    key_type: PhantomData<T>,
    value_type: PhantomData<U>
}

impl<T: Index, U: Index> Bijection<T, U> {
    /// Initialize by wrapping a Permutation
    pub fn new(p: Permutation) -> Bijection<T, U> {
        Bijection {permutation: p, key_type: PhantomData, value_type: PhantomData}
    }

    /// Compose the bijection with another, applying `self` first
    pub fn compose<V: Index>(&self, other: &Bijection<U, V>) -> Result<Bijection<T, V>, PermutationError> {
        let p = self.permutation.compose(&other.permutation)?;
        Ok(Bijection::new(p))
    }

    delegate! {
        to self.permutation {
            /// Whether every key maps onto the same-numbered value
            pub fn is_identity(&self) -> bool;
        }
    }
}
