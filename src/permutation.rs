use std::ops::Index;
use std::convert::TryFrom;
use itertools::Itertools;
use thiserror::Error;

/// Slice-level permutation incrementation
///
/// Transforms the slice into the next permutation in lexicographic order. If
/// the slice is the last permutation, it is reset to the first and `false` is
/// returned.
pub fn slice_next<T: PartialOrd>(slice: &mut [T]) -> bool {
    let n = slice.len();

    if n == 0 {
        return false;
    }

    let mut i = n - 1;
    let mut j;
    let mut k;

    loop {
        j = i;

        if i != 0 {
            i -= 1;

            if slice[i] < slice[j] {
                k = n - 1;
                loop {
                    if k == 0 || slice[i] < slice[k] {
                        break
                    }
                    k -= 1;
                }

                slice.swap(i, k);
                slice[j..n].reverse();
                break true
            }
        } else {
            slice.reverse();
            break false
        }
    }
}

/// Errors arising in the use of permutations
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PermutationError {
    /// Argument length does not match the permutation's set size
    #[error("Mismatched length between permutation and argument")]
    LengthMismatch,
    /// One-line representation is not a reordering of 0..n
    #[error("Sequence {0:?} is not a permutation of its index set")]
    InvalidSetSize(Vec<usize>),
}

/// Permutation of the index set 0..n in one-line representation
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Debug, Hash)]
pub struct Permutation {
    // One-line representation
    sigma: Vec<usize>
}

impl std::fmt::Display for Permutation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{}}}", self.sigma.iter().format(", "))
    }
}

impl TryFrom<Vec<usize>> for Permutation {
    type Error = PermutationError;

    fn try_from(sigma: Vec<usize>) -> Result<Permutation, Self::Error> {
        let n = sigma.len();
        let mut seen = vec![false; n];
        for &v in sigma.iter() {
            if v >= n || seen[v] {
                return Err(PermutationError::InvalidSetSize(sigma));
            }
            seen[v] = true;
        }

        Ok(Permutation {sigma})
    }
}

impl<const N: usize> TryFrom<[usize; N]> for Permutation {
    type Error = PermutationError;

    fn try_from(arr: [usize; N]) -> Result<Permutation, Self::Error> {
        Permutation::try_from(arr.to_vec())
    }
}

impl Permutation {
    /// Initialize an identity permutation of specific size
    ///
    /// ```
    /// # use invarmol::permutation::Permutation;
    /// assert_eq!(Permutation::identity(3).sigma(), &[0, 1, 2])
    /// ```
    pub fn identity(n: usize) -> Permutation {
        Permutation {sigma: (0..n).collect()}
    }

    /// Number of permutations of a set of size `n`
    pub fn group_order(n: usize) -> usize {
        (1..=n).product()
    }

    /// Number of elements being permuted
    pub fn set_size(&self) -> usize {
        self.sigma.len()
    }

    /// One-line representation
    pub fn sigma(&self) -> &[usize] {
        &self.sigma
    }

    /// Whether every element maps onto itself
    pub fn is_identity(&self) -> bool {
        self.sigma.iter().enumerate().all(|(i, &v)| i == v)
    }

    /// Determine the index of a permutation in its lexicographic order
    ///
    /// ```
    /// # use invarmol::permutation::Permutation;
    /// # use std::convert::TryFrom;
    /// assert_eq!(Permutation::identity(3).index(), 0);
    /// assert_eq!(Permutation::try_from([0, 2, 1]).unwrap().index(), 1);
    /// assert_eq!(Permutation::try_from([2, 1, 0]).unwrap().index(), 5);
    /// ```
    pub fn index(&self) -> usize {
        let n = self.sigma.len();
        if n == 0 {
            return 0;
        }

        let mut index = 0;
        let mut position = 2;
        let mut factor = 1;

        for p in (0..(n - 1)).rev() {
            let is_smaller = |q| { (self.sigma[q] < self.sigma[p]) as usize };
            let larger_successors: usize = ((p + 1)..n).map(is_smaller).sum();
            index += larger_successors * factor;
            factor *= position;
            position += 1;
        }

        index
    }

    /// Transform into the next permutation within the lexicographic order
    pub fn next_permutation(&mut self) -> bool {
        slice_next(self.sigma.as_mut_slice())
    }

    /// Collect the elements of a slice in the order given by the permutation
    ///
    /// Post-condition is `result[i] == other[sigma(i)]`
    pub fn gather<T: Clone>(&self, other: &[T]) -> Result<Vec<T>, PermutationError> {
        if other.len() != self.sigma.len() {
            return Err(PermutationError::LengthMismatch);
        }

        Ok(self.sigma.iter().map(|&i| other[i].clone()).collect())
    }

    /// Compose two permutations into a new permutation
    ///
    /// The composed permutation first applies `self`, then `other`:
    /// `composed(i) == other(self(i))`.
    pub fn compose(&self, other: &Permutation) -> Result<Permutation, PermutationError> {
        if self.sigma.len() != other.sigma.len() {
            return Err(PermutationError::LengthMismatch);
        }

        Ok(Permutation {sigma: self.sigma.iter().map(|&i| other.sigma[i]).collect()})
    }

    /// Concatenate permutations of disjoint consecutive blocks
    ///
    /// Blocks are laid out consecutively in the domain. Each block's image is
    /// shifted by the offset paired with it.
    pub fn concatenate(blocks: &[(&Permutation, usize)]) -> Permutation {
        let sigma = blocks.iter()
            .flat_map(|(p, offset)| p.sigma.iter().map(move |v| v + offset))
            .collect();
        Permutation {sigma}
    }
}

/// Implements indexing, letting Permutation behave as a container directly
impl Index<usize> for Permutation {
    type Output = usize;

    fn index(&self, i: usize) -> &Self::Output {
        &self.sigma[i]
    }
}

/// Iterator adaptor for iterating through all permutations of a set size
pub struct PermutationIterator {
    permutation: Permutation,
    increment: bool
}

impl Iterator for PermutationIterator {
    type Item = Permutation;

    fn next(&mut self) -> Option<Self::Item> {
        if self.increment && !self.permutation.next_permutation() {
            return None;
        }

        self.increment = true;
        Some(self.permutation.clone())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let order = Permutation::group_order(self.permutation.set_size());
        let consumed = self.permutation.index() + self.increment as usize;
        let remaining = order.saturating_sub(consumed);
        (remaining, Some(remaining))
    }
}

/// Yields permutations of size `n` in increasing lexicographic order
///
/// ```
/// # use invarmol::permutation::permutations;
/// assert_eq!(permutations(3).count(), 6);
/// ```
pub fn permutations(n: usize) -> PermutationIterator {
    PermutationIterator {permutation: Permutation::identity(n), increment: false}
}
