use num_traits::int::PrimInt;
use num_traits::{FromPrimitive, ToPrimitive, Zero, One};

pub use index_derive::IndexBase;

/// Integer new types usable as indices
pub trait IndexBase {
    /// Wrapped integer type
    type Type : PrimInt + ToPrimitive + FromPrimitive;

    /// Unwrap the index
    fn get(&self) -> Self::Type;
}

/// Collective trait used for indexing
///
/// Blanket-implemented for anything deriving `IndexBase`.
pub trait Index:
    IndexBase
    + Copy
    + From<<Self as IndexBase>::Type>
    + Into<<Self as IndexBase>::Type>
    + PartialEq
{
    /// Indices from zero up to (excluding) `bound`
    fn range(bound: <Self as IndexBase>::Type) -> Range<Self> {
        Range {next: <Self as IndexBase>::Type::zero(), end: bound}
    }

    /// Index as a plain usize, for slice and matrix access
    fn to_usize(&self) -> usize {
        self.get().to_usize().unwrap_or(usize::MAX)
    }
}

impl<T> Index for T where T: IndexBase
    + Copy
    + From<<Self as IndexBase>::Type>
    + Into<<Self as IndexBase>::Type>
    + PartialEq
{}

/// Iterator over consecutive strong indices
pub struct Range<I: Index> {
    next: <I as IndexBase>::Type,
    end: <I as IndexBase>::Type
}

impl<I: Index> Iterator for Range<I> {
    type Item = I;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }

        let value = self.next;
        self.next = self.next + <I as IndexBase>::Type::one();
        Some(I::from(value))
    }
}

/// Position of a (heavy) atom within a system's ordered atom sequence
#[derive(IndexBase, Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Atom(usize);

/// Position of a fragment (constituent molecule) within a system
#[derive(IndexBase, Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FragmentIndex(usize);

/// Bijective mappings between new type indices
pub mod bijection;

#[cfg(test)]
mod tests {
    use itertools::Itertools;
    use crate::strong::{Index, IndexBase, Atom};

    #[derive(IndexBase, Debug, Copy, Clone, PartialEq, Eq, Hash)]
    struct Foo(u8);

    #[test]
    fn index_basics() {
        let a: Foo = 8.into();
        let b: u8 = a.into();
        assert_eq!(b, 8);
        assert_eq!(a.to_usize(), 8);

        assert_eq!(Foo::range(3).count(), 3);
        itertools::assert_equal(
            Atom::range(5),
            (0..5).map_into::<Atom>()
        );
    }
}
