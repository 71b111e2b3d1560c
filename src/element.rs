use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

/// Chemical element, identified by its atomic number
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Element(u8);

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ElementError {
    #[error("Unknown element symbol '{0}'")]
    UnknownSymbol(String),
    #[error("No element with atomic number {0}")]
    UnknownAtomicNumber(u32),
}

struct ElementData {
    symbol: &'static str,
    mass: f64
}

/// Parses atomic mass strings of the form `x.y(z)`, `[x]` or `[x, y]`
///
/// Parenthesised uncertainty digits are dropped. Intervals yield their midpoint.
fn parse_atomic_mass(mass_str: &str) -> Option<f64> {
    let value = mass_str.split('(').next()?;
    let bounds = value.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(|bound| bound.trim().parse::<f64>())
        .collect::<Result<Vec<f64>, _>>()
        .ok()?;
    match bounds.as_slice() {
        [value] => Some(*value),
        [lower, upper] => Some(0.5 * (lower + upper)),
        _ => None,
    }
}

lazy_static! {
    static ref ELEMENTS: Vec<ElementData> = periodic_table::periodic_table()
        .into_iter()
        .map(|element| ElementData {
            symbol: element.symbol,
            mass: parse_atomic_mass(element.atomic_mass).unwrap_or(0.0)
        })
        .collect();

    static ref SYMBOL_LOOKUP: HashMap<String, u8> = ELEMENTS.iter()
        .enumerate()
        .map(|(i, data)| (data.symbol.to_ascii_lowercase(), (i + 1) as u8))
        .collect();
}

impl Element {
    pub const HYDROGEN: Element = Element(1);

    /// Look up an element from its atomic number
    pub fn from_atomic_number(z: u32) -> Result<Element, ElementError> {
        if z == 0 || z as usize > ELEMENTS.len() {
            return Err(ElementError::UnknownAtomicNumber(z));
        }

        Ok(Element(z as u8))
    }

    pub fn atomic_number(&self) -> u32 {
        self.0 as u32
    }

    fn data(&self) -> &'static ElementData {
        &ELEMENTS[self.0 as usize - 1]
    }

    pub fn symbol(&self) -> &'static str {
        self.data().symbol
    }

    /// Standard atomic weight in Dalton
    pub fn mass(&self) -> f64 {
        self.data().mass
    }

    pub fn is_hydrogen(&self) -> bool {
        *self == Element::HYDROGEN
    }
}

impl FromStr for Element {
    type Err = ElementError;

    /// Case-insensitive symbol lookup, e.g. `"C"`, `"cl"`
    fn from_str(symbol: &str) -> Result<Element, Self::Err> {
        SYMBOL_LOOKUP.get(&symbol.trim().to_ascii_lowercase())
            .map(|&z| Element(z))
            .ok_or_else(|| ElementError::UnknownSymbol(symbol.to_owned()))
    }
}

impl std::fmt::Display for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}
