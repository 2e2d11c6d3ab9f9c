//! Name interning.
//!
//! The compiler handles the same identifiers over and over: across symbol
//! tables, variable references, and generated temporaries. Interning turns
//! each distinct string into a [`Symbol`] once, so the passes compare and
//! hash plain integers and only go back to text for diagnostics and output.

use indexmap::IndexSet;

/// Integer handle for an interned name.
///
/// Equal symbols mean equal strings within one [`Interner`]. The derived
/// ordering follows interning order, not the alphabet; compare resolved
/// strings where lexicographic order matters (register allocation does).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct Symbol(u32);

impl Symbol {
    /// Raw index for debugging.
    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

/// The symbol table behind [`Symbol`]: an insertion-ordered set of names,
/// where a symbol is simply a name's position in the set.
#[derive(Debug, Clone, Default)]
pub struct Interner {
    names: IndexSet<String>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the symbol for `name`, interning it on first sight.
    pub fn intern(&mut self, name: &str) -> Symbol {
        if let Some(index) = self.names.get_index_of(name) {
            return Symbol(index as u32);
        }
        let (index, _) = self.names.insert_full(name.to_owned());
        Symbol(index as u32)
    }

    /// Like [`Interner::intern`] for an already-owned string, so a fresh
    /// generated name is stored without another allocation.
    pub fn intern_owned(&mut self, name: String) -> Symbol {
        let (index, _) = self.names.insert_full(name);
        Symbol(index as u32)
    }

    /// The string behind a symbol.
    ///
    /// # Panics
    /// A symbol from another interner has no meaning here and panics.
    #[inline]
    pub fn resolve(&self, sym: Symbol) -> &str {
        match self.names.get_index(sym.0 as usize) {
            Some(name) => name.as_str(),
            None => panic!("symbol {} was interned elsewhere", sym.0),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// All interned names, in symbol order.
    pub fn iter(&self) -> impl Iterator<Item = (Symbol, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(index, name)| (Symbol(index as u32), name.as_str()))
    }
}
