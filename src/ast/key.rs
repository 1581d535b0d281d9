//! Name hashing and the session-owned symbol table.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// A 32-bit FNV-1a hash of a declaration, token or template name.
///
/// The empty name hashes to zero, which marks "no name". A token's group wrapper lives at
/// `key + 1`, see [`Key::group`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
pub struct Key(pub u32);

impl Key {
    pub const NONE: Key = Key(0);

    pub const DEFAULT: Key = Key::of("default");
    pub const TAGINATOR: Key = Key::of("taginator");
    pub const IMPORT: Key = Key::of("import");
    pub const IT: Key = Key::of("it");
    pub const LAST: Key = Key::of("last");
    pub const PATH: Key = Key::of("path");
    /// The `.` token line, which passes its content through untouched.
    pub const STOP: Key = Key::of(".");

    pub const PAGE_URL: Key = Key::of("page.url");
    pub const PAGE_CANONICAL: Key = Key::of("page.url_canonical");
    pub const PAGE_FILE: Key = Key::of("page.file_path");
    pub const IMPORT_URL: Key = Key::of("import.url");
    pub const TAGINATOR_ACTIVE: Key = Key::of("taginator.active");
    pub const TAGINATOR_TAG: Key = Key::of("taginator.tag_name");
    pub const TAGINATOR_ALL: Key = Key::of("taginator.all_tags");
    pub const TAGINATOR_PARENT: Key = Key::of("taginator.parent_url");

    pub const fn of(name: &str) -> Key {
        let bytes = name.as_bytes();
        if bytes.is_empty() {
            return Key::NONE;
        }
        let mut hash = FNV_OFFSET;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u32;
            hash = hash.wrapping_mul(FNV_PRIME);
            i += 1;
        }
        Key(hash)
    }

    /// The key under which a token's group wrapper (`{-} = ...`) is declared.
    pub const fn group(self) -> Key {
        Key(self.0.wrapping_add(1))
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({:#010x})", self.0)
    }
}

/// Reverse lookup from keys to the names that produced them, for diagnostics and tooling.
#[derive(Debug, Default)]
pub struct Symbols {
    names: HashMap<Key, Rc<str>>,
}

impl Symbols {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, name: &str) -> Key {
        let key = Key::of(name);
        if !key.is_none() {
            self.names.entry(key).or_insert_with(|| Rc::from(name));
        }
        key
    }

    /// Records a display name for a key that was not produced by hashing that name, such as
    /// a token's group key.
    pub fn insert(&mut self, key: Key, name: &str) {
        self.names.entry(key).or_insert_with(|| Rc::from(name));
    }

    pub fn name(&self, key: Key) -> Option<&str> {
        self.names.get(&key).map(|name| &**name)
    }

    /// The interned name, or the raw hash when the key was never interned.
    pub fn describe(&self, key: Key) -> String {
        match self.name(key) {
            Some(name) => name.to_string(),
            None => format!("{:#010x}", key.0),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod key_tests {
    use super::*;

    #[test]
    fn empty_name_is_none() {
        assert!(Key::of("").is_none());
    }

    #[test]
    fn matches_reference_fnv1a() {
        // FNV-1a 32 of "a"
        assert_eq!(Key::of("a"), Key(0xe40c292c));
    }

    #[test]
    fn group_key_is_adjacent() {
        assert_eq!(Key::of("-").group().0, Key::of("-").0.wrapping_add(1));
    }

    #[test]
    fn symbols_describe_unknown_keys_by_hash() {
        let mut symbols = Symbols::new();
        let key = symbols.intern("title");
        assert_eq!(symbols.describe(key), "title");
        assert_eq!(symbols.describe(Key(1)), "0x00000001");
    }
}
