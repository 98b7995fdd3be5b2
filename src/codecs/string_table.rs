use std::collections::HashMap;

use protobuf::RepeatedField;

use crate::proto::osmformat;

/// Per-block intern pool for tag keys and values, user names and member
/// roles. Indices are contiguous, stable for the block's lifetime and
/// assigned in insertion order, which is also the serialisation order of
/// the `s` field. Index 0 is the empty string and is pre-inserted so the
/// DenseNodes keys_vals delimiter and "no user" both map to it.
pub(crate) struct StringTable {
    strings: Vec<String>,
    id_map: HashMap<String, usize>,
    bytes: usize,
}

impl StringTable {
    pub fn new() -> Self {
        let mut table = Self {
            strings: Vec::new(),
            id_map: HashMap::new(),
            bytes: 0,
        };
        table.add("");
        table
    }

    /// Intern `string` and return its index. The unsigned variant exists
    /// because the wire format uses sint32 for some string references and
    /// uint32 for others around the same semantic value.
    pub fn add(&mut self, string: &str) -> i32 {
        if let Some(&id) = self.id_map.get(string) {
            return id as i32;
        }
        self.strings.push(string.to_owned());
        let id = self.strings.len() - 1;
        self.id_map.insert(string.to_owned(), id);
        self.bytes += string.len();
        id as i32
    }

    pub fn add_unsigned(&mut self, string: &str) -> u32 {
        self.add(string) as u32
    }

    /// Summed byte length of the interned strings, used for block sizing.
    pub fn size(&self) -> usize {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn clear(&mut self) {
        self.strings.clear();
        self.id_map.clear();
        self.bytes = 0;
        self.add("");
    }

    pub fn to_message(&self) -> osmformat::StringTable {
        let string_bytes: Vec<Vec<u8>> = self
            .strings
            .iter()
            .map(|string| string.as_bytes().to_vec())
            .collect();
        let mut string_table = osmformat::StringTable::new();
        string_table.set_s(RepeatedField::from_vec(string_bytes));
        string_table
    }
}
