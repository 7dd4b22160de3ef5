use std::collections::HashMap;

/// Label → address map built during layout, consulted by the encoder for
/// branch targets (§4.4, §3 "symbol table").
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    addresses: HashMap<String, u32>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: &str, address: u32) -> Result<(), String> {
        if self.addresses.contains_key(name) {
            return Err(format!("duplicate symbol '{name}'"));
        }
        self.addresses.insert(name.to_string(), address);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Option<u32> {
        self.addresses.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.addresses.iter().map(|(k, v)| (k.as_str(), *v))
    }
}
