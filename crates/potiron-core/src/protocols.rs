//! Protocol catalog used to build protocol-aware keys.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Error, Result};

/// Protocol number → key name (e.g. `6 → tcp`), ordered by number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtocolCatalog {
    protocols: BTreeMap<u16, String>,
}

impl ProtocolCatalog {
    /// Parse a catalog with one `<number> <name>` pair per line.
    ///
    /// Blank lines and lines starting with `#` are ignored.
    pub fn parse(contents: &str) -> Result<Self> {
        let mut protocols = BTreeMap::new();
        for (index, raw) in contents.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let invalid = |reason: String| Error::InvalidProtocol {
                line: index + 1,
                reason,
            };

            let mut parts = line.split_whitespace();
            let number = parts
                .next()
                .unwrap_or_default()
                .parse::<u16>()
                .map_err(|e| invalid(format!("bad protocol number: {e}")))?;
            let name = parts
                .next()
                .ok_or_else(|| invalid("missing protocol name".to_string()))?;
            if name.contains(':') {
                return Err(invalid(format!("name '{name}' must not contain ':'")));
            }
            protocols.insert(number, name.to_string());
        }
        Ok(Self { protocols })
    }

    /// Read and parse a catalog file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let catalog = Self::parse(&std::fs::read_to_string(path)?)?;
        tracing::info!(path = %path.display(), protocols = catalog.len(), "protocol catalog loaded");
        Ok(catalog)
    }

    pub fn get(&self, number: u16) -> Option<&str> {
        self.protocols.get(&number).map(String::as_str)
    }

    /// Key names in protocol-number order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.protocols.values().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &str)> {
        self.protocols.iter().map(|(n, name)| (*n, name.as_str()))
    }

    pub fn len(&self) -> usize {
        self.protocols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.protocols.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(u16, S)> for ProtocolCatalog {
    fn from_iter<I: IntoIterator<Item = (u16, S)>>(iter: I) -> Self {
        Self {
            protocols: iter.into_iter().map(|(n, name)| (n, name.into())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_orders_by_number() {
        let catalog = ProtocolCatalog::parse("# protocols\n17 udp\n6\ttcp\n\n1 icmp\n").unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.names().collect::<Vec<_>>(), ["icmp", "tcp", "udp"]);
        assert_eq!(catalog.get(6), Some("tcp"));
        assert_eq!(catalog.get(2), None);
    }

    #[test]
    fn parse_rejects_bad_lines() {
        assert!(matches!(
            ProtocolCatalog::parse("6 tcp\nx udp"),
            Err(Error::InvalidProtocol { line: 2, .. })
        ));
        assert!(matches!(
            ProtocolCatalog::parse("17"),
            Err(Error::InvalidProtocol { line: 1, .. })
        ));
        assert!(ProtocolCatalog::parse("6 tc:p").is_err());
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = ProtocolCatalog::load("/nonexistent/protocols").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn collect_from_pairs() {
        let catalog: ProtocolCatalog = [(17, "udp"), (6, "tcp")].into_iter().collect();
        assert_eq!(catalog.iter().collect::<Vec<_>>(), [(6, "tcp"), (17, "udp")]);
    }
}
