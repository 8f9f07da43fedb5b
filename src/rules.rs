//! Signature sets used by validation and classification
//!
//! All lists are plain data, built once at startup and handed to the
//! validator and classifier explicitly.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Invite links, separator spam and promotional banners found in dumps.
pub const DEFAULT_SPAM_SIGNATURES: &[&str] = &[
    "telegram.me/",
    "t.me/",
    "@canal",
    "@grupo",
    "whatsapp:",
    "discord.gg/",
    "bit.ly/",
    "****",
    "====",
    "----",
    "____",
    "cracked by",
    "hacked by",
    "free combo",
];

/// Prefixes that mark the first field of a line as a URL.
pub const DEFAULT_URL_PREFIXES: &[&str] = &["http", "https", "www", "ftp"];

/// Every regional suffix (`.com.br`, `.gov.br`, ...) contains this marker.
pub const DEFAULT_REGIONAL_MARKER: &str = ".br";

/// Regional sites served from generic TLDs.
pub const DEFAULT_REGIONAL_SITES: &[&str] = &[
    // Banks
    "itau.com",
    "bradesco.com",
    "bb.com",
    "santander.com",
    "nubank.com",
    "inter.co",
    "sicoob.com",
    "sicredi.com",
    // E-commerce
    "americanas.com",
    "submarino.com",
    "magazineluiza.com",
    "mercadolivre.com",
    "casasbahia.com",
    "extra.com",
    "pontofrio.com",
    "netshoes.com",
    "dafiti.com",
    // Portals
    "uol.com",
    "globo.com",
    "terra.com",
    "ig.com",
    "r7.com",
    "folha.com",
    "estadao.com",
    "veja.com",
    "abril.com",
    // Telecom
    "vivo.com",
    "tim.com",
    "claro.com",
    "oi.com",
    // Other
    "correios.com",
    "webmotors.com",
    "olx.com",
    "zapimoveis.com",
];

/// Errors raised while loading ruleset extensions
#[derive(Debug, Error)]
pub enum RulesError {
    #[error("failed to read sites file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Immutable signature data shared by [`LineValidator`](crate::validator::LineValidator)
/// and [`RegionClassifier`](crate::classifier::RegionClassifier).
///
/// Every entry is stored lowercased; matching is done against lowercased lines.
#[derive(Debug, Clone)]
pub struct Ruleset {
    spam_signatures: Vec<String>,
    url_prefixes: Vec<String>,
    regional_marker: String,
    regional_sites: Vec<String>,
}

impl Ruleset {
    pub fn new(
        spam_signatures: Vec<String>,
        url_prefixes: Vec<String>,
        regional_marker: String,
        regional_sites: Vec<String>,
    ) -> Self {
        Self {
            spam_signatures: lowercase_all(spam_signatures),
            url_prefixes: lowercase_all(url_prefixes),
            regional_marker: regional_marker.to_lowercase(),
            regional_sites: lowercase_all(regional_sites),
        }
    }

    /// Add regional site fragments, skipping ones already present
    pub fn extend_regional_sites<I, S>(&mut self, sites: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for site in sites {
            let site = site.as_ref().trim().to_lowercase();
            if !site.is_empty() && !self.regional_sites.contains(&site) {
                self.regional_sites.push(site);
            }
        }
    }

    /// Extend regional sites from a file with one fragment per line.
    ///
    /// Blank lines and lines starting with `#` are ignored. Returns how many
    /// new fragments were added.
    pub fn load_sites_file(&mut self, path: &Path) -> Result<usize, RulesError> {
        let content = fs::read_to_string(path).map_err(|source| RulesError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let before = self.regional_sites.len();
        self.extend_regional_sites(
            content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#')),
        );

        let added = self.regional_sites.len() - before;
        log::debug!("Loaded {} regional site fragments from {:?}", added, path);
        Ok(added)
    }

    pub fn spam_signatures(&self) -> &[String] {
        &self.spam_signatures
    }

    pub fn url_prefixes(&self) -> &[String] {
        &self.url_prefixes
    }

    pub fn regional_marker(&self) -> &str {
        &self.regional_marker
    }

    pub fn regional_sites(&self) -> &[String] {
        &self.regional_sites
    }

    /// Case-insensitive check whether `field` starts with a URL prefix
    #[inline]
    pub fn has_url_prefix(&self, field: &str) -> bool {
        let field = field.to_lowercase();
        self.url_prefixes.iter().any(|p| field.starts_with(p.as_str()))
    }
}

impl Default for Ruleset {
    fn default() -> Self {
        Self::new(
            to_owned_all(DEFAULT_SPAM_SIGNATURES),
            to_owned_all(DEFAULT_URL_PREFIXES),
            DEFAULT_REGIONAL_MARKER.to_string(),
            to_owned_all(DEFAULT_REGIONAL_SITES),
        )
    }
}

fn to_owned_all(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn lowercase_all(items: Vec<String>) -> Vec<String> {
    items.into_iter().map(|s| s.to_lowercase()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_lists_are_lowercase() {
        let rules = Ruleset::default();
        assert!(rules.spam_signatures().iter().any(|s| s == "cracked by"));
        assert!(rules
            .spam_signatures()
            .iter()
            .all(|s| *s == s.to_lowercase()));
        assert_eq!(rules.regional_marker(), ".br");
        assert_eq!(rules.regional_sites().len(), DEFAULT_REGIONAL_SITES.len());
    }

    #[test]
    fn test_url_prefix_case_insensitive() {
        let rules = Ruleset::default();
        assert!(rules.has_url_prefix("HTTPS//site.com"));
        assert!(rules.has_url_prefix("www.loja.com.br"));
        assert!(rules.has_url_prefix("ftp"));
        assert!(!rules.has_url_prefix("user@mail.com"));
    }

    #[test]
    fn test_load_sites_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# extra portals").unwrap();
        writeln!(file, "Exemplo.com").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "uol.com").unwrap();

        let mut rules = Ruleset::default();
        let added = rules.load_sites_file(file.path()).unwrap();

        assert_eq!(added, 1);
        assert!(rules.regional_sites().iter().any(|s| s == "exemplo.com"));
    }

    #[test]
    fn test_load_missing_sites_file() {
        let mut rules = Ruleset::default();
        let err = rules
            .load_sites_file(Path::new("/nonexistent/sites.txt"))
            .unwrap_err();
        assert!(matches!(err, RulesError::Read { .. }));
    }
}
