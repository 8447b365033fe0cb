//! Known recurring-service catalog
//!
//! Keyword fallback for well-known subscription providers that interval
//! detection misses (too few charges, wildly truncated names). The table is
//! data, not code: it ships with a built-in default and can be replaced or
//! extended from a TOML file without touching detection logic.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One keyword → display-name mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEntry {
    /// Lowercase substring to look for in description + merchant text
    pub keyword: String,
    /// Canonical display name for the service
    pub display: String,
}

/// Ordered keyword table; earlier entries win on multi-keyword matches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceCatalog {
    pub services: Vec<ServiceEntry>,
}

impl ServiceCatalog {
    /// Parse a catalog from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load a catalog from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// First entry whose keyword appears in `text` (text must be lowercased)
    pub fn match_keyword(&self, text: &str) -> Option<&ServiceEntry> {
        self.services.iter().find(|e| text.contains(e.keyword.as_str()))
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl Default for ServiceCatalog {
    fn default() -> Self {
        let table: &[(&str, &str)] = &[
            ("spotify", "Spotify"),
            ("netflix", "Netflix"),
            ("youtube", "YouTube Premium"),
            ("disney", "Disney+ Hotstar"),
            ("hotstar", "Disney+ Hotstar"),
            ("jiocinema", "JioCinema"),
            ("prime video", "Amazon Prime Video"),
            ("amazon prime", "Amazon Prime"),
            ("apple.com/bill", "Apple Subscription"),
            ("google play", "Google Play"),
            ("google storage", "Google One"),
            ("github", "GitHub"),
            ("chatgpt", "ChatGPT Plus"),
            ("openai", "OpenAI"),
            ("notion", "Notion"),
            ("figma", "Figma"),
            ("canva", "Canva"),
            ("zoom", "Zoom"),
            ("icloud", "iCloud"),
            ("dropbox", "Dropbox"),
            ("microsoft 365", "Microsoft 365"),
            ("linkedin", "LinkedIn Premium"),
            ("leetcode", "LeetCode"),
            ("surfshark", "Surfshark VPN"),
            ("nordvpn", "NordVPN"),
            ("expressvpn", "ExpressVPN"),
            ("audible", "Audible"),
            ("kindle", "Kindle Unlimited"),
            ("jio", "Jio Recharge"),
            ("airtel", "Airtel Recharge"),
            ("vi ", "Vi Recharge"),
            ("swiggy one", "Swiggy One"),
            ("zomato gold", "Zomato Gold"),
            ("zomato pro", "Zomato Pro"),
            ("google cloud", "Google Cloud"),
        ];
        Self {
            services: table
                .iter()
                .map(|(keyword, display)| ServiceEntry {
                    keyword: (*keyword).to_string(),
                    display: (*display).to_string(),
                })
                .collect(),
        }
    }
}
