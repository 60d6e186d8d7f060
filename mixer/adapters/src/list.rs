//! Checks symbols against a fixed list of entries.

use ahash::AHashSet as HashSet;
use ipnet::IpNet;
use linkerd_mixer_core::{
    adapter::{Aspect, Builder, Env, ListsAspect, ListsBuilder},
    params, ConfigErrors, Params,
};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use tracing::debug;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ListParams {
    /// The list's entries.
    pub overrides: Vec<String>,

    /// Inverts the check so that symbols in the list are rejected.
    pub blacklist: bool,

    pub entry_type: EntryType,
}

/// How entries are matched against symbols.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    #[default]
    Strings,
    CaseInsensitiveStrings,

    /// Entries are IP addresses or networks; symbols are IP addresses.
    IpAddresses,
}

#[derive(Clone, Debug, Default)]
pub struct List(());

#[derive(Debug)]
struct Checker {
    entries: Entries,
    blacklist: bool,
}

#[derive(Debug)]
enum Entries {
    Strings(HashSet<String>),
    CaseInsensitive(HashSet<String>),
    Networks(Vec<IpNet>),
}

// === impl List ===

impl List {
    pub fn new() -> Self {
        Self(())
    }
}

impl Builder for List {
    fn name(&self) -> &str {
        "list"
    }

    fn description(&self) -> &str {
        "Checks symbols against a list of strings or IP networks"
    }

    fn default_config(&self) -> Params {
        params::encode(&ListParams::default())
    }

    fn validate_config(&self, params: &Params) -> ConfigErrors {
        let mut errors = ConfigErrors::new();
        let params = match params::decode::<ListParams>(params) {
            Ok(params) => params,
            Err(error) => {
                errors.append("", error);
                return errors;
            }
        };

        if params.entry_type == EntryType::IpAddresses {
            for (i, entry) in params.overrides.iter().enumerate() {
                if let Err(error) = parse_net(entry) {
                    errors.append(format!("overrides[{}]", i), error);
                }
            }
        }
        errors
    }

    fn lists(&self) -> Option<&dyn ListsBuilder> {
        Some(self)
    }
}

impl ListsBuilder for List {
    fn new_lists_aspect(&self, env: &Env, params: &Params) -> anyhow::Result<Box<dyn ListsAspect>> {
        let ListParams {
            overrides,
            blacklist,
            entry_type,
        } = params::decode(params)?;

        let entries = match entry_type {
            EntryType::Strings => Entries::Strings(overrides.into_iter().collect()),
            EntryType::CaseInsensitiveStrings => Entries::CaseInsensitive(
                overrides.iter().map(|e| e.to_lowercase()).collect(),
            ),
            EntryType::IpAddresses => Entries::Networks(
                overrides
                    .iter()
                    .map(|e| parse_net(e))
                    .collect::<anyhow::Result<_>>()?,
            ),
        };
        debug!(parent: env.span(), ?entry_type, blacklist, "Created list");

        Ok(Box::new(Checker { entries, blacklist }))
    }
}

// === impl Checker ===

impl Aspect for Checker {
    fn close(self: Box<Self>) -> anyhow::Result<()> {
        Ok(())
    }
}

impl ListsAspect for Checker {
    fn check_list(&self, symbol: &str) -> anyhow::Result<bool> {
        let found = match &self.entries {
            Entries::Strings(entries) => entries.contains(symbol),
            Entries::CaseInsensitive(entries) => entries.contains(&symbol.to_lowercase()),
            Entries::Networks(nets) => {
                let addr = symbol
                    .parse::<IpAddr>()
                    .map_err(|_| anyhow::anyhow!("{:?} is not an IP address", symbol))?;
                nets.iter().any(|net| net.contains(&addr))
            }
        };
        Ok(found != self.blacklist)
    }
}

fn parse_net(entry: &str) -> anyhow::Result<IpNet> {
    if let Ok(net) = entry.parse() {
        return Ok(net);
    }
    if let Ok(addr) = entry.parse::<IpAddr>() {
        return Ok(IpNet::from(addr));
    }
    anyhow::bail!("not a valid IP address or network: {:?}", entry)
}
