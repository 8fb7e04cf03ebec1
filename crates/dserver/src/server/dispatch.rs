// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Request dispatch: one request line in, one reply line out.

use crate::registry::SourceRegistry;
use dserver_proto::{ClientKind, Request, Status, FIELD_SEPARATOR, STORED, UNREGISTERED};
use tracing::{debug, warn};

/// Reply to legacy `REGK`/`REGI` registrations.
const LEGACY_REGISTERED: &str = "0";

/// Execute one request line against the registry.
///
/// `client` is the flavour announced by the last `INIT` on this connection
/// and is updated when the line is an `INIT`. The returned reply carries no
/// line terminator.
pub fn dispatch(registry: &SourceRegistry, client: &mut ClientKind, line: &str) -> String {
    let request = match Request::parse(line) {
        Ok(request) => request,
        Err(e) => {
            debug!("Rejected request: {}", e);
            return e.status().as_str().to_string();
        }
    };

    debug!("Request: {}", request);

    match request {
        Request::Init { client: kind } => {
            *client = kind;
            match kind {
                ClientKind::C => "0".to_string(),
                ClientKind::Rust => json(&registry.info()),
            }
        }
        Request::Register { name } => match registry.handle_of(&name) {
            Some(handle) => match (*client, registry.attributes(handle)) {
                (ClientKind::Rust, Some(attrs)) => {
                    format!("{}{}{}", handle, FIELD_SEPARATOR, json(&attrs))
                }
                _ => handle.to_string(),
            },
            None => {
                debug!("Unknown source '{}'", name);
                UNREGISTERED.to_string()
            }
        },
        Request::RegisterKeyed { .. } | Request::RegisterIndexed { .. } => {
            LEGACY_REGISTERED.to_string()
        }
        Request::GetNext { handle } => reply(registry.next(handle)),
        Request::GetKeyed { handle, group } => reply(registry.next_in_group(handle, &group)),
        Request::GetRandomKeyed { handle, group } => {
            reply(registry.random_in_group(handle, &group))
        }
        Request::GetKeyedSequence { handle, tag } => {
            reply(registry.next_in_sequence(handle, &tag))
        }
        Request::GetHashed { handle, key } => reply(registry.lookup(handle, &key)),
        Request::GetIndexed { handle, index } => reply(registry.at_index(handle, &index)),
        Request::Store { handle, data } => stored(registry.append(handle, &data)),
        Request::StoreKeyed {
            handle,
            group,
            data,
        } => stored(registry.append_to_group(handle, &group, &data)),
    }
}

fn reply(result: Result<String, Status>) -> String {
    result.unwrap_or_else(|status| status.as_str().to_string())
}

fn stored(result: Result<(), Status>) -> String {
    match result {
        Ok(()) => STORED.to_string(),
        Err(status) => status.as_str().to_string(),
    }
}

fn json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| {
        warn!("Failed to encode reply: {}", e);
        Status::BadMessage.as_str().to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ServerConfig, SourceDefinition};
    use dserver_proto::{ServerInfo, SourceAttributes, SourceKind};

    fn registry() -> (tempfile::TempDir, SourceRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let env_dir = dir.path().join("SVT");
        std::fs::create_dir_all(&env_dir).unwrap();
        std::fs::write(env_dir.join("Address.dat"), "# streets\n1 High St\n2 Low Rd\n").unwrap();
        std::fs::write(env_dir.join("Accounts.dat"), "[VIC]\nA1\n").unwrap();
        std::fs::write(env_dir.join("Names.dat"), "alice:Alice Smith\n").unwrap();

        let config = ServerConfig {
            sources: vec![
                SourceDefinition::new("Address", SourceKind::Csv),
                SourceDefinition::new("Accounts", SourceKind::Keyed),
                SourceDefinition::new("Names", SourceKind::Hashed),
            ],
            ..Default::default()
        };
        let registry = SourceRegistry::load(&config, dir.path()).unwrap();
        (dir, registry)
    }

    #[test]
    fn test_c_client_session() {
        let (_dir, registry) = registry();
        let mut client = ClientKind::default();

        assert_eq!(dispatch(&registry, &mut client, "INIT|C"), "0");
        assert_eq!(dispatch(&registry, &mut client, "REG|Accounts"), "1");
        assert_eq!(dispatch(&registry, &mut client, "REG|Missing"), "-1");
        assert_eq!(dispatch(&registry, &mut client, "GETN|0"), "1 High St");
        assert_eq!(dispatch(&registry, &mut client, "GETK|1|VIC"), "A1");
        assert_eq!(
            dispatch(&registry, &mut client, "GETK|1|VIC"),
            "*GROUP*EXHAUSTED*"
        );
        assert_eq!(dispatch(&registry, &mut client, "STOK|1|VIC|A2"), "1");
        assert_eq!(dispatch(&registry, &mut client, "GETK|1|VIC"), "A2");
        assert_eq!(dispatch(&registry, &mut client, "GETH|2|alice"), "Alice Smith");
        assert_eq!(dispatch(&registry, &mut client, "GETH|2|bob"), "*UNDEFINED*HASH*");
    }

    #[test]
    fn test_rust_client_gets_metadata() {
        let (_dir, registry) = registry();
        let mut client = ClientKind::C;

        let info: ServerInfo =
            serde_json::from_str(&dispatch(&registry, &mut client, "INIT|Rust")).unwrap();
        assert_eq!(client, ClientKind::Rust);
        assert_eq!(info.sources, vec!["Address", "Accounts", "Names"]);

        let reply = dispatch(&registry, &mut client, "REG|Address");
        let (handle, attrs) = reply.split_once('|').unwrap();
        assert_eq!(handle, "0");
        let attrs: SourceAttributes = serde_json::from_str(attrs).unwrap();
        assert_eq!(attrs.kind, SourceKind::Csv);
        assert_eq!(attrs.size, 2);

        assert_eq!(dispatch(&registry, &mut client, "REG|Missing"), "-1");
    }

    #[test]
    fn test_sentinels() {
        let (_dir, registry) = registry();
        let mut client = ClientKind::C;

        assert_eq!(dispatch(&registry, &mut client, "GETN|9"), "*BAD*SOURCE*INDEX*");
        assert_eq!(dispatch(&registry, &mut client, "GETN|x"), "*BAD*SOURCE*INDEX*");
        assert_eq!(dispatch(&registry, &mut client, "GETN"), "*BAD*MESSAGE*");
        assert_eq!(dispatch(&registry, &mut client, ""), "*BAD*MESSAGE*");
        assert_eq!(dispatch(&registry, &mut client, "FROB|1"), "*UNKNOWN*COMMAND*");
        assert_eq!(
            dispatch(&registry, &mut client, "GETN|2"),
            "*UNKNOWN*SOURCE*TYPE*"
        );
        assert_eq!(
            dispatch(&registry, &mut client, "GETK|1|NSW"),
            "*INVALID*GROUP*"
        );
        assert_eq!(
            dispatch(&registry, &mut client, "STOK|0|VIC|x"),
            "*UNKNOWN*SOURCE*TYPE*"
        );
    }

    #[test]
    fn test_legacy_registration() {
        let (_dir, registry) = registry();
        let mut client = ClientKind::C;
        assert_eq!(dispatch(&registry, &mut client, "REGK|Accounts|VIC"), "0");
        assert_eq!(dispatch(&registry, &mut client, "REGI|Address"), "0");
    }

    #[test]
    fn test_exhaustion() {
        let (_dir, registry) = registry();
        let mut client = ClientKind::C;
        dispatch(&registry, &mut client, "GETN|0");
        dispatch(&registry, &mut client, "GETN|0");
        assert_eq!(dispatch(&registry, &mut client, "GETN|0"), "*Exhausted*");
        assert_eq!(dispatch(&registry, &mut client, "STOC|0|3 Mid Ave"), "1");
        assert_eq!(dispatch(&registry, &mut client, "GETN|0"), "3 Mid Ave");
    }
}
