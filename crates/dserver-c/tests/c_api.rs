// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The C ABI against a live server.

use dserver::{DataServer, ServerConfig, SourceDefinition, SourceRegistry};
use dserver_c::*;
use dserver_proto::SourceKind;
use libc::c_char;
use std::ffi::{CStr, CString};

/// Take ownership of a returned string.
unsafe fn take(s: *mut c_char) -> Option<String> {
    if s.is_null() {
        return None;
    }
    let text = CStr::from_ptr(s).to_string_lossy().into_owned();
    dsFreeString(s);
    Some(text)
}

#[test]
fn test_c_session_against_server() {
    let dir = tempfile::tempdir().unwrap();
    let env_dir = dir.path().join("SVT");
    std::fs::create_dir_all(&env_dir).unwrap();
    std::fs::write(env_dir.join("Address.dat"), "1 High St\n").unwrap();
    std::fs::write(env_dir.join("Accounts.dat"), "[VIC]\nA1\n").unwrap();
    std::fs::write(env_dir.join("Postcodes.dat"), "3000\n2000\n").unwrap();

    let mut config = ServerConfig {
        sources: vec![
            SourceDefinition::new("Address", SourceKind::Csv),
            SourceDefinition::new("Accounts", SourceKind::Keyed),
            SourceDefinition::new("Postcodes", SourceKind::Indexed),
        ],
        ..Default::default()
    };
    config.server.bind_address = [127, 0, 0, 1].into();
    config.server.port = 0;

    let registry = SourceRegistry::load(&config, dir.path()).unwrap();
    let server = DataServer::new(config, registry).unwrap();
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let listener = runtime.block_on(server.bind()).unwrap();
    let port = listener.local_addr().unwrap().port();
    let runner = server.clone();
    let task = runtime.spawn(async move { runner.run_on(listener).await });

    let host = CString::new("127.0.0.1").unwrap();
    let address = CString::new("Address").unwrap();
    let accounts = CString::new("Accounts").unwrap();
    let postcodes = CString::new("Postcodes").unwrap();
    let missing = CString::new("Missing").unwrap();
    let vic = CString::new("VIC").unwrap();
    let one = CString::new("1").unwrap();
    let row = CString::new("2 Low Rd").unwrap();
    let keyed_row = CString::new("A2").unwrap();

    unsafe {
        let session = dsInit(host.as_ptr(), i32::from(port));
        assert!(!session.is_null());

        assert_eq!(dsRegister(session, address.as_ptr()), 0);
        assert_eq!(dsRegister(session, accounts.as_ptr()), 1);
        assert_eq!(dsRegister(session, postcodes.as_ptr()), 2);
        assert_eq!(dsRegister(session, missing.as_ptr()), -1);

        assert_eq!(take(dsGetNext(session, 0)).as_deref(), Some("1 High St"));
        assert_eq!(take(dsGetNext(session, 0)).as_deref(), Some("*Exhausted*"));
        assert_eq!(take(dsStore(session, 0, row.as_ptr())).as_deref(), Some("1"));
        assert_eq!(take(dsGetNext(session, 0)).as_deref(), Some("2 Low Rd"));

        assert_eq!(take(dsGetKeyed(session, 1, vic.as_ptr())).as_deref(), Some("A1"));
        assert_eq!(
            take(dsGetKeyed(session, 1, vic.as_ptr())).as_deref(),
            Some("*GROUP*EXHAUSTED*")
        );
        assert_eq!(
            take(dsStoreKeyed(session, 1, vic.as_ptr(), keyed_row.as_ptr())).as_deref(),
            Some("1")
        );
        assert_eq!(take(dsGetKeyed(session, 1, vic.as_ptr())).as_deref(), Some("A2"));

        assert_eq!(take(dsGetIndexed(session, 2, one.as_ptr())).as_deref(), Some("2000"));
        assert_eq!(
            take(dsGetIndexed(session, 2, vic.as_ptr())).as_deref(),
            Some("*INVALID*INDEX*")
        );

        assert_eq!(
            take(dsGetNext(session, -1)).as_deref(),
            Some("*BAD*SOURCE*INDEX*")
        );
        assert_eq!(
            take(dsGetNext(session, 42)).as_deref(),
            Some("*BAD*SOURCE*INDEX*")
        );
        assert!(take(dsGetKeyed(session, 1, std::ptr::null())).is_none());

        dsClose(session);
    }

    server.shutdown();
    runtime.block_on(task).unwrap().unwrap();
}
