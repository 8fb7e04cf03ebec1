// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end tests: a server on an ephemeral port driven by `dserver-client`.

use dserver::{DataServer, ServerConfig, SourceDefinition, SourceRegistry};
use dserver_client::{ClientError, Session, SessionOptions};
use dserver_proto::{Request, SourceKind, Status};
use std::path::Path;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;

struct Harness {
    runtime: Runtime,
    server: DataServer,
    task: Option<JoinHandle<Result<(), dserver::ServerError>>>,
    port: u16,
    dir: tempfile::TempDir,
}

impl Harness {
    fn start(files: &[(&str, SourceKind, &str)]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let env_dir = dir.path().join("SVT");
        std::fs::create_dir_all(&env_dir).unwrap();

        let mut config = ServerConfig::default();
        config.server.bind_address = [127, 0, 0, 1].into();
        config.server.port = 0;
        for (name, kind, content) in files {
            if kind.has_file() {
                std::fs::write(env_dir.join(format!("{}.dat", name)), content).unwrap();
            }
            config.sources.push(SourceDefinition::new(*name, *kind));
        }

        let registry = SourceRegistry::load(&config, dir.path()).unwrap();
        let server = DataServer::new(config, registry).unwrap();

        let runtime = Runtime::new().unwrap();
        let listener = runtime.block_on(server.bind()).unwrap();
        let port = listener.local_addr().unwrap().port();
        let runner = server.clone();
        let task = runtime.spawn(async move { runner.run_on(listener).await });

        Self {
            runtime,
            server,
            task: Some(task),
            port,
            dir,
        }
    }

    fn session(&self) -> Session {
        let options = SessionOptions::rust().with_timeout(Duration::from_secs(5));
        Session::connect_with("127.0.0.1", self.port, &options).unwrap()
    }

    fn data(&self, name: &str) -> String {
        std::fs::read_to_string(self.env_dir().join(format!("{}.dat", name))).unwrap()
    }

    fn env_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("SVT")
    }

    fn stop(&mut self) {
        self.server.shutdown();
        if let Some(task) = self.task.take() {
            self.runtime.block_on(task).unwrap().unwrap();
        }
    }
}

fn backups(tmp: &Path, name: &str) -> usize {
    std::fs::read_dir(tmp)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| {
            let file = e.file_name().to_string_lossy().into_owned();
            file.ends_with(&format!("_{}.bak", name))
        })
        .count()
}

#[test]
fn test_csv_rows_unique_across_clients_then_flushed() {
    let rows: String = (0..60).map(|i| format!("acct-{:03}\n", i)).collect();
    let content = format!("# ids\n{}", rows);
    let mut harness = Harness::start(&[("Accounts", SourceKind::Csv, content.as_str())]);

    let port = harness.port;
    let workers: Vec<_> = (0..3)
        .map(|_| {
            std::thread::spawn(move || {
                let options = SessionOptions::rust().with_timeout(Duration::from_secs(5));
                let mut session = Session::connect_with("127.0.0.1", port, &options).unwrap();
                let reg = session.register("Accounts").unwrap();
                let mut got = Vec::new();
                for _ in 0..15 {
                    got.push(session.get_next(reg.handle).unwrap().into_string());
                }
                session.close().unwrap();
                got
            })
        })
        .collect();

    let mut seen: Vec<String> = workers
        .into_iter()
        .flat_map(|w| w.join().unwrap())
        .collect();
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 45);

    let mut session = harness.session();
    let reg = session.register("Accounts").unwrap();
    session.store(reg.handle, "acct-new").unwrap();
    drop(session);

    harness.stop();

    let saved = harness.data("Accounts");
    let lines: Vec<&str> = saved.lines().collect();
    assert_eq!(lines[0], "# ids");
    assert_eq!(lines.len(), 1 + 15 + 1);
    assert_eq!(lines.last(), Some(&"acct-new"));
    for consumed in &seen {
        assert!(!lines.contains(&consumed.as_str()));
    }
    assert_eq!(backups(&harness.env_dir().join("tmp"), "Accounts"), 1);
}

#[test]
fn test_every_kind_over_the_wire() {
    let mut harness = Harness::start(&[
        ("Address", SourceKind::Csv, "1 High St\n"),
        ("Serial", SourceKind::Sequence, "500\n"),
        ("Branch", SourceKind::KeyedSequence, "VIC:10\nNSW:20\n"),
        ("Names", SourceKind::Hashed, "alice:Alice Smith\n"),
        ("Postcodes", SourceKind::Indexed, "3000\n2000\n"),
        ("Customers", SourceKind::Keyed, "[VIC]\nc1\nc2\n[EMPTY]\n"),
        ("Ticket", SourceKind::Indexer, ""),
        ("Runs", SourceKind::Counter, "7\n"),
    ]);
    let mut session = harness.session();

    let info = session.server_info().unwrap().clone();
    assert_eq!(info.service, "dserver");
    assert_eq!(info.sources.len(), 8);

    let handles: Vec<usize> = info
        .sources
        .iter()
        .map(|name| session.register(name).unwrap().handle)
        .collect();
    assert_eq!(handles, (0..8).collect::<Vec<_>>());

    let keyed = session.register("Customers").unwrap();
    let attrs = keyed.attributes.unwrap();
    assert_eq!(attrs.kind, SourceKind::Keyed);
    assert_eq!(attrs.size, 2);

    assert_eq!(session.get_next(0).unwrap().as_str(), "1 High St");
    assert!(session.get_next(0).unwrap_err().is_exhausted());

    assert_eq!(session.get_next(1).unwrap().as_str(), "500");
    assert_eq!(session.get_next(1).unwrap().as_str(), "501");

    assert_eq!(session.get_keyed_sequence(2, "NSW").unwrap().as_str(), "20");
    assert_eq!(
        session.get_keyed_sequence(2, "QLD").unwrap_err().status(),
        Some(Status::InvalidGroup)
    );

    assert_eq!(session.get_hashed(3, "alice").unwrap().as_str(), "Alice Smith");
    assert_eq!(
        session.get_hashed(3, "bob").unwrap_err().status(),
        Some(Status::UndefinedHash)
    );

    assert_eq!(session.get_indexed(4, 1).unwrap().as_str(), "2000");
    assert_eq!(
        session.get_indexed(4, 2).unwrap_err().status(),
        Some(Status::InvalidIndex)
    );

    let random = session.get_random_keyed(5, "VIC").unwrap();
    assert!(["c1", "c2"].contains(&random.as_str()));
    assert_eq!(session.get_keyed(5, "VIC").unwrap().as_str(), "c1");
    assert_eq!(
        session.get_random_keyed(5, "EMPTY").unwrap_err().status(),
        Some(Status::Exhausted)
    );
    session.store_keyed(5, "QLD", "q1").unwrap();

    assert_eq!(session.get_next(6).unwrap().as_str(), "0");
    assert_eq!(session.get_next(6).unwrap().as_str(), "1");

    assert_eq!(session.get_next(7).unwrap().as_str(), "7");
    assert_eq!(session.get_next(7).unwrap().as_str(), "7");

    session.close().unwrap();
    harness.stop();

    assert_eq!(harness.data("Serial"), "502\n");
    assert_eq!(harness.data("Branch"), "NSW:21\nVIC:10\n");
    assert_eq!(harness.data("Customers"), "[EMPTY]\n\n[QLD]\nq1\n\n[VIC]\nc2\n\n");
    assert_eq!(harness.data("Runs"), "8\n");
    assert_eq!(harness.data("Postcodes"), "3000\n2000\n");
    assert_eq!(backups(&harness.env_dir().join("tmp"), "Runs"), 0);
}

#[test]
fn test_protocol_errors_keep_connection_open() {
    let mut harness = Harness::start(&[("Names", SourceKind::Hashed, "k:v\n")]);
    let mut session = harness.session();

    assert_eq!(
        session.get_next(9).unwrap_err().status(),
        Some(Status::BadSourceIndex)
    );
    assert_eq!(
        session.get_next(0).unwrap_err().status(),
        Some(Status::UnknownSourceType)
    );
    assert!(matches!(
        session.register("Missing"),
        Err(ClientError::UnknownSource(_))
    ));

    // Raw requests the typed API never produces.
    let bad_arity = session
        .request(&Request::GetHashed {
            handle: 0,
            key: "k|extra".into(),
        })
        .unwrap();
    assert_eq!(bad_arity, "*BAD*MESSAGE*");

    assert_eq!(session.get_hashed(0, "k").unwrap().as_str(), "v");

    session.close().unwrap();
    harness.stop();

    let used = std::fs::read_to_string(harness.env_dir().join("tmp/Names.used")).unwrap();
    assert!(used.lines().any(|l| l.ends_with(" - k::v")));
}
