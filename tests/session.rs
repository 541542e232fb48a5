use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tput::accounting::ReadTally;
use tput::config::{ClientConfig, ServerConfig};
use tput::metrics::Report;
use tput::server::{self, Server, ShutdownHandle};
use tput::session::SessionParams;
use tput::{client, Error, Result};

fn start_server() -> (SocketAddr, ShutdownHandle, JoinHandle<Result<()>>) {
    start_server_with_timeout(Duration::from_secs(10))
}

fn start_server_with_timeout(
    timeout: Duration,
) -> (SocketAddr, ShutdownHandle, JoinHandle<Result<()>>) {
    let mut config = ServerConfig::new("127.0.0.1:0".parse().unwrap());
    config.io_timeout = Some(timeout);
    let server = Server::bind(config).unwrap();
    let addr = server.local_addr();
    let handle = server.shutdown_handle();
    (addr, handle, thread::spawn(move || server.run()))
}

fn client_config(addr: SocketAddr, reps: i64, count: i64, size: i64, strategy: i64) -> ClientConfig {
    ClientConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        params: SessionParams::new(reps, count, size, strategy).unwrap(),
        io_timeout: Some(Duration::from_secs(10)),
        nodelay: false,
    }
}

/// Serves exactly one connection and hands back the server-side tally.
fn serve_once() -> (SocketAddr, JoinHandle<Result<ReadTally>>) {
    serve_once_with_timeout(None)
}

fn serve_once_with_timeout(
    timeout: Option<Duration>,
) -> (SocketAddr, JoinHandle<Result<ReadTally>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let worker = thread::spawn(move || {
        let (stream, _) = listener.accept()?;
        tput::net::set_timeouts(&stream, timeout)?;
        let mut socket = tput::raw::RawSocket::from(stream);
        server::serve(&mut socket, &ServerConfig::new(addr))
    });
    (addr, worker)
}

fn run_once(reps: i64, count: i64, size: i64, strategy: i64) -> (Report, ReadTally) {
    let (addr, worker) = serve_once();
    let report = client::run(&client_config(addr, reps, count, size, strategy)).unwrap();
    let tally = worker.join().unwrap().unwrap();
    (report, tally)
}

#[test]
fn every_strategy_and_layout() {
    let (addr, handle, runner) = start_server();

    for (count, size) in [(1, 1500), (15, 100), (3, 500), (1500, 1)] {
        for strategy in 1..=3 {
            let report = client::run(&client_config(addr, 20, count, size, strategy)).unwrap();
            assert!(
                report.read_calls >= 20,
                "{} x {} strategy {}: {} reads",
                count,
                size,
                strategy,
                report.read_calls
            );
            assert_eq!(report.strategy.number() as i64, strategy);
        }
    }

    handle.shutdown();
    runner.join().unwrap().unwrap();
}

#[test]
fn single_write_scenario() {
    let (report, tally) = run_once(10, 1, 1500, 3);
    assert_eq!(tally.bytes, 15000);
    assert_eq!(tally.repetitions, 10);
    assert!(tally.read_calls >= 10);
    assert_eq!(report.read_calls, tally.read_calls);
    assert_eq!(report.write_calls, 10);
}

#[test]
fn per_buffer_scenario() {
    let (report, tally) = run_once(5, 15, 100, 1);
    assert_eq!(report.write_calls, 75);
    assert_eq!(tally.bytes, 7500);
    assert_eq!(report.read_calls, tally.read_calls);
}

#[test]
fn one_repetition_per_strategy() {
    for strategy in 1..=3 {
        let (report, tally) = run_once(1, 15, 100, strategy);
        assert_eq!(tally.bytes, 1500);
        assert!(report.read_calls >= 1);
    }
}

#[test]
fn single_buffer_per_buffer_equals_single_write() {
    let (per_buffer, per_buffer_tally) = run_once(25, 1, 1500, 1);
    let (single, single_tally) = run_once(25, 1, 1500, 3);

    assert_eq!(per_buffer.write_calls, 25);
    assert_eq!(per_buffer.write_calls, single.write_calls);
    assert_eq!(per_buffer_tally.bytes, 37500);
    assert_eq!(per_buffer_tally.bytes, single_tally.bytes);
    assert!(per_buffer_tally.read_calls >= 25);
    assert!(single_tally.read_calls >= 25);
}

#[test]
fn vectored_splits_oversized_descriptor_lists() {
    let (report, tally) = run_once(4, 1500, 1, 2);
    assert_eq!(tally.bytes, 6000);
    // 1500 descriptors do not fit one writev
    assert!(report.write_calls >= 8);
}

#[test]
fn handshake_echo_is_byte_exact() {
    let (addr, worker) = serve_once();
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.write_all(b"3").unwrap();
    let mut ack = [0u8; 1];
    stream.read_exact(&mut ack).unwrap();
    assert_eq!(&ack, b"3");

    for _ in 0..3 {
        stream.write_all(&[0u8; 1500]).unwrap();
    }
    let mut count = String::new();
    stream.read_to_string(&mut count).unwrap();
    let tally = worker.join().unwrap().unwrap();
    assert_eq!(count, tally.read_calls.to_string());
}

#[test]
fn non_positive_announcement_closes_connection() {
    let (addr, worker) = serve_once();
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.write_all(b"0").unwrap();
    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).unwrap();
    assert!(rest.is_empty());
    assert!(matches!(
        worker.join().unwrap(),
        Err(Error::InvalidSessionParameters(_))
    ));
}

#[test]
fn truncated_transfer_fails_only_its_worker() {
    let (addr, handle, runner) = start_server();

    {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(b"5").unwrap();
        let mut ack = [0u8; 1];
        stream.read_exact(&mut ack).unwrap();
        stream.write_all(&[0u8; 700]).unwrap();
    }

    let report = client::run(&client_config(addr, 5, 1, 1500, 3)).unwrap();
    assert!(report.read_calls >= 5);

    handle.shutdown();
    runner.join().unwrap().unwrap();
}

/// Announces two repetitions, sends part of the first, then goes quiet.
fn stall_mid_repetition(addr: SocketAddr) -> TcpStream {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.write_all(b"2").unwrap();
    let mut ack = [0u8; 1];
    stream.read_exact(&mut ack).unwrap();
    stream.write_all(&[0u8; 700]).unwrap();
    stream
}

#[test]
fn stalled_peer_times_out() {
    let (addr, worker) = serve_once_with_timeout(Some(Duration::from_millis(200)));
    let _stalled = stall_mid_repetition(addr);

    match worker.join().unwrap() {
        Err(Error::Stream(e)) => assert!(
            matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut),
            "unexpected kind {:?}",
            e.kind()
        ),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn timed_out_worker_leaves_server_serving() {
    let (addr, handle, runner) = start_server_with_timeout(Duration::from_millis(200));
    let _stalled = stall_mid_repetition(addr);

    // outlive the stalled worker's timeout, then run a full session
    thread::sleep(Duration::from_millis(400));
    let report = client::run(&client_config(addr, 10, 15, 100, 2)).unwrap();
    assert!(report.read_calls >= 10);

    handle.shutdown();
    runner.join().unwrap().unwrap();
}

#[test]
fn concurrent_clients_are_independent() {
    let (addr, handle, runner) = start_server();

    let clients: Vec<_> = (1..=3)
        .map(|strategy| {
            thread::spawn(move || client::run(&client_config(addr, 50, 15, 100, strategy)))
        })
        .collect();
    for c in clients {
        let report = c.join().unwrap().unwrap();
        assert!(report.read_calls >= 50);
    }

    handle.shutdown();
    runner.join().unwrap().unwrap();
}

#[test]
fn mismatched_layout_is_rejected_before_connecting() {
    let err = SessionParams::new(10, 3, 400, 1).unwrap_err();
    assert!(matches!(err, Error::InvalidArguments(_)));
}

#[test]
fn refused_connection_is_reported() {
    let port = {
        let l = TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap().port()
    };
    let addr: SocketAddr = format!("127.0.0.1:{}", port).parse().unwrap();
    let err = client::run(&client_config(addr, 1, 1, 1500, 1)).unwrap_err();
    assert!(matches!(err, Error::Connection { .. }));
}
